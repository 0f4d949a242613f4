use crate::msg::Msg;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Capacity of the routine-event queue. Overflow drops.
const NORMAL_QUEUE_CAP: usize = 4096;
/// Capacity of the must-not-lose queue. Overflow blocks the producer.
const CRITICAL_QUEUE_CAP: usize = 512;

/// Handle for posting messages from background threads to the update
/// loop. Cheap to clone; every producer gets one.
///
/// Routine messages ride the bounded normal queue and are dropped
/// silently once it fills, so a watcher or ticker storm can never wedge a
/// producer. Lifecycle completions and shutdown ride the critical queue,
/// whose sends block instead: those messages must not be lost.
#[derive(Clone)]
pub struct MsgSender {
    normal: SyncSender<Msg>,
    critical: SyncSender<Msg>,
    cancel: Arc<AtomicBool>,
}

impl MsgSender {
    /// Post a message, routing by criticality.
    pub fn post(&self, msg: Msg) {
        if msg.is_critical() {
            // Blocking send; only fails when the loop is gone, at which
            // point there is nobody left to care.
            let _ = self.critical.send(msg);
            return;
        }
        match self.normal.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(msg)) => {
                // Dropped by policy: every routine message is either a
                // tick that will fire again or a watch event the next
                // event re-triggers.
                log::debug!("normal queue full, dropping {msg:?}");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Signal background producers to wind down.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

/// Receiving end of the intake queues, owned by the update loop. Drains
/// critical before normal so lifecycle completions are never starved by a
/// routine-event storm.
pub struct Bus {
    normal: Receiver<Msg>,
    critical: Receiver<Msg>,
}

impl Bus {
    pub fn new() -> (Self, MsgSender) {
        let (normal_tx, normal_rx) = sync_channel(NORMAL_QUEUE_CAP);
        let (critical_tx, critical_rx) = sync_channel(CRITICAL_QUEUE_CAP);
        let bus = Self {
            normal: normal_rx,
            critical: critical_rx,
        };
        let sender = MsgSender {
            normal: normal_tx,
            critical: critical_tx,
            cancel: Arc::new(AtomicBool::new(false)),
        };
        (bus, sender)
    }

    /// Next queued message, critical first. Non-blocking.
    pub fn try_recv(&self) -> Option<Msg> {
        if let Ok(msg) = self.critical.try_recv() {
            return Some(msg);
        }
        self.normal.try_recv().ok()
    }

    /// Wait up to `timeout` for a message. Polls in short increments so a
    /// critical message arriving mid-wait is still delivered ahead of
    /// queued normal traffic.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Msg> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(msg) = self.try_recv() {
                return Some(msg);
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(5).min(timeout));
        }
    }
}
