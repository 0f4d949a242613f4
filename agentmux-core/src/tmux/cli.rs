use super::Tmux;
use anyhow::{Context, Result, bail};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

/// Wall-clock timeout for any single tmux invocation.
const TMUX_TIMEOUT: Duration = Duration::from_secs(2);

pub struct CliTmux;

/// Run tmux with a deadline. A server that stops responding gets its
/// client killed rather than stalling the calling producer thread.
fn run_tmux(args: &[&str]) -> Result<Output> {
    let mut child = Command::new("tmux")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to execute tmux {}", args.join(" ")))?;

    let deadline = Instant::now() + TMUX_TIMEOUT;
    loop {
        match child.try_wait()? {
            Some(_) => break,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                bail!("tmux {} timed out", args.join(" "));
            }
            None => std::thread::sleep(Duration::from_millis(25)),
        }
    }
    let output = child.wait_with_output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("tmux {} failed: {}", args.join(" "), stderr.trim());
    }
    Ok(output)
}

impl Tmux for CliTmux {
    fn list_sessions(&self) -> Vec<String> {
        let Ok(output) = run_tmux(&["list-sessions", "-F", "#{session_name}"]) else {
            // No server running is the common case, not an error.
            return Vec::new();
        };
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    fn session_exists(&self, name: &str) -> bool {
        run_tmux(&["has-session", "-t", &format!("={name}")]).is_ok()
    }

    fn create_session(&self, name: &str, dir: &Path, command: Option<&str>) -> Result<()> {
        let dir_str = dir.to_string_lossy();
        let mut args = vec!["new-session", "-ds", name, "-c", &dir_str];
        if let Some(cmd) = command.filter(|c| !c.trim().is_empty()) {
            args.push(cmd);
        }
        run_tmux(&args)?;
        Ok(())
    }

    fn capture_pane(&self, session: &str, lines: usize) -> Result<String> {
        let target = format!("={session}:0.0");
        let start = format!("-{lines}");
        let output = run_tmux(&["capture-pane", "-t", &target, "-p", "-S", &start])?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn pipe_pane(&self, session: &str, log_path: &Path) -> Result<()> {
        let target = format!("={session}:0.0");
        let escaped_path = log_path.to_string_lossy().replace('\'', "'\\''");
        let command = format!("cat >> '{escaped_path}'");
        run_tmux(&["pipe-pane", "-t", &target, "-o", &command])?;
        Ok(())
    }

    fn kill_session(&self, name: &str) {
        if let Err(e) = run_tmux(&["kill-session", "-t", &format!("={name}")]) {
            log::debug!("kill-session {name}: {e:#}");
        }
    }
}
