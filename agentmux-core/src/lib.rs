pub mod bus;
pub mod config;
pub mod git;
pub mod ids;
pub mod model;
pub mod msg;
pub mod paths;
pub mod registry;
pub mod script;
pub mod service;
pub mod statewatch;
pub mod status;
pub mod store;
pub mod suppress;
pub mod tmux;
pub mod watch;

// Re-export commonly used types at crate root
pub use bus::{Bus, MsgSender};
pub use config::Config;
pub use git::{DiscoveredWorktree, GitOps};
pub use ids::workspace_id;
pub use model::{Project, TabDescriptor, Workspace};
pub use msg::{Msg, StateReason};
pub use paths::canonical_path;
pub use registry::ProjectRegistry;
pub use script::ScriptRunner;
pub use service::WorkspaceService;
pub use status::{GitStatus, StatusCache};
pub use store::WorkspaceStore;
pub use suppress::SuppressionMap;
pub use tmux::Tmux;
pub use watch::{FileWatcher, WatchError};
