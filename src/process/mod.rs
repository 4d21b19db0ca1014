//! Single-instance guard and process lifecycle helpers.
//!
//! - **Lock (`lock.rs`)**: exclusive advisory lock held for the daemon's lifetime.
//! - **PID file (`pid.rs`)**: best-effort metadata for `status` and `stop`.
//! - **Daemonize (`daemonize.rs`)**: re-executes the binary detached from the terminal.

pub mod daemonize;
pub mod lock;
pub mod pid;

pub use lock::LockFile;
pub use pid::{force_kill, process_alive, read_pid, remove_pid, write_pid};
