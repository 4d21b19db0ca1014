//! Tests for daemon_paths module.

use super::*;
use serial_test::serial;
use std::env;
use tempfile::tempdir;

#[test]
#[serial]
fn test_state_dir_honours_env_override() {
    let dir = tempdir().unwrap();
    let state = dir.path().join("state");
    env::set_var(HOME_ENV, &state);

    let resolved = state_dir().unwrap();
    env::remove_var(HOME_ENV);

    assert_eq!(resolved, state);
    assert!(state.is_dir());
}

#[cfg(unix)]
#[test]
#[serial]
fn test_state_dir_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let state = dir.path().join("private");
    env::set_var(HOME_ENV, &state);

    let resolved = state_dir().unwrap();
    env::remove_var(HOME_ENV);

    let mode = fs::metadata(&resolved).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o700);
}

#[test]
#[serial]
fn test_file_paths_live_in_state_dir() {
    let dir = tempdir().unwrap();
    env::set_var(HOME_ENV, dir.path());

    let lock = lock_path().unwrap();
    let pid = pid_path().unwrap();
    let log = log_path().unwrap();
    let session = default_session_path().unwrap();
    env::remove_var(HOME_ENV);

    assert_eq!(lock, dir.path().join("server.lock"));
    assert_eq!(pid, dir.path().join("server.pid"));
    assert_eq!(log, dir.path().join("server.log"));
    assert_eq!(session, dir.path().join("session.json"));
}
