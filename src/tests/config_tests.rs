use super::*;
use serial_test::serial;
use std::env;
use tempfile::tempdir;

fn clear_env() {
    env::remove_var(SOCKET_ENV);
    env::remove_var(SESSION_PATH_ENV);
    env::remove_var(UPDATE_LIMIT_ENV);
}

#[test]
fn test_retry_policy_defaults() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_attempts, 3);
    assert_eq!(policy.base_delay, Duration::from_secs(2));
    assert_eq!(policy.reload_settle, Duration::from_millis(500));
}

#[test]
fn test_backoff_is_linear() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.delay_for(1), Duration::from_secs(2));
    assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    assert_eq!(policy.delay_for(3), Duration::from_secs(6));
}

#[test]
#[serial]
fn test_socket_path_precedence() {
    clear_env();
    assert_eq!(
        socket_path(None),
        PathBuf::from(daemon_paths::DEFAULT_SOCKET_PATH)
    );

    env::set_var(SOCKET_ENV, "/tmp/from-env.sock");
    assert_eq!(socket_path(None), PathBuf::from("/tmp/from-env.sock"));
    assert_eq!(
        socket_path(Some(PathBuf::from("/tmp/flag.sock"))),
        PathBuf::from("/tmp/flag.sock")
    );
    clear_env();
}

#[test]
#[serial]
fn test_resolve_reads_environment() {
    clear_env();
    let dir = tempdir().unwrap();
    env::set_var(SESSION_PATH_ENV, dir.path().join("env-session.json"));
    env::set_var(UPDATE_LIMIT_ENV, "25");

    let config = DaemonConfig::resolve(None, None, true).unwrap();
    clear_env();

    assert_eq!(config.session_path, dir.path().join("env-session.json"));
    assert_eq!(config.update_capacity, 25);
    assert!(config.foreground);
    assert_eq!(config.retry, RetryPolicy::default());
}

#[test]
#[serial]
fn test_flags_override_environment() {
    clear_env();
    env::set_var(SESSION_PATH_ENV, "/tmp/ignored.json");

    let config = DaemonConfig::resolve(
        Some(PathBuf::from("/tmp/flag.sock")),
        Some(PathBuf::from("/tmp/flag-session.json")),
        false,
    )
    .unwrap();
    clear_env();

    assert_eq!(config.socket_path, PathBuf::from("/tmp/flag.sock"));
    assert_eq!(config.session_path, PathBuf::from("/tmp/flag-session.json"));
    assert!(!config.foreground);
}

#[test]
#[serial]
fn test_invalid_update_limit_falls_back() {
    clear_env();
    env::set_var(UPDATE_LIMIT_ENV, "lots");

    let config = DaemonConfig::resolve(None, Some(PathBuf::from("/tmp/s.json")), true).unwrap();
    clear_env();

    assert_eq!(config.update_capacity, DEFAULT_UPDATE_CAPACITY);
}
