use super::*;
use serial_test::serial;
use tempfile::tempdir;

#[cfg(unix)]
#[test]
fn test_detached_command_marks_child_and_appends_output() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("server.log");
    std::fs::write(&log_path, "previous run\n").unwrap();

    let args = vec![
        OsString::from("-c"),
        OsString::from(format!("echo marker=${}; echo oops >&2", DAEMON_CHILD_ENV)),
    ];
    let status = detached_command(Path::new("/bin/sh"), args, &log_path)
        .unwrap()
        .status()
        .unwrap();
    assert!(status.success());

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.starts_with("previous run\n"));
    assert!(log.contains("marker=1"));
    assert!(log.contains("oops"));
}

#[test]
#[serial]
fn test_daemon_child_marker() {
    std::env::remove_var(DAEMON_CHILD_ENV);
    assert!(!is_daemon_child());
    std::env::set_var(DAEMON_CHILD_ENV, "1");
    assert!(is_daemon_child());
    std::env::set_var(DAEMON_CHILD_ENV, "0");
    assert!(!is_daemon_child());
    std::env::remove_var(DAEMON_CHILD_ENV);
}

#[test]
fn test_unwritable_log_path_is_an_error() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("missing").join("server.log");
    assert!(detached_command(Path::new("/bin/true"), Vec::new(), &log_path).is_err());
}
