use super::*;
use tempfile::tempdir;

#[test]
fn test_write_then_read_pid() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("server.pid");

    let pid = write_pid(&path).unwrap();
    assert_eq!(pid, std::process::id());
    assert_eq!(read_pid(&path), Some(pid));
}

#[cfg(unix)]
#[test]
fn test_pid_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let path = dir.path().join("server.pid");
    write_pid(&path).unwrap();

    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn test_read_pid_rejects_garbage() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("server.pid");

    assert_eq!(read_pid(&path), None);
    fs::write(&path, "not-a-pid").unwrap();
    assert_eq!(read_pid(&path), None);
    fs::write(&path, "0").unwrap();
    assert_eq!(read_pid(&path), None);
    fs::write(&path, " 4321\n").unwrap();
    assert_eq!(read_pid(&path), Some(4321));
}

#[test]
fn test_remove_pid_tolerates_missing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("server.pid");

    remove_pid(&path).unwrap();
    write_pid(&path).unwrap();
    remove_pid(&path).unwrap();
    assert!(!path.exists());
}

#[cfg(unix)]
#[test]
fn test_process_alive_self() {
    assert!(process_alive(std::process::id()));
}

#[cfg(unix)]
#[test]
fn test_process_alive_nonexistent() {
    assert!(!process_alive(999_999_999));
    assert!(!process_alive(u32::MAX));
    assert!(!process_alive(0));
}

#[cfg(unix)]
#[test]
fn test_force_kill_terminates_child() {
    let mut child = std::process::Command::new("sleep")
        .arg("30")
        .spawn()
        .unwrap();

    force_kill(child.id()).unwrap();
    let status = child.wait().unwrap();
    assert!(!status.success());
}
