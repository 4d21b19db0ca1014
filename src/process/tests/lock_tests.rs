use super::*;
use tempfile::tempdir;

#[test]
fn test_only_one_guard_acquires() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("server.lock");

    let mut first = LockFile::new(&path);
    let mut second = LockFile::new(&path);

    assert!(first.try_lock().unwrap());
    assert!(!second.try_lock().unwrap());
    assert!(first.is_locked());
    assert!(!second.is_locked());

    first.unlock().unwrap();
    assert!(second.try_lock().unwrap());
}

#[test]
fn test_unlock_is_idempotent() {
    let dir = tempdir().unwrap();
    let mut lock = LockFile::new(dir.path().join("server.lock"));

    lock.unlock().unwrap();
    assert!(lock.try_lock().unwrap());
    lock.unlock().unwrap();
    lock.unlock().unwrap();
    assert!(!lock.is_locked());
}

#[test]
fn test_relocking_held_lock_succeeds() {
    let dir = tempdir().unwrap();
    let mut lock = LockFile::new(dir.path().join("server.lock"));

    assert!(lock.try_lock().unwrap());
    assert!(lock.try_lock().unwrap());
}

#[test]
fn test_drop_releases_lock() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("server.lock");

    {
        let mut held = LockFile::new(&path);
        assert!(held.try_lock().unwrap());
    }

    let mut next = LockFile::new(&path);
    assert!(next.try_lock().unwrap());
    assert_eq!(next.path(), path.as_path());
}

#[test]
fn test_missing_directory_is_an_error() {
    let dir = tempdir().unwrap();
    let mut lock = LockFile::new(dir.path().join("missing").join("server.lock"));
    assert!(lock.try_lock().is_err());
}
