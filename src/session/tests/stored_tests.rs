use super::*;
use crate::updates::UpdateStore;
use serde_json::json;
use std::time::Duration;
use tempfile::tempdir;

fn write_session(dir: &Path, value: serde_json::Value) -> PathBuf {
    let path = dir.join("session.json");
    std::fs::write(&path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
    path
}

fn sample_session() -> serde_json::Value {
    json!({
        "identity": {"user_id": 10, "username": "owner", "first_name": "Owner"},
        "peers": [
            {"username": "Alice", "peer": {"type": "user", "user_id": 11, "access_hash": 111}},
            {"peer": {"type": "channel", "channel_id": 1234567890, "access_hash": 222}}
        ],
        "pending_updates": [
            {"type": "new_message", "data": {"text": "first"}},
            {"type": "edit_message", "data": {"text": "second"}}
        ]
    })
}

#[tokio::test]
async fn test_connect_reads_identity() {
    let dir = tempdir().unwrap();
    let path = write_session(dir.path(), sample_session());
    let session = StoredSession::new(&path, Arc::new(UpdateStore::new(10)));

    session.connect().await.unwrap();
    assert!(session.is_authorized().await.unwrap());
    let identity = session.identity().await.unwrap();
    assert_eq!(identity.user_id, 10);
    assert_eq!(identity.username.as_deref(), Some("owner"));
    assert_eq!(session.path(), path.as_path());
}

#[tokio::test]
async fn test_missing_file_is_not_authorized() {
    let dir = tempdir().unwrap();
    let session = StoredSession::new(dir.path().join("absent.json"), Arc::new(UpdateStore::new(10)));

    session.connect().await.unwrap();
    assert!(!session.is_authorized().await.unwrap());
    assert!(matches!(
        session.identity().await,
        Err(SessionError::NotAuthorized)
    ));
}

#[tokio::test]
async fn test_malformed_file_fails_connect() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "{ not json").unwrap();
    let session = StoredSession::new(&path, Arc::new(UpdateStore::new(10)));

    assert!(matches!(
        session.connect().await,
        Err(SessionError::SessionFile { .. })
    ));
}

#[tokio::test]
async fn test_queries_before_connect_are_not_initialized() {
    let session = StoredSession::new("/nonexistent/session.json", Arc::new(UpdateStore::new(10)));
    assert!(matches!(
        session.is_authorized().await,
        Err(SessionError::NotInitialized)
    ));
}

#[tokio::test]
async fn test_lookup_peer_from_table() {
    let dir = tempdir().unwrap();
    let path = write_session(dir.path(), sample_session());
    let session = StoredSession::new(&path, Arc::new(UpdateStore::new(10)));
    session.connect().await.unwrap();

    let by_name = session
        .lookup_peer(&PeerAddress::Username("alice".to_string()))
        .await
        .unwrap();
    assert_eq!(
        by_name,
        InputPeer::User {
            user_id: 11,
            access_hash: 111
        }
    );

    let by_id = session.lookup_peer(&PeerAddress::User(11)).await.unwrap();
    assert_eq!(by_id, by_name);

    let channel = session
        .lookup_peer(&PeerAddress::Channel(1234567890))
        .await
        .unwrap();
    assert!(matches!(channel, InputPeer::Channel { access_hash: 222, .. }));

    assert!(matches!(
        session.lookup_peer(&PeerAddress::User(999)).await,
        Err(SessionError::PeerNotFound(_))
    ));
}

#[tokio::test]
async fn test_run_delivers_pending_updates_once() {
    let dir = tempdir().unwrap();
    let path = write_session(dir.path(), sample_session());
    let store = Arc::new(UpdateStore::new(10));
    let session = Arc::new(StoredSession::new(&path, store.clone()));
    session.connect().await.unwrap();

    let cancel = CancellationToken::new();
    let runner = {
        let session = session.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { session.run(cancel).await })
    };

    tokio::time::timeout(Duration::from_secs(2), async {
        while store.len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    cancel.cancel();
    runner.await.unwrap().unwrap();

    let updates = store.pop(10);
    assert_eq!(updates[0].data["text"], "second");
    assert_eq!(updates[1].kind, UpdateKind::NewMessage);
    assert!(session.take_pending_updates().is_empty());
}

#[tokio::test]
async fn test_factory_opens_independent_sessions() {
    let dir = tempdir().unwrap();
    let path = write_session(dir.path(), sample_session());
    let factory = StoredSessionFactory::new(&path);
    let publisher: Arc<dyn UpdatePublisher> = Arc::new(UpdateStore::new(10));

    let first = factory.open(publisher.clone());
    let second = factory.open(publisher);
    first.connect().await.unwrap();

    assert!(first.is_authorized().await.unwrap());
    assert!(second.is_authorized().await.is_err());
}
