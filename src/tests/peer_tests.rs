use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Resolver that answers every lookup and counts how often it was asked.
#[derive(Default)]
struct CountingResolver {
    calls: AtomicUsize,
}

#[async_trait]
impl PeerResolver for CountingResolver {
    async fn lookup_peer(&self, address: &PeerAddress) -> Result<InputPeer, SessionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match address {
            PeerAddress::Username(name) if name == "missing" => {
                Err(SessionError::PeerNotFound(format!("@{}", name)))
            }
            PeerAddress::Username(_) => Ok(InputPeer::User {
                user_id: 7,
                access_hash: 70,
            }),
            PeerAddress::User(id) => Ok(InputPeer::User {
                user_id: *id,
                access_hash: 1,
            }),
            PeerAddress::Channel(id) => Ok(InputPeer::Channel {
                channel_id: *id,
                access_hash: 2,
            }),
            other => panic!("unexpected remote lookup for {:?}", other),
        }
    }
}

#[test]
fn test_parse_self_aliases() {
    for alias in ["me", "self", "current_user"] {
        assert_eq!(PeerAddress::parse(alias).unwrap(), PeerAddress::Me);
    }
}

#[test]
fn test_parse_username() {
    assert_eq!(
        PeerAddress::parse("@alice").unwrap(),
        PeerAddress::Username("alice".to_string())
    );
    assert!(PeerAddress::parse("@").is_err());
}

#[test]
fn test_parse_numeric_ids() {
    assert_eq!(PeerAddress::parse("12345").unwrap(), PeerAddress::User(12345));
    assert_eq!(PeerAddress::parse("-4567").unwrap(), PeerAddress::Chat(4567));
    assert_eq!(
        PeerAddress::parse("-1001234567890").unwrap(),
        PeerAddress::Channel(1234567890)
    );
}

#[test]
fn test_parse_bare_channel_prefix_is_chat() {
    assert_eq!(PeerAddress::parse("-100").unwrap(), PeerAddress::Chat(100));
}

#[test]
fn test_parse_rejects_garbage() {
    for bad in ["", "alice", "0", "12abc", "--5"] {
        assert!(
            matches!(PeerAddress::parse(bad), Err(SessionError::InvalidAddress(_))),
            "{:?} should be rejected",
            bad
        );
    }
}

#[test]
fn test_input_peer_serialization() {
    let value = serde_json::to_value(InputPeer::Me).unwrap();
    assert_eq!(value["type"], "self");

    let value = serde_json::to_value(InputPeer::Channel {
        channel_id: 5,
        access_hash: 9,
    })
    .unwrap();
    assert_eq!(value["type"], "channel");
    assert_eq!(value["channel_id"], 5);
}

#[tokio::test]
async fn test_resolve_hits_cache_until_cleared() {
    let cache = PeerCache::new();
    let resolver = CountingResolver::default();

    let first = cache.resolve(&resolver, "@alice").await.unwrap();
    let second = cache.resolve(&resolver, "@alice").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);

    cache.clear();
    assert!(cache.is_empty());
    cache.resolve(&resolver, "@alice").await.unwrap();
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_local_addresses_skip_resolver() {
    let cache = PeerCache::new();
    let resolver = CountingResolver::default();

    assert_eq!(cache.resolve(&resolver, "me").await.unwrap(), InputPeer::Me);
    assert_eq!(
        cache.resolve(&resolver, "-42").await.unwrap(),
        InputPeer::Chat { chat_id: 42 }
    );
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn test_failed_lookups_are_not_cached() {
    let cache = PeerCache::new();
    let resolver = CountingResolver::default();

    assert!(matches!(
        cache.resolve(&resolver, "@missing").await,
        Err(SessionError::PeerNotFound(_))
    ));
    assert!(matches!(
        cache.resolve(&resolver, "nonsense").await,
        Err(SessionError::InvalidAddress(_))
    ));
    assert!(cache.is_empty());
}

/// Resolver that blocks each lookup until released.
#[derive(Default)]
struct GatedResolver {
    entered: tokio::sync::Notify,
    release: tokio::sync::Notify,
}

#[async_trait]
impl PeerResolver for GatedResolver {
    async fn lookup_peer(&self, _address: &PeerAddress) -> Result<InputPeer, SessionError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(InputPeer::User {
            user_id: 9,
            access_hash: 90,
        })
    }
}

#[tokio::test]
async fn test_lookup_in_flight_during_clear_is_not_stored() {
    let cache = Arc::new(PeerCache::new());
    let resolver = Arc::new(GatedResolver::default());

    let lookup = {
        let cache = cache.clone();
        let resolver = resolver.clone();
        tokio::spawn(async move { cache.resolve(resolver.as_ref(), "@alice").await })
    };
    resolver.entered.notified().await;

    cache.clear();
    resolver.release.notify_one();

    let peer = lookup.await.unwrap().unwrap();
    assert_eq!(
        peer,
        InputPeer::User {
            user_id: 9,
            access_hash: 90
        }
    );
    assert!(cache.is_empty());

    let resolver = CountingResolver::default();
    cache.resolve(&resolver, "@alice").await.unwrap();
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_address_display_matches_input_form() {
    for raw in ["me", "@alice", "12345", "-4567", "-1001234567890"] {
        assert_eq!(PeerAddress::parse(raw).unwrap().to_string(), raw);
    }
}
