use super::*;
use proptest::prelude::*;
use serde_json::json;

fn ids(updates: &[StoredUpdate]) -> Vec<i64> {
    updates.iter().map(|u| u.id).collect()
}

#[test]
fn test_zero_capacity_uses_default() {
    let store = UpdateStore::new(0);
    assert_eq!(store.capacity(), DEFAULT_UPDATE_CAPACITY);
    assert!(store.is_empty());
}

#[test]
fn test_ids_start_at_one_and_increase() {
    let store = UpdateStore::new(10);
    assert_eq!(store.push(UpdateKind::NewMessage, json!({"text": "a"})), 1);
    assert_eq!(store.push(UpdateKind::EditMessage, json!({"text": "b"})), 2);
    assert_eq!(store.len(), 2);
}

#[test]
fn test_capacity_two_keeps_newest_and_pops_newest_first() {
    let store = UpdateStore::new(2);
    for text in ["a", "b", "c"] {
        store.publish(UpdateKind::NewMessage, json!({ "text": text }));
    }
    assert_eq!(store.len(), 2);

    let first = store.pop(1);
    assert_eq!(ids(&first), vec![3]);
    assert_eq!(first[0].data["text"], "c");

    let rest = store.pop(10);
    assert_eq!(ids(&rest), vec![2]);
    assert!(store.is_empty());
}

#[test]
fn test_pop_leaves_older_entries() {
    let store = UpdateStore::new(10);
    for _ in 0..5 {
        store.push(UpdateKind::Other, serde_json::Value::Null);
    }
    assert_eq!(ids(&store.pop(2)), vec![5, 4]);
    assert_eq!(ids(&store.pop(10)), vec![3, 2, 1]);
}

#[test]
fn test_pop_empty_store_returns_nothing() {
    let store = UpdateStore::default();
    assert!(store.pop(10).is_empty());
    assert!(store.pop(0).is_empty());
}

#[test]
fn test_ids_keep_increasing_after_pop() {
    let store = UpdateStore::new(10);
    store.push(UpdateKind::Other, json!(1));
    store.pop(10);
    assert_eq!(store.push(UpdateKind::Other, json!(2)), 2);
}

#[test]
fn test_stored_update_serializes_type_field() {
    let store = UpdateStore::new(1);
    store.push(UpdateKind::NewChat, json!({"chat": 1}));
    let popped = store.pop(1);
    let value = serde_json::to_value(&popped[0]).unwrap();
    assert_eq!(value["type"], "new_chat");
    assert_eq!(value["id"], 1);
    assert!(value["timestamp"].is_string());
}

proptest! {
    #[test]
    fn prop_store_never_exceeds_capacity(capacity in 1usize..20, pushes in 0usize..60) {
        let store = UpdateStore::new(capacity);
        for _ in 0..pushes {
            store.push(UpdateKind::Other, serde_json::Value::Null);
        }
        prop_assert!(store.len() <= capacity);

        let retained = store.pop(usize::MAX);
        let expected: Vec<i64> = (1..=pushes as i64).rev().take(capacity).collect();
        prop_assert_eq!(ids(&retained), expected);
    }

    #[test]
    fn prop_pop_returns_min_of_request_and_len(pushes in 0usize..30, max in 0usize..40) {
        let store = UpdateStore::new(100);
        for _ in 0..pushes {
            store.push(UpdateKind::Other, serde_json::Value::Null);
        }
        let popped = store.pop(max);
        prop_assert_eq!(popped.len(), max.min(pushes));
        prop_assert_eq!(store.len(), pushes - popped.len());
        prop_assert!(popped.windows(2).all(|w| w[0].id > w[1].id));
    }
}
