use std::time::Duration;

use multiwatcher::Delta;
use multiwatcher::Error;
use multiwatcher::WatcherError;
use tokio::time::timeout;

use crate::common::machine;
use crate::common::start_manager;
use crate::common::unit;

#[tokio::test]
async fn test_peer_stop_keeps_removed_unit_for_remaining_watcher() {
    let (backing, manager) = start_manager(vec![unit("wordpress/0")]);
    let w1 = manager.watch();
    let w2 = manager.watch();
    w1.next().await.unwrap();
    w2.next().await.unwrap();

    w1.stop().await.unwrap();
    backing.remove(&unit("wordpress/0").entity_id());

    // Still retained for w2, which has not been told.
    assert_eq!(manager.stats().await.unwrap().entities, 1);
    assert_eq!(w2.next().await.unwrap(), vec![Delta::remove(unit("wordpress/0"))]);
    assert_eq!(manager.stats().await.unwrap().entities, 0);

    w2.stop().await.unwrap();
    manager.stop().await.unwrap();
}

#[tokio::test]
async fn test_removal_unseen_by_stopped_watcher_is_collected() {
    let (backing, manager) = start_manager(vec![machine("0", "i-0")]);
    let watcher = manager.watch();
    watcher.next().await.unwrap();
    backing.remove(&machine("0", "").entity_id());
    assert_eq!(manager.stats().await.unwrap().entities, 1);

    watcher.stop().await.unwrap();
    assert_eq!(manager.stats().await.unwrap().entities, 0);
    manager.stop().await.unwrap();
}

#[tokio::test]
async fn test_next_blocks_until_store_changes() {
    let (backing, manager) = start_manager(vec![machine("0", "i-0")]);
    let watcher = manager.watch();
    watcher.next().await.unwrap();

    // An identical write is not a change.
    backing.put(machine("0", "i-0"));
    assert!(timeout(Duration::from_millis(50), watcher.next()).await.is_err());

    backing.put(machine("0", "i-1"));
    assert_eq!(watcher.next().await.unwrap(), vec![Delta::change(machine("0", "i-1"))]);

    watcher.stop().await.unwrap();
    manager.stop().await.unwrap();
}

#[tokio::test]
async fn test_calls_after_manager_stop_fail_with_stopped_error() {
    let (_backing, manager) = start_manager(vec![machine("0", "i-0")]);
    let watcher = manager.watch();

    manager.stop().await.unwrap();

    let err = watcher.next().await.unwrap_err();
    assert!(err.is_stopped());
    assert_eq!(err.to_string(), "shared state watcher was stopped");
    assert!(matches!(watcher.stop().await, Err(WatcherError::StoreStopped)));
}

#[tokio::test]
async fn test_backing_failure_is_returned_by_manager_stop() {
    let (backing, manager) = start_manager(vec![]);
    let watcher = manager.watch();
    // Once the aggregator answers, it is subscribed and past its snapshot.
    manager.stats().await.unwrap();
    backing.fail_fetch_with("lost connection to primary");
    backing.put(machine("0", "i-0"));

    let err = watcher.next().await.unwrap_err();
    assert!(matches!(err, WatcherError::Fatal(_)));
    assert!(!err.is_stopped());

    let err = manager.stop().await.unwrap_err();
    assert!(matches!(err, Error::Watcher(WatcherError::Fatal(_))));
    assert!(manager.is_stopped());
}

#[tokio::test]
async fn test_batches_encode_as_kind_op_entity_triples() {
    let (backing, manager) = start_manager(vec![machine("0", "i-0")]);
    let watcher = manager.watch();
    watcher.next().await.unwrap();
    backing.remove(&machine("0", "").entity_id());

    let deltas = watcher.next().await.unwrap();
    let value = serde_json::to_value(&deltas).unwrap();
    assert_eq!(value[0][0], "machine");
    assert_eq!(value[0][1], "remove");
    assert_eq!(value[0][2]["id"], "0");
    assert_eq!(value[0][2]["instance-id"], "i-0");

    let decoded: Vec<Delta> = serde_json::from_value(value).unwrap();
    assert_eq!(decoded, deltas);

    watcher.stop().await.unwrap();
    manager.stop().await.unwrap();
}
