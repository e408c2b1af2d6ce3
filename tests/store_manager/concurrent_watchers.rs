use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use multiwatcher::EntityId;
use multiwatcher::EntityInfo;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use tokio::time::timeout;

use crate::common::application;
use crate::common::machine;
use crate::common::start_manager;
use crate::common::unit;
use crate::common::View;

const WATCHERS: usize = 6;
const MUTATIONS: usize = 400;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_watchers_converge_on_final_state() {
    let initial = vec![machine("0", "i-0"), unit("wordpress/0")];
    let mut expected: HashMap<EntityId, EntityInfo> =
        initial.iter().map(|info| (info.entity_id(), info.clone())).collect();
    let (backing, manager) = start_manager(initial);
    let manager = Arc::new(manager);

    // Written last: a watcher that has seen it has seen everything.
    let sentinel = application("sentinel");
    let sentinel_id = sentinel.entity_id();

    let mut tasks = Vec::with_capacity(WATCHERS);
    for _ in 0..WATCHERS {
        let watcher = manager.watch();
        let sentinel_id = sentinel_id.clone();
        tasks.push(tokio::spawn(async move {
            let mut view = View::default();
            let mut last_revno = 0;
            while !view.entities.contains_key(&sentinel_id) {
                let deltas = watcher.next().await.expect("next succeeds");
                assert!(!deltas.is_empty());
                assert!(watcher.revno() > last_revno, "revno went backwards");
                last_revno = watcher.revno();
                view.apply(deltas);
            }
            watcher.stop().await.expect("stop succeeds");
            view
        }));
    }

    let mut rng = StdRng::seed_from_u64(0xfeed);
    for step in 0..MUTATIONS {
        let n = rng.gen_range(0..12).to_string();
        if rng.gen_bool(0.7) {
            let info = machine(&n, &format!("i-{step}"));
            expected.insert(info.entity_id(), info.clone());
            backing.put(info);
        } else {
            let id = machine(&n, "").entity_id();
            expected.remove(&id);
            backing.remove(&id);
        }
        if step % 16 == 0 {
            tokio::task::yield_now().await;
        }
    }
    expected.insert(sentinel_id, sentinel.clone());
    backing.put(sentinel);

    let views = timeout(Duration::from_secs(10), join_all(tasks))
        .await
        .expect("watchers converged");
    for view in views {
        let view = view.expect("watcher task panicked");
        assert_eq!(view.entities, expected);
    }

    let stats = manager.stats().await.unwrap();
    assert_eq!(stats.watchers, 0);
    assert_eq!(stats.entities, expected.len());
    manager.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watchers_joining_mid_stream_see_consistent_snapshots() {
    // The unit keeps the store non-empty so every first `next()` returns.
    let (backing, manager) = start_manager(vec![unit("wordpress/0")]);
    let mut rng = StdRng::seed_from_u64(42);

    for round in 0..20 {
        for step in 0..10 {
            let n = rng.gen_range(0..6).to_string();
            if rng.gen_bool(0.6) {
                backing.put(machine(&n, &format!("i-{round}-{step}")));
            } else {
                backing.remove(&machine(&n, "").entity_id());
            }
        }

        // A fresh watcher's first batch is exactly the live set.
        let watcher = manager.watch();
        let mut view = View::default();
        view.apply(watcher.next().await.unwrap());
        let stats = manager.stats().await.unwrap();
        assert_eq!(watcher.revno(), stats.latest_revno);
        assert!(view.entities.len() <= stats.entities);
        watcher.stop().await.unwrap();
    }

    // Nobody is watching any more: every removed entry has been collected.
    let watcher = manager.watch();
    let mut view = View::default();
    view.apply(watcher.next().await.unwrap());
    watcher.stop().await.unwrap();
    assert_eq!(manager.stats().await.unwrap().entities, view.entities.len());

    manager.stop().await.unwrap();
}
