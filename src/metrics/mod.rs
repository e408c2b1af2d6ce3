//! Prometheus collectors for the aggregator.
//!
//! Size gauges are adjusted by deltas rather than set, so several store
//! managers in one process add up instead of overwriting each other.


use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::error;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref ENTITIES_METRIC: IntGauge = IntGauge::new(
        "multiwatcher_entities",
        "Entries held in the entity store, including removed entries kept for watchers"
    )
    .expect("metric can not be created");

    pub static ref WATCHERS_METRIC: IntGauge = IntGauge::new(
        "multiwatcher_watchers",
        "Watchers known to the aggregator and not yet stopped"
    )
    .expect("metric can not be created");

    pub static ref LATEST_REVNO_METRIC: IntGauge = IntGauge::new(
        "multiwatcher_latest_revno",
        "Latest revision of the most recently updated entity store"
    )
    .expect("metric can not be created");

    pub static ref BATCHES_METRIC: IntCounter = IntCounter::new(
        "multiwatcher_batches_total",
        "Delta batches delivered to watchers"
    )
    .expect("metric can not be created");

    pub static ref DELTAS_METRIC: IntCounter = IntCounter::new(
        "multiwatcher_deltas_total",
        "Deltas delivered to watchers"
    )
    .expect("metric can not be created");

    pub static ref BACKING_CHANGES_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "multiwatcher_backing_changes_total",
            "Raw change notifications applied from the backing store"
        ),
        &["kind"]
    )
    .expect("metric can not be created");
}

static REGISTER: Once = Once::new();

/// Registers every collector with [`REGISTRY`]; later calls are no-ops.
pub fn register_custom_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(ENTITIES_METRIC.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(WATCHERS_METRIC.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(LATEST_REVNO_METRIC.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(BATCHES_METRIC.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(DELTAS_METRIC.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(BACKING_CHANGES_METRIC.clone()))
            .expect("collector can be registered");
    });
}

/// Renders [`REGISTRY`] in the prometheus text exposition format.
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode multiwatcher metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        error!("multiwatcher metrics could not be from_utf8'd: {}", e);
        String::new()
    })
}
