use std::collections::HashMap;
use std::sync::Arc;

use multiwatcher::ApplicationInfo;
use multiwatcher::Delta;
use multiwatcher::EntityId;
use multiwatcher::EntityInfo;
use multiwatcher::MachineInfo;
use multiwatcher::MemBacking;
use multiwatcher::MultiwatcherConfig;
use multiwatcher::StoreManager;
use multiwatcher::UnitInfo;
use tracing_subscriber::EnvFilter;

pub const MODEL_UUID: &str = "c0ffee00-1234-4abc-8def-000000000001";

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for integration test.");
}

pub fn start_manager(entities: Vec<EntityInfo>) -> (Arc<MemBacking>, StoreManager) {
    enable_logger();
    let backing = Arc::new(MemBacking::with_entities(entities));
    let mut config = MultiwatcherConfig::default();
    config.aggregator.enable_metrics = false;
    let manager = StoreManager::new(backing.clone(), config).expect("manager starts");
    (backing, manager)
}

pub fn machine(
    id: &str,
    instance_id: &str,
) -> EntityInfo {
    MachineInfo {
        model_uuid: MODEL_UUID.into(),
        id: id.into(),
        instance_id: instance_id.into(),
        ..Default::default()
    }
    .into()
}

pub fn unit(name: &str) -> EntityInfo {
    UnitInfo {
        model_uuid: MODEL_UUID.into(),
        name: name.into(),
        application: name.split('/').next().unwrap_or_default().into(),
        ..Default::default()
    }
    .into()
}

pub fn application(name: &str) -> EntityInfo {
    ApplicationInfo {
        model_uuid: MODEL_UUID.into(),
        name: name.into(),
        ..Default::default()
    }
    .into()
}

/// A consumer's picture of the model, rebuilt from the batches it received.
#[derive(Debug, Default)]
pub struct View {
    pub entities: HashMap<EntityId, EntityInfo>,
}

impl View {
    /// Applies one batch, checking the per-batch and per-stream guarantees.
    pub fn apply(
        &mut self,
        deltas: Vec<Delta>,
    ) {
        let mut in_batch = std::collections::HashSet::new();
        for delta in deltas {
            let id = delta.entity_id();
            assert!(in_batch.insert(id.clone()), "{id} reported twice in one batch");
            if delta.removed {
                assert!(
                    self.entities.remove(&id).is_some(),
                    "removal of {id} which was never reported"
                );
            } else {
                self.entities.insert(id, delta.entity);
            }
        }
    }
}
