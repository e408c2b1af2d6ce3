use tracing_subscriber::EnvFilter;

use crate::ApplicationInfo;
use crate::EntityId;
use crate::EntityInfo;
use crate::EntityKind;
use crate::MachineInfo;
use crate::StatusInfo;
use crate::UnitInfo;

pub const TEST_MODEL_UUID: &str = "deadbeef-0bad-400d-8000-4b1d0d06f00d";

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

pub fn machine(id: &str) -> EntityInfo {
    MachineInfo {
        model_uuid: TEST_MODEL_UUID.into(),
        id: id.into(),
        ..Default::default()
    }
    .into()
}

pub fn machine_with_instance(
    id: &str,
    instance_id: &str,
) -> EntityInfo {
    MachineInfo {
        model_uuid: TEST_MODEL_UUID.into(),
        id: id.into(),
        instance_id: instance_id.into(),
        ..Default::default()
    }
    .into()
}

pub fn unit(name: &str) -> EntityInfo {
    let application = name.split('/').next().unwrap_or_default();
    UnitInfo {
        model_uuid: TEST_MODEL_UUID.into(),
        name: name.into(),
        application: application.into(),
        ..Default::default()
    }
    .into()
}

pub fn unit_with_status(
    name: &str,
    status: &str,
) -> EntityInfo {
    let EntityInfo::Unit(mut info) = unit(name) else {
        unreachable!()
    };
    info.workload_status = StatusInfo::new(status, "");
    info.into()
}

pub fn application(name: &str) -> EntityInfo {
    ApplicationInfo {
        model_uuid: TEST_MODEL_UUID.into(),
        name: name.into(),
        ..Default::default()
    }
    .into()
}

pub fn machine_id(id: &str) -> EntityId {
    EntityId::new(EntityKind::Machine, TEST_MODEL_UUID, id)
}

pub fn unit_id(name: &str) -> EntityId {
    EntityId::new(EntityKind::Unit, TEST_MODEL_UUID, name)
}
