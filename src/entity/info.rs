//! Per-kind entity summaries.
//!
//! Each summary carries the key fields its [`EntityId`] is derived from plus
//! the document fields consumers care about. Contents are opaque to the
//! aggregator beyond identity and equality.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use super::EntityId;
use super::EntityKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Life {
    #[default]
    Alive,
    Dying,
    Dead,
}

/// Status value as recorded in the backing store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StatusInfo {
    pub current: String,
    pub message: String,
    pub since_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl StatusInfo {
    pub fn new(
        current: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            current: current.into(),
            message: message.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Address {
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub scope: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HardwareCharacteristics {
    pub arch: Option<String>,
    pub mem: Option<u64>,
    pub root_disk: Option<u64>,
    pub cpu_cores: Option<u64>,
    pub cpu_power: Option<u64>,
    pub tags: Option<Vec<String>>,
    pub availability_zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Constraints {
    pub arch: Option<String>,
    pub container: Option<String>,
    pub cpu_cores: Option<u64>,
    pub cpu_power: Option<u64>,
    pub mem: Option<u64>,
    pub root_disk: Option<u64>,
    pub tags: Option<Vec<String>>,
    pub instance_type: Option<String>,
    pub spaces: Option<Vec<String>>,
    pub zones: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineJob {
    #[serde(rename = "JobHostUnits")]
    HostUnits,
    #[serde(rename = "JobManageModel")]
    ManageModel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Port {
    pub protocol: String,
    pub number: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CharmRelation {
    pub name: String,
    pub role: String,
    pub interface: String,
    pub optional: bool,
    pub limit: u32,
    pub scope: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Endpoint {
    pub application_name: String,
    pub relation: CharmRelation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MachineInfo {
    pub model_uuid: String,
    pub id: String,
    pub instance_id: String,
    pub agent_status: StatusInfo,
    pub instance_status: StatusInfo,
    pub life: Life,
    pub series: String,
    pub supported_containers: Vec<String>,
    pub supported_containers_known: bool,
    pub hardware_characteristics: Option<HardwareCharacteristics>,
    pub jobs: Vec<MachineJob>,
    pub addresses: Vec<Address>,
    pub has_vote: bool,
    pub wants_vote: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnitInfo {
    pub model_uuid: String,
    pub name: String,
    pub application: String,
    pub series: String,
    pub charm_url: String,
    pub public_address: String,
    pub private_address: String,
    pub machine_id: String,
    pub ports: Vec<Port>,
    pub subordinate: bool,
    pub workload_status: StatusInfo,
    pub agent_status: StatusInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApplicationInfo {
    pub model_uuid: String,
    pub name: String,
    pub exposed: bool,
    pub charm_url: String,
    pub owner_tag: String,
    pub life: Life,
    pub min_units: u32,
    pub constraints: Constraints,
    pub config: BTreeMap<String, String>,
    pub subordinate: bool,
    pub status: StatusInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RelationInfo {
    pub model_uuid: String,
    pub key: String,
    pub id: i64,
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnnotationInfo {
    pub model_uuid: String,
    pub tag: String,
    pub annotations: BTreeMap<String, String>,
}

/// Status document keyed by the global key of the entity it describes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StatusDocInfo {
    pub model_uuid: String,
    pub global_key: String,
    pub status: StatusInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConstraintsInfo {
    pub model_uuid: String,
    pub global_key: String,
    pub constraints: Constraints,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SettingsInfo {
    pub model_uuid: String,
    pub key: String,
    pub settings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OpenPortsInfo {
    pub model_uuid: String,
    pub machine_id: String,
    pub network: String,
    pub ports: Vec<Port>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ActionInfo {
    pub model_uuid: String,
    pub id: String,
    pub receiver: String,
    pub name: String,
    pub parameters: BTreeMap<String, String>,
    pub status: String,
    pub message: String,
    pub results: BTreeMap<String, String>,
    pub enqueued_ms: u64,
    pub started_ms: Option<u64>,
    pub completed_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    #[default]
    BlockDestroy,
    BlockRemove,
    BlockChange,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BlockInfo {
    pub model_uuid: String,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub message: String,
    pub tag: String,
}

/// One observed entity, closed over every kind the aggregator tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityInfo {
    Machine(MachineInfo),
    Unit(UnitInfo),
    Application(ApplicationInfo),
    Relation(RelationInfo),
    Annotation(AnnotationInfo),
    Status(StatusDocInfo),
    Constraints(ConstraintsInfo),
    Settings(SettingsInfo),
    OpenPorts(OpenPortsInfo),
    Action(ActionInfo),
    Block(BlockInfo),
}

impl EntityInfo {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityInfo::Machine(_) => EntityKind::Machine,
            EntityInfo::Unit(_) => EntityKind::Unit,
            EntityInfo::Application(_) => EntityKind::Application,
            EntityInfo::Relation(_) => EntityKind::Relation,
            EntityInfo::Annotation(_) => EntityKind::Annotation,
            EntityInfo::Status(_) => EntityKind::Status,
            EntityInfo::Constraints(_) => EntityKind::Constraints,
            EntityInfo::Settings(_) => EntityKind::Settings,
            EntityInfo::OpenPorts(_) => EntityKind::OpenPorts,
            EntityInfo::Action(_) => EntityKind::Action,
            EntityInfo::Block(_) => EntityKind::Block,
        }
    }

    /// Derives the identity of this summary from its key fields.
    pub fn entity_id(&self) -> EntityId {
        let (model_uuid, id) = match self {
            EntityInfo::Machine(m) => (&m.model_uuid, m.id.clone()),
            EntityInfo::Unit(u) => (&u.model_uuid, u.name.clone()),
            EntityInfo::Application(a) => (&a.model_uuid, a.name.clone()),
            EntityInfo::Relation(r) => (&r.model_uuid, r.key.clone()),
            EntityInfo::Annotation(a) => (&a.model_uuid, a.tag.clone()),
            EntityInfo::Status(s) => (&s.model_uuid, s.global_key.clone()),
            EntityInfo::Constraints(c) => (&c.model_uuid, c.global_key.clone()),
            EntityInfo::Settings(s) => (&s.model_uuid, s.key.clone()),
            EntityInfo::OpenPorts(p) => (&p.model_uuid, format!("{}:{}", p.machine_id, p.network)),
            EntityInfo::Action(a) => (&a.model_uuid, a.id.clone()),
            EntityInfo::Block(b) => (&b.model_uuid, b.id.clone()),
        };
        EntityId::new(self.kind(), model_uuid.clone(), id)
    }
}

macro_rules! impl_from_info {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        $(
            impl From<$ty> for EntityInfo {
                fn from(info: $ty) -> Self {
                    EntityInfo::$variant(info)
                }
            }
        )+
    };
}

impl_from_info!(
    Machine(MachineInfo),
    Unit(UnitInfo),
    Application(ApplicationInfo),
    Relation(RelationInfo),
    Annotation(AnnotationInfo),
    Status(StatusDocInfo),
    Constraints(ConstraintsInfo),
    Settings(SettingsInfo),
    OpenPorts(OpenPortsInfo),
    Action(ActionInfo),
    Block(BlockInfo),
);
