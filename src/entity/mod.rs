//! Observed entities and the deltas that describe their changes.
//!
//! An entity is anything the aggregator reports on: machines, units,
//! applications, relations and the documents that decorate them. The set of
//! kinds is closed; [`EntityInfo`] is the sum type over all of them and
//! [`EntityId`] is the identity derived from each summary's key fields.

mod delta;
mod info;

pub use delta::*;
pub use info::*;


use std::fmt;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Machine,
    Unit,
    Application,
    Relation,
    Annotation,
    Status,
    Constraints,
    Settings,
    OpenPorts,
    Action,
    Block,
}

impl EntityKind {
    pub const ALL: [EntityKind; 11] = [
        EntityKind::Machine,
        EntityKind::Unit,
        EntityKind::Application,
        EntityKind::Relation,
        EntityKind::Annotation,
        EntityKind::Status,
        EntityKind::Constraints,
        EntityKind::Settings,
        EntityKind::OpenPorts,
        EntityKind::Action,
        EntityKind::Block,
    ];

    /// Name used for this kind on the wire.
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Machine => "machine",
            EntityKind::Unit => "unit",
            EntityKind::Application => "application",
            EntityKind::Relation => "relation",
            EntityKind::Annotation => "annotation",
            EntityKind::Status => "status",
            EntityKind::Constraints => "constraints",
            EntityKind::Settings => "settings",
            EntityKind::OpenPorts => "open-ports",
            EntityKind::Action => "action",
            EntityKind::Block => "block",
        }
    }

    /// Backing collection the documents of this kind live in.
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Machine => "machines",
            EntityKind::Unit => "units",
            EntityKind::Application => "applications",
            EntityKind::Relation => "relations",
            EntityKind::Annotation => "annotations",
            EntityKind::Status => "statuses",
            EntityKind::Constraints => "constraints",
            EntityKind::Settings => "settings",
            EntityKind::OpenPorts => "openedPorts",
            EntityKind::Action => "actions",
            EntityKind::Block => "blocks",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn from_collection(collection: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.collection() == collection)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stable identity of one observed entity, independent of its content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EntityId {
    pub kind: EntityKind,
    pub model_uuid: String,
    pub id: String,
}

impl EntityId {
    pub fn new(
        kind: EntityKind,
        model_uuid: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            model_uuid: model_uuid.into(),
            id: id.into(),
        }
    }

    pub fn collection(&self) -> &'static str {
        self.kind.collection()
    }
}

impl fmt::Display for EntityId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}/{}:{}", self.kind, self.model_uuid, self.id)
    }
}
