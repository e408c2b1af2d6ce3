use std::fmt;

use serde::de;
use serde::de::SeqAccess;
use serde::de::Visitor;
use serde::ser::SerializeTuple;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

use super::*;

const OP_CHANGE: &str = "change";
const OP_REMOVE: &str = "remove";

/// One unit of change information: the latest summary of an entity and
/// whether the entity has been removed.
///
/// On the wire a delta is the triple `[kind, "change" | "remove", entity]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    pub removed: bool,
    pub entity: EntityInfo,
}

impl Delta {
    pub fn change(entity: impl Into<EntityInfo>) -> Self {
        Self {
            removed: false,
            entity: entity.into(),
        }
    }

    pub fn remove(entity: impl Into<EntityInfo>) -> Self {
        Self {
            removed: true,
            entity: entity.into(),
        }
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity.entity_id()
    }
}

impl Serialize for Delta {
    fn serialize<S>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut tuple = serializer.serialize_tuple(3)?;
        tuple.serialize_element(self.entity.kind().name())?;
        tuple.serialize_element(if self.removed { OP_REMOVE } else { OP_CHANGE })?;
        match &self.entity {
            EntityInfo::Machine(info) => tuple.serialize_element(info)?,
            EntityInfo::Unit(info) => tuple.serialize_element(info)?,
            EntityInfo::Application(info) => tuple.serialize_element(info)?,
            EntityInfo::Relation(info) => tuple.serialize_element(info)?,
            EntityInfo::Annotation(info) => tuple.serialize_element(info)?,
            EntityInfo::Status(info) => tuple.serialize_element(info)?,
            EntityInfo::Constraints(info) => tuple.serialize_element(info)?,
            EntityInfo::Settings(info) => tuple.serialize_element(info)?,
            EntityInfo::OpenPorts(info) => tuple.serialize_element(info)?,
            EntityInfo::Action(info) => tuple.serialize_element(info)?,
            EntityInfo::Block(info) => tuple.serialize_element(info)?,
        }
        tuple.end()
    }
}

struct DeltaVisitor;

impl<'de> Visitor<'de> for DeltaVisitor {
    type Value = Delta;

    fn expecting(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.write_str("a [kind, operation, entity] triple")
    }

    fn visit_seq<A>(
        self,
        mut seq: A,
    ) -> Result<Delta, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let kind: String = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let op: String = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(1, &self))?;

        let removed = match op.as_str() {
            OP_CHANGE => false,
            OP_REMOVE => true,
            other => return Err(de::Error::unknown_variant(other, &[OP_CHANGE, OP_REMOVE])),
        };
        let kind = EntityKind::from_name(&kind)
            .ok_or_else(|| de::Error::custom(format!("unknown entity kind {kind:?}")))?;

        let entity = match kind {
            EntityKind::Machine => seq.next_element::<MachineInfo>()?.map(EntityInfo::from),
            EntityKind::Unit => seq.next_element::<UnitInfo>()?.map(EntityInfo::from),
            EntityKind::Application => seq.next_element::<ApplicationInfo>()?.map(EntityInfo::from),
            EntityKind::Relation => seq.next_element::<RelationInfo>()?.map(EntityInfo::from),
            EntityKind::Annotation => seq.next_element::<AnnotationInfo>()?.map(EntityInfo::from),
            EntityKind::Status => seq.next_element::<StatusDocInfo>()?.map(EntityInfo::from),
            EntityKind::Constraints => seq.next_element::<ConstraintsInfo>()?.map(EntityInfo::from),
            EntityKind::Settings => seq.next_element::<SettingsInfo>()?.map(EntityInfo::from),
            EntityKind::OpenPorts => seq.next_element::<OpenPortsInfo>()?.map(EntityInfo::from),
            EntityKind::Action => seq.next_element::<ActionInfo>()?.map(EntityInfo::from),
            EntityKind::Block => seq.next_element::<BlockInfo>()?.map(EntityInfo::from),
        }
        .ok_or_else(|| de::Error::invalid_length(2, &self))?;

        Ok(Delta { removed, entity })
    }
}

impl<'de> Deserialize<'de> for Delta {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_tuple(3, DeltaVisitor)
    }
}
