// ── Entity identity and the closed entity enum ──

use serde_json::Value;

use super::device::{Device, Feeder, Felaqua, Flap, Hub};
use super::enums::EntityType;
use super::pet::Pet;

/// Identity shared by every entity plus the raw record it came from.
///
/// Derived attributes are never cached here; the typed wrappers read
/// them from `raw` on each access.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: i64,
    household_id: i64,
    entity_type: EntityType,
    raw: Value,
}

impl Record {
    pub(crate) fn new(id: i64, household_id: i64, entity_type: EntityType, raw: Value) -> Self {
        Self {
            id,
            household_id,
            entity_type,
            raw,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn household_id(&self) -> i64 {
        self.household_id
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Display name as stored by the vendor, if non-empty.
    pub fn name(&self) -> Option<&str> {
        self.raw
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
    }

    /// `{household_id}-{id}`, stable across refreshes.
    pub fn unique_id(&self) -> String {
        format!("{}-{}", self.household_id, self.id)
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub(crate) fn splice(&mut self, key: &str, value: Value) {
        if let Value::Object(fields) = &mut self.raw {
            fields.insert(key.to_owned(), value);
        }
    }
}

/// Every kind of entity the API reports.
///
/// Repeaters and programmers have no specific behaviour and share the
/// generic [`Device`] arm.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Hub(Hub),
    Device(Device),
    Flap(Flap),
    Feeder(Feeder),
    Felaqua(Felaqua),
    Pet(Pet),
}

impl Entity {
    pub fn record(&self) -> &Record {
        match self {
            Self::Hub(hub) => hub.device().record(),
            Self::Device(device) => device.record(),
            Self::Flap(flap) => flap.device().record(),
            Self::Feeder(feeder) => feeder.device().record(),
            Self::Felaqua(felaqua) => felaqua.device().record(),
            Self::Pet(pet) => pet.record(),
        }
    }

    pub fn id(&self) -> i64 {
        self.record().id()
    }

    pub fn household_id(&self) -> i64 {
        self.record().household_id()
    }

    pub fn entity_type(&self) -> EntityType {
        self.record().entity_type()
    }

    /// Pets fall back to "Unnamed"; devices may have no name.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Pet(pet) => Some(pet.name()),
            other => other.record().name(),
        }
    }

    pub fn raw(&self) -> &Value {
        self.record().raw()
    }

    pub fn is_device(&self) -> bool {
        !matches!(self, Self::Pet(_))
    }

    /// The device part of any non-pet entity.
    pub fn as_device(&self) -> Option<&Device> {
        match self {
            Self::Hub(hub) => Some(hub.device()),
            Self::Device(device) => Some(device),
            Self::Flap(flap) => Some(flap.device()),
            Self::Feeder(feeder) => Some(feeder.device()),
            Self::Felaqua(felaqua) => Some(felaqua.device()),
            Self::Pet(_) => None,
        }
    }

    pub fn as_hub(&self) -> Option<&Hub> {
        match self {
            Self::Hub(hub) => Some(hub),
            _ => None,
        }
    }

    pub fn as_flap(&self) -> Option<&Flap> {
        match self {
            Self::Flap(flap) => Some(flap),
            _ => None,
        }
    }

    pub fn as_feeder(&self) -> Option<&Feeder> {
        match self {
            Self::Feeder(feeder) => Some(feeder),
            _ => None,
        }
    }

    pub fn as_felaqua(&self) -> Option<&Felaqua> {
        match self {
            Self::Felaqua(felaqua) => Some(felaqua),
            _ => None,
        }
    }

    pub fn as_pet(&self) -> Option<&Pet> {
        match self {
            Self::Pet(pet) => Some(pet),
            _ => None,
        }
    }

    /// Write `key` into the raw record, replacing any previous value.
    ///
    /// Feeders rebuild their bowls afterwards.
    pub fn splice(&mut self, key: &str, value: Value) {
        match self {
            Self::Hub(hub) => hub.device_mut().splice(key, value),
            Self::Device(device) => device.splice(key, value),
            Self::Flap(flap) => flap.device_mut().splice(key, value),
            Self::Feeder(feeder) => feeder.splice(key, value),
            Self::Felaqua(felaqua) => felaqua.device_mut().splice(key, value),
            Self::Pet(pet) => pet.splice(key, value),
        }
    }
}
