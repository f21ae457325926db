// ── Pet domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entity::Record;
use super::enums::{FoodType, Location};
use super::raw;

/// Where a pet was seen and since when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetPosition {
    pub location: Location,
    pub since: Option<DateTime<Utc>>,
    /// Flap that reported the movement, for activity snapshots.
    pub device_id: Option<i64>,
}

/// Latest feeding or drinking event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumption {
    /// Per-bowl change for feeding, a single entry for drinking.
    pub change: Vec<f64>,
    pub at: Option<DateTime<Utc>>,
    pub device_id: Option<i64>,
}

/// A pet registered in a household.
#[derive(Debug, Clone, PartialEq)]
pub struct Pet {
    record: Record,
}

impl Pet {
    pub(crate) fn new(record: Record) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn id(&self) -> i64 {
        self.record.id()
    }

    pub fn household_id(&self) -> i64 {
        self.record.household_id()
    }

    pub fn name(&self) -> &str {
        self.record.name().unwrap_or("Unnamed")
    }

    pub fn raw(&self) -> &Value {
        self.record.raw()
    }

    /// Microchip/collar tag assigned to the pet.
    pub fn tag_id(&self) -> Option<i64> {
        self.raw().get("tag_id").and_then(raw::int)
    }

    pub fn food_type(&self) -> Option<FoodType> {
        self.raw()
            .get("food_type_id")
            .and_then(raw::int)
            .map(FoodType::from_code)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.raw().get("updated_at").and_then(raw::timestamp)
    }

    pub fn photo_url(&self) -> Option<&str> {
        self.raw()
            .pointer("/photo/location")
            .and_then(Value::as_str)
    }

    /// Position as last set by a flap or by hand.
    pub fn position(&self) -> Option<PetPosition> {
        raw::section(self.raw(), "/position").map(read_position)
    }

    /// Last flap passage.
    pub fn activity(&self) -> Option<PetPosition> {
        raw::section(self.raw(), "/status/activity").map(read_position)
    }

    pub fn feeding(&self) -> Option<Consumption> {
        raw::section(self.raw(), "/status/feeding").map(read_consumption)
    }

    pub fn drinking(&self) -> Option<Consumption> {
        raw::section(self.raw(), "/status/drinking").map(read_consumption)
    }

    /// `Unknown` when no position has been recorded.
    pub fn location(&self) -> Location {
        self.position()
            .map_or(Location::Unknown, |position| position.location)
    }

    pub fn at_home(&self) -> bool {
        self.location() == Location::Inside
    }

    pub fn last_lunch(&self) -> Option<DateTime<Utc>> {
        self.feeding().and_then(|feeding| feeding.at)
    }

    pub fn last_drink(&self) -> Option<DateTime<Utc>> {
        self.drinking().and_then(|drinking| drinking.at)
    }

    pub(crate) fn splice(&mut self, key: &str, value: Value) {
        self.record.splice(key, value);
    }
}

fn read_position(section: &Value) -> PetPosition {
    PetPosition {
        location: section
            .get("where")
            .and_then(raw::int)
            .map_or(Location::Unknown, Location::from_code),
        // `since` on positions, `at` on some activity payloads.
        since: section
            .get("since")
            .or_else(|| section.get("at"))
            .and_then(raw::timestamp),
        device_id: section.get("device_id").and_then(raw::int),
    }
}

fn read_consumption(section: &Value) -> Consumption {
    let change = match section.get("change") {
        Some(Value::Array(items)) => items.iter().filter_map(raw::float).collect(),
        Some(single) => raw::float(single).into_iter().collect(),
        None => Vec::new(),
    };
    Consumption {
        change,
        at: section.get("at").and_then(raw::timestamp),
        device_id: section.get("device_id").and_then(raw::int),
    }
}
