// ── Device domain types ──
//
// Thin typed views over the raw device record. Everything except feeder
// bowls is read from the record on demand, so a splice is visible on
// the next access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entity::Record;
use super::enums::{BowlPosition, EntityType, FoodType, LockState};
use super::raw;

/// Reference voltages for turning `status.battery` into a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryProfile {
    /// Per-cell voltage reported as 100 %.
    pub full_voltage: f64,
    /// Per-cell voltage reported as 0 %.
    pub low_voltage: f64,
    /// Cells in series; the raw reading is the pack voltage.
    pub count: u32,
}

impl Default for BatteryProfile {
    fn default() -> Self {
        Self {
            full_voltage: 1.6,
            low_voltage: 1.2,
            count: 4,
        }
    }
}

impl BatteryProfile {
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Percentage for a raw pack reading, truncated and clamped to 0..=100.
    ///
    /// `None` if the profile is degenerate or the result is not finite.
    #[allow(
        clippy::as_conversions,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn percentage(&self, raw_voltage: f64) -> Option<u8> {
        if self.count == 0 || self.full_voltage <= self.low_voltage {
            return None;
        }

        let per_cell = raw_voltage / f64::from(self.count);
        let percent = (per_cell - self.low_voltage) / (self.full_voltage - self.low_voltage) * 100.0;
        if !percent.is_finite() {
            return None;
        }

        Some(percent.trunc().clamp(0.0, 100.0) as u8)
    }
}

// ── Device ───────────────────────────────────────────────────────────

/// Attributes shared by every piece of hardware.
///
/// Also used on its own for repeaters and programmers.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    record: Record,
    battery: BatteryProfile,
}

impl Device {
    pub(crate) fn new(record: Record, battery: BatteryProfile) -> Self {
        Self { record, battery }
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

    pub fn entity_type(&self) -> EntityType {
        self.record.entity_type()
    }

    pub fn name(&self) -> Option<&str> {
        self.record.name()
    }

    pub fn raw(&self) -> &Value {
        self.record.raw()
    }

    pub fn serial(&self) -> Option<String> {
        match self.raw().get("serial_number")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// The hub this device hangs off, if any.
    pub fn parent_id(&self) -> Option<i64> {
        self.raw().get("parent_device_id").and_then(raw::int)
    }

    pub fn online(&self) -> bool {
        self.raw()
            .pointer("/status/online")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Raw pack voltage from `status.battery`.
    pub fn battery_voltage(&self) -> Option<f64> {
        self.raw().pointer("/status/battery").and_then(raw::float)
    }

    pub fn battery_level(&self) -> Option<u8> {
        self.battery_voltage()
            .and_then(|voltage| self.battery.percentage(voltage))
    }

    pub(crate) fn splice(&mut self, key: &str, value: Value) {
        self.record.splice(key, value);
    }
}

// ── Hub ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Hub {
    device: Device,
}

impl Hub {
    pub(crate) fn new(device: Device) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub(crate) fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }

    pub fn online(&self) -> bool {
        self.device.online()
    }

    /// Ear LED brightness mode from `status.led_mode`.
    pub fn led_mode(&self) -> Option<i64> {
        self.device.raw().pointer("/status/led_mode").and_then(raw::int)
    }
}

// ── Flap ─────────────────────────────────────────────────────────────

/// One curfew window as configured on a flap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Curfew {
    /// `HH:MM` in the household's timezone.
    pub lock_time: String,
    pub unlock_time: String,
    pub enabled: bool,
}

impl Curfew {
    fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            lock_time: value.get("lock_time")?.as_str()?.to_owned(),
            unlock_time: value.get("unlock_time")?.as_str()?.to_owned(),
            enabled: value.get("enabled").and_then(Value::as_bool).unwrap_or(false),
        })
    }

    /// Parse `control.curfew`, which is an object on older firmware and
    /// an array of windows on newer.
    pub(crate) fn list_from(value: Option<&Value>) -> Vec<Self> {
        match value {
            Some(Value::Array(items)) => items.iter().filter_map(Self::from_value).collect(),
            Some(object @ Value::Object(_)) => Self::from_value(object).into_iter().collect(),
            _ => Vec::new(),
        }
    }
}

/// Pet flap or cat flap.
#[derive(Debug, Clone, PartialEq)]
pub struct Flap {
    device: Device,
}

impl Flap {
    pub(crate) fn new(device: Device) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub(crate) fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }

    /// `None` if the record has no recognizable `status.locking.mode`.
    pub fn lock_state(&self) -> Option<LockState> {
        self.device
            .raw()
            .pointer("/status/locking/mode")
            .and_then(raw::int)
            .and_then(LockState::from_code)
    }

    pub fn unlocked(&self) -> bool {
        self.lock_state().is_some_and(LockState::is_unlocked)
    }

    pub fn curfew(&self) -> Vec<Curfew> {
        Curfew::list_from(self.device.raw().pointer("/control/curfew"))
    }

    /// Latest movement datapoint spliced in from the household report.
    pub fn last_movement(&self) -> Option<&Value> {
        self.device.raw().get("move")
    }
}

// ── Feeder ───────────────────────────────────────────────────────────

/// One bowl of a feeder, as of the latest feeding event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bowl {
    pub index: usize,
    /// Current weight in grams.
    pub weight: Option<f64>,
    /// Change during the latest feeding event.
    pub change: Option<f64>,
    /// Configured target weight.
    pub target: Option<f64>,
    pub food_type: Option<FoodType>,
    pub position: BowlPosition,
}

/// Microchip feeder (Connect or Lite).
#[derive(Debug, Clone, PartialEq)]
pub struct Feeder {
    device: Device,
    bowls: Vec<Bowl>,
}

impl Feeder {
    pub(crate) fn new(device: Device) -> Self {
        let bowls = build_bowls(device.raw());
        Self { device, bowls }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn bowls(&self) -> &[Bowl] {
        &self.bowls
    }

    pub fn bowl(&self, index: usize) -> Option<&Bowl> {
        self.bowls.iter().find(|bowl| bowl.index == index)
    }

    /// Sum of the known bowl weights; `None` without any.
    pub fn total_weight(&self) -> Option<f64> {
        self.bowls
            .iter()
            .filter_map(|bowl| bowl.weight)
            .reduce(|total, weight| total + weight)
    }

    /// Latest feeding datapoint spliced in from the household report.
    pub fn last_lunch(&self) -> Option<&Value> {
        self.device.raw().get("lunch")
    }

    pub(crate) fn splice(&mut self, key: &str, value: Value) {
        self.device.splice(key, value);
        self.bowls = build_bowls(self.device.raw());
    }
}

/// Bowls come from `lunch.weights`; settings add target and food type.
fn build_bowls(raw_record: &Value) -> Vec<Bowl> {
    let Some(weights) = raw_record.pointer("/lunch/weights").and_then(Value::as_array) else {
        return Vec::new();
    };
    let settings = raw_record
        .pointer("/control/bowls/settings")
        .and_then(Value::as_array);

    weights
        .iter()
        .enumerate()
        .map(|(position, entry)| {
            let index = entry
                .get("index")
                .and_then(raw::int)
                .and_then(|i| usize::try_from(i).ok())
                .unwrap_or(position);
            let setting = settings.and_then(|s| s.get(index));

            Bowl {
                index,
                weight: entry.get("weight").and_then(raw::float),
                change: entry.get("change").and_then(raw::float),
                target: setting.and_then(|s| s.get("target")).and_then(raw::float),
                food_type: setting
                    .and_then(|s| s.get("food_type"))
                    .and_then(raw::int)
                    .map(FoodType::from_code),
                position: BowlPosition::from_index(index),
            }
        })
        .collect()
}

// ── Felaqua ──────────────────────────────────────────────────────────

/// Water station.
#[derive(Debug, Clone, PartialEq)]
pub struct Felaqua {
    device: Device,
}

impl Felaqua {
    pub(crate) fn new(device: Device) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub(crate) fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }

    /// Remaining water in ml: last report weight, else the latest
    /// anonymous drink found on the household timeline.
    pub fn water_remaining(&self) -> Option<f64> {
        self.last_drink_weight("weight")
            .or_else(|| self.latest_drink_field("remaining"))
    }

    /// Change in ml during the latest drink event.
    pub fn water_change(&self) -> Option<f64> {
        self.last_drink_weight("change")
            .or_else(|| self.latest_drink_field("change"))
    }

    /// When the latest anonymous drink event happened.
    pub fn latest_drink_at(&self) -> Option<DateTime<Utc>> {
        self.device
            .raw()
            .pointer("/latest_drink/date")
            .and_then(raw::timestamp)
    }

    fn last_drink_weight(&self, field: &str) -> Option<f64> {
        self.device
            .raw()
            .pointer("/drink/weights")
            .and_then(Value::as_array)
            .and_then(|weights| weights.last())
            .and_then(|last| last.get(field))
            .and_then(raw::float)
    }

    fn latest_drink_field(&self, field: &str) -> Option<f64> {
        self.device
            .raw()
            .get("latest_drink")
            .and_then(|drink| drink.get(field))
            .and_then(raw::float)
    }
}
