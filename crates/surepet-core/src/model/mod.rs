// ── Domain model ──
//
// Typed views over Sure Petcare device and pet records. Each entity
// keeps the raw JSON it was built from; derived attributes are read
// from it on access.

pub mod attributes;
pub mod device;
pub mod entity;
pub mod enums;
pub mod pet;

pub(crate) mod raw;

// ── Re-exports ──────────────────────────────────────────────────────

pub use attributes::Attributes;
pub use device::{BatteryProfile, Bowl, Curfew, Device, Feeder, Felaqua, Flap, Hub};
pub use entity::{Entity, Record};
pub use enums::{BowlPosition, EntityType, FoodType, LockState, Location};
pub use pet::{Consumption, Pet, PetPosition};
