//! Domain layer between `surepet-api` and consumers.
//!
//! - **[`SurePetcare`]**: Cloneable facade. [`refresh()`](SurePetcare::refresh)
//!   fetches `/me/start`, materializes typed entities, splices in the
//!   latest report and timeline activity, and replaces the store. Typed
//!   accessors refresh first; `*_snapshot()` variants read the store only.
//!   Control commands verify the server's echo and fail loudly when the
//!   hardware did not take the requested state.
//!
//! - **[`EntityStore`]**: `DashMap`-backed id → entity map with a
//!   `tokio::sync::watch` version counter.
//!
//! - **Domain model** ([`model`]): [`Entity`] is a closed enum over hubs,
//!   flaps, feeders, water stations, other devices and pets. Each keeps its
//!   raw record; derived values (battery level, lock state, bowls) are read
//!   on access.

pub mod config;
pub mod controller;
pub mod convert;
pub mod error;
pub mod model;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{AuthCredentials, DEFAULT_TIMELINE_ENTRIES, PetcareConfig};
pub use controller::{SurePetcare, TIMELINE_PAGE_SIZE};
pub use error::CoreError;
pub use store::EntityStore;

pub use model::{
    Attributes, BatteryProfile, Bowl, BowlPosition, Consumption, Curfew, Device, Entity,
    EntityType, Feeder, Felaqua, Flap, FoodType, Hub, LockState, Location, Pet, PetPosition,
    Record,
};
