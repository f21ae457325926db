// ── SurePetcare facade ──
//
// Composes the dispatcher, the materializer and the entity store into
// the operations a caller needs: household refresh, typed accessors,
// activity reads and verified control commands. All protocol handling
// lives in `SureClient`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use surepet_api::{Envelope, SureClient, TokenSource, TransportConfig};

use crate::config::PetcareConfig;
use crate::convert;
use crate::error::CoreError;
use crate::model::raw;
use crate::model::{Attributes, Curfew, Entity, EntityType, LockState, Location, Pet};
use crate::store::EntityStore;

/// The household timeline endpoint never returns more than this per page.
pub const TIMELINE_PAGE_SIZE: usize = 25;

/// Entry point for consumers.
///
/// Cheaply cloneable; clones share the client, its caches and the
/// entity store.
#[derive(Clone)]
pub struct SurePetcare {
    inner: Arc<Inner>,
}

struct Inner {
    config: PetcareConfig,
    client: SureClient,
    store: EntityStore,
}

impl SurePetcare {
    /// Create a facade with its own connection pool. Nothing is fetched
    /// until the first call.
    pub fn new(config: PetcareConfig) -> Result<Self, CoreError> {
        let client = Self::build_client(&config, None)?;
        Ok(Self::from_client(config, client))
    }

    /// Create a facade on a caller-owned `reqwest::Client`.
    pub fn with_client(config: PetcareConfig, http: reqwest::Client) -> Result<Self, CoreError> {
        let client = Self::build_client(&config, Some(http))?;
        Ok(Self::from_client(config, client))
    }

    /// Create a facade that first tries a token discovered by `source`.
    ///
    /// A token in `config.auth` still takes precedence.
    pub fn with_token_source(
        config: PetcareConfig,
        source: &dyn TokenSource,
    ) -> Result<Self, CoreError> {
        let client = Self::build_client(&config, None)?.with_token_source(source);
        Ok(Self::from_client(config, client))
    }

    /// Wrap an already configured client.
    pub fn from_client(config: PetcareConfig, client: SureClient) -> Self {
        let client = match config.auth.token() {
            Some(token) => client.with_token(token.clone()),
            None => client,
        };
        Self {
            inner: Arc::new(Inner {
                config,
                client,
                store: EntityStore::new(),
            }),
        }
    }

    fn build_client(
        config: &PetcareConfig,
        http: Option<reqwest::Client>,
    ) -> Result<SureClient, CoreError> {
        let base_url = config.resolved_base_url()?;
        let login = config.auth.login();
        let client = match http {
            Some(http) => SureClient::with_client(http, base_url, login).with_timeout(config.timeout),
            None => {
                let transport = TransportConfig::default().with_timeout(config.timeout);
                SureClient::new(base_url, login, &transport)?
            }
        };
        Ok(client)
    }

    pub fn config(&self) -> &PetcareConfig {
        &self.inner.config
    }

    /// The underlying dispatcher, for endpoints without a typed wrapper.
    pub fn client(&self) -> &SureClient {
        &self.inner.client
    }

    pub fn store(&self) -> &EntityStore {
        &self.inner.store
    }

    /// Log in now instead of on the first request.
    pub async fn authenticate(&self) -> Result<(), CoreError> {
        self.inner.client.authenticate().await?;
        Ok(())
    }

    // ── Household refresh ────────────────────────────────────────

    /// Fetch `/me/start`, enrich device records with the latest report
    /// and timeline activity, and replace the store contents.
    ///
    /// Returns the number of entities produced, or `None` when `/me/start`
    /// failed softly. The store is left untouched in that case, so
    /// snapshots still show the previous cycle.
    pub async fn refresh(&self) -> Result<Option<usize>, CoreError> {
        let client = &self.inner.client;

        let Some(start) = client.me_start().await? else {
            warn!("household snapshot unavailable, no entities produced");
            return Ok(None);
        };

        let data = start.get("data");
        let records = ["devices", "pets"]
            .into_iter()
            .filter_map(|key| data.and_then(|d| d.get(key)).and_then(Value::as_array))
            .flatten();
        let mut entities = convert::materialize(records, self.inner.config.battery);

        let households: BTreeSet<i64> = entities.values().map(Entity::household_id).collect();
        let felaqua_households: BTreeSet<i64> = entities
            .values()
            .filter(|e| e.entity_type() == EntityType::Felaqua)
            .map(Entity::household_id)
            .collect();

        for household_id in households {
            let Some(report) = client.report(household_id, None).await? else {
                continue;
            };
            let splices = convert::report_splices(&report, |id| {
                entities.get(&id).map(Entity::entity_type)
            });
            for splice in splices {
                if let Some(entity) = entities.get_mut(&splice.device_id) {
                    entity.splice(splice.key, splice.value);
                }
            }
        }

        for household_id in felaqua_households {
            let timeline = self
                .household_timeline(household_id, self.inner.config.timeline_entries)
                .await?;
            if let Some((device_id, drink)) = convert::anonymous_drink(&timeline) {
                if let Some(entity) = entities.get_mut(&device_id) {
                    entity.splice("latest_drink", drink);
                }
            }
        }

        let count = entities.len();
        self.inner.store.replace_all(entities);
        debug!(count, "entities refreshed");
        Ok(Some(count))
    }

    // ── Typed accessors ──────────────────────────────────────────

    // A soft failure on `/me/start` yields empty results for that call.

    pub async fn entities(&self) -> Result<Vec<Arc<Entity>>, CoreError> {
        Ok(match self.refresh().await? {
            Some(_) => self.entities_snapshot(),
            None => Vec::new(),
        })
    }

    pub async fn devices(&self) -> Result<Vec<Arc<Entity>>, CoreError> {
        Ok(match self.refresh().await? {
            Some(_) => self.devices_snapshot(),
            None => Vec::new(),
        })
    }

    pub async fn device(&self, id: i64) -> Result<Arc<Entity>, CoreError> {
        match self.refresh().await? {
            Some(_) => self.device_snapshot(id),
            None => Err(CoreError::DeviceNotFound { id }),
        }
    }

    pub async fn pets(&self) -> Result<Vec<Pet>, CoreError> {
        Ok(match self.refresh().await? {
            Some(_) => self.pets_snapshot(),
            None => Vec::new(),
        })
    }

    pub async fn pet(&self, id: i64) -> Result<Pet, CoreError> {
        match self.refresh().await? {
            Some(_) => self.pet_snapshot(id),
            None => Err(CoreError::PetNotFound { id }),
        }
    }

    // ── Snapshot accessors (no network) ──────────────────────────

    pub fn entities_snapshot(&self) -> Vec<Arc<Entity>> {
        self.inner.store.snapshot()
    }

    pub fn devices_snapshot(&self) -> Vec<Arc<Entity>> {
        self.inner
            .store
            .snapshot()
            .into_iter()
            .filter(|e| e.is_device())
            .collect()
    }

    pub fn device_snapshot(&self, id: i64) -> Result<Arc<Entity>, CoreError> {
        self.inner
            .store
            .get(id)
            .filter(|e| e.is_device())
            .ok_or(CoreError::DeviceNotFound { id })
    }

    pub fn pets_snapshot(&self) -> Vec<Pet> {
        self.inner
            .store
            .snapshot()
            .iter()
            .filter_map(|e| e.as_pet().cloned())
            .collect()
    }

    pub fn pet_snapshot(&self, id: i64) -> Result<Pet, CoreError> {
        self.inner
            .store
            .get(id)
            .and_then(|e| e.as_pet().cloned())
            .ok_or(CoreError::PetNotFound { id })
    }

    // ── Reads ────────────────────────────────────────────────────

    /// `data` of the household report, or of one pet's report.
    pub async fn report(
        &self,
        household_id: i64,
        pet_id: Option<i64>,
    ) -> Result<Option<Value>, CoreError> {
        Ok(data_of(self.inner.client.report(household_id, pet_id).await?))
    }

    pub async fn pet_aggregate_report(
        &self,
        household_id: i64,
        pet_id: i64,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Option<Value>, CoreError> {
        let envelope = self
            .inner
            .client
            .pet_aggregate_report(household_id, pet_id, range)
            .await?;
        Ok(data_of(envelope))
    }

    pub async fn timeline(&self) -> Result<Option<Value>, CoreError> {
        Ok(data_of(self.inner.client.timeline().await?))
    }

    pub async fn notification(&self) -> Result<Option<Value>, CoreError> {
        Ok(data_of(self.inner.client.notification().await?))
    }

    /// Pets with photo, breed, conditions, tag, food type, species,
    /// position and status expanded.
    pub async fn pets_details(&self) -> Result<Vec<Value>, CoreError> {
        let data = data_of(self.inner.client.pets().await?);
        Ok(match data {
            Some(Value::Array(pets)) => pets,
            _ => Vec::new(),
        })
    }

    /// Breed, species and condition lookup tables.
    pub async fn attributes(&self) -> Result<Option<Attributes>, CoreError> {
        let data = data_of(self.inner.client.start_attributes().await?);
        Ok(data.as_ref().map(Attributes::from_data))
    }

    /// Up to `entries` of the newest household timeline events (rounded
    /// up to whole pages). Pages that fail softly are skipped.
    pub async fn household_timeline(
        &self,
        household_id: i64,
        entries: usize,
    ) -> Result<Vec<Value>, CoreError> {
        let pages = u32::try_from(entries.div_ceil(TIMELINE_PAGE_SIZE)).map_err(|_| {
            CoreError::ValidationFailed {
                message: format!("cannot fetch {entries} timeline entries"),
            }
        })?;

        let mut timeline = Vec::new();
        for page in 1..=pages {
            let envelope = self
                .inner
                .client
                .household_timeline(household_id, page)
                .await?;
            if let Some(Value::Array(events)) = data_of(envelope) {
                timeline.extend(events);
            }
        }
        Ok(timeline)
    }

    /// Fetch the household report and splice the latest datapoint of each
    /// pet/device pair into the stored device.
    ///
    /// Returns the spliced datapoint keyed by pet id.
    pub async fn latest_actions(&self, household_id: i64) -> Result<BTreeMap<i64, Value>, CoreError> {
        let Some(report) = self.inner.client.report(household_id, None).await? else {
            return Ok(BTreeMap::new());
        };

        let store = &self.inner.store;
        let splices =
            convert::report_splices(&report, |id| store.get(id).map(|e| e.entity_type()));

        let mut latest = BTreeMap::new();
        for splice in splices {
            let value = splice.value.clone();
            store.update(splice.device_id, |entity| {
                entity.splice(splice.key, splice.value);
            });
            latest.insert(splice.pet_id, value);
        }
        Ok(latest)
    }

    /// Scan the household timeline for the newest water-station event
    /// and attach it to that station as `latest_drink`.
    pub async fn latest_anonymous_drink(&self, household_id: i64) -> Result<Option<Value>, CoreError> {
        let timeline = self
            .household_timeline(household_id, self.inner.config.timeline_entries)
            .await?;
        let Some((device_id, drink)) = convert::anonymous_drink(&timeline) else {
            return Ok(None);
        };

        let stored = drink.clone();
        self.inner.store.update(device_id, |entity| {
            entity.splice("latest_drink", stored);
        });
        Ok(Some(drink))
    }

    // ── Commands ─────────────────────────────────────────────────

    pub async fn lock(&self, device_id: i64) -> Result<Arc<Value>, CoreError> {
        self.set_lock_state(device_id, LockState::LockedAll).await
    }

    pub async fn lock_in(&self, device_id: i64) -> Result<Arc<Value>, CoreError> {
        self.set_lock_state(device_id, LockState::LockedIn).await
    }

    pub async fn lock_out(&self, device_id: i64) -> Result<Arc<Value>, CoreError> {
        self.set_lock_state(device_id, LockState::LockedOut).await
    }

    pub async fn unlock(&self, device_id: i64) -> Result<Arc<Value>, CoreError> {
        self.set_lock_state(device_id, LockState::Unlocked).await
    }

    /// Set a flap's locking mode and verify the server's echo.
    ///
    /// Curfew states cannot be requested directly.
    pub async fn set_lock_state(
        &self,
        device_id: i64,
        state: LockState,
    ) -> Result<Arc<Value>, CoreError> {
        if !state.is_settable() {
            return Err(CoreError::ValidationFailed {
                message: format!("lock state {state} cannot be set directly"),
            });
        }

        info!(device_id, %state, "setting lock state");
        let response = self
            .inner
            .client
            .set_lock_state(device_id, state.code())
            .await?;

        let echo = echoed(response.as_deref(), "locking");
        let reported = echo.as_ref().and_then(raw::int);
        match response {
            Some(body) if reported == Some(state.code()) => Ok(body),
            _ => Err(not_confirmed(
                "lock",
                device_id,
                state.to_string(),
                reported.and_then(LockState::from_code).map_or_else(
                    || describe(echo.as_ref()),
                    |state| state.to_string(),
                ),
            )),
        }
    }

    /// Mark a pet as inside or outside as of now.
    pub async fn set_pet_location(
        &self,
        pet_id: i64,
        location: Location,
    ) -> Result<Arc<Value>, CoreError> {
        if !matches!(location, Location::Inside | Location::Outside) {
            return Err(CoreError::ValidationFailed {
                message: format!("unknown location: {location}"),
            });
        }

        info!(pet_id, %location, "setting pet location");
        let response = self
            .inner
            .client
            .set_pet_position(pet_id, location.code(), Utc::now())
            .await?;

        let echo = echoed(response.as_deref(), "where");
        let reported = echo.as_ref().and_then(raw::int);
        match response {
            Some(body) if reported == Some(location.code()) => Ok(body),
            _ => Err(not_confirmed(
                "set position",
                pet_id,
                location.to_string(),
                reported.map_or_else(
                    || describe(echo.as_ref()),
                    |code| Location::from_code(code).to_string(),
                ),
            )),
        }
    }

    /// Replace a flap's curfew with one enabled window.
    ///
    /// Times are in the household's timezone.
    pub async fn set_curfew(
        &self,
        device_id: i64,
        lock_time: NaiveTime,
        unlock_time: NaiveTime,
    ) -> Result<Arc<Value>, CoreError> {
        let requested = Curfew {
            lock_time: lock_time.format("%H:%M").to_string(),
            unlock_time: unlock_time.format("%H:%M").to_string(),
            enabled: true,
        };

        info!(device_id, lock = %requested.lock_time, unlock = %requested.unlock_time, "setting curfew");
        let response = self
            .inner
            .client
            .set_curfew(device_id, lock_time, unlock_time)
            .await?;

        let echo = echoed(response.as_deref(), "curfew");
        let confirmed = Curfew::list_from(echo.as_ref()).contains(&requested);
        match response {
            Some(body) if confirmed => Ok(body),
            _ => Err(not_confirmed(
                "set curfew",
                device_id,
                format!("{}-{}", requested.lock_time, requested.unlock_time),
                describe(echo.as_ref()),
            )),
        }
    }

    /// Allow a pet's tag on a flap or feeder.
    pub async fn add_device_tag(&self, device_id: i64, tag_id: i64) -> Result<Envelope, CoreError> {
        info!(device_id, tag_id, "assigning tag");
        Ok(self.inner.client.add_device_tag(device_id, tag_id).await?)
    }

    pub async fn remove_device_tag(&self, device_id: i64, tag_id: i64) -> Result<Envelope, CoreError> {
        info!(device_id, tag_id, "removing tag");
        Ok(self.inner.client.remove_device_tag(device_id, tag_id).await?)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn data_of(envelope: Envelope) -> Option<Value> {
    envelope.and_then(|body| body.get("data").cloned())
}

/// `data.{field}` of a control response.
fn echoed(response: Option<&Value>, field: &str) -> Option<Value> {
    response
        .and_then(|body| body.get("data"))
        .and_then(|data| data.get(field))
        .cloned()
}

fn describe(value: Option<&Value>) -> String {
    value.map_or_else(|| "nothing".to_owned(), ToString::to_string)
}

fn not_confirmed(
    command: &'static str,
    target: i64,
    requested: String,
    reported: String,
) -> CoreError {
    warn!(command, target, %requested, %reported, "command not confirmed by server");
    CoreError::CommandNotConfirmed {
        command,
        target,
        requested,
        reported,
    }
}
