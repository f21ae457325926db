// Sure Petcare endpoint wrappers
//
// Each method builds the exact resource URL (the cache keys on it) and
// hands the whole `{"data": ...}` envelope back. Typed interpretation
// happens in surepet-core.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::{Value, json};
use tracing::debug;

use crate::client::{Method, SureClient};
use crate::error::Error;

/// `/pet` with every sub-resource the app expands.
const PET_RESOURCE: &str = "pet?with%5B%5D=photo&with%5B%5D=breed&with%5B%5D=conditions\
&with%5B%5D=tag&with%5B%5D=food_type&with%5B%5D=species&with%5B%5D=position&with%5B%5D=status";

/// `/device` with children, tags, control and status expanded.
const DEVICE_RESOURCE: &str =
    "device?with%5B%5D=children&with%5B%5D=tags&with%5B%5D=control&with%5B%5D=status";

/// Envelope returned by every endpoint; `None` on soft failure.
pub type Envelope = Option<Arc<Value>>;

impl SureClient {
    // ── Household snapshot ───────────────────────────────────────────

    /// Devices and pets of every household in one document.
    ///
    /// `GET /me/start`
    pub async fn me_start(&self) -> Result<Envelope, Error> {
        let url = self.api_url("me/start");
        self.call(Method::Get, &url, None).await
    }

    /// Species, breeds, conditions and other lookup tables.
    ///
    /// `GET /start`
    pub async fn start_attributes(&self) -> Result<Envelope, Error> {
        let url = self.api_url("start");
        self.call(Method::Get, &url, None).await
    }

    /// `GET /pet?with[]=photo&with[]=breed&...`
    pub async fn pets(&self) -> Result<Envelope, Error> {
        let url = self.api_url(PET_RESOURCE);
        self.call(Method::Get, &url, None).await
    }

    /// `GET /device?with[]=children&with[]=tags&with[]=control&with[]=status`
    pub async fn devices(&self) -> Result<Envelope, Error> {
        let url = self.api_url(DEVICE_RESOURCE);
        self.call(Method::Get, &url, None).await
    }

    // ── Activity ─────────────────────────────────────────────────────

    /// `GET /timeline`
    pub async fn timeline(&self) -> Result<Envelope, Error> {
        let url = self.api_url("timeline");
        self.call(Method::Get, &url, None).await
    }

    /// One page (at most 25 entries) of a household's event stream.
    ///
    /// `GET /timeline/household/{id}?page={page}`, pages start at 1.
    pub async fn household_timeline(&self, household_id: i64, page: u32) -> Result<Envelope, Error> {
        let url = self.api_url(&format!("timeline/household/{household_id}?page={page}"));
        debug!(household_id, page, "fetching household timeline");
        self.call(Method::Get, &url, None).await
    }

    /// Notifications are large and slow, so this call gets twice the
    /// client's default timeout.
    ///
    /// `GET /notification`
    pub async fn notification(&self) -> Result<Envelope, Error> {
        let url = self.api_url("notification");
        self.call_with_timeout(Method::Get, &url, None, self.timeout() * 2)
            .await
    }

    /// Household report, or a single pet's when `pet_id` is given.
    ///
    /// `GET /report/household/{id}[/pet/{pet_id}]`
    pub async fn report(&self, household_id: i64, pet_id: Option<i64>) -> Result<Envelope, Error> {
        let path = match pet_id {
            Some(pet_id) => format!("report/household/{household_id}/pet/{pet_id}"),
            None => format!("report/household/{household_id}"),
        };
        let url = self.api_url(&path);
        self.call(Method::Get, &url, None).await
    }

    /// Per-pet aggregate report, optionally bounded to a date range.
    ///
    /// Without a range the server may return several hundred datapoints.
    ///
    /// `GET /report/household/{id}/pet/{pet_id}/aggregate[?from=YYYY-MM-DD&to=YYYY-MM-DD]`
    pub async fn pet_aggregate_report(
        &self,
        household_id: i64,
        pet_id: i64,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Envelope, Error> {
        let mut path = format!("report/household/{household_id}/pet/{pet_id}/aggregate");
        if let Some((from, to)) = range {
            path.push_str(&format!(
                "?from={}&to={}",
                from.format("%Y-%m-%d"),
                to.format("%Y-%m-%d")
            ));
        }
        let url = self.api_url(&path);
        self.call(Method::Get, &url, None).await
    }

    // ── Control ──────────────────────────────────────────────────────

    /// `PUT /device/{id}/control` with `{"locking": code}`
    pub async fn set_lock_state(&self, device_id: i64, code: i64) -> Result<Envelope, Error> {
        let url = self.api_url(&format!("device/{device_id}/control"));
        debug!(device_id, code, "setting lock state");
        self.call(Method::Put, &url, Some(&json!({ "locking": code })))
            .await
    }

    /// Replace the flap's curfew with a single enabled window.
    ///
    /// `PUT /device/{id}/control` with `{"curfew": [{"lock_time", "unlock_time", "enabled"}]}`
    pub async fn set_curfew(
        &self,
        device_id: i64,
        lock_time: NaiveTime,
        unlock_time: NaiveTime,
    ) -> Result<Envelope, Error> {
        let url = self.api_url(&format!("device/{device_id}/control"));
        let body = json!({
            "curfew": [{
                "lock_time": lock_time.format("%H:%M").to_string(),
                "unlock_time": unlock_time.format("%H:%M").to_string(),
                "enabled": true,
            }]
        });
        debug!(device_id, %lock_time, %unlock_time, "setting curfew");
        self.call(Method::Put, &url, Some(&body)).await
    }

    /// `POST /pet/{id}/position` with `{"where": code, "since": "YYYY-MM-DD HH:MM:SS"}`
    pub async fn set_pet_position(
        &self,
        pet_id: i64,
        location: i64,
        since: DateTime<Utc>,
    ) -> Result<Envelope, Error> {
        let url = self.api_url(&format!("pet/{pet_id}/position"));
        let body = json!({
            "where": location,
            "since": since.format("%Y-%m-%d %H:%M:%S").to_string(),
        });
        debug!(pet_id, location, "setting pet position");
        self.call(Method::Post, &url, Some(&body)).await
    }

    /// Assign a pet tag to a flap or feeder.
    ///
    /// `PUT /device/{id}/tag/{tag_id}`
    pub async fn add_device_tag(&self, device_id: i64, tag_id: i64) -> Result<Envelope, Error> {
        let url = self.api_url(&format!("device/{device_id}/tag/{tag_id}"));
        debug!(device_id, tag_id, "assigning tag");
        self.call(Method::Put, &url, None).await
    }

    /// Answers `204 No Content` on success, which yields `None`.
    ///
    /// `DELETE /device/{id}/tag/{tag_id}`
    pub async fn remove_device_tag(&self, device_id: i64, tag_id: i64) -> Result<Envelope, Error> {
        let url = self.api_url(&format!("device/{device_id}/tag/{tag_id}"));
        debug!(device_id, tag_id, "removing tag");
        self.call(Method::Delete, &url, None).await
    }
}
