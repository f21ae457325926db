// ── Raw-record-to-entity conversion ──
//
// Turns the device and pet records of `/me/start` into typed entities,
// and extracts the activity datapoints that get spliced back into
// device records from household reports and timelines.

use std::collections::BTreeMap;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::model::raw;
use crate::model::{
    BatteryProfile, Device, Entity, EntityType, Feeder, Felaqua, Flap, Hub, Pet, Record,
};

/// Timeline event types emitted by water stations.
const FELAQUA_EVENT_TYPES: [i64; 3] = [29, 30, 34];

/// Materialize every well-formed record, keyed by id.
///
/// Malformed records and unknown product codes are skipped with a
/// warning. A later record with the same id replaces an earlier one.
pub fn materialize<'a>(
    records: impl IntoIterator<Item = &'a Value>,
    battery: BatteryProfile,
) -> BTreeMap<i64, Entity> {
    records
        .into_iter()
        .filter_map(|record| materialize_one(record, battery))
        .map(|entity| (entity.id(), entity))
        .collect()
}

/// Materialize a single record, or `None` if it cannot be represented.
pub fn materialize_one(record: &Value, battery: BatteryProfile) -> Option<Entity> {
    if !record.is_object() {
        warn!("skipping non-object record");
        return None;
    }

    let name = record.get("name").and_then(Value::as_str).unwrap_or("-");
    let Some(id) = record.get("id").and_then(raw::int) else {
        warn!(name, "skipping record without id");
        return None;
    };
    let Some(household_id) = record.get("household_id").and_then(raw::int) else {
        warn!(id, name, "skipping record without household_id");
        return None;
    };

    // Pet records carry no product id.
    let code = match record.get("product_id") {
        None | Some(Value::Null) => 0,
        Some(value) => {
            let Some(code) = raw::int(value) else {
                warn!(id, name, product_id = %value, "skipping record with malformed product_id");
                return None;
            };
            code
        }
    };
    let Some(kind) = EntityType::from_code(code) else {
        warn!(id, name, code, "skipping record of unknown type");
        return None;
    };

    let record = Record::new(id, household_id, kind, record.clone());
    let entity = match kind {
        EntityType::Pet => Entity::Pet(Pet::new(record)),
        EntityType::Hub => Entity::Hub(Hub::new(Device::new(record, battery))),
        EntityType::Repeater | EntityType::Programmer => {
            Entity::Device(Device::new(record, battery))
        }
        EntityType::PetFlap | EntityType::CatFlap => {
            Entity::Flap(Flap::new(Device::new(record, battery)))
        }
        EntityType::Feeder | EntityType::FeederLite => {
            Entity::Feeder(Feeder::new(Device::new(record, battery)))
        }
        EntityType::Felaqua => Entity::Felaqua(Felaqua::new(Device::new(record, battery))),
    };

    debug!(id, household_id, kind = %kind, "materialized entity");
    Some(entity)
}

// ── Report splicing ─────────────────────────────────────────────────

/// One datapoint to write into a device record.
#[derive(Debug, Clone, PartialEq)]
pub struct Splice {
    pub device_id: i64,
    pub pet_id: i64,
    /// `move`, `lunch` or `drink`.
    pub key: &'static str,
    pub value: Value,
}

/// Latest movement/feeding/drinking datapoint per pet-device pair of a
/// household report.
///
/// `kind_of` resolves a device id to its type; pairs whose device is
/// unknown or has no matching datapoints produce nothing.
pub fn report_splices(
    report: &Value,
    kind_of: impl Fn(i64) -> Option<EntityType>,
) -> Vec<Splice> {
    let Some(pairs) = report.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };

    pairs
        .iter()
        .filter_map(|pair| {
            let pet_id = pair.get("pet_id").and_then(raw::int)?;
            let device_id = pair.get("device_id").and_then(raw::int)?;
            let kind = kind_of(device_id)?;

            let (section, key) = if kind.is_flap() {
                ("movement", "move")
            } else if kind.is_feeder() {
                ("feeding", "lunch")
            } else if kind == EntityType::Felaqua {
                ("drinking", "drink")
            } else {
                return None;
            };

            let latest = pair
                .get(section)
                .and_then(|s| s.get("datapoints"))
                .and_then(Value::as_array)
                .and_then(|points| points.last())?;

            Some(Splice {
                device_id,
                pet_id,
                key,
                value: latest.clone(),
            })
        })
        .collect()
}

/// Newest water-station event on a household timeline, as the device id
/// and a `{remaining, change, date}` record for the `latest_drink` key.
pub fn anonymous_drink(timeline: &[Value]) -> Option<(i64, Value)> {
    let entry = timeline.iter().find(|entry| {
        entry
            .get("type")
            .and_then(raw::int)
            .is_some_and(|kind| FELAQUA_EVENT_TYPES.contains(&kind))
    })?;

    let weight = entry.pointer("/weights/0");
    let frame = entry.pointer("/weights/0/frames/0");
    let found = weight
        .and_then(|w| w.get("device_id"))
        .and_then(raw::int)
        .zip(frame);

    let Some((device_id, frame)) = found else {
        warn!(
            checked = timeline.len(),
            "no water remaining/change events found in household timeline"
        );
        return None;
    };

    Some((
        device_id,
        json!({
            "remaining": frame.get("current_weight").cloned().unwrap_or(Value::Null),
            "change": frame.get("change").cloned().unwrap_or(Value::Null),
            "date": frame.get("updated_at").cloned().unwrap_or(Value::Null),
        }),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn battery() -> BatteryProfile {
        BatteryProfile::default()
    }

    #[test]
    fn dispatches_on_product_code() {
        let records = vec![
            json!({ "id": 1, "household_id": 7, "product_id": 1, "name": "Hub" }),
            json!({ "id": 2, "household_id": 7, "product_id": 2 }),
            json!({ "id": 3, "household_id": 7, "product_id": 3 }),
            json!({ "id": 4, "household_id": 7, "product_id": 4 }),
            json!({ "id": 5, "household_id": 7, "product_id": 5 }),
            json!({ "id": 6, "household_id": 7, "product_id": 6 }),
            json!({ "id": 7, "household_id": 7, "product_id": 7 }),
            json!({ "id": 8, "household_id": 7, "product_id": 8 }),
            json!({ "id": 9, "household_id": 7, "name": "Tom" }),
        ];
        let entities = materialize(&records, battery());

        assert_eq!(entities.len(), 9);
        assert!(entities[&1].as_hub().is_some());
        assert!(matches!(entities[&2], Entity::Device(_)));
        assert!(entities[&3].as_flap().is_some());
        assert!(entities[&4].as_feeder().is_some());
        assert!(matches!(entities[&5], Entity::Device(_)));
        assert!(entities[&6].as_flap().is_some());
        assert_eq!(entities[&7].entity_type(), EntityType::FeederLite);
        assert!(entities[&8].as_felaqua().is_some());
        assert_eq!(entities[&9].as_pet().unwrap().name(), "Tom");
    }

    #[test]
    fn unknown_code_is_skipped() {
        let records = vec![
            json!({ "id": 1, "household_id": 7, "product_id": 42 }),
            json!({ "id": 2, "household_id": 7, "product_id": 6 }),
        ];
        let entities = materialize(&records, battery());
        assert_eq!(entities.keys().copied().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn malformed_records_are_skipped() {
        assert!(materialize_one(&json!({ "household_id": 7 }), battery()).is_none());
        assert!(materialize_one(&json!({ "id": 1 }), battery()).is_none());
        assert!(
            materialize_one(&json!({ "id": 1, "household_id": 7, "product_id": "flap" }), battery())
                .is_none()
        );
        assert!(materialize_one(&json!([1, 2]), battery()).is_none());
    }

    #[test]
    fn string_ids_are_accepted() {
        let entity =
            materialize_one(&json!({ "id": "12", "household_id": "7", "product_id": "6" }), battery())
                .unwrap();
        assert_eq!(entity.id(), 12);
        assert_eq!(entity.household_id(), 7);
        assert_eq!(entity.entity_type(), EntityType::CatFlap);
    }

    #[test]
    fn feeder_with_two_weights_has_two_bowls() {
        let entity = materialize_one(
            &json!({
                "id": 4, "household_id": 7, "product_id": 4,
                "lunch": { "weights": [
                    { "index": 0, "weight": 20.5, "change": -2.0 },
                    { "index": 1, "weight": 15.0, "change": -0.5 }
                ] }
            }),
            battery(),
        )
        .unwrap();

        let bowls = entity.as_feeder().unwrap().bowls();
        assert_eq!(bowls.len(), 2);
        assert_eq!(
            bowls
                .iter()
                .map(|b| (b.index, b.weight, b.change))
                .collect::<Vec<_>>(),
            vec![(0, Some(20.5), Some(-2.0)), (1, Some(15.0), Some(-0.5))]
        );
    }

    #[test]
    fn report_splices_take_last_datapoint_per_kind() {
        let report = json!({ "data": [
            { "pet_id": 9, "device_id": 3,
              "movement": { "datapoints": [{ "n": 1 }, { "n": 2 }] },
              "feeding": { "datapoints": [] }, "drinking": { "datapoints": [] } },
            { "pet_id": 9, "device_id": 4,
              "movement": { "datapoints": [] },
              "feeding": { "datapoints": [{ "n": 3 }] }, "drinking": { "datapoints": [] } },
            { "pet_id": 9, "device_id": 8,
              "movement": { "datapoints": [] },
              "feeding": { "datapoints": [] }, "drinking": { "datapoints": [] } },
            { "pet_id": 9, "device_id": 99,
              "movement": { "datapoints": [{ "n": 4 }] } }
        ] });
        let kinds = |id: i64| match id {
            3 => Some(EntityType::PetFlap),
            4 => Some(EntityType::Feeder),
            8 => Some(EntityType::Felaqua),
            _ => None,
        };

        let splices = report_splices(&report, kinds);
        assert_eq!(
            splices,
            vec![
                Splice {
                    device_id: 3,
                    pet_id: 9,
                    key: "move",
                    value: json!({ "n": 2 }),
                },
                Splice {
                    device_id: 4,
                    pet_id: 9,
                    key: "lunch",
                    value: json!({ "n": 3 }),
                },
            ]
        );
    }

    #[test]
    fn anonymous_drink_uses_newest_felaqua_event() {
        let timeline = vec![
            json!({ "type": 7 }),
            json!({ "type": 30, "weights": [{ "device_id": 8, "frames": [
                { "current_weight": 410.0, "change": -12.0, "updated_at": "2024-03-01T08:15:00+00:00" }
            ] }] }),
            json!({ "type": 29, "weights": [{ "device_id": 8, "frames": [
                { "current_weight": 500.0, "change": -1.0, "updated_at": "2024-02-28T08:15:00+00:00" }
            ] }] }),
        ];

        let (device_id, drink) = anonymous_drink(&timeline).unwrap();
        assert_eq!(device_id, 8);
        assert_eq!(
            drink,
            json!({ "remaining": 410.0, "change": -12.0, "date": "2024-03-01T08:15:00+00:00" })
        );
    }

    #[test]
    fn anonymous_drink_without_frames() {
        assert!(anonymous_drink(&[json!({ "type": 34, "weights": [] })]).is_none());
        assert!(anonymous_drink(&[]).is_none());
    }
}
