// ── Lookup tables from `GET /start` ──

use std::collections::BTreeMap;

use serde_json::Value;

use super::raw;

/// Breed, species and condition names keyed by their vendor ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    breeds: BTreeMap<i64, String>,
    species_breeds: BTreeMap<i64, BTreeMap<i64, String>>,
    conditions: BTreeMap<i64, String>,
    raw: Value,
}

impl Attributes {
    /// Build from the `data` member of the `/start` envelope.
    pub fn from_data(data: &Value) -> Self {
        let mut attributes = Self {
            raw: data.clone(),
            ..Self::default()
        };

        for breed in entries(data, "breed") {
            let (Some(id), Some(name)) = (breed.get("id").and_then(raw::int), name_of(breed)) else {
                continue;
            };
            if let Some(species) = breed.get("species_id").and_then(raw::int) {
                attributes
                    .species_breeds
                    .entry(species)
                    .or_default()
                    .insert(id, name.clone());
            }
            attributes.breeds.insert(id, name);
        }

        for condition in entries(data, "condition") {
            if let (Some(id), Some(name)) = (condition.get("id").and_then(raw::int), name_of(condition)) {
                attributes.conditions.insert(id, name);
            }
        }

        attributes
    }

    pub fn breed_name(&self, id: i64) -> Option<&str> {
        self.breeds.get(&id).map(String::as_str)
    }

    /// Breeds of one species, keyed by breed id.
    pub fn breeds_of_species(&self, species_id: i64) -> Option<&BTreeMap<i64, String>> {
        self.species_breeds.get(&species_id)
    }

    pub fn condition_name(&self, id: i64) -> Option<&str> {
        self.conditions.get(&id).map(String::as_str)
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

fn entries<'a>(data: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    data.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn name_of(entry: &Value) -> Option<String> {
    entry.get("name").and_then(Value::as_str).map(str::to_owned)
}
