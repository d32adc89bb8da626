// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Forward migration of stored flight plan envelopes.
//!
//! Each step lifts a document from version `n` to `n + 1`. The document is
//! checked against the shape of version `n` before the step and of `n + 1`
//! after it; a mismatch aborts the whole migration rather than guessing the
//! missing data.

use serde_json::{json, Value};
use std::collections::HashSet;

use crate::error::{FieldError, PlanError};
use crate::plan::new_leg_id;
use crate::schema::{self, Shape};

pub type Step = fn(&mut Value);

/// Indexed by the version a step starts from.
pub const STEPS: &[(&str, Step)] = &[("assign leg ids", assign_leg_ids as Step)];

/// Outcome of [`migrate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Migrated {
    pub document: Value,
    pub from_version: u32,
    pub to_version: u32,
    /// Legs whose missing or duplicate id was re-issued after migration
    pub repaired_ids: usize,
}

impl Migrated {
    /// Whether the document differs from what was read.
    pub fn changed(&self) -> bool {
        self.from_version != self.to_version || self.repaired_ids > 0
    }
}

fn corrupted(key: &str, errors: Vec<FieldError>) -> PlanError {
    PlanError::CorruptedData {
        key: key.to_string(),
        errors,
    }
}

fn check_shape<F>(key: &str, document: &Value, version: u32, shapes: &F) -> Result<(), PlanError>
where
    F: Fn(u32) -> Option<Shape>,
{
    let shape = shapes(version).ok_or_else(|| {
        corrupted(
            key,
            vec![FieldError::new("version", format!("no schema for version {}", version))],
        )
    })?;
    shape.check(document).map_err(|errors| {
        log::error!(
            "[Migration] {} does not match the v{} schema ({} errors)",
            key,
            version,
            errors.len()
        );
        corrupted(key, errors)
    })
}

/// Brings `document` up to [`crate::plan::CURRENT_VERSION`], then makes sure
/// every leg carries a unique id. A current document with sound ids is
/// returned untouched.
pub fn migrate(key: &str, document: Value) -> Result<Migrated, PlanError> {
    let mut migrated = migrate_with(key, document, STEPS, schema::envelope_shape)?;
    migrated.repaired_ids = repair_leg_ids(&mut migrated.document);
    if migrated.repaired_ids > 0 {
        log::warn!(
            "[Migration] Re-issued {} missing or duplicate leg ids in {}",
            migrated.repaired_ids,
            key
        );
    }
    Ok(migrated)
}

/// Runs `steps` from the document's declared version up to `steps.len()`.
/// The document must match `shapes(n)` before the step out of `n` and
/// `shapes(n + 1)` after it.
pub fn migrate_with<F>(
    key: &str,
    mut document: Value,
    steps: &[(&str, Step)],
    shapes: F,
) -> Result<Migrated, PlanError>
where
    F: Fn(u32) -> Option<Shape>,
{
    let target = steps.len() as u32;
    let from_version = schema::declared_version(&document).map_err(|err| corrupted(key, vec![err]))?;

    if from_version > target {
        return Err(corrupted(
            key,
            vec![FieldError::new(
                "version",
                format!(
                    "version {} is newer than the supported version {}",
                    from_version, target
                ),
            )],
        ));
    }

    if from_version < target {
        log::info!(
            "[Migration] Migrating {} from v{} to v{}",
            key,
            from_version,
            target
        );
    }

    let mut version = from_version;
    while version < target {
        check_shape(key, &document, version, &shapes)?;

        let (label, step) = steps[version as usize];
        step(&mut document);
        version += 1;
        if let Some(envelope) = document.as_object_mut() {
            envelope.insert("version".to_string(), json!(version));
        }

        check_shape(key, &document, version, &shapes)?;
        log::info!("[Migration] v{}→v{}: {}", version - 1, version, label);
    }

    Ok(Migrated {
        document,
        from_version,
        to_version: target,
        repaired_ids: 0,
    })
}

/// v0→v1: every leg gets an id.
fn assign_leg_ids(document: &mut Value) {
    repair_leg_ids(document);
}

/// Gives a fresh id to every leg whose id is missing, empty or already taken
/// by an earlier leg. Returns how many legs changed.
fn repair_leg_ids(document: &mut Value) -> usize {
    let Some(legs) = document
        .pointer_mut("/state/legs")
        .and_then(Value::as_array_mut)
    else {
        return 0;
    };

    let mut seen = HashSet::new();
    let mut repaired = 0;
    for leg in legs.iter_mut().filter_map(Value::as_object_mut) {
        let existing = leg
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        match existing {
            Some(id) if seen.insert(id.clone()) => {}
            _ => {
                let id = new_leg_id();
                seen.insert(id.clone());
                leg.insert("id".to_string(), Value::String(id));
                repaired += 1;
            }
        }
    }
    repaired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::CURRENT_VERSION;

    fn legacy(legs: Vec<Value>) -> Value {
        json!({
            "version": 0,
            "state": {
                "aircraft": { "registration": "F-BXPA", "cruiseSpeed": 90 },
                "departureAirfield": { "icao": "LFOU" },
                "arrivalAirfield": { "icao": "LFRS" },
                "date": "2026-05-02T07:00:00Z",
                "legs": legs,
                "hideWind": true
            }
        })
    }

    fn leg(name: &str) -> Value {
        json!({
            "name": name,
            "alt": { "desired": 1500, "minimal": 1000 },
            "magneticRoute": 310,
            "distance": 22,
            "wind": { "direction": 250, "velocity": 8 }
        })
    }

    #[test]
    fn test_v0_gets_unique_ids() {
        let migrated = migrate("vfr-nav-fpl-1", legacy(vec![leg("A"), leg("B"), leg("C")])).unwrap();

        assert!(migrated.changed());
        assert_eq!(migrated.document["version"], json!(CURRENT_VERSION));

        let ids: Vec<&str> = migrated.document["state"]["legs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|leg| leg["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids.len(), 3);
        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(unique.len(), 3);
        assert!(ids.iter().all(|id| !id.is_empty()));
    }

    #[test]
    fn test_migrated_document_matches_current_schema() {
        let migrated = migrate("k", legacy(vec![leg("A")])).unwrap();
        assert_eq!(schema::validate_document(&migrated.document), Ok(CURRENT_VERSION));
    }

    #[test]
    fn test_duplicate_ids_are_reissued() {
        let mut a = leg("A");
        a["id"] = json!("same");
        let mut b = leg("B");
        b["id"] = json!("same");

        let migrated = migrate("k", legacy(vec![a, b])).unwrap();
        let legs = &migrated.document["state"]["legs"];
        assert_eq!(legs[0]["id"], json!("same"));
        assert_ne!(legs[1]["id"], json!("same"));
    }

    #[test]
    fn test_current_document_is_untouched() {
        let mut document = legacy(vec![leg("A")]);
        document["version"] = json!(CURRENT_VERSION);
        document["state"]["legs"][0]["id"] = json!("leg-a");

        let migrated = migrate("k", document.clone()).unwrap();
        assert!(!migrated.changed());
        assert_eq!(migrated.document, document);
    }

    #[test]
    fn test_missing_version_is_legacy() {
        let mut document = legacy(vec![leg("A")]);
        document.as_object_mut().unwrap().remove("version");

        let migrated = migrate("k", document).unwrap();
        assert_eq!(migrated.from_version, 0);
        assert_eq!(migrated.document["version"], json!(CURRENT_VERSION));
    }

    #[test]
    fn test_invalid_legacy_is_corrupted() {
        let mut document = legacy(vec![leg("A")]);
        document["state"]["legs"][0]
            .as_object_mut()
            .unwrap()
            .remove("wind");

        match migrate("vfr-nav-fpl-broken", document) {
            Err(PlanError::CorruptedData { key, errors }) => {
                assert_eq!(key, "vfr-nav-fpl-broken");
                assert_eq!(errors[0].path, "state.legs[0].wind");
            }
            other => panic!("expected corrupted data, got {:?}", other),
        }
    }

    #[test]
    fn test_future_version_is_corrupted() {
        let mut document = legacy(vec![leg("A")]);
        document["version"] = json!(CURRENT_VERSION + 1);
        assert!(matches!(
            migrate("k", document),
            Err(PlanError::CorruptedData { .. })
        ));
    }

    #[test]
    fn test_current_document_with_clashing_ids_is_repaired() {
        let mut document = legacy(vec![leg("A"), leg("B"), leg("C"), leg("D")]);
        document["version"] = json!(CURRENT_VERSION);
        for (index, id) in ["x", "x", "", ""].iter().enumerate() {
            document["state"]["legs"][index]["id"] = json!(id);
        }

        let migrated = migrate("k", document).unwrap();
        assert!(migrated.changed());
        assert_eq!(migrated.repaired_ids, 3);

        let legs = migrated.document["state"]["legs"].as_array().unwrap();
        assert_eq!(legs[0]["id"], json!("x"));
        let ids: HashSet<&str> = legs.iter().map(|leg| leg["id"].as_str().unwrap()).collect();
        assert_eq!(ids.len(), 4);
        assert!(!ids.contains(""));
    }

    fn add_aircraft(document: &mut Value) {
        document["aircraft"] = json!("F-GKQR");
    }

    fn split_registration(document: &mut Value) {
        let registration = document["aircraft"].take();
        document["aircraft"] = json!({ "registration": registration });
    }

    #[test]
    fn test_steps_chain_in_order() {
        let steps: &[(&str, Step)] = &[
            ("add aircraft", add_aircraft as Step),
            ("split registration", split_registration as Step),
        ];
        let shapes = |version: u32| match version {
            0 => Some(Shape::Object(vec![])),
            1 => Some(Shape::Object(vec![schema::required("aircraft", Shape::String)])),
            2 => Some(Shape::Object(vec![schema::required(
                "aircraft",
                Shape::Object(vec![schema::required("registration", Shape::String)]),
            )])),
            _ => None,
        };

        let migrated = migrate_with("k", json!({ "version": 0 }), steps, shapes).unwrap();
        assert_eq!(migrated.from_version, 0);
        assert_eq!(migrated.to_version, 2);
        assert_eq!(
            migrated.document,
            json!({ "version": 2, "aircraft": { "registration": "F-GKQR" } })
        );

        let resumed = migrate_with("k", json!({ "version": 1, "aircraft": "F-HBCD" }), steps, shapes)
            .unwrap();
        assert_eq!(resumed.document["aircraft"]["registration"], json!("F-HBCD"));
    }

    #[test]
    fn test_step_output_is_checked() {
        fn broken(document: &mut Value) {
            document["aircraft"] = json!(42);
        }
        let steps: &[(&str, Step)] = &[("broken", broken as Step)];
        let shapes = |version: u32| match version {
            0 => Some(Shape::Object(vec![])),
            1 => Some(Shape::Object(vec![schema::required("aircraft", Shape::String)])),
            _ => None,
        };

        match migrate_with("k", json!({ "version": 0 }), steps, shapes) {
            Err(PlanError::CorruptedData { errors, .. }) => assert_eq!(errors[0].path, "aircraft"),
            other => panic!("expected corrupted data, got {:?}", other),
        }
    }

    #[test]
    fn test_every_old_version_has_a_step() {
        assert_eq!(STEPS.len(), CURRENT_VERSION as usize);
    }
}
