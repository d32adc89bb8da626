// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use serde_json::{json, Value};
use tempfile::tempdir;
use vfr_nav_core::keys::{plan_key, SELECTED_PLAN_KEY};
use vfr_nav_core::{FileStore, FlightPlanRepository, KeyValueStore, MemoryStore, PlanError};

fn legacy_record() -> Value {
    json!({
        "state": {
            "aircraft": { "registration": "F-BUYT", "cruiseSpeed": 90 },
            "departureAirfield": { "icao": "LFPZ" },
            "arrivalAirfield": { "icao": "LFPZ" },
            "date": "Sun Apr 12 2026 14:00:00 GMT+0200 (CEST)",
            "legs": [
                { "name": "", "alt": { "desired": 1500, "minimal": 1000 }, "magneticRoute": 90,
                  "distance": 60, "wind": { "direction": 0, "velocity": 0 } }
            ],
            "hideWind": false
        },
        "version": 0
    })
}

#[test]
fn test_legacy_record_is_migrated_on_load() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let mut store = FileStore::new(dir.path());
    store.set(&plan_key("1"), &legacy_record().to_string())?;

    let repo = FlightPlanRepository::open(store)?;
    let leg = repo.plan().legs.get(0).unwrap();
    assert!(!leg.id.is_empty());

    // 90 kt over 60 NM in still air
    let computed = repo.compute_legs();
    assert_eq!(computed[0].computation.duration, 40.0);
    assert_eq!(computed[0].computation.corrected_duration, 40.0);
    assert_eq!(computed[0].computation.magnetic_course, 90.0);

    // The migrated record is written back in the current format
    let stored: Value = serde_json::from_str(&repo.store().get(&plan_key("1"))?.unwrap())?;
    assert_eq!(stored["version"], json!(1));
    assert_eq!(stored["state"]["legs"][0]["id"], json!(leg.id));
    Ok(())
}

#[test]
fn test_loading_current_record_does_not_rewrite_it() {
    let mut store = MemoryStore::new();
    store.set(&plan_key("1"), &legacy_record().to_string()).unwrap();
    let store = FlightPlanRepository::open(store).unwrap().into_store();
    let first = store.get(&plan_key("1")).unwrap();

    let repo = FlightPlanRepository::open(store).unwrap();
    assert_eq!(repo.store().get(&plan_key("1")).unwrap(), first);
}

#[test]
fn test_corrupted_legacy_record_aborts_load() {
    let mut record = legacy_record();
    record["state"]["legs"][0]
        .as_object_mut()
        .unwrap()
        .remove("distance");

    let mut store = MemoryStore::new();
    store.set(&plan_key("broken"), &record.to_string()).unwrap();
    store.set(SELECTED_PLAN_KEY, &plan_key("broken")).unwrap();

    match FlightPlanRepository::open(store) {
        Err(PlanError::CorruptedData { key, errors }) => {
            assert_eq!(key, plan_key("broken"));
            assert_eq!(errors[0].path, "state.legs[0].distance");
        }
        Err(other) => panic!("expected corrupted data, got {:?}", other),
        Ok(_) => panic!("corrupted record was loaded"),
    }
}

#[test]
fn test_failed_switch_keeps_previous_plan() {
    let mut repo = FlightPlanRepository::open(MemoryStore::new()).unwrap();
    repo.set_aircraft_registration("F-GABC").unwrap();
    let before = repo.plan().clone();

    // Unlike an import, nothing validated this record before it hit storage
    let mut record = legacy_record();
    record["state"]["aircraft"] = json!("not an object");
    let mut store = repo.into_store();
    store.set(&plan_key("bad"), &record.to_string()).unwrap();
    let mut repo = FlightPlanRepository::open_at(store, &plan_key("1")).unwrap();

    let err = repo.switch_to(&plan_key("bad")).unwrap_err();
    assert!(matches!(err, PlanError::CorruptedData { .. }));
    assert_eq!(repo.active_key(), plan_key("1"));
    assert_eq!(repo.plan(), &before);
}

#[test]
fn test_unparseable_date_becomes_now() {
    let mut record = legacy_record();
    record["state"]["date"] = json!("someday");

    let mut store = MemoryStore::new();
    store.set(&plan_key("1"), &record.to_string()).unwrap();

    let before = chrono::Utc::now();
    let repo = FlightPlanRepository::open(store).unwrap();
    assert!(repo.plan().date >= before);
}
