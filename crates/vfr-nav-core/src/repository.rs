// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use anyhow::Context;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{FieldError, PlanError};
use crate::keys::{self, SELECTED_PLAN_KEY};
use crate::legs::Reorder;
use crate::migration;
use crate::navigation::{self, ComputedLeg};
use crate::plan::{FlightPlan, Leg, LegPatch, PersistedFlightPlan, CURRENT_VERSION};
use crate::schema;
use crate::storage::KeyValueStore;

pub type Listener = Box<dyn FnMut(&str, &FlightPlan)>;

/// Downloadable copy of a plan's stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedPlan {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Serialize)]
struct RecordRef<'a> {
    version: u32,
    state: &'a FlightPlan,
}

fn serialize_record(plan: &FlightPlan) -> Result<String, PlanError> {
    Ok(serde_json::to_string_pretty(&RecordRef {
        version: CURRENT_VERSION,
        state: plan,
    })?)
}

fn plan_key_only(key: &str) -> Result<(), PlanError> {
    if keys::is_plan_key(key) {
        Ok(())
    } else {
        Err(PlanError::InvalidKey(key.to_string()))
    }
}

fn corrupted(key: &str, message: String) -> PlanError {
    PlanError::CorruptedData {
        key: key.to_string(),
        errors: vec![FieldError::new("", message)],
    }
}

/// Owns the active flight plan and the registry of stored plans.
///
/// Every mutation is written through to the store before the call returns.
/// Switching plans replaces the whole live state at once, and only after the
/// target record has been fully loaded and migrated.
pub struct FlightPlanRepository<S: KeyValueStore> {
    store: S,
    active_key: String,
    plan: FlightPlan,
    registry: BTreeMap<String, String>,
    listeners: Vec<Listener>,
}

impl<S: KeyValueStore> FlightPlanRepository<S> {
    /// Opens the plan selected last, falling back to the first stored plan and
    /// then to the default key.
    pub fn open(store: S) -> Result<Self, PlanError> {
        let registry = keys::registry_from_keys(store.keys()?);
        let selected = store.get(SELECTED_PLAN_KEY)?;
        let key = keys::startup_key(&registry, selected.as_deref());
        Self::open_at(store, &key)
    }

    /// Opens a specific plan key.
    pub fn open_at(store: S, key: &str) -> Result<Self, PlanError> {
        plan_key_only(key)?;
        let (plan, needs_write) = load_record(&store, key)?;
        let mut repository = Self {
            store,
            active_key: key.to_string(),
            plan,
            registry: BTreeMap::new(),
            listeners: Vec::new(),
        };
        repository.finish_switch(needs_write)?;
        Ok(repository)
    }

    pub fn plan(&self) -> &FlightPlan {
        &self.plan
    }

    pub fn active_key(&self) -> &str {
        &self.active_key
    }

    pub fn active_name(&self) -> &str {
        keys::plan_name(&self.active_key)
    }

    /// Stored plans, sorted by key, with their display names.
    pub fn plans(&self) -> &BTreeMap<String, String> {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Registers a listener called after every committed change.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&str, &FlightPlan) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn compute_legs(&self) -> Vec<ComputedLeg<'_>> {
        navigation::compute_legs(&self.plan)
    }

    pub fn base_factor(&self) -> f64 {
        navigation::base_factor(self.plan.aircraft.cruise_speed)
    }

    // --- Plan registry ---

    /// Makes `key` the active plan. A key without a record starts from the
    /// default plan. On error the previous plan stays active.
    pub fn switch_to(&mut self, key: &str) -> Result<(), PlanError> {
        plan_key_only(key)?;
        let (plan, needs_write) = load_record(&self.store, key)?;
        self.active_key = key.to_string();
        self.plan = plan;
        self.finish_switch(needs_write)
    }

    pub fn switch_to_name(&mut self, name: &str) -> Result<(), PlanError> {
        self.switch_to(&keys::plan_key(name))
    }

    /// Creates a plan named `name` and makes it active. An existing plan of
    /// that name is selected as is.
    pub fn create(&mut self, name: &str) -> Result<String, PlanError> {
        let key = keys::plan_key(name);
        if self.registry.contains_key(&key) {
            log::info!("[FlightPlan] {} already exists, selecting it", key);
        } else {
            log::info!("[FlightPlan] Creating {}", key);
            self.store.set(&key, &serialize_record(&FlightPlan::default())?)?;
        }
        self.switch_to(&key)?;
        Ok(key)
    }

    /// Moves the active plan's record under `new_name`.
    pub fn rename(&mut self, new_name: &str) -> Result<String, PlanError> {
        let new_key = keys::plan_key(new_name);
        if new_key == self.active_key {
            return Ok(new_key);
        }
        if self.registry.contains_key(&new_key) {
            return Err(PlanError::PlanExists(new_name.to_string()));
        }

        log::info!("[FlightPlan] Renaming {} to {}", self.active_key, new_key);
        self.store.set(&new_key, &serialize_record(&self.plan)?)?;
        self.store.remove(&self.active_key)?;
        self.switch_to(&new_key)?;
        Ok(new_key)
    }

    /// Erases the active plan and switches to the first remaining one, or to a
    /// fresh default plan when none is left.
    pub fn delete_active(&mut self) -> Result<(), PlanError> {
        log::info!("[FlightPlan] Deleting {}", self.active_key);
        self.store.remove(&self.active_key)?;
        self.refresh_registry()?;
        let next = self
            .registry
            .keys()
            .next()
            .cloned()
            .unwrap_or_else(keys::default_plan_key);
        self.switch_to(&next)
    }

    /// Erases any plan. Deleting the active plan behaves like
    /// [`Self::delete_active`].
    pub fn delete(&mut self, key: &str) -> Result<(), PlanError> {
        if key == self.active_key {
            return self.delete_active();
        }
        plan_key_only(key)?;
        log::info!("[FlightPlan] Deleting {}", key);
        self.store.remove(key)?;
        self.refresh_registry()
    }

    // --- Import / export ---

    /// Validates `bytes` and, when they describe a flight plan, stores them
    /// verbatim under `key` and loads that plan. A rejected document leaves
    /// every plan untouched.
    pub fn import(&mut self, key: &str, bytes: &[u8]) -> Result<(), PlanError> {
        plan_key_only(key)?;
        let text = std::str::from_utf8(bytes).map_err(|err| {
            PlanError::Validation(vec![FieldError::new("", format!("not UTF-8 text: {}", err))])
        })?;
        let document: Value = serde_json::from_str(text).map_err(|err| {
            PlanError::Validation(vec![FieldError::new("", format!("invalid JSON: {}", err))])
        })?;
        let version = schema::validate_document(&document).map_err(|errors| {
            log::warn!("[FlightPlan] Rejected import into {}: {} invalid fields", key, errors.len());
            PlanError::Validation(errors)
        })?;

        log::info!("[FlightPlan] Importing v{} document into {}", version, key);
        let previous = self.store.get(key)?;
        self.store.set(key, text)?;
        if let Err(err) = self.switch_to(key) {
            match previous {
                Some(raw) => self.store.set(key, &raw)?,
                None => self.store.remove(key)?,
            }
            return Err(err);
        }
        Ok(())
    }

    pub fn import_into_active(&mut self, bytes: &[u8]) -> Result<(), PlanError> {
        let key = self.active_key.clone();
        self.import(&key, bytes)
    }

    /// Reads the whole file before validating it.
    pub fn import_file<P: AsRef<Path>>(&mut self, key: &str, path: P) -> Result<(), PlanError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        self.import(key, &bytes)
    }

    /// The active plan's stored record, byte for byte, with a file name made
    /// of the route and the flight date.
    pub fn export(&self) -> Result<ExportedPlan, PlanError> {
        let raw = match self.store.get(&self.active_key)? {
            Some(raw) => raw,
            None => serialize_record(&self.plan)?,
        };
        Ok(ExportedPlan {
            filename: export_filename(&self.plan),
            bytes: raw.into_bytes(),
        })
    }

    // --- Plan fields ---

    /// Applies `change` to the live plan and persists it when it reports a
    /// modification. A failed write restores the previous state.
    pub fn update<F>(&mut self, change: F) -> Result<bool, PlanError>
    where
        F: FnOnce(&mut FlightPlan) -> bool,
    {
        let previous = self.plan.clone();
        if !change(&mut self.plan) {
            return Ok(false);
        }
        if let Err(err) = self.persist() {
            self.plan = previous;
            return Err(err);
        }
        self.notify();
        Ok(true)
    }

    pub fn set_aircraft_registration(&mut self, registration: &str) -> Result<(), PlanError> {
        self.update(|plan| {
            plan.aircraft.registration = registration.to_string();
            true
        })
        .map(drop)
    }

    pub fn set_cruise_speed(&mut self, knots: f64) -> Result<(), PlanError> {
        self.update(|plan| {
            plan.aircraft.cruise_speed = knots;
            true
        })
        .map(drop)
    }

    pub fn set_departure_icao(&mut self, icao: &str) -> Result<(), PlanError> {
        self.update(|plan| {
            plan.departure_airfield.icao = icao.to_string();
            true
        })
        .map(drop)
    }

    pub fn set_arrival_icao(&mut self, icao: &str) -> Result<(), PlanError> {
        self.update(|plan| {
            plan.arrival_airfield.icao = icao.to_string();
            true
        })
        .map(drop)
    }

    pub fn set_date(&mut self, date: DateTime<Utc>) -> Result<(), PlanError> {
        self.update(|plan| {
            plan.date = date;
            true
        })
        .map(drop)
    }

    pub fn set_hide_wind(&mut self, hide: bool) -> Result<(), PlanError> {
        self.update(|plan| {
            plan.hide_wind = hide;
            true
        })
        .map(drop)
    }

    pub fn toggle_hide_wind(&mut self) -> Result<(), PlanError> {
        self.update(|plan| {
            plan.hide_wind = !plan.hide_wind;
            true
        })
        .map(drop)
    }

    /// Shifts the start date so the end of leg `index` is reached at `at`.
    pub fn rebase_on_waypoint(&mut self, index: usize, at: DateTime<Utc>) -> Result<bool, PlanError> {
        let Some(start) = navigation::rebased_start(&self.plan, index, at) else {
            return Ok(false);
        };
        self.update(|plan| {
            plan.date = start;
            true
        })
    }

    // --- Legs ---

    pub fn append_leg(&mut self, leg: Option<Leg>) -> Result<(), PlanError> {
        self.update(|plan| {
            plan.legs.append(leg);
            true
        })
        .map(drop)
    }

    pub fn append_following_leg(&mut self) -> Result<(), PlanError> {
        self.update(|plan| {
            plan.legs.append_following();
            true
        })
        .map(drop)
    }

    pub fn prepend_leg(&mut self, leg: Leg) -> Result<(), PlanError> {
        self.update(|plan| {
            plan.legs.prepend(leg);
            true
        })
        .map(drop)
    }

    pub fn insert_legs(&mut self, index: usize, legs: Vec<Leg>) -> Result<(), PlanError> {
        self.update(|plan| {
            let changed = !legs.is_empty();
            plan.legs.insert(index, legs);
            changed
        })
        .map(drop)
    }

    /// Returns how many legs were removed.
    pub fn remove_legs(&mut self, indexes: &[usize]) -> Result<usize, PlanError> {
        let mut removed = 0;
        self.update(|plan| {
            removed = plan.legs.remove(indexes);
            removed > 0
        })?;
        Ok(removed)
    }

    pub fn pop_leg(&mut self) -> Result<Option<Leg>, PlanError> {
        let mut popped = None;
        self.update(|plan| {
            popped = plan.legs.pop();
            popped.is_some()
        })?;
        Ok(popped)
    }

    pub fn shift_leg(&mut self) -> Result<Option<Leg>, PlanError> {
        let mut shifted = None;
        self.update(|plan| {
            shifted = plan.legs.shift();
            shifted.is_some()
        })?;
        Ok(shifted)
    }

    pub fn reorder_leg(&mut self, reorder: Reorder) -> Result<bool, PlanError> {
        self.update(|plan| plan.legs.reorder(reorder))
    }

    pub fn set_leg(&mut self, index: usize, patch: &LegPatch) -> Result<bool, PlanError> {
        self.update(|plan| plan.legs.set_leg(index, patch))
    }

    pub fn set_leg_by_id(&mut self, id: &str, patch: &LegPatch) -> Result<bool, PlanError> {
        self.update(|plan| plan.legs.set_leg_by_id(id, patch))
    }

    // --- Internals ---

    fn persist(&mut self) -> Result<(), PlanError> {
        let record = serialize_record(&self.plan)?;
        self.store.set(&self.active_key, &record)?;
        Ok(())
    }

    fn refresh_registry(&mut self) -> Result<(), PlanError> {
        self.registry = keys::registry_from_keys(self.store.keys()?);
        Ok(())
    }

    fn finish_switch(&mut self, needs_write: bool) -> Result<(), PlanError> {
        if needs_write {
            self.persist()?;
        }
        self.store.set(SELECTED_PLAN_KEY, &self.active_key)?;
        self.refresh_registry()?;
        log::info!(
            "[FlightPlan] Active plan is now {} ({} legs)",
            self.active_key,
            self.plan.legs.len()
        );
        self.notify();
        Ok(())
    }

    fn notify(&mut self) {
        for listener in &mut self.listeners {
            listener(&self.active_key, &self.plan);
        }
    }
}

/// Reads, migrates and decodes the record under `key`. The flag tells whether
/// the record must be written back (missing, migrated or with repaired ids).
fn load_record<S: KeyValueStore>(store: &S, key: &str) -> Result<(FlightPlan, bool), PlanError> {
    let Some(raw) = store.get(key)? else {
        log::info!("[FlightPlan] No record for {}, starting from defaults", key);
        return Ok((FlightPlan::default(), true));
    };

    let document: Value = serde_json::from_str(&raw).map_err(|err| {
        log::error!("[FlightPlan] {} is not valid JSON: {}", key, err);
        corrupted(key, format!("invalid JSON: {}", err))
    })?;
    let migrated = migration::migrate(key, document)?;
    let changed = migrated.changed();
    let record: PersistedFlightPlan = serde_json::from_value(migrated.document).map_err(|err| {
        log::error!("[FlightPlan] {} could not be decoded: {}", key, err);
        corrupted(key, err.to_string())
    })?;
    Ok((record.state, changed))
}

/// `<DEP>-<ARR>-<DD.MM.YYYY>.json`, date in local time.
pub fn export_filename(plan: &FlightPlan) -> String {
    format!(
        "{}-{}-{}.json",
        plan.departure_airfield.icao,
        plan.arrival_airfield.icao,
        plan.date.with_timezone(&Local).format("%d.%m.%Y")
    )
}
