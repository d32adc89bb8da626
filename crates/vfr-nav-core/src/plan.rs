// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::legs::LegCollection;

/// Schema version written with every record. Bump together with a new step in
/// [`crate::migration`].
pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Altitude {
    /// Planned altitude (ft)
    #[serde(with = "empty_number")]
    pub desired: f64,
    /// Safety altitude (ft)
    #[serde(with = "empty_number")]
    pub minimal: f64,
}

impl Default for Altitude {
    fn default() -> Self {
        Self {
            desired: 0.0,
            minimal: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Wind {
    /// Direction the wind blows from (degrees)
    #[serde(with = "empty_number")]
    pub direction: f64,
    /// Wind speed (kt)
    #[serde(with = "empty_number")]
    pub velocity: f64,
}

impl Default for Wind {
    fn default() -> Self {
        Self {
            direction: 0.0,
            velocity: 0.0,
        }
    }
}

/// One route segment between two waypoints.
///
/// Numeric fields may hold `NaN` while the pilot has not filled them in yet.
/// They are written as JSON `null` and read back as `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Leg {
    pub id: String,
    pub name: String,
    pub alt: Altitude,
    #[serde(with = "empty_number")]
    pub magnetic_route: f64,
    #[serde(with = "empty_number")]
    pub distance: f64,
    pub wind: Wind,
}

impl Default for Leg {
    fn default() -> Self {
        Self::new()
    }
}

impl Leg {
    /// A blank leg with a freshly generated id.
    pub fn new() -> Self {
        Self {
            id: new_leg_id(),
            name: String::new(),
            alt: Altitude::default(),
            magnetic_route: 0.0,
            distance: 0.0,
            wind: Wind::default(),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::new()
        }
    }

    /// Copy of this leg under a new identity.
    pub fn duplicate(&self) -> Self {
        Self {
            id: new_leg_id(),
            ..self.clone()
        }
    }
}

pub fn new_leg_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AltitudePatch {
    pub desired: Option<f64>,
    pub minimal: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindPatch {
    pub direction: Option<f64>,
    pub velocity: Option<f64>,
}

/// Partial update of a [`Leg`]. `None` leaves the field untouched, at every
/// nesting level. The id is not patchable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegPatch {
    pub name: Option<String>,
    pub alt: Option<AltitudePatch>,
    pub magnetic_route: Option<f64>,
    pub distance: Option<f64>,
    pub wind: Option<WindPatch>,
}

impl LegPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn desired_altitude(mut self, feet: f64) -> Self {
        self.alt.get_or_insert_with(AltitudePatch::default).desired = Some(feet);
        self
    }

    pub fn minimal_altitude(mut self, feet: f64) -> Self {
        self.alt.get_or_insert_with(AltitudePatch::default).minimal = Some(feet);
        self
    }

    pub fn magnetic_route(mut self, degrees: f64) -> Self {
        self.magnetic_route = Some(degrees);
        self
    }

    pub fn distance(mut self, nautical_miles: f64) -> Self {
        self.distance = Some(nautical_miles);
        self
    }

    pub fn wind_direction(mut self, degrees: f64) -> Self {
        self.wind.get_or_insert_with(WindPatch::default).direction = Some(degrees);
        self
    }

    pub fn wind_velocity(mut self, knots: f64) -> Self {
        self.wind.get_or_insert_with(WindPatch::default).velocity = Some(knots);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Deep-merges the patch into `leg`.
    pub fn apply(&self, leg: &mut Leg) {
        if let Some(name) = &self.name {
            leg.name.clone_from(name);
        }
        if let Some(alt) = &self.alt {
            if let Some(desired) = alt.desired {
                leg.alt.desired = desired;
            }
            if let Some(minimal) = alt.minimal {
                leg.alt.minimal = minimal;
            }
        }
        if let Some(route) = self.magnetic_route {
            leg.magnetic_route = route;
        }
        if let Some(distance) = self.distance {
            leg.distance = distance;
        }
        if let Some(wind) = &self.wind {
            if let Some(direction) = wind.direction {
                leg.wind.direction = direction;
            }
            if let Some(velocity) = wind.velocity {
                leg.wind.velocity = velocity;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Aircraft {
    pub registration: String,
    /// True airspeed at cruise (kt)
    #[serde(with = "empty_number")]
    pub cruise_speed: f64,
}

impl Default for Aircraft {
    fn default() -> Self {
        Self {
            registration: "F-".to_string(),
            cruise_speed: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Airfield {
    pub icao: String,
}

impl Default for Airfield {
    fn default() -> Self {
        Self {
            icao: "LF".to_string(),
        }
    }
}

/// The persisted part of a flight plan.
///
/// `#[serde(default)]` makes loading a merge: every field missing from the
/// stored record keeps the value of a freshly constructed plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlightPlan {
    pub aircraft: Aircraft,
    pub departure_airfield: Airfield,
    pub arrival_airfield: Airfield,
    /// Start of the navigation
    #[serde(with = "plan_date")]
    pub date: DateTime<Utc>,
    pub legs: LegCollection,
    pub hide_wind: bool,
}

impl Default for FlightPlan {
    fn default() -> Self {
        Self {
            aircraft: Aircraft::default(),
            departure_airfield: Airfield::default(),
            arrival_airfield: Airfield::default(),
            date: Utc::now(),
            legs: LegCollection::with_default_leg(),
            hide_wind: false,
        }
    }
}

/// On-disk envelope: `{ "version": n, "state": { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedFlightPlan {
    #[serde(default)]
    pub version: u32,
    pub state: FlightPlan,
}

impl PersistedFlightPlan {
    pub fn current(state: FlightPlan) -> Self {
        Self {
            version: CURRENT_VERSION,
            state,
        }
    }
}

/// `NaN` <-> `null`
pub(crate) mod empty_number {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

pub(crate) mod plan_date {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(super::parse_plan_date(&raw))
    }
}

/// Parses a stored start date. Accepts RFC 3339 and the `Date.toString()` form
/// written by the web version (`Mon Oct 19 2026 10:00:00 GMT+0200 (CEST)`).
/// Anything else silently becomes "now".
pub fn parse_plan_date(raw: &str) -> DateTime<Utc> {
    try_parse_plan_date(raw).unwrap_or_else(|| {
        log::debug!("[FlightPlan] Unparseable date {:?}, using current time", raw);
        Utc::now()
    })
}

fn try_parse_plan_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }

    // Drop the trailing "(Zone Name)"
    let without_zone_name = raw.split(" (").next().unwrap_or(raw);
    DateTime::parse_from_str(without_zone_name, "%a %b %d %Y %H:%M:%S GMT%z")
        .ok()
        .map(|date| date.with_timezone(&Utc))
}
