// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Dead-reckoning computations for a navigation log.
//!
//! Everything here is recomputed from the plan on every call. Degenerate input
//! (zero or empty cruise speed, empty leg fields) yields `NaN` results which
//! callers render as placeholders; nothing in this module fails.

use chrono::{DateTime, Duration, Local, Utc};

use crate::plan::{FlightPlan, Leg};

pub const COURSE_PLACEHOLDER: &str = "- - -";
pub const DURATION_PLACEHOLDER: &str = "--";
pub const ETA_PLACEHOLDER: &str = "--:--";

/// Values derived for one leg.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegComputation {
    /// Wind-corrected heading to fly (degrees)
    pub magnetic_course: f64,
    /// Still-air leg time (minutes)
    pub duration: f64,
    /// Leg time corrected for the wind component along the route (minutes)
    pub corrected_duration: f64,
    /// Sum of corrected durations up to and including this leg (minutes)
    pub cumulated_time_to_waypoint: f64,
    /// Time the leg's end waypoint is reached; `None` when the time is unknown
    pub reach_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputedLeg<'a> {
    pub leg: &'a Leg,
    pub computation: LegComputation,
}

/// Minutes needed to fly one nautical mile at `cruise_speed` knots.
pub fn base_factor(cruise_speed: f64) -> f64 {
    if cruise_speed == 0.0 || cruise_speed.is_nan() {
        f64::NAN
    } else {
        60.0 / cruise_speed
    }
}

/// Rounds to two decimals, halves away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Derives course, times and ETAs for every leg of `plan`, in flight order.
pub fn compute_legs(plan: &FlightPlan) -> Vec<ComputedLeg<'_>> {
    let factor = base_factor(plan.aircraft.cruise_speed);
    let mut cumulated = 0.0;

    plan.legs
        .iter()
        .map(|leg| {
            let (magnetic_course, duration, corrected_duration) = leg_figures(leg, factor);
            cumulated += corrected_duration;
            ComputedLeg {
                leg,
                computation: LegComputation {
                    magnetic_course,
                    duration,
                    corrected_duration,
                    cumulated_time_to_waypoint: cumulated,
                    reach_date: add_minutes(plan.date, cumulated),
                },
            }
        })
        .collect()
}

fn leg_figures(leg: &Leg, factor: f64) -> (f64, f64, f64) {
    let max_drift = leg.wind.velocity * factor;
    let drift_angle = (leg.wind.direction - leg.magnetic_route).to_radians();
    let magnetic_course = round2(leg.magnetic_route + drift_angle.sin() * max_drift);

    let still_air = factor * leg.distance;
    let duration = round2(still_air);

    let wind_angle = (leg.magnetic_route - leg.wind.direction).to_radians();
    let wind_correction = factor * leg.wind.velocity * wind_angle.cos();
    let corrected_duration = round2(still_air * (wind_correction / 60.0 + 1.0));

    (magnetic_course, duration, corrected_duration)
}

fn add_minutes(start: DateTime<Utc>, minutes: f64) -> Option<DateTime<Utc>> {
    if !minutes.is_finite() {
        return None;
    }
    let offset = Duration::try_milliseconds((minutes * 60_000.0).round() as i64)?;
    start.checked_add_signed(offset)
}

/// Total corrected flight time (minutes).
pub fn total_time(plan: &FlightPlan) -> f64 {
    compute_legs(plan)
        .last()
        .map_or(0.0, |computed| computed.computation.cumulated_time_to_waypoint)
}

/// Total route distance (NM).
pub fn total_distance(plan: &FlightPlan) -> f64 {
    plan.legs.iter().map(|leg| leg.distance).sum()
}

/// Start date that makes the end of leg `index` coincide with `at`.
pub fn rebased_start(plan: &FlightPlan, index: usize, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let computed = compute_legs(plan);
    let cumulated = computed.get(index)?.computation.cumulated_time_to_waypoint;
    add_minutes(at, -cumulated)
}

pub fn format_course(value: f64) -> String {
    if value.is_finite() {
        format!("{:.2}", value)
    } else {
        COURSE_PLACEHOLDER.to_string()
    }
}

pub fn format_minutes(value: f64) -> String {
    if value.is_finite() {
        format!("{:.2}", value)
    } else {
        DURATION_PLACEHOLDER.to_string()
    }
}

pub fn format_base_factor(value: f64) -> String {
    if value.is_finite() {
        format!("{:.3}", value)
    } else {
        DURATION_PLACEHOLDER.to_string()
    }
}

/// Local `HH:MM` of a reach date.
pub fn format_eta(reach_date: Option<DateTime<Utc>>) -> String {
    match reach_date {
        Some(date) => date.with_timezone(&Local).format("%H:%M").to_string(),
        None => ETA_PLACEHOLDER.to_string(),
    }
}
