// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::plan::{Leg, LegPatch};

/// Move of a single leg, as produced by an "up"/"down" action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reorder {
    pub from: usize,
    pub to: usize,
}

/// Ordered legs of a plan, in waypoint-visit order.
///
/// Out-of-range positions never panic: the operation is skipped and reported
/// through its return value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LegCollection(Vec<Leg>);

impl LegCollection {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_default_leg() -> Self {
        Self(vec![Leg::new()])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Leg> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Leg> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Leg] {
        &self.0
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.0.iter().position(|leg| leg.id == id)
    }

    /// Adds `leg` (or a blank leg) at the end.
    pub fn append(&mut self, leg: Option<Leg>) {
        self.0.push(leg.unwrap_or_default());
    }

    /// Appends a copy of the last leg with its distance cleared, so the next
    /// segment starts from the same altitudes and wind.
    pub fn append_following(&mut self) {
        let next = match self.0.last() {
            Some(last) => Leg {
                distance: 0.0,
                ..last.duplicate()
            },
            None => Leg::new(),
        };
        self.0.push(next);
    }

    pub fn prepend(&mut self, leg: Leg) {
        self.0.insert(0, leg);
    }

    /// Splices `legs` before `index`. An index past the end appends.
    pub fn insert(&mut self, index: usize, legs: impl IntoIterator<Item = Leg>) {
        let index = index.min(self.0.len());
        self.0.splice(index..index, legs);
    }

    /// Removes every leg whose position is listed, positions being taken
    /// before any removal. Returns how many legs went away.
    pub fn remove(&mut self, indexes: &[usize]) -> usize {
        let doomed: BTreeSet<usize> = indexes
            .iter()
            .copied()
            .filter(|&index| index < self.0.len())
            .collect();
        if doomed.is_empty() {
            return 0;
        }

        let mut position = 0;
        self.0.retain(|_| {
            let keep = !doomed.contains(&position);
            position += 1;
            keep
        });
        doomed.len()
    }

    pub fn pop(&mut self) -> Option<Leg> {
        self.0.pop()
    }

    pub fn shift(&mut self) -> Option<Leg> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.remove(0))
        }
    }

    /// Moves the leg at `from` to `to`, shifting the legs in between.
    pub fn reorder(&mut self, Reorder { from, to }: Reorder) -> bool {
        let len = self.0.len();
        if from >= len || to >= len {
            return false;
        }
        if from < to {
            self.0[from..=to].rotate_left(1);
        } else {
            self.0[to..=from].rotate_right(1);
        }
        true
    }

    pub fn set_leg(&mut self, index: usize, patch: &LegPatch) -> bool {
        match self.0.get_mut(index) {
            Some(leg) => {
                patch.apply(leg);
                true
            }
            None => false,
        }
    }

    pub fn set_leg_by_id(&mut self, id: &str, patch: &LegPatch) -> bool {
        match self.position(id) {
            Some(index) => self.set_leg(index, patch),
            None => false,
        }
    }
}

impl From<Vec<Leg>> for LegCollection {
    fn from(legs: Vec<Leg>) -> Self {
        Self(legs)
    }
}

impl<'a> IntoIterator for &'a LegCollection {
    type Item = &'a Leg;
    type IntoIter = std::slice::Iter<'a, Leg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
