//! Hit stream scanner.
//!
//! Summarizes a hit stream without clustering it.

use eventform_core::Hit;
use serde::Serialize;
use std::collections::BTreeMap;

/// Counts and time range of a hit stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HitSummary {
    /// Total hits seen.
    pub hits: u64,
    /// Hits with a sentinel coordinate or plane.
    pub invalid: u64,
    /// Hits per plane id.
    pub per_plane: BTreeMap<u8, u64>,
    /// Earliest time seen.
    pub time_min: Option<u64>,
    /// Latest time seen.
    pub time_max: Option<u64>,
    /// Hits whose time is earlier than the previous hit's.
    pub out_of_order: u64,
    #[serde(skip)]
    last_time: Option<u64>,
}

impl HitSummary {
    /// Creates an empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts for one hit.
    pub fn record(&mut self, hit: &Hit) {
        self.hits += 1;
        if !hit.is_valid() {
            self.invalid += 1;
        }
        *self.per_plane.entry(hit.plane).or_default() += 1;
        self.time_min = Some(self.time_min.map_or(hit.time, |t| t.min(hit.time)));
        self.time_max = Some(self.time_max.map_or(hit.time, |t| t.max(hit.time)));
        if self.last_time.is_some_and(|last| hit.time < last) {
            self.out_of_order += 1;
        }
        self.last_time = Some(hit.time);
    }

    /// Time covered, 0 when empty.
    #[must_use]
    pub fn duration(&self) -> u64 {
        match (self.time_min, self.time_max) {
            (Some(min), Some(max)) => max - min,
            _ => 0,
        }
    }
}

impl<'a> FromIterator<&'a Hit> for HitSummary {
    fn from_iter<I: IntoIterator<Item = &'a Hit>>(iter: I) -> Self {
        let mut summary = Self::new();
        for hit in iter {
            summary.record(hit);
        }
        summary
    }
}
