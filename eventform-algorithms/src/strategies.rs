//! Grouping rules for [`Matcher`](crate::matching::Matcher).
#![allow(clippy::cast_precision_loss)]

use crate::analysis::TimeAlgorithm;
use crate::matching::MatchStrategy;
use eventform_core::{Cluster, Event};

/// Joins clusters whose time window overlaps the event's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlapStrategy;

impl MatchStrategy for OverlapStrategy {
    fn name(&self) -> &'static str {
        "overlap"
    }

    fn sort_key(&self, cluster: &Cluster) -> f64 {
        cluster.time_start() as f64
    }

    fn belongs(&self, event: &Event, cluster: &Cluster) -> bool {
        event.time_overlap(cluster) > 0
    }
}

/// Joins clusters that start no more than `allowed_time_gap` after the
/// event's window ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GapStrategy {
    allowed_time_gap: u64,
}

impl GapStrategy {
    /// Creates the rule with the given tolerated gap.
    #[must_use]
    pub fn new(allowed_time_gap: u64) -> Self {
        Self { allowed_time_gap }
    }

    /// Tolerated gap.
    #[must_use]
    pub fn allowed_time_gap(&self) -> u64 {
        self.allowed_time_gap
    }
}

impl MatchStrategy for GapStrategy {
    fn name(&self) -> &'static str {
        "gap"
    }

    fn sort_key(&self, cluster: &Cluster) -> f64 {
        cluster.time_start() as f64
    }

    fn belongs(&self, event: &Event, cluster: &Cluster) -> bool {
        event.time_overlap_within(cluster, self.allowed_time_gap) > 0
    }
}

/// Joins clusters whose end time lies within `max_delta_time` of the event's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndStrategy {
    max_delta_time: u64,
}

impl EndStrategy {
    /// Creates the rule with the given tolerance.
    #[must_use]
    pub fn new(max_delta_time: u64) -> Self {
        Self { max_delta_time }
    }
}

impl MatchStrategy for EndStrategy {
    fn name(&self) -> &'static str {
        "end"
    }

    fn sort_key(&self, cluster: &Cluster) -> f64 {
        cluster.time_end() as f64
    }

    fn belongs(&self, event: &Event, cluster: &Cluster) -> bool {
        event.time_end().abs_diff(cluster.time_end()) <= self.max_delta_time
    }
}

/// Pairs at most one cluster per plane whose estimated times lie within
/// `max_delta_time`.
///
/// The event's reference time is the estimate for plane A if it has hits,
/// otherwise for plane B. A cluster whose plane is already occupied closes
/// the event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CenterStrategy {
    max_delta_time: u64,
    time_algorithm: TimeAlgorithm,
}

impl CenterStrategy {
    /// Creates the rule with the given tolerance and time estimator.
    #[must_use]
    pub fn new(max_delta_time: u64, time_algorithm: TimeAlgorithm) -> Self {
        Self {
            max_delta_time,
            time_algorithm,
        }
    }

    /// Time estimator used for sorting and comparison.
    #[must_use]
    pub fn time_algorithm(&self) -> TimeAlgorithm {
        self.time_algorithm
    }
}

impl MatchStrategy for CenterStrategy {
    fn name(&self) -> &'static str {
        "center"
    }

    fn sort_key(&self, cluster: &Cluster) -> f64 {
        self.time_algorithm.cluster_time(cluster)
    }

    fn belongs(&self, event: &Event, cluster: &Cluster) -> bool {
        let occupied = match cluster.plane().and_then(|plane| event.side(plane)) {
            Some(side) => !side.is_empty(),
            None => true,
        };
        if occupied {
            return false;
        }
        let reference = if event.cluster_a().is_empty() {
            event.cluster_b()
        } else {
            event.cluster_a()
        };
        let delta = (self.time_algorithm.cluster_time(reference)
            - self.time_algorithm.cluster_time(cluster))
        .abs();
        delta <= self.max_delta_time as f64
    }
}
