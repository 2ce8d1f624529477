//! Events pairing clusters from two detector planes.

use crate::cluster::Cluster;
use crate::hit::Hit;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A candidate particle detection: at most one cluster per plane.
///
/// Either side may be empty. Time queries consider only the non-empty
/// sides.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    plane_a: u8,
    plane_b: u8,
    cluster_a: Cluster,
    cluster_b: Cluster,
}

impl Default for Event {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

impl Event {
    /// Creates an empty event for the given plane pair.
    #[must_use]
    pub fn new(plane_a: u8, plane_b: u8) -> Self {
        Self {
            plane_a,
            plane_b,
            cluster_a: Cluster::new(),
            cluster_b: Cluster::new(),
        }
    }

    /// Plane routed to side A.
    #[must_use]
    pub fn plane_a(&self) -> u8 {
        self.plane_a
    }

    /// Plane routed to side B.
    #[must_use]
    pub fn plane_b(&self) -> u8 {
        self.plane_b
    }

    /// Cluster from plane A (possibly empty).
    #[must_use]
    pub fn cluster_a(&self) -> &Cluster {
        &self.cluster_a
    }

    /// Cluster from plane B (possibly empty).
    #[must_use]
    pub fn cluster_b(&self) -> &Cluster {
        &self.cluster_b
    }

    /// The side a plane is routed to, if any.
    #[must_use]
    pub fn side(&self, plane: u8) -> Option<&Cluster> {
        if plane == self.plane_a {
            Some(&self.cluster_a)
        } else if plane == self.plane_b {
            Some(&self.cluster_b)
        } else {
            None
        }
    }

    fn side_mut(&mut self, plane: u8) -> Option<&mut Cluster> {
        if plane == self.plane_a {
            Some(&mut self.cluster_a)
        } else if plane == self.plane_b {
            Some(&mut self.cluster_b)
        } else {
            None
        }
    }

    /// Adds a single hit to the side of its plane.
    ///
    /// Returns false (and drops the hit) if the plane is not part of the event.
    pub fn insert(&mut self, hit: Hit) -> bool {
        match self.side_mut(hit.plane) {
            Some(cluster) => {
                cluster.insert_hit(hit);
                true
            }
            None => false,
        }
    }

    /// Merges a cluster into the side of its plane.
    ///
    /// Returns false (and drops the cluster) if the cluster is empty or its
    /// plane is not part of the event.
    pub fn merge(&mut self, cluster: Cluster) -> bool {
        let Some(plane) = cluster.plane() else {
            return false;
        };
        match self.side_mut(plane) {
            Some(side) => {
                side.merge(cluster);
                true
            }
            None => false,
        }
    }

    /// Empties both sides.
    pub fn clear(&mut self) {
        self.cluster_a.clear();
        self.cluster_b.clear();
    }

    /// Returns true if neither side holds hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cluster_a.is_empty() && self.cluster_b.is_empty()
    }

    /// Returns true if both sides hold hits.
    #[must_use]
    pub fn both_planes(&self) -> bool {
        !self.cluster_a.is_empty() && !self.cluster_b.is_empty()
    }

    /// Hits across both sides.
    #[must_use]
    pub fn total_hit_count(&self) -> usize {
        self.cluster_a.hit_count() + self.cluster_b.hit_count()
    }

    /// Earliest timestamp across the non-empty sides.
    #[must_use]
    pub fn time_start(&self) -> u64 {
        match (self.cluster_a.is_empty(), self.cluster_b.is_empty()) {
            (true, _) => self.cluster_b.time_start(),
            (_, true) => self.cluster_a.time_start(),
            _ => self.cluster_a.time_start().min(self.cluster_b.time_start()),
        }
    }

    /// Latest timestamp across the non-empty sides.
    #[must_use]
    pub fn time_end(&self) -> u64 {
        match (self.cluster_a.is_empty(), self.cluster_b.is_empty()) {
            (true, _) => self.cluster_b.time_end(),
            (_, true) => self.cluster_a.time_end(),
            _ => self.cluster_a.time_end().max(self.cluster_b.time_end()),
        }
    }

    /// Time span including both endpoints, 0 when empty.
    #[must_use]
    pub fn time_span(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        self.time_end() - self.time_start() + 1
    }

    /// Overlap between the event's time window and a cluster's.
    #[must_use]
    pub fn time_overlap(&self, cluster: &Cluster) -> u64 {
        self.time_overlap_within(cluster, 0)
    }

    /// Overlap between the event's window and a cluster's, with the
    /// earlier window's end extended by `allowed_gap`.
    ///
    /// Windows separated by at most `allowed_gap` ticks therefore report a
    /// non-zero overlap. 0 if either is empty.
    #[must_use]
    pub fn time_overlap_within(&self, cluster: &Cluster, allowed_gap: u64) -> u64 {
        if self.is_empty() || cluster.is_empty() {
            return 0;
        }
        let latest_start = self.time_start().max(cluster.time_start());
        let earliest_end = self
            .time_end()
            .min(cluster.time_end())
            .saturating_add(allowed_gap);
        if latest_start > earliest_end {
            return 0;
        }
        earliest_end - latest_start + 1
    }

    /// Gap between the event's window and a cluster's.
    ///
    /// 0 if they overlap, `u64::MAX` if either is empty.
    #[must_use]
    pub fn time_gap(&self, cluster: &Cluster) -> u64 {
        if self.is_empty() || cluster.is_empty() {
            return u64::MAX;
        }
        let latest_start = self.time_start().max(cluster.time_start());
        let earliest_end = self.time_end().min(cluster.time_end());
        latest_start.saturating_sub(earliest_end)
    }

    /// Splits the event back into its non-empty sides, A first.
    #[must_use]
    pub fn into_clusters(self) -> Vec<Cluster> {
        [self.cluster_a, self.cluster_b]
            .into_iter()
            .filter(|cluster| !cluster.is_empty())
            .collect()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "event planes({}{},{}{})",
            self.plane_a,
            if self.cluster_a.is_empty() { "" } else { "*" },
            self.plane_b,
            if self.cluster_b.is_empty() { "" } else { "*" },
        )?;
        if !self.cluster_a.is_empty() {
            write!(f, " A: {}", self.cluster_a)?;
        }
        if !self.cluster_b.is_empty() {
            write!(f, " B: {}", self.cluster_b)?;
        }
        Ok(())
    }
}
