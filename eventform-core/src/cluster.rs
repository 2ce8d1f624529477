//! Cluster aggregate with incrementally maintained statistics.
#![allow(clippy::cast_precision_loss)]

use crate::hit::Hit;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A run of hits from one plane, believed to stem from a single particle.
///
/// Hits can be added but not removed. Bounds and weighted sums are updated
/// in O(1) per insertion; only the micro-TPC track queries sort the hits.
/// Derived accessors of an empty cluster return 0 (spans, bounds) or NaN
/// (centers).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cluster {
    hits: Vec<Hit>,
    plane: Option<u8>,

    coordinate_start: u16,
    coordinate_end: u16,
    time_start: u64,
    time_end: u64,

    weight_sum: f64,
    weight_sum2: f64,
    coordinate_mass: f64,
    coordinate_mass2: f64,
    time_mass: f64,
    time_mass2: f64,
}

impl Cluster {
    /// Creates an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cluster with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            hits: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Adds a hit, accumulating sums and widening bounds.
    ///
    /// No ordering is required. A hit from a different plane is still
    /// added, but marks the cluster's plane as [`Hit::INVALID_PLANE`].
    pub fn insert_hit(&mut self, hit: Hit) {
        if self.hits.is_empty() {
            self.plane = Some(hit.plane);
            self.time_start = hit.time;
            self.time_end = hit.time;
            self.coordinate_start = hit.coordinate;
            self.coordinate_end = hit.coordinate;
        } else if self.plane != Some(hit.plane) {
            self.plane = Some(Hit::INVALID_PLANE);
        }

        self.hits.push(hit);

        let w = f64::from(hit.weight);
        let w2 = w * w;
        let c = f64::from(hit.coordinate);
        let t = hit.time as f64;
        self.weight_sum += w;
        self.weight_sum2 += w2;
        self.coordinate_mass += c * w;
        self.coordinate_mass2 += c * w2;
        self.time_mass += t * w;
        self.time_mass2 += t * w2;

        self.time_start = self.time_start.min(hit.time);
        self.time_end = self.time_end.max(hit.time);
        self.coordinate_start = self.coordinate_start.min(hit.coordinate);
        self.coordinate_end = self.coordinate_end.max(hit.coordinate);
    }

    /// Absorbs another cluster, combining sums and bounds.
    ///
    /// Hits of `other` are appended after this cluster's hits. Merging
    /// clusters of different planes marks the result as
    /// [`Hit::INVALID_PLANE`].
    pub fn merge(&mut self, other: Cluster) {
        if other.hits.is_empty() {
            return;
        }
        if self.hits.is_empty() {
            *self = other;
            return;
        }

        if self.plane != other.plane {
            self.plane = Some(Hit::INVALID_PLANE);
        }

        self.weight_sum += other.weight_sum;
        self.weight_sum2 += other.weight_sum2;
        self.coordinate_mass += other.coordinate_mass;
        self.coordinate_mass2 += other.coordinate_mass2;
        self.time_mass += other.time_mass;
        self.time_mass2 += other.time_mass2;
        self.time_start = self.time_start.min(other.time_start);
        self.time_end = self.time_end.max(other.time_end);
        self.coordinate_start = self.coordinate_start.min(other.coordinate_start);
        self.coordinate_end = self.coordinate_end.max(other.coordinate_end);

        self.hits.extend(other.hits);
    }

    /// Removes all hits and resets the statistics.
    pub fn clear(&mut self) {
        self.hits.clear();
        let hits = std::mem::take(&mut self.hits);
        *self = Self {
            hits,
            ..Self::default()
        };
    }

    /// Returns true if the cluster holds no hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Returns true if the cluster has hits that all share one plane.
    #[must_use]
    pub fn valid(&self) -> bool {
        !self.hits.is_empty() && self.plane != Some(Hit::INVALID_PLANE)
    }

    /// Plane of the hits, `None` while empty.
    #[must_use]
    pub fn plane(&self) -> Option<u8> {
        self.plane
    }

    /// Hits in insertion order.
    #[must_use]
    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    /// Returns an iterator over the hits.
    pub fn iter(&self) -> impl Iterator<Item = &Hit> {
        self.hits.iter()
    }

    /// Number of hits in the cluster.
    #[must_use]
    pub fn hit_count(&self) -> usize {
        self.hits.len()
    }

    /// Lowest coordinate.
    #[must_use]
    pub fn coordinate_start(&self) -> u16 {
        self.coordinate_start
    }

    /// Highest coordinate.
    #[must_use]
    pub fn coordinate_end(&self) -> u16 {
        self.coordinate_end
    }

    /// Distance between the lowest and highest coordinate.
    #[must_use]
    pub fn coordinate_span(&self) -> u16 {
        self.coordinate_end - self.coordinate_start
    }

    /// Earliest timestamp.
    #[must_use]
    pub fn time_start(&self) -> u64 {
        self.time_start
    }

    /// Latest timestamp.
    #[must_use]
    pub fn time_end(&self) -> u64 {
        self.time_end
    }

    /// Time span including both endpoints, 0 when empty.
    #[must_use]
    pub fn time_span(&self) -> u64 {
        if self.hits.is_empty() {
            return 0;
        }
        self.time_end - self.time_start + 1
    }

    /// Sum of weights.
    #[must_use]
    pub fn weight_sum(&self) -> f64 {
        self.weight_sum
    }

    /// Sum of squared weights.
    #[must_use]
    pub fn weight_sum2(&self) -> f64 {
        self.weight_sum2
    }

    /// Sum of `coordinate * weight`.
    #[must_use]
    pub fn coordinate_mass(&self) -> f64 {
        self.coordinate_mass
    }

    /// Sum of `coordinate * weight^2`.
    #[must_use]
    pub fn coordinate_mass2(&self) -> f64 {
        self.coordinate_mass2
    }

    /// Sum of `time * weight`.
    #[must_use]
    pub fn time_mass(&self) -> f64 {
        self.time_mass
    }

    /// Sum of `time * weight^2`.
    #[must_use]
    pub fn time_mass2(&self) -> f64 {
        self.time_mass2
    }

    /// Weighted coordinate center. NaN if the weight sum is zero.
    #[must_use]
    pub fn coordinate_center(&self) -> f64 {
        self.coordinate_mass / self.weight_sum
    }

    /// Weighted time center. NaN if the weight sum is zero.
    #[must_use]
    pub fn time_center(&self) -> f64 {
        self.time_mass / self.weight_sum
    }

    /// Coordinate center weighted by squared weights.
    #[must_use]
    pub fn coordinate_center2(&self) -> f64 {
        self.coordinate_mass2 / self.weight_sum2
    }

    /// Time center weighted by squared weights.
    #[must_use]
    pub fn time_center2(&self) -> f64 {
        self.time_mass2 / self.weight_sum2
    }

    /// Hit indices ordered along the strip axis.
    ///
    /// Hits on the same coordinate keep their insertion order.
    #[must_use]
    pub fn track(&self) -> Vec<usize> {
        let mut track: Vec<usize> = (0..self.hits.len()).collect();
        track.sort_by_key(|&index| self.hits[index].coordinate);
        track
    }

    /// Index of the hit that best represents the start of a micro-TPC track.
    ///
    /// That is a hit stamped `time_end`. If several share it, the one
    /// closest to either end of the track (in strip order) is chosen; at
    /// equal distance the heavier one wins, then the lower coordinate.
    #[must_use]
    pub fn utpc_index(&self) -> Option<usize> {
        let track = self.track();
        self.utpc_position(&track).map(|position| track[position])
    }

    /// The micro-TPC hit and its one or two neighbours along the track.
    ///
    /// Empty for an empty cluster.
    #[must_use]
    pub fn utpc_neighbourhood(&self) -> Vec<Hit> {
        let track = self.track();
        let Some(position) = self.utpc_position(&track) else {
            return Vec::new();
        };
        let first = position.saturating_sub(1);
        let last = (position + 1).min(track.len() - 1);
        track[first..=last]
            .iter()
            .map(|&index| self.hits[index])
            .collect()
    }

    fn utpc_position(&self, track: &[usize]) -> Option<usize> {
        let last = track.len().checked_sub(1)?;
        (0..track.len())
            .filter(|&position| self.hits[track[position]].time == self.time_end)
            .min_by_key(|&position| {
                let hit = &self.hits[track[position]];
                (
                    position.min(last - position),
                    std::cmp::Reverse(hit.weight),
                    hit.coordinate,
                )
            })
    }

    /// Overlapping time span of two clusters, inclusive of endpoints.
    #[must_use]
    pub fn time_overlap(&self, other: &Cluster) -> u64 {
        if self.is_empty() || other.is_empty() {
            return 0;
        }
        let latest_start = self.time_start.max(other.time_start);
        let earliest_end = self.time_end.min(other.time_end);
        if latest_start > earliest_end {
            return 0;
        }
        earliest_end - latest_start + 1
    }

    /// Time between the end of one cluster and the start of the other.
    ///
    /// 0 if they overlap, `u64::MAX` if either is empty.
    #[must_use]
    pub fn time_gap(&self, other: &Cluster) -> u64 {
        if self.is_empty() || other.is_empty() {
            return u64::MAX;
        }
        let latest_start = self.time_start.max(other.time_start);
        let earliest_end = self.time_end.min(other.time_end);
        latest_start.saturating_sub(earliest_end)
    }
}

impl FromIterator<Hit> for Cluster {
    fn from_iter<I: IntoIterator<Item = Hit>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut cluster = Cluster::with_capacity(iter.size_hint().0);
        for hit in iter {
            cluster.insert_hit(hit);
        }
        cluster
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "(empty)");
        }
        write!(
            f,
            "plane={} hits={} time=[{},{}] coord=[{},{}] weight={}",
            self.plane.unwrap_or(Hit::INVALID_PLANE),
            self.hits.len(),
            self.time_start,
            self.time_end,
            self.coordinate_start,
            self.coordinate_end,
            self.weight_sum
        )
    }
}
