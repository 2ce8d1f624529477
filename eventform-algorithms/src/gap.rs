//! Gap clustering: split a time-sorted hit stream wherever the time gap
//! (and optionally the coordinate gap) grows too large.
//!
//! Hits are scanned in ascending time. One run stays open; a hit more than
//! `max_time_gap` after the run's latest hit closes it. Closed runs are
//! emitted as clusters, or, with a coordinate gap configured, re-partitioned
//! until every piece is cohesive in both time and coordinate.

use crate::clustering::{ClusteringStatistics, HitClusterer};
use eventform_core::hit::sort_by_time;
use eventform_core::{Cluster, Error, Hit, Result};
use log::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Gap clusterer configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GapClustererConfig {
    /// Largest time difference between time-adjacent hits of one cluster.
    pub max_time_gap: u64,
    /// Largest coordinate difference between coordinate-adjacent hits of
    /// one cluster. `None` clusters by time alone.
    pub max_coordinate_gap: Option<u16>,
    /// Clusters with fewer hits are discarded as noise.
    pub min_cluster_size: usize,
}

impl Default for GapClustererConfig {
    fn default() -> Self {
        Self {
            max_time_gap: 200,
            max_coordinate_gap: Some(2),
            min_cluster_size: 1,
        }
    }
}

impl GapClustererConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum time gap.
    #[must_use]
    pub fn with_max_time_gap(mut self, gap: u64) -> Self {
        self.max_time_gap = gap;
        self
    }

    /// Sets the maximum coordinate gap, enabling the second stage.
    #[must_use]
    pub fn with_max_coordinate_gap(mut self, gap: u16) -> Self {
        self.max_coordinate_gap = Some(gap);
        self
    }

    /// Clusters by time alone.
    #[must_use]
    pub fn time_only(mut self) -> Self {
        self.max_coordinate_gap = None;
        self
    }

    /// Sets the minimum cluster size.
    #[must_use]
    pub fn with_min_cluster_size(mut self, size: usize) -> Self {
        self.min_cluster_size = size;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if `min_cluster_size` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.min_cluster_size == 0 {
            return Err(Error::config("min_cluster_size must be at least 1"));
        }
        Ok(())
    }
}

/// Streaming gap clusterer for a single plane.
#[derive(Debug)]
pub struct GapClusterer {
    config: GapClustererConfig,
    /// Hits inserted since the last clustering pass.
    pending: Vec<Hit>,
    /// The open, time-cohesive run.
    run: Vec<Hit>,
    /// Latest time in the open run.
    run_end: u64,
    clusters: Vec<Cluster>,
    stats: ClusteringStatistics,
}

impl GapClusterer {
    /// Creates a clusterer.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: GapClustererConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            pending: Vec::new(),
            run: Vec::new(),
            run_end: 0,
            clusters: Vec::new(),
            stats: ClusteringStatistics::default(),
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &GapClustererConfig {
        &self.config
    }

    /// Number of hits in the open run.
    #[must_use]
    pub fn open_hits(&self) -> usize {
        self.run.len()
    }

    fn close_run(&mut self) {
        if self.run.is_empty() {
            return;
        }
        let run = std::mem::take(&mut self.run);
        self.run_end = 0;
        for group in self.partition(run) {
            if group.len() < self.config.min_cluster_size {
                trace!(
                    "discarding {}-hit cluster below minimum {}",
                    group.len(),
                    self.config.min_cluster_size
                );
                self.stats.clusters_discarded += 1;
                continue;
            }
            self.stats.clusters_found += 1;
            self.clusters.push(group.into_iter().collect());
        }
    }

    /// Splits a closed run into groups cohesive in time and, if enabled,
    /// coordinate. Each split can break the other dimension's cohesion, so
    /// groups are split again until neither check divides them.
    fn partition(&self, run: Vec<Hit>) -> Vec<Vec<Hit>> {
        let max_time_gap = self.config.max_time_gap;
        let mut work = vec![run];
        let mut done = Vec::new();
        while let Some(mut group) = work.pop() {
            sort_by_time(&mut group);
            let mut parts = split_runs(group, |a, b| b.time - a.time > max_time_gap);
            if parts.len() == 1 {
                if let Some(max_gap) = self.config.max_coordinate_gap {
                    let mut group = parts.swap_remove(0);
                    group.sort_by_key(|hit| hit.coordinate);
                    parts = split_runs(group, |a, b| b.coordinate - a.coordinate > max_gap);
                }
                if parts.len() == 1 {
                    done.append(&mut parts);
                    continue;
                }
            }
            work.extend(parts.into_iter().rev());
        }
        done
    }
}

/// Cuts an ordered sequence wherever `breaks(previous, next)` holds.
fn split_runs(hits: Vec<Hit>, breaks: impl Fn(&Hit, &Hit) -> bool) -> Vec<Vec<Hit>> {
    let mut parts = Vec::new();
    let mut current: Vec<Hit> = Vec::new();
    for hit in hits {
        let split = current.last().is_some_and(|last| breaks(last, &hit));
        if split {
            parts.push(std::mem::take(&mut current));
        }
        current.push(hit);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

impl HitClusterer for GapClusterer {
    fn name(&self) -> &'static str {
        if self.config.max_coordinate_gap.is_some() {
            "gap-2d"
        } else {
            "gap"
        }
    }

    fn insert(&mut self, hit: Hit) {
        self.pending.push(hit);
    }

    fn cluster(&mut self, hits: &[Hit]) {
        for &hit in hits {
            if !hit.is_valid() {
                trace!("rejecting hit {hit:?}");
                self.stats.hits_rejected += 1;
                continue;
            }
            let gap = hit.time.saturating_sub(self.run_end);
            if !self.run.is_empty() && gap > self.config.max_time_gap {
                self.close_run();
            }
            self.run_end = self.run_end.max(hit.time);
            self.run.push(hit);
            self.stats.hits_processed += 1;
        }
    }

    fn cluster_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut pending = std::mem::take(&mut self.pending);
        sort_by_time(&mut pending);
        self.cluster(&pending);
        pending.clear();
        self.pending = pending;
    }

    fn flush(&mut self) {
        self.cluster_pending();
        self.close_run();
    }

    fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    fn take_clusters(&mut self) -> Vec<Cluster> {
        std::mem::take(&mut self.clusters)
    }

    fn statistics(&self) -> ClusteringStatistics {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time_only(gap: u64) -> GapClusterer {
        GapClusterer::new(GapClustererConfig::new().time_only().with_max_time_gap(gap)).unwrap()
    }

    #[test]
    fn test_zero_min_cluster_size_rejected() {
        let config = GapClustererConfig::new().with_min_cluster_size(0);
        assert!(matches!(
            GapClusterer::new(config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_empty_input() {
        let mut clusterer = time_only(5);
        clusterer.cluster(&[]);
        clusterer.flush();
        assert!(clusterer.is_empty());
        assert_eq!(clusterer.statistics(), ClusteringStatistics::default());
    }

    #[test]
    fn test_trailing_run_waits_for_flush() {
        let mut clusterer = time_only(5);
        clusterer.cluster(&[Hit::new(0, 1, 1, 0), Hit::new(3, 2, 1, 0)]);
        assert!(clusterer.is_empty());
        assert_eq!(clusterer.open_hits(), 2);

        clusterer.flush();
        assert_eq!(clusterer.clusters().len(), 1);
        assert_eq!(clusterer.clusters()[0].hit_count(), 2);
    }

    #[test]
    fn test_gap_equal_to_limit_joins() {
        let mut clusterer = time_only(5);
        clusterer.cluster(&[
            Hit::new(0, 1, 1, 0),
            Hit::new(5, 1, 1, 0),
            Hit::new(11, 1, 1, 0),
        ]);
        assert_eq!(clusterer.clusters().len(), 1);
        assert_eq!(clusterer.clusters()[0].time_end(), 5);
    }

    #[test]
    fn test_equal_times_share_cluster_with_zero_gap() {
        let mut clusterer = time_only(0);
        clusterer.cluster(&[
            Hit::new(7, 1, 1, 0),
            Hit::new(7, 9, 1, 0),
            Hit::new(8, 1, 1, 0),
        ]);
        clusterer.flush();
        let sizes: Vec<usize> = clusterer.clusters().iter().map(Cluster::hit_count).collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    #[test]
    fn test_flush_is_idempotent() {
        let mut clusterer = time_only(5);
        clusterer.cluster(&[Hit::new(0, 1, 1, 0), Hit::new(100, 1, 1, 0)]);
        clusterer.flush();
        let once = clusterer.clusters().to_vec();
        clusterer.flush();
        assert_eq!(clusterer.clusters(), once.as_slice());
        assert_eq!(clusterer.statistics().clusters_found, 2);
    }

    #[test]
    fn test_invalid_hits_counted() {
        let mut clusterer = time_only(5);
        clusterer.cluster(&[
            Hit::new(0, Hit::INVALID_COORD, 1, 0),
            Hit::new(1, 4, 1, Hit::PULSE_PLANE),
            Hit::new(2, 4, 1, 0),
        ]);
        clusterer.flush();
        let stats = clusterer.statistics();
        assert_eq!(stats.hits_rejected, 2);
        assert_eq!(stats.hits_processed, 1);
        assert_eq!(clusterer.clusters().len(), 1);
    }

    #[test]
    fn test_pending_hits_sorted_before_clustering() {
        let mut clusterer = time_only(5);
        for time in [30, 0, 2, 33, 4] {
            clusterer.insert(Hit::new(time, 1, 1, 0));
        }
        clusterer.cluster_pending();
        assert_eq!(clusterer.clusters().len(), 1);
        assert_eq!(clusterer.clusters()[0].hit_count(), 3);
        clusterer.flush();
        assert_eq!(clusterer.clusters()[1].time_start(), 30);
    }

    #[test]
    fn test_coordinate_split() {
        let config = GapClustererConfig::new()
            .with_max_time_gap(10)
            .with_max_coordinate_gap(2);
        let mut clusterer = GapClusterer::new(config).unwrap();
        clusterer.cluster(&[
            Hit::new(0, 10, 1, 0),
            Hit::new(1, 12, 1, 0),
            Hit::new(2, 40, 1, 0),
            Hit::new(3, 41, 1, 0),
        ]);
        clusterer.flush();
        let clusters = clusterer.take_clusters();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].coordinate_start(), 10);
        assert_eq!(clusters[0].coordinate_end(), 12);
        assert_eq!(clusters[1].coordinate_start(), 40);
        assert!(clusterer.is_empty());
    }

    #[test]
    fn test_coordinate_split_restores_time_cohesion() {
        // Same-strip hits at t=0 and t=10 are linked only through a far strip
        // at t=5; once that strip is split off they no longer belong together.
        let config = GapClustererConfig::new()
            .with_max_time_gap(5)
            .with_max_coordinate_gap(1);
        let mut clusterer = GapClusterer::new(config).unwrap();
        clusterer.cluster(&[
            Hit::new(0, 3, 1, 0),
            Hit::new(5, 100, 1, 0),
            Hit::new(10, 3, 1, 0),
        ]);
        clusterer.flush();
        assert_eq!(clusterer.clusters().len(), 3);
        for cluster in clusterer.clusters() {
            assert_eq!(cluster.hit_count(), 1);
        }
    }

    #[test]
    fn test_min_cluster_size_discards_noise() {
        let config = GapClustererConfig::new()
            .with_max_time_gap(5)
            .with_max_coordinate_gap(1)
            .with_min_cluster_size(2);
        let mut clusterer = GapClusterer::new(config).unwrap();
        clusterer.cluster(&[
            Hit::new(0, 1, 1, 0),
            Hit::new(1, 2, 1, 0),
            Hit::new(2, 50, 1, 0),
        ]);
        clusterer.flush();
        let stats = clusterer.statistics();
        assert_eq!(clusterer.clusters().len(), 1);
        assert_eq!(stats.clusters_found, 1);
        assert_eq!(stats.clusters_discarded, 1);
    }
}
