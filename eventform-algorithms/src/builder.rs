//! Event builder: routes hits to per-plane clusterers and drives a matcher.

use crate::clustering::HitClusterer;
use crate::matching::{validate_planes, ClusterMatcher};
use eventform_core::{Error, Event, Hit, Result};
use log::{debug, trace, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lifecycle of an [`EventBuilder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuilderState {
    /// No hits buffered since the last flush.
    #[default]
    Idle,
    /// Hits buffered, waiting for a flush.
    Accumulating,
    /// A flush is running.
    ///
    /// Outside of [`EventBuilder::flush`] this is only seen when a flush was
    /// interrupted by a panic; the builder stays here until a flush
    /// completes.
    Flushing,
}

/// Counters reported by an event builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BuilderStatistics {
    /// Hits routed to a plane clusterer.
    pub hits_inserted: u64,
    /// Hits refused for a sentinel value or an unselected plane.
    pub hits_rejected: u64,
    /// Completed flushes.
    pub flushes: u64,
}

/// Orchestrates clustering and matching for one plane pair.
///
/// Hits are buffered per plane by [`insert`](Self::insert). Each
/// [`flush`](Self::flush) clusters the buffers, hands the clusters to the
/// matcher and collects the events it produces.
pub struct EventBuilder {
    plane_a: u8,
    plane_b: u8,
    clusterer_a: Box<dyn HitClusterer>,
    clusterer_b: Box<dyn HitClusterer>,
    matcher: Box<dyn ClusterMatcher>,
    events: Vec<Event>,
    state: BuilderState,
    stats: BuilderStatistics,
}

impl EventBuilder {
    /// Assembles a builder from its parts.
    ///
    /// # Errors
    /// Returns an error if the planes are equal or reserved, or if the
    /// matcher was built for a different plane pair.
    pub fn new(
        plane_a: u8,
        plane_b: u8,
        clusterer_a: Box<dyn HitClusterer>,
        clusterer_b: Box<dyn HitClusterer>,
        matcher: Box<dyn ClusterMatcher>,
    ) -> Result<Self> {
        validate_planes(plane_a, plane_b)?;
        if matcher.planes() != (plane_a, plane_b) {
            return Err(Error::config(format!(
                "matcher planes {:?} differ from builder planes ({plane_a}, {plane_b})",
                matcher.planes()
            )));
        }
        Ok(Self {
            plane_a,
            plane_b,
            clusterer_a,
            clusterer_b,
            matcher,
            events: Vec::new(),
            state: BuilderState::Idle,
            stats: BuilderStatistics::default(),
        })
    }

    /// The two planes, A first.
    #[must_use]
    pub fn planes(&self) -> (u8, u8) {
        (self.plane_a, self.plane_b)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BuilderState {
        self.state
    }

    /// Buffers a hit for the clusterer of its plane.
    ///
    /// Hits with sentinel values or from other planes are dropped and
    /// counted.
    pub fn insert(&mut self, hit: Hit) {
        let clusterer = if !hit.is_valid() {
            None
        } else if hit.plane == self.plane_a {
            Some(&mut self.clusterer_a)
        } else if hit.plane == self.plane_b {
            Some(&mut self.clusterer_b)
        } else {
            None
        };
        match clusterer {
            Some(clusterer) => {
                clusterer.insert(hit);
                self.stats.hits_inserted += 1;
                if self.state == BuilderState::Idle {
                    self.state = BuilderState::Accumulating;
                }
            }
            None => {
                trace!("dropping hit {hit:?}");
                self.stats.hits_rejected += 1;
            }
        }
    }

    /// Buffers every hit of a batch.
    pub fn insert_all(&mut self, hits: impl IntoIterator<Item = Hit>) {
        for hit in hits {
            self.insert(hit);
        }
    }

    /// Clusters the buffered hits and runs a matching pass.
    ///
    /// With `full_flush`, trailing open clusters are closed and every
    /// queued cluster is forced into an event. Returns the number of events
    /// produced by this call.
    pub fn flush(&mut self, full_flush: bool) -> usize {
        if self.state == BuilderState::Flushing {
            warn!("resuming an interrupted flush");
        }
        self.state = BuilderState::Flushing;
        for (plane, clusterer) in [
            (self.plane_a, &mut self.clusterer_a),
            (self.plane_b, &mut self.clusterer_b),
        ] {
            clusterer.cluster_pending();
            if full_flush {
                clusterer.flush();
            }
            let clusters = clusterer.take_clusters();
            trace!("plane {plane}: {} clusters from {}", clusters.len(), clusterer.name());
            self.matcher.insert(plane, clusters);
        }
        self.matcher.match_events(full_flush);
        let produced = self.matcher.take_events();
        let count = produced.len();
        self.events.extend(produced);
        self.stats.flushes += 1;
        self.state = BuilderState::Idle;
        debug!(
            "flush (full={full_flush}): {count} events, {} clusters pending in {} matcher",
            self.matcher.unmatched(),
            self.matcher.name()
        );
        count
    }

    /// Events collected so far and not yet taken.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Moves the collected events out.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// The clusterer for plane A.
    #[must_use]
    pub fn clusterer_a(&self) -> &dyn HitClusterer {
        self.clusterer_a.as_ref()
    }

    /// The clusterer for plane B.
    #[must_use]
    pub fn clusterer_b(&self) -> &dyn HitClusterer {
        self.clusterer_b.as_ref()
    }

    /// The matcher.
    #[must_use]
    pub fn matcher(&self) -> &dyn ClusterMatcher {
        self.matcher.as_ref()
    }

    /// Counters since construction.
    #[must_use]
    pub fn statistics(&self) -> BuilderStatistics {
        self.stats
    }
}

impl std::fmt::Debug for EventBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBuilder")
            .field("planes", &(self.plane_a, self.plane_b))
            .field("clusterer_a", &self.clusterer_a.name())
            .field("clusterer_b", &self.clusterer_b.name())
            .field("matcher", &self.matcher.name())
            .field("events", &self.events.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gap::{GapClusterer, GapClustererConfig};
    use crate::clustering::ClusteringStatistics;
    use crate::matching::MatcherConfig;
    use eventform_core::Cluster;
    use std::panic::AssertUnwindSafe;

    fn builder(latency: u64) -> EventBuilder {
        let config = GapClustererConfig::new().with_max_time_gap(5).time_only();
        EventBuilder::new(
            0,
            1,
            Box::new(GapClusterer::new(config.clone()).unwrap()),
            Box::new(GapClusterer::new(config).unwrap()),
            MatcherConfig::new().with_latency(latency).build(0, 1).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_mismatched_matcher_planes() {
        let config = GapClustererConfig::new();
        let result = EventBuilder::new(
            0,
            1,
            Box::new(GapClusterer::new(config.clone()).unwrap()),
            Box::new(GapClusterer::new(config).unwrap()),
            MatcherConfig::new().build(1, 0).unwrap(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_state_transitions() {
        let mut builder = builder(0);
        assert_eq!(builder.state(), BuilderState::Idle);
        builder.insert(Hit::new(0, 1, 1, 0));
        assert_eq!(builder.state(), BuilderState::Accumulating);
        builder.flush(true);
        assert_eq!(builder.state(), BuilderState::Idle);
        assert_eq!(builder.statistics().flushes, 1);
    }

    struct PanicOnce {
        inner: GapClusterer,
        armed: bool,
    }

    impl HitClusterer for PanicOnce {
        fn name(&self) -> &'static str {
            "panic-once"
        }
        fn insert(&mut self, hit: Hit) {
            self.inner.insert(hit);
        }
        fn cluster(&mut self, hits: &[Hit]) {
            self.inner.cluster(hits);
        }
        fn cluster_pending(&mut self) {
            assert!(!std::mem::take(&mut self.armed), "clusterer failure");
            self.inner.cluster_pending();
        }
        fn flush(&mut self) {
            self.inner.flush();
        }
        fn clusters(&self) -> &[Cluster] {
            self.inner.clusters()
        }
        fn take_clusters(&mut self) -> Vec<Cluster> {
            self.inner.take_clusters()
        }
        fn statistics(&self) -> ClusteringStatistics {
            self.inner.statistics()
        }
    }

    #[test]
    fn test_interrupted_flush_stays_flushing() {
        let config = GapClustererConfig::new();
        let failing = PanicOnce {
            inner: GapClusterer::new(config.clone()).unwrap(),
            armed: true,
        };
        let mut builder = EventBuilder::new(
            0,
            1,
            Box::new(failing),
            Box::new(GapClusterer::new(config).unwrap()),
            MatcherConfig::new().with_latency(0).build(0, 1).unwrap(),
        )
        .unwrap();

        builder.insert(Hit::new(10, 1, 1, 0));
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| builder.flush(true)));
        assert!(result.is_err());
        assert_eq!(builder.state(), BuilderState::Flushing);
        assert_eq!(builder.statistics().flushes, 0);

        // new hits do not hide the interruption
        builder.insert(Hit::new(11, 2, 1, 0));
        assert_eq!(builder.state(), BuilderState::Flushing);

        assert_eq!(builder.flush(true), 1);
        assert_eq!(builder.state(), BuilderState::Idle);
        assert_eq!(builder.statistics().flushes, 1);
        assert_eq!(builder.events()[0].cluster_a().hit_count(), 2);
    }

    #[test]
    fn test_rejected_hits_do_not_change_state() {
        let mut builder = builder(0);
        builder.insert(Hit::new(0, 1, 1, 3));
        builder.insert(Hit::new(0, Hit::INVALID_COORD, 1, 0));
        assert_eq!(builder.state(), BuilderState::Idle);
        let stats = builder.statistics();
        assert_eq!(stats.hits_rejected, 2);
        assert_eq!(stats.hits_inserted, 0);
    }

    #[test]
    fn test_full_flush_pairs_planes() {
        let mut builder = builder(0);
        builder.insert_all([
            Hit::new(11, 4, 1, 1),
            Hit::new(10, 7, 1, 0),
            Hit::new(11, 8, 1, 0),
            Hit::new(500, 3, 1, 0),
        ]);
        assert_eq!(builder.flush(true), 2);
        let events = builder.take_events();
        assert!(events[0].both_planes());
        assert_eq!(events[0].total_hit_count(), 3);
        assert!(events[1].cluster_b().is_empty());
        assert!(builder.events().is_empty());
    }

    #[test]
    fn test_partial_flush_holds_recent_data() {
        let mut builder = builder(100);
        builder.insert_all([Hit::new(10, 7, 1, 0), Hit::new(10, 4, 1, 1)]);
        assert_eq!(builder.flush(false), 0);
        assert_eq!(builder.clusterer_a().statistics().hits_processed, 1);
        // nothing was closed, so the matcher has seen nothing yet
        assert_eq!(builder.matcher().unmatched(), 0);

        builder.insert_all([Hit::new(1000, 7, 1, 0), Hit::new(1000, 4, 1, 1)]);
        assert_eq!(builder.flush(false), 0);
        assert_eq!(builder.matcher().unmatched(), 2);

        // the first pair is ready but may still grow until a later cluster
        // proves it complete
        builder.insert_all([Hit::new(2000, 7, 1, 0), Hit::new(2000, 4, 1, 1)]);
        assert_eq!(builder.flush(false), 0);
        assert_eq!(builder.matcher().unmatched(), 4);

        assert_eq!(builder.flush(true), 3);
        assert_eq!(builder.events().len(), 3);
        assert!(builder.events().iter().all(Event::both_planes));
    }
}
