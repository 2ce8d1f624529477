//! Two-plane cluster matching.
//!
//! A [`Matcher`] keeps a queue of clusters from both planes and pairs them
//! into [`Event`]s once they are old enough that no earlier cluster can
//! still arrive. The grouping rule is supplied by a [`MatchStrategy`]; the
//! queue handling, readiness and output are shared.

use crate::analysis::TimeAlgorithm;
use crate::strategies::{CenterStrategy, EndStrategy, GapStrategy, OverlapStrategy};
use eventform_core::{Cluster, Error, Event, Hit, Result};
use log::{debug, trace, warn};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Counters reported by a matcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatchingStatistics {
    /// Events stashed to the output queue.
    pub events_matched: u64,
    /// Clusters refused on insertion.
    pub clusters_rejected: u64,
}

/// Rule deciding which clusters form one event.
pub trait MatchStrategy: Send {
    /// Short identifier for logging.
    fn name(&self) -> &'static str;

    /// Key the pending queue is sorted by before each pass.
    fn sort_key(&self, cluster: &Cluster) -> f64;

    /// Returns true if `cluster` joins the non-empty `event`.
    fn belongs(&self, event: &Event, cluster: &Cluster) -> bool;
}

/// Object-safe matcher interface used by the event builder.
pub trait ClusterMatcher: Send {
    /// Short identifier for logging.
    fn name(&self) -> &'static str;

    /// The two planes being matched, A first.
    fn planes(&self) -> (u8, u8);

    /// Queues clusters declared to come from `plane`.
    fn insert(&mut self, plane: u8, clusters: Vec<Cluster>);

    /// Queues one cluster, routed by its own plane.
    fn insert_cluster(&mut self, cluster: Cluster);

    /// Runs one matching pass and returns the number of events stashed.
    ///
    /// Without `flush`, clusters that are not yet ready stay queued and so
    /// does the event being assembled when the pass stops. With `flush`,
    /// everything queued ends up in an event.
    fn match_events(&mut self, flush: bool) -> usize;

    /// Events produced so far and not yet taken.
    fn events(&self) -> &[Event];

    /// Moves the produced events out, in the order they were stashed.
    fn take_events(&mut self) -> Vec<Event>;

    /// Number of clusters waiting to be matched.
    fn unmatched(&self) -> usize;

    /// Counters since construction.
    fn statistics(&self) -> MatchingStatistics;
}

/// Streaming matcher parameterized by its grouping rule.
pub struct Matcher<S> {
    strategy: S,
    latency: u64,
    plane_a: u8,
    plane_b: u8,
    latest_a: u64,
    latest_b: u64,
    unmatched: VecDeque<Cluster>,
    matched: Vec<Event>,
    stats: MatchingStatistics,
}

/// Groups clusters whose time windows overlap.
pub type OverlapMatcher = Matcher<OverlapStrategy>;
/// Groups clusters whose time windows come within a tolerated gap.
pub type GapMatcher = Matcher<GapStrategy>;
/// Groups clusters whose end times are close.
pub type EndMatcher = Matcher<EndStrategy>;
/// Pairs clusters whose estimated times are close, one per plane.
pub type CenterMatcher = Matcher<CenterStrategy>;

/// Checks a plane pair for use in a matcher or builder.
///
/// # Errors
/// Returns [`Error::InvalidPlane`] for a sentinel plane and
/// [`Error::InvalidConfig`] if both planes are the same.
pub fn validate_planes(plane_a: u8, plane_b: u8) -> Result<()> {
    for plane in [plane_a, plane_b] {
        if Hit::is_reserved_plane(plane) {
            return Err(Error::InvalidPlane(plane));
        }
    }
    if plane_a == plane_b {
        return Err(Error::config(format!(
            "matched planes must differ (both are {plane_a})"
        )));
    }
    Ok(())
}

impl<S: MatchStrategy> Matcher<S> {
    /// Creates a matcher for the given planes.
    ///
    /// # Errors
    /// Returns an error if the planes are equal or reserved.
    pub fn new(strategy: S, latency: u64, plane_a: u8, plane_b: u8) -> Result<Self> {
        validate_planes(plane_a, plane_b)?;
        Ok(Self {
            strategy,
            latency,
            plane_a,
            plane_b,
            latest_a: 0,
            latest_b: 0,
            unmatched: VecDeque::new(),
            matched: Vec::new(),
            stats: MatchingStatistics::default(),
        })
    }

    /// The grouping rule.
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Minimum age before a cluster may be matched.
    #[must_use]
    pub fn latency(&self) -> u64 {
        self.latency
    }

    /// The matcher's notion of the current time: the latest cluster start
    /// seen on the slower plane.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.latest_a.min(self.latest_b)
    }

    /// Returns true if nothing that would precede `cluster` can still arrive.
    #[must_use]
    pub fn ready_to_be_matched(&self, cluster: &Cluster) -> bool {
        self.now().saturating_sub(cluster.time_end()) >= self.latency
    }

    /// Clusters waiting to be matched, in queue order.
    pub fn pending(&self) -> impl Iterator<Item = &Cluster> {
        self.unmatched.iter()
    }

    fn accept(&mut self, plane: u8, cluster: Cluster) {
        if cluster.is_empty() || cluster.plane() != Some(plane) {
            trace!("rejecting cluster for plane {plane}: {cluster}");
            self.stats.clusters_rejected += 1;
            return;
        }
        let latest = if plane == self.plane_a {
            &mut self.latest_a
        } else {
            &mut self.latest_b
        };
        *latest = (*latest).max(cluster.time_start());
        self.unmatched.push_back(cluster);
    }

    fn stash_event(&mut self, event: Event) {
        trace!("stashing {event}");
        self.matched.push(event);
        self.stats.events_matched += 1;
    }

    fn empty_event(&self) -> Event {
        Event::new(self.plane_a, self.plane_b)
    }
}

impl<S: MatchStrategy> ClusterMatcher for Matcher<S> {
    fn name(&self) -> &'static str {
        self.strategy.name()
    }

    fn planes(&self) -> (u8, u8) {
        (self.plane_a, self.plane_b)
    }

    fn insert(&mut self, plane: u8, clusters: Vec<Cluster>) {
        if plane != self.plane_a && plane != self.plane_b {
            trace!("rejecting {} clusters from plane {plane}", clusters.len());
            self.stats.clusters_rejected += clusters.len() as u64;
            return;
        }
        for cluster in clusters {
            self.accept(plane, cluster);
        }
    }

    fn insert_cluster(&mut self, cluster: Cluster) {
        match cluster.plane() {
            Some(plane) if plane == self.plane_a || plane == self.plane_b => {
                self.accept(plane, cluster);
            }
            _ => {
                trace!("rejecting unroutable cluster {cluster}");
                self.stats.clusters_rejected += 1;
            }
        }
    }

    fn match_events(&mut self, flush: bool) -> usize {
        let strategy = &self.strategy;
        self.unmatched
            .make_contiguous()
            .sort_by(|a, b| strategy.sort_key(a).total_cmp(&strategy.sort_key(b)));

        let before = self.matched.len();
        let mut event = self.empty_event();
        while let Some(cluster) = self.unmatched.pop_front() {
            if !flush && !self.ready_to_be_matched(&cluster) {
                self.unmatched.push_front(cluster);
                break;
            }
            if !event.is_empty() && !self.strategy.belongs(&event, &cluster) {
                let next = self.empty_event();
                self.stash_event(std::mem::replace(&mut event, next));
            }
            event.merge(cluster);
        }

        if !event.is_empty() {
            if flush {
                self.stash_event(event);
            } else {
                // the event may still grow; give its clusters back
                for cluster in event.into_clusters().into_iter().rev() {
                    self.unmatched.push_front(cluster);
                }
            }
        }

        let stashed = self.matched.len() - before;
        debug!(
            "{} pass (flush={flush}, now={}): {stashed} events, {} clusters pending",
            self.strategy.name(),
            self.now(),
            self.unmatched.len()
        );
        stashed
    }

    fn events(&self) -> &[Event] {
        &self.matched
    }

    fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.matched)
    }

    fn unmatched(&self) -> usize {
        self.unmatched.len()
    }

    fn statistics(&self) -> MatchingStatistics {
        self.stats
    }
}

impl<S> fmt::Debug for Matcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("latency", &self.latency)
            .field("planes", &(self.plane_a, self.plane_b))
            .field("now", &self.latest_a.min(self.latest_b))
            .field("unmatched", &self.unmatched.len())
            .field("matched", &self.matched.len())
            .finish_non_exhaustive()
    }
}

/// Matching strategy selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MatcherKind {
    /// Time windows overlap.
    #[default]
    Overlap,
    /// Time windows overlap after extending by `allowed_time_gap`.
    Gap,
    /// End times within `max_delta_time`.
    End,
    /// Estimated times within `max_delta_time`, one cluster per plane.
    Center,
}

impl MatcherKind {
    /// All strategies, in declaration order.
    pub const ALL: [Self; 4] = [Self::Overlap, Self::Gap, Self::End, Self::Center];

    /// Canonical name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overlap => "overlap",
            Self::Gap => "gap",
            Self::End => "end",
            Self::Center => "center",
        }
    }
}

impl fmt::Display for MatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatcherKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| Error::config(format!("unknown matcher kind {s:?}")))
    }
}

/// Matcher configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MatcherConfig {
    /// Grouping rule.
    pub kind: MatcherKind,
    /// Minimum age before a cluster may be matched.
    pub latency: u64,
    /// Tolerance for the `end` and `center` strategies.
    pub max_delta_time: u64,
    /// Tolerated gap for the `gap` strategy.
    pub allowed_time_gap: u64,
    /// Time estimator for the `center` strategy.
    pub time_algorithm: TimeAlgorithm,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            kind: MatcherKind::Overlap,
            latency: 1000,
            max_delta_time: 100,
            allowed_time_gap: 50,
            time_algorithm: TimeAlgorithm::CenterOfMass,
        }
    }
}

impl MatcherConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the strategy.
    #[must_use]
    pub fn with_kind(mut self, kind: MatcherKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the latency.
    #[must_use]
    pub fn with_latency(mut self, latency: u64) -> Self {
        self.latency = latency;
        self
    }

    /// Sets the delta-time tolerance.
    #[must_use]
    pub fn with_max_delta_time(mut self, delta: u64) -> Self {
        self.max_delta_time = delta;
        self
    }

    /// Sets the tolerated gap.
    #[must_use]
    pub fn with_allowed_time_gap(mut self, gap: u64) -> Self {
        self.allowed_time_gap = gap;
        self
    }

    /// Sets the time estimator used by the center strategy.
    #[must_use]
    pub fn with_time_algorithm(mut self, algorithm: TimeAlgorithm) -> Self {
        self.time_algorithm = algorithm;
        self
    }

    /// Builds the configured matcher.
    ///
    /// # Errors
    /// Returns an error if the planes are equal or reserved.
    pub fn build(&self, plane_a: u8, plane_b: u8) -> Result<Box<dyn ClusterMatcher>> {
        if self.latency == 0 {
            warn!("matcher latency is 0; clusters are matched as soon as they arrive");
        }
        let matcher: Box<dyn ClusterMatcher> = match self.kind {
            MatcherKind::Overlap => {
                Box::new(Matcher::new(OverlapStrategy, self.latency, plane_a, plane_b)?)
            }
            MatcherKind::Gap => Box::new(Matcher::new(
                GapStrategy::new(self.allowed_time_gap),
                self.latency,
                plane_a,
                plane_b,
            )?),
            MatcherKind::End => Box::new(Matcher::new(
                EndStrategy::new(self.max_delta_time),
                self.latency,
                plane_a,
                plane_b,
            )?),
            MatcherKind::Center => Box::new(Matcher::new(
                CenterStrategy::new(self.max_delta_time, self.time_algorithm),
                self.latency,
                plane_a,
                plane_b,
            )?),
        };
        Ok(matcher)
    }
}
