//! Streaming hit clustering interface.

use eventform_core::{Cluster, Hit};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Counters reported by a hit clusterer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusteringStatistics {
    /// Valid hits fed through the clustering pass.
    pub hits_processed: u64,
    /// Hits refused because they carry a sentinel coordinate or plane.
    pub hits_rejected: u64,
    /// Clusters emitted to the completed list.
    pub clusters_found: u64,
    /// Clusters dropped for being smaller than the minimum size.
    pub clusters_discarded: u64,
}

impl ClusteringStatistics {
    /// Adds another set of counters to this one.
    pub fn accumulate(&mut self, other: &Self) {
        self.hits_processed += other.hits_processed;
        self.hits_rejected += other.hits_rejected;
        self.clusters_found += other.clusters_found;
        self.clusters_discarded += other.clusters_discarded;
    }
}

/// A stateful, streaming single-plane clusterer.
///
/// Hits arrive either one at a time through [`insert`](Self::insert) and are
/// clustered by [`cluster_pending`](Self::cluster_pending), or in time-sorted
/// slices through [`cluster`](Self::cluster). The trailing cluster of a pass
/// stays open because later hits may still join it; [`flush`](Self::flush)
/// closes it. Completed clusters accumulate until taken.
pub trait HitClusterer: Send {
    /// Short identifier for logging.
    fn name(&self) -> &'static str;

    /// Buffers a hit for the next [`cluster_pending`](Self::cluster_pending).
    fn insert(&mut self, hit: Hit);

    /// Clusters a slice of hits sorted by ascending time.
    fn cluster(&mut self, hits: &[Hit]);

    /// Sorts the buffered hits by time and clusters them.
    fn cluster_pending(&mut self);

    /// Clusters anything still buffered and closes the open cluster.
    ///
    /// Calling it twice in a row is the same as calling it once.
    fn flush(&mut self);

    /// Completed clusters not yet taken.
    fn clusters(&self) -> &[Cluster];

    /// Moves the completed clusters out, oldest first.
    fn take_clusters(&mut self) -> Vec<Cluster>;

    /// Returns true if no completed clusters are waiting.
    fn is_empty(&self) -> bool {
        self.clusters().is_empty()
    }

    /// Counters since construction.
    fn statistics(&self) -> ClusteringStatistics;
}
