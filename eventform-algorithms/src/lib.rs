//! eventform-algorithms: Streaming event formation stages.
//!
//! This crate provides the stages between raw hits and reduced events:
//! - **Gap clustering** - time-gap grouping per plane, optionally refined by coordinate gap
//! - **Matching** - latency-bounded pairing of two planes (overlap, gap, end, center)
//! - **Analysis** - center and time estimation (center of mass, charge², uTPC)
//! - **Event building** - per-plane routing and flush orchestration
//!
#![warn(missing_docs)]

pub mod analysis;
mod builder;
pub mod clustering;
mod gap;
pub mod matching;
mod processing;
pub mod strategies;

pub use analysis::{AnalyzerConfig, EventAnalyzer, TimeAlgorithm};
pub use builder::{BuilderState, BuilderStatistics, EventBuilder};
pub use clustering::{ClusteringStatistics, HitClusterer};
pub use gap::{GapClusterer, GapClustererConfig};
pub use matching::{
    CenterMatcher, ClusterMatcher, EndMatcher, GapMatcher, MatchStrategy, Matcher, MatcherConfig,
    MatcherKind, MatchingStatistics, OverlapMatcher,
};
pub use processing::{reduce_hits, reduce_stream, Pipeline, PipelineConfig};
pub use strategies::{CenterStrategy, EndStrategy, GapStrategy, OverlapStrategy};
