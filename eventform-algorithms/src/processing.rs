//! High-level helpers that chain clustering, matching and analysis.

use crate::analysis::{AnalyzerConfig, EventAnalyzer};
use crate::builder::EventBuilder;
use crate::gap::{GapClusterer, GapClustererConfig};
use crate::matching::{validate_planes, MatcherConfig};
use eventform_core::{Hit, ReducedEvent, Result};
use log::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Complete configuration for one plane pair.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// Plane routed to side A (reported as `x`).
    pub plane_a: u8,
    /// Plane routed to side B (reported as `y`).
    pub plane_b: u8,
    /// Clustering for plane A.
    pub clusterer_a: GapClustererConfig,
    /// Clustering for plane B.
    pub clusterer_b: GapClustererConfig,
    /// Matching of the two planes.
    pub matcher: MatcherConfig,
    /// Reduction of matched events.
    pub analyzer: AnalyzerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            plane_a: 0,
            plane_b: 1,
            clusterer_a: GapClustererConfig::default(),
            clusterer_b: GapClustererConfig::default(),
            matcher: MatcherConfig::default(),
            analyzer: AnalyzerConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the plane pair.
    #[must_use]
    pub fn with_planes(mut self, plane_a: u8, plane_b: u8) -> Self {
        self.plane_a = plane_a;
        self.plane_b = plane_b;
        self
    }

    /// Uses the same clustering for both planes.
    #[must_use]
    pub fn with_clusterer(mut self, config: GapClustererConfig) -> Self {
        self.clusterer_a = config.clone();
        self.clusterer_b = config;
        self
    }

    /// Sets the matcher configuration.
    #[must_use]
    pub fn with_matcher(mut self, config: MatcherConfig) -> Self {
        self.matcher = config;
        self
    }

    /// Sets the analyzer configuration.
    #[must_use]
    pub fn with_analyzer(mut self, config: AnalyzerConfig) -> Self {
        self.analyzer = config;
        self
    }

    /// Checks every part of the configuration.
    ///
    /// # Errors
    /// Returns the first configuration error found.
    pub fn validate(&self) -> Result<()> {
        validate_planes(self.plane_a, self.plane_b)?;
        self.clusterer_a.validate()?;
        self.clusterer_b.validate()?;
        self.analyzer.validate()
    }

    /// Builds an event builder with gap clusterers and the configured matcher.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn build_builder(&self) -> Result<EventBuilder> {
        EventBuilder::new(
            self.plane_a,
            self.plane_b,
            Box::new(GapClusterer::new(self.clusterer_a.clone())?),
            Box::new(GapClusterer::new(self.clusterer_b.clone())?),
            self.matcher.build(self.plane_a, self.plane_b)?,
        )
    }
}

/// Hits in, reduced events out.
#[derive(Debug)]
pub struct Pipeline {
    builder: EventBuilder,
    analyzer: EventAnalyzer,
}

impl Pipeline {
    /// Creates a pipeline.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            builder: config.build_builder()?,
            analyzer: EventAnalyzer::new(config.analyzer.clone())?,
        })
    }

    /// Buffers one hit.
    pub fn push(&mut self, hit: Hit) {
        self.builder.insert(hit);
    }

    /// Buffers a batch and returns the events that became final.
    pub fn process(&mut self, hits: &[Hit]) -> Vec<ReducedEvent> {
        self.builder.insert_all(hits.iter().copied());
        self.drain(false)
    }

    /// Closes everything still open and returns the remaining events.
    pub fn finish(&mut self) -> Vec<ReducedEvent> {
        self.drain(true)
    }

    fn drain(&mut self, full_flush: bool) -> Vec<ReducedEvent> {
        self.builder.flush(full_flush);
        self.builder
            .take_events()
            .iter()
            .map(|event| self.analyzer.analyze(event))
            .collect()
    }

    /// The underlying event builder.
    #[must_use]
    pub fn builder(&self) -> &EventBuilder {
        &self.builder
    }

    /// The analyzer applied to matched events.
    #[must_use]
    pub fn analyzer(&self) -> &EventAnalyzer {
        &self.analyzer
    }
}

/// Reduces a complete, finite hit sequence.
///
/// # Errors
/// Returns an error if the configuration is invalid.
pub fn reduce_hits(hits: &[Hit], config: &PipelineConfig) -> Result<Vec<ReducedEvent>> {
    let mut pipeline = Pipeline::new(config)?;
    let mut events = pipeline.process(hits);
    events.extend(pipeline.finish());
    Ok(events)
}

/// Reduces a sequence of hit batches, flushing after each batch and fully
/// at the end.
///
/// # Errors
/// Returns an error if the configuration is invalid.
pub fn reduce_stream<I>(batches: I, config: &PipelineConfig) -> Result<Vec<ReducedEvent>>
where
    I: IntoIterator<Item = Vec<Hit>>,
{
    let mut pipeline = Pipeline::new(config)?;
    let mut events = Vec::new();
    let mut batch_count = 0usize;
    for batch in batches {
        events.extend(pipeline.process(&batch));
        batch_count += 1;
    }
    events.extend(pipeline.finish());
    debug!("reduced {batch_count} batches into {} events", events.len());
    Ok(events)
}
