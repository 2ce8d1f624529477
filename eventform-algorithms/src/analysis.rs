//! Per-plane position and time estimation.
#![allow(clippy::cast_precision_loss)]

use eventform_core::{Cluster, Error, Event, Hit, ReducedEvent, ReducedHit, Result};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Estimator used to reduce a cluster to a center and a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum TimeAlgorithm {
    /// Weight-averaged coordinate and time.
    #[default]
    CenterOfMass,
    /// Coordinate averaged with squared weights; time as center of mass.
    Charge2,
    /// Coordinate of the latest hit (micro-TPC track start).
    Utpc,
    /// The latest hit and its track neighbours, averaged with squared weights.
    UtpcWeighted,
}

impl TimeAlgorithm {
    /// All estimators, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::CenterOfMass,
        Self::Charge2,
        Self::Utpc,
        Self::UtpcWeighted,
    ];

    /// Canonical name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CenterOfMass => "center-of-mass",
            Self::Charge2 => "charge2",
            Self::Utpc => "utpc",
            Self::UtpcWeighted => "utpc-weighted",
        }
    }

    /// Time estimate for a cluster, NaN if it cannot be determined.
    ///
    /// The uTPC estimators report the latest hit time, the others the
    /// weight-averaged time.
    #[must_use]
    pub fn cluster_time(self, cluster: &Cluster) -> f64 {
        if cluster.is_empty() {
            return f64::NAN;
        }
        match self {
            Self::CenterOfMass | Self::Charge2 => cluster.time_center(),
            Self::Utpc | Self::UtpcWeighted => cluster.time_end() as f64,
        }
    }
}

impl fmt::Display for TimeAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.as_str() == normalized)
            .ok_or_else(|| Error::UnknownTimeAlgorithm(s.to_string()))
    }
}

/// Analyzer configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnalyzerConfig {
    /// Estimator applied to both planes.
    pub time_algorithm: TimeAlgorithm,
    /// Distinct latest timestamps covered by the upper uncertainty span.
    pub max_timebins: u16,
    /// Oldest time, relative to the cluster end, covered by the upper
    /// uncertainty span.
    pub max_timedif: u16,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            time_algorithm: TimeAlgorithm::CenterOfMass,
            max_timebins: 3,
            max_timedif: 7,
        }
    }
}

impl AnalyzerConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the estimator.
    #[must_use]
    pub fn with_time_algorithm(mut self, algorithm: TimeAlgorithm) -> Self {
        self.time_algorithm = algorithm;
        self
    }

    /// Sets the number of time bins of the upper uncertainty span.
    #[must_use]
    pub fn with_max_timebins(mut self, bins: u16) -> Self {
        self.max_timebins = bins;
        self
    }

    /// Sets the time window of the upper uncertainty span.
    #[must_use]
    pub fn with_max_timedif(mut self, window: u16) -> Self {
        self.max_timedif = window;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if `max_timebins` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_timebins == 0 {
            return Err(Error::config("max_timebins must be at least 1"));
        }
        Ok(())
    }
}

/// Reduces events to per-plane center and time estimates.
#[derive(Clone, Debug, Default)]
pub struct EventAnalyzer {
    config: AnalyzerConfig,
}

impl EventAnalyzer {
    /// Creates an analyzer.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Creates an analyzer with default parameters for the given estimator.
    #[must_use]
    pub fn with_algorithm(algorithm: TimeAlgorithm) -> Self {
        Self {
            config: AnalyzerConfig::new().with_time_algorithm(algorithm),
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Reduces both planes of an event.
    #[must_use]
    pub fn analyze(&self, event: &Event) -> ReducedEvent {
        ReducedEvent::from_planes(
            self.analyze_cluster(event.cluster_a()),
            self.analyze_cluster(event.cluster_b()),
        )
    }

    /// Reduces a single cluster.
    ///
    /// An empty cluster yields NaN for both values; a cluster whose weights
    /// sum to zero yields a NaN center. The uncertainty spans are filled in
    /// for every non-empty cluster.
    #[must_use]
    pub fn analyze_cluster(&self, cluster: &Cluster) -> ReducedHit {
        if cluster.is_empty() {
            return ReducedHit::undetermined();
        }
        let algorithm = self.config.time_algorithm;
        let time = algorithm.cluster_time(cluster);
        let center = if cluster.weight_sum() == 0.0 {
            f64::NAN
        } else {
            match algorithm {
                TimeAlgorithm::CenterOfMass => cluster.coordinate_center(),
                TimeAlgorithm::Charge2 => cluster.coordinate_center2(),
                TimeAlgorithm::Utpc => utpc_center(cluster),
                TimeAlgorithm::UtpcWeighted => utpc_weighted_center(cluster),
            }
        };
        let (lower, upper) = self.uncertainty(cluster);
        ReducedHit::new(center, time).with_uncertainty(lower, upper)
    }

    /// Strip spans of the latest hits and of the latest time bins.
    ///
    /// Hits are taken newest first while they are no older than
    /// `time_end - max_timedif` and fall into one of the first
    /// `max_timebins` distinct timestamps.
    fn uncertainty(&self, cluster: &Cluster) -> (u16, u16) {
        let mut hits: Vec<Hit> = cluster.hits().to_vec();
        hits.sort_by(|a, b| b.time.cmp(&a.time));
        let earliest = cluster
            .time_end()
            .saturating_sub(u64::from(self.config.max_timedif));

        let mut latest = Span::default();
        let mut recent = Span::default();
        let mut bins: Vec<u64> = Vec::new();
        for hit in &hits {
            if hit.time == cluster.time_end() {
                latest.add(hit.coordinate);
            }
            let known_bin = bins.last() == Some(&hit.time);
            if hit.time < earliest
                || (!known_bin && bins.len() >= usize::from(self.config.max_timebins))
            {
                break;
            }
            if !known_bin {
                bins.push(hit.time);
            }
            recent.add(hit.coordinate);
        }
        (latest.strips(), recent.strips())
    }
}

/// Inclusive coordinate range.
#[derive(Default)]
struct Span(Option<(u16, u16)>);

impl Span {
    fn add(&mut self, coordinate: u16) {
        self.0 = Some(match self.0 {
            Some((low, high)) => (low.min(coordinate), high.max(coordinate)),
            None => (coordinate, coordinate),
        });
    }

    fn strips(&self) -> u16 {
        self.0.map_or(0, |(low, high)| high - low + 1)
    }
}

fn utpc_center(cluster: &Cluster) -> f64 {
    cluster
        .utpc_index()
        .map_or(f64::NAN, |index| f64::from(cluster.hits()[index].coordinate))
}

fn utpc_weighted_center(cluster: &Cluster) -> f64 {
    let (mass, weight) = cluster
        .utpc_neighbourhood()
        .iter()
        .fold((0.0, 0.0), |(mass, weight), hit| {
            let w2 = f64::from(hit.weight) * f64::from(hit.weight);
            (mass + f64::from(hit.coordinate) * w2, weight + w2)
        });
    if weight == 0.0 {
        f64::NAN
    } else {
        mass / weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn track() -> Cluster {
        [
            Hit::new(1, 0, 4, 0),
            Hit::new(2, 2, 2, 0),
            Hit::new(3, 3, 3, 0),
            Hit::new(4, 4, 4, 0),
            Hit::new(5, 5, 3, 0),
            Hit::new(5, 7, 1, 0),
        ]
        .into_iter()
        .collect()
    }

    fn analyze(config: AnalyzerConfig, cluster: &Cluster) -> ReducedHit {
        EventAnalyzer::new(config).unwrap().analyze_cluster(cluster)
    }

    #[test]
    fn test_parse_names() {
        for algorithm in TimeAlgorithm::ALL {
            assert_eq!(algorithm.to_string().parse::<TimeAlgorithm>().unwrap(), algorithm);
        }
        assert_eq!(
            "utpc_weighted".parse::<TimeAlgorithm>().unwrap(),
            TimeAlgorithm::UtpcWeighted
        );
        assert_eq!(
            "Center_Of_Mass".parse::<TimeAlgorithm>().unwrap(),
            TimeAlgorithm::CenterOfMass
        );
        assert_eq!(
            "median".parse::<TimeAlgorithm>(),
            Err(Error::UnknownTimeAlgorithm("median".to_string()))
        );
    }

    #[test]
    fn test_zero_timebins_rejected() {
        let config = AnalyzerConfig::new().with_max_timebins(0);
        assert!(EventAnalyzer::new(config).is_err());
        assert!(EventAnalyzer::new(AnalyzerConfig::new().with_max_timebins(1)).is_ok());
    }

    #[test]
    fn test_center_of_mass() {
        let hit = analyze(AnalyzerConfig::new(), &track());
        assert_relative_eq!(hit.center, 3.0);
        assert_relative_eq!(hit.time, 53.0 / 17.0);
    }

    #[test]
    fn test_charge2() {
        let config = AnalyzerConfig::new().with_time_algorithm(TimeAlgorithm::Charge2);
        let hit = analyze(config, &track());
        assert_relative_eq!(hit.center, 151.0 / 55.0);
        assert_relative_eq!(hit.time, 53.0 / 17.0);
    }

    #[test]
    fn test_utpc() {
        let config = AnalyzerConfig::new().with_time_algorithm(TimeAlgorithm::Utpc);
        let hit = analyze(config, &track());
        assert_relative_eq!(hit.center, 7.0);
        assert_relative_eq!(hit.time, 5.0);
    }

    #[test]
    fn test_utpc_weighted_track() {
        // strip 7 and its neighbour strip 5, weights squared
        let config = AnalyzerConfig::new().with_time_algorithm(TimeAlgorithm::UtpcWeighted);
        let hit = analyze(config, &track());
        assert_relative_eq!(hit.center, 5.2);
        assert_relative_eq!(hit.time, 5.0);
    }

    #[test]
    fn test_utpc_two_strips() {
        let cluster: Cluster = [Hit::new(2, 0, 2, 0), Hit::new(0, 1, 4, 0)]
            .into_iter()
            .collect();
        let hit = EventAnalyzer::with_algorithm(TimeAlgorithm::Utpc).analyze_cluster(&cluster);
        assert_relative_eq!(hit.center, 0.0);
        assert_relative_eq!(hit.time, 2.0);

        let hit =
            EventAnalyzer::with_algorithm(TimeAlgorithm::UtpcWeighted).analyze_cluster(&cluster);
        assert_relative_eq!(hit.center, 0.8);
        assert_relative_eq!(hit.time, 2.0);
    }

    #[test]
    fn test_utpc_weighted_inner_strip() {
        // latest strip 2 sits between strips 1 and 3
        let cluster: Cluster = [
            Hit::new(1, 0, 1, 0),
            Hit::new(4, 1, 1, 0),
            Hit::new(9, 2, 2, 0),
            Hit::new(6, 3, 1, 0),
            Hit::new(2, 4, 5, 0),
        ]
        .into_iter()
        .collect();
        let hit =
            EventAnalyzer::with_algorithm(TimeAlgorithm::UtpcWeighted).analyze_cluster(&cluster);
        assert_relative_eq!(hit.center, 2.0);
    }

    #[test]
    fn test_uncertainty_spans() {
        // time bins newest first: 5 (strips 5, 7), 4 (strip 4), 3 (strip 3)
        let hit = analyze(AnalyzerConfig::new(), &track());
        assert_eq!(hit.uncertainty_lower, 3);
        assert_eq!(hit.uncertainty_upper, 5);

        let hit = analyze(AnalyzerConfig::new().with_max_timebins(1), &track());
        assert_eq!(hit.uncertainty_upper, 3);

        let hit = analyze(AnalyzerConfig::new().with_max_timedif(1), &track());
        assert_eq!(hit.uncertainty_upper, 4);

        let hit = analyze(AnalyzerConfig::new().with_max_timebins(10), &track());
        assert_eq!(hit.uncertainty_upper, 8);

        let hit = EventAnalyzer::default().analyze_cluster(&Cluster::new());
        assert_eq!((hit.uncertainty_lower, hit.uncertainty_upper), (0, 0));
    }

    #[test]
    fn test_zero_weight_center_is_nan() {
        let cluster: Cluster = [Hit::new(10, 3, 0, 0), Hit::new(12, 4, 0, 0)]
            .into_iter()
            .collect();
        for algorithm in TimeAlgorithm::ALL {
            let hit = EventAnalyzer::with_algorithm(algorithm).analyze_cluster(&cluster);
            assert!(hit.center.is_nan(), "{algorithm}");
            assert!(!hit.is_good());
        }
        let hit = EventAnalyzer::with_algorithm(TimeAlgorithm::Utpc).analyze_cluster(&cluster);
        assert_relative_eq!(hit.time, 12.0);
    }

    #[test]
    fn test_empty_cluster_undetermined() {
        for algorithm in TimeAlgorithm::ALL {
            let hit = EventAnalyzer::with_algorithm(algorithm).analyze_cluster(&Cluster::new());
            assert!(hit.center.is_nan());
            assert!(hit.time.is_nan());
        }
    }

    #[test]
    fn test_analyze_event() {
        let mut event = Event::new(0, 1);
        event.merge([Hit::new(100, 10, 1, 0), Hit::new(110, 12, 1, 0)].into_iter().collect());
        event.merge([Hit::new(90, 5, 2, 1)].into_iter().collect());
        let reduced = EventAnalyzer::default().analyze(&event);
        assert!(reduced.good);
        assert_relative_eq!(reduced.x.center, 11.0);
        assert_relative_eq!(reduced.y.center, 5.0);
        assert_eq!(reduced.time, 90);
    }

    #[test]
    fn test_analyze_single_plane_event() {
        let mut event = Event::new(0, 1);
        event.merge([Hit::new(100, 10, 1, 0)].into_iter().collect());
        let reduced = EventAnalyzer::default().analyze(&event);
        assert!(!reduced.good);
        assert_eq!(reduced.time, 100);
    }
}
