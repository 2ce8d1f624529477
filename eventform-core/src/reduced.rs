//! Reduced (analyzed) event data types.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Best estimate of position and time for one plane of an event.
///
/// A NaN `center` means the position could not be determined, e.g. the
/// plane had no hits or only zero-weight hits.
///
/// The uncertainty spans are strip counts: `uncertainty_lower` covers the
/// strips hit at the latest time, `uncertainty_upper` the strips of the
/// latest few time bins. Both are 0 when unknown.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReducedHit {
    /// Estimated coordinate (sub-channel precision).
    pub center: f64,
    /// Estimated time.
    pub time: f64,
    /// Strips spanned by the latest hits.
    pub uncertainty_lower: u16,
    /// Strips spanned by the latest time bins.
    pub uncertainty_upper: u16,
}

impl Default for ReducedHit {
    fn default() -> Self {
        Self::undetermined()
    }
}

impl ReducedHit {
    /// Creates a reduced hit.
    #[must_use]
    pub fn new(center: f64, time: f64) -> Self {
        Self {
            center,
            time,
            uncertainty_lower: 0,
            uncertainty_upper: 0,
        }
    }

    /// Sets the uncertainty spans.
    #[must_use]
    pub fn with_uncertainty(mut self, lower: u16, upper: u16) -> Self {
        self.uncertainty_lower = lower;
        self.uncertainty_upper = upper;
        self
    }

    /// A reduced hit whose center and time are both unknown.
    #[must_use]
    pub fn undetermined() -> Self {
        Self::new(f64::NAN, f64::NAN)
    }

    /// Returns true if the center is a finite number.
    #[inline]
    #[must_use]
    pub fn is_good(&self) -> bool {
        self.center.is_finite()
    }
}

/// Final per-event summary handed to pixel mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReducedEvent {
    /// Estimate for plane A.
    pub x: ReducedHit,
    /// Estimate for plane B.
    pub y: ReducedHit,
    /// Earlier of the two plane times.
    pub time: u64,
    /// Both plane centers are finite.
    pub good: bool,
}

impl ReducedEvent {
    /// Combines two per-plane estimates.
    ///
    /// `time` is the earlier of the two plane times, ignoring NaN, and
    /// truncated to whole ticks (0 if neither time is known).
    #[must_use]
    pub fn from_planes(x: ReducedHit, y: ReducedHit) -> Self {
        let earliest = x.time.min(y.time);
        let time = if earliest.is_finite() && earliest > 0.0 {
            earliest as u64
        } else {
            0
        };
        Self {
            x,
            y,
            time,
            good: x.is_good() && y.is_good(),
        }
    }
}

impl fmt::Display for ReducedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x=(center={}, time={}) y=(center={}, time={}) time={} {}",
            self.x.center,
            self.x.time,
            self.y.center,
            self.y.time,
            self.time,
            if self.good { "good" } else { "bad" }
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_reduced_event_good() {
        let event =
            ReducedEvent::from_planes(ReducedHit::new(10.5, 120.0), ReducedHit::new(3.0, 100.4));
        assert!(event.good);
        assert_eq!(event.time, 100);
        assert_eq!(event.x.center, 10.5);
    }

    #[test]
    fn test_reduced_event_missing_plane() {
        let event =
            ReducedEvent::from_planes(ReducedHit::new(5.0, 100.0), ReducedHit::undetermined());
        assert!(!event.good);
        assert_eq!(event.time, 100);
        assert!(event.y.center.is_nan());
    }

    #[test]
    fn test_reduced_event_nothing_known() {
        let event =
            ReducedEvent::from_planes(ReducedHit::undetermined(), ReducedHit::undetermined());
        assert!(!event.good);
        assert_eq!(event.time, 0);
    }

    #[test]
    fn test_nan_center_with_known_time() {
        let hit = ReducedHit::new(f64::NAN, 42.0);
        assert!(!hit.is_good());
        let event = ReducedEvent::from_planes(hit, ReducedHit::new(1.0, 50.0));
        assert!(!event.good);
        assert_eq!(event.time, 42);
    }

    #[test]
    fn test_uncertainty_spans() {
        let hit = ReducedHit::new(4.0, 10.0);
        assert_eq!((hit.uncertainty_lower, hit.uncertainty_upper), (0, 0));
        let hit = hit.with_uncertainty(2, 5);
        assert_eq!((hit.uncertainty_lower, hit.uncertainty_upper), (2, 5));
        assert_eq!(hit.center, 4.0);
        assert_eq!(ReducedHit::undetermined().uncertainty_upper, 0);
    }

    #[test]
    fn test_display() {
        let event =
            ReducedEvent::from_planes(ReducedHit::new(1.0, 2.0), ReducedHit::new(3.0, 4.0));
        assert_eq!(
            event.to_string(),
            "x=(center=1, time=2) y=(center=3, time=4) time=2 good"
        );
    }
}
