//! Hit type for per-channel detector readings.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single channel reading on one detector plane.
///
/// Hits are small value types and are copied freely. The time base is
/// whatever the readout decoder produced (clock ticks or nanoseconds);
/// the core never converts it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hit {
    /// Timestamp of the reading.
    pub time: u64,
    /// Channel index within the plane (strip, wire or grid number).
    pub coordinate: u16,
    /// Signal amplitude (ADC-like). Zero is legal.
    pub weight: u16,
    /// Physical plane that produced the reading.
    pub plane: u8,
}

impl Hit {
    /// Sentinel coordinate marking an unmapped channel.
    pub const INVALID_COORD: u16 = u16::MAX;
    /// Sentinel plane marking an unmapped or mixed plane.
    pub const INVALID_PLANE: u8 = u8::MAX;
    /// Plane id reserved for synthetic pulse-reference hits.
    pub const PULSE_PLANE: u8 = u8::MAX - 1;

    /// Creates a new hit.
    #[inline]
    #[must_use]
    pub fn new(time: u64, coordinate: u16, weight: u16, plane: u8) -> Self {
        Self {
            time,
            coordinate,
            weight,
            plane,
        }
    }

    /// Returns true if this is a physical hit that may be clustered.
    ///
    /// Sentinel coordinates and the invalid/pulse planes are rejected.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.coordinate != Self::INVALID_COORD
            && self.plane != Self::INVALID_PLANE
            && self.plane != Self::PULSE_PLANE
    }

    /// Returns true if the plane id is one of the reserved sentinels.
    #[inline]
    #[must_use]
    pub fn is_reserved_plane(plane: u8) -> bool {
        plane == Self::INVALID_PLANE || plane == Self::PULSE_PLANE
    }
}

/// Sorts hits by ascending time, keeping arrival order for equal times.
pub fn sort_by_time(hits: &mut [Hit]) {
    hits.sort_by_key(|hit| hit.time);
}
