//! eventform-core: Data model for streaming neutron event formation.
//!
//! This crate provides the value types that flow through the pipeline:
//! per-channel [`Hit`]s, same-plane [`Cluster`]s with running statistics,
//! two-plane [`Event`]s, and the analyzed [`ReducedEvent`] output.
//!

pub mod cluster;
pub mod error;
pub mod event;
pub mod hit;
pub mod reduced;

pub use cluster::Cluster;
pub use error::{Error, Result};
pub use event::Event;
pub use hit::Hit;
pub use reduced::{ReducedEvent, ReducedHit};
