//! eventform-io: File I/O for replaying recorded hit streams.
//!
//! This crate reads text hit files into [`Hit`](eventform_core::Hit)
//! batches and writes reduced events as CSV or JSON lines.
//!

mod error;
mod reader;
pub mod scanner;
mod writer;

pub use error::{Error, Result};
pub use reader::{parse_hit_line, read_hits, HitBatches, HitReader};
pub use scanner::HitSummary;
pub use writer::{EventFileWriter, OutputFormat};
