//! File writers for reduced events.

use crate::{Error, Result};
use eventform_core::ReducedEvent;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Output encodings for reduced events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Comma separated, one header line.
    Csv,
    /// One JSON object per line.
    JsonLines,
}

impl OutputFormat {
    /// Picks the format from a path's extension (`.csv`, `.jsonl`).
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedFormat`] for any other extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("jsonl") => Ok(Self::JsonLines),
            _ => Err(Error::UnsupportedFormat(path.as_ref().display().to_string())),
        }
    }

    /// File extension without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::JsonLines => "jsonl",
        }
    }
}

/// Flat row written for each event; NaN becomes `null` in JSON.
#[derive(Serialize)]
struct EventRecord {
    time: u64,
    x_center: f64,
    x_time: f64,
    x_uncertainty_lower: u16,
    x_uncertainty_upper: u16,
    y_center: f64,
    y_time: f64,
    y_uncertainty_lower: u16,
    y_uncertainty_upper: u16,
    good: bool,
}

impl From<&ReducedEvent> for EventRecord {
    fn from(event: &ReducedEvent) -> Self {
        Self {
            time: event.time,
            x_center: event.x.center,
            x_time: event.x.time,
            x_uncertainty_lower: event.x.uncertainty_lower,
            x_uncertainty_upper: event.x.uncertainty_upper,
            y_center: event.y.center,
            y_time: event.y.time,
            y_uncertainty_lower: event.y.uncertainty_lower,
            y_uncertainty_upper: event.y.uncertainty_upper,
            good: event.good,
        }
    }
}

const CSV_HEADER: &str = "time,x_center,x_time,x_uncertainty_lower,x_uncertainty_upper,\
y_center,y_time,y_uncertainty_lower,y_uncertainty_upper,good";

/// Writer for reduced event output.
pub struct EventFileWriter<W: Write = BufWriter<File>> {
    writer: W,
    format: OutputFormat,
    written: u64,
}

impl EventFileWriter {
    /// Creates a file, choosing the format from its extension.
    ///
    /// # Errors
    /// Returns an error if the extension is unsupported or the file cannot
    /// be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let format = OutputFormat::from_path(&path)?;
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), format)
    }
}

impl<W: Write> EventFileWriter<W> {
    /// Wraps a sink; the CSV header is written immediately.
    ///
    /// # Errors
    /// Returns an error if the header cannot be written.
    pub fn new(mut writer: W, format: OutputFormat) -> Result<Self> {
        if format == OutputFormat::Csv {
            writeln!(writer, "{CSV_HEADER}")?;
        }
        Ok(Self {
            writer,
            format,
            written: 0,
        })
    }

    /// Appends events.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_events(&mut self, events: &[ReducedEvent]) -> Result<()> {
        for event in events {
            match self.format {
                OutputFormat::Csv => writeln!(
                    self.writer,
                    "{},{},{},{},{},{},{},{},{},{}",
                    event.time,
                    event.x.center,
                    event.x.time,
                    event.x.uncertainty_lower,
                    event.x.uncertainty_upper,
                    event.y.center,
                    event.y.time,
                    event.y.uncertainty_lower,
                    event.y.uncertainty_upper,
                    u8::from(event.good)
                )?,
                OutputFormat::JsonLines => {
                    serde_json::to_writer(&mut self.writer, &EventRecord::from(event))?;
                    self.writer.write_all(b"\n")?;
                }
            }
        }
        self.written += events.len() as u64;
        Ok(())
    }

    /// Events written so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes and returns the sink.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
