//! Hit file readers.
//!
//! Hit files are UTF-8 text with one hit per line:
//!
//! ```text
//! # comment
//! time,coordinate,weight,plane
//! 1000,12,340,0
//! 1003,87,120,1
//! ```
//!
//! Blank lines and `#` comments are skipped, as is a header line starting
//! with `time`.

use crate::{Error, Result};
use eventform_core::Hit;
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

/// Parses one line of a hit file.
///
/// Returns `Ok(None)` for lines that carry no hit.
///
/// # Errors
/// Returns [`Error::InvalidFormat`] naming `line_number` if the line is
/// neither skippable nor four valid fields.
pub fn parse_hit_line(line: &str, line_number: usize) -> Result<Option<Hit>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("time") {
        return Ok(None);
    }
    let fields: Vec<&str> = trimmed.split(',').map(str::trim).collect();
    let [time, coordinate, weight, plane] = fields.as_slice() else {
        return Err(Error::format(
            line_number,
            format!("expected 4 fields, found {}", fields.len()),
        ));
    };
    Ok(Some(Hit::new(
        field(time, "time", line_number)?,
        field(coordinate, "coordinate", line_number)?,
        field(weight, "weight", line_number)?,
        field(plane, "plane", line_number)?,
    )))
}

fn field<T: FromStr>(text: &str, name: &str, line_number: usize) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    text.parse()
        .map_err(|err| Error::format(line_number, format!("bad {name} {text:?}: {err}")))
}

/// Streaming reader over any buffered hit source.
pub struct HitReader<R> {
    source: R,
    line: String,
    line_number: usize,
}

impl HitReader<BufReader<File>> {
    /// Opens a hit file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        debug!("opened hit file {}", path.as_ref().display());
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> HitReader<R> {
    /// Wraps a buffered source.
    pub fn new(source: R) -> Self {
        Self {
            source,
            line: String::new(),
            line_number: 0,
        }
    }

    /// Lines consumed so far.
    #[must_use]
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Reads the next hit, skipping lines without one.
    ///
    /// # Errors
    /// Returns an error on I/O failure or a malformed line.
    pub fn next_hit(&mut self) -> Result<Option<Hit>> {
        loop {
            self.line.clear();
            if self.source.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            if let Some(hit) = parse_hit_line(&self.line, self.line_number)? {
                return Ok(Some(hit));
            }
        }
    }

    /// Reads up to `max` hits. An empty batch means the source is exhausted.
    ///
    /// # Errors
    /// Returns an error on I/O failure or a malformed line.
    pub fn read_batch(&mut self, max: usize) -> Result<Vec<Hit>> {
        let mut batch = Vec::with_capacity(max.min(1 << 16));
        while batch.len() < max {
            match self.next_hit()? {
                Some(hit) => batch.push(hit),
                None => break,
            }
        }
        Ok(batch)
    }

    /// Splits the remaining hits into batches of `batch_size`.
    pub fn batches(self, batch_size: usize) -> HitBatches<R> {
        HitBatches {
            reader: self,
            batch_size: batch_size.max(1),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for HitReader<R> {
    type Item = Result<Hit>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_hit().transpose()
    }
}

/// Iterator of fixed-size hit batches; the last batch may be shorter.
pub struct HitBatches<R> {
    reader: HitReader<R>,
    batch_size: usize,
    done: bool,
}

impl<R: BufRead> Iterator for HitBatches<R> {
    type Item = Result<Vec<Hit>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_batch(self.batch_size) {
            Ok(batch) if batch.is_empty() => {
                self.done = true;
                None
            }
            Ok(batch) => Some(Ok(batch)),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Reads every hit of a file.
///
/// # Errors
/// Returns an error if the file cannot be read or a line is malformed.
pub fn read_hits<P: AsRef<Path>>(path: P) -> Result<Vec<Hit>> {
    HitReader::open(path)?.collect()
}
