//! Expected-feature cutoffs - per-class feature count table
//!
//! The class pruner penalizes classes that expect far more features
//! than the blob produced. The expected counts ship as a text sidecar
//! next to the static templates: one `<unichar> <count>` pair per
//! line, whitespace separated, with `NULL` standing in for the space
//! character. Classes absent from the table keep [`MAX_CUTOFF`], which
//! disables the penalty for them.
//!
//! Unknown unichars are skipped so a table trained for a larger
//! character set still loads. Malformed records are an error.
//!
//! # See also
//!
//! C Tesseract: `ReadNewCutoffs()` in `cutoffs.cpp`

use std::io::Read;
use std::path::Path;

use crate::charset::Charset;
use crate::error::{Error, Result};

/// Cutoff assigned to classes missing from the table.
pub const MAX_CUTOFF: u16 = 1000;

/// Expected feature count per class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cutoffs {
    values: Vec<u16>,
}

impl Cutoffs {
    /// Create a table of `num_classes` entries, all [`MAX_CUTOFF`].
    pub fn new(num_classes: usize) -> Self {
        Self {
            values: vec![MAX_CUTOFF; num_classes],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Expected feature count for a class.
    pub fn for_class(&self, class_id: usize) -> u16 {
        self.values[class_id]
    }

    pub fn set(&mut self, class_id: usize, cutoff: u16) {
        self.values[class_id] = cutoff;
    }

    /// All cutoffs, indexed by class id.
    pub fn values(&self) -> &[u16] {
        &self.values
    }

    /// Parse a cutoff table, resolving unichars against `charset`.
    pub fn read_from_str(text: &str, charset: &Charset) -> Result<Self> {
        let mut cutoffs = Self::new(charset.len());
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let mut tokens = line.split_whitespace();
            let (Some(unichar), Some(count)) = (tokens.next(), tokens.next()) else {
                return Err(Error::InvalidFormat(format!("bad cutoff record `{line}`")));
            };
            if tokens.next().is_some() {
                return Err(Error::InvalidFormat(format!("bad cutoff record `{line}`")));
            }
            let cutoff: u16 = count
                .parse()
                .map_err(|_| Error::InvalidFormat(format!("bad cutoff count `{count}`")))?;

            let unichar = if unichar == "NULL" { " " } else { unichar };
            if let Some(class_id) = charset.id_of(unichar) {
                cutoffs.values[class_id] = cutoff;
            }
        }
        Ok(cutoffs)
    }

    /// Parse a cutoff table from a reader.
    pub fn read_from_reader(reader: &mut impl Read, charset: &Charset) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::read_from_str(&text, charset)
    }

    /// Parse a cutoff table from a file.
    pub fn read_from_file(path: impl AsRef<Path>, charset: &Charset) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::read_from_str(&text, charset)
    }
}
