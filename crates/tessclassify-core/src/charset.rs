//! Character set - class ids and their text metadata
//!
//! Every shape class the matcher knows is identified by a dense index
//! into a [`Charset`]. The classifier itself only moves ids around; the
//! charset supplies the text, the character properties that the result
//! filters key on (digit remapping, punctuation caps, fragment
//! suppression), the trained vertical ranges behind the misfit penalty,
//! and the ambiguity groups that gate config promotion.
//!
//! # See also
//!
//! C Tesseract: `UNICHARSET` in `unicharset.cpp`, `UnicharAmbigs` in
//! `ambigs.cpp`

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Per-class character properties.
///
/// The vertical ranges are trained blob positions on the baseline grid
/// (0..=255); the defaults leave them unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharProperties {
    pub is_alpha: bool,
    pub is_digit: bool,
    pub is_punct: bool,
    /// True for a piece of a split character rather than a whole one.
    pub is_fragment: bool,
    pub min_bottom: u8,
    pub max_bottom: u8,
    pub min_top: u8,
    pub max_top: u8,
}

impl Default for CharProperties {
    fn default() -> Self {
        Self {
            is_alpha: false,
            is_digit: false,
            is_punct: false,
            is_fragment: false,
            min_bottom: 0,
            max_bottom: u8::MAX,
            min_top: 0,
            max_top: u8::MAX,
        }
    }
}

impl CharProperties {
    /// Derive properties from the entry text.
    ///
    /// Fragment entries are named `|text|piece|total|`, everything else
    /// is classified by its first scalar. Vertical ranges stay
    /// unconstrained.
    pub fn infer(text: &str) -> Self {
        if text.len() >= 2 && text.starts_with('|') && text.ends_with('|') {
            return Self {
                is_fragment: true,
                ..Self::default()
            };
        }
        let first = match text.chars().next() {
            Some(ch) => ch,
            None => return Self::default(),
        };
        Self {
            is_alpha: first.is_alphabetic(),
            is_digit: first.is_ascii_digit(),
            is_punct: first.is_ascii_punctuation(),
            ..Self::default()
        }
    }
}

/// One charset entry.
#[derive(Debug, Clone)]
struct CharsetEntry {
    text: String,
    properties: CharProperties,
    enabled: bool,
    ambigs: Vec<usize>,
}

/// Table of shape classes, mapping between ids and text.
#[derive(Debug, Clone, Default)]
pub struct Charset {
    entries: Vec<CharsetEntry>,
    ids: HashMap<String, usize>,
    reverse_ambigs: Vec<Vec<usize>>,
}

impl Charset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of classes, including disabled ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add an entry with inferred properties; returns its id.
    ///
    /// Adding text that is already present returns the existing id.
    pub fn add(&mut self, text: &str) -> usize {
        self.add_with_properties(text, CharProperties::infer(text))
    }

    /// Add an entry with explicit properties; returns its id.
    pub fn add_with_properties(&mut self, text: &str, properties: CharProperties) -> usize {
        if let Some(&id) = self.ids.get(text) {
            return id;
        }
        let id = self.entries.len();
        self.entries.push(CharsetEntry {
            text: text.to_string(),
            properties,
            enabled: true,
            ambigs: Vec::new(),
        });
        self.ids.insert(text.to_string(), id);
        self.reverse_ambigs.push(Vec::new());
        id
    }

    pub fn contains(&self, text: &str) -> bool {
        self.ids.contains_key(text)
    }

    pub fn id_of(&self, text: &str) -> Option<usize> {
        self.ids.get(text).copied()
    }

    /// Text for a class id, or an empty string out of range.
    pub fn text_of(&self, id: usize) -> &str {
        self.entries.get(id).map_or("", |e| e.text.as_str())
    }

    /// Validate a class id against the table size.
    pub fn check_id(&self, id: usize) -> Result<()> {
        if id < self.entries.len() {
            Ok(())
        } else {
            Err(Error::IndexOutOfBounds {
                index: id,
                len: self.entries.len(),
            })
        }
    }

    pub fn is_alpha(&self, id: usize) -> bool {
        self.entries.get(id).is_some_and(|e| e.properties.is_alpha)
    }

    pub fn is_digit(&self, id: usize) -> bool {
        self.entries.get(id).is_some_and(|e| e.properties.is_digit)
    }

    pub fn is_punct(&self, id: usize) -> bool {
        self.entries.get(id).is_some_and(|e| e.properties.is_punct)
    }

    pub fn is_fragment(&self, id: usize) -> bool {
        self.entries
            .get(id)
            .is_some_and(|e| e.properties.is_fragment)
    }

    /// Whether the class participates in matching.
    pub fn is_enabled(&self, id: usize) -> bool {
        self.entries.get(id).is_some_and(|e| e.enabled)
    }

    /// Enable or disable a class without removing it.
    pub fn set_enabled(&mut self, id: usize, enabled: bool) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.enabled = enabled;
        }
    }

    /// Trained blob position ranges `(min_bottom, max_bottom, min_top,
    /// max_top)`, unconstrained out of range.
    pub fn top_bottom(&self, id: usize) -> (u8, u8, u8, u8) {
        match self.entries.get(id) {
            Some(e) => (
                e.properties.min_bottom,
                e.properties.max_bottom,
                e.properties.min_top,
                e.properties.max_top,
            ),
            None => (0, u8::MAX, 0, u8::MAX),
        }
    }

    /// Record which classes `id` is confusable with, replacing any
    /// previous group and rebuilding the reverse links.
    pub fn set_adaption_ambigs(&mut self, id: usize, ambigs: Vec<usize>) -> Result<()> {
        self.check_id(id)?;
        for &target in &ambigs {
            self.check_id(target)?;
        }
        let old = std::mem::take(&mut self.entries[id].ambigs);
        for &target in &old {
            self.reverse_ambigs[target].retain(|&source| source != id);
        }
        for &target in &ambigs {
            if !self.reverse_ambigs[target].contains(&id) {
                self.reverse_ambigs[target].push(id);
            }
        }
        self.entries[id].ambigs = ambigs;
        Ok(())
    }

    /// Classes this class can be confused with.
    pub fn ambigs_for_adaption(&self, id: usize) -> &[usize] {
        self.entries.get(id).map_or(&[], |e| e.ambigs.as_slice())
    }

    /// Classes that list this class as one of their confusions.
    pub fn reverse_ambigs_for_adaption(&self, id: usize) -> &[usize] {
        self.reverse_ambigs.get(id).map_or(&[], |v| v.as_slice())
    }

    /// Id of the space entry, if one was added.
    pub fn space_id(&self) -> Option<usize> {
        self.id_of(" ")
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = usize> + '_ {
        0..self.entries.len()
    }
}
