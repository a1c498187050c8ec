//! Match accumulation and output choices
//!
//! The classifier passes write [`ScoredClass`] records into one
//! [`AdaptResults`] accumulator per call. Scores here are corrected
//! match ratings in 0.0..=1.0 where 1.0 is a perfect match, unlike the
//! raw matcher distances they are derived from. The accumulator keeps
//! one record per class, tracks the running best non-fragment, and is
//! converted into [`Choice`] values at the end of the call.
//!
//! # See also
//!
//! C Tesseract: `ADAPT_RESULTS` and `Classify::AddNewResult()` in
//! `adaptmatch.cpp`

use tessclassify_core::Charset;

/// Floor for corrected ratings, the score of a hopeless match.
pub(crate) const WORST_POSSIBLE_RATING: f32 = 0.0;

/// One scored class, the unit the classifier passes accumulate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ScoredClass {
    pub class_id: usize,
    /// Corrected score in 0.0..=1.0, 1.0 for a perfect match.
    pub rating: f32,
    /// Best scoring config.
    pub config: usize,
    /// Runner-up config.
    pub config2: usize,
    /// Features the class left unexplained.
    pub feature_misses: usize,
    /// Font of the best config, -1 when untracked.
    pub font_id: i32,
    /// Font of the runner-up config, -1 when untracked.
    pub font_id2: i32,
    /// Scored against the adaptive store.
    pub adapted: bool,
}

/// One ranked output choice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Choice {
    /// Class in the classifier's character set.
    pub class_id: usize,
    /// Scaled match distance, lower is better.
    pub rating: f32,
    /// Scaled confidence, at most 0.0, higher is better.
    pub certainty: f32,
    /// Font of the best config, -1 when untracked.
    pub font_id: i32,
    /// Font of the runner-up config, -1 when untracked.
    pub font_id2: i32,
    /// Came from the adaptive store.
    pub adapted: bool,
}

/// Working accumulator for one classification call.
#[derive(Debug, Clone)]
pub(crate) struct AdaptResults {
    /// Blob length in standard feature units, for corrections and the
    /// noise rating.
    pub blob_length: i32,
    /// A non-fragment class has been scored.
    pub has_nonfragment: bool,
    /// Best non-fragment class seen so far.
    pub best_class: Option<usize>,
    /// Index of that class in `matches`.
    pub best_index: Option<usize>,
    /// Its rating, [`WORST_POSSIBLE_RATING`] while unset.
    pub best_rating: f32,
    /// One record per scored class, insertion order until sorted.
    pub matches: Vec<ScoredClass>,
}

impl AdaptResults {
    pub fn new() -> Self {
        Self {
            blob_length: i32::MAX,
            has_nonfragment: false,
            best_class: None,
            best_index: None,
            best_rating: WORST_POSSIBLE_RATING,
            matches: Vec::new(),
        }
    }

    /// Index of `class_id` in `matches`, if scored.
    pub fn find(&self, class_id: usize) -> Option<usize> {
        self.matches.iter().position(|m| m.class_id == class_id)
    }

    /// Rating of `class_id`, [`WORST_POSSIBLE_RATING`] when absent.
    pub fn scored(&self, class_id: Option<usize>) -> f32 {
        class_id
            .and_then(|id| self.find(id))
            .map(|index| self.matches[index].rating)
            .unwrap_or(WORST_POSSIBLE_RATING)
    }

    /// Accumulate one scored class.
    ///
    /// The record is dropped if it trails the best by more than
    /// `bad_match_pad` or does not improve an earlier score for the
    /// same class. An improved score replaces the earlier record's
    /// rating in place. Only non-fragments move the running best.
    pub fn add(&mut self, new: ScoredClass, bad_match_pad: f32, charset: &Charset) {
        let old_index = self.find(new.class_id);
        if new.rating + bad_match_pad < self.best_rating {
            return;
        }
        if let Some(index) = old_index {
            if new.rating <= self.matches[index].rating {
                return;
            }
        }

        let fragment = charset.is_fragment(new.class_id);
        if !fragment {
            self.has_nonfragment = true;
        }
        let index = match old_index {
            Some(index) => {
                self.matches[index].rating = new.rating;
                index
            }
            None => {
                self.matches.push(new);
                self.matches.len() - 1
            }
        };
        if new.rating > self.best_rating && !fragment {
            self.best_index = Some(index);
            self.best_class = Some(new.class_id);
            self.best_rating = new.rating;
        }
    }

    /// Recompute the best fields from scratch, for use after the match
    /// list has been reordered or filtered.
    pub fn compute_best(&mut self) {
        self.best_class = None;
        self.best_index = None;
        self.best_rating = WORST_POSSIBLE_RATING;
        for (index, m) in self.matches.iter().enumerate() {
            if m.rating > self.best_rating {
                self.best_rating = m.rating;
                self.best_class = Some(m.class_id);
                self.best_index = Some(index);
            }
        }
    }

    /// Sort best first; ties break toward the lower class id.
    pub fn sort_descending(&mut self) {
        self.matches
            .sort_by(|a, b| b.rating.total_cmp(&a.rating).then(a.class_id.cmp(&b.class_id)));
    }
}
