//! Class pruner - coarse candidate scoring over the whole character set
//!
//! The first stage of recognition. Each feature indexes the coarse
//! pruner grid once and adds a 2-bit weight to every class's count, so
//! a single pass over the features scores all classes at once. Counts
//! are then discounted for classes that expect far more features than
//! the blob produced, disabled classes and fragments are zeroed, the
//! optional x-height penalty is subtracted, and every class within a
//! fixed fraction of the best surviving count goes on to the fine
//! matcher.
//!
//! # See also
//!
//! C Tesseract: `Classify::PruneClasses()` and class `ClassPruner` in
//! `intmatcher.cpp`

use tessclassify_core::inttemp::{
    CLASS_PRUNER_CLASS_MASK, CLASSES_PER_CP, CLASSES_PER_CP_WERD, NUM_BITS_PER_CLASS,
    NUM_CP_BUCKETS,
};
use tessclassify_core::{Charset, Cutoffs, IntFeature, IntTemplates, MAX_CUTOFF};

/// One surviving class from the pruning stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrunerResult {
    pub class_id: usize,
    /// Coarse distance rating in 0.0..=1.0, 0.0 for a full-count hit.
    pub rating: f32,
}

/// Tunable knobs for the pruning stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrunerSettings {
    /// Fraction of the best count (out of 256) a class must reach.
    pub pruning_factor: i32,
    /// Weight of the per-class x-height penalty.
    pub xheight_multiplier: i32,
    /// How slowly an expected-feature deficit discounts a count.
    pub cutoff_strength: i32,
    /// Drop character fragments from the results entirely.
    pub disable_character_fragments: bool,
}

impl Default for PrunerSettings {
    fn default() -> Self {
        Self {
            pruning_factor: 229,
            xheight_multiplier: 15,
            cutoff_strength: 7,
            disable_character_fragments: true,
        }
    }
}

/// Run the class pruner over `features` and return the survivors,
/// best first; ties break toward the lower class id.
///
/// `keep_this` forces one class into the results regardless of its
/// count. `normalization_factors` holds the per-class x-height
/// penalties to apply when character normalization produced a
/// trustworthy x-height; pass `None` to skip that adjustment.
pub fn prune_classes(
    templates: &IntTemplates,
    features: &[IntFeature],
    keep_this: Option<usize>,
    normalization_factors: Option<&[u8]>,
    expected_num_features: &Cutoffs,
    charset: &Charset,
    settings: &PrunerSettings,
) -> Vec<PrunerResult> {
    if features.is_empty() {
        return Vec::new();
    }

    let mut pruner = Pruner::new(templates);
    pruner.compute_scores(templates, features);
    pruner.adjust_for_expected_num_features(expected_num_features, settings.cutoff_strength);
    pruner.disable_disabled_classes(charset);
    if settings.disable_character_fragments {
        pruner.disable_fragments(charset);
    }
    match normalization_factors {
        Some(factors) => pruner.normalize_for_xheight(settings.xheight_multiplier, factors),
        None => pruner.no_normalization(),
    }
    pruner.prune_and_sort(settings.pruning_factor, keep_this, charset);
    pruner.setup_results()
}

/// Working state for one pruning pass.
struct Pruner {
    /// Raw 2-bit counts summed per class, sized in whole pruner blocks.
    class_count: Vec<i32>,
    /// Counts after x-height normalization.
    norm_count: Vec<i32>,
    num_features: i32,
    /// Real classes; the count vectors may be longer.
    max_classes: usize,
    pruning_threshold: i32,
    /// Survivors as (class id, normalized count), best first.
    selected: Vec<(usize, i32)>,
}

impl Pruner {
    fn new(templates: &IntTemplates) -> Self {
        let rounded_classes = templates.num_class_pruners() * CLASSES_PER_CP;
        Self {
            class_count: vec![0; rounded_classes],
            norm_count: vec![0; rounded_classes],
            num_features: 0,
            max_classes: templates.num_classes(),
            pruning_threshold: 1,
            selected: Vec::new(),
        }
    }

    /// Sum each feature's 2-bit pruner weight into every class count.
    fn compute_scores(&mut self, templates: &IntTemplates, features: &[IntFeature]) {
        self.num_features = features.len() as i32;
        for feature in features {
            let x = feature.x as usize * NUM_CP_BUCKETS >> 8;
            let y = feature.y as usize * NUM_CP_BUCKETS >> 8;
            let theta = feature.theta as usize * NUM_CP_BUCKETS >> 8;
            let mut class_id = 0;
            for pruner in templates.class_pruners() {
                for &cell_word in pruner.cell(x, y, theta) {
                    let mut word = cell_word;
                    for _ in 0..CLASSES_PER_CP_WERD {
                        self.class_count[class_id] += (word & CLASS_PRUNER_CLASS_MASK) as i32;
                        word >>= NUM_BITS_PER_CLASS;
                        class_id += 1;
                    }
                }
            }
        }
    }

    /// Discount classes that expect far more features than we have.
    fn adjust_for_expected_num_features(&mut self, expected: &Cutoffs, cutoff_strength: i32) {
        for class_id in 0..self.max_classes {
            let expected = expected
                .values()
                .get(class_id)
                .copied()
                .unwrap_or(MAX_CUTOFF) as i32;
            if self.num_features < expected {
                let deficit = expected - self.num_features;
                self.class_count[class_id] -= self.class_count[class_id] * deficit
                    / (self.num_features * cutoff_strength + deficit);
            }
        }
    }

    fn disable_disabled_classes(&mut self, charset: &Charset) {
        for class_id in 0..self.max_classes {
            if !charset.is_enabled(class_id) {
                self.class_count[class_id] = 0;
            }
        }
    }

    fn disable_fragments(&mut self, charset: &Charset) {
        for class_id in 0..self.max_classes {
            if charset.is_fragment(class_id) {
                self.class_count[class_id] = 0;
            }
        }
    }

    /// Subtract the weighted per-class x-height penalty.
    fn normalize_for_xheight(&mut self, multiplier: i32, factors: &[u8]) {
        for class_id in 0..self.max_classes {
            let factor = factors.get(class_id).copied().unwrap_or(0) as i32;
            self.norm_count[class_id] = self.class_count[class_id] - ((multiplier * factor) >> 8);
        }
    }

    fn no_normalization(&mut self) {
        for class_id in 0..self.max_classes {
            self.norm_count[class_id] = self.class_count[class_id];
        }
    }

    /// Keep every class within `pruning_factor`/256 of the best count
    /// and order the survivors by descending count, then ascending id.
    ///
    /// Fragments never set the bar, so at least one whole character
    /// survives even when a fragment scores best.
    fn prune_and_sort(&mut self, pruning_factor: i32, keep_this: Option<usize>, charset: &Charset) {
        let mut max_count = 0;
        for class_id in 0..self.max_classes {
            if self.norm_count[class_id] > max_count && !charset.is_fragment(class_id) {
                max_count = self.norm_count[class_id];
            }
        }
        self.pruning_threshold = ((max_count * pruning_factor) >> 8).max(1);

        self.selected.clear();
        for class_id in 0..self.max_classes {
            if self.norm_count[class_id] >= self.pruning_threshold || keep_this == Some(class_id) {
                self.selected.push((class_id, self.norm_count[class_id]));
            }
        }
        self.selected
            .sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    }

    /// Convert the survivors' counts to ratings.
    fn setup_results(&self) -> Vec<PrunerResult> {
        let denominator = CLASS_PRUNER_CLASS_MASK as f32 * self.num_features as f32;
        self.selected
            .iter()
            .map(|&(class_id, count)| PrunerResult {
                class_id,
                rating: 1.0 - count as f32 / denominator,
            })
            .collect()
    }
}
