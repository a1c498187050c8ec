//! Classifier tuning parameters
//!
//! One flat struct holding every knob the adaptive classifier reads,
//! with the stock defaults. Ratings compared against thresholds here
//! are matcher distances in 0.0..=1.0 unless a field says otherwise.
//!
//! # See also
//!
//! C Tesseract: the `matcher_*` and `classify_*` members declared in
//! `classify.h`

use tessclassify_match::PrunerSettings;

/// Tunable knobs for classification and online adaptation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierParams {
    /// Distance at or under which a match reinforces an existing config.
    pub good_threshold: f32,
    /// Distance over which an adaptive result forces a static re-run.
    pub reliable_adaptive_result: f32,
    /// How far a score may trail the best before it is dropped.
    pub bad_match_pad: f32,
    /// Scales distance into the output choice rating.
    pub rating_scale: f32,
    /// Scales distance into the output choice certainty.
    pub certainty_scale: f32,
    /// Penalty per feature the class left unexplained.
    pub miss_scale: f32,
    /// Penalty for a non-alphanumeric outside its expected vertical
    /// position, 0.0 turns the check off.
    pub misfit_junk_penalty: f32,
    /// Blob length at which the noise rating reaches one half.
    pub avg_noise_size: f32,
    /// Permanent classes needed before the adaptive store is consulted.
    pub min_permanent_classes: usize,
    /// Times a temp config must be seen before promotion is considered.
    pub min_examples: u32,
    /// Times seen after which promotion needs no further evidence.
    pub sufficient_examples: u32,
    /// Largest direction spread merged into one temp proto.
    pub max_angle_delta: f32,
    /// Weight of the normalization factor in static match corrections.
    pub integer_matcher_multiplier: i32,
    /// Certainty margin an adapted choice may trail the best by.
    pub adapted_pruning_factor: f32,
    /// Ceiling applied to the best certainty before that comparison.
    pub adapted_pruning_threshold: f32,
    /// Always classify with the static store only.
    pub static_matching_only: bool,
    /// Never fall back from the adaptive store to the static store.
    pub adaptive_matching_only: bool,
    /// Treat the input as digits, remapping `l` and `O` lookalikes.
    pub numeric_mode: bool,
    /// Initial learning switch, also the value `enable_learning`
    /// restores.
    pub enable_learning: bool,
    /// Gate gray-zone promotions on the evidence of ambiguous siblings.
    pub use_ambigs_for_adaption: bool,
    /// Coarse-stage knobs, shared by the static and adaptive passes.
    pub pruner: PrunerSettings,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            good_threshold: 0.125,
            reliable_adaptive_result: 0.0,
            bad_match_pad: 0.15,
            rating_scale: 1.5,
            certainty_scale: 20.0,
            miss_scale: 0.00390625,
            misfit_junk_penalty: 0.0,
            avg_noise_size: 12.0,
            min_permanent_classes: 1,
            min_examples: 3,
            sufficient_examples: 5,
            max_angle_delta: 0.015,
            integer_matcher_multiplier: 10,
            adapted_pruning_factor: 2.5,
            adapted_pruning_threshold: -1.0,
            static_matching_only: false,
            adaptive_matching_only: false,
            numeric_mode: false,
            enable_learning: true,
            use_ambigs_for_adaption: false,
            pruner: PrunerSettings::default(),
        }
    }
}
