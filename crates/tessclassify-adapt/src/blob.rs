//! Blob sample - extracted features for one character image
//!
//! Feature extraction runs upstream of this crate; the classifier
//! consumes one [`BlobSample`] per blob. The same outline is described
//! under two normalizations: baseline-normalized features feed the
//! adaptive store and the learning path, character-normalized features
//! feed the static store.
//!
//! # See also
//!
//! C Tesseract: `BlobToTrainingSample()` and `GetAdaptiveFeatures()` in
//! `adaptmatch.cpp`

use tessclassify_core::{IntFeature, OutlineFeature, PicoFeature, quantize_pico_features};

/// Extracted features for one character-sized image region.
#[derive(Debug, Clone, Default)]
pub struct BlobSample {
    /// Character-normalized quantized features, static matching.
    pub char_norm_features: Vec<IntFeature>,
    /// Per-class character normalization factors in 0..=255, indexed by
    /// class id.
    pub char_norm_factors: Vec<u8>,
    /// Baseline-normalized pico segments, adaptive matching and temp
    /// proto clustering.
    pub pico_features: Vec<PicoFeature>,
    /// Baseline-normalized outline segments, adaptive class bootstrap.
    pub outline_features: Vec<OutlineFeature>,
    /// Outline length in standard feature units.
    pub blob_length: i32,
    /// Bounding box top on the 0..=255 baseline grid.
    pub top: i32,
    /// Bounding box bottom on the 0..=255 baseline grid.
    pub bottom: i32,
}

impl BlobSample {
    /// Quantize the pico segments for matching against the adaptive
    /// store.
    pub fn baseline_features(&self) -> Vec<IntFeature> {
        quantize_pico_features(&self.pico_features)
    }
}
