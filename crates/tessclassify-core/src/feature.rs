//! Quantized features and bucket mappings
//!
//! A blob arrives at the matcher as an array of quantized (x, y, theta)
//! triples. The bucket mappings here are the contract between trained
//! template data and runtime: the same boundaries were used when the
//! static templates were built, so they must stay put.
//!
//! # See also
//!
//! C Tesseract: `INT_FEATURE_STRUCT`, `Bucket8For()` / `Bucket16For()` /
//! `CircBucketFor()` in `intproto.cpp`, `ComputeIntFeatures()` in
//! `float2int.cpp`

/// Number of buckets for 8-bit feature params.
pub const INT_FEAT_RANGE: i32 = 256;

/// Maximum quantized features per match call.
pub const MAX_NUM_INT_FEATURES: usize = 512;

/// Offset applied to x params before quantization.
pub const X_SHIFT: f32 = 0.5;
/// Offset applied to y params before quantization (char normalization).
pub const Y_SHIFT: f32 = 0.5;
/// Offset applied to y params before quantization (baseline normalization).
pub const BASELINE_Y_SHIFT: f32 = 0.25;
/// Offset applied to direction params before quantization.
pub const ANGLE_SHIFT: f32 = 0.0;

/// One quantized feature: 8-bit x/y buckets plus a circular angle bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntFeature {
    pub x: u8,
    pub y: u8,
    pub theta: u8,
}

impl IntFeature {
    /// Build from ints with clipping to the 8-bit range.
    pub fn new(x: i32, y: i32, theta: i32) -> Self {
        Self {
            x: x.clamp(0, 255) as u8,
            y: y.clamp(0, 255) as u8,
            theta: theta.clamp(0, 255) as u8,
        }
    }
}

/// One unquantized outline segment under baseline normalization.
///
/// The bootstrap path turns each of these directly into a prototype the
/// first time a class is adapted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlineFeature {
    pub x: f32,
    pub y: f32,
    pub length: f32,
    pub direction: f32,
}

/// One unquantized pico segment under baseline normalization.
///
/// Pico segments are fixed-length outline slices; runs of them cluster
/// into new prototypes during adaptation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PicoFeature {
    pub x: f32,
    pub y: f32,
    pub direction: f32,
}

/// `(param + offset) * num_buckets`, floored.
#[inline]
fn map_param(param: f32, offset: f32, num_buckets: i32) -> f32 {
    ((param + offset) * num_buckets as f32).floor()
}

/// Round-half-away-from-zero cast to int.
#[inline]
pub fn int_cast_rounded(x: f32) -> i32 {
    if x >= 0.0 { (x + 0.5) as i32 } else { (x - 0.5) as i32 }
}

/// Non-negative modulo.
#[inline]
fn modulo(a: i32, b: i32) -> i32 {
    ((a % b) + b) % b
}

/// Quantized bucket for a linear param, clipped to `[0, num_buckets-1]`.
pub fn bucket8_for(param: f32, offset: f32, num_buckets: i32) -> u8 {
    let bucket = int_cast_rounded(map_param(param, offset, num_buckets));
    bucket.clamp(0, num_buckets - 1) as u8
}

/// 16-bit variant of [`bucket8_for`] for the sub-bucket pruner fill.
pub fn bucket16_for(param: f32, offset: f32, num_buckets: i32) -> u16 {
    let bucket = int_cast_rounded(map_param(param, offset, num_buckets));
    bucket.clamp(0, num_buckets - 1) as u16
}

/// Quantized bucket for a circular param, taken modulo `num_buckets`.
pub fn circ_bucket_for(param: f32, offset: f32, num_buckets: i32) -> u8 {
    let bucket = int_cast_rounded(map_param(param, offset, num_buckets));
    modulo(bucket, num_buckets) as u8
}

/// Param value at the start of a bucket, inverse of the bucket mapping.
pub fn bucket_start(bucket: i32, offset: f32, num_buckets: i32) -> f32 {
    bucket as f32 / num_buckets as f32 - offset
}

/// Param value at the end of a bucket.
pub fn bucket_end(bucket: i32, offset: f32, num_buckets: i32) -> f32 {
    (bucket + 1) as f32 / num_buckets as f32 - offset
}

/// Quantize baseline-normalized pico segments for the adaptation matcher.
///
/// Baseline y runs -0.25..0.75, so the y shift differs from the
/// char-norm shift used by pre-quantized classification features.
pub fn quantize_pico_features(features: &[PicoFeature]) -> Vec<IntFeature> {
    features
        .iter()
        .map(|f| IntFeature {
            x: bucket8_for(f.x, X_SHIFT, INT_FEAT_RANGE),
            y: bucket8_for(f.y, BASELINE_Y_SHIFT, INT_FEAT_RANGE),
            theta: circ_bucket_for(f.direction, ANGLE_SHIFT, INT_FEAT_RANGE),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket8_center_and_clip() {
        // (0.0 + 0.5) * 256 = 128
        assert_eq!(bucket8_for(0.0, X_SHIFT, INT_FEAT_RANGE), 128);
        // below range clips to 0, above clips to 255
        assert_eq!(bucket8_for(-2.0, X_SHIFT, INT_FEAT_RANGE), 0);
        assert_eq!(bucket8_for(2.0, X_SHIFT, INT_FEAT_RANGE), 255);
    }

    #[test]
    fn test_bucket16_range() {
        let b = bucket16_for(0.3, Y_SHIFT, 24 * 256);
        assert_eq!(b, (0.8 * 24.0 * 256.0) as u16);
        assert_eq!(bucket16_for(9.0, Y_SHIFT, 24 * 256), 24 * 256 - 1);
    }

    #[test]
    fn test_circ_bucket_is_periodic() {
        for theta in [-0.7f32, -0.2, 0.0, 0.13, 0.49, 0.75, 0.999] {
            assert_eq!(
                circ_bucket_for(theta, ANGLE_SHIFT, INT_FEAT_RANGE),
                circ_bucket_for(theta + 1.0, ANGLE_SHIFT, INT_FEAT_RANGE),
                "angle {theta} not periodic"
            );
        }
    }

    #[test]
    fn test_circ_bucket_wraps_negative() {
        let b = circ_bucket_for(-0.1, ANGLE_SHIFT, INT_FEAT_RANGE);
        let expected = circ_bucket_for(0.9, ANGLE_SHIFT, INT_FEAT_RANGE);
        assert_eq!(b, expected);
    }

    #[test]
    fn test_bucket_start_end_invert_mapping() {
        let bucket = bucket8_for(0.2, X_SHIFT, 24) as i32;
        let start = bucket_start(bucket, X_SHIFT, 24);
        let end = bucket_end(bucket, X_SHIFT, 24);
        assert!(start <= 0.2 + 1.0 / 24.0);
        assert!(end > start);
        assert!((end - start - 1.0 / 24.0).abs() < 1e-6);
    }

    #[test]
    fn test_int_feature_clips() {
        let f = IntFeature::new(-5, 300, 128);
        assert_eq!((f.x, f.y, f.theta), (0, 255, 128));
    }

    #[test]
    fn test_quantize_pico_uses_baseline_shift() {
        let feats = [PicoFeature {
            x: 0.0,
            y: 0.0,
            direction: 0.25,
        }];
        let q = quantize_pico_features(&feats);
        assert_eq!(q.len(), 1);
        assert_eq!(q[0].x, 128);
        // (0.0 + 0.25) * 256 = 64
        assert_eq!(q[0].y, 64);
        assert_eq!(q[0].theta, 64);
    }
}
