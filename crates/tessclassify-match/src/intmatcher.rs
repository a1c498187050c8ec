//! Integer matcher - fine evidence scoring against one integer class
//!
//! The second stage of recognition. Every feature is gated through the
//! class's proto pruner; each surviving proto gets a fixed-point
//! point-to-line distance plus a weighted circular angle difference,
//! and the squared result indexes a precomputed similarity-to-evidence
//! table. Per-config sums are normalized by feature count plus config
//! length, so a short match against a long template scores as badly as
//! a long match against a short one.
//!
//! The same evidence tables answer three questions:
//! [`IntegerMatcher::match_class`] for the best config and its rating,
//! [`IntegerMatcher::find_good_protos`] for protos worth keeping when a
//! temporary config is promoted, and
//! [`IntegerMatcher::find_bad_features`] for features no proto claims.
//!
//! # See also
//!
//! C Tesseract: `IntegerMatcher::Match()`, `FindGoodProtos()`,
//! `FindBadFeatures()` in `intmatcher.cpp`

use tessclassify_core::inttemp::{PRUNER_ANGLE, PRUNER_X, PRUNER_Y, WERDS_PER_PP_VECTOR};
use tessclassify_core::{BitVec, IntClass, IntFeature, MAX_NUM_CONFIGS, PROTOS_PER_PROTO_SET};

/// Bits of resolution in the similarity-to-evidence table index.
const SE_TABLE_BITS: u32 = 9;
/// Entries in the similarity-to-evidence table.
const SE_TABLE_SIZE: usize = 1 << SE_TABLE_BITS;
/// Similarity (squared normalized distance) mapped to half evidence.
const SIMILARITY_CENTER: f64 = 0.0075;

/// Bits of the table index kept by the evidence lookup.
const EVIDENCE_TABLE_BITS: u32 = 9;
/// Bits of the distance multiplicands kept before squaring.
const INT_EVIDENCE_TRUNC_BITS: u32 = 14;
/// Weight of one angle bucket relative to the perpendicular distance.
const INT_THETA_FUDGE: i32 = 128;

/// Shift applied to distance multiplicands before squaring.
const MULT_TRUNC_SHIFT_BITS: u32 = 14 - INT_EVIDENCE_TRUNC_BITS;
/// Shift applied to the squared distance before the table lookup.
const TABLE_TRUNC_SHIFT_BITS: u32 = 27 - SE_TABLE_BITS - 2 * MULT_TRUNC_SHIFT_BITS;
/// Largest truncated multiplicand.
const EVIDENCE_MULT_MASK: i32 = (1 << INT_EVIDENCE_TRUNC_BITS) - 1;
/// Largest squared distance with nonzero evidence.
const EVIDENCE_TABLE_MASK: u32 = ((1 << EVIDENCE_TABLE_BITS) - 1) << (SE_TABLE_BITS - EVIDENCE_TABLE_BITS);

/// Evidence slots kept per proto.
///
/// A proto accumulates at most this many feature evidences, best first;
/// protos longer than this are judged on their strongest slots only.
pub const MAX_PROTO_INDEX: usize = 24;

/// Outcome of matching one feature set against one class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    /// Distance rating in 0.0..=1.0, 0.0 for a perfect match.
    pub rating: f32,
    /// Best scoring config.
    pub config: usize,
    /// Runner-up config.
    pub config2: usize,
    /// Features that produced no evidence for any config.
    pub feature_misses: usize,
}

impl Default for MatchResult {
    fn default() -> Self {
        Self {
            rating: 1.0,
            config: 0,
            config2: 0,
            feature_misses: 0,
        }
    }
}

/// Per-match evidence accumulators, sized for one class.
struct ScratchEvidence {
    /// Best evidence per config for the feature being processed.
    feature_evidence: [u8; MAX_NUM_CONFIGS],
    /// Evidence per config summed over all features.
    sum_feature_evidence: [i32; MAX_NUM_CONFIGS],
    /// Strongest evidences per proto, sorted descending.
    proto_evidence: Vec<[u8; MAX_PROTO_INDEX]>,
}

impl ScratchEvidence {
    fn new(class: &IntClass) -> Self {
        Self {
            feature_evidence: [0; MAX_NUM_CONFIGS],
            sum_feature_evidence: [0; MAX_NUM_CONFIGS],
            proto_evidence: vec![[0; MAX_PROTO_INDEX]; class.num_protos()],
        }
    }

    fn clear_feature_evidence(&mut self, class: &IntClass) {
        self.feature_evidence[..class.num_configs()].fill(0);
    }

    /// Add each proto's kept evidence into every config containing it.
    fn update_sum_of_proto_evidences(&mut self, class: &IntClass, config_mask: &BitVec) {
        for proto_id in 0..class.num_protos() {
            let slots = (class.proto_length(proto_id) as usize).min(MAX_PROTO_INDEX);
            let total: i32 = self.proto_evidence[proto_id][..slots]
                .iter()
                .map(|&evidence| evidence as i32)
                .sum();
            let mut config_word = class.proto(proto_id).configs[0] & config_mask.word(0);
            let mut config_id = 0;
            while config_word != 0 {
                if config_word & 1 != 0 {
                    self.sum_feature_evidence[config_id] += total;
                }
                config_word >>= 1;
                config_id += 1;
            }
        }
    }

    /// Scale config sums into a common range regardless of feature
    /// count and template length.
    fn normalize_sums(&mut self, class: &IntClass, num_features: usize) {
        for config_id in 0..class.num_configs() {
            self.sum_feature_evidence[config_id] = (self.sum_feature_evidence[config_id] << 8)
                / (num_features as i32 + class.config_length(config_id) as i32);
        }
    }
}

/// Fine matcher holding the precomputed similarity-to-evidence table.
pub struct IntegerMatcher {
    similarity_evidence_table: [u8; SE_TABLE_SIZE],
}

impl Default for IntegerMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegerMatcher {
    /// Build the table mapping truncated squared distance to evidence.
    ///
    /// Entry 0 is a perfect hit (255); evidence falls off as the square
    /// of the distance-to-center ratio.
    pub fn new() -> Self {
        let mut table = [0u8; SE_TABLE_SIZE];
        for (index, entry) in table.iter_mut().enumerate() {
            let int_similarity = (index as u32) << (27 - SE_TABLE_BITS);
            let similarity = f64::from(int_similarity) / 65536.0 / 65536.0;
            let scaled = similarity / SIMILARITY_CENTER;
            let evidence = 255.0 / (scaled * scaled + 1.0);
            *entry = (evidence + 0.5) as u8;
        }
        Self {
            similarity_evidence_table: table,
        }
    }

    /// Score `features` against one class, restricted to the protos and
    /// configs whose mask bits are set.
    ///
    /// An empty feature set is the worst possible match.
    pub fn match_class(
        &self,
        class: &IntClass,
        proto_mask: &BitVec,
        config_mask: &BitVec,
        features: &[IntFeature],
    ) -> MatchResult {
        let mut result = MatchResult::default();
        if features.is_empty() {
            return result;
        }

        let mut tables = ScratchEvidence::new(class);
        for feature in features {
            let config_sum =
                self.update_tables_for_feature(class, proto_mask, config_mask, feature, &mut tables);
            if config_sum == 0 {
                result.feature_misses += 1;
            }
        }
        tables.update_sum_of_proto_evidences(class, config_mask);
        tables.normalize_sums(class, features.len());
        find_best_match(class, &tables, &mut result);
        result
    }

    /// Protos whose average evidence over the whole feature set reaches
    /// `adapt_proto_threshold`, in ascending proto order.
    pub fn find_good_protos(
        &self,
        class: &IntClass,
        proto_mask: &BitVec,
        config_mask: &BitVec,
        features: &[IntFeature],
        adapt_proto_threshold: i32,
    ) -> Vec<usize> {
        let mut tables = ScratchEvidence::new(class);
        for feature in features {
            self.update_tables_for_feature(class, proto_mask, config_mask, feature, &mut tables);
        }

        let mut good = Vec::new();
        for proto_id in 0..class.num_protos() {
            let length = class.proto_length(proto_id) as i32;
            let slots = (length as usize).min(MAX_PROTO_INDEX);
            let total: i32 = tables.proto_evidence[proto_id][..slots]
                .iter()
                .map(|&evidence| evidence as i32)
                .sum();
            if total / length.max(1) >= adapt_proto_threshold {
                good.push(proto_id);
            }
        }
        good
    }

    /// Features whose best evidence over all configs stays below
    /// `adapt_feature_threshold`, in feature order.
    pub fn find_bad_features(
        &self,
        class: &IntClass,
        proto_mask: &BitVec,
        config_mask: &BitVec,
        features: &[IntFeature],
        adapt_feature_threshold: i32,
    ) -> Vec<usize> {
        let mut tables = ScratchEvidence::new(class);
        let mut bad = Vec::new();
        for (feature_index, feature) in features.iter().enumerate() {
            self.update_tables_for_feature(class, proto_mask, config_mask, feature, &mut tables);
            let best = tables.feature_evidence[..class.num_configs()]
                .iter()
                .copied()
                .max()
                .unwrap_or(0);
            if (best as i32) < adapt_feature_threshold {
                bad.push(feature_index);
            }
        }
        bad
    }

    /// Accumulate evidence for one feature. Returns the evidence summed
    /// over all configs, zero when no proto claims the feature.
    fn update_tables_for_feature(
        &self,
        class: &IntClass,
        proto_mask: &BitVec,
        config_mask: &BitVec,
        feature: &IntFeature,
        tables: &mut ScratchEvidence,
    ) -> i32 {
        tables.clear_feature_evidence(class);

        let x_bucket = (feature.x >> 2) as usize;
        let y_bucket = (feature.y >> 2) as usize;
        let theta_bucket = (feature.theta >> 2) as usize;

        for (set_index, proto_set) in class.proto_sets().enumerate() {
            for word_index in 0..WERDS_PER_PP_VECTOR {
                let mut proto_word = proto_set.proto_pruner[PRUNER_X][x_bucket][word_index]
                    & proto_set.proto_pruner[PRUNER_Y][y_bucket][word_index]
                    & proto_set.proto_pruner[PRUNER_ANGLE][theta_bucket][word_index]
                    & proto_mask.word(set_index * WERDS_PER_PP_VECTOR + word_index);

                while proto_word != 0 {
                    let index_in_set = word_index * 32 + proto_word.trailing_zeros() as usize;
                    proto_word &= proto_word - 1;
                    let proto_id = set_index * PROTOS_PER_PROTO_SET + index_in_set;
                    let proto = &proto_set.protos[index_in_set];

                    // Fixed-point distance from the feature to the proto
                    // line, and a circular angle difference.
                    let a3 = ((proto.a as i32 * (feature.x as i32 - 128)) << 1)
                        - proto.b as i32 * (feature.y as i32 - 128)
                        + ((proto.c as i32) << 9);
                    let m3 = (feature.theta.wrapping_sub(proto.angle) as i8 as i32
                        * INT_THETA_FUDGE)
                        << 1;
                    let a3 = truncate_multiplicand(a3);
                    let m3 = truncate_multiplicand(m3);
                    let a4 = ((a3 * a3 + m3 * m3) as u32) >> TABLE_TRUNC_SHIFT_BITS;
                    let mut evidence = if a4 > EVIDENCE_TABLE_MASK {
                        0
                    } else {
                        self.similarity_evidence_table[a4 as usize]
                    };

                    // Raise every config the proto belongs to.
                    let mut config_word = proto.configs[0] & config_mask.word(0);
                    let mut config_id = 0;
                    while config_word != 0 {
                        if config_word & 1 != 0 && tables.feature_evidence[config_id] < evidence {
                            tables.feature_evidence[config_id] = evidence;
                        }
                        config_word >>= 1;
                        config_id += 1;
                    }

                    // Keep the proto's strongest evidences sorted
                    // descending, one slot per pico unit of length.
                    let slots = (class.proto_length(proto_id) as usize).min(MAX_PROTO_INDEX);
                    for slot in tables.proto_evidence[proto_id][..slots].iter_mut() {
                        if evidence > *slot {
                            std::mem::swap(&mut evidence, slot);
                        } else if evidence == 0 {
                            break;
                        }
                    }
                }
            }
        }

        let mut config_sum = 0;
        for config_id in 0..class.num_configs() {
            let evidence = tables.feature_evidence[config_id] as i32;
            config_sum += evidence;
            tables.sum_feature_evidence[config_id] += evidence;
        }
        config_sum
    }
}

/// Pick the best and runner-up configs from the normalized sums.
fn find_best_match(class: &IntClass, tables: &ScratchEvidence, result: &mut MatchResult) {
    let mut best = 0;
    let mut best2 = 0;
    result.config = 0;
    result.config2 = 0;
    for config_id in 0..class.num_configs() {
        let score = tables.sum_feature_evidence[config_id];
        if score > best {
            if best > 0 {
                result.config2 = result.config;
                best2 = best;
            } else {
                result.config2 = config_id;
            }
            result.config = config_id;
            best = score;
        } else if score > best2 {
            result.config2 = config_id;
            best2 = score;
        }
    }
    result.rating = (65536.0 - best as f32) / 65536.0;
}

/// Fold a signed multiplicand to its magnitude and clamp it to the
/// range the evidence table covers.
fn truncate_multiplicand(value: i32) -> i32 {
    let value = if value < 0 { !value } else { value };
    (value >> MULT_TRUNC_SHIFT_BITS).min(EVIDENCE_MULT_MASK)
}

/// Blend an integer match rating with the character normalization
/// penalty for a class.
///
/// `normalization_factor` is the class's 0..=255 outline-length
/// penalty; `matcher_multiplier` weights it against `blob_length`
/// units of matcher rating.
pub fn apply_cn_correction(
    rating: f32,
    blob_length: i32,
    normalization_factor: i32,
    matcher_multiplier: i32,
) -> f32 {
    let divisor = blob_length + matcher_multiplier;
    if divisor == 0 {
        return 1.0;
    }
    (rating * blob_length as f32 + matcher_multiplier as f32 * normalization_factor as f32 / 256.0)
        / divisor as f32
}
