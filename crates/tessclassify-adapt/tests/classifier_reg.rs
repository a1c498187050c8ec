//! Adaptive classifier regression test
//!
//! End-to-end classification runs: the static path, the noise
//! fallback, adaptive matching after promotion, the merge of adaptive
//! and static scores, the choice cap, disabled classes, and
//! determinism over arbitrary features.
//!
//! # See also
//!
//! C Tesseract: `AdaptiveClassifier()`, `DoAdaptiveMatch()`,
//! `ConvertMatchesToChoices()` in `adaptmatch.cpp`

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use tessclassify_adapt::{AdaptiveClassifier, BlobSample, ClassifierParams};
use tessclassify_core::{
    BitVec, Charset, Cutoffs, IntFeature, IntTemplates, OutlineFeature, PicoFeature, Proto,
};
use tessclassify_test::RegParams;

/// Feature x positions spread along a horizontal proto of length 0.4.
const LINE_XS: [i32; 8] = [70, 86, 102, 118, 134, 150, 166, 182];

/// Proto row for a class, 32 y buckets from its neighbors.
fn class_row(class_id: usize) -> f32 {
    class_id as f32 * 0.125 - 0.25
}

/// Classifier whose static store holds one horizontal proto per class,
/// each on its own row. Class 0 is the space entry.
fn world(entries: &[&str], params: ClassifierParams) -> AdaptiveClassifier {
    let mut charset = Charset::new();
    charset.add(" ");
    for entry in entries {
        charset.add(entry);
    }
    world_from(charset, params)
}

fn world_from(charset: Charset, params: ClassifierParams) -> AdaptiveClassifier {
    let mut members = BitVec::new(1);
    members.set(0);
    let mut templates = IntTemplates::new();
    for class_id in 0..charset.len() {
        templates.add_converted_class(
            &[Proto::from_position(0.0, class_row(class_id), 0.4, 0.0)],
            std::slice::from_ref(&members),
        );
    }
    let mut cutoffs = Cutoffs::new(charset.len());
    for class_id in 0..charset.len() {
        cutoffs.set(class_id, 8);
    }
    AdaptiveClassifier::new(charset, templates, cutoffs, params).unwrap()
}

/// Blob whose features all lie on one class's proto row, in both
/// normalizations.
fn row_blob(class_id: usize, num_classes: usize) -> BlobSample {
    let row = class_row(class_id);
    let char_norm_y = ((row + 0.5) * 256.0) as i32;
    let pico_y = row + 0.25;
    BlobSample {
        char_norm_features: LINE_XS
            .iter()
            .map(|&x| IntFeature::new(x, char_norm_y, 0))
            .collect(),
        char_norm_factors: vec![0; num_classes],
        pico_features: LINE_XS
            .iter()
            .map(|&x| PicoFeature {
                x: x as f32 / 256.0 - 0.5,
                y: pico_y,
                direction: 0.0,
            })
            .collect(),
        outline_features: vec![OutlineFeature {
            x: 0.0,
            y: pico_y,
            length: 0.4,
            direction: 0.0,
        }],
        blob_length: 8,
        top: 192,
        bottom: 64,
    }
}

// ==========================================================================
// Test 1: an empty adaptive store routes blobs to the static templates
// ==========================================================================

#[test]
fn classifier_reg_static_path() {
    let mut rp = RegParams::new("classifier_static_path");

    let classifier = world(&["a", "b"], ClassifierParams::default());
    let blob = row_blob(1, 3);
    let choices = classifier.classify(&blob);

    // a perfect match rates 256/65536, corrected to 8/18 of that; the
    // other rows are 32 buckets away and fall outside the match pad
    rp.compare_values(1.0, choices.len() as f64, 0.0);
    rp.compare_values(1.0, choices[0].class_id as f64, 0.0);
    rp.compare_values(0.0, if choices[0].adapted { 1.0 } else { 0.0 }, 0.0);
    rp.compare_values(-1.0, choices[0].font_id as f64, 0.0);
    let corrected = (256.0 / 65536.0) * 8.0 / 18.0;
    rp.compare_values(corrected * 1.5 * 8.0, choices[0].rating as f64, 1e-5);
    rp.compare_values(-corrected * 20.0, choices[0].certainty as f64, 1e-5);

    assert!(rp.cleanup(), "classifier_reg static path tests failed");
}

// ==========================================================================
// Test 2: a featureless blob falls back to the space-class noise result
// ==========================================================================

#[test]
fn classifier_reg_noise_fallback() {
    let mut rp = RegParams::new("classifier_noise");

    let classifier = world(&["a"], ClassifierParams::default());
    let blob = BlobSample {
        blob_length: 12,
        ..BlobSample::default()
    };
    let choices = classifier.classify(&blob);

    // a blob the size of typical noise rates halfway
    rp.compare_values(1.0, choices.len() as f64, 0.0);
    rp.compare_values(0.0, choices[0].class_id as f64, 0.0);
    rp.compare_values(0.5 * 1.5 * 12.0, choices[0].rating as f64, 1e-5);
    rp.compare_values(-0.5 * 20.0, choices[0].certainty as f64, 1e-5);

    assert!(rp.cleanup(), "classifier_reg noise fallback tests failed");
}

// ==========================================================================
// Test 3: a promoted class answers from the adaptive store
// ==========================================================================

#[test]
fn classifier_reg_adaptive_path() {
    let mut rp = RegParams::new("classifier_adaptive_path");

    let mut params = ClassifierParams::default();
    params.adaptive_matching_only = true;
    let mut classifier = world(&["a", "b"], params);
    let blob = row_blob(1, 3);
    let threshold = classifier.params().good_threshold;
    for _ in 0..3 {
        classifier.learn_sample(&blob, 1, 0, threshold).unwrap();
    }
    rp.compare_values(
        1.0,
        classifier.adapted_templates().num_perm_classes() as f64,
        0.0,
    );

    // baseline matching runs uncorrected, so the perfect-match rating
    // comes through at full weight
    let choices = classifier.classify(&blob);
    rp.compare_values(1.0, choices.len() as f64, 0.0);
    rp.compare_values(1.0, choices[0].class_id as f64, 0.0);
    rp.compare_values(1.0, if choices[0].adapted { 1.0 } else { 0.0 }, 0.0);
    rp.compare_values(0.0, choices[0].font_id as f64, 0.0);
    let distance = 256.0 / 65536.0;
    rp.compare_values(distance * 1.5 * 8.0, choices[0].rating as f64, 1e-6);
    rp.compare_values(-distance * 20.0, choices[0].certainty as f64, 1e-6);

    assert!(rp.cleanup(), "classifier_reg adaptive path tests failed");
}

// ==========================================================================
// Test 4: a marginal adaptive answer merges with the static rerun
// ==========================================================================

#[test]
fn classifier_reg_marginal_merge() {
    let mut rp = RegParams::new("classifier_marginal_merge");

    // default reliability treats any imperfect adaptive answer as
    // marginal, so the static pass reruns and the better corrected
    // score replaces the adaptive one in place
    let mut classifier = world(&["a", "b"], ClassifierParams::default());
    let blob = row_blob(1, 3);
    let threshold = classifier.params().good_threshold;
    for _ in 0..3 {
        classifier.learn_sample(&blob, 1, 0, threshold).unwrap();
    }

    let choices = classifier.classify(&blob);
    rp.compare_values(1.0, choices.len() as f64, 0.0);
    rp.compare_values(1.0, choices[0].class_id as f64, 0.0);
    // the record keeps its adaptive provenance but carries the static
    // pass's corrected rating
    rp.compare_values(1.0, if choices[0].adapted { 1.0 } else { 0.0 }, 0.0);
    rp.compare_values(0.0, choices[0].font_id as f64, 0.0);
    let corrected = (256.0 / 65536.0) * 8.0 / 18.0;
    rp.compare_values(corrected * 1.5 * 8.0, choices[0].rating as f64, 1e-5);

    assert!(rp.cleanup(), "classifier_reg marginal merge tests failed");
}

// ==========================================================================
// Test 5: choices cap at ten even when more classes match
// ==========================================================================

#[test]
fn classifier_reg_choice_cap() {
    let mut rp = RegParams::new("classifier_choice_cap");

    // thirteen classes sharing one proto row all match identically
    let entries = ["a", "b", "c", "d", "e", "f", "g", "h", "j", "k", "m", "n"];
    let mut charset = Charset::new();
    charset.add(" ");
    for entry in &entries {
        charset.add(entry);
    }
    let mut members = BitVec::new(1);
    members.set(0);
    let mut templates = IntTemplates::new();
    for _ in 0..charset.len() {
        templates.add_converted_class(
            &[Proto::from_position(0.0, 0.0, 0.4, 0.0)],
            std::slice::from_ref(&members),
        );
    }
    let mut cutoffs = Cutoffs::new(charset.len());
    for class_id in 0..charset.len() {
        cutoffs.set(class_id, 8);
    }
    let classifier =
        AdaptiveClassifier::new(charset, templates, cutoffs, ClassifierParams::default()).unwrap();

    let blob = row_blob(2, 13);
    let choices = classifier.classify(&blob);
    rp.compare_values(10.0, choices.len() as f64, 0.0);
    // equal ratings order by class id
    for (index, choice) in choices.iter().enumerate() {
        rp.compare_values(index as f64, choice.class_id as f64, 0.0);
        rp.compare_values(choices[0].rating as f64, choice.rating as f64, 1e-6);
    }

    assert!(rp.cleanup(), "classifier_reg choice cap tests failed");
}

// ==========================================================================
// Test 6: disabled classes never reach the results
// ==========================================================================

#[test]
fn classifier_reg_disabled_class() {
    let mut rp = RegParams::new("classifier_disabled");

    let mut charset = Charset::new();
    charset.add(" ");
    charset.add("a");
    charset.set_enabled(1, false);
    let classifier = world_from(charset, ClassifierParams::default());

    // with its only match disabled the blob classifies as noise
    let blob = row_blob(1, 2);
    let choices = classifier.classify(&blob);
    rp.compare_values(1.0, choices.len() as f64, 0.0);
    rp.compare_values(0.0, choices[0].class_id as f64, 0.0);

    assert!(rp.cleanup(), "classifier_reg disabled class tests failed");
}

// ==========================================================================
// Test 7: deterministic and bounded over arbitrary features
// ==========================================================================

#[test]
fn classifier_reg_deterministic() {
    let mut rp = RegParams::new("classifier_random");

    let classifier = world(&["a", "b", "c"], ClassifierParams::default());
    let mut rng = StdRng::seed_from_u64(42);
    let blob = BlobSample {
        char_norm_features: (0..20)
            .map(|_| {
                IntFeature::new(
                    rng.random_range(0..256),
                    rng.random_range(0..256),
                    rng.random_range(0..256),
                )
            })
            .collect(),
        char_norm_factors: vec![0; 4],
        blob_length: 8,
        top: 192,
        bottom: 64,
        ..BlobSample::default()
    };

    let first = classifier.classify(&blob);
    let second = classifier.classify(&blob);
    rp.compare_values(1.0, if first == second { 1.0 } else { 0.0 }, 0.0);
    rp.compare_values(1.0, if first.len() <= 10 { 1.0 } else { 0.0 }, 0.0);
    rp.compare_values(1.0, if !first.is_empty() { 1.0 } else { 0.0 }, 0.0);
    for choice in &first {
        let bounded = choice.rating >= 0.0 && choice.rating.is_finite() && choice.certainty <= 0.0;
        rp.compare_values(1.0, if bounded { 1.0 } else { 0.0 }, 0.0);
    }

    assert!(rp.cleanup(), "classifier_reg deterministic tests failed");
}
