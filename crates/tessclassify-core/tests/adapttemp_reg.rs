//! Adaptive template regression test
//!
//! Tests class bootstrap, temp proto clustering, config promotion, and
//! the adapted store round trip.
//!
//! # See also
//!
//! C Tesseract: `InitAdaptedClass()`, `MakeNewTempProtos()`,
//! `MakePermanent()` in `adaptmatch.cpp`; `ReadAdaptedTemplates()`,
//! `WriteAdaptedTemplates()` in `adaptive.cpp`

use tessclassify_core::{
    AdaptiveTemplates, BitVec, OutlineFeature, PicoFeature, MAX_NUM_PROTOS,
};
use tessclassify_test::RegParams;

fn line_features(n: usize, y: f32) -> Vec<OutlineFeature> {
    (0..n)
        .map(|i| OutlineFeature {
            x: i as f32 * 0.1 - 0.2,
            y,
            length: 0.1,
            direction: 0.0,
        })
        .collect()
}

// ==========================================================================
// Test 1: class bootstrap
// ==========================================================================

#[test]
fn adapttemp_reg_bootstrap() {
    let mut rp = RegParams::new("adapttemp_bootstrap");

    let mut store = AdaptiveTemplates::new(40);
    rp.compare_values(40.0, store.num_classes() as f64, 0.0);
    rp.compare_values(0.0, store.num_nonempty_classes() as f64, 0.0);
    rp.compare_values(0.0, store.num_perm_classes() as f64, 0.0);
    rp.compare_values(2.0, store.templates().num_class_pruners() as f64, 0.0);

    // the first sample seeds one proto per feature and one config over
    // all of them
    store.init_class(2, 6, &line_features(5, 0.5));
    rp.compare_values(1.0, store.num_nonempty_classes() as f64, 0.0);
    rp.compare_values(0.0, store.num_perm_classes() as f64, 0.0);
    rp.compare_values(5.0, store.templates().class(2).num_protos() as f64, 0.0);
    rp.compare_values(1.0, store.templates().class(2).num_configs() as f64, 0.0);
    rp.compare_values(5.0, store.class(2).temp_protos().len() as f64, 0.0);

    let config = store.class(2).config(0).as_temp().unwrap();
    rp.compare_values(1.0, config.seen() as f64, 0.0);
    rp.compare_values(4.0, config.max_proto_id() as f64, 0.0);
    rp.compare_values(6.0, config.font_id() as f64, 0.0);
    let covers_all = (0..5).all(|proto_id| config.contains_proto(proto_id));
    rp.compare_values(1.0, if covers_all { 1.0 } else { 0.0 }, 0.0);

    // baseline y positions shift down by 0.25 before conversion
    let proto_y = store.class(2).temp_protos()[0].proto.y;
    rp.compare_values(0.25, proto_y as f64, 1e-6);

    // bootstrapping with no features leaves the class empty
    store.init_class(7, 0, &[]);
    rp.compare_values(1.0, store.num_nonempty_classes() as f64, 0.0);
    let still_empty = store.class(7).is_empty();
    rp.compare_values(1.0, if still_empty { 1.0 } else { 0.0 }, 0.0);

    assert!(rp.cleanup(), "adapttemp_reg bootstrap tests failed");
}

// ==========================================================================
// Test 2: temp proto clustering
// ==========================================================================

#[test]
fn adapttemp_reg_clustering() {
    let mut rp = RegParams::new("adapttemp_cluster");

    let mut store = AdaptiveTemplates::new(1);
    store.init_class(0, 0, &line_features(1, 0.5));

    // three pico steps along a line, then two more far away at a
    // different angle: two runs
    let features = vec![
        PicoFeature { x: 0.00, y: 0.5, direction: 0.0 },
        PicoFeature { x: 0.05, y: 0.5, direction: 0.0 },
        PicoFeature { x: 0.10, y: 0.5, direction: 0.0 },
        PicoFeature { x: 0.60, y: 0.20, direction: 0.25 },
        PicoFeature { x: 0.60, y: 0.25, direction: 0.25 },
    ];
    let mut mask = BitVec::new(MAX_NUM_PROTOS);
    let max_id = store
        .make_new_temp_protos(0, &features, &[0, 1, 2, 3, 4], &mut mask, 0.015)
        .unwrap();

    rp.compare_values(2.0, max_id as f64, 0.0);
    rp.compare_values(3.0, store.class(0).temp_protos().len() as f64, 0.0);
    let mask_ok = !mask.test(0) && mask.test(1) && mask.test(2);
    rp.compare_values(1.0, if mask_ok { 1.0 } else { 0.0 }, 0.0);

    // first run: 3 segments of 0.05, centered between its endpoints,
    // y shifted down
    let run = &store.class(0).temp_protos()[1].proto;
    rp.compare_values(0.15, run.length as f64, 1e-6);
    rp.compare_values(0.05, run.x as f64, 1e-6);
    rp.compare_values(0.25, run.y as f64, 1e-6);
    rp.compare_values(0.0, run.angle as f64, 0.0);
    let run2 = &store.class(0).temp_protos()[2].proto;
    rp.compare_values(0.10, run2.length as f64, 1e-6);

    // an angle step beyond the limit splits the run
    let features = vec![
        PicoFeature { x: 0.30, y: 0.5, direction: 0.0 },
        PicoFeature { x: 0.35, y: 0.5, direction: 0.1 },
    ];
    let mut mask = BitVec::new(MAX_NUM_PROTOS);
    store
        .make_new_temp_protos(0, &features, &[0, 1], &mut mask, 0.015)
        .unwrap();
    rp.compare_values(5.0, store.class(0).temp_protos().len() as f64, 0.0);

    // angle deltas measure around the circle, so 0.995 and 0.005 join
    let features = vec![
        PicoFeature { x: 0.40, y: 0.5, direction: 0.995 },
        PicoFeature { x: 0.44, y: 0.5, direction: 0.005 },
    ];
    let mut mask = BitVec::new(MAX_NUM_PROTOS);
    store
        .make_new_temp_protos(0, &features, &[0, 1], &mut mask, 0.015)
        .unwrap();
    rp.compare_values(6.0, store.class(0).temp_protos().len() as f64, 0.0);

    assert!(rp.cleanup(), "adapttemp_reg clustering tests failed");
}

// ==========================================================================
// Test 3: config promotion
// ==========================================================================

#[test]
fn adapttemp_reg_promotion() {
    let mut rp = RegParams::new("adapttemp_promote");

    let mut store = AdaptiveTemplates::new(2);
    // one feature that lands a proto at the pruner center
    let features = vec![OutlineFeature {
        x: 0.0,
        y: 0.25,
        length: 0.4,
        direction: 0.0,
    }];
    store.init_class(1, 4, &features);

    // temporary protos are invisible to the class pruner
    let before = store.templates().class_pruner(0).class_count(12, 12, 0, 1);
    rp.compare_values(0.0, before as f64, 0.0);

    let promoted = store.make_permanent(1, 0, vec![0]);
    rp.compare_values(1.0, if promoted { 1.0 } else { 0.0 }, 0.0);
    rp.compare_values(1.0, store.num_perm_classes() as f64, 0.0);

    let class = store.class(1);
    rp.compare_values(1.0, class.num_perm_configs() as f64, 0.0);
    rp.compare_values(0.0, class.temp_protos().len() as f64, 0.0);
    let perm_ok = class.is_config_permanent(0) && class.is_proto_permanent(0);
    rp.compare_values(1.0, if perm_ok { 1.0 } else { 0.0 }, 0.0);
    let perm = class.config(0).as_perm().unwrap();
    rp.compare_values(1.0, perm.ambigs.len() as f64, 0.0);
    rp.compare_values(0.0, perm.ambigs[0] as f64, 0.0);
    rp.compare_values(4.0, perm.font_id as f64, 0.0);

    // promotion installs the config's protos in the class pruner
    let after = store.templates().class_pruner(0).class_count(12, 12, 0, 1);
    rp.compare_values(3.0, after as f64, 0.0);

    // a config promotes at most once
    let again = store.make_permanent(1, 0, vec![]);
    rp.compare_values(0.0, if again { 1.0 } else { 0.0 }, 0.0);
    rp.compare_values(1.0, store.class(1).num_perm_configs() as f64, 0.0);
    rp.compare_values(1.0, store.num_perm_classes() as f64, 0.0);

    assert!(rp.cleanup(), "adapttemp_reg promotion tests failed");
}

// ==========================================================================
// Test 4: adapted store round trip
// ==========================================================================

#[test]
fn adapttemp_reg_serialization() {
    let mut rp = RegParams::new("adapttemp_serial");

    let mut store = AdaptiveTemplates::new(5);
    store.init_class(1, 2, &line_features(3, 0.5));
    store.make_permanent(1, 0, vec![3, 4]);
    store.init_class(3, 0, &line_features(3, 0.5));
    let pico = vec![PicoFeature { x: 0.6, y: 0.2, direction: 0.25 }];
    let mut mask = BitVec::new(MAX_NUM_PROTOS);
    let max_id = store
        .make_new_temp_protos(3, &pico, &[0], &mut mask, 0.015)
        .unwrap();
    store.add_temp_config(3, &mask, max_id, 7).unwrap();
    store
        .class_mut(3)
        .config_mut(1)
        .as_temp_mut()
        .unwrap()
        .increment_seen();
    store.class_mut(3).set_max_seen(2);

    let bytes = store.write_to_bytes().unwrap();
    // header: nonempty count, permanent count
    let nonempty = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let perm = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    rp.compare_values(2.0, nonempty as f64, 0.0);
    rp.compare_values(1.0, perm as f64, 0.0);

    let restored = AdaptiveTemplates::read_from_bytes(&bytes).unwrap();
    let equal = restored == store;
    rp.compare_values(1.0, if equal { 1.0 } else { 0.0 }, 0.0);
    rp.compare_values(2.0, restored.num_nonempty_classes() as f64, 0.0);
    rp.compare_values(1.0, restored.num_perm_classes() as f64, 0.0);
    rp.compare_values(2.0, restored.class(3).config(1).as_temp().unwrap().seen() as f64, 0.0);
    rp.compare_values(2.0, restored.class(3).max_seen() as f64, 0.0);
    let ambigs_ok = restored.class(1).config(0).as_perm().unwrap().ambigs == vec![3, 4];
    rp.compare_values(1.0, if ambigs_ok { 1.0 } else { 0.0 }, 0.0);

    // writing the restored store reproduces the bytes
    let rewritten = restored.write_to_bytes().unwrap();
    rp.compare_strings(&bytes, &rewritten);

    assert!(rp.cleanup(), "adapttemp_reg serialization tests failed");
}

// ==========================================================================
// Test 5: malformed input handling
// ==========================================================================

#[test]
fn adapttemp_reg_malformed_input() {
    let mut rp = RegParams::new("adapttemp_malformed");

    let mut store = AdaptiveTemplates::new(2);
    store.init_class(0, 0, &line_features(2, 0.5));
    let bytes = store.write_to_bytes().unwrap();

    // truncation is fatal
    let err = AdaptiveTemplates::read_from_bytes(&bytes[..bytes.len() - 3]);
    rp.compare_values(1.0, if err.is_err() { 1.0 } else { 0.0 }, 0.0);

    // counters beyond the class count are rejected
    let mut bad = bytes.clone();
    bad[0..4].copy_from_slice(&9u32.to_le_bytes());
    let err = AdaptiveTemplates::read_from_bytes(&bad);
    rp.compare_values(1.0, if err.is_err() { 1.0 } else { 0.0 }, 0.0);

    let mut bad = bytes.clone();
    bad[4..8].copy_from_slice(&9u32.to_le_bytes());
    let err = AdaptiveTemplates::read_from_bytes(&bad);
    rp.compare_values(1.0, if err.is_err() { 1.0 } else { 0.0 }, 0.0);

    assert!(rp.cleanup(), "adapttemp_reg malformed input tests failed");
}
