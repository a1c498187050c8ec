//! Character set and cutoff table regression test
//!
//! Tests class id registration, character properties, adaption
//! ambiguity groups, and cutoff table parsing.
//!
//! # See also
//!
//! C Tesseract: `UNICHARSET` in `unicharset.cpp`, `ReadNewCutoffs()`
//! in `cutoffs.cpp`

use tessclassify_core::{CharProperties, Charset, Cutoffs, MAX_CUTOFF};
use tessclassify_test::RegParams;

// ==========================================================================
// Test 1: registration and properties
// ==========================================================================

#[test]
fn charset_reg_registration() {
    let mut rp = RegParams::new("charset_register");

    let mut charset = Charset::new();
    let space = charset.add(" ");
    let a = charset.add("a");
    let one = charset.add("1");
    let comma = charset.add(",");
    let frag = charset.add("|m|1|2|");

    rp.compare_values(5.0, charset.len() as f64, 0.0);
    rp.compare_values(0.0, space as f64, 0.0);
    rp.compare_values(1.0, a as f64, 0.0);

    // re-adding returns the existing id
    rp.compare_values(1.0, charset.add("a") as f64, 0.0);
    rp.compare_values(5.0, charset.len() as f64, 0.0);

    rp.compare_values(2.0, charset.id_of("1").map_or(-1.0, |id| id as f64), 0.0);
    let missing = charset.id_of("z").is_none();
    rp.compare_values(1.0, if missing { 1.0 } else { 0.0 }, 0.0);
    rp.compare_strings(charset.text_of(a).as_bytes(), b"a");
    rp.compare_strings(charset.text_of(99).as_bytes(), b"");

    // inferred properties
    let checks = charset.is_alpha(a)
        && charset.is_digit(one)
        && charset.is_punct(comma)
        && charset.is_fragment(frag)
        && !charset.is_alpha(one);
    rp.compare_values(1.0, if checks { 1.0 } else { 0.0 }, 0.0);

    // classes can be disabled without losing their id
    rp.compare_values(1.0, if charset.is_enabled(a) { 1.0 } else { 0.0 }, 0.0);
    charset.set_enabled(a, false);
    rp.compare_values(0.0, if charset.is_enabled(a) { 1.0 } else { 0.0 }, 0.0);
    rp.compare_values(1.0, charset.id_of("a").map_or(-1.0, |id| id as f64), 0.0);

    rp.compare_values(0.0, charset.space_id().map_or(-1.0, |id| id as f64), 0.0);

    assert!(rp.cleanup(), "charset_reg registration tests failed");
}

// ==========================================================================
// Test 2: vertical position ranges
// ==========================================================================

#[test]
fn charset_reg_top_bottom() {
    let mut rp = RegParams::new("charset_topbottom");

    let mut charset = Charset::new();
    charset.add("a");
    let x = charset.add_with_properties(
        "x",
        CharProperties {
            is_alpha: true,
            min_bottom: 0,
            max_bottom: 20,
            min_top: 100,
            max_top: 140,
            ..CharProperties::default()
        },
    );

    let (min_bottom, max_bottom, min_top, max_top) = charset.top_bottom(x);
    rp.compare_values(0.0, min_bottom as f64, 0.0);
    rp.compare_values(20.0, max_bottom as f64, 0.0);
    rp.compare_values(100.0, min_top as f64, 0.0);
    rp.compare_values(140.0, max_top as f64, 0.0);

    // inferred entries and unknown ids are unconstrained
    let (min_bottom, max_bottom, min_top, max_top) = charset.top_bottom(0);
    rp.compare_values(0.0, min_bottom as f64, 0.0);
    rp.compare_values(255.0, max_bottom as f64, 0.0);
    rp.compare_values(0.0, min_top as f64, 0.0);
    rp.compare_values(255.0, max_top as f64, 0.0);
    let (_, max_bottom, _, _) = charset.top_bottom(42);
    rp.compare_values(255.0, max_bottom as f64, 0.0);

    assert!(rp.cleanup(), "charset_reg top/bottom tests failed");
}

// ==========================================================================
// Test 3: adaption ambiguity groups
// ==========================================================================

#[test]
fn charset_reg_ambigs() {
    let mut rp = RegParams::new("charset_ambigs");

    let mut charset = Charset::new();
    let r = charset.add("r");
    let n = charset.add("n");
    let m = charset.add("m");

    charset.set_adaption_ambigs(r, vec![n, m]).unwrap();
    charset.set_adaption_ambigs(n, vec![m]).unwrap();

    rp.compare_values(2.0, charset.ambigs_for_adaption(r).len() as f64, 0.0);
    let forward_ok = charset.ambigs_for_adaption(r) == [n, m];
    rp.compare_values(1.0, if forward_ok { 1.0 } else { 0.0 }, 0.0);

    // reverse links are derived
    let reverse_ok = charset.reverse_ambigs_for_adaption(m) == [r, n]
        && charset.reverse_ambigs_for_adaption(n) == [r]
        && charset.reverse_ambigs_for_adaption(r).is_empty();
    rp.compare_values(1.0, if reverse_ok { 1.0 } else { 0.0 }, 0.0);

    // replacing a group unlinks the old targets
    charset.set_adaption_ambigs(r, vec![m]).unwrap();
    let unlinked = charset.reverse_ambigs_for_adaption(n).is_empty()
        && charset.reverse_ambigs_for_adaption(m) == [n, r];
    rp.compare_values(1.0, if unlinked { 1.0 } else { 0.0 }, 0.0);

    // unknown ids are rejected
    let err = charset.set_adaption_ambigs(r, vec![99]);
    rp.compare_values(1.0, if err.is_err() { 1.0 } else { 0.0 }, 0.0);
    let err = charset.set_adaption_ambigs(99, vec![n]);
    rp.compare_values(1.0, if err.is_err() { 1.0 } else { 0.0 }, 0.0);

    assert!(rp.cleanup(), "charset_reg ambiguity tests failed");
}

// ==========================================================================
// Test 4: cutoff table parsing
// ==========================================================================

#[test]
fn charset_reg_cutoffs() {
    let mut rp = RegParams::new("charset_cutoffs");

    let mut charset = Charset::new();
    for text in [" ", "a", "b", "1"] {
        charset.add(text);
    }

    let cutoffs = Cutoffs::read_from_str("a 43\n\nb 117\nNULL 25\n", &charset).unwrap();
    rp.compare_values(4.0, cutoffs.len() as f64, 0.0);
    rp.compare_values(43.0, cutoffs.for_class(1) as f64, 0.0);
    rp.compare_values(117.0, cutoffs.for_class(2) as f64, 0.0);
    // NULL stands in for the space character
    rp.compare_values(25.0, cutoffs.for_class(0) as f64, 0.0);
    // classes missing from the table keep the maximum
    rp.compare_values(MAX_CUTOFF as f64, cutoffs.for_class(3) as f64, 0.0);

    // unknown unichars are skipped, not fatal
    let cutoffs = Cutoffs::read_from_str("zzz 9\na 43\n", &charset).unwrap();
    rp.compare_values(43.0, cutoffs.for_class(1) as f64, 0.0);

    // malformed records are fatal
    let err = Cutoffs::read_from_str("a\n", &charset);
    rp.compare_values(1.0, if err.is_err() { 1.0 } else { 0.0 }, 0.0);
    let err = Cutoffs::read_from_str("a 12 extra\n", &charset);
    rp.compare_values(1.0, if err.is_err() { 1.0 } else { 0.0 }, 0.0);
    let err = Cutoffs::read_from_str("a notanumber\n", &charset);
    rp.compare_values(1.0, if err.is_err() { 1.0 } else { 0.0 }, 0.0);

    assert!(rp.cleanup(), "charset_reg cutoff tests failed");
}
