//! Tessclassify Match - Two-stage template scoring
//!
//! This crate scores quantized feature sets against the template stores
//! from `tessclassify-core` in two stages:
//!
//! - [`prune_classes`] - the coarse class pruner, one pass over the
//!   features that scores every class at once and keeps a short list
//! - [`IntegerMatcher`] - the fine matcher, run per short-listed class
//!   to pick the best config and rate the match
//!
//! The fine matcher's evidence tables also drive adaptation:
//! [`IntegerMatcher::find_good_protos`] picks the protos worth keeping
//! when a temporary config is made permanent, and
//! [`IntegerMatcher::find_bad_features`] flags the features a class
//! fails to explain.
//!
//! # See also
//!
//! C Tesseract: `intmatcher.cpp`

pub mod classpruner;
pub mod intmatcher;

pub use classpruner::{PrunerResult, PrunerSettings, prune_classes};
pub use intmatcher::{IntegerMatcher, MAX_PROTO_INDEX, MatchResult, apply_cn_correction};
