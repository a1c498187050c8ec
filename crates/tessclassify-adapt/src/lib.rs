//! Tessclassify Adapt - Adaptive classification over the template stores
//!
//! This crate ties the stores from `tessclassify-core` and the matchers
//! from `tessclassify-match` into a classifier that learns while it
//! reads:
//!
//! - [`AdaptiveClassifier::classify`] ranks the classes a blob may be,
//!   preferring the adaptive store and falling back to the static one
//!   when the adaptive answer is marginal
//! - [`AdaptiveClassifier::learn_sample`] folds a correctly-read blob
//!   back into the adaptive store, growing temporary configs that are
//!   promoted to permanent once seen often enough
//!
//! Inputs arrive as a [`BlobSample`], the normalized feature bundle
//! extracted from one connected shape. Tuning knobs live in
//! [`ClassifierParams`]; ranked answers come back as [`Choice`] values.
//!
//! # See also
//!
//! C Tesseract: `adaptmatch.cpp`

pub mod blob;
pub mod classifier;
pub mod error;
pub mod params;
pub mod results;

pub use blob::BlobSample;
pub use classifier::AdaptiveClassifier;
pub use error::{AdaptError, AdaptResult};
pub use params::ClassifierParams;
pub use results::Choice;
