//! Tessclassify - Adaptive character-shape classification
//!
//! This is a Rust port of the shape classifier at the heart of the
//! [Tesseract](https://github.com/tesseract-ocr/tesseract) OCR engine.
//!
//! # Overview
//!
//! The classifier scores quantized outline features against prototype
//! templates in two stages and learns new shapes as it reads:
//!
//! - Quantized features and the bucket mappings templates are built on
//! - Static integer templates with their pruning tables, plus the
//!   character set and expected-feature cutoff sidecars
//! - A coarse class pruner that short-lists classes in one pass and a
//!   fine integer matcher that rates each survivor
//! - A mutable adaptive store whose temporary configs are promoted to
//!   permanent after enough confirmed sightings
//! - An adaptive classifier that orchestrates both stores, falls back
//!   between them, and folds recognized blobs back into the adaptive
//!   side
//!
//! # Example
//!
//! ```
//! use tessclassify::Charset;
//!
//! // Build a character set; properties are inferred from the text
//! let mut charset = Charset::new();
//! let a = charset.add("a");
//! assert!(charset.is_alpha(a));
//! assert_eq!(charset.text_of(a), "a");
//! ```

// Re-export core types (features, templates, charset, cutoffs)
pub use tessclassify_core::*;

// Re-export the matching and adaptation crates as modules
pub use tessclassify_adapt as adapt;
pub use tessclassify_match as matching;
