//! Tessclassify Core - Data structures for adaptive shape classification
//!
//! This crate provides the template stores and feature primitives shared
//! by the shape classifier:
//!
//! - [`IntTemplates`] / [`IntClass`] - static fixed-point templates and
//!   their class-pruner tables
//! - [`AdaptiveTemplates`] / [`AdaptClass`] - the mutable per-document
//!   store with temp-to-permanent config promotion
//! - [`Charset`] - class ids, text, and per-class metadata
//! - [`Cutoffs`] - expected feature counts for the pruner penalty
//! - [`IntFeature`] / [`PicoFeature`] / [`OutlineFeature`] - quantized
//!   and floating-point feature forms
//! - [`Proto`] - floating-point prototype segments
//! - [`BitVec`] - packed proto/config membership vectors
//!
//! # See also
//!
//! C Tesseract: `intproto.cpp`, `adaptive.cpp`, `protos.cpp` (struct
//! definitions)

pub mod adapttemp;
pub mod bitvec;
pub mod charset;
pub mod cutoffs;
pub mod error;
pub mod feature;
pub mod inttemp;
pub mod proto;

pub use adapttemp::{
    AdaptClass, AdaptiveTemplates, ConfigState, PermConfig, TempConfig, TempProto,
};
pub use bitvec::BitVec;
pub use charset::{CharProperties, Charset};
pub use cutoffs::{Cutoffs, MAX_CUTOFF};
pub use error::{Error, Result};
pub use feature::{
    IntFeature, MAX_NUM_INT_FEATURES, OutlineFeature, PicoFeature, quantize_pico_features,
};
pub use inttemp::{
    ClassPruner, IntClass, IntProto, IntTemplates, MAX_NUM_CLASSES, MAX_NUM_CONFIGS,
    MAX_NUM_PROTOS, PROTOS_PER_PROTO_SET, ProtoSet, WERDS_PER_CONFIG_VEC,
};
pub use proto::{PICO_FEATURE_LENGTH, Proto};
