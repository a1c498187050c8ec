//! Integer templates - fixed-point shape classes for the matcher
//!
//! An [`IntTemplates`] store holds one [`IntClass`] per character class.
//! Each class keeps its prototypes in fixed-point form, grouped into
//! proto sets of 64 with a per-set proto pruner, plus per-config summed
//! proto lengths. The store also owns the coarse class-pruner tables,
//! one per block of 32 classes.
//!
//! Capacities are fixed: up to 512 protos and 64 configs per class. The
//! capacity-bounded mutators return `None` when a class is full, which
//! the adaptive layer counts as a failed adaptation rather than an
//! error.
//!
//! See [`pruner`] for the pruner tables and [`serial`] for the binary
//! format.
//!
//! # See also
//!
//! C Tesseract: `INT_CLASS_STRUCT`, `INT_TEMPLATES_STRUCT`,
//! `ConvertProto()`, `ConvertConfig()` in `intproto.cpp`

pub mod pruner;
pub mod serial;

use crate::bitvec::BitVec;
use crate::proto::{PICO_FEATURE_LENGTH, Proto};

pub use pruner::{
    CLASS_PRUNER_CLASS_MASK, CLASSES_PER_CP, CLASSES_PER_CP_WERD, ClassPruner, NUM_BITS_PER_CLASS,
    NUM_CP_BUCKETS, WERDS_PER_CP_VECTOR,
};

/// Maximum classes a template store may hold.
pub const MAX_NUM_CLASSES: usize = i16::MAX as usize;

/// Protos per proto set.
pub const PROTOS_PER_PROTO_SET: usize = 64;
/// Maximum proto sets per class.
pub const MAX_NUM_PROTO_SETS: usize = 8;
/// Maximum protos per class.
pub const MAX_NUM_PROTOS: usize = PROTOS_PER_PROTO_SET * MAX_NUM_PROTO_SETS;
/// Maximum configs per class.
pub const MAX_NUM_CONFIGS: usize = 64;
/// Words in a per-proto config bit vector.
pub const WERDS_PER_CONFIG_VEC: usize = MAX_NUM_CONFIGS / 32;

/// Params covered by the proto pruner (x, y, angle).
pub const NUM_PP_PARAMS: usize = 3;
/// Buckets per proto-pruner param.
pub const NUM_PP_BUCKETS: usize = 64;
/// Words in a proto-pruner bit vector.
pub const WERDS_PER_PP_VECTOR: usize = NUM_PP_BUCKETS / 32;

/// Proto-pruner param indices.
pub const PRUNER_X: usize = 0;
pub const PRUNER_Y: usize = 1;
pub const PRUNER_ANGLE: usize = 2;

/// Proto set holding a given proto id.
#[inline]
pub fn set_for_proto(proto_id: usize) -> usize {
    proto_id / PROTOS_PER_PROTO_SET
}

/// Index of a proto id within its proto set.
#[inline]
pub fn index_for_proto(proto_id: usize) -> usize {
    proto_id % PROTOS_PER_PROTO_SET
}

/// One fixed-point prototype.
///
/// `a`, `b`, `c` are the quantized line coefficients; `angle` is the
/// direction in 256ths of a revolution. `configs` flags the configs
/// this proto belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntProto {
    pub a: i8,
    pub b: u8,
    pub c: i8,
    pub angle: u8,
    pub configs: [u32; WERDS_PER_CONFIG_VEC],
}

impl IntProto {
    pub const ZERO: IntProto = IntProto {
        a: 0,
        b: 0,
        c: 0,
        angle: 0,
        configs: [0; WERDS_PER_CONFIG_VEC],
    };

    /// Flag this proto as a member of a config.
    pub fn set_config(&mut self, config_id: usize) {
        self.configs[config_id / 32] |= 1 << (config_id % 32);
    }

    /// Whether this proto is a member of a config.
    pub fn in_config(&self, config_id: usize) -> bool {
        self.configs[config_id / 32] & (1 << (config_id % 32)) != 0
    }
}

/// A block of 64 protos plus the proto-pruner tables that gate them.
///
/// The pruner is indexed `[param][bucket][word]`; bit `i` of a bucket
/// vector means proto `i` of this set accepts features in that bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoSet {
    pub proto_pruner: [[[u32; WERDS_PER_PP_VECTOR]; NUM_PP_BUCKETS]; NUM_PP_PARAMS],
    pub protos: [IntProto; PROTOS_PER_PROTO_SET],
}

impl Default for ProtoSet {
    fn default() -> Self {
        Self {
            proto_pruner: [[[0; WERDS_PER_PP_VECTOR]; NUM_PP_BUCKETS]; NUM_PP_PARAMS],
            protos: [IntProto::ZERO; PROTOS_PER_PROTO_SET],
        }
    }
}

/// One character class in integer format.
#[derive(Debug, Clone, PartialEq)]
pub struct IntClass {
    num_protos: u16,
    num_configs: u8,
    proto_sets: Vec<Box<ProtoSet>>,
    proto_lengths: Vec<u8>,
    config_lengths: [u16; MAX_NUM_CONFIGS],
    font_set_id: i32,
}

impl IntClass {
    /// Create an empty class with space preallocated for the given
    /// proto and config counts.
    ///
    /// Proto capacity beyond the fixed maximum is reduced to it.
    pub fn new(max_num_protos: usize, max_num_configs: usize) -> Self {
        debug_assert!(max_num_configs <= MAX_NUM_CONFIGS);
        let num_sets = max_num_protos
            .div_ceil(PROTOS_PER_PROTO_SET)
            .min(MAX_NUM_PROTO_SETS);
        let proto_sets: Vec<Box<ProtoSet>> =
            (0..num_sets).map(|_| Box::new(ProtoSet::default())).collect();
        Self {
            num_protos: 0,
            num_configs: 0,
            proto_lengths: vec![0; num_sets * PROTOS_PER_PROTO_SET],
            proto_sets,
            config_lengths: [0; MAX_NUM_CONFIGS],
            font_set_id: -1,
        }
    }

    /// Number of live protos.
    pub fn num_protos(&self) -> usize {
        self.num_protos as usize
    }

    /// Number of live configs.
    pub fn num_configs(&self) -> usize {
        self.num_configs as usize
    }

    /// Number of allocated proto sets.
    pub fn num_proto_sets(&self) -> usize {
        self.proto_sets.len()
    }

    /// Allocated proto capacity (64 per proto set).
    pub fn max_num_protos(&self) -> usize {
        self.proto_sets.len() * PROTOS_PER_PROTO_SET
    }

    pub fn font_set_id(&self) -> i32 {
        self.font_set_id
    }

    pub fn set_font_set_id(&mut self, id: i32) {
        self.font_set_id = id;
    }

    /// Allocate the next free proto and return its id, or `None` if
    /// the class already holds the maximum number of protos.
    ///
    /// The new proto has zero length and belongs to no configs.
    pub fn add_proto(&mut self) -> Option<usize> {
        if self.num_protos() >= MAX_NUM_PROTOS {
            return None;
        }
        let index = self.num_protos();
        self.num_protos += 1;

        if self.num_protos() > self.max_num_protos() {
            self.proto_sets.push(Box::new(ProtoSet::default()));
            self.proto_lengths.resize(self.max_num_protos(), 0);
        }

        self.proto_lengths[index] = 0;
        self.proto_mut(index).configs = [0; WERDS_PER_CONFIG_VEC];
        Some(index)
    }

    /// Allocate the next free config and return its id, or `None` if
    /// the class already holds the maximum number of configs.
    pub fn add_config(&mut self) -> Option<usize> {
        if self.num_configs() >= MAX_NUM_CONFIGS {
            return None;
        }
        let index = self.num_configs();
        self.num_configs += 1;
        self.config_lengths[index] = 0;
        Some(index)
    }

    pub fn proto(&self, proto_id: usize) -> &IntProto {
        &self.proto_sets[set_for_proto(proto_id)].protos[index_for_proto(proto_id)]
    }

    pub fn proto_mut(&mut self, proto_id: usize) -> &mut IntProto {
        &mut self.proto_sets[set_for_proto(proto_id)].protos[index_for_proto(proto_id)]
    }

    pub fn proto_set(&self, set_id: usize) -> &ProtoSet {
        &self.proto_sets[set_id]
    }

    pub fn proto_sets(&self) -> impl Iterator<Item = &ProtoSet> {
        self.proto_sets.iter().map(|b| b.as_ref())
    }

    /// Length of a proto in pico units.
    pub fn proto_length(&self, proto_id: usize) -> u8 {
        self.proto_lengths[proto_id]
    }

    pub fn set_proto_length(&mut self, proto_id: usize, length: u8) {
        self.proto_lengths[proto_id] = length;
    }

    /// Summed proto length of a config, in pico units.
    pub fn config_length(&self, config_id: usize) -> u16 {
        self.config_lengths[config_id]
    }

    pub fn set_config_length(&mut self, config_id: usize, length: u16) {
        self.config_lengths[config_id] = length;
    }

    /// Quantize a floating-point proto into the slot `proto_id`.
    ///
    /// The line coefficients map to small signed fixed point, the angle
    /// to 256ths of a revolution, and the length to a count of pico
    /// segments in 1..=255.
    pub fn convert_proto(&mut self, proto: &Proto, proto_id: usize) {
        debug_assert!(proto_id < self.num_protos());

        let a = truncate_param(proto.a * 128.0, -128, 127) as i8;
        let b = truncate_param(-proto.b * 256.0, 0, 255) as u8;
        let c = truncate_param(proto.c * 128.0, -128, 127) as i8;

        let angle_param = proto.angle * 256.0;
        let angle = if !(0.0..256.0).contains(&angle_param) {
            0
        } else {
            angle_param as u8
        };

        let length = truncate_param(proto.length / PICO_FEATURE_LENGTH + 0.5, 1, 255) as u8;

        let p = self.proto_mut(proto_id);
        p.a = a;
        p.b = b;
        p.c = c;
        p.angle = angle;
        self.proto_lengths[proto_id] = length;
    }

    /// Mark the protos flagged in `config` as members of config
    /// `config_id` and record the config's total proto length.
    pub fn convert_config(&mut self, config: &BitVec, config_id: usize) {
        let mut total_length = 0u16;
        for proto_id in 0..self.num_protos() {
            if config.test(proto_id) {
                self.proto_mut(proto_id).set_config(config_id);
                total_length = total_length.saturating_add(self.proto_lengths[proto_id] as u16);
            }
        }
        self.config_lengths[config_id] = total_length;
    }

    /// Update this class's proto pruner to accept features near the
    /// given proto.
    pub fn add_proto_to_proto_pruner(&mut self, proto: &Proto, proto_id: usize) {
        debug_assert!(proto_id < self.num_protos());

        let index = index_for_proto(proto_id);
        let set = &mut self.proto_sets[set_for_proto(proto_id)];
        pruner::fill_proto_pruner(&mut set.proto_pruner, index, proto);
    }
}

/// Store of integer classes plus their class-pruner tables.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IntTemplates {
    classes: Vec<IntClass>,
    class_pruners: Vec<ClassPruner>,
}

impl IntTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn num_class_pruners(&self) -> usize {
        self.class_pruners.len()
    }

    /// Install a class under the next class id and return that id.
    ///
    /// A new zeroed class-pruner table is allocated whenever the class
    /// count crosses a block of 32.
    pub fn add_class(&mut self, class: IntClass) -> usize {
        let class_id = self.classes.len();
        self.classes.push(class);
        if self.classes.len() > self.class_pruners.len() * CLASSES_PER_CP {
            self.class_pruners.push(ClassPruner::new());
        }
        class_id
    }

    pub fn class(&self, class_id: usize) -> &IntClass {
        &self.classes[class_id]
    }

    pub fn class_mut(&mut self, class_id: usize) -> &mut IntClass {
        &mut self.classes[class_id]
    }

    pub fn classes(&self) -> &[IntClass] {
        &self.classes
    }

    pub fn contains(&self, class_id: usize) -> bool {
        class_id < self.classes.len()
    }

    pub fn class_pruner(&self, pruner_id: usize) -> &ClassPruner {
        &self.class_pruners[pruner_id]
    }

    pub fn class_pruners(&self) -> &[ClassPruner] {
        &self.class_pruners
    }

    /// Widen the class-pruner acceptance regions around a proto of the
    /// given class, at all three tightness levels.
    pub fn add_proto_to_class_pruner(&mut self, proto: &Proto, class_id: usize) {
        let pruner = &mut self.class_pruners[pruner::cpruner_id_for(class_id)];
        pruner.add_proto(proto, class_id);
    }

    /// Convert a class given as floating-point protos and config
    /// membership vectors, install it, and fill both pruners.
    ///
    /// Protos and configs beyond the fixed capacities are dropped.
    pub fn add_converted_class(&mut self, protos: &[Proto], configs: &[BitVec]) -> usize {
        let mut class = IntClass::new(protos.len(), configs.len().min(MAX_NUM_CONFIGS));
        let class_id = self.classes.len();

        for (proto_id, proto) in protos.iter().enumerate() {
            if class.add_proto().is_none() {
                break;
            }
            class.convert_proto(proto, proto_id);
            class.add_proto_to_proto_pruner(proto, proto_id);
        }
        self.add_class(class);

        for proto in protos.iter().take(self.class(class_id).num_protos()) {
            self.add_proto_to_class_pruner(proto, class_id);
        }

        let class = self.class_mut(class_id);
        for config in configs {
            match class.add_config() {
                Some(config_id) => class.convert_config(config, config_id),
                None => break,
            }
        }
        class_id
    }
}

/// Clamp to `[min, max]`, flooring in-range values.
fn truncate_param(param: f32, min: i32, max: i32) -> i32 {
    if param < min as f32 {
        min
    } else if param > max as f32 {
        max
    } else {
        param.floor() as i32
    }
}
