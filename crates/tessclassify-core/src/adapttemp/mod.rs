//! Adaptive templates - mutable per-document template store
//!
//! An [`AdaptiveTemplates`] store pairs an [`IntTemplates`] store with
//! one [`AdaptClass`] per class. The integer side is what the matcher
//! scores; the adaptive side tracks which of its configs are still
//! temporary, how often each has been confirmed, and the float protos
//! of temporary configs so they can be installed in the class pruner
//! when a config is promoted.
//!
//! A config starts as a [`TempConfig`] and is promoted at most once to
//! a [`PermConfig`] by [`AdaptiveTemplates::make_permanent`]. Only
//! permanent protos are visible to the class pruner; the per-class
//! permanent bit vectors gate what baseline matching may use.
//!
//! Capacity exhaustion is reported through `Option`, never an error.
//!
//! # See also
//!
//! C Tesseract: `ADAPT_TEMPLATES_STRUCT`, `TEMP_CONFIG_STRUCT` in
//! `adaptive.cpp`; `InitAdaptedClass()`, `MakeNewTempProtos()`,
//! `MakePermanent()` in `adaptmatch.cpp`

pub mod serial;

use crate::bitvec::{BitVec, words_for_bits};
use crate::feature::{BASELINE_Y_SHIFT, OutlineFeature, PicoFeature, Y_SHIFT};
use crate::inttemp::{IntClass, IntTemplates, MAX_NUM_CONFIGS, MAX_NUM_PROTOS};
use crate::proto::{PICO_FEATURE_LENGTH, Proto};

/// Correction applied to baseline-normalized y positions before proto
/// conversion, which assumes y in [-0.5, 0.5] rather than [-0.25, 0.75].
const Y_DIM_OFFSET: f32 = Y_SHIFT - BASELINE_Y_SHIFT;

/// A still-temporary proto, kept in float form so it can be added to
/// the class pruner if its config is ever promoted.
#[derive(Debug, Clone, PartialEq)]
pub struct TempProto {
    pub proto_id: usize,
    pub proto: Proto,
}

/// A config that has not yet been confirmed often enough to keep.
#[derive(Debug, Clone, PartialEq)]
pub struct TempConfig {
    seen: u32,
    max_proto_id: usize,
    protos: BitVec,
    font_id: i32,
}

impl TempConfig {
    /// Create a config covering protos `0..=max_proto_id`, none of them
    /// marked yet, counted as seen once.
    pub fn new(max_proto_id: usize, font_id: i32) -> Self {
        Self {
            seen: 1,
            max_proto_id,
            protos: BitVec::new(max_proto_id + 1),
            font_id,
        }
    }

    /// Times a match against this config has been confirmed.
    pub fn seen(&self) -> u32 {
        self.seen
    }

    /// Count one more confirmation.
    pub fn increment_seen(&mut self) {
        self.seen = self.seen.saturating_add(1);
    }

    /// Highest proto id this config may reference.
    pub fn max_proto_id(&self) -> usize {
        self.max_proto_id
    }

    pub fn font_id(&self) -> i32 {
        self.font_id
    }

    /// Protos belonging to this config.
    pub fn protos(&self) -> &BitVec {
        &self.protos
    }

    pub fn set_proto(&mut self, proto_id: usize) {
        self.protos.set(proto_id);
    }

    pub fn contains_proto(&self, proto_id: usize) -> bool {
        self.protos.test(proto_id)
    }
}

/// A promoted config: its protos live in the class pruner and the
/// config keeps only the ambiguity set recorded at promotion time.
#[derive(Debug, Clone, PartialEq)]
pub struct PermConfig {
    /// Classes the promoted class was confusable with when promoted.
    pub ambigs: Vec<usize>,
    pub font_id: i32,
}

/// Lifecycle state of one config slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigState {
    Temp(TempConfig),
    Perm(PermConfig),
}

impl ConfigState {
    pub fn is_permanent(&self) -> bool {
        matches!(self, ConfigState::Perm(_))
    }

    pub fn as_temp(&self) -> Option<&TempConfig> {
        match self {
            ConfigState::Temp(config) => Some(config),
            ConfigState::Perm(_) => None,
        }
    }

    pub fn as_temp_mut(&mut self) -> Option<&mut TempConfig> {
        match self {
            ConfigState::Temp(config) => Some(config),
            ConfigState::Perm(_) => None,
        }
    }

    pub fn as_perm(&self) -> Option<&PermConfig> {
        match self {
            ConfigState::Perm(config) => Some(config),
            ConfigState::Temp(_) => None,
        }
    }
}

/// Adaptive state of one class.
///
/// `perm_protos` and `perm_configs` mirror the promotion state of the
/// config slots; baseline matching passes them to the matcher as proto
/// and config masks.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptClass {
    num_perm_configs: usize,
    max_seen: u32,
    perm_protos: BitVec,
    perm_configs: BitVec,
    temp_protos: Vec<TempProto>,
    configs: Vec<ConfigState>,
}

impl Default for AdaptClass {
    fn default() -> Self {
        Self::new()
    }
}

impl AdaptClass {
    pub fn new() -> Self {
        Self {
            num_perm_configs: 0,
            max_seen: 0,
            perm_protos: BitVec::new(MAX_NUM_PROTOS),
            perm_configs: BitVec::new(MAX_NUM_CONFIGS),
            temp_protos: Vec::new(),
            configs: Vec::new(),
        }
    }

    /// True until the class receives its first config.
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn num_configs(&self) -> usize {
        self.configs.len()
    }

    pub fn num_perm_configs(&self) -> usize {
        self.num_perm_configs
    }

    /// Highest confirmation count over this class's temp configs.
    pub fn max_seen(&self) -> u32 {
        self.max_seen
    }

    pub fn set_max_seen(&mut self, seen: u32) {
        self.max_seen = seen;
    }

    pub fn config(&self, config_id: usize) -> &ConfigState {
        &self.configs[config_id]
    }

    pub fn config_mut(&mut self, config_id: usize) -> &mut ConfigState {
        &mut self.configs[config_id]
    }

    pub fn configs(&self) -> &[ConfigState] {
        &self.configs
    }

    pub fn is_config_permanent(&self, config_id: usize) -> bool {
        self.perm_configs.test(config_id)
    }

    pub fn is_proto_permanent(&self, proto_id: usize) -> bool {
        self.perm_protos.test(proto_id)
    }

    /// Promoted-proto mask, matcher form.
    pub fn perm_protos(&self) -> &BitVec {
        &self.perm_protos
    }

    /// Promoted-config mask, matcher form.
    pub fn perm_configs(&self) -> &BitVec {
        &self.perm_configs
    }

    /// Float protos still owned by temporary configs.
    pub fn temp_protos(&self) -> &[TempProto] {
        &self.temp_protos
    }
}

/// Mutable template store for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveTemplates {
    templates: IntTemplates,
    num_nonempty_classes: usize,
    num_perm_classes: usize,
    classes: Vec<AdaptClass>,
}

impl AdaptiveTemplates {
    /// Create a store with one empty class per class id.
    pub fn new(num_classes: usize) -> Self {
        let mut templates = IntTemplates::new();
        let mut classes = Vec::with_capacity(num_classes);
        for _ in 0..num_classes {
            templates.add_class(IntClass::new(1, 1));
            classes.push(AdaptClass::new());
        }
        Self {
            templates,
            num_nonempty_classes: 0,
            num_perm_classes: 0,
            classes,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Classes holding at least one config.
    pub fn num_nonempty_classes(&self) -> usize {
        self.num_nonempty_classes
    }

    /// Classes holding at least one permanent config.
    pub fn num_perm_classes(&self) -> usize {
        self.num_perm_classes
    }

    /// The paired integer templates the matcher scores against.
    pub fn templates(&self) -> &IntTemplates {
        &self.templates
    }

    pub fn class(&self, class_id: usize) -> &AdaptClass {
        &self.classes[class_id]
    }

    pub fn class_mut(&mut self, class_id: usize) -> &mut AdaptClass {
        &mut self.classes[class_id]
    }

    pub fn classes(&self) -> &[AdaptClass] {
        &self.classes
    }

    /// Bootstrap an empty class from a blob's own outline features:
    /// one proto per feature and a single temp config holding them all.
    ///
    /// Feature y positions are baseline normalized and get shifted down
    /// before conversion.
    pub fn init_class(&mut self, class_id: usize, font_id: i32, features: &[OutlineFeature]) {
        if features.is_empty() {
            return;
        }
        let int_class = self.templates.class_mut(class_id);
        let class = &mut self.classes[class_id];
        debug_assert!(class.configs.is_empty());

        for feature in features {
            let Some(proto_id) = int_class.add_proto() else {
                break;
            };
            let proto = Proto::from_position(
                feature.x,
                feature.y - Y_DIM_OFFSET,
                feature.length,
                feature.direction,
            );
            int_class.convert_proto(&proto, proto_id);
            int_class.add_proto_to_proto_pruner(&proto, proto_id);
            class.temp_protos.push(TempProto { proto_id, proto });
        }

        let num_protos = int_class.num_protos();
        let Some(config_id) = int_class.add_config() else {
            return;
        };
        let all_protos = BitVec::all_set(num_protos);
        int_class.convert_config(&all_protos, config_id);

        let mut config = TempConfig::new(num_protos - 1, font_id);
        config.protos = all_protos;
        self.push_config_state(class_id, ConfigState::Temp(config));
    }

    /// Cluster runs of adjacent same-angle features into new protos.
    ///
    /// A run ends when the direction shifts by more than
    /// `max_angle_delta` revolutions (circular) or a position jumps by
    /// more than the length accumulated so far. Each run becomes one
    /// proto, registered in the integer class, in `proto_mask`, and in
    /// the class's temp-proto list.
    ///
    /// Returns the class's highest proto id afterwards, or `None` if
    /// the proto capacity was exhausted part way.
    pub fn make_new_temp_protos(
        &mut self,
        class_id: usize,
        features: &[PicoFeature],
        bad_features: &[usize],
        proto_mask: &mut BitVec,
        max_angle_delta: f32,
    ) -> Option<usize> {
        let int_class = self.templates.class_mut(class_id);
        let class = &mut self.classes[class_id];

        let mut start = 0;
        while start < bad_features.len() {
            let first = &features[bad_features[start]];

            let mut end = start + 1;
            let mut segment_length = PICO_FEATURE_LENGTH;
            while end < bad_features.len() {
                let next = &features[bad_features[end]];
                let mut angle_delta = (first.direction - next.direction).abs();
                if angle_delta > 0.5 {
                    angle_delta = 1.0 - angle_delta;
                }
                if angle_delta > max_angle_delta
                    || (first.x - next.x).abs() > segment_length
                    || (first.y - next.y).abs() > segment_length
                {
                    break;
                }
                end += 1;
                segment_length += PICO_FEATURE_LENGTH;
            }
            let last = &features[bad_features[end - 1]];

            let proto_id = int_class.add_proto()?;
            let proto = Proto::from_position(
                (first.x + last.x) / 2.0,
                (first.y + last.y) / 2.0 - Y_DIM_OFFSET,
                segment_length,
                first.direction,
            );
            int_class.convert_proto(&proto, proto_id);
            int_class.add_proto_to_proto_pruner(&proto, proto_id);
            proto_mask.set(proto_id);
            class.temp_protos.push(TempProto { proto_id, proto });

            start = end;
        }
        Some(int_class.num_protos() - 1)
    }

    /// Register a new temp config covering the protos in `proto_mask`.
    ///
    /// Returns the new config id, or `None` when the class has no free
    /// config slot.
    pub fn add_temp_config(
        &mut self,
        class_id: usize,
        proto_mask: &BitVec,
        max_proto_id: usize,
        font_id: i32,
    ) -> Option<usize> {
        let int_class = self.templates.class_mut(class_id);
        let config_id = int_class.add_config()?;
        int_class.convert_config(proto_mask, config_id);

        let num_bits = max_proto_id + 1;
        let words = proto_mask.words()[..words_for_bits(num_bits)].to_vec();
        let mut config = TempConfig::new(max_proto_id, font_id);
        config.protos = BitVec::from_words(words, num_bits);
        self.push_config_state(class_id, ConfigState::Temp(config));
        Some(config_id)
    }

    /// Promote a temp config to permanent.
    ///
    /// The config's protos move out of the temp list into the permanent
    /// mask and the class pruner; the recorded ambiguity set replaces
    /// the confirmation counts. Returns `false` without touching
    /// anything if the config is already permanent or the slot does not
    /// exist.
    pub fn make_permanent(&mut self, class_id: usize, config_id: usize, ambigs: Vec<usize>) -> bool {
        let class = &mut self.classes[class_id];
        let Some(ConfigState::Temp(config)) = class.configs.get(config_id) else {
            return false;
        };
        let max_proto_id = config.max_proto_id();
        let config_protos = config.protos().clone();
        let font_id = config.font_id();

        class.perm_configs.set(config_id);
        if class.num_perm_configs == 0 {
            self.num_perm_classes += 1;
        }
        class.num_perm_configs += 1;

        let temp_protos = std::mem::take(&mut class.temp_protos);
        let (promoted, kept): (Vec<TempProto>, Vec<TempProto>) = temp_protos
            .into_iter()
            .partition(|tp| tp.proto_id <= max_proto_id && config_protos.test(tp.proto_id));
        class.temp_protos = kept;
        for tp in &promoted {
            class.perm_protos.set(tp.proto_id);
        }
        class.configs[config_id] = ConfigState::Perm(PermConfig { ambigs, font_id });

        for tp in &promoted {
            self.templates.add_proto_to_class_pruner(&tp.proto, class_id);
        }
        true
    }

    fn push_config_state(&mut self, class_id: usize, state: ConfigState) {
        let class = &mut self.classes[class_id];
        if class.configs.is_empty() {
            self.num_nonempty_classes += 1;
        }
        class.configs.push(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_features(n: usize, y: f32, direction: f32) -> Vec<OutlineFeature> {
        (0..n)
            .map(|i| OutlineFeature {
                x: i as f32 * 0.1 - 0.2,
                y,
                length: 0.1,
                direction,
            })
            .collect()
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = AdaptiveTemplates::new(40);
        assert_eq!(store.num_classes(), 40);
        assert_eq!(store.num_nonempty_classes(), 0);
        assert_eq!(store.num_perm_classes(), 0);
        assert_eq!(store.templates().num_classes(), 40);
        assert_eq!(store.templates().num_class_pruners(), 2);
        assert!(store.class(7).is_empty());
    }

    #[test]
    fn test_init_class_builds_first_config() {
        let mut store = AdaptiveTemplates::new(4);
        store.init_class(2, 6, &line_features(5, 0.5, 0.0));

        assert_eq!(store.num_nonempty_classes(), 1);
        assert_eq!(store.num_perm_classes(), 0);

        let int_class = store.templates().class(2);
        assert_eq!(int_class.num_protos(), 5);
        assert_eq!(int_class.num_configs(), 1);
        assert!(int_class.config_length(0) > 0);

        let class = store.class(2);
        assert!(!class.is_empty());
        assert_eq!(class.num_configs(), 1);
        assert_eq!(class.temp_protos().len(), 5);
        let config = class.config(0).as_temp().unwrap();
        assert_eq!(config.seen(), 1);
        assert_eq!(config.max_proto_id(), 4);
        assert_eq!(config.font_id(), 6);
        for proto_id in 0..5 {
            assert!(config.contains_proto(proto_id));
        }
    }

    #[test]
    fn test_init_class_shifts_y_down() {
        let mut store = AdaptiveTemplates::new(1);
        store.init_class(0, 0, &line_features(1, 0.5, 0.0));
        let tp = &store.class(0).temp_protos()[0];
        assert!((tp.proto.y - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_init_class_ignores_empty_features() {
        let mut store = AdaptiveTemplates::new(1);
        store.init_class(0, 0, &[]);
        assert!(store.class(0).is_empty());
        assert_eq!(store.num_nonempty_classes(), 0);
    }

    #[test]
    fn test_make_new_temp_protos_clusters_runs() {
        let mut store = AdaptiveTemplates::new(1);
        store.init_class(0, 0, &line_features(1, 0.5, 0.0));

        // two runs: 3 horizontal steps, then 2 vertical ones far away
        let features = vec![
            PicoFeature { x: 0.00, y: 0.5, direction: 0.0 },
            PicoFeature { x: 0.05, y: 0.5, direction: 0.0 },
            PicoFeature { x: 0.10, y: 0.5, direction: 0.0 },
            PicoFeature { x: 0.60, y: 0.2, direction: 0.25 },
            PicoFeature { x: 0.60, y: 0.25, direction: 0.25 },
        ];
        let bad = vec![0, 1, 2, 3, 4];
        let mut mask = BitVec::new(MAX_NUM_PROTOS);
        let max_id = store
            .make_new_temp_protos(0, &features, &bad, &mut mask, 0.015)
            .unwrap();

        // one proto already existed from init_class
        assert_eq!(max_id, 2);
        assert!(mask.test(1));
        assert!(mask.test(2));
        assert!(!mask.test(0));

        let class = store.class(0);
        assert_eq!(class.temp_protos().len(), 3);
        let run = &class.temp_protos()[1].proto;
        assert!((run.length - 0.15).abs() < 1e-6);
        assert!((run.x - 0.05).abs() < 1e-6);
        assert!((run.y - 0.25).abs() < 1e-6);
        assert!((run.angle - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_temp_proto_runs_split_on_angle() {
        let mut store = AdaptiveTemplates::new(1);
        store.init_class(0, 0, &line_features(1, 0.5, 0.0));

        let features = vec![
            PicoFeature { x: 0.00, y: 0.5, direction: 0.0 },
            PicoFeature { x: 0.05, y: 0.5, direction: 0.1 },
        ];
        let mut mask = BitVec::new(MAX_NUM_PROTOS);
        store
            .make_new_temp_protos(0, &features, &[0, 1], &mut mask, 0.015)
            .unwrap();
        // angle delta 0.1 exceeds the limit, so each feature is its own run
        assert_eq!(store.class(0).temp_protos().len(), 3);
    }

    #[test]
    fn test_angle_delta_wraps_around() {
        let mut store = AdaptiveTemplates::new(1);
        store.init_class(0, 0, &line_features(1, 0.5, 0.0));

        let features = vec![
            PicoFeature { x: 0.00, y: 0.5, direction: 0.995 },
            PicoFeature { x: 0.04, y: 0.5, direction: 0.005 },
        ];
        let mut mask = BitVec::new(MAX_NUM_PROTOS);
        store
            .make_new_temp_protos(0, &features, &[0, 1], &mut mask, 0.015)
            .unwrap();
        // 0.995 and 0.005 are 0.01 revolutions apart across the wrap
        assert_eq!(store.class(0).temp_protos().len(), 2);
    }

    #[test]
    fn test_add_temp_config() {
        let mut store = AdaptiveTemplates::new(1);
        store.init_class(0, 3, &line_features(4, 0.5, 0.0));

        let mut mask = BitVec::new(MAX_NUM_PROTOS);
        mask.set(1);
        mask.set(3);
        let config_id = store.add_temp_config(0, &mask, 3, 9).unwrap();
        assert_eq!(config_id, 1);
        assert_eq!(store.num_nonempty_classes(), 1);

        let config = store.class(0).config(1).as_temp().unwrap();
        assert_eq!(config.seen(), 1);
        assert_eq!(config.max_proto_id(), 3);
        assert_eq!(config.font_id(), 9);
        assert!(config.contains_proto(1));
        assert!(config.contains_proto(3));
        assert!(!config.contains_proto(0));

        assert_eq!(store.templates().class(0).num_configs(), 2);
        assert!(store.templates().class(0).proto(1).in_config(1));
    }

    #[test]
    fn test_add_temp_config_full() {
        let mut store = AdaptiveTemplates::new(1);
        store.init_class(0, 0, &line_features(2, 0.5, 0.0));
        let mask = BitVec::all_set(2);
        for _ in 1..MAX_NUM_CONFIGS {
            assert!(store.add_temp_config(0, &mask, 1, 0).is_some());
        }
        assert_eq!(store.add_temp_config(0, &mask, 1, 0), None);
    }

    #[test]
    fn test_make_permanent_promotes_once() {
        let mut store = AdaptiveTemplates::new(2);
        store.init_class(1, 4, &line_features(3, 0.5, 0.0));

        assert!(store.make_permanent(1, 0, vec![0]));
        assert_eq!(store.num_perm_classes(), 1);

        let class = store.class(1);
        assert_eq!(class.num_perm_configs(), 1);
        assert!(class.is_config_permanent(0));
        assert!(class.temp_protos().is_empty());
        for proto_id in 0..3 {
            assert!(class.is_proto_permanent(proto_id));
        }
        let perm = class.config(0).as_perm().unwrap();
        assert_eq!(perm.ambigs, vec![0]);
        assert_eq!(perm.font_id, 4);

        // second promotion is guarded
        assert!(!store.make_permanent(1, 0, vec![]));
        assert_eq!(store.class(1).num_perm_configs(), 1);
        assert_eq!(store.num_perm_classes(), 1);
    }

    #[test]
    fn test_make_permanent_fills_class_pruner() {
        let mut store = AdaptiveTemplates::new(1);
        // feature at baseline y 0.25 becomes a proto at y 0
        let features = vec![OutlineFeature {
            x: 0.0,
            y: 0.25,
            length: 0.4,
            direction: 0.0,
        }];
        store.init_class(0, 0, &features);
        assert_eq!(store.templates().class_pruner(0).class_count(12, 12, 0, 0), 0);

        store.make_permanent(0, 0, Vec::new());
        assert_eq!(store.templates().class_pruner(0).class_count(12, 12, 0, 0), 3);
    }

    #[test]
    fn test_make_permanent_missing_slot() {
        let mut store = AdaptiveTemplates::new(1);
        assert!(!store.make_permanent(0, 0, Vec::new()));
        assert_eq!(store.num_perm_classes(), 0);
    }

    #[test]
    fn test_make_permanent_keeps_other_temp_protos() {
        let mut store = AdaptiveTemplates::new(1);
        store.init_class(0, 0, &line_features(2, 0.5, 0.0));

        // second config introduces one new proto
        let features = vec![PicoFeature { x: 0.6, y: 0.2, direction: 0.25 }];
        let mut mask = BitVec::new(MAX_NUM_PROTOS);
        let max_id = store
            .make_new_temp_protos(0, &features, &[0], &mut mask, 0.015)
            .unwrap();
        store.add_temp_config(0, &mask, max_id, 0).unwrap();

        // promoting config 1 must leave config 0's protos temporary
        assert!(store.make_permanent(0, 1, Vec::new()));
        let class = store.class(0);
        assert_eq!(class.temp_protos().len(), 2);
        assert!(class.is_proto_permanent(2));
        assert!(!class.is_proto_permanent(0));
        assert!(class.config(0).as_temp().is_some());
    }
}
