//! Adaptive classifier - static and adaptive store orchestration
//!
//! [`AdaptiveClassifier`] owns a static template store trained offline
//! and an adaptive store grown from the document being read. A
//! classification call prefers the adaptive store once it holds enough
//! permanent classes, falls back to the static store when the adaptive
//! answer is marginal, re-checks known ambiguities, and reports a
//! space-class noise result when nothing credible matched. The learning
//! path folds correctly-read blobs back into the adaptive store:
//! temporary configs collect sightings until the reliability policy
//! promotes them to permanent, and a backup store can warm up in
//! parallel so a page boundary can rotate a full store out.
//!
//! # See also
//!
//! C Tesseract: `AdaptiveClassifier()`, `DoAdaptiveMatch()` and
//! `AdaptToChar()` in `adaptmatch.cpp`

use tessclassify_core::{
    AdaptClass, AdaptiveTemplates, BitVec, Charset, ConfigState, Cutoffs, IntFeature,
    IntTemplates, MAX_NUM_CONFIGS, MAX_NUM_PROTOS,
};
use tessclassify_match::{
    IntegerMatcher, MatchResult, PrunerResult, apply_cn_correction, prune_classes,
};

use crate::blob::BlobSample;
use crate::error::{AdaptError, AdaptResult};
use crate::params::ClassifierParams;
use crate::results::{AdaptResults, Choice, ScoredClass, WORST_POSSIBLE_RATING};

/// Most choices returned from one classification call.
const MAX_MATCHES: usize = 10;

/// Feature counts above this mark a blob as unusable for adaptation.
const UNLIKELY_NUM_FEATURES: usize = 200;

/// Letters kept as letters in numeric mode.
const ROMAN_LETTERS: &str = "i v x I V X";

/// Shared inputs for one matching pass over a pruner short list.
struct MatchPass<'a> {
    /// Adaptive store when matching adapted classes, `None` for static.
    adapted: Option<&'a AdaptiveTemplates>,
    features: &'a [IntFeature],
    /// Per-class correction factors, zeroed for baseline passes.
    norm_factors: &'a [u8],
    /// Weight of the correction factor against the match distance.
    matcher_multiplier: i32,
    blob: &'a BlobSample,
}

/// Outcome of the read-only half of one adaptation, applied to the
/// store afterwards.
enum Plan {
    /// Nothing to do: unusable features or an already-permanent cover.
    Skip,
    /// First sighting of the class, build it from the outline features.
    Bootstrap,
    /// A temp config covered the blob, count the sighting.
    Reinforce { config_id: usize, promote: bool },
    /// No config covered the blob, cluster a new temp config.
    NewConfig {
        proto_mask: BitVec,
        bad_features: Vec<usize>,
        promote: bool,
    },
    /// The class has no config slot left.
    Fail,
}

/// Character-shape classifier that learns from the document it reads.
pub struct AdaptiveClassifier {
    charset: Charset,
    static_templates: IntTemplates,
    adapted_templates: AdaptiveTemplates,
    backup_templates: Option<AdaptiveTemplates>,
    /// Expected feature counts for static pruning.
    char_norm_cutoffs: Cutoffs,
    /// Expected feature counts for adaptive pruning, zero until a class
    /// bootstraps and mirrors its static cutoff.
    baseline_cutoffs: Cutoffs,
    matcher: IntegerMatcher,
    params: ClassifierParams,
    all_protos_on: BitVec,
    all_configs_on: BitVec,
    all_configs_off: BitVec,
    space_id: usize,
    /// Adaptations rejected for lack of capacity since the last rotation.
    failed_adaptations: u32,
    learning_enabled: bool,
}

impl AdaptiveClassifier {
    /// Build a classifier over `static_templates` with an empty
    /// adaptive store.
    ///
    /// The character set must contain a space entry for the noise
    /// result, and the templates and cutoffs must be sized for it.
    pub fn new(
        charset: Charset,
        static_templates: IntTemplates,
        char_norm_cutoffs: Cutoffs,
        params: ClassifierParams,
    ) -> AdaptResult<Self> {
        if static_templates.num_classes() != charset.len() {
            return Err(AdaptError::ClassCountMismatch {
                what: "static templates",
                expected: charset.len(),
                found: static_templates.num_classes(),
            });
        }
        if char_norm_cutoffs.len() != charset.len() {
            return Err(AdaptError::ClassCountMismatch {
                what: "cutoffs",
                expected: charset.len(),
                found: char_norm_cutoffs.len(),
            });
        }
        let space_id = charset.space_id().ok_or(AdaptError::MissingSpaceClass)?;

        let num_classes = charset.len();
        let mut baseline_cutoffs = Cutoffs::new(num_classes);
        for class_id in 0..num_classes {
            baseline_cutoffs.set(class_id, 0);
        }
        let learning_enabled = params.enable_learning;
        Ok(Self {
            adapted_templates: AdaptiveTemplates::new(num_classes),
            backup_templates: None,
            matcher: IntegerMatcher::new(),
            all_protos_on: BitVec::all_set(MAX_NUM_PROTOS),
            all_configs_on: BitVec::all_set(MAX_NUM_CONFIGS),
            all_configs_off: BitVec::new(MAX_NUM_CONFIGS),
            space_id,
            failed_adaptations: 0,
            learning_enabled,
            charset,
            static_templates,
            char_norm_cutoffs,
            baseline_cutoffs,
            params,
        })
    }

    /// Like [`AdaptiveClassifier::new`] but starting from a previously
    /// saved adaptive store.
    ///
    /// Every class keeps its static cutoff for baseline pruning, since
    /// the store may already hold classes that never bootstrap again.
    pub fn with_adapted_templates(
        charset: Charset,
        static_templates: IntTemplates,
        char_norm_cutoffs: Cutoffs,
        params: ClassifierParams,
        adapted_templates: AdaptiveTemplates,
    ) -> AdaptResult<Self> {
        let mut classifier = Self::new(charset, static_templates, char_norm_cutoffs, params)?;
        classifier.install_adapted_templates(adapted_templates)?;
        Ok(classifier)
    }

    fn install_adapted_templates(&mut self, templates: AdaptiveTemplates) -> AdaptResult<()> {
        if templates.num_classes() != self.charset.len() {
            return Err(AdaptError::ClassCountMismatch {
                what: "adapted templates",
                expected: self.charset.len(),
                found: templates.num_classes(),
            });
        }
        self.adapted_templates = templates;
        for class_id in 0..self.charset.len() {
            self.baseline_cutoffs
                .set(class_id, self.char_norm_cutoffs.for_class(class_id));
        }
        Ok(())
    }

    // ======================================================================
    // Classification
    // ======================================================================

    /// Classify one blob into ranked choices, best first.
    ///
    /// At most [`MAX_MATCHES`] choices come back; a blob nothing matched
    /// yields the space-class noise result rather than an empty list.
    pub fn classify(&self, blob: &BlobSample) -> Vec<Choice> {
        let mut results = AdaptResults::new();
        results.blob_length = blob.blob_length;
        self.do_adaptive_match(blob, &mut results);
        self.remove_bad_matches(&mut results);
        results.sort_descending();
        self.remove_extra_puncs(&mut results);
        results.compute_best();
        self.convert_matches_to_choices(&results)
    }

    /// Route one blob through the store fallback chain.
    fn do_adaptive_match(&self, blob: &BlobSample, results: &mut AdaptResults) {
        if self.adapted_templates.num_perm_classes() < self.params.min_permanent_classes
            || self.params.static_matching_only
        {
            self.char_norm_classify(blob, results);
        } else {
            let ambiguities = self.baseline_classify(blob, results);
            let marginal = 1.0 - results.best_rating > self.params.reliable_adaptive_result;
            if results.matches.is_empty() || (marginal && !self.params.adaptive_matching_only) {
                self.char_norm_classify(blob, results);
            } else if !ambiguities.is_empty() && !self.params.adaptive_matching_only {
                self.ambig_classify(blob, &ambiguities, results);
            }
        }
        if !results.has_nonfragment || results.matches.is_empty() {
            self.classify_as_noise(results);
        }
    }

    /// Match against the adaptive store under baseline normalization.
    ///
    /// Returns the ambiguity list stored with the best match's config,
    /// which steers the follow-up static pass.
    fn baseline_classify(&self, blob: &BlobSample, results: &mut AdaptResults) -> Vec<usize> {
        let features = blob.baseline_features();
        if features.is_empty() {
            return Vec::new();
        }
        // Baseline matching carries no x-height information; zeroed
        // factors keep the pruner and the corrections neutral.
        let zeroed_factors = vec![0u8; self.charset.len()];
        let pruned = prune_classes(
            self.adapted_templates.templates(),
            &features,
            None,
            Some(&zeroed_factors),
            &self.baseline_cutoffs,
            &self.charset,
            &self.params.pruner,
        );
        let pass = MatchPass {
            adapted: Some(&self.adapted_templates),
            features: &features,
            norm_factors: &zeroed_factors,
            matcher_multiplier: 0,
            blob,
        };
        self.master_match(&pass, &pruned, results);

        let Some(best_class) = results.best_class else {
            return Vec::new();
        };
        let Some(best_index) = results.best_index else {
            return Vec::new();
        };
        let config_id = results.matches[best_index].config;
        let class = self.adapted_templates.class(best_class);
        if config_id >= class.num_configs() {
            return Vec::new();
        }
        class
            .config(config_id)
            .as_perm()
            .map(|perm| perm.ambigs.clone())
            .unwrap_or_default()
    }

    /// Match against the static store under character normalization.
    fn char_norm_classify(&self, blob: &BlobSample, results: &mut AdaptResults) {
        let features = &blob.char_norm_features;
        if features.is_empty() {
            return;
        }
        let pruned = prune_classes(
            &self.static_templates,
            features,
            None,
            Some(&blob.char_norm_factors),
            &self.char_norm_cutoffs,
            &self.charset,
            &self.params.pruner,
        );
        let pass = MatchPass {
            adapted: None,
            features,
            norm_factors: &blob.char_norm_factors,
            matcher_multiplier: self.params.integer_matcher_multiplier,
            blob,
        };
        self.master_match(&pass, &pruned, results);
    }

    /// Re-match the listed static classes without pruning, using the
    /// baseline features the adaptive match was scored on.
    fn ambig_classify(&self, blob: &BlobSample, ambiguities: &[usize], results: &mut AdaptResults) {
        let features = blob.baseline_features();
        if features.is_empty() {
            return;
        }
        let pass = MatchPass {
            adapted: None,
            features: &features,
            norm_factors: &blob.char_norm_factors,
            matcher_multiplier: self.params.integer_matcher_multiplier,
            blob,
        };
        for &class_id in ambiguities {
            // Stored ambiguity lists may outlive the character set that
            // produced them.
            if class_id >= self.static_templates.num_classes() {
                continue;
            }
            let matched = self.matcher.match_class(
                self.static_templates.class(class_id),
                &self.all_protos_on,
                &self.all_configs_on,
                &features,
            );
            self.score_match(&pass, class_id, &matched, results);
        }
    }

    /// Run the fine matcher over every pruner survivor.
    ///
    /// Adaptive passes restrict each class to its permanent protos and
    /// configs; static passes run with every mask bit set.
    fn master_match(&self, pass: &MatchPass, pruned: &[PrunerResult], results: &mut AdaptResults) {
        let templates = match pass.adapted {
            Some(store) => store.templates(),
            None => &self.static_templates,
        };
        for survivor in pruned {
            let class_id = survivor.class_id;
            let (proto_mask, config_mask) = match pass.adapted {
                Some(store) => {
                    let class = store.class(class_id);
                    (class.perm_protos(), class.perm_configs())
                }
                None => (&self.all_protos_on, &self.all_configs_on),
            };
            let matched =
                self.matcher
                    .match_class(templates.class(class_id), proto_mask, config_mask, pass.features);
            self.score_match(pass, class_id, &matched, results);
        }
    }

    /// Correct one fine-match outcome and accumulate it.
    fn score_match(
        &self,
        pass: &MatchPass,
        class_id: usize,
        matched: &MatchResult,
        results: &mut AdaptResults,
    ) {
        if !self.charset.is_enabled(class_id) {
            return;
        }
        let rating = self.corrected_rating(pass, class_id, matched);
        let (font_id, font_id2) = match pass.adapted {
            Some(store) => {
                let class = store.class(class_id);
                (
                    config_font_id(class, matched.config),
                    config_font_id(class, matched.config2),
                )
            }
            None => (-1, -1),
        };
        results.add(
            ScoredClass {
                class_id,
                rating,
                config: matched.config,
                config2: matched.config2,
                feature_misses: matched.feature_misses,
                font_id,
                font_id2,
                adapted: pass.adapted.is_some(),
            },
            self.params.bad_match_pad,
            &self.charset,
        );
    }

    /// Fold the normalization factor, the miss penalty and the vertical
    /// misfit penalty into one score, floored at the worst rating.
    fn corrected_rating(&self, pass: &MatchPass, class_id: usize, matched: &MatchResult) -> f32 {
        let factor = pass.norm_factors.get(class_id).copied().unwrap_or(0);
        let cn_corrected = apply_cn_correction(
            matched.rating,
            pass.blob.blob_length,
            factor as i32,
            pass.matcher_multiplier,
        );
        let miss_penalty = self.params.miss_scale * matched.feature_misses as f32;

        let mut vertical_penalty = 0.0;
        if !self.charset.is_alpha(class_id)
            && !self.charset.is_digit(class_id)
            && factor != 0
            && self.params.misfit_junk_penalty > 0.0
        {
            let (min_bottom, max_bottom, min_top, max_top) = self.charset.top_bottom(class_id);
            if pass.blob.top < min_top as i32
                || pass.blob.top > max_top as i32
                || pass.blob.bottom < min_bottom as i32
                || pass.blob.bottom > max_bottom as i32
            {
                vertical_penalty = self.params.misfit_junk_penalty;
            }
        }
        (1.0 - (cn_corrected + miss_penalty + vertical_penalty)).max(WORST_POSSIBLE_RATING)
    }

    /// Score the blob as the space class, rated by how far its length
    /// sits above typical noise.
    fn classify_as_noise(&self, results: &mut AdaptResults) {
        let ratio = results.blob_length as f32 / self.params.avg_noise_size;
        let squared = ratio * ratio;
        let rating = squared / (1.0 + squared);
        results.add(
            ScoredClass {
                class_id: self.space_id,
                rating: 1.0 - rating,
                config: 0,
                config2: 0,
                feature_misses: 0,
                font_id: -1,
                font_id2: -1,
                adapted: false,
            },
            self.params.bad_match_pad,
            &self.charset,
        );
    }

    // ======================================================================
    // Result post-processing
    // ======================================================================

    /// Drop scores trailing the best by more than the pad. Numeric mode
    /// additionally drops letters, keeping roman-numeral letters and
    /// remapping an accepted `l` or `O` onto its digit lookalike when
    /// the digit itself scored below the pad.
    fn remove_bad_matches(&self, results: &mut AdaptResults) {
        let threshold = results.best_rating - self.params.bad_match_pad;
        if !self.params.numeric_mode {
            results.matches.retain(|m| m.rating >= threshold);
            return;
        }

        let one_id = self.charset.id_of("1");
        let zero_id = self.charset.id_of("0");
        let scored_one = results.scored(one_id);
        let scored_zero = results.scored(zero_id);
        let charset = &self.charset;
        results.matches.retain_mut(|m| {
            if m.rating < threshold {
                return false;
            }
            let text = charset.text_of(m.class_id);
            if !charset.is_alpha(m.class_id) || ROMAN_LETTERS.contains(text) {
                true
            } else if text == "l" && scored_one < threshold {
                match one_id {
                    Some(id) => {
                        m.class_id = id;
                        true
                    }
                    None => false,
                }
            } else if text == "O" && scored_zero < threshold {
                match zero_id {
                    Some(id) => {
                        m.class_id = id;
                        true
                    }
                    None => false,
                }
            } else {
                false
            }
        });
    }

    /// Keep the first two punctuation answers and the first digit
    /// answer, in rating order.
    fn remove_extra_puncs(&self, results: &mut AdaptResults) {
        let charset = &self.charset;
        let mut punc_count = 0;
        let mut digit_count = 0;
        results.matches.retain(|m| {
            if charset.is_punct(m.class_id) {
                punc_count += 1;
                punc_count <= 2
            } else if charset.is_digit(m.class_id) {
                digit_count += 1;
                digit_count <= 1
            } else {
                true
            }
        });
    }

    /// Scale surviving scores into output choices.
    fn convert_matches_to_choices(&self, results: &AdaptResults) -> Vec<Choice> {
        let mut choices = Vec::with_capacity(results.matches.len().min(MAX_MATCHES));
        let mut has_nonfragment = false;
        let mut best_certainty = f32::MIN;
        for m in &results.matches {
            let fragment = self.charset.is_fragment(m.class_id);
            // A fragment may not take the last slot while a whole
            // character is still pending.
            if choices.len() + 1 == MAX_MATCHES && !has_nonfragment && fragment {
                continue;
            }
            let (rating, certainty) = if results.blob_length == 0 {
                (100.0, -20.0)
            } else {
                let distance = 1.0 - m.rating;
                (
                    distance * self.params.rating_scale * results.blob_length as f32,
                    -distance * self.params.certainty_scale,
                )
            };
            if certainty > best_certainty {
                best_certainty = certainty.min(self.params.adapted_pruning_threshold);
            } else if m.adapted && certainty / self.params.adapted_pruning_factor < best_certainty {
                // Adapted results should be confident; one far behind
                // the best is more likely an adaptation gone stale.
                continue;
            }
            choices.push(Choice {
                class_id: m.class_id,
                rating,
                certainty,
                font_id: m.font_id,
                font_id2: m.font_id2,
                adapted: m.adapted,
            });
            has_nonfragment |= !fragment;
            if choices.len() >= MAX_MATCHES {
                break;
            }
        }
        choices
    }

    // ======================================================================
    // Learning
    // ======================================================================

    /// Adapt the stores to a blob known to read as `class_id`.
    ///
    /// `threshold` is the match distance at or under which the blob
    /// reinforces an existing config instead of founding a new one.
    /// Adapts the main store, and the backup store when one is warming
    /// up. Does nothing while learning is disabled.
    pub fn learn_sample(
        &mut self,
        blob: &BlobSample,
        class_id: usize,
        font_id: i32,
        threshold: f32,
    ) -> AdaptResult<()> {
        if !self.learning_enabled {
            return Ok(());
        }
        if class_id >= self.charset.len() {
            return Err(AdaptError::UnknownClass {
                class_id,
                num_classes: self.charset.len(),
            });
        }
        let adapt_threshold = fixed_adapt_threshold(threshold, self.params.good_threshold);
        self.adapt_to_char(false, blob, class_id, font_id, threshold, adapt_threshold);
        if self.backup_templates.is_some() {
            self.adapt_to_char(true, blob, class_id, font_id, threshold, adapt_threshold);
        }
        Ok(())
    }

    /// Adapt one store to one blob.
    fn adapt_to_char(
        &mut self,
        use_backup: bool,
        blob: &BlobSample,
        class_id: usize,
        font_id: i32,
        threshold: f32,
        adapt_threshold: i32,
    ) {
        let plan = match self.store(use_backup) {
            Some(store) => {
                self.plan_adaptation(store, blob, class_id, font_id, threshold, adapt_threshold)
            }
            None => return,
        };
        // Promotions record which static classes the blob also matches,
        // gathered before the store is borrowed for writing.
        let ambig_matches = match &plan {
            Plan::Reinforce { promote: true, .. } | Plan::NewConfig { promote: true, .. } => {
                Some(self.char_norm_match_ids(blob))
            }
            _ => None,
        };

        match plan {
            Plan::Skip => {}
            Plan::Fail => self.failed_adaptations += 1,
            Plan::Bootstrap => {
                let Some(store) = self.store_mut(use_backup) else {
                    return;
                };
                store.init_class(class_id, font_id, &blob.outline_features);
                if !use_backup {
                    // The class now prunes like its static counterpart.
                    self.baseline_cutoffs
                        .set(class_id, self.char_norm_cutoffs.for_class(class_id));
                }
            }
            Plan::Reinforce { config_id, promote } => {
                let Some(store) = self.store_mut(use_backup) else {
                    return;
                };
                let class = store.class_mut(class_id);
                let seen = match class.config_mut(config_id).as_temp_mut() {
                    Some(temp) => {
                        temp.increment_seen();
                        temp.seen()
                    }
                    None => return,
                };
                if seen > class.max_seen() {
                    class.set_max_seen(seen);
                }
                if promote {
                    let matches = ambig_matches.unwrap_or_default();
                    if self.promote_config(use_backup, class_id, config_id, &matches) {
                        self.update_ambigs_group(use_backup, class_id, &matches);
                    }
                }
            }
            Plan::NewConfig {
                mut proto_mask,
                bad_features,
                promote,
            } => {
                let max_angle_delta = self.params.max_angle_delta;
                let Some(store) = self.store_mut(use_backup) else {
                    return;
                };
                let max_proto_id = store.make_new_temp_protos(
                    class_id,
                    &blob.pico_features,
                    &bad_features,
                    &mut proto_mask,
                    max_angle_delta,
                );
                let Some(max_proto_id) = max_proto_id else {
                    self.failed_adaptations += 1;
                    return;
                };
                let config_id = store.add_temp_config(class_id, &proto_mask, max_proto_id, font_id);
                let Some(config_id) = config_id else {
                    self.failed_adaptations += 1;
                    return;
                };
                if promote {
                    let matches = ambig_matches.unwrap_or_default();
                    if self.promote_config(use_backup, class_id, config_id, &matches) {
                        self.update_ambigs_group(use_backup, class_id, &matches);
                    }
                }
            }
        }
    }

    /// Decide what one adaptation will do, without touching the store.
    fn plan_adaptation(
        &self,
        store: &AdaptiveTemplates,
        blob: &BlobSample,
        class_id: usize,
        font_id: i32,
        threshold: f32,
        adapt_threshold: i32,
    ) -> Plan {
        let class = store.class(class_id);
        if class.is_empty() {
            let count = blob.outline_features.len();
            if count == 0 || count > UNLIKELY_NUM_FEATURES {
                return Plan::Skip;
            }
            return Plan::Bootstrap;
        }

        let features = blob.baseline_features();
        if features.is_empty() || features.len() > UNLIKELY_NUM_FEATURES {
            return Plan::Skip;
        }

        // Only configs of the same font may absorb the sighting.
        let mut font_configs = BitVec::new(MAX_NUM_CONFIGS);
        for config_id in 0..class.num_configs() {
            if config_font_id(class, config_id) == font_id {
                font_configs.set(config_id);
            }
        }
        let int_class = store.templates().class(class_id);
        let matched = self
            .matcher
            .match_class(int_class, &self.all_protos_on, &font_configs, &features);

        if matched.rating <= threshold {
            if class.is_config_permanent(matched.config) {
                return Plan::Skip;
            }
            let seen_next = class
                .config(matched.config)
                .as_temp()
                .map(|temp| temp.seen().saturating_add(1))
                .unwrap_or(0);
            let promote = self.config_would_be_reliable(store, class_id, seen_next);
            return Plan::Reinforce {
                config_id: matched.config,
                promote,
            };
        }

        if class.num_configs() >= MAX_NUM_CONFIGS {
            return Plan::Fail;
        }
        let good_protos = self.matcher.find_good_protos(
            int_class,
            &self.all_protos_on,
            &self.all_configs_off,
            &features,
            adapt_threshold,
        );
        let mut proto_mask = BitVec::new(MAX_NUM_PROTOS);
        for proto_id in good_protos {
            proto_mask.set(proto_id);
        }
        let bad_features = self.matcher.find_bad_features(
            int_class,
            &proto_mask,
            &self.all_configs_on,
            &features,
            adapt_threshold,
        );
        // A new config starts at one sighting; it can only promote
        // under a policy with a minimum of one.
        let promote = self.config_would_be_reliable(store, class_id, 1);
        Plan::NewConfig {
            proto_mask,
            bad_features,
            promote,
        }
    }

    /// Reliability policy for a temp config with `seen` sightings.
    fn config_would_be_reliable(
        &self,
        store: &AdaptiveTemplates,
        class_id: usize,
        seen: u32,
    ) -> bool {
        if seen >= self.params.sufficient_examples {
            return true;
        }
        if seen < self.params.min_examples {
            return false;
        }
        if self.params.use_ambigs_for_adaption {
            for &ambig_id in self.charset.ambigs_for_adaption(class_id) {
                let ambig_class = store.class(ambig_id);
                if ambig_class.num_perm_configs() == 0
                    && ambig_class.max_seen() < self.params.min_examples
                {
                    return false;
                }
            }
        }
        true
    }

    /// Promote one temp config, attaching the ambiguity list the blob
    /// earned in its static pass.
    fn promote_config(
        &mut self,
        use_backup: bool,
        class_id: usize,
        config_id: usize,
        ambig_matches: &[usize],
    ) -> bool {
        let ambigs = ambigs_excluding_self(ambig_matches, class_id);
        match self.store_mut(use_backup) {
            Some(store) => store.make_permanent(class_id, config_id, ambigs),
            None => false,
        }
    }

    /// Re-check every class that lists `class_id` as an adaption
    /// ambiguity; a promotion here can tip their gray-zone configs over
    /// the reliability bar.
    fn update_ambigs_group(&mut self, use_backup: bool, class_id: usize, ambig_matches: &[usize]) {
        if !self.params.use_ambigs_for_adaption {
            return;
        }
        let group: Vec<usize> = self.charset.reverse_ambigs_for_adaption(class_id).to_vec();
        for ambig_id in group {
            let mut promotable = Vec::new();
            {
                let Some(store) = self.store(use_backup) else {
                    return;
                };
                let class = store.class(ambig_id);
                for config_id in 0..class.num_configs() {
                    if class.is_config_permanent(config_id) {
                        continue;
                    }
                    let Some(temp) = class.config(config_id).as_temp() else {
                        continue;
                    };
                    if self.config_would_be_reliable(store, ambig_id, temp.seen()) {
                        promotable.push(config_id);
                    }
                }
            }
            for config_id in promotable {
                self.promote_config(use_backup, ambig_id, config_id, ambig_matches);
            }
        }
    }

    /// Static classes the blob matches, best first, for ambiguity
    /// bookkeeping at promotion time.
    fn char_norm_match_ids(&self, blob: &BlobSample) -> Vec<usize> {
        let mut results = AdaptResults::new();
        results.blob_length = blob.blob_length;
        self.char_norm_classify(blob, &mut results);
        self.remove_bad_matches(&mut results);
        results.sort_descending();
        results.matches.iter().map(|m| m.class_id).collect()
    }

    // ======================================================================
    // Store rotation
    // ======================================================================

    /// A capacity failure has been counted since the last rotation.
    pub fn is_full(&self) -> bool {
        self.failed_adaptations > 0
    }

    /// The main store holds no permanent class yet.
    pub fn is_empty(&self) -> bool {
        self.adapted_templates.num_perm_classes() == 0
    }

    /// Throw away both stores and start learning from scratch.
    pub fn reset_adapted_templates(&mut self) {
        self.adapted_templates = AdaptiveTemplates::new(self.charset.len());
        self.backup_templates = None;
        self.failed_adaptations = 0;
    }

    /// Replace the main store with the warmed-up backup, or reset when
    /// no backup was started.
    pub fn switch_to_backup(&mut self) {
        match self.backup_templates.take() {
            Some(backup) => {
                self.adapted_templates = backup;
                self.failed_adaptations = 0;
            }
            None => self.reset_adapted_templates(),
        }
    }

    /// Start warming up a fresh backup store alongside the main one.
    pub fn start_backup(&mut self) {
        self.backup_templates = Some(AdaptiveTemplates::new(self.charset.len()));
    }

    /// Page-boundary rotation: a full classifier switches to its
    /// backup; one that has started learning starts a backup.
    pub fn start_new_page(&mut self) {
        if self.is_full() {
            self.switch_to_backup();
        } else if !self.is_empty() {
            self.start_backup();
        }
    }

    // ======================================================================
    // Learning switch and persistence
    // ======================================================================

    /// Allow [`AdaptiveClassifier::learn_sample`] to modify the stores,
    /// subject to the configured learning switch.
    pub fn enable_learning(&mut self) {
        self.learning_enabled = self.params.enable_learning;
    }

    /// Make [`AdaptiveClassifier::learn_sample`] a no-op.
    pub fn disable_learning(&mut self) {
        self.learning_enabled = false;
    }

    pub fn learning_enabled(&self) -> bool {
        self.learning_enabled
    }

    /// Serialize the main adaptive store.
    pub fn save_adapted_templates(&self) -> AdaptResult<Vec<u8>> {
        Ok(self.adapted_templates.write_to_bytes()?)
    }

    /// Replace the main adaptive store with a previously saved one.
    pub fn load_adapted_templates(&mut self, bytes: &[u8]) -> AdaptResult<()> {
        let templates = AdaptiveTemplates::read_from_bytes(bytes)?;
        self.install_adapted_templates(templates)
    }

    // ======================================================================
    // Accessors
    // ======================================================================

    pub fn charset(&self) -> &Charset {
        &self.charset
    }

    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    pub fn adapted_templates(&self) -> &AdaptiveTemplates {
        &self.adapted_templates
    }

    pub fn backup_templates(&self) -> Option<&AdaptiveTemplates> {
        self.backup_templates.as_ref()
    }

    /// Adaptations rejected for lack of capacity since the last
    /// rotation.
    pub fn failed_adaptations(&self) -> u32 {
        self.failed_adaptations
    }

    fn store(&self, use_backup: bool) -> Option<&AdaptiveTemplates> {
        if use_backup {
            self.backup_templates.as_ref()
        } else {
            Some(&self.adapted_templates)
        }
    }

    fn store_mut(&mut self, use_backup: bool) -> Option<&mut AdaptiveTemplates> {
        if use_backup {
            self.backup_templates.as_mut()
        } else {
            Some(&mut self.adapted_templates)
        }
    }
}

/// Font behind a config in either lifecycle state, -1 past the end.
fn config_font_id(class: &AdaptClass, config_id: usize) -> i32 {
    if config_id >= class.num_configs() {
        return -1;
    }
    match class.config(config_id) {
        ConfigState::Temp(temp) => temp.font_id(),
        ConfigState::Perm(perm) => perm.font_id,
    }
}

/// The promotion ambiguity list: every static match, unless the class
/// being promoted was the only one.
fn ambigs_excluding_self(matches: &[usize], class_id: usize) -> Vec<usize> {
    if matches.len() == 1 && matches[0] == class_id {
        Vec::new()
    } else {
        matches.to_vec()
    }
}

/// Map a match-distance threshold to the fixed-point proto and feature
/// acceptance bar. The good threshold itself maps to 229, anything
/// else to `255 * (1 - threshold)` truncated into 0..=255.
fn fixed_adapt_threshold(threshold: f32, good_threshold: f32) -> i32 {
    let scaled = if threshold == good_threshold {
        0.9
    } else {
        1.0 - threshold
    };
    ((255.0 * scaled) as i32).clamp(0, 255)
}
