//! Pruner tables - coarse acceptance regions for protos
//!
//! The class pruner is a 24x24x24 lookup over quantized (x, y, angle)
//! feature space. Each cell packs a 2-bit weight per class, 16 classes
//! per word; one table covers a block of 32 classes. Weights are
//! written at three tightness levels when a proto is added, so a
//! feature close to the proto scores 3 and one in the loose fringe
//! scores 1.
//!
//! Rectangle filling walks the rotated acceptance region column by
//! column with a fixed-point edge stepper ([`TableFiller`]). Protos
//! within about 0.9 degrees of horizontal or vertical snap to an
//! axis-aligned fill.
//!
//! The per-class proto pruners are simpler: one 64-bucket bit table
//! per param, bit i of a bucket meaning proto i of the set accepts
//! that bucket.
//!
//! # See also
//!
//! C Tesseract: `CLASS_PRUNER_STRUCT`, `InitTableFiller()`,
//! `GetNextFill()`, `DoFill()`, `FillPPCircularBits()` in `intproto.cpp`

use std::f32::consts::PI;

use crate::feature::{
    ANGLE_SHIFT, X_SHIFT, Y_SHIFT, bucket_end, bucket_start, bucket8_for, bucket16_for,
    circ_bucket_for, int_cast_rounded,
};
use crate::inttemp::{NUM_PP_BUCKETS, NUM_PP_PARAMS, PRUNER_ANGLE, PRUNER_X, PRUNER_Y,
    WERDS_PER_PP_VECTOR};
use crate::proto::{PICO_FEATURE_LENGTH, Proto};

/// Buckets per class-pruner dimension.
pub const NUM_CP_BUCKETS: usize = 24;
/// Classes covered by one class-pruner table.
pub const CLASSES_PER_CP: usize = 32;
/// Bits of weight per class in a pruner word.
pub const NUM_BITS_PER_CLASS: usize = 2;
/// Classes per pruner word.
pub const CLASSES_PER_CP_WERD: usize = 32 / NUM_BITS_PER_CLASS;
/// Words per pruner cell.
pub const WERDS_PER_CP_VECTOR: usize = CLASSES_PER_CP / CLASSES_PER_CP_WERD;
/// Mask of one class's weight at bit position 0.
pub const CLASS_PRUNER_CLASS_MASK: u32 = (1 << NUM_BITS_PER_CLASS) - 1;

/// Fill tightness levels.
pub const NUM_CP_LEVELS: usize = 3;

/// Protos this close to horizontal/vertical fill as axis-aligned
/// (about 0.9 degrees, in revolutions).
const HV_TOLERANCE: f32 = 0.0025;

/* class-pruner pads per level, end/side in pico lengths, angle in degrees */
const CP_ANGLE_PAD_LOOSE: f32 = 45.0;
const CP_ANGLE_PAD_MEDIUM: f32 = 20.0;
const CP_ANGLE_PAD_TIGHT: f32 = 10.0;
const CP_END_PAD_LOOSE: f32 = 0.5;
const CP_END_PAD_MEDIUM: f32 = 0.5;
const CP_END_PAD_TIGHT: f32 = 0.5;
const CP_SIDE_PAD_LOOSE: f32 = 2.5;
const CP_SIDE_PAD_MEDIUM: f32 = 1.2;
const CP_SIDE_PAD_TIGHT: f32 = 0.6;

/* proto-pruner pads */
const PP_ANGLE_PAD: f32 = 45.0;
const PP_END_PAD: f32 = 0.5;
const PP_SIDE_PAD: f32 = 2.5;

/// Class-pruner table covering one block of 32 classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassPruner {
    // indexed [x][y][angle][word]
    p: Box<[[[[u32; WERDS_PER_CP_VECTOR]; NUM_CP_BUCKETS]; NUM_CP_BUCKETS]; NUM_CP_BUCKETS]>,
}

/// Pruner table holding a given class id.
#[inline]
pub fn cpruner_id_for(class_id: usize) -> usize {
    class_id / CLASSES_PER_CP
}

/// Word within a pruner cell holding a given class id.
#[inline]
pub fn cpruner_word_index_for(class_id: usize) -> usize {
    (class_id % CLASSES_PER_CP) / CLASSES_PER_CP_WERD
}

/// Bit-pair position of a class id within its pruner word.
#[inline]
pub fn cpruner_bit_index_for(class_id: usize) -> usize {
    (class_id % CLASSES_PER_CP) % CLASSES_PER_CP_WERD
}

/// Weight `level + 1` shifted to a class's bit-pair position.
#[inline]
fn cpruner_mask_for(level: usize, class_id: usize) -> u32 {
    ((level as u32) + 1) << (cpruner_bit_index_for(class_id) * NUM_BITS_PER_CLASS)
}

impl ClassPruner {
    /// Create a zeroed pruner table.
    pub fn new() -> Self {
        Self {
            p: Box::new([[[[0; WERDS_PER_CP_VECTOR]; NUM_CP_BUCKETS]; NUM_CP_BUCKETS]; NUM_CP_BUCKETS]),
        }
    }

    /// The word vector for one quantized (x, y, angle) cell.
    #[inline]
    pub fn cell(&self, x: usize, y: usize, angle: usize) -> &[u32; WERDS_PER_CP_VECTOR] {
        &self.p[x][y][angle]
    }

    pub fn word(&self, x: usize, y: usize, angle: usize, word: usize) -> u32 {
        self.p[x][y][angle][word]
    }

    pub fn set_word(&mut self, x: usize, y: usize, angle: usize, word: usize, value: u32) {
        self.p[x][y][angle][word] = value;
    }

    /// Weight of a class at one cell, 0..=3.
    pub fn class_count(&self, x: usize, y: usize, angle: usize, class_id: usize) -> u32 {
        let word = self.p[x][y][angle][cpruner_word_index_for(class_id)];
        (word >> (cpruner_bit_index_for(class_id) * NUM_BITS_PER_CLASS)) & CLASS_PRUNER_CLASS_MASK
    }

    /// Raise this table's weights for `class_id` around a proto, one
    /// pass per tightness level, tightest first.
    ///
    /// `class_id` may be a store-wide id; only its position within the
    /// block matters here.
    pub fn add_proto(&mut self, proto: &Proto, class_id: usize) {
        let word_index = cpruner_word_index_for(class_id);
        let class_mask = cpruner_mask_for(NUM_CP_LEVELS - 1, class_id);

        for level in (0..NUM_CP_LEVELS).rev() {
            let (end_pad, side_pad, angle_pad) = pads_for_level(level);
            let class_count = cpruner_mask_for(level, class_id);
            for spec in TableFiller::new(end_pad, side_pad, angle_pad, proto) {
                self.do_fill(&spec, class_mask, class_count, word_index);
            }
        }
    }

    /// Raise one column of cells to `class_count` where it exceeds the
    /// weight already present.
    fn do_fill(&mut self, spec: &FillSpec, class_mask: u32, class_count: u32, word_index: usize) {
        let last = NUM_CP_BUCKETS as i32 - 1;
        let x = spec.x.clamp(0, last) as usize;
        let y_start = spec.y_start.max(0);
        let y_end = spec.y_end.min(last);

        let mut y = y_start;
        while y <= y_end {
            let mut angle = spec.angle_start;
            loop {
                let word = &mut self.p[x][y as usize][angle][word_index];
                if class_count > (*word & class_mask) {
                    *word = (*word & !class_mask) | class_count;
                }
                if angle == spec.angle_end {
                    break;
                }
                angle = circular_next(angle);
            }
            y += 1;
        }
    }
}

impl Default for ClassPruner {
    fn default() -> Self {
        Self::new()
    }
}

/// Pads for one class-pruner level: (end, side, angle), the first two
/// in normalized units, the angle in revolutions capped at half a turn.
fn pads_for_level(level: usize) -> (f32, f32, f32) {
    let (end, side, angle) = match level {
        0 => (CP_END_PAD_LOOSE, CP_SIDE_PAD_LOOSE, CP_ANGLE_PAD_LOOSE),
        1 => (CP_END_PAD_MEDIUM, CP_SIDE_PAD_MEDIUM, CP_ANGLE_PAD_MEDIUM),
        _ => (CP_END_PAD_TIGHT, CP_SIDE_PAD_TIGHT, CP_ANGLE_PAD_TIGHT),
    };
    (
        end * PICO_FEATURE_LENGTH,
        side * PICO_FEATURE_LENGTH,
        (angle / 360.0).min(0.5),
    )
}

#[inline]
fn circular_next(bucket: usize) -> usize {
    if bucket < NUM_CP_BUCKETS - 1 { bucket + 1 } else { 0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SwitchType {
    Start,
    End,
    Last,
}

/// Edge event at a column of the acceptance region.
#[derive(Debug, Clone, Copy)]
struct FillSwitch {
    kind: SwitchType,
    x: i32,
    y: i32,
    y_init: i16,
    delta: i16,
}

const NO_SWITCH: FillSwitch = FillSwitch {
    kind: SwitchType::Last,
    x: 0,
    y: 0,
    y_init: 0,
    delta: 0,
};

/// One column of cells to fill.
#[derive(Debug, Clone, Copy)]
struct FillSpec {
    x: i32,
    y_start: i32,
    y_end: i32,
    angle_start: usize,
    angle_end: usize,
}

/// Walks a proto's padded acceptance region column by column.
///
/// The y edges advance in units of 1/256th of a bucket per column;
/// switch records flip an edge's slope at the region's corner columns.
struct TableFiller {
    next_switch: usize,
    angle_start: usize,
    angle_end: usize,
    x: i32,
    y_start: i16,
    y_end: i16,
    start_delta: i16,
    end_delta: i16,
    switches: [FillSwitch; 3],
}

impl TableFiller {
    fn new(end_pad: f32, side_pad: f32, angle_pad: f32, proto: &Proto) -> Self {
        const NB: i32 = NUM_CP_BUCKETS as i32;

        let angle = proto.angle;
        let x = proto.x;
        let y = proto.y;
        let half_length = proto.length / 2.0;

        let mut filler = TableFiller {
            next_switch: 0,
            angle_start: circ_bucket_for(angle - angle_pad, ANGLE_SHIFT, NB) as usize,
            angle_end: circ_bucket_for(angle + angle_pad, ANGLE_SHIFT, NB) as usize,
            x: 0,
            y_start: 0,
            y_end: 0,
            start_delta: 0,
            end_delta: 0,
            switches: [NO_SWITCH; 3],
        };

        if (angle - 0.0).abs() < HV_TOLERANCE || (angle - 0.5).abs() < HV_TOLERANCE {
            // horizontal proto
            filler.x = bucket8_for(x - half_length - end_pad, X_SHIFT, NB) as i32;
            filler.y_start = bucket16_for(y - side_pad, Y_SHIFT, NB * 256) as i16;
            filler.y_end = bucket16_for(y + side_pad, Y_SHIFT, NB * 256) as i16;
            filler.switches[0].x = bucket8_for(x + half_length + end_pad, X_SHIFT, NB) as i32;
        } else if (angle - 0.25).abs() < HV_TOLERANCE || (angle - 0.75).abs() < HV_TOLERANCE {
            // vertical proto
            filler.x = bucket8_for(x - side_pad, X_SHIFT, NB) as i32;
            filler.y_start = bucket16_for(y - half_length - end_pad, Y_SHIFT, NB * 256) as i16;
            filler.y_end = bucket16_for(y + half_length + end_pad, Y_SHIFT, NB * 256) as i16;
            filler.switches[0].x = bucket8_for(x + side_pad, X_SHIFT, NB) as i32;
        } else if (angle > 0.0 && angle < 0.25) || (angle > 0.5 && angle < 0.75) {
            // rising diagonal
            let rad = angle * 2.0 * PI;
            let cos = rad.cos().abs();
            let sin = rad.sin().abs();

            // corners of the acceptance region
            let start = (
                x - (half_length + end_pad) * cos - side_pad * sin,
                y - (half_length + end_pad) * sin + side_pad * cos,
            );
            let end = (2.0 * x - start.0, 2.0 * y - start.1);
            let switch1 = (
                x - (half_length + end_pad) * cos + side_pad * sin,
                y - (half_length + end_pad) * sin - side_pad * cos,
            );
            let switch2 = (2.0 * x - switch1.0, 2.0 * y - switch1.1);
            let (s1, s2) = if switch1.0 > switch2.0 { (1, 0) } else { (0, 1) };

            filler.x = bucket8_for(start.0, X_SHIFT, NB) as i32;
            filler.start_delta = -(((cos / sin) * 256.0) as i16);
            filler.end_delta = ((sin / cos) * 256.0) as i16;

            let x_adjust = bucket_end(filler.x, X_SHIFT, NB) - start.0;
            let y_adjust = x_adjust * cos / sin;
            filler.y_start = bucket16_for(start.1 - y_adjust, Y_SHIFT, NB * 256) as i16;
            let y_adjust = x_adjust * sin / cos;
            filler.y_end = bucket16_for(start.1 + y_adjust, Y_SHIFT, NB * 256) as i16;

            let sw1_x = bucket8_for(switch1.0, X_SHIFT, NB) as i32;
            let x_adjust = switch1.0 - bucket_start(sw1_x, X_SHIFT, NB);
            let y_adjust = x_adjust * sin / cos;
            filler.switches[s1] = FillSwitch {
                kind: SwitchType::Start,
                x: sw1_x,
                y: bucket8_for(switch1.1, Y_SHIFT, NB) as i32,
                y_init: bucket16_for(switch1.1 - y_adjust, Y_SHIFT, NB * 256) as i16,
                delta: filler.end_delta,
            };

            let sw2_x = bucket8_for(switch2.0, X_SHIFT, NB) as i32;
            let x_adjust = switch2.0 - bucket_start(sw2_x, X_SHIFT, NB);
            let y_adjust = x_adjust * cos / sin;
            filler.switches[s2] = FillSwitch {
                kind: SwitchType::End,
                x: sw2_x,
                y: bucket8_for(switch2.1, Y_SHIFT, NB) as i32,
                y_init: bucket16_for(switch2.1 + y_adjust, Y_SHIFT, NB * 256) as i16,
                delta: filler.start_delta,
            };

            filler.switches[2].x = bucket8_for(end.0, X_SHIFT, NB) as i32;
        } else {
            // falling diagonal
            let rad = angle * 2.0 * PI;
            let cos = rad.cos().abs();
            let sin = rad.sin().abs();

            let start = (
                x - (half_length + end_pad) * cos - side_pad * sin,
                y + (half_length + end_pad) * sin - side_pad * cos,
            );
            let end = (2.0 * x - start.0, 2.0 * y - start.1);
            let switch1 = (
                x - (half_length + end_pad) * cos + side_pad * sin,
                y + (half_length + end_pad) * sin + side_pad * cos,
            );
            let switch2 = (2.0 * x - switch1.0, 2.0 * y - switch1.1);
            let (s1, s2) = if switch1.0 > switch2.0 { (1, 0) } else { (0, 1) };

            filler.x = bucket8_for(start.0, X_SHIFT, NB) as i32;
            filler.start_delta =
                (-int_cast_rounded((sin / cos) * 256.0)).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
            filler.end_delta =
                int_cast_rounded((cos / sin) * 256.0).clamp(i16::MIN as i32, i16::MAX as i32) as i16;

            let x_adjust = bucket_end(filler.x, X_SHIFT, NB) - start.0;
            let y_adjust = x_adjust * sin / cos;
            filler.y_start = bucket16_for(start.1 - y_adjust, Y_SHIFT, NB * 256) as i16;
            let y_adjust = x_adjust * cos / sin;
            filler.y_end = bucket16_for(start.1 + y_adjust, Y_SHIFT, NB * 256) as i16;

            let sw1_x = bucket8_for(switch1.0, X_SHIFT, NB) as i32;
            let x_adjust = switch1.0 - bucket_start(sw1_x, X_SHIFT, NB);
            let y_adjust = x_adjust * sin / cos;
            filler.switches[s1] = FillSwitch {
                kind: SwitchType::End,
                x: sw1_x,
                y: bucket8_for(switch1.1, Y_SHIFT, NB) as i32,
                y_init: bucket16_for(switch1.1 + y_adjust, Y_SHIFT, NB * 256) as i16,
                delta: filler.start_delta,
            };

            let sw2_x = bucket8_for(switch2.0, X_SHIFT, NB) as i32;
            let x_adjust = switch2.0 - bucket_start(sw2_x, X_SHIFT, NB);
            let y_adjust = x_adjust * cos / sin;
            filler.switches[s2] = FillSwitch {
                kind: SwitchType::Start,
                x: sw2_x,
                y: bucket8_for(switch2.1, Y_SHIFT, NB) as i32,
                y_init: bucket16_for(switch2.1 - y_adjust, Y_SHIFT, NB * 256) as i16,
                delta: filler.end_delta,
            };

            filler.switches[2].x = bucket8_for(end.0, X_SHIFT, NB) as i32;
        }
        filler
    }

    fn done(&self) -> bool {
        let next = &self.switches[self.next_switch];
        self.x > next.x && next.kind == SwitchType::Last
    }
}

impl Iterator for TableFiller {
    type Item = FillSpec;

    fn next(&mut self) -> Option<FillSpec> {
        if self.done() {
            return None;
        }

        // the fill assuming no switches at this column
        let mut fill = FillSpec {
            x: self.x,
            y_start: (self.y_start >> 8) as i32,
            y_end: (self.y_end >> 8) as i32,
            angle_start: self.angle_start,
            angle_end: self.angle_end,
        };

        // apply every switch at this column
        loop {
            let next = self.switches[self.next_switch];
            if self.x < next.x {
                break;
            }
            fill.x = next.x;
            self.x = next.x;
            match next.kind {
                SwitchType::Start => {
                    fill.y_start = next.y;
                    self.start_delta = next.delta;
                    self.y_start = next.y_init;
                }
                SwitchType::End => {
                    fill.y_end = next.y;
                    self.end_delta = next.delta;
                    self.y_end = next.y_init;
                }
                SwitchType::Last => break,
            }
            self.next_switch += 1;
        }

        // step to the next column
        self.x += 1;
        self.y_start = self.y_start.wrapping_add(self.start_delta);
        self.y_end = self.y_end.wrapping_add(self.end_delta);

        Some(fill)
    }
}

/// Fill all three proto-pruner params of a set for one proto.
///
/// `index` is the proto's position within its set.
pub(crate) fn fill_proto_pruner(
    pruner: &mut [[[u32; WERDS_PER_PP_VECTOR]; NUM_PP_BUCKETS]; NUM_PP_PARAMS],
    index: usize,
    proto: &Proto,
) {
    fill_pp_circular_bits(
        &mut pruner[PRUNER_ANGLE],
        index,
        proto.angle + ANGLE_SHIFT,
        PP_ANGLE_PAD / 360.0,
    );

    let rad = proto.angle * 2.0 * PI;
    let length = proto.length;

    let x = proto.x + X_SHIFT;
    let pad = (rad.cos().abs() * (length / 2.0 + PP_END_PAD * PICO_FEATURE_LENGTH))
        .max(rad.sin().abs() * (PP_SIDE_PAD * PICO_FEATURE_LENGTH));
    fill_pp_linear_bits(&mut pruner[PRUNER_X], index, x, pad);

    let y = proto.y + Y_SHIFT;
    let pad = (rad.sin().abs() * (length / 2.0 + PP_END_PAD * PICO_FEATURE_LENGTH))
        .max(rad.cos().abs() * (PP_SIDE_PAD * PICO_FEATURE_LENGTH));
    fill_pp_linear_bits(&mut pruner[PRUNER_Y], index, y, pad);
}

/// Set `bit` in every bucket within `center +- spread` of a circular
/// param whose range is 0 to 1.
fn fill_pp_circular_bits(
    table: &mut [[u32; WERDS_PER_PP_VECTOR]; NUM_PP_BUCKETS],
    bit: usize,
    center: f32,
    spread: f32,
) {
    let spread = spread.min(0.5);

    let mut first = ((center - spread) * NUM_PP_BUCKETS as f32).floor() as i32;
    if first < 0 {
        first += NUM_PP_BUCKETS as i32;
    }
    let mut last = ((center + spread) * NUM_PP_BUCKETS as f32).floor() as i32;
    if last >= NUM_PP_BUCKETS as i32 {
        last -= NUM_PP_BUCKETS as i32;
    }

    let mut i = first as usize;
    loop {
        table[i][bit / 32] |= 1 << (bit % 32);
        if i as i32 == last {
            break;
        }
        i = if i < NUM_PP_BUCKETS - 1 { i + 1 } else { 0 };
    }
}

/// Set `bit` in every bucket within `center +- spread` of a linear
/// param, clipping to the table.
fn fill_pp_linear_bits(
    table: &mut [[u32; WERDS_PER_PP_VECTOR]; NUM_PP_BUCKETS],
    bit: usize,
    center: f32,
    spread: f32,
) {
    let mut first = ((center - spread) * NUM_PP_BUCKETS as f32).floor() as i32;
    if first < 0 {
        first = 0;
    }
    let mut last = ((center + spread) * NUM_PP_BUCKETS as f32).floor() as i32;
    if last >= NUM_PP_BUCKETS as i32 {
        last = NUM_PP_BUCKETS as i32 - 1;
    }

    let mut i = first;
    while i <= last {
        table[i as usize][bit / 32] |= 1 << (bit % 32);
        i += 1;
    }
}
