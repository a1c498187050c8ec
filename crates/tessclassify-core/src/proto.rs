//! Floating-point prototypes
//!
//! A prototype is a directed line segment in normalized feature space.
//! The matcher never sees this form directly; [`crate::inttemp`] converts
//! it to fixed point when it is installed in a template. The (a, b, c)
//! coefficients describe the segment's infinite line as
//! `a*x + b*y + c = 0` with `(a, b)` unit length, so evaluating the left
//! side at a feature position yields its perpendicular distance.
//!
//! # See also
//!
//! C Tesseract: `PROTO_STRUCT`, `FillABC()` in `protos.cpp`

use std::f32::consts::PI;

/// Length quantum for prototypes, in normalized units.
///
/// Prototype lengths are stored as a count of segments of this size.
pub const PICO_FEATURE_LENGTH: f32 = 0.05;

/// One floating-point prototype segment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Proto {
    /// Center x position.
    pub x: f32,
    /// Center y position.
    pub y: f32,
    /// Segment length in normalized units.
    pub length: f32,
    /// Direction in revolutions, counterclockwise from the x axis.
    pub angle: f32,
    /// Line coefficient for x.
    pub a: f32,
    /// Line coefficient for y.
    pub b: f32,
    /// Line constant term.
    pub c: f32,
}

impl Proto {
    /// Build a proto from its geometric params and fill in (a, b, c).
    pub fn from_position(x: f32, y: f32, length: f32, angle: f32) -> Self {
        let mut proto = Self {
            x,
            y,
            length,
            angle,
            ..Self::default()
        };
        proto.fill_abc();
        proto
    }

    /// Recompute the normalized line coefficients from x, y and angle.
    pub fn fill_abc(&mut self) {
        let slope = (self.angle * 2.0 * PI).tan();
        let intercept = self.y - slope * self.x;
        let normalizer = 1.0 / (slope * slope + 1.0).sqrt();
        self.a = slope * normalizer;
        self.b = -normalizer;
        self.c = intercept * normalizer;
    }

    /// Perpendicular distance from a point to this proto's line.
    pub fn point_distance(&self, x: f32, y: f32) -> f32 {
        (self.a * x + self.b * y + self.c).abs()
    }
}
