//! Output-time to source-time lookup table.
//!
//! The video pass records one breakpoint per emitted frame (timestamp
//! rewrite) or per fetched source frame (fixed rate). Afterwards the table
//! answers "which source instant is showing at output time `t`" by linear
//! interpolation between the bracketing breakpoints, which is what a
//! scrubber or preview needs.

use serde_json::{Value, json};

/// One `(output, source)` breakpoint, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LutPoint {
    /// Presentation time in the retimed output.
    pub output: f64,
    /// Presentation time in the source.
    pub source: f64,
}

/// Breakpoints ordered by output time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalingLut {
    points: Vec<LutPoint>,
}

impl ScalingLut {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a breakpoint.
    pub fn push(&mut self, output: f64, source: f64) {
        self.points.push(LutPoint { output, source });
    }

    /// All breakpoints in insertion order.
    pub fn points(&self) -> &[LutPoint] {
        &self.points
    }

    /// Number of breakpoints.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether no breakpoint was recorded.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Source time shown at `output` seconds into the retimed clip.
    ///
    /// Exact at breakpoints, linear in between, clamped to the first and
    /// last breakpoint outside the table. `None` for an empty table.
    pub fn source_time_at(&self, output: f64) -> Option<f64> {
        interpolate(&self.points, output, |point| point.output, |point| point.source)
    }

    /// Output time at which `source` seconds of the original are shown.
    pub fn output_time_at(&self, source: f64) -> Option<f64> {
        interpolate(&self.points, source, |point| point.source, |point| point.output)
    }

    /// The table as `[[output, source], ...]`.
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.points
                .iter()
                .map(|point| json!([point.output, point.source]))
                .collect(),
        )
    }
}

fn interpolate(
    points: &[LutPoint],
    key: f64,
    key_of: impl Fn(&LutPoint) -> f64,
    value_of: impl Fn(&LutPoint) -> f64,
) -> Option<f64> {
    let first = points.first()?;
    let last = points.last()?;
    if key <= key_of(first) {
        return Some(value_of(first));
    }
    if key >= key_of(last) {
        return Some(value_of(last));
    }

    let upper = points.partition_point(|point| key_of(point) < key);
    let right = &points[upper];
    if key_of(right) == key {
        return Some(value_of(right));
    }

    let left = &points[upper - 1];
    let span = key_of(right) - key_of(left);
    if span <= 0.0 {
        return Some(value_of(left));
    }
    let fraction = (key - key_of(left)) / span;
    Some(value_of(left) + fraction * (value_of(right) - value_of(left)))
}
