//! Instantaneous time-scaling functions.
//!
//! A [`ScalingFunction`] gives the playback rate multiplier at normalized
//! time `t ∈ [0, 1]`. Its definite integral from 0 is the cumulative warp
//! that [`TimeWarpMap`](crate::TimeWarpMap) turns into presentation times.
//!
//! The constant shape and the piecewise shapes (triangle, double
//! smoothstep) integrate in closed form, one segment at a time. The smooth shapes tabulate their
//! integral over `[0, 1]` once with [`Quadrature::tabulate`] and answer each
//! query from that table.
//!
//! # Example
//!
//! ```
//! use timewarp::{ScalingFunction, ScalingKind};
//!
//! let function = ScalingKind::DoubleSmoothstep.with(2.0, 0.5);
//! assert_eq!(function.evaluate(0.0), 1.0);
//! assert_eq!(function.evaluate(0.5), 2.0);
//!
//! let integral = function.integrate(1.0)?;
//! assert!(integral > 1.0);
//! # Ok::<(), timewarp::TimeWarpError>(())
//! ```

use std::f64::consts::PI;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::TimeWarpError;
use crate::quadrature::{PanelTable, Quadrature};
use crate::unit::{line, mapunit, smoothstep, smoothstep_integral, smoothstep_on};

/// Default rate multiplier.
pub const DEFAULT_FACTOR: f64 = 1.5;
/// Default shape parameter.
pub const DEFAULT_MODIFIER: f64 = 0.5;
/// Accepted `factor` values.
pub const FACTOR_RANGE: RangeInclusive<f64> = 0.1..=4.0;
/// Accepted `modifier` values.
pub const MODIFIER_RANGE: RangeInclusive<f64> = 0.1..=1.0;

/// Largest fraction of the centre distance a ramp may span.
///
/// Keeps the outer plateaus of the piecewise shapes from collapsing.
pub const MAX_WIDTH_FRACTION: f64 = 0.99;

const DOUBLE_SMOOTHSTEP_CENTER: f64 = 0.25;
const TRIANGLE_CENTER: f64 = 0.5;

/// The available scaling shapes, without parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScalingKind {
    /// Constant rate `factor`.
    Constant,
    /// Linear ramp up to `factor` and back, centred on the middle of the clip.
    Triangle,
    /// Smooth ramp to `factor`, a plateau, and a smooth ramp back.
    #[default]
    DoubleSmoothstep,
    /// Cosine oscillation.
    Cosine,
    /// Cosine oscillation faded in with a smoothstep.
    TaperedCosine,
    /// Power curve `t^factor`.
    Power,
}

impl ScalingKind {
    /// Every kind, in display order.
    pub const ALL: [ScalingKind; 6] = [
        ScalingKind::Constant,
        ScalingKind::Triangle,
        ScalingKind::DoubleSmoothstep,
        ScalingKind::Cosine,
        ScalingKind::TaperedCosine,
        ScalingKind::Power,
    ];

    /// Attach parameters to this kind.
    pub fn with(self, factor: f64, modifier: f64) -> ScalingFunction {
        let shape = Shape { factor, modifier };
        match self {
            ScalingKind::Constant => ScalingFunction::Constant(shape),
            ScalingKind::Triangle => ScalingFunction::Triangle(shape),
            ScalingKind::DoubleSmoothstep => ScalingFunction::DoubleSmoothstep(shape),
            ScalingKind::Cosine => ScalingFunction::Cosine(shape),
            ScalingKind::TaperedCosine => ScalingFunction::TaperedCosine(shape),
            ScalingKind::Power => ScalingFunction::Power(shape),
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            ScalingKind::Constant => "Constant",
            ScalingKind::Triangle => "Triangle",
            ScalingKind::DoubleSmoothstep => "Double Smooth Step",
            ScalingKind::Cosine => "Cosine",
            ScalingKind::TaperedCosine => "Tapered Cosine",
            ScalingKind::Power => "Power",
        }
    }

    fn is_piecewise(self) -> bool {
        matches!(
            self,
            ScalingKind::Constant | ScalingKind::Triangle | ScalingKind::DoubleSmoothstep
        )
    }
}

impl Display for ScalingKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for ScalingKind {
    type Err = TimeWarpError;

    /// Accepts the display name or any spelling of it that differs only in
    /// case, spaces, dashes, or underscores.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted: String = value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        ScalingKind::ALL
            .into_iter()
            .find(|kind| {
                kind.name()
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .map(|c| c.to_ascii_lowercase())
                    .eq(wanted.chars())
            })
            .ok_or_else(|| TimeWarpError::InvalidParameter(format!("unknown scaling kind '{value}'")))
    }
}

/// Parameters shared by every scaling kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shape {
    /// Target rate multiplier.
    pub factor: f64,
    /// Shape parameter; its meaning depends on the kind.
    pub modifier: f64,
}

impl Default for Shape {
    fn default() -> Self {
        Self {
            factor: DEFAULT_FACTOR,
            modifier: DEFAULT_MODIFIER,
        }
    }
}

/// An instantaneous rate multiplier over normalized time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalingFunction {
    /// `factor` everywhere.
    Constant(Shape),
    /// Plateau at 1, linear ramp to `factor` at `t = 1/2`, and back.
    Triangle(Shape),
    /// Plateau at 1, smoothstep to `factor`, plateau, smoothstep back to 1.
    DoubleSmoothstep(Shape),
    /// `factor·(cos(12·modifier·π·t) + 1) + factor/2`.
    Cosine(Shape),
    /// Cosine blended in from 1 by a smoothstep over the clip.
    TaperedCosine(Shape),
    /// `2·modifier·t^factor + modifier/2`.
    Power(Shape),
}

impl Default for ScalingFunction {
    fn default() -> Self {
        ScalingFunction::DoubleSmoothstep(Shape::default())
    }
}

impl ScalingFunction {
    /// Shorthand for [`ScalingKind::with`].
    pub fn new(kind: ScalingKind, factor: f64, modifier: f64) -> Self {
        kind.with(factor, modifier)
    }

    /// The kind of this function.
    pub fn kind(&self) -> ScalingKind {
        match self {
            ScalingFunction::Constant(_) => ScalingKind::Constant,
            ScalingFunction::Triangle(_) => ScalingKind::Triangle,
            ScalingFunction::DoubleSmoothstep(_) => ScalingKind::DoubleSmoothstep,
            ScalingFunction::Cosine(_) => ScalingKind::Cosine,
            ScalingFunction::TaperedCosine(_) => ScalingKind::TaperedCosine,
            ScalingFunction::Power(_) => ScalingKind::Power,
        }
    }

    /// The parameters of this function.
    pub fn shape(&self) -> Shape {
        match *self {
            ScalingFunction::Constant(shape)
            | ScalingFunction::Triangle(shape)
            | ScalingFunction::DoubleSmoothstep(shape)
            | ScalingFunction::Cosine(shape)
            | ScalingFunction::TaperedCosine(shape)
            | ScalingFunction::Power(shape) => shape,
        }
    }

    /// Target rate multiplier.
    pub fn factor(&self) -> f64 {
        self.shape().factor
    }

    /// Shape parameter.
    pub fn modifier(&self) -> f64 {
        self.shape().modifier
    }

    /// Check that `factor` and `modifier` are within their accepted ranges.
    pub fn validate(&self) -> Result<(), TimeWarpError> {
        let Shape { factor, modifier } = self.shape();
        if !factor.is_finite() || !FACTOR_RANGE.contains(&factor) {
            return Err(TimeWarpError::InvalidParameter(format!(
                "factor {factor} is outside {}..={}",
                FACTOR_RANGE.start(),
                FACTOR_RANGE.end()
            )));
        }
        if !modifier.is_finite() || !MODIFIER_RANGE.contains(&modifier) {
            return Err(TimeWarpError::InvalidParameter(format!(
                "modifier {modifier} is outside {}..={}",
                MODIFIER_RANGE.start(),
                MODIFIER_RANGE.end()
            )));
        }
        Ok(())
    }

    /// Rate multiplier at normalized time `t`.
    ///
    /// Degenerate parameters of the piecewise shapes give 0. Outside
    /// `[0, 1]` the piecewise shapes hold their outer plateau.
    pub fn evaluate(&self, t: f64) -> f64 {
        let Shape { factor, modifier } = self.shape();
        match self {
            ScalingFunction::Constant(_) => factor,
            ScalingFunction::Triangle(_) | ScalingFunction::DoubleSmoothstep(_) => {
                self.piecewise().map_or(0.0, |pieces| pieces.evaluate(t))
            }
            ScalingFunction::Cosine(_) => cosine(factor, modifier, t),
            ScalingFunction::TaperedCosine(_) => {
                1.0 + (cosine(factor, modifier, t) - 1.0) * smoothstep_on(&(0.0..=1.0), t)
            }
            ScalingFunction::Power(_) => 2.0 * modifier * t.max(0.0).powf(factor) + modifier / 2.0,
        }
    }

    /// Definite integral of [`evaluate`](Self::evaluate) from 0 to `t`.
    ///
    /// Builds a fresh [`ScalingIntegrator`]; hold on to
    /// [`integrator`](Self::integrator) when integrating repeatedly.
    pub fn integrate(&self, t: f64) -> Result<f64, TimeWarpError> {
        self.integrator().integrate(t)
    }

    /// Integrator with the default quadrature tolerances.
    pub fn integrator(&self) -> ScalingIntegrator {
        self.integrator_with(Quadrature::default())
    }

    /// Integrator that uses `quadrature` for the smooth shapes.
    ///
    /// A smooth shape whose integrand is not finite on `[0, 1]` gives an
    /// integrator that fails every query past 0.
    pub fn integrator_with(&self, quadrature: Quadrature) -> ScalingIntegrator {
        let method = if self.kind().is_piecewise() {
            Method::ClosedForm(self.piecewise())
        } else {
            let function = *self;
            let table = quadrature
                .tabulate(|x| function.evaluate(x), 0.0, 1.0)
                .inspect_err(|error| log::warn!("Cannot tabulate {}: {error}", self.kind()))
                .ok();
            Method::Numeric { quadrature, table }
        };
        ScalingIntegrator {
            function: *self,
            method,
        }
    }

    fn piecewise(&self) -> Option<Piecewise> {
        let Shape { factor, modifier } = self.shape();
        match self {
            ScalingFunction::Constant(_) => Piecewise::constant(factor),
            ScalingFunction::Triangle(_) => {
                Piecewise::triangle(1.0, factor, ramp_range(TRIANGLE_CENTER, modifier))
            }
            ScalingFunction::DoubleSmoothstep(_) => Piecewise::double_smoothstep(
                1.0,
                factor,
                ramp_range(DOUBLE_SMOOTHSTEP_CENTER, modifier),
            ),
            _ => None,
        }
    }
}

/// Integrates one [`ScalingFunction`] from 0.
///
/// Piecewise shapes keep their segment table and smooth shapes a fixed
/// panel table, so each query sums whole pieces and integrates only the
/// partial one. Either way the integral never decreases on `[0, 1]`.
#[derive(Debug, Clone)]
pub struct ScalingIntegrator {
    function: ScalingFunction,
    method: Method,
}

#[derive(Debug, Clone)]
enum Method {
    /// `None` for degenerate parameters.
    ClosedForm(Option<Piecewise>),
    /// `table` is `None` when the integrand is not finite.
    Numeric {
        quadrature: Quadrature,
        table: Option<PanelTable>,
    },
}

impl ScalingIntegrator {
    /// The function being integrated.
    pub fn function(&self) -> ScalingFunction {
        self.function
    }

    /// Integral of the function from 0 to `t`.
    pub fn integrate(&self, t: f64) -> Result<f64, TimeWarpError> {
        match &self.method {
            Method::ClosedForm(Some(pieces)) => Ok(pieces.integrate(t)),
            Method::ClosedForm(None) => Ok(0.0),
            Method::Numeric { quadrature, table } => {
                let function = self.function;
                let rate = |x: f64| function.evaluate(x);
                let Some(table) = table else {
                    return if t == 0.0 {
                        Ok(0.0)
                    } else {
                        Err(TimeWarpError::IntegrationFailed {
                            upper_bound: t,
                            estimated_error: f64::INFINITY,
                        })
                    };
                };
                if t < 0.0 {
                    quadrature.integrate(rate, 0.0, t)
                } else if t > 1.0 {
                    Ok(table.total() + quadrature.integrate(rate, 1.0, t)?)
                } else {
                    Ok(table.integrate(rate, t))
                }
            }
        }
    }
}

fn cosine(factor: f64, modifier: f64, t: f64) -> f64 {
    factor * ((12.0 * modifier * PI * t).cos() + 1.0) + factor / 2.0
}

/// Active range `[c - w, c + w]` with `w = c·min(modifier, 0.99)`.
fn ramp_range(center: f64, modifier: f64) -> RangeInclusive<f64> {
    let width = center * modifier.min(MAX_WIDTH_FRACTION);
    (center - width)..=(center + width)
}

// ── Piecewise shapes ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum Segment {
    Plateau(f64),
    /// Straight line from the first value to the second.
    Line(f64, f64),
    /// Smoothstep from the first value to the second.
    Rise(f64, f64),
    /// Reflected smoothstep: starts at the second value, ends at the first.
    Fall(f64, f64),
}

impl Segment {
    fn value(self, u: f64) -> f64 {
        match self {
            Segment::Plateau(value) => value,
            Segment::Line(from, to) => line(0.0, from, 1.0, to, u),
            Segment::Rise(from, to) => mapunit(from, to, smoothstep(u)),
            Segment::Fall(from, to) => mapunit(from, to, smoothstep(1.0 - u)),
        }
    }

    /// Integral over `[0, u]` of a unit-width segment.
    fn unit_integral(self, u: f64) -> f64 {
        match self {
            Segment::Plateau(value) => value * u,
            Segment::Line(from, to) => u * (from + 0.5 * (to - from) * u),
            Segment::Rise(from, to) => from * u + (to - from) * smoothstep_integral(u),
            Segment::Fall(from, to) => {
                from * u + (to - from) * (0.5 - smoothstep_integral(1.0 - u))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Piece {
    start: f64,
    end: f64,
    segment: Segment,
}

impl Piece {
    fn width(&self) -> f64 {
        self.end - self.start
    }

    fn local(&self, t: f64) -> f64 {
        (t - self.start) / self.width()
    }

    fn integral_to(&self, t: f64) -> f64 {
        self.width() * self.segment.unit_integral(self.local(t))
    }
}

/// Ordered, contiguous segments covering `[0, 1]`, with the integral up to
/// the start of each segment.
#[derive(Debug, Clone, PartialEq)]
struct Piecewise {
    pieces: Vec<Piece>,
    prefix: Vec<f64>,
    total: f64,
}

impl Piecewise {
    fn from_segments(bounds: &[f64], segments: &[Segment]) -> Self {
        let pieces: Vec<Piece> = bounds
            .windows(2)
            .zip(segments)
            .filter(|(window, _)| window[1] > window[0])
            .map(|(window, segment)| Piece {
                start: window[0],
                end: window[1],
                segment: *segment,
            })
            .collect();

        let mut prefix = Vec::with_capacity(pieces.len());
        let mut total = 0.0;
        for piece in &pieces {
            prefix.push(total);
            total += piece.integral_to(piece.end);
        }

        Self {
            pieces,
            prefix,
            total,
        }
    }

    fn constant(value: f64) -> Option<Self> {
        (value > 0.0 && value.is_finite())
            .then(|| Self::from_segments(&[0.0, 1.0], &[Segment::Plateau(value)]))
    }

    fn triangle(from: f64, to: f64, range: RangeInclusive<f64>) -> Option<Self> {
        let (lower, upper) = (*range.start(), *range.end());
        if !(from > 0.0 && to > 0.0 && lower >= 0.0 && upper <= 1.0 && lower < upper) {
            return None;
        }
        let peak = (lower + upper) / 2.0;
        Some(Self::from_segments(
            &[0.0, lower, peak, upper, 1.0],
            &[
                Segment::Plateau(from),
                Segment::Line(from, to),
                Segment::Line(to, from),
                Segment::Plateau(from),
            ],
        ))
    }

    fn double_smoothstep(from: f64, to: f64, range: RangeInclusive<f64>) -> Option<Self> {
        let (lower, upper) = (*range.start(), *range.end());
        if !(from > 0.0 && to > 0.0 && lower >= 0.0 && upper <= 0.5 && lower < upper) {
            return None;
        }
        Some(Self::from_segments(
            &[0.0, lower, upper, 1.0 - upper, 1.0 - lower, 1.0],
            &[
                Segment::Plateau(from),
                Segment::Rise(from, to),
                Segment::Plateau(to),
                Segment::Fall(from, to),
                Segment::Plateau(from),
            ],
        ))
    }

    /// Index of the first piece whose end is at or after `t`, clamped.
    fn locate(&self, t: f64) -> usize {
        self.pieces
            .partition_point(|piece| piece.end < t)
            .min(self.pieces.len() - 1)
    }

    fn evaluate(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return self.pieces[0].segment.value(0.0);
        }
        if t >= 1.0 {
            return self.pieces[self.pieces.len() - 1].segment.value(1.0);
        }
        let piece = &self.pieces[self.locate(t)];
        piece.segment.value(piece.local(t))
    }

    fn integrate(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return self.evaluate(0.0) * t;
        }
        if t >= 1.0 {
            return self.total + self.evaluate(1.0) * (t - 1.0);
        }
        let index = self.locate(t);
        self.prefix[index] + self.pieces[index].integral_to(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_smoothstep_segment_boundaries_are_continuous() {
        let function = ScalingKind::DoubleSmoothstep.with(3.0, 0.5);
        let range = ramp_range(DOUBLE_SMOOTHSTEP_CENTER, 0.5);
        for boundary in [*range.start(), *range.end(), 1.0 - range.end(), 1.0 - range.start()] {
            let left = function.evaluate(boundary - 1e-12);
            let right = function.evaluate(boundary + 1e-12);
            assert!((left - right).abs() < 1e-9, "jump at {boundary}");
        }
    }

    #[test]
    fn full_width_modifier_is_clamped() {
        let range = ramp_range(DOUBLE_SMOOTHSTEP_CENTER, 1.0);
        assert!(*range.start() > 0.0);
        assert!(*range.end() < 0.5);
    }

    #[test]
    fn degenerate_range_is_zero() {
        assert!(Piecewise::double_smoothstep(1.0, 2.0, 0.3..=0.3).is_none());
        assert!(Piecewise::triangle(1.0, 2.0, -0.1..=0.4).is_none());

        let function = ScalingKind::Triangle.with(2.0, 0.0);
        assert_eq!(function.evaluate(0.5), 0.0);
        assert_eq!(function.integrate(1.0).unwrap(), 0.0);
    }

    #[test]
    fn triangle_integral_matches_area() {
        // Plateau of 1 plus a triangle of height 1 over a base of 0.5.
        let function = ScalingKind::Triangle.with(2.0, 0.5);
        let integral = function.integrate(1.0).unwrap();
        assert!((integral - 1.25).abs() < 1e-12);
    }
}
