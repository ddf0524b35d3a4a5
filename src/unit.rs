//! Unit-interval helpers the scaling shapes are built from.
//!
//! Every shape in [`scaling`](crate::scaling) is assembled from a handful of
//! remappings between an arbitrary interval and `[0, 1]`, a cubic smoothstep,
//! and straight lines through two points.

use std::ops::RangeInclusive;

/// Map `x` from `[x0, x1]` onto `[0, 1]`.
pub fn unitmap(x0: f64, x1: f64, x: f64) -> f64 {
    (x - x0) / (x1 - x0)
}

/// Map `x` from `[0, 1]` onto `[x0, x1]`.
pub fn mapunit(x0: f64, x1: f64, x: f64) -> f64 {
    (x1 - x0) * x + x0
}

/// Reflect `x` within `[0, 1]`.
pub fn unitflip(x: f64) -> f64 {
    1.0 - x
}

/// Value at `x` of the line through `(x1, y1)` and `(x2, y2)`.
pub fn line(x1: f64, y1: f64, x2: f64, y2: f64, x: f64) -> f64 {
    y1 + (x - x1) * (y2 - y1) / (x2 - x1)
}

/// Cubic smoothstep `-2x³ + 3x²`, rising from 0 to 1 on `[0, 1]`.
pub fn smoothstep(x: f64) -> f64 {
    -2.0 * x.powi(3) + 3.0 * x.powi(2)
}

/// Smoothstep rising across `range`.
pub fn smoothstep_on(range: &RangeInclusive<f64>, x: f64) -> f64 {
    smoothstep(unitmap(*range.start(), *range.end(), x))
}

/// Smoothstep falling across `range`.
pub fn smoothstep_flip_on(range: &RangeInclusive<f64>, x: f64) -> f64 {
    smoothstep(unitflip(unitmap(*range.start(), *range.end(), x)))
}

/// Antiderivative of [`smoothstep`] with value 0 at 0: `u³ - u⁴/2`.
pub(crate) fn smoothstep_integral(u: f64) -> f64 {
    u.powi(3) - u.powi(4) / 2.0
}

/// Evaluate `function` at `count` evenly spaced points across `range`.
///
/// Both endpoints are included. Used for plotting a rate curve or its
/// integral.
///
/// # Example
///
/// ```
/// let points = timewarp::sample_on(|t| 2.0 * t, 0.0..=1.0, 3);
/// assert_eq!(points, vec![(0.0, 0.0), (0.5, 1.0), (1.0, 2.0)]);
/// ```
pub fn sample_on<F>(function: F, range: RangeInclusive<f64>, count: usize) -> Vec<(f64, f64)>
where
    F: Fn(f64) -> f64,
{
    let (start, end) = (*range.start(), *range.end());
    match count {
        0 => Vec::new(),
        1 => vec![(start, function(start))],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count)
                .map(|index| {
                    let x = if index == count - 1 {
                        end
                    } else {
                        start + step * index as f64
                    };
                    (x, function(x))
                })
                .collect()
        }
    }
}
