//! Non-adaptive Gauss–Kronrod quadrature.
//!
//! [`Quadrature`] integrates with the 15-point Kronrod rule and uses the
//! embedded 7-point Gauss rule as its error estimate. When the estimate
//! misses the tolerance, every panel is split in two and the whole interval
//! is integrated again; there is no per-panel adaptivity.
//!
//! [`Quadrature::tabulate`] keeps the accepted panels as a [`PanelTable`]
//! of running sums. Queries against the table add one fixed-rule partial
//! panel to a stored prefix, so for a non-negative integrand the running
//! integral never decreases as the upper bound grows.

use crate::error::TimeWarpError;

/// Default absolute tolerance.
pub const DEFAULT_ABSOLUTE_TOLERANCE: f64 = 1e-8;
/// Default relative tolerance.
pub const DEFAULT_RELATIVE_TOLERANCE: f64 = 1e-2;
/// Default number of panel doublings before giving up (4096 panels).
pub const DEFAULT_MAX_REFINEMENTS: u32 = 12;
/// Fewest panel doublings a [`PanelTable`] starts from (256 panels).
pub const MIN_TABLE_REFINEMENTS: u32 = 8;

// Non-negative Kronrod abscissae on [-1, 1]; odd indices are the Gauss nodes.
const KRONROD_NODES: [f64; 8] = [
    0.991_455_371_120_812_639_206_854_697_526_329,
    0.949_107_912_342_758_524_526_189_684_047_851,
    0.864_864_423_359_769_072_789_712_788_640_926,
    0.741_531_185_599_394_439_863_864_773_280_788,
    0.586_087_235_467_691_130_294_144_845_693_013,
    0.405_845_151_377_397_166_906_606_412_076_961,
    0.207_784_955_007_898_467_600_689_403_773_245,
    0.0,
];

const KRONROD_WEIGHTS: [f64; 8] = [
    0.022_935_322_010_529_224_963_732_008_058_970,
    0.063_092_092_629_978_553_290_700_663_189_204,
    0.104_790_010_322_250_183_839_876_322_541_518,
    0.140_653_259_715_525_918_745_189_590_510_238,
    0.169_004_726_639_267_902_826_583_426_598_550,
    0.190_350_578_064_785_409_913_256_402_421_014,
    0.204_432_940_075_298_892_414_161_999_234_649,
    0.209_482_141_084_727_828_012_999_174_891_714,
];

// Gauss weights for KRONROD_NODES[1], [3], [5], [7].
const GAUSS_WEIGHTS: [f64; 4] = [
    0.129_484_966_168_869_693_270_611_432_679_082,
    0.279_705_391_489_276_667_901_467_771_423_780,
    0.381_830_050_505_118_944_950_369_775_488_975,
    0.417_959_183_673_469_387_755_102_040_816_327,
];

/// A fixed-tolerance G7/K15 integrator.
///
/// # Example
///
/// ```
/// use timewarp::Quadrature;
///
/// let area = Quadrature::default().integrate(|t| 3.0 * t * t, 0.0, 1.0)?;
/// assert!((area - 1.0).abs() < 1e-12);
/// # Ok::<(), timewarp::TimeWarpError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadrature {
    absolute_tolerance: f64,
    relative_tolerance: f64,
    max_refinements: u32,
}

impl Default for Quadrature {
    fn default() -> Self {
        Self::new(DEFAULT_ABSOLUTE_TOLERANCE, DEFAULT_RELATIVE_TOLERANCE)
    }
}

impl Quadrature {
    /// Create an integrator with the given tolerances.
    ///
    /// A result is accepted once the error estimate is within
    /// `max(absolute, relative * |result|)`.
    pub fn new(absolute_tolerance: f64, relative_tolerance: f64) -> Self {
        Self {
            absolute_tolerance: absolute_tolerance.max(0.0),
            relative_tolerance: relative_tolerance.max(0.0),
            max_refinements: DEFAULT_MAX_REFINEMENTS,
        }
    }

    /// Set how many times the panel count may double before failing.
    #[must_use]
    pub fn with_max_refinements(mut self, refinements: u32) -> Self {
        self.max_refinements = refinements.min(24);
        self
    }

    /// Integrate `function` over `[lower, upper]`.
    ///
    /// Reversed bounds give the negated integral. Fails with
    /// [`TimeWarpError::IntegrationFailed`] when the tolerance is not met
    /// within the refinement limit or the integrand is not finite.
    pub fn integrate<F>(&self, function: F, lower: f64, upper: f64) -> Result<f64, TimeWarpError>
    where
        F: Fn(f64) -> f64,
    {
        if !lower.is_finite() || !upper.is_finite() {
            return Err(TimeWarpError::IntegrationFailed {
                upper_bound: upper,
                estimated_error: f64::INFINITY,
            });
        }
        if lower == upper {
            return Ok(0.0);
        }
        if upper < lower {
            return self.integrate(function, upper, lower).map(|value| -value);
        }

        self.refine(&function, lower, upper, 0, |_, _, total| total)
    }

    /// Integrate `function` over `[lower, upper]` on a fixed panel grid and
    /// keep the running sum at every panel boundary.
    ///
    /// The grid starts at `2^MIN_TABLE_REFINEMENTS` panels and doubles like
    /// [`integrate`](Self::integrate) until the tolerance is met.
    pub fn tabulate<F>(&self, function: F, lower: f64, upper: f64) -> Result<PanelTable, TimeWarpError>
    where
        F: Fn(f64) -> f64,
    {
        if !lower.is_finite() || !upper.is_finite() || upper <= lower {
            return Err(TimeWarpError::IntegrationFailed {
                upper_bound: upper,
                estimated_error: f64::INFINITY,
            });
        }

        self.refine(&function, lower, upper, MIN_TABLE_REFINEMENTS, |width, values, _| {
            let mut prefix = Vec::with_capacity(values.len() + 1);
            let mut running = 0.0;
            prefix.push(running);
            for value in values {
                running += value;
                prefix.push(running);
            }
            PanelTable {
                lower,
                upper,
                width,
                prefix,
            }
        })
    }

    /// Double the panel count from `first_level` until the error estimate
    /// is within tolerance, then hand the accepted panels to `accept`.
    fn refine<F, T>(
        &self,
        function: &F,
        lower: f64,
        upper: f64,
        first_level: u32,
        accept: impl Fn(f64, Vec<f64>, f64) -> T,
    ) -> Result<T, TimeWarpError>
    where
        F: Fn(f64) -> f64,
    {
        let last_level = self.max_refinements.max(first_level);
        let mut estimated_error = f64::INFINITY;
        for level in first_level..=last_level {
            let panels = 1_u64 << level;
            let width = (upper - lower) / panels as f64;

            let mut values = Vec::with_capacity(panels as usize);
            let mut total = 0.0;
            let mut error = 0.0;
            for panel in 0..panels {
                let start = lower + width * panel as f64;
                let (kronrod, gauss) = kronrod_panel(function, start, start + width);
                values.push(kronrod);
                total += kronrod;
                error += (kronrod - gauss).abs();
            }

            if !total.is_finite() || !error.is_finite() {
                break;
            }
            estimated_error = error;

            let tolerance = self
                .absolute_tolerance
                .max(self.relative_tolerance * total.abs());
            if error <= tolerance {
                return Ok(accept(width, values, total));
            }
        }

        Err(TimeWarpError::IntegrationFailed {
            upper_bound: upper,
            estimated_error,
        })
    }
}

/// Running integral over a fixed panel grid, built by
/// [`Quadrature::tabulate`].
#[derive(Debug, Clone, PartialEq)]
pub struct PanelTable {
    lower: f64,
    upper: f64,
    width: f64,
    /// Integral from `lower` to the start of each panel, plus the total.
    prefix: Vec<f64>,
}

impl PanelTable {
    /// Lower bound of the table.
    pub fn lower(&self) -> f64 {
        self.lower
    }

    /// Upper bound of the table.
    pub fn upper(&self) -> f64 {
        self.upper
    }

    /// Number of panels.
    pub fn panels(&self) -> usize {
        self.prefix.len() - 1
    }

    /// Integral over the whole table.
    pub fn total(&self) -> f64 {
        self.prefix[self.prefix.len() - 1]
    }

    /// Integral of `function` from `lower` to `t`, with `t` clamped to the
    /// table.
    ///
    /// `function` must be the integrand the table was built from. The
    /// partial panel is bounded by its neighbouring prefix sums, so for a
    /// non-negative integrand the result is non-decreasing in `t`.
    pub fn integrate<F>(&self, function: F, t: f64) -> f64
    where
        F: Fn(f64) -> f64,
    {
        if t <= self.lower {
            return 0.0;
        }
        if t >= self.upper {
            return self.total();
        }

        let index = (((t - self.lower) / self.width) as usize).min(self.panels() - 1);
        let start = self.lower + self.width * index as f64;
        let (before, after) = (self.prefix[index], self.prefix[index + 1]);
        let value = before + kronrod_panel(&function, start, t.max(start)).0;
        if after >= before {
            value.clamp(before, after)
        } else {
            value
        }
    }
}

/// Kronrod and Gauss estimates over one panel.
fn kronrod_panel<F>(function: &F, start: f64, end: f64) -> (f64, f64)
where
    F: Fn(f64) -> f64,
{
    let center = 0.5 * (start + end);
    let half_length = 0.5 * (end - start);

    let center_value = function(center);
    let mut kronrod = KRONROD_WEIGHTS[7] * center_value;
    let mut gauss = GAUSS_WEIGHTS[3] * center_value;

    for index in 0..7 {
        let offset = half_length * KRONROD_NODES[index];
        let pair = function(center - offset) + function(center + offset);
        kronrod += KRONROD_WEIGHTS[index] * pair;
        if index % 2 == 1 {
            gauss += GAUSS_WEIGHTS[index / 2] * pair;
        }
    }

    (kronrod * half_length, gauss * half_length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polynomial_is_exact() {
        let value = Quadrature::default()
            .integrate(|t| t.powi(5) - 2.0 * t, 0.0, 2.0)
            .unwrap();
        assert!((value - (64.0 / 6.0 - 4.0)).abs() < 1e-12);
    }

    #[test]
    fn reversed_bounds_negate() {
        let quadrature = Quadrature::default();
        let forward = quadrature.integrate(f64::cos, 0.0, 1.0).unwrap();
        let backward = quadrature.integrate(f64::cos, 1.0, 0.0).unwrap();
        assert_eq!(forward, -backward);
    }

    #[test]
    fn table_total_matches_integrate() {
        let quadrature = Quadrature::default();
        let table = quadrature.tabulate(f64::exp, 0.0, 1.0).unwrap();
        assert_eq!(table.panels(), 1 << MIN_TABLE_REFINEMENTS);
        assert!((table.total() - (std::f64::consts::E - 1.0)).abs() < 1e-12);
        assert!((table.integrate(f64::exp, 0.5) - (0.5_f64.exp() - 1.0)).abs() < 1e-12);
        assert_eq!(table.integrate(f64::exp, -1.0), 0.0);
        assert_eq!(table.integrate(f64::exp, 2.0), table.total());
    }

    #[test]
    fn table_is_monotone_across_panel_edges() {
        let rate = |t: f64| 4.0 * ((37.0 * t).cos() + 1.0) + 2.0;
        let table = Quadrature::default().tabulate(rate, 0.0, 1.0).unwrap();
        let edge = 1.0 / table.panels() as f64;
        let mut previous = 0.0;
        for step in 0..=2000 {
            let t = 37.0 * edge + (step as f64 - 1000.0) * 1e-9;
            let value = table.integrate(rate, t);
            assert!(value >= previous, "decreased at {t}");
            previous = value;
        }
    }

    #[test]
    fn empty_table_range_fails() {
        let result = Quadrature::default().tabulate(f64::exp, 1.0, 1.0);
        assert!(matches!(
            result,
            Err(TimeWarpError::IntegrationFailed { .. })
        ));
    }

    #[test]
    fn non_finite_integrand_fails() {
        let result = Quadrature::default().integrate(|_| f64::NAN, 0.0, 1.0);
        assert!(matches!(
            result,
            Err(TimeWarpError::IntegrationFailed { .. })
        ));
    }

    #[test]
    fn kink_converges_with_refinement() {
        let quadrature = Quadrature::new(1e-9, 0.0).with_max_refinements(16);
        let value = quadrature
            .integrate(|t| (t - 0.3).abs(), 0.0, 1.0)
            .unwrap();
        assert!((value - (0.045 + 0.245)).abs() < 1e-6);
    }
}
