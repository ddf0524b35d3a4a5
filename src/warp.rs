//! Cumulative time warps.
//!
//! A [`TimeWarpMap`] turns the integral of a rate function into
//! `timeScale(t) = integrate(t / duration) · duration`, mapping a source
//! time in seconds to an output time in seconds. Anything implementing
//! [`Integrator`] can drive it: the built-in scaling functions, a
//! closed-form [`AntiDerivative`], or an arbitrary rate function
//! integrated numerically through [`Integrand`].
//!
//! # Example
//!
//! ```
//! use timewarp::{ScalingKind, TimeWarpMap};
//!
//! let map = TimeWarpMap::from_function(ScalingKind::Constant.with(2.0, 0.5), 10.0)?;
//! assert!((map.time_scale(5.0)? - 10.0).abs() < 1e-9);
//! assert!((map.scaled_duration() - 20.0).abs() < 1e-9);
//! # Ok::<(), timewarp::TimeWarpError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use crate::error::TimeWarpError;
use crate::quadrature::Quadrature;
use crate::scaling::{ScalingFunction, ScalingIntegrator};

/// A definite integral from 0 over normalized time.
///
/// Implementations must be [`Send`] and [`Sync`] because one map is shared
/// by the video and audio passes.
pub trait Integrator: Send + Sync {
    /// Integral from 0 to `t`.
    fn integrate(&self, t: f64) -> Result<f64, TimeWarpError>;
}

impl Integrator for ScalingIntegrator {
    fn integrate(&self, t: f64) -> Result<f64, TimeWarpError> {
        ScalingIntegrator::integrate(self, t)
    }
}

/// A caller-supplied antiderivative, evaluated directly.
///
/// The function must vanish at 0.
///
/// ```
/// use timewarp::{AntiDerivative, Integrator};
///
/// let half_speed = AntiDerivative::new(|t| t / 2.0);
/// assert_eq!(half_speed.integrate(1.0)?, 0.5);
/// # Ok::<(), timewarp::TimeWarpError>(())
/// ```
pub struct AntiDerivative<F> {
    function: F,
}

impl<F> AntiDerivative<F>
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    /// Wrap an antiderivative.
    pub fn new(function: F) -> Self {
        Self { function }
    }
}

impl<F> Integrator for AntiDerivative<F>
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn integrate(&self, t: f64) -> Result<f64, TimeWarpError> {
        let value = (self.function)(t);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(TimeWarpError::IntegrationFailed {
                upper_bound: t,
                estimated_error: f64::INFINITY,
            })
        }
    }
}

/// A caller-supplied rate function, integrated with [`Quadrature`].
pub struct Integrand<F> {
    function: F,
    quadrature: Quadrature,
}

impl<F> Integrand<F>
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    /// Integrate `function` with the default tolerances.
    pub fn new(function: F) -> Self {
        Self::with_quadrature(function, Quadrature::default())
    }

    /// Integrate `function` with custom tolerances.
    pub fn with_quadrature(function: F, quadrature: Quadrature) -> Self {
        Self {
            function,
            quadrature,
        }
    }
}

impl<F> Integrator for Integrand<F>
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn integrate(&self, t: f64) -> Result<f64, TimeWarpError> {
        self.quadrature.integrate(&self.function, 0.0, t)
    }
}

/// `timeScale(t) = integrate(t / duration) · duration`.
///
/// Cheap to clone; clones share the integrator.
#[derive(Clone)]
pub struct TimeWarpMap {
    integrator: Arc<dyn Integrator>,
    duration: f64,
    scale_factor: f64,
}

impl Debug for TimeWarpMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TimeWarpMap")
            .field("duration", &self.duration)
            .field("scale_factor", &self.scale_factor)
            .finish()
    }
}

impl TimeWarpMap {
    /// Build a map over a clip of `duration` seconds.
    ///
    /// Fails when the duration is not positive and finite, or when the
    /// integral over the whole clip is not positive and finite.
    pub fn new(integrator: Arc<dyn Integrator>, duration: f64) -> Result<Self, TimeWarpError> {
        if !(duration.is_finite() && duration > 0.0) {
            return Err(TimeWarpError::InvalidParameter(format!(
                "clip duration {duration} must be positive"
            )));
        }

        let scale_factor = integrator.integrate(1.0)?;
        if !(scale_factor.is_finite() && scale_factor > 0.0) {
            return Err(TimeWarpError::InvalidWarp {
                integral: scale_factor,
            });
        }

        Ok(Self {
            integrator,
            duration,
            scale_factor,
        })
    }

    /// Build a map from a built-in scaling function.
    pub fn from_function(function: ScalingFunction, duration: f64) -> Result<Self, TimeWarpError> {
        Self::new(Arc::new(function.integrator()), duration)
    }

    /// Source clip duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Integral over the whole normalized clip.
    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Expected output duration in seconds.
    pub fn scaled_duration(&self) -> f64 {
        self.scale_factor * self.duration
    }

    /// Map a source time in seconds to an output time in seconds.
    pub fn time_scale(&self, time: f64) -> Result<f64, TimeWarpError> {
        Ok(self.integrator.integrate(time / self.duration)? * self.duration)
    }
}

/// Format seconds as `H:MM:SS`, or `MM:SS` under an hour.
///
/// ```
/// use std::time::Duration;
///
/// assert_eq!(timewarp::format_duration(Duration::from_secs(75)), "01:15");
/// assert_eq!(timewarp::format_duration(Duration::from_secs(3725)), "1:02:05");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs_f64().round() as u64;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}
