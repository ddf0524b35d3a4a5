//! Time warp and lookup table integration tests.

use std::sync::Arc;
use std::time::Duration;

use timewarp::{
    AntiDerivative, Integrand, Integrator, ScalingKind, ScalingLut, TimeWarpError, TimeWarpMap,
};

// ── TimeWarpMap ────────────────────────────────────────────────────

#[test]
fn endpoints_map_to_zero_and_scaled_duration() {
    for kind in ScalingKind::ALL {
        let map = TimeWarpMap::from_function(kind.with(1.8, 0.6), 7.5).unwrap();
        assert_eq!(map.time_scale(0.0).unwrap(), 0.0);
        let end = map.time_scale(7.5).unwrap();
        assert!((end - map.scaled_duration()).abs() < 1e-9, "{kind}");
    }
}

#[test]
fn constant_factor_scales_duration() {
    let map = TimeWarpMap::from_function(ScalingKind::Constant.with(0.5, 0.5), 12.0).unwrap();
    assert!((map.scale_factor() - 0.5).abs() < 1e-12);
    assert!((map.scaled_duration() - 6.0).abs() < 1e-9);
    assert!((map.time_scale(4.0).unwrap() - 2.0).abs() < 1e-9);
    assert_eq!(map.duration(), 12.0);
}

#[test]
fn antiderivative_drives_the_map() {
    let map = TimeWarpMap::new(Arc::new(AntiDerivative::new(|t| t * t)), 4.0).unwrap();
    assert_eq!(map.time_scale(2.0).unwrap(), 1.0);
    assert_eq!(map.scaled_duration(), 4.0);
}

#[test]
fn integrand_is_integrated_numerically() {
    let integrand = Integrand::new(|t| 2.0 * t);
    assert!((integrand.integrate(0.5).unwrap() - 0.25).abs() < 1e-12);
}

#[test]
fn non_positive_duration_is_rejected() {
    for duration in [0.0, -1.0, f64::NAN] {
        let result = TimeWarpMap::from_function(ScalingKind::Constant.with(1.0, 0.5), duration);
        assert!(matches!(result, Err(TimeWarpError::InvalidParameter(_))));
    }
}

#[test]
fn zero_total_integral_is_rejected() {
    let result = TimeWarpMap::new(Arc::new(AntiDerivative::new(|t| t * (1.0 - t))), 3.0);
    assert!(matches!(result, Err(TimeWarpError::InvalidWarp { .. })));
}

#[test]
fn non_finite_antiderivative_fails_integration() {
    let broken = AntiDerivative::new(|t| if t > 0.5 { f64::INFINITY } else { t });
    assert!(matches!(
        broken.integrate(0.75),
        Err(TimeWarpError::IntegrationFailed { .. })
    ));
}

#[test]
fn cosine_map_increases_at_audio_sample_resolution() {
    let map = TimeWarpMap::from_function(ScalingKind::Cosine.with(4.0, 1.0), 10.0).unwrap();
    let mut previous = map.time_scale(0.0).unwrap();
    for sample in 1..=441_000 {
        let time = sample as f64 / 44_100.0;
        let scaled = map.time_scale(time).unwrap();
        assert!(scaled > previous, "not increasing at {time}s: {previous} -> {scaled}");
        previous = scaled;
    }
}

#[test]
fn durations_format_as_clock_time() {
    assert_eq!(timewarp::format_duration(Duration::from_secs(0)), "00:00");
    assert_eq!(timewarp::format_duration(Duration::from_millis(59_600)), "01:00");
    assert_eq!(timewarp::format_duration(Duration::from_secs(7322)), "2:02:02");
}

// ── ScalingLut ─────────────────────────────────────────────────────

fn sample_lut() -> ScalingLut {
    let mut lut = ScalingLut::new();
    lut.push(0.0, 0.0);
    lut.push(1.0, 2.0);
    lut.push(3.0, 3.0);
    lut
}

#[test]
fn lut_interpolates_between_breakpoints() {
    let lut = sample_lut();
    assert_eq!(lut.source_time_at(1.0), Some(2.0));
    assert_eq!(lut.source_time_at(0.5), Some(1.0));
    assert_eq!(lut.source_time_at(2.0), Some(2.5));
    assert_eq!(lut.output_time_at(2.5), Some(2.0));
}

#[test]
fn lut_clamps_outside_range() {
    let lut = sample_lut();
    assert_eq!(lut.source_time_at(-1.0), Some(0.0));
    assert_eq!(lut.source_time_at(10.0), Some(3.0));
}

#[test]
fn empty_lut_answers_nothing() {
    let lut = ScalingLut::new();
    assert!(lut.is_empty());
    assert_eq!(lut.source_time_at(1.0), None);
}

#[test]
fn lut_serializes_as_pairs() {
    let json = sample_lut().to_json();
    assert_eq!(json, serde_json::json!([[0.0, 0.0], [1.0, 2.0], [3.0, 3.0]]));
}
