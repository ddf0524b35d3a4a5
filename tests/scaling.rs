//! Scaling function integration tests.
//!
//! Shapes, parameter validation, and agreement between the closed-form
//! integrals and numeric quadrature.

use std::f64::consts::PI;

use timewarp::{Quadrature, ScalingFunction, ScalingKind, TimeWarpError};

fn reference_integral(function: &ScalingFunction, t: f64) -> f64 {
    Quadrature::new(1e-7, 0.0)
        .with_max_refinements(16)
        .integrate(|x| function.evaluate(x), 0.0, t)
        .expect("reference quadrature should converge")
}

// ── Shapes ─────────────────────────────────────────────────────────

#[test]
fn double_smoothstep_reaches_factor_on_plateau() {
    let function = ScalingKind::DoubleSmoothstep.with(3.0, 0.5);
    assert_eq!(function.evaluate(0.0), 1.0);
    assert_eq!(function.evaluate(0.5), 3.0);
    assert_eq!(function.evaluate(1.0), 1.0);
}

#[test]
fn triangle_peaks_at_middle() {
    let function = ScalingKind::Triangle.with(2.0, 0.5);
    assert_eq!(function.evaluate(0.1), 1.0);
    assert!((function.evaluate(0.5) - 2.0).abs() < 1e-12);
    assert!((function.evaluate(0.375) - 1.5).abs() < 1e-12);
}

#[test]
fn power_and_cosine_formulas() {
    let power = ScalingKind::Power.with(2.0, 0.5);
    assert!((power.evaluate(1.0) - 1.25).abs() < 1e-12);
    assert!((power.evaluate(0.0) - 0.25).abs() < 1e-12);

    let cosine = ScalingKind::Cosine.with(1.0, 0.5);
    assert!((cosine.evaluate(0.0) - 2.5).abs() < 1e-12);
}

#[test]
fn tapered_cosine_starts_at_unit_rate() {
    let function = ScalingKind::TaperedCosine.with(2.0, 0.5);
    assert!((function.evaluate(0.0) - 1.0).abs() < 1e-12);
}

// ── Integrals ──────────────────────────────────────────────────────

#[test]
fn every_kind_integrates_to_zero_at_zero() {
    for kind in ScalingKind::ALL {
        let function = kind.with(1.5, 0.5);
        assert_eq!(function.integrate(0.0).unwrap(), 0.0, "{kind}");
    }
}

#[test]
fn integrals_strictly_increase_over_the_parameter_grid() {
    const STEPS: usize = 10_000;
    for kind in ScalingKind::ALL {
        for factor in [0.1, 1.0, 2.5, 4.0] {
            for modifier in [0.1, 0.5, 1.0] {
                let integrator = kind.with(factor, modifier).integrator();
                let mut previous = 0.0;
                for step in 1..=STEPS {
                    let t = step as f64 / STEPS as f64;
                    let value = integrator.integrate(t).unwrap();
                    assert!(
                        value > previous,
                        "{kind} f={factor} m={modifier} decreased at t={t}: {previous} -> {value}"
                    );
                    previous = value;
                }
            }
        }
    }
}

#[test]
fn tapered_cosine_is_monotone_at_full_modifier() {
    let integrator = ScalingKind::TaperedCosine.with(4.0, 1.0).integrator();
    let mut previous = 0.0;
    for step in 1..=20_000 {
        let t = step as f64 / 20_000.0;
        let value = integrator.integrate(t).unwrap();
        assert!(value > previous, "decreased at t={t}: {previous} -> {value}");
        previous = value;
    }
}

#[test]
fn smooth_integrals_match_reference_quadrature() {
    for kind in [ScalingKind::Cosine, ScalingKind::TaperedCosine, ScalingKind::Power] {
        let function = kind.with(4.0, 1.0);
        let integrator = function.integrator();
        for step in 0..=50 {
            let t = step as f64 / 50.0;
            let tabulated = integrator.integrate(t).unwrap();
            let reference = reference_integral(&function, t);
            assert!(
                (tabulated - reference).abs() < 1e-6,
                "{kind} t={t}: {tabulated} vs {reference}"
            );
        }
    }
}

#[test]
fn closed_forms_match_quadrature() {
    for kind in [ScalingKind::Triangle, ScalingKind::DoubleSmoothstep] {
        for (factor, modifier) in [(0.5, 0.75), (4.0, 1.0)] {
            let function = kind.with(factor, modifier);
            let integrator = function.integrator();
            for step in 0..=100 {
                let t = step as f64 / 100.0;
                let closed = integrator.integrate(t).unwrap();
                let numeric = reference_integral(&function, t);
                assert!(
                    (closed - numeric).abs() < 1e-4,
                    "{kind} f={factor} m={modifier} t={t}: {closed} vs {numeric}"
                );
            }
        }
    }
}

#[test]
fn constant_integral_is_linear() {
    let function = ScalingKind::Constant.with(2.5, 0.5);
    assert!((function.integrate(0.4).unwrap() - 1.0).abs() < 1e-12);
}

#[test]
fn power_integral_matches_antiderivative() {
    let function = ScalingKind::Power.with(2.0, 0.5);
    let expected = |t: f64| 2.0 * 0.5 * t.powi(3) / 3.0 + 0.25 * t;
    for t in [0.2, 0.5, 1.0] {
        assert!((function.integrate(t).unwrap() - expected(t)).abs() < 1e-9);
    }
}

#[test]
fn cosine_integral_matches_antiderivative() {
    let (factor, modifier) = (1.5, 0.4);
    let function = ScalingKind::Cosine.with(factor, modifier);
    let integrator = function.integrator_with(Quadrature::new(1e-10, 0.0));
    let omega = 12.0 * modifier * PI;
    let expected = |t: f64| factor * (t + (omega * t).sin() / omega) + factor * t / 2.0;
    for t in [0.1, 0.33, 0.9] {
        assert!((integrator.integrate(t).unwrap() - expected(t)).abs() < 1e-8);
    }
}

#[test]
fn integrator_remembers_function() {
    let function = ScalingKind::Cosine.with(1.0, 0.2);
    assert_eq!(function.integrator().function(), function);
}

// ── Validation ─────────────────────────────────────────────────────

#[test]
fn bounds_are_inclusive() {
    assert!(ScalingKind::Triangle.with(0.1, 0.1).validate().is_ok());
    assert!(ScalingKind::Triangle.with(4.0, 1.0).validate().is_ok());
}

#[test]
fn out_of_range_parameters_are_rejected() {
    for function in [
        ScalingKind::Constant.with(0.05, 0.5),
        ScalingKind::Constant.with(4.5, 0.5),
        ScalingKind::Cosine.with(1.0, 0.0),
        ScalingKind::Cosine.with(1.0, 1.5),
        ScalingKind::Power.with(f64::NAN, 0.5),
    ] {
        assert!(matches!(
            function.validate(),
            Err(TimeWarpError::InvalidParameter(_))
        ));
    }
}

// ── Parsing ────────────────────────────────────────────────────────

#[test]
fn kind_names_round_trip() {
    for kind in ScalingKind::ALL {
        assert_eq!(kind.to_string().parse::<ScalingKind>().unwrap(), kind);
    }
}

#[test]
fn kind_parsing_ignores_case_and_separators() {
    assert_eq!(
        "double-smoothstep".parse::<ScalingKind>().unwrap(),
        ScalingKind::DoubleSmoothstep
    );
    assert_eq!(
        "TAPERED_COSINE".parse::<ScalingKind>().unwrap(),
        ScalingKind::TaperedCosine
    );
    assert!("sawtooth".parse::<ScalingKind>().is_err());
}

#[test]
fn default_is_double_smoothstep() {
    let function = ScalingFunction::default();
    assert_eq!(function.kind(), ScalingKind::DoubleSmoothstep);
    assert_eq!(function.factor(), timewarp::DEFAULT_FACTOR);
    assert_eq!(function.modifier(), timewarp::DEFAULT_MODIFIER);
}
