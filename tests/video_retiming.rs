//! Video retiming integration tests.
//!
//! Drive the engine with in-memory frames and check the timestamps that
//! reach the sink in both natural-rate and fixed-rate modes.

mod common;

use std::sync::Arc;

use common::{MockVideo, RecordingSink};
use timewarp::{
    AntiDerivative, ErrorKind, FrameRate, MediaTime, RetimeOptions, RetimeOutcome, ScalingKind,
    TimeWarpMap, retime,
};

fn natural() -> RetimeOptions {
    RetimeOptions::new().with_frame_rate(FrameRate::Natural)
}

fn fixed(fps: u32) -> RetimeOptions {
    RetimeOptions::new().with_frame_rate(FrameRate::Fixed(fps))
}

/// Rises to 0.5 at the midpoint, then falls back to 0.25.
fn folding_map(duration: f64) -> TimeWarpMap {
    let fold = AntiDerivative::new(|t: f64| t - 1.5 * (t - 0.5).max(0.0));
    TimeWarpMap::new(Arc::new(fold), duration).unwrap()
}

// ── Natural rate ───────────────────────────────────────────────────

#[test]
fn natural_rate_rewrites_every_timestamp() {
    let map = TimeWarpMap::from_function(ScalingKind::Constant.with(2.0, 0.5), 1.0).unwrap();
    let (sink, recording) = RecordingSink::new();

    let report = retime(MockVideo::new(&[0.0, 0.25, 0.5, 0.75]), None, sink, &map, &natural());

    assert!(report.outcome.is_success());
    assert_eq!(report.frames_written, 4);
    assert!(!report.out_of_order);

    let recording = recording.lock().unwrap();
    let written: Vec<(u32, i64)> = recording
        .video
        .iter()
        .map(|(frame, time)| (*frame, time.value))
        .collect();
    assert_eq!(written, vec![(0, 0), (1, 32_000), (2, 64_000), (3, 96_000)]);
    assert!(recording.video.iter().all(|(_, time)| time.timescale == 64_000));
    assert!(recording.video_finished);
    assert_eq!(recording.finalize_calls, 1);
}

#[test]
fn natural_rate_records_one_breakpoint_per_frame() {
    let map = TimeWarpMap::from_function(ScalingKind::Constant.with(2.0, 0.5), 1.0).unwrap();
    let (sink, _recording) = RecordingSink::new();

    let report = retime(MockVideo::new(&[0.0, 0.25, 0.5]), None, sink, &map, &natural());

    assert_eq!(report.lut.len(), 3);
    let point = report.lut.points()[1];
    assert!((point.output - 0.5).abs() < 1e-9);
    assert_eq!(point.source, 0.25);
    assert!((report.lut.source_time_at(0.75).unwrap() - 0.375).abs() < 1e-9);
}

#[test]
fn lookup_at_each_breakpoint_is_exact() {
    let map = TimeWarpMap::from_function(ScalingKind::DoubleSmoothstep.with(2.5, 0.7), 2.0).unwrap();
    let (sink, _recording) = RecordingSink::new();

    let report = retime(MockVideo::at_rate(24.0, 48), None, sink, &map, &natural());

    assert_eq!(report.lut.len(), 48);
    for point in report.lut.points() {
        assert_eq!(report.lut.source_time_at(point.output), Some(point.source));
    }
}

#[test]
fn decreasing_warp_stops_as_out_of_order() {
    let (sink, recording) = RecordingSink::new();

    let report = retime(
        MockVideo::new(&[0.0, 0.25, 0.5, 0.75, 0.9]),
        None,
        sink,
        &folding_map(1.0),
        &natural(),
    );

    assert!(report.out_of_order);
    assert_eq!(report.frames_written, 3);
    match &report.outcome {
        RetimeOutcome::OutOfOrder(error) => assert_eq!(error.kind(), ErrorKind::OutOfOrder),
        other => panic!("expected out of order, got {other:?}"),
    }
    assert_eq!(recording.lock().unwrap().finalize_calls, 1);
}

#[test]
fn repeated_source_time_is_out_of_order() {
    let map = TimeWarpMap::from_function(ScalingKind::Constant.with(1.0, 0.5), 1.0).unwrap();
    let (sink, _recording) = RecordingSink::new();

    let report = retime(MockVideo::new(&[0.0, 0.1, 0.1]), None, sink, &map, &natural());

    assert!(matches!(report.outcome, RetimeOutcome::OutOfOrder(_)));
    assert_eq!(report.frames_written, 2);
}

#[test]
fn long_smooth_warp_stays_in_order() {
    let map =
        TimeWarpMap::from_function(ScalingKind::TaperedCosine.with(4.0, 1.0), 600.0).unwrap();
    let (sink, recording) = RecordingSink::new();

    let report = retime(MockVideo::at_rate(30.0, 18_000), None, sink, &map, &natural());

    assert!(report.outcome.is_success(), "{:?}", report.outcome);
    assert!(!report.out_of_order);
    assert_eq!(report.frames_written, 18_000);
    let recording = recording.lock().unwrap();
    assert!(recording.video.windows(2).all(|pair| pair[0].1.value < pair[1].1.value));
}

#[test]
fn times_closer_than_one_tick_are_out_of_order() {
    let map = TimeWarpMap::from_function(ScalingKind::Constant.with(1.0, 0.5), 1.0).unwrap();
    let (sink, recording) = RecordingSink::new();

    let report = retime(MockVideo::new(&[0.0, 0.5, 0.500_001]), None, sink, &map, &natural());

    assert!(report.out_of_order);
    match &report.outcome {
        RetimeOutcome::OutOfOrder(error) => assert_eq!(error.kind(), ErrorKind::OutOfOrder),
        other => panic!("expected out of order, got {other:?}"),
    }
    let recording = recording.lock().unwrap();
    assert_eq!(recording.video.len(), 2);
    assert_eq!(recording.finalize_calls, 1);
}

// ── Fixed rate ─────────────────────────────────────────────────────

#[test]
fn unit_rate_keeps_every_frame_on_the_grid() {
    let map = TimeWarpMap::from_function(ScalingKind::Constant.with(1.0, 0.5), 10.0 / 30.0).unwrap();
    let (sink, recording) = RecordingSink::new();

    let report = retime(MockVideo::at_rate(30.0, 10), None, sink, &map, &fixed(30));

    assert!(report.outcome.is_success());
    assert_eq!(report.frames_written, 10);
    let recording = recording.lock().unwrap();
    let expected: Vec<(u32, MediaTime)> =
        (0..10).map(|index| (index, MediaTime::new(i64::from(index) * 20, 600))).collect();
    assert_eq!(recording.video, expected);
}

#[test]
fn doubled_duration_repeats_frames() {
    let map = TimeWarpMap::from_function(ScalingKind::Constant.with(2.0, 0.5), 10.0 / 30.0).unwrap();
    let (sink, recording) = RecordingSink::new();

    let report = retime(MockVideo::at_rate(30.0, 10), None, sink, &map, &fixed(30));

    assert_eq!(report.frames_written, 19);
    let recording = recording.lock().unwrap();
    let frames: Vec<u32> = recording.video.iter().map(|(frame, _)| *frame).collect();
    let mut expected = vec![0];
    for index in 1..10 {
        expected.extend([index, index]);
    }
    assert_eq!(frames, expected);

    let ticks: Vec<i64> = recording.video.iter().map(|(_, time)| time.value).collect();
    assert!(ticks.windows(2).all(|pair| pair[1] - pair[0] == 20));
}

#[test]
fn halved_duration_drops_frames() {
    let map = TimeWarpMap::from_function(ScalingKind::Constant.with(0.5, 0.5), 20.0 / 30.0).unwrap();
    let (sink, recording) = RecordingSink::new();

    let report = retime(MockVideo::at_rate(30.0, 20), None, sink, &map, &fixed(30));

    assert!(report.outcome.is_success());
    let recording = recording.lock().unwrap();
    let frames: Vec<u32> = recording.video.iter().map(|(frame, _)| *frame).collect();
    assert_eq!(frames, (0..10).map(|index| index * 2).collect::<Vec<_>>());
    assert_eq!(report.lut.len(), 20);
}

#[test]
fn odd_frame_rate_uses_exact_spacing() {
    let map = TimeWarpMap::from_function(ScalingKind::Constant.with(1.0, 0.5), 1.0).unwrap();
    let (sink, recording) = RecordingSink::new();

    retime(MockVideo::at_rate(7.0, 7), None, sink, &map, &fixed(7));

    let recording = recording.lock().unwrap();
    assert_eq!(recording.video.len(), 7);
    assert!(recording.video.iter().all(|(_, time)| time.timescale == 4200));
    assert_eq!(recording.video[3].1.value, 1800);
}

#[test]
fn empty_source_completes_without_frames() {
    let map = TimeWarpMap::from_function(ScalingKind::Constant.with(1.0, 0.5), 1.0).unwrap();
    for options in [natural(), fixed(24)] {
        let (sink, recording) = RecordingSink::new();
        let report = retime(MockVideo::new(&[]), None, sink, &map, &options);
        assert!(report.outcome.is_success());
        assert_eq!(report.frames_written, 0);
        assert_eq!(recording.lock().unwrap().finalize_calls, 1);
    }
}

// ── Sink failures ──────────────────────────────────────────────────

#[test]
fn rejected_frame_fails_the_run() {
    let map = TimeWarpMap::from_function(ScalingKind::Constant.with(1.0, 0.5), 1.0).unwrap();
    let (sink, recording) = RecordingSink::new();

    let report = retime(
        MockVideo::at_rate(10.0, 10),
        None,
        sink.fail_video_after(2),
        &map,
        &natural(),
    );

    assert_eq!(report.frames_written, 2);
    match &report.outcome {
        RetimeOutcome::Failed(error) => assert_eq!(error.kind(), ErrorKind::Write),
        other => panic!("expected failure, got {other:?}"),
    }
    let message = report.outcome.message().unwrap();
    assert!(message.ends_with(timewarp::SETTINGS_HINT));
    assert_eq!(recording.lock().unwrap().finalize_calls, 1);
}
