//! Stream readiness integration tests.
//!
//! The driver must only hand a stream a unit after the sink reported that
//! stream ready, and must still wind down a stream that never becomes
//! ready once the run is cancelled or stops out of order.

mod common;

use std::sync::Arc;

use common::{MockAudio, MockVideo, Readiness, Recording, RecordingSink, Unit};
use timewarp::{
    AntiDerivative, CancellationToken, FrameRate, RetimeOptions, RetimeOutcome, ScalingKind,
    TimeWarpMap, retime,
};

fn natural() -> RetimeOptions {
    RetimeOptions::new().with_frame_rate(FrameRate::Natural)
}

fn run_throttled(video: Readiness, audio: Readiness) -> (RetimeOutcome, Recording) {
    let map = TimeWarpMap::from_function(ScalingKind::Constant.with(1.0, 0.5), 8.0).unwrap();
    let samples: Vec<i16> = (0..64).map(|index| index * 100).collect();
    let source = MockAudio::new(&samples, 1, 8, 4).boxed();
    let (sink, recording) = RecordingSink::new();
    let sink = sink.with_video_readiness(video).with_audio_readiness(audio);

    let report = retime(MockVideo::at_rate(2.0, 16), Some(source), sink, &map, &natural());

    let recording = Arc::try_unwrap(recording).unwrap().into_inner().unwrap();
    (report.outcome, recording)
}

// ── Throttled streams ──────────────────────────────────────────────

#[test]
fn intermittent_readiness_produces_the_same_units() {
    let (eager_outcome, eager) = run_throttled(Readiness::Always, Readiness::Always);
    let (outcome, throttled) = run_throttled(Readiness::EveryOther, Readiness::EveryOther);

    assert!(eager_outcome.is_success());
    assert!(outcome.is_success(), "{outcome:?}");
    assert!(!throttled.appended_while_busy);

    assert_eq!(throttled.units, eager.units);
    assert_eq!(throttled.audio, eager.audio);
    assert_eq!(throttled.video, eager.video);

    let frames: Vec<u32> = throttled
        .units
        .iter()
        .filter_map(|unit| match unit {
            Unit::Video(frame) => Some(*frame),
            Unit::Audio(_) => None,
        })
        .collect();
    assert_eq!(frames, (0..16).collect::<Vec<u32>>());
    assert_eq!(throttled.audio.len(), 64);

    assert!(throttled.video_polls >= 2 * frames.len());
    assert_eq!(throttled.finalize_calls, 1);
    assert!(throttled.video_finished && throttled.audio_finished);
}

#[test]
fn busy_audio_does_not_hold_back_video() {
    let (outcome, recording) = run_throttled(Readiness::Always, Readiness::EveryOther);

    assert!(outcome.is_success());
    assert!(!recording.appended_while_busy);
    assert_eq!(recording.video.len(), 16);
    assert_eq!(recording.audio.len(), 64);
    assert_eq!(recording.finalize_calls, 1);
}

// ── Streams that never become ready ────────────────────────────────

#[test]
fn cancellation_wakes_a_stalled_audio_stream() {
    let token = CancellationToken::new();
    let map = TimeWarpMap::from_function(ScalingKind::Constant.with(1.0, 0.5), 10.0).unwrap();
    let video = MockVideo::at_rate(10.0, 100).cancel_after(5, token.clone());
    let audio = MockAudio::new(&vec![0; 80_000], 1, 8000, 1000).boxed();
    let (sink, recording) = RecordingSink::new();
    let sink = sink.with_audio_readiness(Readiness::Never);

    let report = retime(video, Some(audio), sink, &map, &natural().with_cancellation(token));

    assert!(matches!(report.outcome, RetimeOutcome::Cancelled));
    assert_eq!(report.samples_written, 0);

    let recording = recording.lock().unwrap();
    assert!(recording.audio.is_empty());
    assert!(recording.units.iter().all(|unit| matches!(unit, Unit::Video(_))));
    assert_eq!(recording.units.len(), 6);
    assert!(recording.audio_polls >= 6);
    assert!(!recording.appended_while_busy);
    assert!(recording.audio_finished);
    assert_eq!(recording.finalize_calls, 1);
}

#[test]
fn out_of_order_video_wakes_a_stalled_audio_stream() {
    let fold = AntiDerivative::new(|t: f64| t - 1.5 * (t - 0.5).max(0.0));
    let map = TimeWarpMap::new(Arc::new(fold), 1.0).unwrap();
    let audio = MockAudio::new(&[0; 8], 1, 8, 4).boxed();
    let (sink, recording) = RecordingSink::new();
    let sink = sink.with_audio_readiness(Readiness::Never);

    let report = retime(MockVideo::at_rate(10.0, 10), Some(audio), sink, &map, &natural());

    assert!(matches!(report.outcome, RetimeOutcome::OutOfOrder(_)));
    assert!(report.out_of_order);

    let recording = recording.lock().unwrap();
    assert!(recording.audio.is_empty());
    assert_eq!(recording.video.len(), 6);
    assert!(recording.audio_finished);
    assert_eq!(recording.finalize_calls, 1);
}
