//! The run driver.
//!
//! [`retime`] owns one session: it steps the video pass and the audio pass
//! one unit at a time whenever the destination is ready for that stream,
//! closes each stream as its pass ends, and folds both pass outcomes into a
//! single [`RetimeReport`]. The destination is finalized exactly once,
//! when the last open stream closes.

use std::path::{Path, PathBuf};

use crate::audio::AudioPass;
use crate::configuration::RetimeOptions;
use crate::error::{ErrorKind, TimeWarpError};
use crate::lut::ScalingLut;
use crate::media::{AudioSource, MediaSink, VideoSource};
use crate::progress::CompletionCallback;
use crate::session::SessionState;
use crate::sink::Destination;
use crate::video::{PassOutcome, VideoPass};
use crate::warp::TimeWarpMap;

/// How a run ended.
#[derive(Debug)]
pub enum RetimeOutcome {
    /// Both streams were retimed and the destination finalized.
    Completed,
    /// The run was cancelled; the destination was finalized as is.
    Cancelled,
    /// The scaled video timeline stopped increasing.
    OutOfOrder(TimeWarpError),
    /// A pass or the destination failed.
    Failed(TimeWarpError),
}

impl RetimeOutcome {
    /// Whether the run completed.
    pub fn is_success(&self) -> bool {
        matches!(self, RetimeOutcome::Completed)
    }

    /// The error behind a failed or out-of-order run.
    pub fn error(&self) -> Option<&TimeWarpError> {
        match self {
            RetimeOutcome::OutOfOrder(error) | RetimeOutcome::Failed(error) => Some(error),
            RetimeOutcome::Completed | RetimeOutcome::Cancelled => None,
        }
    }

    /// User-facing failure message with a settings suggestion.
    pub fn message(&self) -> Option<String> {
        self.error().map(TimeWarpError::user_message)
    }
}

/// Everything a caller can inspect after a run.
#[derive(Debug)]
pub struct RetimeReport {
    /// Terminal outcome.
    pub outcome: RetimeOutcome,
    /// Output-time to source-time breakpoints recorded by the video pass.
    pub lut: ScalingLut,
    /// Whether the video pass hit a non-increasing scaled time.
    pub out_of_order: bool,
    /// Cumulative progress when the run ended.
    pub progress: f64,
    /// Video frames appended to the destination.
    pub frames_written: u64,
    /// Audio samples per channel appended to the destination.
    pub samples_written: u64,
    /// Destination file, when the run completed and wrote one.
    pub destination: Option<PathBuf>,
}

impl RetimeReport {
    /// Deliver the terminal notification for this report.
    pub fn notify(&self, callback: &dyn CompletionCallback) {
        match &self.outcome {
            RetimeOutcome::Completed => callback.on_complete(self.destination.as_deref(), None),
            RetimeOutcome::Cancelled => callback.on_complete(None, None),
            outcome => callback.on_complete(None, outcome.message().as_deref()),
        }
    }

    pub(crate) fn with_destination(mut self, path: &Path) -> Self {
        if self.outcome.is_success() {
            self.destination = Some(path.to_path_buf());
        }
        self
    }
}

/// Retime `video` and optionally `audio` into `sink` through `map`.
///
/// Never fails outright: setup problems of the audio stream, pass failures,
/// and cancellation all end up in [`RetimeReport::outcome`].
pub fn retime<V, K>(
    video: V,
    audio: Option<Box<dyn AudioSource>>,
    sink: K,
    map: &TimeWarpMap,
    options: &RetimeOptions,
) -> RetimeReport
where
    V: VideoSource,
    K: MediaSink<Frame = V::Frame>,
{
    let cancellation = options.cancellation.clone().unwrap_or_default();
    let session = SessionState::new(options, cancellation);
    let mut destination = Destination::new(sink, audio.is_some());

    let video_share = if audio.is_some() { 1.0 / 3.0 } else { 1.0 };
    let mut video_pass = VideoPass::new(video, map.clone(), options.frame_rate, video_share);
    let mut video_outcome: Option<PassOutcome> = None;
    let mut audio_outcome: Option<PassOutcome> = None;
    let mut close_error: Option<TimeWarpError> = None;

    let mut audio_pass = match audio.map(|source| AudioPass::new(source, map.clone(), 2.0 / 3.0)) {
        Some(Ok(pass)) => Some(pass),
        Some(Err(error)) => {
            log::warn!("Audio pass not started: {error}");
            audio_outcome = Some(PassOutcome::Failed(error));
            if let Err(error) = destination.close_audio() {
                close_error.get_or_insert(error);
            }
            None
        }
        None => None,
    };

    log::info!(
        "Retiming {:.3}s clip to {:.3}s at {}",
        map.duration(),
        map.scaled_duration(),
        options.frame_rate
    );

    loop {
        let mut idle = true;

        if video_outcome.is_none() && (destination.video_ready() || session.is_cancelled()) {
            idle = false;
            if let Some(outcome) = video_pass.step(&mut destination, &session) {
                video_outcome = Some(outcome);
                if let Err(error) = destination.close_video() {
                    close_error.get_or_insert(error);
                }
            }
        }

        if let Some(pass) = audio_pass.as_mut() {
            let wake = session.is_cancelled() || session.is_out_of_order();
            if audio_outcome.is_none() && (destination.audio_ready() || wake) {
                idle = false;
                if let Some(outcome) = pass.step(&mut destination, &session) {
                    audio_outcome = Some(outcome);
                    if let Err(error) = destination.close_audio() {
                        close_error.get_or_insert(error);
                    }
                }
            }
        }

        let audio_done = audio_pass.is_none() || audio_outcome.is_some();
        if video_outcome.is_some() && audio_done {
            break;
        }
        if idle {
            std::thread::yield_now();
        }
    }

    debug_assert!(destination.is_finalized());

    let outcome = resolve(
        video_outcome.unwrap_or(PassOutcome::Aborted),
        audio_outcome,
        session.is_cancelled(),
        close_error,
    );
    match &outcome {
        RetimeOutcome::Completed => log::info!("Retiming completed"),
        RetimeOutcome::Cancelled => log::info!("Retiming cancelled"),
        RetimeOutcome::OutOfOrder(error) | RetimeOutcome::Failed(error) => {
            log::warn!("Retiming failed: {error}")
        }
    }

    RetimeReport {
        outcome,
        lut: session.take_lut(),
        out_of_order: session.is_out_of_order(),
        progress: session.fraction(),
        frames_written: video_pass.frames_written(),
        samples_written: audio_pass.as_ref().map_or(0, AudioPass::samples_written),
        destination: None,
    }
}

/// Fold both pass outcomes into one.
///
/// Ordering failures win over other failures, failures win over
/// cancellation, and a finalize error fails an otherwise clean run.
fn resolve(
    video: PassOutcome,
    audio: Option<PassOutcome>,
    cancelled: bool,
    close_error: Option<TimeWarpError>,
) -> RetimeOutcome {
    let mut failures: Vec<TimeWarpError> = [Some(video), audio]
        .into_iter()
        .flatten()
        .filter_map(|outcome| match outcome {
            PassOutcome::Failed(error) => Some(error),
            _ => None,
        })
        .collect();

    if let Some(index) = failures
        .iter()
        .position(|error| error.kind() == ErrorKind::OutOfOrder)
    {
        return RetimeOutcome::OutOfOrder(failures.swap_remove(index));
    }
    if !failures.is_empty() {
        return RetimeOutcome::Failed(failures.swap_remove(0));
    }
    if cancelled {
        return RetimeOutcome::Cancelled;
    }
    match close_error {
        Some(error) => RetimeOutcome::Failed(error),
        None => RetimeOutcome::Completed,
    }
}
