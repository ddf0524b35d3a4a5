//! Video retiming.
//!
//! [`VideoPass`] pulls one frame at a time from a [`VideoSource`] and
//! retimes it in one of two modes chosen by the requested [`FrameRate`]:
//!
//! - **Natural**: every source frame is kept and its timestamp rewritten to
//!   `timeScale(sourceTime)`. The rewritten times, and their rounded
//!   ticks, must strictly increase; the first violation ends the pass as
//!   out of order.
//! - **Fixed**: output ticks are spaced exactly `1/fps` apart. Each tick
//!   shows the first source frame whose scaled time is at or after it, so
//!   source frames are repeated or dropped as the warp requires.

use crate::configuration::FrameRate;
use crate::error::TimeWarpError;
use crate::media::{
    FIXED_RATE_TIMESCALE, MediaSink, MediaTime, NATURAL_TIMESCALE, SourceFrame, VideoSource,
};
use crate::progress::Pass;
use crate::session::{PassProgress, SessionState};
use crate::sink::Destination;
use crate::warp::TimeWarpMap;

/// How a pass ended.
#[derive(Debug)]
pub(crate) enum PassOutcome {
    /// The source was exhausted.
    Finished,
    /// The cancellation token was observed.
    Cancelled,
    /// The other pass failed and this one stopped in sympathy.
    Aborted,
    /// Decoding, integration, ordering, or writing failed.
    Failed(TimeWarpError),
}

/// Timescale of video timestamps for `frame_rate`.
///
/// Natural rate uses a fine fixed timescale. Fixed rates use the smallest
/// multiple of 600 that `fps` divides, so tick spacing is an exact integer.
pub fn video_timescale(frame_rate: FrameRate) -> i32 {
    match frame_rate {
        FrameRate::Natural => NATURAL_TIMESCALE,
        FrameRate::Fixed(fps) => {
            let base = i64::from(FIXED_RATE_TIMESCALE);
            let fps = i64::from(fps.max(1));
            i32::try_from(base / gcd(base, fps) * fps).unwrap_or(i32::MAX)
        }
    }
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

struct Candidate<F> {
    frame: F,
    scaled_ticks: i64,
}

enum Mode<F> {
    Rewrite {
        /// Previous scaled time and its rounded tick.
        last: Option<(f64, i64)>,
    },
    Resample {
        timescale: i32,
        spacing: i64,
        tick: i64,
        started: bool,
        candidate: Option<Candidate<F>>,
    },
}

/// Streams one video track through the warp.
pub(crate) struct VideoPass<S: VideoSource> {
    source: S,
    map: TimeWarpMap,
    mode: Mode<S::Frame>,
    frames_read: u64,
    frames_written: u64,
    progress: PassProgress,
}

impl<S: VideoSource> VideoPass<S> {
    pub(crate) fn new(source: S, map: TimeWarpMap, frame_rate: FrameRate, share: f64) -> Self {
        let mode = match frame_rate {
            FrameRate::Natural => Mode::Rewrite { last: None },
            FrameRate::Fixed(fps) => {
                let timescale = video_timescale(frame_rate);
                Mode::Resample {
                    timescale,
                    spacing: i64::from(timescale) / i64::from(fps.max(1)),
                    tick: 0,
                    started: false,
                    candidate: None,
                }
            }
        };
        log::debug!("Video pass: {frame_rate:?}, {} frames expected", source.frame_count());

        Self {
            source,
            map,
            mode,
            frames_read: 0,
            frames_written: 0,
            progress: PassProgress::new(Pass::Video, share),
        }
    }

    pub(crate) fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Process one unit of work. `None` means the pass should be stepped
    /// again once the sink is ready.
    pub(crate) fn step<K>(
        &mut self,
        destination: &mut Destination<K>,
        session: &SessionState,
    ) -> Option<PassOutcome>
    where
        K: MediaSink<Frame = S::Frame>,
    {
        if session.is_cancelled() {
            self.source.cancel_reading();
            return Some(PassOutcome::Cancelled);
        }

        let result = match self.mode {
            Mode::Rewrite { .. } => self.rewrite(destination, session),
            Mode::Resample { .. } => self.resample(destination, session),
        };

        match result {
            Ok(Some(PassOutcome::Finished)) => {
                log::debug!(
                    "Video pass finished: {} frames read, {} written",
                    self.frames_read,
                    self.frames_written
                );
                session.finish(&mut self.progress);
                Some(PassOutcome::Finished)
            }
            Ok(outcome) => outcome,
            Err(error) => {
                if let TimeWarpError::OutOfOrder { .. } = error {
                    session.mark_out_of_order();
                    log::warn!("Video pass stopped: {error}");
                } else {
                    log::warn!("Video pass failed: {error}");
                }
                self.source.cancel_reading();
                Some(PassOutcome::Failed(error))
            }
        }
    }

    fn rewrite<K>(
        &mut self,
        destination: &mut Destination<K>,
        session: &SessionState,
    ) -> Result<Option<PassOutcome>, TimeWarpError>
    where
        K: MediaSink<Frame = S::Frame>,
    {
        let Some(SourceFrame { frame, time }) = self.source.next_frame()? else {
            return Ok(Some(PassOutcome::Finished));
        };
        self.frames_read += 1;

        let scaled = self.map.time_scale(time)?;
        let stamp = MediaTime::from_seconds(scaled, NATURAL_TIMESCALE);
        let Mode::Rewrite { last } = &mut self.mode else {
            return Ok(None);
        };
        // Distinct times can still share a tick once rounded.
        if let Some((previous, previous_ticks)) = *last
            && (scaled <= previous || stamp.value <= previous_ticks)
        {
            return Err(TimeWarpError::OutOfOrder {
                previous,
                current: scaled,
            });
        }

        destination.append_video(&frame, stamp)?;
        *last = Some((scaled, stamp.value));
        self.frames_written += 1;
        session.record_breakpoint(scaled, time);

        self.report(&frame, session);
        Ok(None)
    }

    fn resample<K>(
        &mut self,
        destination: &mut Destination<K>,
        session: &SessionState,
    ) -> Result<Option<PassOutcome>, TimeWarpError>
    where
        K: MediaSink<Frame = S::Frame>,
    {
        let Mode::Resample {
            timescale,
            spacing,
            tick,
            started,
            candidate,
        } = &mut self.mode
        else {
            return Ok(None);
        };

        if !*started {
            *started = true;
            let timescale = *timescale;
            return self.fetch_candidate(timescale, session).map(|_| None);
        }

        let Some(held) = candidate else {
            return Ok(Some(PassOutcome::Finished));
        };

        if *tick <= held.scaled_ticks {
            destination.append_video(&held.frame, MediaTime::new(*tick, *timescale))?;
            *tick += *spacing;
            self.frames_written += 1;
            Ok(None)
        } else {
            let timescale = *timescale;
            self.fetch_candidate(timescale, session).map(|_| None)
        }
    }

    /// Replace the held candidate with the next source frame, or clear it
    /// when the source is exhausted.
    fn fetch_candidate(&mut self, timescale: i32, session: &SessionState) -> Result<(), TimeWarpError> {
        let next = match self.source.next_frame()? {
            Some(SourceFrame { frame, time }) => {
                self.frames_read += 1;
                let scaled = self.map.time_scale(time)?;
                session.record_breakpoint(scaled, time);
                self.report(&frame, session);
                Some(Candidate {
                    frame,
                    scaled_ticks: MediaTime::from_seconds(scaled, timescale).value,
                })
            }
            None => None,
        };

        if let Mode::Resample { candidate, .. } = &mut self.mode {
            *candidate = next;
        }
        Ok(())
    }

    fn report(&mut self, frame: &S::Frame, session: &SessionState) {
        let preview = if session.preview_due() {
            self.source.preview(frame)
        } else {
            None
        };
        let total = self.source.frame_count();
        let fraction = if total > 0 {
            self.frames_read as f64 / total as f64
        } else {
            0.0
        };
        session.advance(&mut self.progress, fraction, preview);
    }
}
