//! Retiming configuration.
//!
//! [`RetimeOptions`] is a builder that threads the output frame rate,
//! callbacks, the cancellation token, and encoder settings through a run
//! without widening every signature.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use timewarp::{CancellationToken, FrameRate, ProgressCallback, ProgressInfo, RetimeOptions};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:?}: {:.0}%", info.pass, info.fraction * 100.0);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = RetimeOptions::new()
//!     .with_frame_rate(FrameRate::Fixed(30))
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone())
//!     .with_batch_size(10);
//! ```

use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TimeWarpError;
use crate::progress::{
    CancellationToken, CompletionCallback, NoOpCompletion, NoOpProgress, ProgressCallback,
};

/// Spacing of preview frames when the caller has no preference.
pub const DEFAULT_PREVIEW_INTERVAL: Duration = Duration::from_millis(300);

/// Frame rate of the retimed video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRate {
    /// Keep every source frame and rewrite its timestamp.
    Natural,
    /// Resample to a constant rate in frames per second.
    Fixed(u32),
}

impl Default for FrameRate {
    fn default() -> Self {
        FrameRate::Fixed(60)
    }
}

impl FrameRate {
    /// Frame rate from a number where 0 means natural.
    pub fn from_fps(fps: u32) -> Self {
        if fps == 0 {
            FrameRate::Natural
        } else {
            FrameRate::Fixed(fps)
        }
    }

    /// Frames per second, or `None` for natural.
    pub fn fps(self) -> Option<u32> {
        match self {
            FrameRate::Natural => None,
            FrameRate::Fixed(fps) => Some(fps),
        }
    }
}

impl Display for FrameRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FrameRate::Natural => f.write_str("any"),
            FrameRate::Fixed(fps) => write!(f, "{fps}"),
        }
    }
}

impl FromStr for FrameRate {
    type Err = TimeWarpError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "any" | "natural" => Ok(FrameRate::Natural),
            other => other
                .parse::<u32>()
                .map(FrameRate::from_fps)
                .map_err(|_| TimeWarpError::InvalidParameter(format!("invalid frame rate '{value}'"))),
        }
    }
}

/// Supported output video codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoCodec {
    /// H.264 / AVC.
    #[default]
    H264,
    /// H.265 / HEVC.
    H265,
    /// MPEG-4 Part 2.
    Mpeg4,
}

impl FromStr for VideoCodec {
    type Err = TimeWarpError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "h264" | "avc" => Ok(VideoCodec::H264),
            "h265" | "hevc" => Ok(VideoCodec::H265),
            "mpeg4" => Ok(VideoCodec::Mpeg4),
            _ => Err(TimeWarpError::InvalidParameter(format!("unknown codec '{value}'"))),
        }
    }
}

/// Settings for a retiming run.
///
/// A default-constructed value resamples to 60 fps, reports nothing, and
/// removes the output file when the run does not complete.
#[derive(Clone)]
pub struct RetimeOptions {
    pub(crate) frame_rate: FrameRate,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) completion: Arc<dyn CompletionCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
    /// Report progress every N frames or audio blocks.
    pub(crate) batch_size: u64,
    /// Minimum spacing between preview frames; `None` disables previews.
    pub(crate) preview_interval: Option<Duration>,
    pub(crate) codec: VideoCodec,
    pub(crate) crf: Option<u32>,
    pub(crate) keep_partial_output: bool,
    pub(crate) include_audio: bool,
}

impl Debug for RetimeOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RetimeOptions")
            .field("frame_rate", &self.frame_rate)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .field("preview_interval", &self.preview_interval)
            .field("codec", &self.codec)
            .field("crf", &self.crf)
            .field("keep_partial_output", &self.keep_partial_output)
            .field("include_audio", &self.include_audio)
            .finish()
    }
}

impl Default for RetimeOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl RetimeOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            frame_rate: FrameRate::default(),
            progress: Arc::new(NoOpProgress),
            completion: Arc::new(NoOpCompletion),
            cancellation: None,
            batch_size: 1,
            preview_interval: None,
            codec: VideoCodec::default(),
            crf: Some(23),
            keep_partial_output: false,
            include_audio: true,
        }
    }

    /// Set the output frame rate.
    #[must_use]
    pub fn with_frame_rate(mut self, frame_rate: FrameRate) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a completion callback.
    #[must_use]
    pub fn with_completion(mut self, callback: Arc<dyn CompletionCallback>) -> Self {
        self.completion = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// Cancelling it ends the run with
    /// [`RetimeOutcome::Cancelled`](crate::RetimeOutcome::Cancelled).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires, in units of work.
    ///
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Attach a preview of the current source frame to progress reports,
    /// at most once per `interval`.
    #[must_use]
    pub fn with_preview(mut self, interval: Duration) -> Self {
        self.preview_interval = Some(interval);
        self
    }

    /// Set the output video codec.
    #[must_use]
    pub fn with_codec(mut self, codec: VideoCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Set the constant rate factor (0-51, lower is better).
    #[must_use]
    pub fn with_crf(mut self, crf: u32) -> Self {
        self.crf = Some(crf.min(51));
        self
    }

    /// Keep the destination file when the run is cancelled or fails.
    #[must_use]
    pub fn with_keep_partial_output(mut self, keep: bool) -> Self {
        self.keep_partial_output = keep;
        self
    }

    /// Retime only the video stream.
    #[must_use]
    pub fn without_audio(mut self) -> Self {
        self.include_audio = false;
        self
    }

    /// The configured output frame rate.
    pub fn frame_rate(&self) -> FrameRate {
        self.frame_rate
    }

    /// The configured batch size.
    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }
}
