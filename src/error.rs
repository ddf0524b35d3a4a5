//! Error types for the `timewarp` crate.
//!
//! [`TimeWarpError`] is the single error type returned by every fallible
//! operation. Each variant belongs to one class of the failure taxonomy,
//! exposed through [`TimeWarpError::kind`], so callers can tell a rejected
//! parameter from a non-monotonic warp or a sink failure without matching
//! on every variant.

use std::{io::Error as IoError, path::PathBuf};

#[cfg(feature = "ffmpeg")]
use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// Suggestion appended to user-facing failure messages.
pub const SETTINGS_HINT: &str = "Try different settings (factor, modifier, frame rate)";

/// Broad failure classes a retiming run can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Source, parameters, or encoder settings were rejected before streaming began.
    Setup,
    /// Numeric integration of the scaling function did not converge.
    Integration,
    /// The scaled video timeline stopped increasing.
    OutOfOrder,
    /// The run was cancelled by the caller.
    Cancelled,
    /// A decoder failed while streaming.
    Decode,
    /// The destination rejected an append or could not be finalized.
    Write,
}

/// The unified error type for all `timewarp` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TimeWarpError {
    /// The source media file could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed in.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The destination file could not be created.
    #[error("Failed to create output file at {path}: {reason}")]
    OutputCreate {
        /// Destination path.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// The source does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A scaling or session parameter is outside its accepted range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The warp does not map the clip onto a usable output duration.
    #[error("Invalid time warp: integral at 1 is {integral}")]
    InvalidWarp {
        /// Value of the integral over the full normalized domain.
        integral: f64,
    },

    /// The audio stream cannot drive control-block generation.
    #[error(
        "Invalid audio format: sample rate {sample_rate}, {total_samples} samples, \
         {channels} channels, block length {block_len}"
    )]
    InvalidAudioFormat {
        /// Samples per second.
        sample_rate: u32,
        /// Total samples per channel.
        total_samples: u64,
        /// Channel count.
        channels: u16,
        /// Natural decoder block length, in samples per channel.
        block_len: usize,
    },

    /// Quadrature failed to reach the requested tolerance.
    #[error("Integration to {upper_bound} did not converge (estimated error {estimated_error:e})")]
    IntegrationFailed {
        /// Upper bound of the definite integral.
        upper_bound: f64,
        /// Error estimate at the last refinement level.
        estimated_error: f64,
    },

    /// A scaled video timestamp did not increase.
    #[error("Out of order presentation times: {current:.6}s follows {previous:.6}s")]
    OutOfOrder {
        /// Previously emitted scaled time, in seconds.
        previous: f64,
        /// Offending scaled time, in seconds.
        current: f64,
    },

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// Audio data could not be decoded.
    #[error("Failed to decode audio: {0}")]
    AudioDecodeError(String),

    /// A video frame could not be encoded or appended.
    #[error("Video encoding error: {0}")]
    VideoEncodeError(String),

    /// An audio block could not be encoded or appended.
    #[error("Audio encoding error: {0}")]
    AudioEncodeError(String),

    /// The destination rejected a write or could not be finalized.
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while building a preview.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl TimeWarpError {
    /// The taxonomy class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TimeWarpError::FileOpen { .. }
            | TimeWarpError::OutputCreate { .. }
            | TimeWarpError::NoVideoStream
            | TimeWarpError::InvalidParameter(_)
            | TimeWarpError::InvalidWarp { .. }
            | TimeWarpError::InvalidAudioFormat { .. } => ErrorKind::Setup,
            TimeWarpError::IntegrationFailed { .. } => ErrorKind::Integration,
            TimeWarpError::OutOfOrder { .. } => ErrorKind::OutOfOrder,
            TimeWarpError::Cancelled => ErrorKind::Cancelled,
            TimeWarpError::VideoDecodeError(_)
            | TimeWarpError::AudioDecodeError(_)
            | TimeWarpError::FfmpegError(_) => ErrorKind::Decode,
            TimeWarpError::VideoEncodeError(_)
            | TimeWarpError::AudioEncodeError(_)
            | TimeWarpError::WriteFailed(_)
            | TimeWarpError::IoError(_)
            | TimeWarpError::ImageError(_) => ErrorKind::Write,
        }
    }

    /// Message shown to the person who picked the settings.
    pub fn user_message(&self) -> String {
        format!("{self}\n{SETTINGS_HINT}")
    }
}

#[cfg(feature = "ffmpeg")]
impl From<FfmpegError> for TimeWarpError {
    fn from(error: FfmpegError) -> Self {
        TimeWarpError::FfmpegError(error.to_string())
    }
}
