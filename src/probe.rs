//! Lightweight source probing.
//!
//! [`probe`] opens a media file, reads what a retiming run needs to know up
//! front, and closes the demuxer again. [`Retimer`](crate::Retimer) calls it
//! before anything is decoded; the CLI's `plan` subcommand prints it.
//!
//! # Example
//!
//! ```no_run
//! use timewarp::{ScalingKind, TimeWarpError};
//!
//! let info = timewarp::probe("input.mp4")?;
//! println!("{}x{} @ {:.2} fps, {:.1}s", info.width, info.height, info.frames_per_second, info.duration);
//!
//! let scaled = info.scaled_duration(&ScalingKind::DoubleSmoothstep.with(2.0, 0.5))?;
//! println!("Output will run {scaled:.1}s");
//! # Ok::<(), TimeWarpError>(())
//! ```

use std::path::{Path, PathBuf};

use ffmpeg_next::{codec::context::Context as CodecContext, media::Type};

use crate::conversion::{
    is_hdr_transfer, parse_rotation, stream_duration, stream_frame_count, stream_frames_per_second,
};
use crate::error::TimeWarpError;
use crate::scaling::ScalingFunction;
use crate::warp::TimeWarpMap;

/// Audio stream summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioInfo {
    /// Samples per second.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Codec name as reported by FFmpeg.
    pub codec: String,
}

/// What a retiming run needs to know about its source.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    /// Probed file.
    pub path: PathBuf,
    /// Clip duration in seconds.
    pub duration: f64,
    /// Number of video frames, exact when the container records it.
    pub frame_count: u64,
    /// Average video frame rate.
    pub frames_per_second: f64,
    /// Coded width in pixels.
    pub width: u32,
    /// Coded height in pixels.
    pub height: u32,
    /// Whether the transfer characteristic is PQ or HLG.
    pub hdr: bool,
    /// Clockwise display rotation in degrees.
    pub rotation: u32,
    /// The best audio stream, if any.
    pub audio: Option<AudioInfo>,
}

impl SourceInfo {
    /// Output duration in seconds when retimed through `function`.
    pub fn scaled_duration(&self, function: &ScalingFunction) -> Result<f64, TimeWarpError> {
        function.validate()?;
        Ok(TimeWarpMap::from_function(*function, self.duration)?.scaled_duration())
    }
}

/// Probe a media file.
///
/// # Errors
///
/// - [`TimeWarpError::FileOpen`] if the file cannot be opened.
/// - [`TimeWarpError::NoVideoStream`] if it has no video stream.
pub fn probe<P: AsRef<Path>>(path: P) -> Result<SourceInfo, TimeWarpError> {
    let path = path.as_ref();
    log::debug!("Probing {}", path.display());

    ffmpeg_next::init().map_err(|error| TimeWarpError::FileOpen {
        path: path.to_path_buf(),
        reason: format!("FFmpeg initialisation failed: {error}"),
    })?;

    let input = ffmpeg_next::format::input(&path).map_err(|error| TimeWarpError::FileOpen {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;

    let stream = input
        .streams()
        .best(Type::Video)
        .ok_or(TimeWarpError::NoVideoStream)?;

    let decoder = CodecContext::from_parameters(stream.parameters())?
        .decoder()
        .video()
        .map_err(|error| TimeWarpError::VideoDecodeError(error.to_string()))?;

    let duration = stream_duration(&stream, input.duration());

    let frames_per_second = stream_frames_per_second(&stream);
    let frame_count = stream_frame_count(&stream, duration);

    let transfer = format!("{:?}", decoder.color_transfer_characteristic());
    let rotation = parse_rotation(stream.metadata().get("rotate"));

    let audio = match input.streams().best(Type::Audio) {
        Some(audio_stream) => {
            let audio_decoder = CodecContext::from_parameters(audio_stream.parameters())?
                .decoder()
                .audio()
                .map_err(|error| TimeWarpError::AudioDecodeError(error.to_string()))?;
            Some(AudioInfo {
                sample_rate: audio_decoder.rate(),
                channels: audio_decoder.channels(),
                codec: format!("{:?}", audio_decoder.id()),
            })
        }
        None => None,
    };

    let info = SourceInfo {
        path: path.to_path_buf(),
        duration,
        frame_count,
        frames_per_second,
        width: decoder.width(),
        height: decoder.height(),
        hdr: is_hdr_transfer(&transfer),
        rotation,
        audio,
    };
    log::debug!("Probed {info:?}");
    Ok(info)
}

/// Default destination for `source`: `<stem>-scaled.mov` in the same directory.
///
/// ```
/// use std::path::Path;
///
/// let destination = timewarp::default_destination("clips/beach.mp4");
/// assert_eq!(destination, Path::new("clips/beach-scaled.mov"));
/// ```
pub fn default_destination<P: AsRef<Path>>(source: P) -> PathBuf {
    let source = source.as_ref();
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    source.with_file_name(format!("{stem}-scaled.mov"))
}
