//! # timewarp
//!
//! Retime video and audio through an integrable time-scaling function.
//!
//! A [`ScalingFunction`] gives the playback rate at each point of a clip.
//! Its running integral becomes a [`TimeWarpMap`] from source time to
//! output time, and the engine streams every frame and every audio sample
//! through that map: video either keeps each source frame with a rewritten
//! timestamp or is resampled to a fixed frame rate, and audio is
//! variable-rate resampled by linear interpolation so it stays in sync.
//!
//! ## Quick Start
//!
//! ```no_run
//! use timewarp::{FrameRate, RetimeOptions, Retimer, ScalingKind};
//!
//! let report = Retimer::new("input.mp4", "output.mov", ScalingKind::DoubleSmoothstep.with(2.0, 0.5))
//!     .with_options(RetimeOptions::new().with_frame_rate(FrameRate::Fixed(30)))
//!     .run()
//!     .unwrap();
//! println!("{:?}, {} breakpoints", report.outcome, report.lut.len());
//! ```
//!
//! ### Planning without decoding
//!
//! ```
//! use timewarp::{ScalingKind, TimeWarpMap};
//!
//! let map = TimeWarpMap::from_function(ScalingKind::Constant.with(2.0, 0.5), 10.0)?;
//! assert_eq!(map.scaled_duration(), 20.0);
//! # Ok::<(), timewarp::TimeWarpError>(())
//! ```
//!
//! ### In-memory media
//!
//! [`retime`] runs against any [`VideoSource`], [`AudioSource`], and
//! [`MediaSink`], so the engine can be driven without FFmpeg.
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ffmpeg` | FFmpeg reader and writer, [`Retimer`], and the `timewarp` binary (default) |
//! | `async` | `RetimeFuture` and `retime_file_async` via Tokio |
//! | `rayon` | Interpolates audio channels in parallel |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! The `ffmpeg` feature needs the FFmpeg development libraries installed on
//! the system.

pub mod audio;
pub mod configuration;
#[cfg(feature = "ffmpeg")]
mod conversion;
pub mod error;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod lut;
pub mod media;
#[cfg(feature = "ffmpeg")]
pub mod probe;
pub mod progress;
pub mod quadrature;
#[cfg(feature = "ffmpeg")]
pub mod reader;
pub mod retimer;
pub mod scaling;
mod session;
mod sink;
#[cfg(feature = "async")]
pub mod stream;
#[cfg(feature = "ffmpeg")]
pub mod timewarp;
pub mod unit;
pub mod video;
pub mod warp;
#[cfg(feature = "ffmpeg")]
pub mod writer;

pub use audio::{ChannelBuffers, ControlBlocks};
pub use configuration::{DEFAULT_PREVIEW_INTERVAL, FrameRate, RetimeOptions, VideoCodec};
pub use error::{ErrorKind, SETTINGS_HINT, TimeWarpError};
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use lut::{LutPoint, ScalingLut};
pub use media::{
    AudioFormat, AudioSource, FIXED_RATE_TIMESCALE, MediaSink, MediaTime, NATURAL_TIMESCALE,
    SourceFrame, VideoSource,
};
#[cfg(feature = "ffmpeg")]
pub use probe::{AudioInfo, SourceInfo, default_destination, probe};
pub use progress::{CancellationToken, CompletionCallback, Pass, ProgressCallback, ProgressInfo};
pub use quadrature::{PanelTable, Quadrature};
#[cfg(feature = "ffmpeg")]
pub use reader::{FfmpegAudioReader, FfmpegVideoReader};
pub use retimer::{RetimeOutcome, RetimeReport, retime};
pub use scaling::{
    DEFAULT_FACTOR, DEFAULT_MODIFIER, FACTOR_RANGE, MODIFIER_RANGE, ScalingFunction,
    ScalingIntegrator, ScalingKind, Shape,
};
#[cfg(feature = "async")]
pub use stream::{RetimeFuture, retime_file_async};
#[cfg(feature = "ffmpeg")]
pub use timewarp::{RetimePlan, Retimer, retime_file};
pub use unit::sample_on;
pub use video::video_timescale;
pub use warp::{AntiDerivative, Integrand, Integrator, TimeWarpMap, format_duration};
#[cfg(feature = "ffmpeg")]
pub use writer::FfmpegWriter;
