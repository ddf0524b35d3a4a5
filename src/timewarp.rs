//! File-to-file retiming.
//!
//! [`Retimer`] ties the engine to FFmpeg: it probes the source, builds the
//! [`TimeWarpMap`] from the chosen scaling function, opens the readers and
//! the writer, runs [`retime`], and cleans up after a run that did not
//! complete.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audio::ControlBlocks;
use crate::configuration::{FrameRate, RetimeOptions};
use crate::error::TimeWarpError;
use crate::media::{AudioSource, VideoSource};
use crate::probe::{SourceInfo, probe};
use crate::progress::CancellationToken;
use crate::reader::{FfmpegAudioReader, FfmpegVideoReader};
use crate::retimer::{RetimeReport, retime};
use crate::scaling::ScalingFunction;
use crate::warp::{Integrator, TimeWarpMap};
use crate::writer::FfmpegWriter;

/// What a run would produce, computed without decoding anything.
#[derive(Debug, Clone)]
pub struct RetimePlan {
    /// Probed source.
    pub source: SourceInfo,
    /// Map the run would use.
    pub map: TimeWarpMap,
    /// Output frame rate.
    pub frame_rate: FrameRate,
}

impl RetimePlan {
    /// Expected output duration in seconds.
    pub fn scaled_duration(&self) -> f64 {
        self.map.scaled_duration()
    }

    /// Expected number of output frames.
    pub fn expected_frames(&self) -> u64 {
        match self.frame_rate {
            FrameRate::Natural => self.source.frame_count,
            FrameRate::Fixed(fps) => (self.scaled_duration() * f64::from(fps)).ceil() as u64,
        }
    }
}

/// Retimes one media file into another.
///
/// # Example
///
/// ```no_run
/// use timewarp::{FrameRate, RetimeOptions, Retimer, ScalingKind, TimeWarpError};
///
/// let report = Retimer::new("input.mp4", "output.mov", ScalingKind::DoubleSmoothstep.with(2.0, 0.5))
///     .with_options(RetimeOptions::new().with_frame_rate(FrameRate::Fixed(30)))
///     .run()?;
/// if let Some(message) = report.outcome.message() {
///     eprintln!("{message}");
/// }
/// # Ok::<(), TimeWarpError>(())
/// ```
pub struct Retimer {
    source: PathBuf,
    destination: PathBuf,
    function: ScalingFunction,
    integrator: Option<Arc<dyn Integrator>>,
    options: RetimeOptions,
    cancellation: CancellationToken,
}

impl Debug for Retimer {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Retimer")
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("function", &self.function)
            .field("custom_integrator", &self.integrator.is_some())
            .field("options", &self.options)
            .finish()
    }
}

impl Retimer {
    /// Prepare a run from `source` to `destination` through `function`.
    pub fn new<S, D>(source: S, destination: D, function: ScalingFunction) -> Self
    where
        S: AsRef<Path>,
        D: AsRef<Path>,
    {
        let cancellation = CancellationToken::new();
        Self {
            source: source.as_ref().to_path_buf(),
            destination: destination.as_ref().to_path_buf(),
            function,
            integrator: None,
            options: RetimeOptions::new().with_cancellation(cancellation.clone()),
            cancellation,
        }
    }

    /// Replace the run settings.
    ///
    /// A token carried by `options` replaces the retimer's own.
    #[must_use]
    pub fn with_options(mut self, options: RetimeOptions) -> Self {
        if let Some(token) = &options.cancellation {
            self.cancellation = token.clone();
        }
        self.options = options.with_cancellation(self.cancellation.clone());
        self
    }

    /// Integrate through `integrator` instead of the scaling function.
    #[must_use]
    pub fn with_integrator(mut self, integrator: Arc<dyn Integrator>) -> Self {
        self.integrator = Some(integrator);
        self
    }

    /// A token that cancels this run from any thread.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Source path.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Destination path.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Probe the source and build the map without decoding.
    pub fn plan(&self) -> Result<RetimePlan, TimeWarpError> {
        self.function.validate()?;
        let source = probe(&self.source)?;
        let integrator = match &self.integrator {
            Some(integrator) => Arc::clone(integrator),
            None => Arc::new(self.function.integrator()),
        };
        let map = TimeWarpMap::new(integrator, source.duration)?;
        Ok(RetimePlan {
            source,
            map,
            frame_rate: self.options.frame_rate,
        })
    }

    /// Run to completion on the calling thread.
    ///
    /// Cancellation, out-of-order timestamps, and pass failures are
    /// reported through the returned [`RetimeReport`]; only problems found
    /// before streaming begins are returned as errors. The completion
    /// callback fires exactly once either way.
    pub fn run(&self) -> Result<RetimeReport, TimeWarpError> {
        match self.execute() {
            Ok(report) => {
                report.notify(self.options.completion.as_ref());
                Ok(report)
            }
            Err(error) => {
                log::warn!("Retiming setup failed: {error}");
                self.options
                    .completion
                    .on_complete(None, Some(&error.user_message()));
                Err(error)
            }
        }
    }

    fn execute(&self) -> Result<RetimeReport, TimeWarpError> {
        if self.source == self.destination {
            return Err(TimeWarpError::InvalidParameter(
                "destination must differ from the source".to_string(),
            ));
        }

        let plan = self.plan()?;
        log::info!(
            "Retiming {} -> {} ({}, {} fps, {:.3}s -> {:.3}s)",
            self.source.display(),
            self.destination.display(),
            self.function.kind(),
            self.options.frame_rate,
            plan.source.duration,
            plan.scaled_duration()
        );
        if plan.source.hdr {
            log::info!("HDR source; output is encoded as 8-bit YUV420P");
        }

        let video = FfmpegVideoReader::open(&self.source)?;
        let audio = if self.options.include_audio {
            FfmpegAudioReader::open(&self.source)?
        } else {
            None
        };
        let audio_format = audio.as_ref().map(AudioSource::format);
        if let Some(format) = &audio_format {
            ControlBlocks::new(format)?;
        }
        log::debug!("Video source: {} frames expected", video.frame_count());

        let writer = FfmpegWriter::create(
            &self.destination,
            video.width(),
            video.height(),
            &self.options,
            audio_format.as_ref(),
        )?;

        let audio = audio.map(|reader| Box::new(reader) as Box<dyn AudioSource>);
        let report = retime(video, audio, writer, &plan.map, &self.options);

        if !report.outcome.is_success() && !self.options.keep_partial_output {
            match std::fs::remove_file(&self.destination) {
                Ok(()) => log::debug!("Removed partial output {}", self.destination.display()),
                Err(error) => log::warn!(
                    "Could not remove partial output {}: {error}",
                    self.destination.display()
                ),
            }
        }

        Ok(report.with_destination(&self.destination))
    }
}

/// Retime `source` into `destination` with `options`.
///
/// Shorthand for [`Retimer::new`] followed by [`Retimer::run`].
pub fn retime_file<S, D>(
    source: S,
    destination: D,
    function: ScalingFunction,
    options: RetimeOptions,
) -> Result<RetimeReport, TimeWarpError>
where
    S: AsRef<Path>,
    D: AsRef<Path>,
{
    Retimer::new(source, destination, function)
        .with_options(options)
        .run()
}
