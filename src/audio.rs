//! Variable-rate audio resampling.
//!
//! Output sample `k` is the source signal at the fractional source index
//! whose scaled time is `k / sample_rate`. [`ControlBlocks`] walks the
//! source one sample at a time, maps each index through the warp, and
//! emits a "control" for every output tick that falls between two
//! consecutive scaled source times. [`ChannelBuffers`] keeps just enough
//! decoded PCM around to interpolate the current block of controls.
//!
//! # Example
//!
//! ```
//! use timewarp::audio::interpolate;
//!
//! let samples = [0, 10, 20, 30];
//! assert_eq!(interpolate(&samples, &[0.0, 1.5, 3.0]), vec![0, 15, 30]);
//! ```

use std::collections::VecDeque;

#[cfg(feature = "rayon")]
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::error::TimeWarpError;
use crate::media::{AudioFormat, AudioSource, MediaSink};
use crate::progress::Pass;
use crate::session::{PassProgress, SessionState};
use crate::sink::Destination;
use crate::video::PassOutcome;
use crate::warp::TimeWarpMap;

/// Compaction waits until at least this many samples per channel are dead.
const COMPACT_THRESHOLD: usize = 1 << 14;

// ── Controls ───────────────────────────────────────────────────────

/// Incremental generator of fractional source indices, one block at a time.
///
/// Controls computed past the end of a block are kept for the next one, so
/// the full sequence is never held in memory.
#[derive(Debug, Clone)]
pub struct ControlBlocks {
    sample_rate: f64,
    total_samples: u64,
    block_len: usize,
    source_index: u64,
    output_index: u64,
    last_scaled: f64,
    pending: VecDeque<f64>,
}

impl ControlBlocks {
    /// Create a generator for a stream of `format`.
    ///
    /// Fails when the sample rate, sample count, channel count, or block
    /// length is zero.
    pub fn new(format: &AudioFormat) -> Result<Self, TimeWarpError> {
        if format.sample_rate == 0
            || format.total_samples == 0
            || format.channels == 0
            || format.block_len == 0
        {
            return Err(TimeWarpError::InvalidAudioFormat {
                sample_rate: format.sample_rate,
                total_samples: format.total_samples,
                channels: format.channels,
                block_len: format.block_len,
            });
        }

        Ok(Self {
            sample_rate: f64::from(format.sample_rate),
            total_samples: format.total_samples,
            block_len: format.block_len,
            source_index: 0,
            output_index: 0,
            last_scaled: 0.0,
            pending: VecDeque::with_capacity(format.block_len),
        })
    }

    /// The next block of up to `block_len` controls, or `None` once every
    /// source sample has been mapped and no control is left.
    ///
    /// `is_cancelled` is polled once per source sample.
    pub fn next_block(
        &mut self,
        map: &TimeWarpMap,
        is_cancelled: impl Fn() -> bool,
    ) -> Result<Option<Vec<f64>>, TimeWarpError> {
        while self.pending.len() < self.block_len && self.source_index < self.total_samples {
            if is_cancelled() {
                return Err(TimeWarpError::Cancelled);
            }
            self.advance(map)?;
        }

        if self.pending.is_empty() {
            return Ok(None);
        }
        let take = self.pending.len().min(self.block_len);
        Ok(Some(self.pending.drain(..take).collect()))
    }

    /// Fraction of source samples mapped so far.
    pub fn progress(&self) -> f64 {
        self.source_index as f64 / self.total_samples as f64
    }

    /// Map the next source sample and queue every output tick it covers.
    fn advance(&mut self, map: &TimeWarpMap) -> Result<(), TimeWarpError> {
        self.source_index += 1;
        let scaled = map.time_scale(self.source_index as f64 / self.sample_rate)?;

        if scaled > self.last_scaled {
            let base = (self.source_index - 1) as f64;
            loop {
                let tick = self.output_index as f64 / self.sample_rate;
                if tick < self.last_scaled || tick >= scaled {
                    break;
                }
                let fraction = (tick - self.last_scaled) / (scaled - self.last_scaled);
                self.pending.push_back(base + fraction);
                self.output_index += 1;
            }
        }

        self.last_scaled = scaled;
        Ok(())
    }
}

// ── Rolling sample buffers ─────────────────────────────────────────

/// Per-channel decoded samples addressed by absolute source index.
///
/// Released samples stay in place behind a consumed-through cursor until
/// they make up most of the buffer, then are dropped in one move.
#[derive(Debug, Clone)]
pub struct ChannelBuffers {
    channels: Vec<Vec<i16>>,
    origin: u64,
    consumed: usize,
}

impl ChannelBuffers {
    /// Create empty buffers for `channels` channels.
    pub fn new(channels: usize) -> Self {
        Self {
            channels: vec![Vec::new(); channels.max(1)],
            origin: 0,
            consumed: 0,
        }
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Absolute index one past the last decoded sample.
    pub fn end(&self) -> u64 {
        self.origin + self.channels[0].len() as u64
    }

    /// Samples per channel physically held, including released ones.
    pub fn held(&self) -> usize {
        self.channels[0].len()
    }

    /// Split interleaved PCM across the channels.
    ///
    /// A trailing partial frame is dropped.
    pub fn push_interleaved(&mut self, samples: &[i16]) {
        let count = self.channels.len();
        for frame in samples.chunks_exact(count) {
            for (channel, &sample) in self.channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
    }

    /// Mark every sample before absolute index `index` as no longer needed.
    pub fn release_before(&mut self, index: u64) {
        let relative = index.saturating_sub(self.origin).min(self.held() as u64) as usize;
        self.consumed = self.consumed.max(relative);

        if self.consumed >= COMPACT_THRESHOLD && self.consumed * 2 >= self.held() {
            for channel in &mut self.channels {
                channel.drain(..self.consumed);
            }
            self.origin += self.consumed as u64;
            self.consumed = 0;
        }
    }

    /// Interpolate every channel at `controls`.
    pub fn interpolate(&self, controls: &[f64]) -> Vec<Vec<i16>> {
        let origin = self.origin;

        #[cfg(feature = "rayon")]
        {
            self.channels
                .par_iter()
                .map(|channel| interpolate_from(channel, origin, controls))
                .collect()
        }

        #[cfg(not(feature = "rayon"))]
        {
            self.channels
                .iter()
                .map(|channel| interpolate_from(channel, origin, controls))
                .collect()
        }
    }
}

// ── Interpolation ──────────────────────────────────────────────────

/// Linearly interpolate `samples` at fractional indices `controls`.
///
/// Indices past the end read as silence. Results are rounded to the nearest
/// integer, ties to even, and saturate at the `i16` range.
pub fn interpolate(samples: &[i16], controls: &[f64]) -> Vec<i16> {
    interpolate_from(samples, 0, controls)
}

/// [`interpolate`] where `samples[0]` sits at absolute index `origin`.
fn interpolate_from(samples: &[i16], origin: u64, controls: &[f64]) -> Vec<i16> {
    let at = |index: u64| -> f64 {
        index
            .checked_sub(origin)
            .and_then(|relative| samples.get(relative as usize))
            .map_or(0.0, |&sample| f64::from(sample))
    };

    controls
        .iter()
        .map(|&control| {
            let control = control.max(0.0);
            let index = control.floor();
            let fraction = control - index;
            let index = index as u64;
            let low = at(index);
            let value = if fraction == 0.0 {
                low
            } else {
                low + fraction * (at(index + 1) - low)
            };
            value
                .round_ties_even()
                .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
        })
        .collect()
}

/// Interleave equal-length channels into one PCM block.
pub fn interleave(channels: &[Vec<i16>]) -> Vec<i16> {
    let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
    let mut interleaved = Vec::with_capacity(frames * channels.len());
    for frame in 0..frames {
        interleaved.extend(channels.iter().map(|channel| channel[frame]));
    }
    interleaved
}

// ── Pass ───────────────────────────────────────────────────────────

/// Streams one audio track through the warp.
pub(crate) struct AudioPass {
    source: Box<dyn AudioSource>,
    format: AudioFormat,
    map: TimeWarpMap,
    controls: ControlBlocks,
    buffers: ChannelBuffers,
    current: Option<Vec<f64>>,
    controls_done: bool,
    decoded: u64,
    samples_written: u64,
    decode_progress: PassProgress,
    control_progress: PassProgress,
}

impl AudioPass {
    /// `share` is split evenly between decoding and control generation.
    pub(crate) fn new(
        source: Box<dyn AudioSource>,
        map: TimeWarpMap,
        share: f64,
    ) -> Result<Self, TimeWarpError> {
        let format = source.format();
        let controls = ControlBlocks::new(&format)?;
        log::debug!(
            "Audio pass: {} Hz, {} channels, {} samples, block length {}",
            format.sample_rate,
            format.channels,
            format.total_samples,
            format.block_len
        );

        Ok(Self {
            buffers: ChannelBuffers::new(usize::from(format.channels)),
            source,
            format,
            map,
            controls,
            current: None,
            controls_done: false,
            decoded: 0,
            samples_written: 0,
            decode_progress: PassProgress::new(Pass::Audio, share / 2.0),
            control_progress: PassProgress::new(Pass::Audio, share / 2.0),
        })
    }

    /// Samples per channel appended to the sink so far.
    pub(crate) fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Process one decoded block. `None` means the pass should be stepped
    /// again once the sink is ready.
    pub(crate) fn step<K: MediaSink>(
        &mut self,
        destination: &mut Destination<K>,
        session: &SessionState,
    ) -> Option<PassOutcome> {
        if session.is_cancelled() {
            self.source.cancel_reading();
            return Some(PassOutcome::Cancelled);
        }
        if session.is_out_of_order() {
            self.source.cancel_reading();
            return Some(PassOutcome::Aborted);
        }

        match self.try_step(destination, session) {
            Ok(Some(PassOutcome::Finished)) => {
                log::debug!(
                    "Audio pass finished: {} samples decoded, {} written",
                    self.decoded,
                    self.samples_written
                );
                session.finish(&mut self.decode_progress);
                session.finish(&mut self.control_progress);
                Some(PassOutcome::Finished)
            }
            Ok(outcome) => outcome,
            Err(TimeWarpError::Cancelled) => {
                self.source.cancel_reading();
                Some(PassOutcome::Cancelled)
            }
            Err(error) => {
                log::warn!("Audio pass failed: {error}");
                self.source.cancel_reading();
                Some(PassOutcome::Failed(error))
            }
        }
    }

    fn try_step<K: MediaSink>(
        &mut self,
        destination: &mut Destination<K>,
        session: &SessionState,
    ) -> Result<Option<PassOutcome>, TimeWarpError> {
        let Some(block) = self.source.next_block()? else {
            let samples = self.drain(session, true)?;
            self.write(destination, &samples)?;
            return Ok(Some(PassOutcome::Finished));
        };

        let channels = usize::from(self.format.channels);
        self.decoded += (block.len() / channels) as u64;
        self.buffers.push_interleaved(&block);

        let samples = self.drain(session, false)?;
        self.write(destination, &samples)?;

        let fraction = self.decoded as f64 / self.format.total_samples as f64;
        session.advance(&mut self.decode_progress, fraction, None);

        if self.controls_done && self.current.is_none() {
            self.source.cancel_reading();
            return Ok(Some(PassOutcome::Finished));
        }
        Ok(None)
    }

    fn write<K: MediaSink>(
        &mut self,
        destination: &mut Destination<K>,
        samples: &[i16],
    ) -> Result<(), TimeWarpError> {
        if samples.is_empty() {
            return Ok(());
        }
        destination.append_audio(samples)?;
        self.samples_written += (samples.len() / usize::from(self.format.channels)) as u64;
        Ok(())
    }

    /// Interpolate every control block whose samples are decoded. With
    /// `flush`, missing samples read as silence and every block is drained.
    fn drain(&mut self, session: &SessionState, flush: bool) -> Result<Vec<i16>, TimeWarpError> {
        let mut output = Vec::new();
        loop {
            if self.current.is_none() && !self.controls_done {
                match self.controls.next_block(&self.map, || session.is_cancelled())? {
                    Some(block) => self.current = Some(block),
                    None => self.controls_done = true,
                }
                session.advance(&mut self.control_progress, self.controls.progress(), None);
            }

            let Some(block) = &self.current else {
                break;
            };
            let last = block.last().copied().unwrap_or(0.0).max(0.0).floor() as u64;
            if !flush && last + 1 >= self.buffers.end() {
                break;
            }

            output.extend(interleave(&self.buffers.interpolate(block)));
            self.current = None;
            self.buffers.release_before(last);
        }
        Ok(output)
    }
}
