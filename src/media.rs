//! Boundaries between the retiming engine and its media collaborators.
//!
//! The engine pulls decoded frames from a [`VideoSource`], interleaved
//! 16-bit PCM from an [`AudioSource`], and pushes retimed units into a
//! [`MediaSink`]. The FFmpeg backend implements all three; tests implement
//! them in memory.

use image::DynamicImage;

use crate::error::TimeWarpError;

/// Timescale of rewritten timestamps in natural-rate mode.
pub const NATURAL_TIMESCALE: i32 = 64_000;

/// Base timescale of fixed-rate output ticks.
pub const FIXED_RATE_TIMESCALE: i32 = 600;

/// A presentation time of `value / timescale` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaTime {
    /// Tick count.
    pub value: i64,
    /// Ticks per second.
    pub timescale: i32,
}

impl MediaTime {
    /// Create a time from a tick count.
    pub fn new(value: i64, timescale: i32) -> Self {
        Self { value, timescale }
    }

    /// Round `seconds` to the nearest tick of `timescale`.
    pub fn from_seconds(seconds: f64, timescale: i32) -> Self {
        Self {
            value: (seconds * timescale as f64).round() as i64,
            timescale,
        }
    }

    /// The time in seconds.
    pub fn seconds(&self) -> f64 {
        self.value as f64 / self.timescale as f64
    }

    /// The same instant in another timescale, rounded to the nearest tick.
    pub fn rescale(&self, timescale: i32) -> Self {
        if timescale == self.timescale {
            *self
        } else {
            Self::from_seconds(self.seconds(), timescale)
        }
    }
}

/// A decoded source frame and its presentation time in seconds.
#[derive(Debug, Clone)]
pub struct SourceFrame<F> {
    /// The decoded frame.
    pub frame: F,
    /// Source presentation time, in seconds.
    pub time: f64,
}

/// Decoded video frames in presentation order.
pub trait VideoSource {
    /// Decoded frame type handed to the sink.
    type Frame;

    /// The next frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<SourceFrame<Self::Frame>>, TimeWarpError>;

    /// Expected number of frames, for progress. 0 when unknown.
    fn frame_count(&self) -> u64;

    /// Stop decoding; no further frames will be requested.
    fn cancel_reading(&mut self) {}

    /// Displayable copy of `frame`, with the source orientation applied.
    fn preview(&mut self, _frame: &Self::Frame) -> Option<DynamicImage> {
        None
    }
}

/// Shape of an audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Samples per second.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
    /// Samples per channel in the whole stream.
    pub total_samples: u64,
    /// Samples per channel in a typical decoded block.
    pub block_len: usize,
}

/// Decoded 16-bit interleaved PCM in presentation order.
pub trait AudioSource {
    /// Shape of the stream.
    fn format(&self) -> AudioFormat;

    /// The next interleaved block, or `None` once the stream is exhausted.
    fn next_block(&mut self) -> Result<Option<Vec<i16>>, TimeWarpError>;

    /// Stop decoding; no further blocks will be requested.
    fn cancel_reading(&mut self) {}
}

/// Destination with one video and an optional audio input stream.
///
/// Each stream signals readiness separately. Streams are closed with the
/// `finish_*` methods and [`finalize`](MediaSink::finalize) is called once,
/// after every stream is closed.
pub trait MediaSink {
    /// Frame type accepted by [`append_video`](MediaSink::append_video).
    type Frame;

    /// Whether the video stream can take another frame now.
    fn video_ready(&self) -> bool {
        true
    }

    /// Append `frame` presented at `time`.
    fn append_video(&mut self, frame: &Self::Frame, time: MediaTime) -> Result<(), TimeWarpError>;

    /// Flush and close the video stream.
    fn finish_video(&mut self) -> Result<(), TimeWarpError> {
        Ok(())
    }

    /// Whether the audio stream can take another block now.
    fn audio_ready(&self) -> bool {
        true
    }

    /// Append interleaved PCM following the previous block.
    fn append_audio(&mut self, samples: &[i16]) -> Result<(), TimeWarpError>;

    /// Flush and close the audio stream.
    fn finish_audio(&mut self) -> Result<(), TimeWarpError> {
        Ok(())
    }

    /// Close the container.
    fn finalize(&mut self) -> Result<(), TimeWarpError>;
}
