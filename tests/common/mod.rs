//! In-memory media used by the engine tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use image::DynamicImage;
use timewarp::{
    AudioFormat, AudioSource, CancellationToken, MediaSink, MediaTime, SourceFrame,
    TimeWarpError, VideoSource,
};

/// Frames identified by index, presented at the given times.
pub struct MockVideo {
    frames: VecDeque<(u32, f64)>,
    frame_count: u64,
    cancel_after: Option<(usize, CancellationToken)>,
    delivered: usize,
    previews: bool,
    pub cancelled_reading: Arc<Mutex<bool>>,
}

impl MockVideo {
    pub fn new(times: &[f64]) -> Self {
        Self {
            frames: times
                .iter()
                .enumerate()
                .map(|(index, &time)| (index as u32, time))
                .collect(),
            frame_count: times.len() as u64,
            cancel_after: None,
            delivered: 0,
            previews: false,
            cancelled_reading: Arc::new(Mutex::new(false)),
        }
    }

    /// Frames every `1/fps` seconds for `count` frames.
    pub fn at_rate(fps: f64, count: usize) -> Self {
        let times: Vec<f64> = (0..count).map(|index| index as f64 / fps).collect();
        Self::new(&times)
    }

    /// Cancel `token` once `count` frames have been handed out.
    pub fn cancel_after(mut self, count: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((count, token));
        self
    }

    /// Answer preview requests with a tiny image.
    pub fn with_previews(mut self) -> Self {
        self.previews = true;
        self
    }
}

impl VideoSource for MockVideo {
    type Frame = u32;

    fn next_frame(&mut self) -> Result<Option<SourceFrame<u32>>, TimeWarpError> {
        if let Some((count, token)) = &self.cancel_after
            && self.delivered >= *count
        {
            token.cancel();
        }
        let next = self.frames.pop_front();
        if next.is_some() {
            self.delivered += 1;
        }
        Ok(next.map(|(frame, time)| SourceFrame { frame, time }))
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn cancel_reading(&mut self) {
        if let Ok(mut flag) = self.cancelled_reading.lock() {
            *flag = true;
        }
    }

    fn preview(&mut self, _frame: &u32) -> Option<DynamicImage> {
        self.previews.then(|| DynamicImage::new_rgb8(2, 2))
    }
}

/// Interleaved PCM handed out in fixed-size blocks.
pub struct MockAudio {
    format: AudioFormat,
    blocks: VecDeque<Vec<i16>>,
}

impl MockAudio {
    /// Split `samples` (interleaved across `channels`) into blocks of
    /// `block_len` samples per channel.
    pub fn new(samples: &[i16], channels: u16, sample_rate: u32, block_len: usize) -> Self {
        let stride = block_len * usize::from(channels);
        Self {
            format: AudioFormat {
                sample_rate,
                channels,
                total_samples: (samples.len() / usize::from(channels)) as u64,
                block_len,
            },
            blocks: samples.chunks(stride).map(<[i16]>::to_vec).collect(),
        }
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    pub fn boxed(self) -> Box<dyn AudioSource> {
        Box::new(self)
    }
}

impl AudioSource for MockAudio {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn next_block(&mut self) -> Result<Option<Vec<i16>>, TimeWarpError> {
        Ok(self.blocks.pop_front())
    }
}

/// One unit appended to a [`RecordingSink`], in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Video(u32),
    /// Interleaved sample count of one audio block.
    Audio(usize),
}

/// When a [`RecordingSink`] stream reports itself ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Always,
    /// Ready on every second poll, starting with the second.
    EveryOther,
    Never,
}

impl Readiness {
    fn answer(self, poll: usize) -> bool {
        match self {
            Readiness::Always => true,
            Readiness::EveryOther => poll % 2 == 0,
            Readiness::Never => false,
        }
    }
}

/// Everything a [`RecordingSink`] received.
#[derive(Debug, Default)]
pub struct Recording {
    pub video: Vec<(u32, MediaTime)>,
    pub audio: Vec<i16>,
    pub units: Vec<Unit>,
    pub video_finished: bool,
    pub audio_finished: bool,
    pub finalize_calls: usize,
    pub video_polls: usize,
    pub audio_polls: usize,
    /// Set when a unit arrived without a fresh ready answer for its stream.
    pub appended_while_busy: bool,
    video_granted: bool,
    audio_granted: bool,
}

/// Sink that records into a shared [`Recording`].
pub struct RecordingSink {
    recording: Arc<Mutex<Recording>>,
    fail_video_after: Option<usize>,
    video_readiness: Readiness,
    audio_readiness: Readiness,
}

impl RecordingSink {
    pub fn new() -> (Self, Arc<Mutex<Recording>>) {
        let recording = Arc::new(Mutex::new(Recording::default()));
        (
            Self {
                recording: Arc::clone(&recording),
                fail_video_after: None,
                video_readiness: Readiness::Always,
                audio_readiness: Readiness::Always,
            },
            recording,
        )
    }

    /// Reject every video frame after the first `count`.
    pub fn fail_video_after(mut self, count: usize) -> Self {
        self.fail_video_after = Some(count);
        self
    }

    pub fn with_video_readiness(mut self, readiness: Readiness) -> Self {
        self.video_readiness = readiness;
        self
    }

    pub fn with_audio_readiness(mut self, readiness: Readiness) -> Self {
        self.audio_readiness = readiness;
        self
    }
}

impl MediaSink for RecordingSink {
    type Frame = u32;

    fn video_ready(&self) -> bool {
        let mut recording = self.recording.lock().unwrap();
        recording.video_polls += 1;
        let ready = self.video_readiness.answer(recording.video_polls);
        recording.video_granted = ready;
        ready
    }

    fn append_video(&mut self, frame: &u32, time: MediaTime) -> Result<(), TimeWarpError> {
        let mut recording = self.recording.lock().unwrap();
        if !std::mem::take(&mut recording.video_granted) {
            recording.appended_while_busy = true;
        }
        if let Some(limit) = self.fail_video_after
            && recording.video.len() >= limit
        {
            return Err(TimeWarpError::VideoEncodeError("encoder rejected frame".to_string()));
        }
        recording.video.push((*frame, time));
        recording.units.push(Unit::Video(*frame));
        Ok(())
    }

    fn finish_video(&mut self) -> Result<(), TimeWarpError> {
        self.recording.lock().unwrap().video_finished = true;
        Ok(())
    }

    fn audio_ready(&self) -> bool {
        let mut recording = self.recording.lock().unwrap();
        recording.audio_polls += 1;
        let ready = self.audio_readiness.answer(recording.audio_polls);
        recording.audio_granted = ready;
        ready
    }

    fn append_audio(&mut self, samples: &[i16]) -> Result<(), TimeWarpError> {
        let mut recording = self.recording.lock().unwrap();
        if !std::mem::take(&mut recording.audio_granted) {
            recording.appended_while_busy = true;
        }
        recording.audio.extend_from_slice(samples);
        recording.units.push(Unit::Audio(samples.len()));
        Ok(())
    }

    fn finish_audio(&mut self) -> Result<(), TimeWarpError> {
        self.recording.lock().unwrap().audio_finished = true;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), TimeWarpError> {
        self.recording.lock().unwrap().finalize_calls += 1;
        Ok(())
    }
}
