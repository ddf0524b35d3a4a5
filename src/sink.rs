//! Finalize-once wrapper around a [`MediaSink`].

use crate::error::TimeWarpError;
use crate::media::{MediaSink, MediaTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Open,
    Closed,
    Absent,
}

/// Owns the sink for a run and finalizes it exactly once, as soon as every
/// present stream has been closed.
pub(crate) struct Destination<K: MediaSink> {
    sink: K,
    video: StreamState,
    audio: StreamState,
    finalized: bool,
}

impl<K: MediaSink> Destination<K> {
    pub(crate) fn new(sink: K, has_audio: bool) -> Self {
        Self {
            sink,
            video: StreamState::Open,
            audio: if has_audio {
                StreamState::Open
            } else {
                StreamState::Absent
            },
            finalized: false,
        }
    }

    pub(crate) fn video_ready(&self) -> bool {
        self.video == StreamState::Open && self.sink.video_ready()
    }

    pub(crate) fn audio_ready(&self) -> bool {
        self.audio == StreamState::Open && self.sink.audio_ready()
    }

    pub(crate) fn append_video(&mut self, frame: &K::Frame, time: MediaTime) -> Result<(), TimeWarpError> {
        if self.video != StreamState::Open {
            return Err(TimeWarpError::WriteFailed("video stream is closed".to_string()));
        }
        self.sink.append_video(frame, time)
    }

    pub(crate) fn append_audio(&mut self, samples: &[i16]) -> Result<(), TimeWarpError> {
        if self.audio != StreamState::Open {
            return Err(TimeWarpError::WriteFailed("audio stream is closed".to_string()));
        }
        self.sink.append_audio(samples)
    }

    /// Close the video stream, finalizing if it was the last one open.
    pub(crate) fn close_video(&mut self) -> Result<(), TimeWarpError> {
        let flushed = match self.video {
            StreamState::Open => self.sink.finish_video(),
            _ => Ok(()),
        };
        if self.video == StreamState::Open {
            self.video = StreamState::Closed;
        }
        let finalized = self.finalize_if_done();
        flushed.and(finalized)
    }

    /// Close the audio stream, finalizing if it was the last one open.
    pub(crate) fn close_audio(&mut self) -> Result<(), TimeWarpError> {
        let flushed = match self.audio {
            StreamState::Open => self.sink.finish_audio(),
            _ => Ok(()),
        };
        if self.audio == StreamState::Open {
            self.audio = StreamState::Closed;
        }
        let finalized = self.finalize_if_done();
        flushed.and(finalized)
    }

    pub(crate) fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn finalize_if_done(&mut self) -> Result<(), TimeWarpError> {
        if self.finalized || self.video == StreamState::Open || self.audio == StreamState::Open {
            return Ok(());
        }
        self.finalized = true;
        log::info!("Finalizing destination");
        self.sink.finalize()
    }
}
