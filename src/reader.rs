//! FFmpeg-backed sources.
//!
//! [`FfmpegVideoReader`] decodes the best video stream of a file in
//! presentation order. [`FfmpegAudioReader`] decodes the best audio stream
//! to packed 16-bit PCM at its native rate and channel count, after a
//! pre-scan that counts the samples and measures a decoder block.

use std::path::Path;

use ffmpeg_next::codec::context::Context as CodecContext;
use ffmpeg_next::decoder::{Audio as AudioDecoder, Video as VideoDecoder};
use ffmpeg_next::format::{Pixel, Sample, context::Input, sample::Type as SampleType};
use ffmpeg_next::frame::{Audio as AudioFrame, Video as VideoFrame};
use ffmpeg_next::media::Type;
use ffmpeg_next::software::resampling::Context as ResamplingContext;
use ffmpeg_next::software::scaling::{Context as ScalingContext, Flags as ScalingFlags};
use ffmpeg_next::{ChannelLayout, Error as FfmpegError, Packet, Rational};
use image::{DynamicImage, RgbImage};

use crate::conversion::{
    apply_rotation, frame_to_buffer, parse_rotation, pts_to_seconds, stream_duration,
    stream_frame_count,
};
use crate::error::TimeWarpError;
use crate::media::{AudioFormat, AudioSource, SourceFrame, VideoSource};

fn open_input(path: &Path) -> Result<Input, TimeWarpError> {
    ffmpeg_next::init().map_err(|error| TimeWarpError::FileOpen {
        path: path.to_path_buf(),
        reason: format!("FFmpeg initialisation failed: {error}"),
    })?;

    ffmpeg_next::format::input(&path).map_err(|error| TimeWarpError::FileOpen {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })
}

// ── Video ──────────────────────────────────────────────────────────

/// Decodes the best video stream of a file.
pub struct FfmpegVideoReader {
    input: Input,
    decoder: VideoDecoder,
    stream_index: usize,
    time_base: Rational,
    start_pts: i64,
    frame_count: u64,
    rotation: u32,
    preview_scaler: Option<ScalingContext>,
    eof_sent: bool,
    done: bool,
}

impl FfmpegVideoReader {
    /// Open the best video stream of `path`.
    ///
    /// # Errors
    ///
    /// - [`TimeWarpError::FileOpen`] if the file cannot be opened.
    /// - [`TimeWarpError::NoVideoStream`] if it has no video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TimeWarpError> {
        let path = path.as_ref();
        let input = open_input(path)?;

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or(TimeWarpError::NoVideoStream)?;
        let stream_index = stream.index();
        let time_base = stream.time_base();
        let start_pts = stream.start_time().max(0);
        let frame_count = stream_frame_count(&stream, stream_duration(&stream, input.duration()));
        let rotation = parse_rotation(stream.metadata().get("rotate"));

        let decoder = CodecContext::from_parameters(stream.parameters())?
            .decoder()
            .video()
            .map_err(|error| {
                TimeWarpError::VideoDecodeError(format!("Failed to create video decoder: {error}"))
            })?;

        log::debug!(
            "Opened video stream {stream_index}: {}x{}, {frame_count} frames, rotation {rotation}",
            decoder.width(),
            decoder.height()
        );

        Ok(Self {
            input,
            decoder,
            stream_index,
            time_base,
            start_pts,
            frame_count,
            rotation,
            preview_scaler: None,
            eof_sent: false,
            done: false,
        })
    }

    /// Coded frame width.
    pub fn width(&self) -> u32 {
        self.decoder.width()
    }

    /// Coded frame height.
    pub fn height(&self) -> u32 {
        self.decoder.height()
    }

    /// Clockwise display rotation in degrees.
    pub fn rotation(&self) -> u32 {
        self.rotation
    }

    fn render_preview(&mut self, frame: &VideoFrame) -> Result<DynamicImage, TimeWarpError> {
        let (width, height) = (frame.width(), frame.height());
        if self.preview_scaler.is_none() {
            let scaler = ScalingContext::get(
                frame.format(),
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                ScalingFlags::BILINEAR,
            )?;
            self.preview_scaler = Some(scaler);
        }
        let Some(scaler) = self.preview_scaler.as_mut() else {
            return Err(TimeWarpError::VideoDecodeError("no preview scaler".to_string()));
        };

        let mut rgb = VideoFrame::empty();
        scaler.run(frame, &mut rgb)?;
        let image = RgbImage::from_raw(width, height, frame_to_buffer(&rgb, width, height, 3))
            .ok_or_else(|| {
                TimeWarpError::VideoDecodeError("preview buffer size mismatch".to_string())
            })?;
        Ok(apply_rotation(DynamicImage::ImageRgb8(image), self.rotation))
    }
}

impl VideoSource for FfmpegVideoReader {
    type Frame = VideoFrame;

    fn next_frame(&mut self) -> Result<Option<SourceFrame<VideoFrame>>, TimeWarpError> {
        if self.done {
            return Ok(None);
        }

        loop {
            let mut frame = VideoFrame::empty();
            if self.decoder.receive_frame(&mut frame).is_ok() {
                let pts = frame.timestamp().or_else(|| frame.pts()).unwrap_or(0);
                let time = pts_to_seconds(pts - self.start_pts, self.time_base).max(0.0);
                return Ok(Some(SourceFrame { frame, time }));
            }

            if self.eof_sent {
                self.done = true;
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        self.decoder.send_packet(&packet).map_err(|error| {
                            TimeWarpError::VideoDecodeError(error.to_string())
                        })?;
                    }
                }
                Err(FfmpegError::Eof) => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
                Err(_) => {
                    // Non-fatal read error; try the next packet.
                }
            }
        }
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn cancel_reading(&mut self) {
        self.done = true;
    }

    fn preview(&mut self, frame: &VideoFrame) -> Option<DynamicImage> {
        match self.render_preview(frame) {
            Ok(image) => Some(image),
            Err(error) => {
                log::debug!("Preview skipped: {error}");
                None
            }
        }
    }
}

// ── Audio ──────────────────────────────────────────────────────────

/// Decodes the best audio stream of a file to packed 16-bit PCM.
pub struct FfmpegAudioReader {
    input: Input,
    decoder: AudioDecoder,
    resampler: ResamplingContext,
    stream_index: usize,
    format: AudioFormat,
    decoded: AudioFrame,
    eof_sent: bool,
    done: bool,
}

impl FfmpegAudioReader {
    /// Open the best audio stream of `path`, or `Ok(None)` when there is none.
    ///
    /// The stream is decoded once to count its samples before the reader
    /// is handed out.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Option<Self>, TimeWarpError> {
        let path = path.as_ref();
        let Some(mut scan) = Self::open_stream(path)? else {
            log::debug!("No audio stream in {}", path.display());
            return Ok(None);
        };

        let channels = usize::from(scan.format.channels.max(1));
        let mut total_samples = 0u64;
        let mut block_len = 0usize;
        while let Some(block) = scan.pull()? {
            let samples = block.len() / channels;
            if block_len == 0 {
                block_len = samples;
            }
            total_samples += samples as u64;
        }

        let Some(mut reader) = Self::open_stream(path)? else {
            return Ok(None);
        };
        reader.format.total_samples = total_samples;
        reader.format.block_len = block_len;
        log::debug!(
            "Opened audio stream {}: {} Hz, {} channels, {} samples, block length {}",
            reader.stream_index,
            reader.format.sample_rate,
            reader.format.channels,
            total_samples,
            block_len
        );
        Ok(Some(reader))
    }

    fn open_stream(path: &Path) -> Result<Option<Self>, TimeWarpError> {
        let input = open_input(path)?;
        let Some(stream) = input.streams().best(Type::Audio) else {
            return Ok(None);
        };
        let stream_index = stream.index();

        let decoder = CodecContext::from_parameters(stream.parameters())?
            .decoder()
            .audio()
            .map_err(|error| {
                TimeWarpError::AudioDecodeError(format!("Failed to create audio decoder: {error}"))
            })?;

        let sample_rate = decoder.rate();
        let channels = decoder.channels();
        let mut layout = decoder.channel_layout();
        if layout.is_empty() {
            layout = ChannelLayout::default(i32::from(channels));
        }

        let resampler = ResamplingContext::get(
            decoder.format(),
            layout,
            sample_rate,
            Sample::I16(SampleType::Packed),
            layout,
            sample_rate,
        )
        .map_err(|error| {
            TimeWarpError::AudioDecodeError(format!("Failed to create resampler: {error}"))
        })?;

        Ok(Some(Self {
            input,
            decoder,
            resampler,
            stream_index,
            format: AudioFormat {
                sample_rate,
                channels,
                total_samples: 0,
                block_len: 0,
            },
            decoded: AudioFrame::empty(),
            eof_sent: false,
            done: false,
        }))
    }

    fn pull(&mut self) -> Result<Option<Vec<i16>>, TimeWarpError> {
        if self.done {
            return Ok(None);
        }

        loop {
            if self.decoder.receive_frame(&mut self.decoded).is_ok() {
                let mut resampled = AudioFrame::empty();
                self.resampler
                    .run(&self.decoded, &mut resampled)
                    .map_err(|error| {
                        TimeWarpError::AudioDecodeError(format!("Resample error: {error}"))
                    })?;
                return Ok(Some(packed_samples(&resampled, self.format.channels)));
            }

            if self.eof_sent {
                self.done = true;
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        self.decoder.send_packet(&packet).map_err(|error| {
                            TimeWarpError::AudioDecodeError(error.to_string())
                        })?;
                    }
                }
                Err(FfmpegError::Eof) => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
                Err(_) => {}
            }
        }
    }
}

impl AudioSource for FfmpegAudioReader {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn next_block(&mut self) -> Result<Option<Vec<i16>>, TimeWarpError> {
        self.pull()
    }

    fn cancel_reading(&mut self) {
        self.done = true;
    }
}

/// Interleaved samples of a packed `s16` frame.
fn packed_samples(frame: &AudioFrame, channels: u16) -> Vec<i16> {
    let bytes = frame.data(0);
    let length = (frame.samples() * usize::from(channels) * 2).min(bytes.len());
    bytes[..length]
        .chunks_exact(2)
        .map(|pair| i16::from_ne_bytes([pair[0], pair[1]]))
        .collect()
}
