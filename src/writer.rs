//! FFmpeg-backed destination.
//!
//! [`FfmpegWriter`] muxes one encoded video stream and an optional PCM
//! audio stream into a single container whose format follows the file
//! extension. Video frames are converted to YUV420P at the source size
//! and stamped in the run's video timescale; audio blocks are stamped by
//! sample count.

use std::path::{Path, PathBuf};

use ffmpeg_next::codec::Id;
use ffmpeg_next::codec::context::Context as CodecContext;
use ffmpeg_next::encoder::{Audio as AudioEncoder, Encoder, Video as VideoEncoder};
use ffmpeg_next::format::{Flags as FormatFlags, Pixel, Sample, context::Output, sample::Type as SampleType};
use ffmpeg_next::frame::{Audio as AudioFrame, Video as VideoFrame};
use ffmpeg_next::software::scaling::{Context as ScalingContext, Flags as ScalingFlags};
use ffmpeg_next::{ChannelLayout, Dictionary, Packet, Rational};

use crate::configuration::{FrameRate, RetimeOptions, VideoCodec};
use crate::error::TimeWarpError;
use crate::media::{AudioFormat, MediaSink, MediaTime};
use crate::video::video_timescale;

impl VideoCodec {
    fn to_codec_id(self) -> Id {
        match self {
            VideoCodec::H264 => Id::H264,
            VideoCodec::H265 => Id::HEVC,
            VideoCodec::Mpeg4 => Id::MPEG4,
        }
    }

    fn supports_crf(self) -> bool {
        matches!(self, VideoCodec::H264 | VideoCodec::H265)
    }
}

struct VideoTrack {
    encoder: VideoEncoder,
    stream_index: usize,
    time_base: Rational,
    timescale: i32,
    width: u32,
    height: u32,
    scaler: Option<(Pixel, u32, u32, ScalingContext)>,
}

struct AudioTrack {
    encoder: AudioEncoder,
    stream_index: usize,
    time_base: Rational,
    layout: ChannelLayout,
    sample_rate: u32,
    channels: usize,
    samples_written: i64,
}

/// Encodes retimed frames and PCM into a container file.
pub struct FfmpegWriter {
    output: Output,
    path: PathBuf,
    video: VideoTrack,
    audio: Option<AudioTrack>,
}

impl FfmpegWriter {
    /// Create `path` with a `width`×`height` video stream and, when `audio`
    /// is given, a PCM stream of that rate and channel count.
    ///
    /// # Errors
    ///
    /// - [`TimeWarpError::OutputCreate`] if the container cannot be created.
    /// - [`TimeWarpError::VideoEncodeError`] or
    ///   [`TimeWarpError::AudioEncodeError`] if an encoder cannot be opened.
    pub fn create<P: AsRef<Path>>(
        path: P,
        width: u32,
        height: u32,
        options: &RetimeOptions,
        audio: Option<&AudioFormat>,
    ) -> Result<Self, TimeWarpError> {
        let path = path.as_ref();
        log::info!(
            "Creating {} ({width}x{height}, codec={:?}, frame rate {})",
            path.display(),
            options.codec,
            options.frame_rate
        );

        ffmpeg_next::init()?;
        let output_error = |reason: String| TimeWarpError::OutputCreate {
            path: path.to_path_buf(),
            reason,
        };

        let mut output = ffmpeg_next::format::output(&path)
            .map_err(|error| output_error(format!("cannot open output: {error}")))?;
        let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

        let video = Self::add_video(&mut output, width, height, options, needs_global_header)?;
        let audio = match audio {
            Some(format) => Some(Self::add_audio(&mut output, format)?),
            None => None,
        };

        output
            .write_header()
            .map_err(|error| output_error(format!("cannot write header: {error}")))?;

        Ok(Self {
            output,
            path: path.to_path_buf(),
            video,
            audio,
        })
    }

    /// Destination path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn add_video(
        output: &mut Output,
        width: u32,
        height: u32,
        options: &RetimeOptions,
        needs_global_header: bool,
    ) -> Result<VideoTrack, TimeWarpError> {
        let codec_id = options.codec.to_codec_id();
        let codec = ffmpeg_next::encoder::find(codec_id).ok_or_else(|| {
            TimeWarpError::VideoEncodeError(format!("codec {codec_id:?} not available"))
        })?;

        let mut stream = output
            .add_stream(codec)
            .map_err(|error| TimeWarpError::WriteFailed(format!("cannot add video stream: {error}")))?;
        let stream_index = stream.index();

        let mut encoder = CodecContext::from_parameters(stream.parameters())
            .map_err(|error| {
                TimeWarpError::VideoEncodeError(format!("cannot create codec context: {error}"))
            })?
            .encoder()
            .video()
            .map_err(|error| {
                TimeWarpError::VideoEncodeError(format!("cannot create video encoder: {error}"))
            })?;

        let timescale = video_timescale(options.frame_rate);
        let time_base = Rational::new(1, timescale);
        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(time_base);
        if let FrameRate::Fixed(fps) = options.frame_rate {
            encoder.set_frame_rate(Some(Rational::new(fps as i32, 1)));
        }
        stream.set_time_base(time_base);

        if needs_global_header {
            unsafe {
                (*encoder.as_mut_ptr()).flags |=
                    ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
            }
        }

        let mut settings = Dictionary::new();
        if let Some(crf) = options.crf.filter(|_| options.codec.supports_crf()) {
            settings.set("crf", &crf.to_string());
        }

        let encoder = encoder.open_as_with(codec, settings).map_err(|error| {
            TimeWarpError::VideoEncodeError(format!("cannot open encoder: {error}"))
        })?;
        stream.set_parameters(&encoder);

        Ok(VideoTrack {
            encoder,
            stream_index,
            time_base,
            timescale,
            width,
            height,
            scaler: None,
        })
    }

    fn add_audio(output: &mut Output, format: &AudioFormat) -> Result<AudioTrack, TimeWarpError> {
        let codec = ffmpeg_next::encoder::find(Id::PCM_S16LE).ok_or_else(|| {
            TimeWarpError::AudioEncodeError("PCM s16le encoder not available".to_string())
        })?;

        let mut stream = output
            .add_stream(codec)
            .map_err(|error| TimeWarpError::WriteFailed(format!("cannot add audio stream: {error}")))?;
        let stream_index = stream.index();

        let layout = ChannelLayout::default(i32::from(format.channels));
        let time_base = Rational(1, format.sample_rate as i32);

        let mut encoder = CodecContext::new()
            .encoder()
            .audio()
            .map_err(|error| TimeWarpError::AudioEncodeError(error.to_string()))?;
        encoder.set_rate(format.sample_rate as i32);
        encoder.set_channel_layout(layout);
        encoder.set_format(Sample::I16(SampleType::Packed));
        encoder.set_time_base(time_base);
        stream.set_time_base(time_base);

        let encoder = encoder
            .open_as(codec)
            .map_err(|error| TimeWarpError::AudioEncodeError(error.to_string()))?;
        stream.set_parameters(&encoder);

        Ok(AudioTrack {
            encoder,
            stream_index,
            time_base,
            layout,
            sample_rate: format.sample_rate,
            channels: usize::from(format.channels.max(1)),
            samples_written: 0,
        })
    }

    /// Convert `frame` to the encoder's pixel format and size.
    fn convert(&mut self, frame: &VideoFrame) -> Result<VideoFrame, TimeWarpError> {
        let track = &mut self.video;
        let key = (frame.format(), frame.width(), frame.height());
        let stale = track
            .scaler
            .as_ref()
            .is_none_or(|(format, width, height, _)| (*format, *width, *height) != key);
        if stale {
            let scaler = ScalingContext::get(
                key.0,
                key.1,
                key.2,
                Pixel::YUV420P,
                track.width,
                track.height,
                ScalingFlags::BILINEAR,
            )
            .map_err(|error| TimeWarpError::VideoEncodeError(format!("cannot create scaler: {error}")))?;
            track.scaler = Some((key.0, key.1, key.2, scaler));
        }

        let mut converted = VideoFrame::empty();
        if let Some((_, _, _, scaler)) = track.scaler.as_mut() {
            scaler.run(frame, &mut converted).map_err(|error| {
                TimeWarpError::VideoEncodeError(format!("scaling failed: {error}"))
            })?;
        }
        Ok(converted)
    }
}

/// Move every packet the encoder has ready into the container.
fn write_packets(
    encoder: &mut Encoder,
    output: &mut Output,
    stream_index: usize,
    time_base: Rational,
) -> Result<(), TimeWarpError> {
    let stream_time_base = output
        .stream(stream_index)
        .map_or(time_base, |stream| stream.time_base());

    let mut packet = Packet::empty();
    while encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(stream_index);
        packet.rescale_ts(time_base, stream_time_base);
        packet
            .write_interleaved(output)
            .map_err(|error| TimeWarpError::WriteFailed(format!("write packet failed: {error}")))?;
    }
    Ok(())
}

impl MediaSink for FfmpegWriter {
    type Frame = VideoFrame;

    fn append_video(&mut self, frame: &VideoFrame, time: MediaTime) -> Result<(), TimeWarpError> {
        let mut converted = self.convert(frame)?;
        let track = &mut self.video;
        converted.set_pts(Some(time.rescale(track.timescale).value));

        track
            .encoder
            .send_frame(&converted)
            .map_err(|error| TimeWarpError::VideoEncodeError(format!("send_frame failed: {error}")))?;
        write_packets(&mut track.encoder, &mut self.output, track.stream_index, track.time_base)
    }

    fn finish_video(&mut self) -> Result<(), TimeWarpError> {
        let track = &mut self.video;
        track
            .encoder
            .send_eof()
            .map_err(|error| TimeWarpError::VideoEncodeError(format!("send_eof failed: {error}")))?;
        write_packets(&mut track.encoder, &mut self.output, track.stream_index, track.time_base)
    }

    fn append_audio(&mut self, samples: &[i16]) -> Result<(), TimeWarpError> {
        let Some(track) = self.audio.as_mut() else {
            return Err(TimeWarpError::WriteFailed("no audio stream in destination".to_string()));
        };

        let count = samples.len() / track.channels;
        if count == 0 {
            return Ok(());
        }

        let mut frame = AudioFrame::new(Sample::I16(SampleType::Packed), count, track.layout);
        frame.set_rate(track.sample_rate);
        frame.set_pts(Some(track.samples_written));
        for (bytes, sample) in frame.data_mut(0).chunks_exact_mut(2).zip(samples) {
            bytes.copy_from_slice(&sample.to_ne_bytes());
        }
        track.samples_written += count as i64;

        track
            .encoder
            .send_frame(&frame)
            .map_err(|error| TimeWarpError::AudioEncodeError(error.to_string()))?;
        write_packets(&mut track.encoder, &mut self.output, track.stream_index, track.time_base)
    }

    fn finish_audio(&mut self) -> Result<(), TimeWarpError> {
        let Some(track) = self.audio.as_mut() else {
            return Ok(());
        };
        track
            .encoder
            .send_eof()
            .map_err(|error| TimeWarpError::AudioEncodeError(error.to_string()))?;
        write_packets(&mut track.encoder, &mut self.output, track.stream_index, track.time_base)
    }

    fn finalize(&mut self) -> Result<(), TimeWarpError> {
        log::debug!("Writing trailer to {}", self.path.display());
        self.output
            .write_trailer()
            .map_err(|error| TimeWarpError::WriteFailed(format!("cannot write trailer: {error}")))
    }
}
