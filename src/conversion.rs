//! Internal FFmpeg conversion helpers.
//!
//! Pixel-data copying, timestamp rescaling, and orientation handling shared
//! by the reader, the writer, and [`probe`](crate::probe).

use ffmpeg_next::format::stream::Stream;
use ffmpeg_next::{Rational, frame::Video as VideoFrame};
use image::DynamicImage;

/// Copy pixel data from an FFmpeg video frame into a tightly-packed buffer.
///
/// `bytes_per_pixel` is the number of bytes per pixel for the output format
/// (3 for RGB24).
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Rescale a PTS value from stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Frames per second of a rational rate, or 0 when the rate is unset.
pub(crate) fn rational_to_fps(rate: Rational) -> f64 {
    if rate.denominator() != 0 && rate.numerator() > 0 {
        rate.numerator() as f64 / rate.denominator() as f64
    } else {
        0.0
    }
}

/// Average frame rate of a stream, falling back to its base rate.
pub(crate) fn stream_frames_per_second(stream: &Stream<'_>) -> f64 {
    let average = rational_to_fps(stream.avg_frame_rate());
    if average > 0.0 {
        average
    } else {
        rational_to_fps(stream.rate())
    }
}

/// Stream duration in seconds, falling back to the container duration in
/// microseconds.
pub(crate) fn stream_duration(stream: &Stream<'_>, container_micros: i64) -> f64 {
    if stream.duration() > 0 {
        pts_to_seconds(stream.duration(), stream.time_base())
    } else if container_micros > 0 {
        container_micros as f64 / 1_000_000.0
    } else {
        0.0
    }
}

/// Recorded frame count of a stream, or an estimate from its duration.
pub(crate) fn stream_frame_count(stream: &Stream<'_>, duration: f64) -> u64 {
    if stream.frames() > 0 {
        stream.frames() as u64
    } else {
        (duration * stream_frames_per_second(stream)).round() as u64
    }
}

/// Normalize a `rotate` tag to one of 0, 90, 180, or 270 degrees.
pub(crate) fn parse_rotation(tag: Option<&str>) -> u32 {
    let degrees = tag
        .and_then(|value| value.trim().parse::<f64>().ok())
        .unwrap_or(0.0);
    let quarter_turns = (degrees / 90.0).round() as i64;
    (quarter_turns.rem_euclid(4) * 90) as u32
}

/// Apply a clockwise display rotation to a decoded image.
pub(crate) fn apply_rotation(image: DynamicImage, rotation: u32) -> DynamicImage {
    match rotation {
        90 => image.rotate90(),
        180 => image.rotate180(),
        270 => image.rotate270(),
        _ => image,
    }
}

/// Whether a transfer characteristic name denotes an HDR curve.
pub(crate) fn is_hdr_transfer(name: &str) -> bool {
    let name = name.to_ascii_uppercase();
    name.contains("SMPTE2084") || name.contains("ARIB_STD_B67") || name.contains("HLG")
}
