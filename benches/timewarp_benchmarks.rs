//! Benchmarks for integration, control generation, and retiming.
//!
//! Run with: cargo bench
//! Run with all features: cargo bench --all-features
//!
//! The file benchmark requires fixture files from
//! `tests/fixtures/generate_fixtures.sh`.

use std::{hint::black_box, path::Path};

use criterion::Criterion;
use timewarp::{
    AudioFormat, ChannelBuffers, ControlBlocks, FfmpegLogLevel, FrameRate, RetimeOptions,
    Retimer, ScalingKind, TimeWarpMap,
};

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

fn benchmark_integration(criterion: &mut Criterion) {
    for kind in [ScalingKind::DoubleSmoothstep, ScalingKind::TaperedCosine] {
        let integrator = kind.with(2.0, 0.5).integrator();
        criterion.bench_function(&format!("integrate {kind} (100 points)"), |bencher| {
            bencher.iter(|| {
                for step in 0..100 {
                    black_box(integrator.integrate(step as f64 / 100.0).unwrap());
                }
            });
        });
    }
}

fn benchmark_controls(criterion: &mut Criterion) {
    let map = TimeWarpMap::from_function(ScalingKind::DoubleSmoothstep.with(2.0, 0.5), 1.0).unwrap();
    let format = AudioFormat {
        sample_rate: 44_100,
        channels: 2,
        total_samples: 44_100,
        block_len: 1024,
    };

    criterion.bench_function("controls for 1s of 44.1 kHz audio", |bencher| {
        bencher.iter(|| {
            let mut controls = ControlBlocks::new(&format).unwrap();
            let mut total = 0;
            while let Some(block) = controls.next_block(&map, || false).unwrap() {
                total += block.len();
            }
            black_box(total)
        });
    });
}

fn benchmark_interpolation(criterion: &mut Criterion) {
    let mut buffers = ChannelBuffers::new(2);
    let interleaved: Vec<i16> = (0..8192_i32)
        .flat_map(|index| {
            let sample = (index % 2000 - 1000) as i16;
            [sample, -sample]
        })
        .collect();
    buffers.push_interleaved(&interleaved);
    let controls: Vec<f64> = (0..4096).map(|index| index as f64 * 1.7).collect();

    criterion.bench_function("interpolate 4096 stereo controls", |bencher| {
        bencher.iter(|| black_box(buffers.interpolate(&controls)));
    });
}

fn benchmark_file_retime(criterion: &mut Criterion) {
    timewarp::set_ffmpeg_log_level(FfmpegLogLevel::Error);

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }

    let directory = tempfile::tempdir().unwrap();
    let destination = directory.path().join("bench.mov");
    let mut group = criterion.benchmark_group("file");
    group.sample_size(10);
    group.bench_function("retime sample video at 30 fps", |bencher| {
        bencher.iter(|| {
            Retimer::new(SAMPLE_VIDEO, &destination, ScalingKind::Triangle.with(2.0, 0.5))
                .with_options(RetimeOptions::new().with_frame_rate(FrameRate::Fixed(30)))
                .run()
                .unwrap()
        });
    });
    group.finish();
}

criterion::criterion_group!(
    benches,
    benchmark_integration,
    benchmark_controls,
    benchmark_interpolation,
    benchmark_file_retime,
);
criterion::criterion_main!(benches);
