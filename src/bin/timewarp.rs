use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use image::DynamicImage;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use timewarp::{
    DEFAULT_FACTOR, DEFAULT_MODIFIER, DEFAULT_PREVIEW_INTERVAL, FfmpegLogLevel, FrameRate,
    ProgressCallback, ProgressInfo, RetimeOptions, RetimeOutcome, Retimer, ScalingFunction,
    ScalingKind, VideoCodec, format_duration,
};

const CLI_AFTER_HELP: &str = "Examples:\n  timewarp retime input.mp4 --kind triangle --factor 2 --fps 30 --progress\n  timewarp plan input.mp4 --kind cosine --factor 1.5 --modifier 0.25\n  timewarp plot --kind double-smoothstep --samples 21 --json\n  timewarp completions zsh > _timewarp";

/// Progress reports per unit of work between bar updates.
const PROGRESS_BATCH: u64 = 8;

/// Resolution of the progress bar.
const PROGRESS_STEPS: u64 = 1000;

#[derive(Debug, Parser)]
#[command(
    name = "timewarp",
    version,
    about = "Speed-ramp video and audio with smooth time-scaling curves",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional output.
    #[arg(long, global = true)]
    verbose: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,
}

#[derive(Debug, Args, Clone)]
struct ScalingArgs {
    /// Scaling curve (constant, triangle, double-smoothstep, cosine, tapered-cosine, power).
    #[arg(long, default_value = "double-smoothstep")]
    kind: String,

    /// Peak rate multiplier, 0.1 to 4.
    #[arg(long, default_value_t = DEFAULT_FACTOR)]
    factor: f64,

    /// Shape parameter, 0.1 to 1.
    #[arg(long, default_value_t = DEFAULT_MODIFIER)]
    modifier: f64,
}

impl ScalingArgs {
    fn function(&self) -> Result<ScalingFunction, Box<dyn std::error::Error>> {
        let kind: ScalingKind = self.kind.parse()?;
        let function = kind.with(self.factor, self.modifier);
        function.validate()?;
        Ok(function)
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Retime a media file.
    #[command(
        about = "Retime video and audio through a scaling curve",
        after_help = "Examples:\n  timewarp retime input.mp4\n  timewarp retime input.mp4 --out slow.mov --kind triangle --factor 0.5 --fps any\n  timewarp retime input.mp4 --lut lut.json --preview last.png --progress"
    )]
    Retime {
        /// Input media path.
        input: PathBuf,

        /// Output path. Defaults to `<stem>-scaled.mov` next to the input.
        #[arg(long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        scaling: ScalingArgs,

        /// Output frame rate, or `any` to keep every source frame.
        #[arg(long, default_value = "60")]
        fps: String,

        /// Video codec (h264, h265, mpeg4).
        #[arg(long, default_value = "h264")]
        codec: String,

        /// Constant rate factor, 0-51 (lower is better).
        #[arg(long, default_value_t = 23)]
        crf: u32,

        /// Keep the output file when the run does not complete.
        #[arg(long)]
        keep_partial: bool,

        /// Retime video only.
        #[arg(long)]
        no_audio: bool,

        /// Write the output-to-source lookup table as JSON.
        #[arg(long)]
        lut: Option<PathBuf>,

        /// Save the last preview frame as an image.
        #[arg(long)]
        preview: Option<PathBuf>,

        /// Show a progress bar.
        #[arg(long)]
        progress: bool,
    },

    /// Print what a retime would produce without decoding.
    #[command(about = "Print the expected output duration")]
    Plan {
        /// Input media path.
        input: PathBuf,

        #[command(flatten)]
        scaling: ScalingArgs,

        /// Output frame rate, or `any`.
        #[arg(long, default_value = "60")]
        fps: String,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Sample a scaling curve and its integral.
    #[command(about = "Print the rate curve and its integral")]
    Plot {
        #[command(flatten)]
        scaling: ScalingArgs,

        /// Number of evenly spaced samples on [0, 1].
        #[arg(long, default_value_t = 11)]
        samples: usize,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed: FfmpegLogLevel = level
            .parse()
            .map_err(|_| format!("unsupported --log-level: {level}"))?;
        timewarp::set_ffmpeg_log_level(parsed);
    }
    Ok(())
}

/// Drives an optional progress bar and remembers the latest preview.
struct TerminalProgress {
    bar: Option<ProgressBar>,
    preview: Mutex<Option<DynamicImage>>,
}

impl TerminalProgress {
    fn new(show_bar: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let bar = if show_bar {
            let bar = ProgressBar::new(PROGRESS_STEPS);
            let style = ProgressStyle::with_template(
                "{spinner:.green} {bar:40.cyan/blue} {percent:>3}% {msg}",
            )?;
            bar.set_style(style.progress_chars("##-"));
            Some(bar)
        } else {
            None
        };
        Ok(Self {
            bar,
            preview: Mutex::new(None),
        })
    }

    fn finish(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message.to_string());
        }
    }

    fn take_preview(&self) -> Option<DynamicImage> {
        self.preview.lock().ok().and_then(|mut preview| preview.take())
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(bar) = &self.bar {
            bar.set_position((info.fraction * PROGRESS_STEPS as f64) as u64);
            let remaining = info
                .estimated_remaining
                .map(|eta| format!("{:?}, {} left", info.pass, format_duration(eta)))
                .unwrap_or_else(|| format!("{:?}", info.pass));
            bar.set_message(remaining);
        }
        if let Some(image) = &info.preview
            && let Ok(mut preview) = self.preview.lock()
        {
            *preview = Some(image.clone());
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Retime {
            input,
            out,
            scaling,
            fps,
            codec,
            crf,
            keep_partial,
            no_audio,
            lut,
            preview,
            progress,
        } => {
            let function = scaling.function()?;
            let frame_rate: FrameRate = fps.parse()?;
            let codec: VideoCodec = codec.parse()?;
            let destination = out.unwrap_or_else(|| timewarp::default_destination(&input));
            ensure_writable_path(&destination, cli.global.overwrite)?;
            if let Some(path) = &lut {
                ensure_writable_path(path, cli.global.overwrite)?;
            }

            let terminal = Arc::new(TerminalProgress::new(progress)?);
            let mut options = RetimeOptions::new()
                .with_frame_rate(frame_rate)
                .with_codec(codec)
                .with_crf(crf)
                .with_keep_partial_output(keep_partial)
                .with_batch_size(PROGRESS_BATCH)
                .with_progress(terminal.clone());
            if no_audio {
                options = options.without_audio();
            }
            if preview.is_some() {
                options = options.with_preview(DEFAULT_PREVIEW_INTERVAL);
            }

            if cli.global.verbose {
                eprintln!(
                    "retiming {} -> {} ({}, factor {}, modifier {}, {} fps)",
                    input.display(),
                    destination.display(),
                    function.kind(),
                    function.factor(),
                    function.modifier(),
                    frame_rate
                );
            }

            let report = Retimer::new(&input, &destination, function)
                .with_options(options)
                .run()?;
            terminal.finish(if report.outcome.is_success() { "done" } else { "stopped" });

            if cli.global.verbose {
                eprintln!(
                    "{} frame(s), {} audio sample(s), {} LUT point(s)",
                    report.frames_written,
                    report.samples_written,
                    report.lut.len()
                );
            }

            if let Some(path) = &lut
                && !report.lut.is_empty()
            {
                fs::write(path, serde_json::to_string_pretty(&report.lut.to_json())?)?;
                println!("{} {}", "saved".green().bold(), path.display());
            }
            if let (Some(path), Some(image)) = (&preview, terminal.take_preview()) {
                image.save(path)?;
                println!("{} {}", "saved".green().bold(), path.display());
            }

            match &report.outcome {
                RetimeOutcome::Completed => println!(
                    "{} {}",
                    "success:".green().bold(),
                    format!(
                        "Retimed {} to {} ({} frames)",
                        input.display(),
                        destination.display(),
                        report.frames_written
                    )
                    .green()
                ),
                RetimeOutcome::Cancelled => return Err("retiming was cancelled".into()),
                outcome => {
                    return Err(outcome
                        .message()
                        .unwrap_or_else(|| "retiming failed".to_string())
                        .into());
                }
            }
        }
        Commands::Plan {
            input,
            scaling,
            fps,
            json,
        } => {
            let function = scaling.function()?;
            let frame_rate: FrameRate = fps.parse()?;
            let destination = timewarp::default_destination(&input);
            let plan = Retimer::new(&input, &destination, function)
                .with_options(RetimeOptions::new().with_frame_rate(frame_rate))
                .plan()?;
            let source = &plan.source;

            if json {
                let payload = json!({
                    "input": input.display().to_string(),
                    "destination": destination.display().to_string(),
                    "kind": function.kind().to_string(),
                    "factor": function.factor(),
                    "modifier": function.modifier(),
                    "frame_rate": frame_rate.to_string(),
                    "duration_seconds": source.duration,
                    "scaled_duration_seconds": plan.scaled_duration(),
                    "scale_factor": plan.map.scale_factor(),
                    "expected_frames": plan.expected_frames(),
                    "video": {
                        "width": source.width,
                        "height": source.height,
                        "fps": source.frames_per_second,
                        "frame_count": source.frame_count,
                        "hdr": source.hdr,
                        "rotation": source.rotation,
                    },
                    "audio": source.audio.as_ref().map(|audio| json!({
                        "sample_rate": audio.sample_rate,
                        "channels": audio.channels,
                        "codec": audio.codec,
                    })),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Input: {}", input.display());
                println!(
                    "Video: {}x{} @ {:.3} fps, {} frames{}",
                    source.width,
                    source.height,
                    source.frames_per_second,
                    source.frame_count,
                    if source.hdr { ", HDR" } else { "" }
                );
                if let Some(audio) = &source.audio {
                    println!("Audio: {} Hz, {} channel(s), {}", audio.sample_rate, audio.channels, audio.codec);
                }
                println!(
                    "Curve: {} (factor {}, modifier {})",
                    function.kind(),
                    function.factor(),
                    function.modifier()
                );
                println!(
                    "Duration: {} -> {} (x{:.3})",
                    format_duration(Duration::from_secs_f64(source.duration)),
                    format_duration(Duration::from_secs_f64(plan.scaled_duration())),
                    plan.map.scale_factor()
                );
                println!("Output frames: {} at {frame_rate} fps", plan.expected_frames());
            }
        }
        Commands::Plot {
            scaling,
            samples,
            json,
        } => {
            let function = scaling.function()?;
            let points = plot_points(&function, samples)?;

            if json {
                let payload = json!({
                    "kind": function.kind().to_string(),
                    "factor": function.factor(),
                    "modifier": function.modifier(),
                    "points": points
                        .iter()
                        .map(|(t, rate, integral)| json!({ "t": t, "rate": rate, "integral": integral }))
                        .collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("{:>8} {:>10} {:>10}", "t", "rate", "integral");
                for (t, rate, integral) in points {
                    println!("{t:>8.4} {rate:>10.5} {integral:>10.5}");
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "timewarp", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// `(t, rate, integral)` at `samples` evenly spaced points of [0, 1].
fn plot_points(
    function: &ScalingFunction,
    samples: usize,
) -> Result<Vec<(f64, f64, f64)>, Box<dyn std::error::Error>> {
    let integrator = function.integrator();
    timewarp::sample_on(|t| function.evaluate(t), 0.0..=1.0, samples.max(2))
        .into_iter()
        .map(|(t, rate)| Ok((t, rate, integrator.integrate(t)?)))
        .collect()
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
