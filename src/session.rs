//! State shared by the video and audio passes of one run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use image::DynamicImage;

use crate::configuration::RetimeOptions;
use crate::lut::ScalingLut;
use crate::progress::{CancellationToken, Pass, ProgressCallback, ProgressInfo};

/// Cancellation, progress, the lookup table, and the out-of-order flag.
///
/// Only the video pass writes the table and the flag; the audio pass reads
/// the flag to stop itself.
pub(crate) struct SessionState {
    cancellation: CancellationToken,
    out_of_order: AtomicBool,
    lut: Mutex<ScalingLut>,
    progress: Mutex<Accumulator>,
    callback: Arc<dyn ProgressCallback>,
    batch_size: u64,
    preview_interval: Option<Duration>,
}

struct Accumulator {
    cumulative: f64,
    start: Instant,
    last_preview: Option<Instant>,
}

/// One contributor's share of the cumulative progress.
pub(crate) struct PassProgress {
    pass: Pass,
    share: f64,
    last_fraction: f64,
    units_since_report: u64,
}

impl PassProgress {
    pub(crate) fn new(pass: Pass, share: f64) -> Self {
        Self {
            pass,
            share,
            last_fraction: 0.0,
            units_since_report: 0,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionState {
    pub(crate) fn new(options: &RetimeOptions, cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            out_of_order: AtomicBool::new(false),
            lut: Mutex::new(ScalingLut::new()),
            progress: Mutex::new(Accumulator {
                cumulative: 0.0,
                start: Instant::now(),
                last_preview: None,
            }),
            callback: Arc::clone(&options.progress),
            batch_size: options.batch_size,
            preview_interval: options.preview_interval,
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub(crate) fn mark_out_of_order(&self) {
        self.out_of_order.store(true, Ordering::Release);
    }

    pub(crate) fn is_out_of_order(&self) -> bool {
        self.out_of_order.load(Ordering::Acquire)
    }

    pub(crate) fn record_breakpoint(&self, output: f64, source: f64) {
        lock(&self.lut).push(output, source);
    }

    pub(crate) fn take_lut(&self) -> ScalingLut {
        std::mem::take(&mut *lock(&self.lut))
    }

    /// Cumulative progress so far.
    pub(crate) fn fraction(&self) -> f64 {
        lock(&self.progress).cumulative
    }

    /// Whether a preview should be attached to the next report.
    pub(crate) fn preview_due(&self) -> bool {
        let Some(interval) = self.preview_interval else {
            return false;
        };
        let mut progress = lock(&self.progress);
        let now = Instant::now();
        let due = progress
            .last_preview
            .is_none_or(|last| now.duration_since(last) >= interval);
        if due {
            progress.last_preview = Some(now);
        }
        due
    }

    /// Move `tracker` to `fraction` of its pass and report when a batch is
    /// complete or a preview is attached.
    pub(crate) fn advance(
        &self,
        tracker: &mut PassProgress,
        fraction: f64,
        preview: Option<DynamicImage>,
    ) {
        let fraction = fraction.clamp(0.0, 1.0);
        let cumulative = {
            let mut progress = lock(&self.progress);
            progress.cumulative += (fraction - tracker.last_fraction) * tracker.share;
            progress.cumulative
        };
        tracker.last_fraction = fraction;
        tracker.units_since_report += 1;

        if tracker.units_since_report >= self.batch_size || preview.is_some() {
            tracker.units_since_report = 0;
            self.report(tracker, cumulative, preview);
        }
    }

    /// Complete `tracker`'s share and report unconditionally.
    pub(crate) fn finish(&self, tracker: &mut PassProgress) {
        let cumulative = {
            let mut progress = lock(&self.progress);
            progress.cumulative += (1.0 - tracker.last_fraction) * tracker.share;
            progress.cumulative
        };
        tracker.last_fraction = 1.0;
        tracker.units_since_report = 0;
        self.report(tracker, cumulative, None);
    }

    fn report(&self, tracker: &PassProgress, cumulative: f64, preview: Option<DynamicImage>) {
        let elapsed = lock(&self.progress).start.elapsed();
        let fraction = cumulative.clamp(0.0, 1.0);
        let estimated_remaining = (fraction > 0.0)
            .then(|| elapsed.mul_f64((1.0 - fraction) / fraction));

        let info = ProgressInfo {
            pass: tracker.pass,
            fraction,
            pass_fraction: tracker.last_fraction,
            elapsed,
            estimated_remaining,
            preview,
        };
        self.callback.on_progress(&info);
    }
}
