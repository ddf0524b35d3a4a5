//! Progress reporting, completion, and cancellation.
//!
//! A retiming run reports a single cumulative fraction across its passes
//! through [`ProgressCallback`], announces its end once through
//! [`CompletionCallback`], and stops cooperatively when its
//! [`CancellationToken`] is cancelled.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use timewarp::{
//!     CancellationToken, ProgressCallback, ProgressInfo, RetimeOptions, Retimer,
//!     ScalingKind, TimeWarpError,
//! };
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("[{:?}] {:.1}% complete", info.pass, info.fraction * 100.0);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = RetimeOptions::new()
//!     .with_progress(Arc::new(PrintProgress))
//!     .with_cancellation(token.clone());
//!
//! let report = Retimer::new("input.mp4", "output.mov", ScalingKind::Triangle.with(2.0, 0.5))
//!     .with_options(options)
//!     .run()?;
//! # Ok::<(), TimeWarpError>(())
//! ```

use std::path::Path;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use image::DynamicImage;

/// Which pass produced a progress report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Pass {
    /// Retiming video frames.
    Video,
    /// Resampling audio.
    Audio,
}

/// A snapshot of run progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Pass that triggered this report.
    pub pass: Pass,
    /// Cumulative progress of the whole run, `0.0..=1.0`.
    pub fraction: f64,
    /// Progress of the reporting pass alone, `0.0..=1.0`.
    pub pass_fraction: f64,
    /// Wall-clock time since the run started.
    pub elapsed: Duration,
    /// Estimated time remaining, from throughput so far.
    pub estimated_remaining: Option<Duration>,
    /// Current source frame, when a preview was due.
    pub preview: Option<DynamicImage>,
}

/// Receives progress updates while a run streams.
///
/// Implementations must be [`Send`] and [`Sync`]; the run may execute on
/// a worker thread. Callbacks observe but cannot halt the run; use a
/// [`CancellationToken`] for that.
pub trait ProgressCallback: Send + Sync {
    /// Called every [`batch_size`](crate::RetimeOptions::with_batch_size)
    /// units of work, and whenever a preview frame is attached.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Receives the single terminal notification of a run.
pub trait CompletionCallback: Send + Sync {
    /// `destination` is set on success. `message` is set on failure and
    /// already carries a suggestion to adjust the settings. Cancellation
    /// reports neither.
    fn on_complete(&self, destination: Option<&Path>, message: Option<&str>);
}

/// Discards all progress notifications.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Discards the completion notification.
pub(crate) struct NoOpCompletion;

impl CompletionCallback for NoOpCompletion {
    fn on_complete(&self, _destination: Option<&Path>, _message: Option<&str>) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone it and share it between threads; [`cancel`](CancellationToken::cancel)
/// from anywhere stops the run at its next unit of work. Both passes check
/// the token before each frame and each audio block.
///
/// # Example
///
/// ```
/// use timewarp::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.clone().cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
