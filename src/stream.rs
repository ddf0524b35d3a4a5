//! Async retiming.
//!
//! [`RetimeFuture`] runs a whole [`Retimer`] session on a Tokio blocking
//! thread, so CPU-heavy decoding and encoding never ties up the runtime's
//! cooperative task budget. Cancel through the retimer's
//! [`CancellationToken`](crate::CancellationToken); dropping the future
//! does not stop the run.
//!
//! # Example
//!
//! ```no_run
//! use timewarp::{Retimer, ScalingKind, TimeWarpError};
//!
//! # async fn example() -> Result<(), TimeWarpError> {
//! let retimer = Retimer::new("input.mp4", "output.mov", ScalingKind::Cosine.with(1.5, 0.5));
//! let token = retimer.cancellation_token();
//! let report = timewarp::retime_file_async(retimer).await?;
//! println!("{} frames written", report.frames_written);
//! # drop(token);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::error::TimeWarpError;
use crate::retimer::RetimeReport;
use crate::timewarp::Retimer;

/// A future that resolves to the report of a background run.
///
/// A panicked or aborted worker resolves to [`TimeWarpError::Cancelled`].
pub struct RetimeFuture {
    handle: JoinHandle<Result<RetimeReport, TimeWarpError>>,
}

impl Future for RetimeFuture {
    type Output = Result<RetimeReport, TimeWarpError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle)
            .poll(cx)
            .map(|result| result.unwrap_or_else(|_| Err(TimeWarpError::Cancelled)))
    }
}

/// Run `retimer` on a blocking thread.
///
/// Must be called from within a Tokio runtime.
pub fn retime_file_async(retimer: Retimer) -> RetimeFuture {
    let handle = tokio::task::spawn_blocking(move || retimer.run());
    RetimeFuture { handle }
}

impl Retimer {
    /// Run on a Tokio blocking thread. See [`retime_file_async`].
    pub fn run_async(self) -> RetimeFuture {
        retime_file_async(self)
    }
}
