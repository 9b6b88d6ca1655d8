//! Progress reporting and cooperative cancellation for spectrum loops.
//!
//! Both are checked once every [`CHECK_INTERVAL`] spectra, never per event.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Number of spectra processed between progress reports and cancellation checks.
pub const CHECK_INTERVAL: usize = 100;

/// Receives progress updates from long-running drivers.
pub trait ProgressReporter: Send + Sync {
    /// Called with the number of spectra finished so far.
    fn report(&self, done: usize, total: usize);
}

/// Reporter that discards all updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _done: usize, _total: usize) {}
}

impl<F> ProgressReporter for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn report(&self, done: usize, total: usize) {
        self(done, total);
    }
}

/// Shared flag a caller sets to stop a running driver.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Fails with [`Error::Cancelled`] once cancellation was requested.
    ///
    /// # Errors
    /// Returns [`Error::Cancelled`] if the token was cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Counts finished spectra across worker threads.
pub struct SpectrumProgress<'a> {
    reporter: &'a dyn ProgressReporter,
    cancel: &'a CancellationToken,
    done: AtomicUsize,
    total: usize,
}

impl<'a> SpectrumProgress<'a> {
    /// Starts tracking a loop over `total` spectra.
    #[must_use]
    pub fn new(
        reporter: &'a dyn ProgressReporter,
        cancel: &'a CancellationToken,
        total: usize,
    ) -> Self {
        Self {
            reporter,
            cancel,
            done: AtomicUsize::new(0),
            total,
        }
    }

    /// Checks for cancellation before a spectrum is started.
    ///
    /// Only every [`CHECK_INTERVAL`]-th index consults the token.
    ///
    /// # Errors
    /// Returns [`Error::Cancelled`] if the token was cancelled.
    pub fn checkpoint(&self, index: usize) -> Result<()> {
        if index % CHECK_INTERVAL == 0 {
            self.cancel.check()
        } else {
            Ok(())
        }
    }

    /// Records one finished spectrum.
    pub fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if done % CHECK_INTERVAL == 0 || done == self.total {
            self.reporter.report(done, self.total);
        }
    }

    /// Number of spectra finished so far.
    #[must_use]
    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_cancellation_token() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());

        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_progress_granularity() {
        let reports = Mutex::new(Vec::new());
        let reporter = |done: usize, total: usize| reports.lock().unwrap().push((done, total));
        let token = CancellationToken::new();
        let progress = SpectrumProgress::new(&reporter, &token, 250);

        for _ in 0..250 {
            progress.tick();
        }

        assert_eq!(progress.done(), 250);
        assert_eq!(*reports.lock().unwrap(), vec![(100, 250), (200, 250), (250, 250)]);
    }

    #[test]
    fn test_checkpoint_only_on_interval() {
        let token = CancellationToken::new();
        token.cancel();
        let progress = SpectrumProgress::new(&NoProgress, &token, 10);

        assert!(progress.checkpoint(1).is_ok());
        assert!(matches!(progress.checkpoint(0), Err(Error::Cancelled)));
        assert!(matches!(
            progress.checkpoint(CHECK_INTERVAL),
            Err(Error::Cancelled)
        ));
    }
}
