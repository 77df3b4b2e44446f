//! Upload progress reporting.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

/// Shared progress percentage (0..=100) for the current upload job.
///
/// Within a job the value never decreases, and subscribers are only woken
/// when the integer percentage actually grows, which keeps the cadence
/// suitable for a progress indicator however small the transfer chunks are.
///
/// Each transfer reports through its own handle from
/// [`UploadProgress::begin_job`]; only the newest handle moves the value.
#[derive(Debug, Clone)]
pub struct UploadProgress {
    percent: Arc<watch::Sender<u8>>,
    // Bumped whenever a job starts or is cut loose.
    active_job: Arc<AtomicU64>,
    job: u64,
}

impl Default for UploadProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadProgress {
    pub fn new() -> Self {
        let (percent, _) = watch::channel(0);
        Self {
            percent: Arc::new(percent),
            active_job: Arc::new(AtomicU64::new(0)),
            job: 0,
        }
    }

    /// A handle for a new job's transfer. Handles issued earlier stop
    /// moving the indicator.
    pub fn begin_job(&self) -> Self {
        let job = self.active_job.fetch_add(1, Ordering::AcqRel) + 1;
        Self {
            percent: self.percent.clone(),
            active_job: self.active_job.clone(),
            job,
        }
    }

    /// Cuts every job handle loose and clears the indicator.
    pub fn detach_jobs(&self) {
        self.active_job.fetch_add(1, Ordering::AcqRel);
        self.reset();
    }

    /// Records that `transferred` of `total` bytes have been handed to the transport.
    pub fn report(&self, transferred: u64, total: u64) {
        if self.active_job.load(Ordering::Acquire) != self.job {
            return;
        }
        let next = percent_of(transferred, total);
        self.percent.send_if_modified(|current| {
            if next > *current {
                *current = next;
                true
            } else {
                false
            }
        });
    }

    /// Clears the indicator once a job settles.
    pub fn reset(&self) {
        self.percent.send_replace(0);
    }

    pub fn current(&self) -> u8 {
        *self.percent.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.percent.subscribe()
    }
}

fn percent_of(transferred: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let transferred = transferred.min(total) as u128;
    ((transferred * 100) / total as u128) as u8
}
