//! Non-blocking single-occupancy flags scoped to a conversation epoch.

use std::sync::atomic::{AtomicU64, Ordering};

const FREE: u64 = 0;

/// A busy flag that remembers which epoch holds it.
///
/// A claim from a newer epoch supersedes an older holder, so a call that
/// never returns cannot block the conversation that replaced it.
#[derive(Debug, Default)]
pub(crate) struct BusyFlag {
    // FREE, or the holder's epoch plus one.
    holder: AtomicU64,
}

impl BusyFlag {
    /// Claims the flag for `epoch`, or returns `None` if a holder from the
    /// same or a later epoch has it.
    pub(crate) fn claim(&self, epoch: u64) -> Option<BusyGuard<'_>> {
        let mark = epoch + 1;
        let previous = self
            .holder
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < mark).then_some(mark)
            })
            .ok()?;
        if previous != FREE {
            tracing::debug!(
                "[BusyFlag] Epoch {} supersedes a holder from epoch {}",
                epoch,
                previous - 1
            );
        }
        Some(BusyGuard { flag: self, mark })
    }

    /// Returns true while a holder from `epoch` or later has the flag.
    pub(crate) fn is_held_for(&self, epoch: u64) -> bool {
        self.holder.load(Ordering::Acquire) > epoch
    }
}

/// Exclusive hold on a [`BusyFlag`], released on drop unless superseded.
pub(crate) struct BusyGuard<'a> {
    flag: &'a BusyFlag,
    mark: u64,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let _ = self.flag.holder.compare_exchange(
            self.mark,
            FREE,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}
