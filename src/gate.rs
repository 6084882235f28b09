use std::sync::atomic::{AtomicBool, Ordering};

/// Advisory flag telling whether an inference call is outstanding.
///
/// Only backend lifecycle notifications move it: `Started` sets it, `Finished`
/// clears it. There is no timeout, so a lost `Finished` leaves it set.
/// Concurrent writers are last-write-wins.
#[derive(Debug, Default)]
pub struct BusyGate {
    busy: AtomicBool,
}

impl BusyGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub(crate) fn set(&self, busy: bool) {
        self.busy.store(busy, Ordering::Release);
    }
}
