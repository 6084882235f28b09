use std::sync::Mutex;

use crate::operation::RequestDescriptor;

/// Single-entry holder for a request staged by the chat UI.
///
/// Two states: EMPTY and OCCUPIED. `stage` moves EMPTY to OCCUPIED, `take`
/// moves OCCUPIED to EMPTY. Both transitions happen under one lock so
/// concurrent staging can never leave more than one descriptor behind.
#[derive(Debug, Default)]
pub struct PendingSlot {
    inner: Mutex<Option<RequestDescriptor>>,
}

impl PendingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `descriptor` if the slot is empty. Returns false, leaving the
    /// current occupant untouched, if it is not.
    pub fn stage(&self, descriptor: RequestDescriptor) -> bool {
        let mut slot = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return false;
        }
        *slot = Some(descriptor);
        true
    }

    /// Remove and return the staged descriptor, if any.
    pub fn take(&self) -> Option<RequestDescriptor> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    pub fn is_pending(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Copy of the staged descriptor without consuming it.
    pub fn peek(&self) -> Option<RequestDescriptor> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
