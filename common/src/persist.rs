use crate::{config::PersistedSettings, error::StoreError};

/// Durable key/value home for [`PersistedSettings`].
pub trait SettingsStore {
    fn load(&self) -> Result<PersistedSettings, StoreError>;
    fn save(&mut self, settings: &PersistedSettings) -> Result<(), StoreError>;
}

/// Settings snapshot taken for a write that completes outside the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSave {
    pub settings: PersistedSettings,
    pub(crate) marked_ms: u64,
}

/// Collapses bursts of setting changes into one write.
#[derive(Debug, Clone)]
pub struct SaveDebouncer {
    debounce_ms: u64,
    last_change_ms: Option<u64>,
}

impl SaveDebouncer {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            last_change_ms: None,
        }
    }

    pub fn mark(&mut self, now_ms: u64) {
        self.last_change_ms = Some(now_ms);
    }

    pub fn last_change_ms(&self) -> Option<u64> {
        self.last_change_ms
    }

    pub fn is_pending(&self) -> bool {
        self.last_change_ms.is_some()
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        self.last_change_ms
            .map(|last| now_ms.saturating_sub(last) >= self.debounce_ms)
            .unwrap_or(false)
    }

    pub fn clear(&mut self) {
        self.last_change_ms = None;
    }
}
