use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    ManualOverride,
    ExternalRemote,
    UserRequested,
}

impl HoldReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManualOverride => "MANUAL_OVERRIDE",
            Self::ExternalRemote => "EXTERNAL_REMOTE",
            Self::UserRequested => "USER_REQUESTED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldState {
    pub start_ms: u64,
    pub duration_ms: u64,
    pub reason: HoldReason,
}

/// Manual-override window that suspends automatic control until it expires.
#[derive(Debug, Clone)]
pub struct HoldManager {
    default_duration_ms: u64,
    active: Option<HoldState>,
}

impl HoldManager {
    pub fn new(default_duration_ms: u64) -> Self {
        Self {
            default_duration_ms,
            active: None,
        }
    }

    /// Start (or restart) a hold. A zero or missing duration uses the default.
    pub fn enter(&mut self, duration_ms: Option<u64>, reason: HoldReason, now_ms: u64) {
        let duration_ms = duration_ms
            .filter(|duration| *duration > 0)
            .unwrap_or(self.default_duration_ms);
        info!(
            duration_min = duration_ms / 60_000,
            reason = reason.as_str(),
            "entering hold"
        );
        self.active = Some(HoldState {
            start_ms: now_ms,
            duration_ms,
            reason,
        });
    }

    /// Returns whether a hold was actually cleared.
    pub fn exit(&mut self) -> bool {
        let was_active = self.active.take().is_some();
        if was_active {
            info!("exiting hold, resuming automatic control");
        }
        was_active
    }

    pub fn expire(&mut self, now_ms: u64) -> bool {
        let Some(hold) = self.active else {
            return false;
        };
        if now_ms.saturating_sub(hold.start_ms) < hold.duration_ms {
            return false;
        }
        info!("hold expired, resuming automatic control");
        self.active = None;
        true
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn state(&self) -> Option<HoldState> {
        self.active
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.active
            .map(|hold| {
                hold.duration_ms
                    .saturating_sub(now_ms.saturating_sub(hold.start_ms))
            })
            .unwrap_or(0)
    }
}
