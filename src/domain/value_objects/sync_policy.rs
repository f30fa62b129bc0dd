use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Whether this session runs against a live backend or as an
/// offline-capable standalone install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Connected,
    Standalone,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionMode::Connected => "connected",
            SessionMode::Standalone => "standalone",
        };
        write!(f, "{}", label)
    }
}

/// Reconciliation policy injected into the reconciler at construction.
/// Never read from ambient global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPolicy {
    pub mode: SessionMode,
    /// Cadence while connected, in seconds.
    pub foreground_interval: u64,
    /// Cadence for standalone sessions, in seconds.
    pub background_interval: u64,
}

impl SyncPolicy {
    pub fn new(mode: SessionMode, foreground_interval: u64, background_interval: u64) -> Self {
        Self {
            mode,
            foreground_interval,
            background_interval,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        let secs = match self.mode {
            SessionMode::Connected => self.foreground_interval,
            SessionMode::Standalone => self.background_interval,
        };
        Duration::from_secs(secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadence_follows_session_mode() {
        let connected = SyncPolicy::new(SessionMode::Connected, 30, 300);
        let standalone = SyncPolicy::new(SessionMode::Standalone, 30, 300);
        assert_eq!(connected.poll_interval(), Duration::from_secs(30));
        assert_eq!(standalone.poll_interval(), Duration::from_secs(300));
    }
}
