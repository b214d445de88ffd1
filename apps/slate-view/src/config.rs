use std::env;
use std::time::Duration;

use crate::table::AutoscrollPolicy;
use crate::telemetry::env_truthy;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(3);

/// Settings for one live view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    /// Delay between fetch ticks while capture is active.
    pub poll_interval: Duration,
    pub autoscroll: AutoscrollPolicy,
    /// How long transient status messages stay in the footer.
    pub notice_ttl: Duration,
}

impl ViewConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let poll_interval = env::var("SLATE_POLL_INTERVAL_MS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        let autoscroll = if env_truthy("SLATE_REATTACH_AT_BOTTOM").unwrap_or(false) {
            AutoscrollPolicy::ReattachAtBottom
        } else {
            AutoscrollPolicy::Strict
        };
        Self {
            poll_interval,
            autoscroll,
            notice_ttl: DEFAULT_NOTICE_TTL,
        }
    }

    pub fn with_poll_interval_ms(mut self, ms: Option<u64>) -> Self {
        if let Some(ms) = ms.filter(|ms| *ms > 0) {
            self.poll_interval = Duration::from_millis(ms);
        }
        self
    }

    pub fn with_reattach_at_bottom(mut self, reattach: bool) -> Self {
        if reattach {
            self.autoscroll = AutoscrollPolicy::ReattachAtBottom;
        }
        self
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            autoscroll: AutoscrollPolicy::Strict,
            notice_ttl: DEFAULT_NOTICE_TTL,
        }
    }
}
