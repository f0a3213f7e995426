//! Monitoring configuration and injected collaborators

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::platform;
use crate::reactivation::Reactivation;

/// Opens a settings deep link. Fire-and-forget: implementations log failures.
pub type OpenUrlFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Monitor configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Period of the repeating re-evaluation timer
    pub poll_interval: Duration,
    /// How often the activation watcher samples the frontmost app
    pub activation_poll: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            activation_poll: Duration::from_millis(250),
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn activation_poll(mut self, interval: Duration) -> Self {
        self.activation_poll = interval;
        self
    }
}

/// Everything a capability needs from the outside world besides its own
/// check/request pair.
#[derive(Clone)]
pub struct Hooks {
    pub config: MonitorConfig,
    pub reactivation: Reactivation,
    pub open_url: OpenUrlFn,
}

impl Hooks {
    /// Platform URL opener, fresh reactivation hub.
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            reactivation: Reactivation::new(),
            open_url: Arc::new(|url: &str| platform::current::open_url(url)),
        }
    }

    pub fn with_reactivation(mut self, reactivation: Reactivation) -> Self {
        self.reactivation = reactivation;
        self
    }

    pub fn with_open_url<F>(mut self, open_url: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.open_url = Arc::new(open_url);
        self
    }
}

impl Default for Hooks {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("config", &self.config)
            .field("reactivation", &self.reactivation)
            .finish_non_exhaustive()
    }
}
