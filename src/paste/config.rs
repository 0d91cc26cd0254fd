use std::time::Duration;

/// Default base URL used to build share links.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// How a read persists the incremented view counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewCounting {
    /// Fetch, check and increment, then write back only if the stored record
    /// is still the one that was checked. Concurrent readers never exceed
    /// `max_views` and never lose an increment.
    #[default]
    Atomic,
    /// Fetch, check, increment, overwrite if still present. Concurrent
    /// readers of one paste may undercount and may all slip past the view
    /// limit, but a record deleted in between is never written back.
    BestEffort,
}

/// Configuration for a [`PasteEngine`](super::PasteEngine).
///
/// # Example
///
/// ```rust
/// use flashpaste::paste::{EngineConfig, ViewCounting};
/// use std::time::Duration;
///
/// let config = EngineConfig::default()
///     .with_base_url("https://paste.example")
///     .with_ttl_grace(Duration::from_secs(120))
///     .with_view_counting(ViewCounting::BestEffort);
/// assert!(!config.test_mode);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Honor per-call time overrides (default: false)
    pub test_mode: bool,

    /// Prefix of generated share links (default: `http://localhost:3000`)
    pub base_url: String,

    /// Passive expiry requested past a paste's logical TTL (default: 60s)
    pub ttl_grace: Duration,

    /// Passive expiry for pastes without a TTL (default: 30 minutes)
    pub default_passive_ttl: Duration,

    /// View counter update discipline (default: [`ViewCounting::Atomic`])
    pub view_counting: ViewCounting,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            test_mode: false,
            base_url: DEFAULT_BASE_URL.to_string(),
            ttl_grace: Duration::from_secs(60),
            default_passive_ttl: Duration::from_secs(1800),
            view_counting: ViewCounting::Atomic,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables per-call time overrides.
    ///
    /// Overrides exist so expiry can be tested deterministically. Never turn
    /// this on for a server reachable by untrusted callers: anyone could
    /// read an expired paste by sending an old timestamp.
    pub fn with_test_mode(mut self, enabled: bool) -> Self {
        self.test_mode = enabled;
        self
    }

    /// Sets the base URL; trailing slashes are dropped.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_ttl_grace(mut self, grace: Duration) -> Self {
        self.ttl_grace = grace;
        self
    }

    pub fn with_default_passive_ttl(mut self, ttl: Duration) -> Self {
        self.default_passive_ttl = ttl;
        self
    }

    pub fn with_view_counting(mut self, mode: ViewCounting) -> Self {
        self.view_counting = mode;
        self
    }

    /// Passive expiry to request for a paste with the given logical TTL.
    pub fn passive_ttl(&self, ttl_seconds: Option<u64>) -> Duration {
        match ttl_seconds {
            Some(ttl) => Duration::from_secs(ttl).saturating_add(self.ttl_grace),
            None => self.default_passive_ttl,
        }
    }
}
