use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PUBLISH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_VERIFY_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MIN_ACKS: usize = 1;

/// How strict input validation is about optional fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationProfile {
    /// `originalHash` may be omitted.
    #[default]
    Standard,
    /// `originalHash` is mandatory.
    Strict,
}

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Bound on opening one relay connection.
    pub connect_timeout: Duration,
    /// Bound on one relay acknowledging the event, counted from submission.
    pub publish_timeout: Duration,
    /// Acks required for the publish to count as delivered.
    pub min_acks: usize,
    /// Cancel outstanding attempts once this many relays have acked.
    pub stop_after_acks: Option<usize>,
}

impl PublisherConfig {
    pub fn required_acks(&self) -> usize {
        self.min_acks.max(1)
    }

    pub fn with_timeouts(mut self, connect: Duration, publish: Duration) -> Self {
        self.connect_timeout = connect;
        self.publish_timeout = publish;
        self
    }

    pub fn with_stop_after_acks(mut self, acks: usize) -> Self {
        self.stop_after_acks = Some(acks.max(1));
        self
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            publish_timeout: Duration::from_secs(DEFAULT_PUBLISH_TIMEOUT_SECS),
            min_acks: DEFAULT_MIN_ACKS,
            stop_after_acks: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub connect_timeout: Duration,
    /// Bound on the whole verification run, connecting included.
    pub timeout: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            timeout: Duration::from_secs(DEFAULT_VERIFY_TIMEOUT_SECS),
        }
    }
}

/// Environment names accepted for the custom tags input, in priority order.
/// The second spelling is the one older workflows pass.
pub const CUSTOM_TAGS_ENV: [&str; 2] = ["INPUT_CUSTOMTAGSJSON", "INPUT_CUSTOM_TAGS_JSON"];

/// First non-blank value among `names` in the process environment.
pub fn env_fallback(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}
