//! Configuration for the fetch engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pool::{CredentialSpec, ProxyEndpoint};

/// Retry schedule for one logical network call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum network attempts per call. Default: 5.
    pub max_attempts: u32,

    /// Base of the exponential backoff schedule.
    ///
    /// Delay before attempt n+1 is `base_delay * 2^(n-1)`, giving
    /// 2s, 4s, 8s, 16s between five attempts with the 2s default.
    pub base_delay: Duration,

    /// Upper bound of the uniform random jitter added to each delay.
    ///
    /// Jitter avoids synchronized retry storms across concurrent
    /// queries. Set to zero for deterministic tests. Default: 1s.
    pub max_jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// Backoff delay before the attempt after `attempt` (1-based),
    /// excluding jitter.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// When repeated failures take a proxy out of rotation, and for how long.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantinePolicy {
    /// Consecutive failures before quarantine. Default: 3.
    pub failure_threshold: u32,

    /// How long a quarantined proxy stays out of rotation. Default: 5 min.
    ///
    /// Expiry is lazy: a proxy that sits unused past its quarantine
    /// window is immediately eligible again on the next acquire.
    pub duration: Duration,
}

impl Default for QuarantinePolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            duration: Duration::from_secs(300),
        }
    }
}

/// What happens to a credential once its group reports it exhausted.
///
/// No recovery signal exists for spent API quota, so the default treats
/// exhaustion as permanent until process restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Exhausted credentials never re-enter rotation
    Permanent,
    /// Exhausted credentials re-enter rotation after the given window
    Timed { duration: Duration },
}

impl Default for ExhaustionPolicy {
    fn default() -> Self {
        ExhaustionPolicy::Permanent
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Egress proxies, rotated per attempt
    pub proxies: Vec<ProxyEndpoint>,

    /// API credentials, rotated within their provider groups
    pub credentials: Vec<CredentialSpec>,

    pub retry: RetryConfig,
    pub quarantine: QuarantinePolicy,
    pub exhaustion: ExhaustionPolicy,

    /// Fixed user-agent rotation; attempt n uses entry (n - 1) mod len
    pub user_agents: Vec<String>,

    /// Per-attempt response timeout. Default: 30s.
    pub request_timeout: Duration,

    /// Per-attempt connect timeout. Default: 10s.
    pub connect_timeout: Duration,

    /// Pause between strategies after an empty or exhausted one. Default: 2s.
    pub strategy_pacing: Duration,

    /// Pause between secondary lookup URLs. Default: 1.5s.
    pub lookup_pacing: Duration,

    /// Overall per-query deadline enforced by `search`. None = unbounded.
    pub query_deadline: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            proxies: Vec::new(),
            credentials: Vec::new(),
            retry: RetryConfig::default(),
            quarantine: QuarantinePolicy::default(),
            exhaustion: ExhaustionPolicy::default(),
            user_agents: default_user_agents(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            strategy_pacing: Duration::from_secs(2),
            lookup_pacing: Duration::from_millis(1500),
            query_deadline: None,
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the egress proxy list.
    pub fn with_proxies(mut self, proxies: Vec<ProxyEndpoint>) -> Self {
        self.proxies = proxies;
        self
    }

    /// Set the credential list.
    pub fn with_credentials(mut self, credentials: Vec<CredentialSpec>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the retry schedule.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the quarantine policy.
    pub fn with_quarantine(mut self, quarantine: QuarantinePolicy) -> Self {
        self.quarantine = quarantine;
        self
    }

    /// Set the credential exhaustion policy.
    pub fn with_exhaustion(mut self, exhaustion: ExhaustionPolicy) -> Self {
        self.exhaustion = exhaustion;
        self
    }

    /// Set the per-query deadline.
    pub fn with_query_deadline(mut self, deadline: Duration) -> Self {
        self.query_deadline = Some(deadline);
        self
    }

    /// Disable inter-strategy and inter-lookup pacing (useful in tests).
    pub fn without_pacing(mut self) -> Self {
        self.strategy_pacing = Duration::ZERO;
        self.lookup_pacing = Duration::ZERO;
        self
    }
}

/// The stock desktop browser rotation.
pub fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
