//! Credential pool with per-group rotation.
//!
//! Credentials rotate independently of proxy health to spread quota
//! across a provider group's members. There is no cross-group fallback:
//! a strategy bound to an exhausted group fails outright.
//!
//! Keys are held via `secrecy` so they never leak into logs or debug
//! output.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretBox};

use crate::clock::{Clock, SystemClock};
use crate::types::config::ExhaustionPolicy;

/// An API key that won't be logged or displayed.
pub struct ApiKey(SecretBox<str>);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    /// Expose the key for use in an outbound request.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for ApiKey {
    fn clone(&self) -> Self {
        Self::new(self.expose().to_string())
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for ApiKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for ApiKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Static descriptor of one credential: identity, provider group, key.
#[derive(Debug, Clone)]
pub struct CredentialSpec {
    pub id: String,
    pub group: String,
    pub key: ApiKey,
}

impl CredentialSpec {
    pub fn new(
        id: impl Into<String>,
        group: impl Into<String>,
        key: impl Into<ApiKey>,
    ) -> Self {
        Self {
            id: id.into(),
            group: group.into(),
            key: key.into(),
        }
    }
}

// Config stays serializable without ever serializing key material.
impl serde::Serialize for CredentialSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("CredentialSpec", 2)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("group", &self.group)?;
        s.end()
    }
}

impl<'de> serde::Deserialize<'de> for CredentialSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(serde::Deserialize)]
        struct Raw {
            id: String,
            group: String,
            #[serde(default)]
            key: String,
        }
        let raw = Raw::deserialize(deserializer)?;
        Ok(Self::new(raw.id, raw.group, raw.key))
    }
}

/// A credential selected for one attempt.
#[derive(Debug, Clone)]
pub struct Credential {
    pub id: String,
    pub group: String,
    key: ApiKey,
}

impl Credential {
    pub fn key(&self) -> &str {
        self.key.expose()
    }
}

#[derive(Debug, Default)]
struct CredentialState {
    exhausted_at: Option<DateTime<Utc>>,
    requests: u64,
}

struct CredentialEntry {
    spec: CredentialSpec,
    state: Mutex<CredentialState>,
}

struct Group {
    entries: Vec<CredentialEntry>,
    cursor: AtomicUsize,
}

/// Rotating pool of API credentials, keyed by provider group.
pub struct CredentialPool {
    groups: HashMap<String, Group>,
    policy: ExhaustionPolicy,
    clock: Arc<dyn Clock>,
}

impl CredentialPool {
    pub fn new(specs: Vec<CredentialSpec>, policy: ExhaustionPolicy) -> Self {
        Self::with_clock(specs, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(
        specs: Vec<CredentialSpec>,
        policy: ExhaustionPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut groups: HashMap<String, Group> = HashMap::new();
        for spec in specs {
            groups
                .entry(spec.group.clone())
                .or_insert_with(|| Group {
                    entries: Vec::new(),
                    cursor: AtomicUsize::new(0),
                })
                .entries
                .push(CredentialEntry {
                    spec,
                    state: Mutex::new(CredentialState::default()),
                });
        }
        Self {
            groups,
            policy,
            clock,
        }
    }

    /// Round-robin selection within the named group, skipping exhausted
    /// members per policy. Returns `None` for unknown or exhausted
    /// groups; never falls back to another group.
    pub fn acquire(&self, group: &str) -> Option<Credential> {
        let group = self.groups.get(group)?;
        let n = group.entries.len();

        for _ in 0..n {
            let idx = group.cursor.fetch_add(1, Ordering::Relaxed) % n;
            let entry = &group.entries[idx];

            let mut state = entry.state.lock().unwrap();
            if let Some(at) = state.exhausted_at {
                match self.policy {
                    ExhaustionPolicy::Permanent => continue,
                    ExhaustionPolicy::Timed { duration } => {
                        let window =
                            TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX);
                        if self.clock.now() < at + window {
                            continue;
                        }
                        state.exhausted_at = None;
                    }
                }
            }
            state.requests += 1;

            return Some(Credential {
                id: entry.spec.id.clone(),
                group: entry.spec.group.clone(),
                key: entry.spec.key.clone(),
            });
        }

        None
    }

    /// Mark a credential as exhausted (quota spent, key revoked).
    pub fn report_exhausted(&self, credential: &Credential) {
        let Some(group) = self.groups.get(&credential.group) else {
            return;
        };
        if let Some(entry) = group.entries.iter().find(|e| e.spec.id == credential.id) {
            let mut state = entry.state.lock().unwrap();
            if state.exhausted_at.is_none() {
                state.exhausted_at = Some(self.clock.now());
                tracing::warn!(
                    credential_id = %credential.id,
                    group = %credential.group,
                    "credential exhausted"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualClock;
    use std::time::Duration;

    fn specs() -> Vec<CredentialSpec> {
        vec![
            CredentialSpec::new("key-a1", "serpapi", "secret-a1"),
            CredentialSpec::new("key-a2", "serpapi", "secret-a2"),
            CredentialSpec::new("key-b1", "scrapingbee", "secret-b1"),
        ]
    }

    #[test]
    fn rotates_within_group() {
        let pool = CredentialPool::new(specs(), ExhaustionPolicy::Permanent);
        let ids: Vec<String> = (0..3)
            .map(|_| pool.acquire("serpapi").unwrap().id)
            .collect();
        assert_eq!(ids, ["key-a1", "key-a2", "key-a1"]);
    }

    #[test]
    fn no_cross_group_fallback() {
        let pool = CredentialPool::new(specs(), ExhaustionPolicy::Permanent);
        let only = pool.acquire("scrapingbee").unwrap();
        pool.report_exhausted(&only);

        assert!(pool.acquire("scrapingbee").is_none());
        // Other groups are unaffected
        assert!(pool.acquire("serpapi").is_some());
    }

    #[test]
    fn unknown_group_is_empty() {
        let pool = CredentialPool::new(specs(), ExhaustionPolicy::Permanent);
        assert!(pool.acquire("nosuch").is_none());
    }

    #[test]
    fn timed_policy_recovers_after_window() {
        let clock = Arc::new(ManualClock::new());
        let pool = CredentialPool::with_clock(
            vec![CredentialSpec::new("key-b1", "scrapingbee", "secret")],
            ExhaustionPolicy::Timed {
                duration: Duration::from_secs(60),
            },
            clock.clone(),
        );

        let cred = pool.acquire("scrapingbee").unwrap();
        pool.report_exhausted(&cred);
        assert!(pool.acquire("scrapingbee").is_none());

        clock.advance(Duration::from_secs(61));
        assert!(pool.acquire("scrapingbee").is_some());
    }

    #[test]
    fn key_is_redacted_in_debug() {
        let spec = CredentialSpec::new("key-a1", "serpapi", "sk-super-secret");
        let debug = format!("{spec:?}");
        assert!(!debug.contains("sk-super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
