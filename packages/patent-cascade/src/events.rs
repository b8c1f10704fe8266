//! Structured trace events for logging collaborators.
//!
//! The engine only emits these; sinks decide what to do with them. The
//! default sink forwards to `tracing`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a single attempt failed, for observability. Transport failures
/// and source rejections retry identically but are counted apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Timeout, connection refused, proxy dead
    Transport,
    /// HTTP 429 from the source
    RateLimited,
    /// Blocking page or access-denied status
    Blocked,
    /// Any other non-serving status
    HttpStatus,
    /// No usable proxy or credential; the attempt consumed a retry slot
    /// without a network call
    PoolExhausted,
}

/// Facts about what happened during a query execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    StrategyStarted {
        query_id: Uuid,
        source: String,
        priority: usize,
    },

    AttemptSucceeded {
        query_id: Uuid,
        source: String,
        attempt: u32,
        proxy_id: String,
        status: u16,
    },

    AttemptFailed {
        query_id: Uuid,
        source: String,
        attempt: u32,
        /// Absent when the failure was pool exhaustion
        proxy_id: Option<String>,
        kind: FailureKind,
        /// Backoff before the next attempt, if one remains
        retry_in_ms: Option<u64>,
    },

    StrategyExhausted {
        query_id: Uuid,
        source: String,
        attempts: u32,
    },

    /// The strategy served content but the extraction was empty; the
    /// cascade advances
    StrategyEmpty {
        query_id: Uuid,
        source: String,
    },

    StrategyMatched {
        query_id: Uuid,
        source: String,
        identifiers: usize,
    },

    CascadeFinished {
        query_id: Uuid,
        succeeded: bool,
        attempts: u32,
    },
}

/// Consumer of engine trace events.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &EngineEvent);
}

/// Default sink: structured `tracing` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &EngineEvent) {
        match event {
            EngineEvent::StrategyStarted {
                query_id,
                source,
                priority,
            } => {
                tracing::info!(query_id = %query_id, source = %source, priority, "strategy started");
            }
            EngineEvent::AttemptSucceeded {
                query_id,
                source,
                attempt,
                proxy_id,
                status,
            } => {
                tracing::info!(
                    query_id = %query_id,
                    source = %source,
                    attempt,
                    proxy_id = %proxy_id,
                    status,
                    "attempt succeeded"
                );
            }
            EngineEvent::AttemptFailed {
                query_id,
                source,
                attempt,
                proxy_id,
                kind,
                retry_in_ms,
            } => {
                tracing::warn!(
                    query_id = %query_id,
                    source = %source,
                    attempt,
                    proxy_id = ?proxy_id,
                    kind = ?kind,
                    retry_in_ms = ?retry_in_ms,
                    "attempt failed"
                );
            }
            EngineEvent::StrategyExhausted {
                query_id,
                source,
                attempts,
            } => {
                tracing::warn!(query_id = %query_id, source = %source, attempts, "strategy exhausted");
            }
            EngineEvent::StrategyEmpty { query_id, source } => {
                tracing::info!(query_id = %query_id, source = %source, "strategy returned no identifiers");
            }
            EngineEvent::StrategyMatched {
                query_id,
                source,
                identifiers,
            } => {
                tracing::info!(query_id = %query_id, source = %source, identifiers, "strategy matched");
            }
            EngineEvent::CascadeFinished {
                query_id,
                succeeded,
                attempts,
            } => {
                tracing::info!(query_id = %query_id, succeeded, attempts, "cascade finished");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let event = EngineEvent::AttemptFailed {
            query_id: Uuid::nil(),
            source: "espacenet".to_string(),
            attempt: 2,
            proxy_id: Some("proxy-1".to_string()),
            kind: FailureKind::RateLimited,
            retry_in_ms: Some(4000),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "attempt_failed");
        assert_eq!(value["source"], "espacenet");
        assert_eq!(value["kind"], "rate_limited");
        assert_eq!(value["retry_in_ms"], 4000);
    }

    #[test]
    fn events_round_trip_through_json() {
        let event = EngineEvent::StrategyStarted {
            query_id: Uuid::now_v7(),
            source: "google_patents".to_string(),
            priority: 1,
        };

        let json = serde_json::to_string(&event).unwrap();
        let back: EngineEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            back,
            EngineEvent::StrategyStarted { priority: 1, ref source, .. } if source == "google_patents"
        ));
    }
}
