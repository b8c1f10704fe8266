//! Testing utilities including mock implementations.
//!
//! Useful for exercising the engine without real network calls or wall
//! time: a scripted fetcher with call tracking, a manually advanced
//! clock for quarantine windows, and an event sink that collects trace
//! events for assertions.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::clock::Clock;
use crate::error::{FetchError, FetchResult};
use crate::events::{EngineEvent, EventSink, FailureKind};
use crate::fetch::{FetchRequest, FetchResponse, FetchVia, SourceFetcher};

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        // Arbitrary fixed origin keeps failures reproducible
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::TimeDelta::from_std(by).unwrap_or_default();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// One scripted reply for the mock fetcher.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// A response with the given status and body
    Body { status: u16, body: String },
    /// Per-attempt timeout
    Timeout,
    /// Connection-level failure
    ConnectError,
}

impl ScriptedResponse {
    /// HTTP 200 with the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::Body {
            status: 200,
            body: body.into(),
        }
    }

    /// Arbitrary status with the given body.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Body {
            status,
            body: body.into(),
        }
    }
}

/// Record of one call made to the mock fetcher.
#[derive(Debug, Clone)]
pub struct FetchCall {
    pub source: String,
    pub url: String,
    pub proxy_id: String,
    pub credential_id: Option<String>,
    pub user_agent: String,
}

/// A fetcher that replays scripted responses and tracks calls.
///
/// Responses queue per source name and are consumed in order; when a
/// source's queue is empty the default response (if any) is replayed.
/// Clones share the same script and call log.
#[derive(Clone, Default)]
pub struct MockFetcher {
    responses: Arc<Mutex<HashMap<String, VecDeque<ScriptedResponse>>>>,
    fallback: Arc<Mutex<Option<ScriptedResponse>>>,
    calls: Arc<Mutex<Vec<FetchCall>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for a source.
    pub fn with_response(self, source: impl Into<String>, response: ScriptedResponse) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(source.into())
            .or_default()
            .push_back(response);
        self
    }

    /// Replay this response whenever a source's queue is empty.
    pub fn with_default(self, response: ScriptedResponse) -> Self {
        *self.fallback.lock().unwrap() = Some(response);
        self
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceFetcher for MockFetcher {
    async fn fetch(&self, request: &FetchRequest, via: &FetchVia) -> FetchResult<FetchResponse> {
        self.calls.lock().unwrap().push(FetchCall {
            source: request.source.to_string(),
            url: request.url.to_string(),
            proxy_id: via.proxy.id().to_string(),
            credential_id: via.credential.as_ref().map(|c| c.id.clone()),
            user_agent: via.user_agent.clone(),
        });

        let scripted = self
            .responses
            .lock()
            .unwrap()
            .get_mut(request.source)
            .and_then(|queue| queue.pop_front())
            .or_else(|| self.fallback.lock().unwrap().clone());

        match scripted {
            Some(ScriptedResponse::Body { status, body }) => {
                Ok(FetchResponse { status, body })
            }
            Some(ScriptedResponse::Timeout) => Err(FetchError::Timeout {
                url: request.url.to_string(),
            }),
            Some(ScriptedResponse::ConnectError) => Err(FetchError::Connect(Box::new(
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "scripted refusal"),
            ))),
            None => Err(FetchError::Connect(Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("no scripted response for source {}", request.source),
            )))),
        }
    }
}

/// Flattened view of one `AttemptFailed` event.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub source: String,
    pub attempt: u32,
    pub kind: FailureKind,
}

/// Event sink that collects everything for assertions.
#[derive(Default)]
pub struct CollectedEvents {
    events: Mutex<Vec<EngineEvent>>,
}

impl CollectedEvents {
    pub fn all(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<FailureRecord> {
        self.all()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::AttemptFailed {
                    source,
                    attempt,
                    kind,
                    ..
                } => Some(FailureRecord {
                    source,
                    attempt,
                    kind,
                }),
                _ => None,
            })
            .collect()
    }

    /// Source names in the order their strategies started.
    pub fn strategy_order(&self) -> Vec<String> {
        self.all()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::StrategyStarted { source, .. } => Some(source),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for CollectedEvents {
    fn record(&self, event: &EngineEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
