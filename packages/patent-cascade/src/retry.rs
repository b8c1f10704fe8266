//! Bounded retry with exponential backoff over rotating egress.
//!
//! One `execute` call performs up to `max_attempts` network attempts,
//! each through a freshly selected proxy/credential pair and a rotated
//! user-agent. Termination is an explicit return value — `Success` or
//! `Exhausted` — never an error: transient failures are absorbed here.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::FetchError;
use crate::events::{EngineEvent, EventSink, FailureKind};
use crate::fetch::{FetchRequest, FetchVia, SourceFetcher};
use crate::pool::{CredentialPool, ProxyPool};
use crate::stats::EngineStats;
use crate::types::config::{default_user_agents, RetryConfig};
use crate::types::outcome::FetchOutcome;

/// Drives one logical network call to completion or exhaustion.
pub struct RetryExecutor {
    proxies: Arc<ProxyPool>,
    credentials: Arc<CredentialPool>,
    fetcher: Arc<dyn SourceFetcher>,
    config: RetryConfig,
    user_agents: Vec<String>,
    stats: Arc<EngineStats>,
    events: Arc<dyn EventSink>,
}

impl RetryExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        proxies: Arc<ProxyPool>,
        credentials: Arc<CredentialPool>,
        fetcher: Arc<dyn SourceFetcher>,
        config: RetryConfig,
        user_agents: Vec<String>,
        stats: Arc<EngineStats>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let user_agents = if user_agents.is_empty() {
            default_user_agents()
        } else {
            user_agents
        };
        Self {
            proxies,
            credentials,
            fetcher,
            config,
            user_agents,
            stats,
            events,
        }
    }

    /// Run the bounded attempt loop for one request.
    ///
    /// A cancelled token aborts at the next suspension point and reports
    /// `Exhausted`; partial attempts are never surfaced as success.
    pub async fn execute(
        &self,
        query_id: Uuid,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        self.execute_limited(query_id, request, cancel, self.config.max_attempts)
            .await
    }

    /// Like `execute`, with a tighter attempt budget (used by secondary
    /// lookups that fan out over several URLs).
    pub async fn execute_limited(
        &self,
        query_id: Uuid,
        request: &FetchRequest,
        cancel: &CancellationToken,
        max_attempts: u32,
    ) -> FetchOutcome {
        let max = max_attempts.clamp(1, self.config.max_attempts.max(1));

        for attempt in 1..=max {
            if cancel.is_cancelled() {
                return FetchOutcome::Exhausted {
                    attempts: attempt - 1,
                };
            }

            match self.attempt(query_id, request, attempt, cancel).await {
                AttemptResult::Served(body) => {
                    return FetchOutcome::Success {
                        body,
                        attempts: attempt,
                    };
                }
                AttemptResult::Failed(kind) => {
                    let retry_in = (attempt < max).then(|| self.backoff(attempt));
                    self.events.record(&EngineEvent::AttemptFailed {
                        query_id,
                        source: request.source.to_string(),
                        attempt,
                        proxy_id: kind.proxy_id.clone(),
                        kind: kind.kind,
                        retry_in_ms: retry_in.map(|d| d.as_millis() as u64),
                    });

                    if let Some(delay) = retry_in {
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                return FetchOutcome::Exhausted { attempts: attempt };
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
                AttemptResult::Cancelled => {
                    return FetchOutcome::Exhausted { attempts: attempt };
                }
            }
        }

        FetchOutcome::Exhausted { attempts: max }
    }

    async fn attempt(
        &self,
        query_id: Uuid,
        request: &FetchRequest,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> AttemptResult {
        let user_agent =
            self.user_agents[(attempt as usize - 1) % self.user_agents.len()].clone();

        // Pool exhaustion consumes a retry slot without a network call
        let Some(proxy) = self.proxies.acquire() else {
            return AttemptResult::Failed(AttemptFailure {
                kind: FailureKind::PoolExhausted,
                proxy_id: None,
            });
        };

        let credential = match request.credential_group {
            Some(group) => match self.credentials.acquire(group) {
                Some(credential) => Some(credential),
                None => {
                    return AttemptResult::Failed(AttemptFailure {
                        kind: FailureKind::PoolExhausted,
                        proxy_id: Some(proxy.id().to_string()),
                    });
                }
            },
            None => None,
        };

        let via = FetchVia {
            proxy: proxy.clone(),
            credential: credential.clone(),
            user_agent,
        };

        self.stats.record_attempt();
        let result = tokio::select! {
            _ = cancel.cancelled() => return AttemptResult::Cancelled,
            result = self.fetcher.fetch(request, &via) => result,
        };
        match result {
            Ok(response) if response.is_served() => {
                self.proxies.report_success(&proxy);
                self.stats.record_success();
                self.events.record(&EngineEvent::AttemptSucceeded {
                    query_id,
                    source: request.source.to_string(),
                    attempt,
                    proxy_id: proxy.id().to_string(),
                    status: response.status,
                });
                AttemptResult::Served(response.body)
            }
            Ok(response) => {
                let kind = classify_status(response.status);
                // An auth-rejected key is spent for this process
                if matches!(response.status, 401 | 403) {
                    if let Some(credential) = &credential {
                        self.credentials.report_exhausted(credential);
                    }
                }
                self.proxies.report_failure(&proxy);
                self.stats.record_failure();
                AttemptResult::Failed(AttemptFailure {
                    kind,
                    proxy_id: Some(proxy.id().to_string()),
                })
            }
            Err(error) => {
                self.proxies.report_failure(&proxy);
                self.stats.record_failure();
                AttemptResult::Failed(AttemptFailure {
                    kind: classify_error(&error),
                    proxy_id: Some(proxy.id().to_string()),
                })
            }
        }
    }

    /// Exponential delay plus uniform jitter in [0, max_jitter).
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.delay_after(attempt);
        let jitter = self.config.max_jitter.as_secs_f64();
        if jitter > 0.0 {
            base + Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..jitter))
        } else {
            base
        }
    }
}

struct AttemptFailure {
    kind: FailureKind,
    proxy_id: Option<String>,
}

enum AttemptResult {
    Served(String),
    Failed(AttemptFailure),
    Cancelled,
}

fn classify_status(status: u16) -> FailureKind {
    match status {
        429 => FailureKind::RateLimited,
        401 | 403 | 503 => FailureKind::Blocked,
        _ => FailureKind::HttpStatus,
    }
}

fn classify_error(error: &FetchError) -> FailureKind {
    match error {
        FetchError::Timeout { .. }
        | FetchError::Connect(_)
        | FetchError::Http(_)
        | FetchError::Proxy { .. } => FailureKind::Transport,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{CredentialPool, CredentialSpec, ProxyEndpoint, ProxyPool};
    use crate::testing::{CollectedEvents, MockFetcher, ScriptedResponse};
    use crate::types::config::{ExhaustionPolicy, QuarantinePolicy};

    fn executor_with(
        fetcher: MockFetcher,
        proxies: usize,
        max_jitter: Duration,
    ) -> (RetryExecutor, Arc<CollectedEvents>) {
        let endpoints = (1..=proxies)
            .map(|i| {
                ProxyEndpoint::new(
                    format!("proxy-{i}"),
                    format!("http://proxy{i}.example:8080").parse().unwrap(),
                )
            })
            .collect();
        let events = Arc::new(CollectedEvents::default());
        let executor = RetryExecutor::new(
            Arc::new(ProxyPool::new(endpoints, QuarantinePolicy::default())),
            Arc::new(CredentialPool::new(
                vec![CredentialSpec::new("key-1", "serpapi", "secret")],
                ExhaustionPolicy::Permanent,
            )),
            Arc::new(fetcher),
            RetryConfig {
                max_jitter,
                ..RetryConfig::default()
            },
            default_user_agents(),
            Arc::new(EngineStats::new()),
            events.clone(),
        );
        (executor, events)
    }

    fn request() -> FetchRequest {
        FetchRequest::new(
            "google_patents",
            "https://patents.google.com/?q=test".parse().unwrap(),
        )
    }

    #[tokio::test]
    async fn first_attempt_success_stops_immediately() {
        let fetcher = MockFetcher::new().with_default(ScriptedResponse::ok("found WO2011123456"));
        let (executor, _) = executor_with(fetcher, 3, Duration::ZERO);

        let outcome = executor
            .execute(Uuid::now_v7(), &request(), &CancellationToken::new())
            .await;

        match outcome {
            FetchOutcome::Success { attempts, .. } => assert_eq!(attempts, 1),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_five_attempts_with_thirty_seconds_backoff() {
        let fetcher = MockFetcher::new().with_default(ScriptedResponse::status(429, ""));
        let (executor, _) = executor_with(fetcher.clone(), 3, Duration::ZERO);

        let start = tokio::time::Instant::now();
        let outcome = executor
            .execute(Uuid::now_v7(), &request(), &CancellationToken::new())
            .await;
        let elapsed = start.elapsed();

        assert!(matches!(outcome, FetchOutcome::Exhausted { attempts: 5 }));
        assert_eq!(fetcher.calls().len(), 5);
        // 2 + 4 + 8 + 16 seconds, jitter disabled
        assert_eq!(elapsed, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let fetcher = MockFetcher::new()
            .with_response("google_patents", ScriptedResponse::Timeout)
            .with_response("google_patents", ScriptedResponse::ConnectError)
            .with_response("google_patents", ScriptedResponse::ok("body"));
        let (executor, events) = executor_with(fetcher.clone(), 3, Duration::ZERO);

        let outcome = executor
            .execute(Uuid::now_v7(), &request(), &CancellationToken::new())
            .await;

        assert!(matches!(outcome, FetchOutcome::Success { attempts: 3, .. }));
        // Proxies rotate across attempts
        let proxy_ids: Vec<String> =
            fetcher.calls().iter().map(|c| c.proxy_id.clone()).collect();
        assert_eq!(proxy_ids, ["proxy-1", "proxy-2", "proxy-3"]);
        assert_eq!(events.failures().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn user_agents_rotate_by_attempt_index() {
        let fetcher = MockFetcher::new().with_default(ScriptedResponse::status(500, ""));
        let (executor, _) = executor_with(fetcher.clone(), 5, Duration::ZERO);

        executor
            .execute(Uuid::now_v7(), &request(), &CancellationToken::new())
            .await;

        let rotation = default_user_agents();
        let used: Vec<String> = fetcher.calls().iter().map(|c| c.user_agent.clone()).collect();
        assert_eq!(used.len(), 5);
        for (i, ua) in used.iter().enumerate() {
            assert_eq!(ua, &rotation[i % rotation.len()]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn empty_pool_consumes_slots_without_network_calls() {
        let fetcher = MockFetcher::new().with_default(ScriptedResponse::ok("unreachable"));
        let (executor, events) = executor_with(fetcher.clone(), 0, Duration::ZERO);

        let outcome = executor
            .execute(Uuid::now_v7(), &request(), &CancellationToken::new())
            .await;

        assert!(matches!(outcome, FetchOutcome::Exhausted { attempts: 5 }));
        assert!(fetcher.calls().is_empty());
        assert!(events
            .failures()
            .iter()
            .all(|f| f.kind == FailureKind::PoolExhausted));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_credential_group_fails_without_network_call() {
        let fetcher = MockFetcher::new().with_default(ScriptedResponse::ok("unreachable"));
        let (executor, _) = executor_with(fetcher.clone(), 2, Duration::ZERO);

        let request = FetchRequest::new(
            "lens",
            "https://www.lens.org/".parse().unwrap(),
        )
        .with_credential_group("scrapingbee");

        let outcome = executor
            .execute(Uuid::now_v7(), &request, &CancellationToken::new())
            .await;

        assert!(matches!(outcome, FetchOutcome::Exhausted { .. }));
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn pre_cancelled_token_runs_no_attempts() {
        let fetcher = MockFetcher::new().with_default(ScriptedResponse::status(503, ""));
        let (executor, _) = executor_with(fetcher, 2, Duration::ZERO);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = executor
            .execute(Uuid::now_v7(), &request(), &cancel)
            .await;
        assert!(matches!(outcome, FetchOutcome::Exhausted { attempts: 0 }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_mid_backoff() {
        let fetcher = MockFetcher::new().with_default(ScriptedResponse::status(503, ""));
        let (executor, _) = executor_with(fetcher.clone(), 3, Duration::ZERO);
        let executor = Arc::new(executor);

        let cancel = CancellationToken::new();
        let start = tokio::time::Instant::now();
        let task = tokio::spawn({
            let executor = executor.clone();
            let cancel = cancel.clone();
            let request = request();
            async move { executor.execute(Uuid::now_v7(), &request, &cancel).await }
        });

        // Attempt 1 fails instantly and starts its 2s backoff; cancel
        // one virtual second into that sleep
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        let outcome = task.await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Exhausted { attempts: 1 }));
        assert_eq!(fetcher.calls().len(), 1);
        // The remaining backoff was not slept through
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
