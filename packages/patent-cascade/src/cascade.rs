//! The strategy cascade: an explicit state machine over the fixed
//! source order.
//!
//! From `Pending(i)` the cascade runs strategy i through the retry
//! executor. Exhaustion or an empty extraction advances to
//! `Pending(i + 1)`; a non-empty extraction terminates in `Succeeded`.
//! There is no retry across strategies beyond the single ordered pass,
//! so a query costs at most `strategies x attempts` network calls.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::events::{EngineEvent, EventSink};
use crate::extract::Extractor;
use crate::retry::RetryExecutor;
use crate::strategy::Strategy;
use crate::types::outcome::{CascadeOutcome, FetchOutcome, StrategyMatch};

pub struct StrategyCascade {
    strategies: Vec<Strategy>,
    executor: Arc<RetryExecutor>,
    extractor: Arc<Extractor>,
    events: Arc<dyn EventSink>,
    /// Pause after a failed or empty strategy before the next one
    pacing: Duration,
}

enum CascadeState {
    Pending(usize),
    Succeeded {
        matched: StrategyMatch,
        identifiers: std::collections::BTreeSet<String>,
    },
    Exhausted,
}

impl StrategyCascade {
    pub fn new(
        strategies: Vec<Strategy>,
        executor: Arc<RetryExecutor>,
        extractor: Arc<Extractor>,
        events: Arc<dyn EventSink>,
        pacing: Duration,
    ) -> Self {
        Self {
            strategies,
            executor,
            extractor,
            events,
            pacing,
        }
    }

    /// Drive the query through the ordered strategies until one yields
    /// a non-empty extraction or all are exhausted. Both terminal states
    /// produce a completed outcome; cancellation lands in `Exhausted`.
    pub async fn run(&self, query: &str, cancel: &CancellationToken) -> CascadeOutcome {
        let query_id = Uuid::now_v7();
        let mut attempts = 0u32;
        let mut state = CascadeState::Pending(0);

        let state = loop {
            state = match state {
                CascadeState::Pending(index) => {
                    let Some(strategy) = self.strategies.get(index) else {
                        break CascadeState::Exhausted;
                    };
                    if cancel.is_cancelled() {
                        break CascadeState::Exhausted;
                    }

                    self.events.record(&EngineEvent::StrategyStarted {
                        query_id,
                        source: strategy.name.to_string(),
                        priority: index + 1,
                    });

                    let request = strategy.request(query);
                    match self.executor.execute(query_id, &request, cancel).await {
                        FetchOutcome::Exhausted { attempts: used } => {
                            attempts += used;
                            self.events.record(&EngineEvent::StrategyExhausted {
                                query_id,
                                source: strategy.name.to_string(),
                                attempts: used,
                            });
                            self.pace(cancel).await;
                            CascadeState::Pending(index + 1)
                        }
                        FetchOutcome::Success { body, attempts: used } => {
                            attempts += used;
                            let identifiers = self.extractor.extract_all(&body);
                            if identifiers.is_empty() {
                                // Content without identifiers does not
                                // count as success
                                self.events.record(&EngineEvent::StrategyEmpty {
                                    query_id,
                                    source: strategy.name.to_string(),
                                });
                                self.pace(cancel).await;
                                CascadeState::Pending(index + 1)
                            } else {
                                self.events.record(&EngineEvent::StrategyMatched {
                                    query_id,
                                    source: strategy.name.to_string(),
                                    identifiers: identifiers.len(),
                                });
                                CascadeState::Succeeded {
                                    matched: StrategyMatch {
                                        priority: index + 1,
                                        name: strategy.name.to_string(),
                                    },
                                    identifiers,
                                }
                            }
                        }
                    }
                }
                terminal => break terminal,
            };
        };

        let outcome = match state {
            CascadeState::Succeeded {
                matched,
                identifiers,
            } => CascadeOutcome {
                query_id,
                query: query.to_string(),
                matched: Some(matched),
                identifiers,
                attempts,
            },
            _ => CascadeOutcome::exhausted(query_id, query, attempts),
        };

        self.events.record(&EngineEvent::CascadeFinished {
            query_id,
            succeeded: !outcome.is_exhausted(),
            attempts,
        });
        outcome
    }

    async fn pace(&self, cancel: &CancellationToken) {
        if self.pacing.is_zero() {
            return;
        }
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(self.pacing) => {}
        }
    }
}
