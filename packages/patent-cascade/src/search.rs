//! Top-level search API: per-query cascade entry point plus the
//! molecule-level aggregation the HTTP layer calls into.
//!
//! The engine is an explicit dependency: constructed once at process
//! start, then shared by handle across concurrent query tasks. No
//! globals.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::cascade::StrategyCascade;
use crate::error::{SearchError, SearchResult};
use crate::events::{EventSink, TracingSink};
use crate::extract::Extractor;
use crate::fetch::{HttpFetcher, SourceFetcher};
use crate::pool::{CredentialPool, ProxyPool};
use crate::retry::RetryExecutor;
use crate::stats::{EngineStats, StatsSnapshot};
use crate::strategy::{br_lookup_requests, default_strategies};
use crate::types::config::EngineConfig;
use crate::types::identifier::IdentifierFamily;
use crate::types::outcome::{CascadeOutcome, FetchOutcome};

/// Attempt budget per URL when resolving BR families for a WO number.
const BR_LOOKUP_ATTEMPTS: u32 = 3;

/// One molecule to search for, with its naming variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoleculeQuery {
    /// INN or common molecule name, e.g. "darolutamide"
    pub name: String,
    /// Developer codes, e.g. "ODM-201" (at most three are used)
    #[serde(default)]
    pub dev_codes: Vec<String>,
}

impl MoleculeQuery {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dev_codes: Vec::new(),
        }
    }

    pub fn with_dev_codes(mut self, codes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dev_codes = codes.into_iter().map(|c| c.into()).collect();
        self
    }

    /// The query-string variants submitted to the cascade: the plain
    /// patent query, year-hinted WO variants, and developer codes.
    pub fn build_queries(&self) -> Vec<String> {
        let mut queries = vec![format!("{} patent", self.name)];
        for year in ["WO2011", "WO2016", "WO2018", "WO2020", "WO2021", "WO2023"] {
            queries.push(format!("{} {}", self.name, year));
        }
        for code in self.dev_codes.iter().take(3) {
            queries.push(format!("{code} patent WO"));
        }
        queries
    }
}

/// Aggregated result of all queries for one molecule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoleculeReport {
    pub molecule: String,
    pub wo_numbers: Vec<String>,
    pub br_numbers: Vec<String>,
    pub summary: SearchSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSummary {
    pub total_wo: usize,
    pub total_br: usize,
    pub queries_executed: usize,
    pub attempts: u32,
}

/// The cascading resilient fetch engine.
pub struct PatentSearchEngine {
    cascade: StrategyCascade,
    executor: Arc<RetryExecutor>,
    extractor: Arc<Extractor>,
    proxies: Arc<ProxyPool>,
    stats: Arc<EngineStats>,
    config: EngineConfig,
}

impl PatentSearchEngine {
    /// Build an engine over the real network with tracing-backed events.
    pub fn new(config: EngineConfig) -> Self {
        let fetcher = Arc::new(HttpFetcher::new(
            config.request_timeout,
            config.connect_timeout,
        ));
        Self::with_fetcher(config, fetcher, Arc::new(TracingSink))
    }

    /// Build an engine with an injected fetcher and event sink.
    pub fn with_fetcher(
        config: EngineConfig,
        fetcher: Arc<dyn SourceFetcher>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let proxies = Arc::new(ProxyPool::new(
            config.proxies.clone(),
            config.quarantine.clone(),
        ));
        let credentials = Arc::new(CredentialPool::new(
            config.credentials.clone(),
            config.exhaustion,
        ));
        let stats = Arc::new(EngineStats::new());
        let extractor = Arc::new(Extractor::new());

        let executor = Arc::new(RetryExecutor::new(
            proxies.clone(),
            credentials,
            fetcher,
            config.retry.clone(),
            config.user_agents.clone(),
            stats.clone(),
            events.clone(),
        ));

        let cascade = StrategyCascade::new(
            default_strategies(),
            executor.clone(),
            extractor.clone(),
            events,
            config.strategy_pacing,
        );

        Self {
            cascade,
            executor,
            extractor,
            proxies,
            stats,
            config,
        }
    }

    /// Run one query through the cascade.
    ///
    /// Returns a completed outcome — possibly empty — for every valid
    /// query; only misuse or an expired configured deadline surface as
    /// errors.
    pub async fn search(&self, query: &str) -> SearchResult<CascadeOutcome> {
        self.search_with_cancel(query, &CancellationToken::new())
            .await
    }

    /// Run one query with caller-controlled cancellation. A token
    /// cancelled mid-flight yields a clean `Exhausted` outcome.
    pub async fn search_with_cancel(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> SearchResult<CascadeOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::InvalidQuery {
                reason: "query must not be empty".to_string(),
            });
        }

        match self.config.query_deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.cascade.run(query, cancel))
                .await
                .map_err(|_| SearchError::DeadlineExceeded),
            None => Ok(self.cascade.run(query, cancel).await),
        }
    }

    /// Resolve the BR family members of a WO publication, trying the
    /// lookup sources in order until one yields BR numbers.
    pub async fn br_for_wo(
        &self,
        wo_number: &str,
        cancel: &CancellationToken,
    ) -> BTreeSet<String> {
        let query_id = Uuid::now_v7();
        for request in br_lookup_requests(wo_number) {
            if cancel.is_cancelled() {
                break;
            }
            let outcome = self
                .executor
                .execute_limited(query_id, &request, cancel, BR_LOOKUP_ATTEMPTS)
                .await;
            if let FetchOutcome::Success { body, .. } = outcome {
                let br = self.extractor.extract(&body, IdentifierFamily::Br);
                if !br.is_empty() {
                    info!(
                        wo_number = %wo_number,
                        source = request.source,
                        br_count = br.len(),
                        "BR family resolved"
                    );
                    return br;
                }
            }
            self.pace(cancel).await;
        }
        BTreeSet::new()
    }

    /// Full molecule search: run every query variant through the
    /// cascade, union the WO numbers, then resolve BR families per WO.
    /// Always completes with a report, even when everything came up
    /// empty.
    pub async fn search_molecule(
        &self,
        molecule: &MoleculeQuery,
    ) -> SearchResult<MoleculeReport> {
        if molecule.name.trim().is_empty() {
            return Err(SearchError::InvalidQuery {
                reason: "molecule name must not be empty".to_string(),
            });
        }

        let cancel = CancellationToken::new();
        let queries = molecule.build_queries();
        info!(
            molecule = %molecule.name,
            queries = queries.len(),
            "molecule search starting"
        );

        let mut wo_numbers: BTreeSet<String> = BTreeSet::new();
        let mut br_numbers: BTreeSet<String> = BTreeSet::new();
        let mut attempts = 0u32;

        for (i, query) in queries.iter().enumerate() {
            let outcome = self.search_with_cancel(query, &cancel).await?;
            attempts += outcome.attempts;
            for id in outcome.identifiers {
                if id.starts_with("WO") {
                    wo_numbers.insert(id);
                } else {
                    br_numbers.insert(id);
                }
            }
            if i + 1 < queries.len() {
                self.pace(&cancel).await;
            }
        }

        for wo in wo_numbers.clone() {
            br_numbers.extend(self.br_for_wo(&wo, &cancel).await);
            self.pace(&cancel).await;
        }

        info!(
            molecule = %molecule.name,
            total_wo = wo_numbers.len(),
            total_br = br_numbers.len(),
            attempts,
            "molecule search finished"
        );

        Ok(MoleculeReport {
            molecule: molecule.name.clone(),
            summary: SearchSummary {
                total_wo: wo_numbers.len(),
                total_br: br_numbers.len(),
                queries_executed: queries.len(),
                attempts,
            },
            wo_numbers: wo_numbers.into_iter().collect(),
            br_numbers: br_numbers.into_iter().collect(),
        })
    }

    /// Engine snapshot for observability collaborators; never blocks
    /// in-flight queries.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.proxies.stats())
    }

    async fn pace(&self, cancel: &CancellationToken) {
        if self.config.lookup_pacing.is_zero() {
            return;
        }
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(self.config.lookup_pacing) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_variants_cover_name_years_and_dev_codes() {
        let molecule = MoleculeQuery::new("darolutamide")
            .with_dev_codes(["ODM-201", "BAY-1841788", "X-1", "ignored-4th"]);
        let queries = molecule.build_queries();

        assert_eq!(queries[0], "darolutamide patent");
        assert_eq!(queries[1], "darolutamide WO2011");
        assert!(queries.contains(&"ODM-201 patent WO".to_string()));
        // At most three dev codes contribute
        assert_eq!(queries.len(), 1 + 6 + 3);
        assert!(!queries.iter().any(|q| q.contains("ignored-4th")));
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let engine = PatentSearchEngine::new(EngineConfig::default());
        let err = engine.search("   ").await.unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery { .. }));
    }

    #[tokio::test]
    async fn empty_molecule_name_is_rejected() {
        let engine = PatentSearchEngine::new(EngineConfig::default());
        let err = engine
            .search_molecule(&MoleculeQuery::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery { .. }));
    }
}
