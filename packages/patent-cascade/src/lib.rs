//! Cascading Resilient Patent-Fetch Engine
//!
//! Extracts patent identifiers (WO/BR publication numbers) for a named
//! chemical entity by querying multiple independent, unreliable patent
//! databases through rotating egress proxies. External sources
//! rate-limit, block, or intermittently fail; proxies degrade; every
//! query still converges on a result with bounded latency and bounded
//! retries.
//!
//! # Architecture
//!
//! Two nested, explicit state machines do the resilience work:
//!
//! - [`retry::RetryExecutor`] — one logical network call: bounded
//!   attempts with exponential backoff and jitter over a rotating pool
//!   of proxies and credentials, with automatic quarantine of failing
//!   proxies.
//! - [`cascade::StrategyCascade`] — one query: an ordered pass over
//!   the source strategies, stopping at the first non-empty extraction.
//!
//! Both terminate in explicit values (`Success`/`Exhausted`), never
//! propagated network errors: the caller always gets a completed
//! response, possibly with an empty identifier set.
//!
//! # Usage
//!
//! ```rust,ignore
//! use patent_cascade::{EngineConfig, PatentSearchEngine, ProxyEndpoint};
//!
//! let config = EngineConfig::new().with_proxies(proxies);
//! let engine = PatentSearchEngine::new(config);
//!
//! let outcome = engine.search("darolutamide patent").await?;
//! for id in &outcome.identifiers {
//!     println!("{id}");
//! }
//! ```
//!
//! # Modules
//!
//! - [`pool`] - Proxy and credential pools with health tracking
//! - [`retry`] - Bounded retry with backoff over rotating egress
//! - [`extract`] - Pattern-based identifier extraction
//! - [`cascade`] - The ordered strategy cascade
//! - [`search`] - Top-level engine and molecule aggregation
//! - [`testing`] - Mock implementations for testing

pub mod cascade;
pub mod clock;
pub mod error;
pub mod events;
pub mod extract;
pub mod fetch;
pub mod pool;
pub mod retry;
pub mod search;
pub mod stats;
pub mod strategy;
pub mod testing;
pub mod types;

// Re-export core types at crate root
pub use cascade::StrategyCascade;
pub use clock::{Clock, SystemClock};
pub use error::{FetchError, SearchError};
pub use events::{EngineEvent, EventSink, FailureKind, TracingSink};
pub use extract::{Extractor, PatternSet};
pub use fetch::{FetchRequest, FetchResponse, FetchVia, HttpFetcher, SourceFetcher};
pub use pool::{
    Credential, CredentialPool, CredentialSpec, Proxy, ProxyEndpoint, ProxyPool, ProxyPoolStats,
};
pub use retry::RetryExecutor;
pub use search::{MoleculeQuery, MoleculeReport, PatentSearchEngine, SearchSummary};
pub use stats::{EngineStats, StatsSnapshot};
pub use strategy::{br_lookup_requests, default_strategies, Strategy};
pub use types::{
    CascadeOutcome, EngineConfig, ExhaustionPolicy, FetchOutcome, IdentifierFamily,
    QuarantinePolicy, RetryConfig, StrategyMatch,
};
