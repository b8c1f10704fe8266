//! Per-query and per-call result types.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one retry sequence for a single logical network call.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// A source served content within the bounded attempt budget
    Success { body: String, attempts: u32 },
    /// Every attempt failed; no body was obtained
    Exhausted { attempts: u32 },
}

impl FetchOutcome {
    /// Attempts consumed by this retry sequence.
    pub fn attempts(&self) -> u32 {
        match self {
            FetchOutcome::Success { attempts, .. } => *attempts,
            FetchOutcome::Exhausted { attempts } => *attempts,
        }
    }
}

/// The strategy that produced a non-empty extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyMatch {
    /// 1-based position in the fixed cascade order
    pub priority: usize,
    /// Strategy name (e.g. "espacenet")
    pub name: String,
}

/// Result of running the full strategy cascade for one query.
///
/// An exhausted cascade is a valid empty outcome, never an error: the
/// caller always receives a completed response, possibly with an empty
/// identifier set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeOutcome {
    /// Trace identity for this query execution
    pub query_id: Uuid,
    /// The query string as submitted
    pub query: String,
    /// Which strategy succeeded, if any
    pub matched: Option<StrategyMatch>,
    /// Normalized, deduplicated identifiers (empty when exhausted)
    pub identifiers: BTreeSet<String>,
    /// Network attempts consumed across all strategies (ceiling: 5 x 5)
    pub attempts: u32,
}

impl CascadeOutcome {
    pub(crate) fn exhausted(query_id: Uuid, query: &str, attempts: u32) -> Self {
        Self {
            query_id,
            query: query.to_string(),
            matched: None,
            identifiers: BTreeSet::new(),
            attempts,
        }
    }

    /// True when no strategy produced a non-empty extraction.
    pub fn is_exhausted(&self) -> bool {
        self.matched.is_none()
    }
}
