//! Core data types for the fetch engine.

pub mod config;
pub mod identifier;
pub mod outcome;

pub use config::{EngineConfig, ExhaustionPolicy, QuarantinePolicy, RetryConfig};
pub use identifier::IdentifierFamily;
pub use outcome::{CascadeOutcome, FetchOutcome, StrategyMatch};
