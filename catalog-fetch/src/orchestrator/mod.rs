//! Source orchestrator: primary/fallback merge, dedup, ranking.
//!
//! This module queries the primary provider, tops up a shortfall from the
//! fallback, deduplicates by normalized title (first occurrence wins, so
//! the primary is preferred), ranks by popularity and truncates.

pub mod dedup;
pub mod ranking;
pub mod source;

pub use source::{OrchestratorStats, SourceOrchestrator};
