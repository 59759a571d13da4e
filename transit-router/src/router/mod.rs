//! Multi-criteria label-setting search.
//!
//! This module answers the core question of the engine: from one
//! station, which labels — (time, transfers, walk distance) summaries
//! of partial paths — are Pareto-optimal at every reachable node? The
//! search is priority-driven and settles labels in time order, which
//! makes it safe to stop early, cap the explored node count, or consume
//! settled labels lazily one at a time.

mod config;
mod label;
mod search;
mod weighting;

pub use config::{InvalidConfig, SearchConfig};
pub use label::{Criteria, Frontier, FrontierStore, Label, LabelArena, LabelId, LabelSource};
pub use search::{
    LabelStream, MultiCriteriaSearch, Router, SearchError, SearchOutcome, SearchRequest,
    SearchResult,
};
pub use weighting::{EdgeCost, Weighting};
