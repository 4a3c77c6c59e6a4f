//! One synchronization cycle and its stages.
//!
//! ```text
//! IDLE ──open, list──→ LISTING ──filter──→ FILTERING ──fetch/parse──→ FETCHING ──→ CLOSED
//!   └────────────┴──────────── any failure ─────────────┴──────────────────────→ ERRORED
//! ```

mod cycle;
mod filter;
mod pipeline;

pub use cycle::{CycleState, CycleSummary, SyncCycle};
pub use filter::{filter_new, select_undelivered};
pub use pipeline::{FetchPipeline, PipelineOutcome};
