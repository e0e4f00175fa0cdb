//! Collation of replicate outputs.
//!
//! Phase 1 reduces the runs of each experiment cell by cell into
//! `statistics/<exp>/<stem>.<stat>.csv`; phase 2 reduces each experiment's
//! mean table to one value per metric and assembles the batch tables under
//! `statistics/collated/`. Missing or unreadable inputs become [`Gap`]s.

mod engine;
mod gaps;
pub mod inter;
pub mod intra;
mod stats;
pub mod table;

pub use engine::{CollateConfig, CollationEngine, CollationReport};
pub use gaps::{Gap, GapReason};
pub use inter::{Reduce, SummarySpec};
pub use stats::{Sample, Stat, StatsMode};
pub use table::Table;

/// Batch summary table name.
pub const SUMMARY_FILE: &str = "summary.csv";
/// Collation report name.
pub const COLLATION_FILE: &str = "collation.json";

/// Stable error codes raised by this crate.
pub mod codes {
    /// Unreadable or non-numeric table.
    pub const MALFORMED: &str = "collate.malformed";
    pub const WRITE: &str = "collate.write";
    /// Gap encountered in strict mode.
    pub const GAP: &str = "collate.gap";
    pub const BAD_REDUCE: &str = "collate.bad_reduce";
    pub const THREAD_POOL: &str = "collate.thread_pool";
}
