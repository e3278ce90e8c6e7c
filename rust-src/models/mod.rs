//! Domain types shared by the parser, the store and the report.

mod load;
mod usage_record;

pub use load::{ImportStats, LoadMode, LoadSummary, WriteCounts};
pub use usage_record::{
    DailyEntry,
    DailyUsageRecord,
    ModelUsageRecord,
    TokenCounts,
    UsageReport,
};
