//! Visit analytics
//!
//! Raw visits flow one way through this module: `filter` narrows a snapshot of
//! visits to those matching a [`FilterSpec`], and `stats` reduces the survivors
//! into a [`StatsSummary`]. Both steps are pure functions of their inputs and the
//! reference clock; nothing here touches storage.

pub mod devices;
pub mod filter;
pub mod stats;

pub use devices::DeviceIndex;
pub use filter::{
    filter_events, filter_events_at, select_events, DateBounds, DateRange, FilterSpec,
    TokenFilter,
};
pub use stats::{aggregate, aggregate_at, summarize, StatsSummary, TokenCounts, TokenStats};
