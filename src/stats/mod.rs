//! Statistics and metrics
//!
//! Provides observability into a running session.

pub mod metrics;

pub use metrics::{SessionStats, StatsCollector};
