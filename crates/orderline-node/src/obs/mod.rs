//! Lightweight in-process metrics.
//!
//! Counters, gauges and histograms keyed by label sets, rendered in the
//! Prometheus text format by `OrdererMetrics::render`.

pub mod metrics;

pub use metrics::OrdererMetrics;
