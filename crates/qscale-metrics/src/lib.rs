//! qscale-metrics — observation source for the QScale control loop.
//!
//! The control loop never caches metrics: every observation is a fresh
//! query against a Prometheus-compatible API. Three instant queries
//! (utilization, RTT, replica count) are assembled into one
//! [`Observation`](qscale_core::Observation).
//!
//! # Architecture
//!
//! ```text
//! MetricsSource (trait)
//!   └── PrometheusSource
//!         ├── query_value() → GET /api/v1/query?query=…
//!         └── observe()     → Observation { utilization, rtt_ms, replicas }
//!
//! Backoff — doubling retry interval for the caller to wait out
//!            metrics-source outages (1s → 60s, reset on success)
//! ```
//!
//! A failed query is never fatal; callers retry with [`Backoff`] and must
//! not proceed to reward computation without an observation.

pub mod backoff;
pub mod error;
pub mod prometheus;
pub mod source;

pub use backoff::Backoff;
pub use error::MetricsError;
pub use prometheus::PrometheusSource;
pub use source::MetricsSource;
