//! Metrics and observability
//!
//! Pull-based collection: every scrape of the HTTP endpoint samples the
//! registered targets and encodes them with the `prometheus` text encoder.

mod api;
mod exporter;
mod scrape;

pub use api::MetricsServer;
pub use exporter::init_metrics;
pub use scrape::*;
