//! Spot Termination Exporter
//!
//! Samples the EC2 instance-metadata service for a spot termination notice
//! on every Prometheus scrape and reports it as three gauges.

pub mod config;
pub mod metrics;
pub mod sampler;
pub mod util;

pub use config::Config;
pub use sampler::{TerminationSample, TerminationSampler};

/// Exporter version for display
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
