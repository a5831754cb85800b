//! Exporter self-metrics
//!
//! Counters about the exporter itself are recorded through the `metrics`
//! facade and rendered by a Prometheus recorder next to the registry output.

use anyhow::Result;
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::MetricsConfig;

/// Install the self-metrics recorder if enabled
///
/// Without an installed recorder the `counter!` calls in the sampler are
/// no-ops.
pub fn init_metrics(config: &MetricsConfig) -> Result<Option<PrometheusHandle>> {
    if !config.self_metrics {
        return Ok(None);
    }

    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!("spot_exporter_samples_total", "Termination samples taken");
    describe_counter!(
        "spot_exporter_metadata_errors_total",
        "Samples where the metadata service could not be reached"
    );
    describe_counter!(
        "spot_exporter_notices_total",
        "Samples that found a parsable termination notice"
    );

    Ok(Some(handle))
}
