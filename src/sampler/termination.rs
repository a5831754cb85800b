//! Spot termination sampler
//!
//! Turns one metadata response into the three termination gauges.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use metrics::counter;
use prometheus::core::{Collector, Desc, Describer};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, Opts};
use reqwest::StatusCode;
use tracing::{debug, error, info};

use super::transport::{HttpTransport, MetadataTransport, TransportError};
use crate::config::MetadataConfig;
use crate::metrics::Scrape;

/// Notice timestamp format, as documented by AWS
///
/// `%.f` also accepts an optional fractional second before the `Z`.
pub const NOTICE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// The gauges a sample can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationMetric {
    Available,
    Imminent,
    Remaining,
}

impl TerminationMetric {
    pub const ALL: [TerminationMetric; 3] = [
        TerminationMetric::Available,
        TerminationMetric::Imminent,
        TerminationMetric::Remaining,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TerminationMetric::Available => "metadata_service_available",
            TerminationMetric::Imminent => "termination_imminent",
            TerminationMetric::Remaining => "termination_in",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            TerminationMetric::Available => "Metadata service available",
            TerminationMetric::Imminent => "Instance is about to be terminated",
            TerminationMetric::Remaining => "Instance will be terminated in",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Descriptors of the termination gauges, built once per sampler
#[derive(Debug, Clone)]
pub struct TerminationDescriptors {
    opts: [Opts; 3],
}

impl TerminationDescriptors {
    pub fn new() -> Self {
        Self {
            opts: TerminationMetric::ALL.map(|m| Opts::new(m.name(), m.help())),
        }
    }

    pub fn opts(&self, metric: TerminationMetric) -> &Opts {
        &self.opts[metric.index()]
    }

    /// Validated descriptors, in [`TerminationMetric::ALL`] order
    pub fn describe(&self) -> prometheus::Result<Vec<Desc>> {
        self.opts.iter().map(|opts| opts.describe()).collect()
    }
}

impl Default for TerminationDescriptors {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TerminationSample {
    /// The metadata service could not be reached
    Unavailable,
    /// No parsable termination notice is posted
    NoNotice,
    /// A notice is posted; `remaining` is set only while it lies in the future
    Notice { remaining: Option<Duration> },
}

impl TerminationSample {
    pub fn is_available(&self) -> bool {
        !matches!(self, TerminationSample::Unavailable)
    }

    /// `None` when the service was unavailable
    pub fn notice_present(&self) -> Option<bool> {
        match self {
            TerminationSample::Unavailable => None,
            TerminationSample::NoNotice => Some(false),
            TerminationSample::Notice { .. } => Some(true),
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        match self {
            TerminationSample::Notice { remaining } => *remaining,
            _ => None,
        }
    }

    /// Gauge values this sample emits, in descriptor order
    pub fn values(&self) -> Vec<(TerminationMetric, f64)> {
        let mut out = vec![(TerminationMetric::Available, bool_gauge(self.is_available()))];
        if let Some(notice) = self.notice_present() {
            out.push((TerminationMetric::Imminent, bool_gauge(notice)));
        }
        if let Some(remaining) = self.remaining() {
            out.push((TerminationMetric::Remaining, remaining.as_secs_f64()));
        }
        out
    }

    /// Classify a notice body against the current time
    ///
    /// Empty and non-timestamp bodies both count as no notice.
    pub fn from_notice(body: &str, now: DateTime<Utc>) -> Self {
        match parse_notice_time(body) {
            Some(at) => TerminationSample::Notice {
                // to_std fails for zero and negative spans
                remaining: (at - now).to_std().ok().filter(|d| !d.is_zero()),
            },
            None => TerminationSample::NoNotice,
        }
    }
}

#[inline]
fn bool_gauge(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Parse a notice body as `YYYY-MM-DDTHH:MM:SS[.fff]Z`
pub fn parse_notice_time(body: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(body, NOTICE_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Collector over one already-taken sample
///
/// Describes all three gauges but only yields the families the sample
/// produced.
pub struct TerminationCollector {
    gauges: Vec<Gauge>,
    present: Vec<TerminationMetric>,
}

impl TerminationCollector {
    pub fn new(descs: &TerminationDescriptors, sample: TerminationSample) -> prometheus::Result<Self> {
        let gauges = TerminationMetric::ALL
            .iter()
            .map(|m| Gauge::with_opts(descs.opts(*m).clone()))
            .collect::<prometheus::Result<Vec<_>>>()?;

        let mut present = Vec::with_capacity(3);
        for (metric, value) in sample.values() {
            gauges[metric.index()].set(value);
            present.push(metric);
        }

        Ok(Self { gauges, present })
    }
}

impl Collector for TerminationCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.gauges.iter().flat_map(|g| g.desc()).collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.present
            .iter()
            .flat_map(|m| self.gauges[m.index()].collect())
            .collect()
    }
}

/// Samples the termination notice on demand
pub struct TerminationSampler<T = HttpTransport> {
    transport: T,
    descs: TerminationDescriptors,
}

impl TerminationSampler<HttpTransport> {
    /// Build a sampler with its own HTTP client
    pub fn from_config(config: &MetadataConfig) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(config.url.clone(), config.timeout())?;
        Ok(Self::new(transport))
    }
}

impl<T: MetadataTransport> TerminationSampler<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            descs: TerminationDescriptors::new(),
        }
    }

    pub fn descriptors(&self) -> &TerminationDescriptors {
        &self.descs
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Take one sample against the wall clock
    pub async fn sample(&self) -> TerminationSample {
        self.sample_with_clock(Utc::now).await
    }

    /// Take one sample; `now` is read after the body has been received
    pub async fn sample_with_clock<F>(&self, now: F) -> TerminationSample
    where
        F: FnOnce() -> DateTime<Utc> + Send,
    {
        info!("Fetching termination data from metadata service");
        counter!("spot_exporter_samples_total").increment(1);

        let response = match self.transport.fetch().await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Failed to fetch data from metadata service");
                counter!("spot_exporter_metadata_errors_total").increment(1);
                return TerminationSample::Unavailable;
            }
        };

        // The body is dropped on every return below
        let mut body = response.body;

        if response.status == StatusCode::NOT_FOUND {
            return TerminationSample::NoNotice;
        }

        let text = match body.read_text().await {
            Ok(text) => text,
            Err(e) => {
                debug!(error = %e, "Could not read termination notice body");
                return TerminationSample::NoNotice;
            }
        };

        let sample = TerminationSample::from_notice(&text, now());
        match sample {
            TerminationSample::NoNotice => {
                debug!(status = %response.status, body = %text, "Termination notice is not a timestamp");
            }
            TerminationSample::Notice { remaining } => {
                counter!("spot_exporter_notices_total").increment(1);
                info!(
                    notice = %text,
                    remaining_secs = remaining.map(|d| d.as_secs_f64()),
                    "Spot termination notice posted"
                );
            }
            TerminationSample::Unavailable => {}
        }
        sample
    }
}

#[async_trait]
impl<T: MetadataTransport> Scrape for TerminationSampler<T> {
    fn describe(&self) -> prometheus::Result<Vec<Desc>> {
        self.descs.describe()
    }

    async fn scrape(&self) -> prometheus::Result<Box<dyn Collector>> {
        let sample = self.sample().await;
        Ok(Box::new(TerminationCollector::new(&self.descs, sample)?))
    }
}
