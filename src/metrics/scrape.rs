//! Scrape-time collection
//!
//! Targets are sampled once per scrape. Each scrape registers the fresh
//! collectors in a new `prometheus::Registry` and text-encodes the result,
//! so no values are shared between overlapping scrapes.

use std::sync::Arc;

use async_trait::async_trait;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Registry, TextEncoder};

pub use prometheus::TEXT_FORMAT;

/// Source of metrics sampled on every scrape
#[async_trait]
pub trait Scrape: Send + Sync {
    /// Every metric this target may ever emit
    fn describe(&self) -> prometheus::Result<Vec<Desc>>;

    /// Sample now and return a collector over the fresh values
    async fn scrape(&self) -> prometheus::Result<Box<dyn Collector>>;
}

/// Descriptor-only collector, used to reject clashes at startup
struct Catalog {
    descs: Vec<Desc>,
}

impl Collector for Catalog {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        Vec::new()
    }
}

/// Scrape targets handed in explicitly by the application
#[derive(Default)]
pub struct ScrapeRegistry {
    targets: Vec<Arc<dyn Scrape>>,
    catalog: Registry,
}

impl ScrapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target; fails on invalid or already registered descriptors
    pub fn register(&mut self, target: Arc<dyn Scrape>) -> prometheus::Result<()> {
        let descs = target.describe()?;
        self.catalog.register(Box::new(Catalog { descs }))?;
        self.targets.push(target);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Sample every target and gather the families it produced
    pub async fn gather(&self) -> prometheus::Result<Vec<MetricFamily>> {
        let registry = Registry::new();
        for target in &self.targets {
            registry.register(target.scrape().await?)?;
        }
        Ok(registry.gather())
    }

    /// Gather and encode in the text exposition format
    pub async fn render(&self) -> prometheus::Result<String> {
        encode_text(&self.gather().await?)
    }
}

/// Encode families in the Prometheus text format
pub fn encode_text(families: &[MetricFamily]) -> prometheus::Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
