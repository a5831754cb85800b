//! Scripted transport for unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::transport::{MetadataResponse, MetadataTransport, ResponseBody, TransportError};

#[derive(Clone)]
pub enum Script {
    Fail,
    Respond(StatusCode, &'static str),
    BrokenBody(StatusCode),
    /// Body text computed at fetch time
    RespondWith(StatusCode, fn() -> String),
}

#[derive(Default)]
pub struct Counters {
    pub fetches: AtomicUsize,
    pub bodies_opened: AtomicUsize,
    pub bodies_dropped: AtomicUsize,
    pub bodies_read: AtomicUsize,
}

pub struct MockTransport {
    script: Script,
    pub counters: Arc<Counters>,
}

impl MockTransport {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            counters: Arc::new(Counters::default()),
        }
    }

    fn body(&self, text: Option<String>) -> Box<dyn ResponseBody> {
        self.counters.bodies_opened.fetch_add(1, Ordering::SeqCst);
        Box::new(MockBody {
            text,
            counters: self.counters.clone(),
        })
    }
}

#[async_trait]
impl MetadataTransport for MockTransport {
    async fn fetch(&self) -> Result<MetadataResponse, TransportError> {
        self.counters.fetches.fetch_add(1, Ordering::SeqCst);
        let (status, text) = match &self.script {
            Script::Fail => return Err(TransportError::Timeout),
            Script::Respond(status, text) => (*status, Some(text.to_string())),
            Script::BrokenBody(status) => (*status, None),
            Script::RespondWith(status, make) => (*status, Some(make())),
        };
        Ok(MetadataResponse {
            status,
            body: self.body(text),
        })
    }
}

struct MockBody {
    text: Option<String>,
    counters: Arc<Counters>,
}

#[async_trait]
impl ResponseBody for MockBody {
    async fn read_text(&mut self) -> Result<String, TransportError> {
        self.counters.bodies_read.fetch_add(1, Ordering::SeqCst);
        self.text
            .clone()
            .ok_or_else(|| TransportError::Body("connection reset".to_string()))
    }
}

impl Drop for MockBody {
    fn drop(&mut self) {
        self.counters.bodies_dropped.fetch_add(1, Ordering::SeqCst);
    }
}
