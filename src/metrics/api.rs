//! HTTP endpoint for Prometheus scraping
//!
//! Serves:
//! - GET /metrics - Collect from the registry and render text format
//! - GET /health - Liveness check
//! - GET / - Endpoint listing

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::scrape::{ScrapeRegistry, TEXT_FORMAT};
use crate::VERSION;

const JSON: &str = "application/json";

/// Response for the /health endpoint
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

struct ApiState {
    registry: ScrapeRegistry,
    self_metrics: Option<PrometheusHandle>,
}

/// Pull endpoint that samples collectors on every scrape
pub struct MetricsServer {
    listener: TcpListener,
    state: Arc<ApiState>,
}

impl MetricsServer {
    /// Bind the listener
    pub async fn bind(
        addr: SocketAddr,
        registry: ScrapeRegistry,
        self_metrics: Option<PrometheusHandle>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind metrics endpoint to {}", addr))?;

        Ok(Self {
            listener,
            state: Arc::new(ApiState {
                registry,
                self_metrics,
            }),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept scrapes until `shutdown` flips to true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(addr = %self.local_addr()?, "Metrics endpoint listening");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let state = self.state.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, &state).await {
                                    debug!(%peer, error = %e, "Request handling error");
                                }
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Metrics endpoint stopped");
        Ok(())
    }
}

struct Reply {
    status: &'static str,
    content_type: &'static str,
    body: String,
}

impl Reply {
    fn json(status: &'static str, body: String) -> Self {
        Self {
            status,
            content_type: JSON,
            body,
        }
    }
}

async fn handle_connection(mut stream: TcpStream, state: &ApiState) -> std::io::Result<()> {
    let mut buffer = [0u8; 1024];
    let n = stream.read(&mut buffer).await?;

    if n == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buffer[..n]);
    let first_line = request.lines().next().unwrap_or("");
    let mut parts = first_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("/");
    let path = target.split('?').next().unwrap_or(target);

    let reply = route(method, path, state).await;
    let head_only = method == "HEAD";

    let response = format!(
        "HTTP/1.1 {}\r\n\
         Content-Type: {}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        reply.status,
        reply.content_type,
        reply.body.len(),
        if head_only { "" } else { reply.body.as_str() }
    );

    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;

    Ok(())
}

async fn route(method: &str, path: &str, state: &ApiState) -> Reply {
    if method != "GET" && method != "HEAD" {
        return Reply::json(
            "405 Method Not Allowed",
            r#"{"error": "Method not allowed"}"#.to_string(),
        );
    }

    match path {
        "/metrics" => match state.registry.render().await {
            Ok(mut body) => {
                if let Some(handle) = &state.self_metrics {
                    body.push_str(&handle.render());
                }
                Reply {
                    status: "200 OK",
                    content_type: TEXT_FORMAT,
                    body,
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to encode metrics");
                Reply::json(
                    "500 Internal Server Error",
                    r#"{"error": "Failed to encode metrics"}"#.to_string(),
                )
            }
        },
        "/health" => {
            let health = HealthResponse {
                status: "ok",
                version: VERSION,
            };
            Reply::json("200 OK", serde_json::to_string(&health).unwrap_or_default())
        }
        "/" => {
            let help = r#"{
  "endpoints": {
    "/metrics": "Spot termination metrics (Prometheus text format)",
    "/health": "Liveness check"
  }
}"#;
            Reply::json("200 OK", help.to_string())
        }
        _ => Reply::json("404 Not Found", r#"{"error": "Not found"}"#.to_string()),
    }
}
