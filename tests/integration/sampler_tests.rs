//! Termination sampler integration tests

mod common;

use std::time::{Duration, Instant};

use prometheus::core::Collector;
use reqwest::StatusCode;
use spot_termination_exporter::config::MetadataConfig;
use spot_termination_exporter::metrics::{encode_text, Scrape};
use spot_termination_exporter::sampler::{HttpTransport, MetadataTransport, TransportError};
use spot_termination_exporter::{TerminationSample, TerminationSampler};

use common::{notice_at, CannedTransport, MetadataStub};

fn values(sample: TerminationSample) -> Vec<(&'static str, f64)> {
    sample.values().into_iter().map(|(m, v)| (m.name(), v)).collect()
}

#[tokio::test]
async fn test_transport_failure_emits_availability_only() {
    let sampler = TerminationSampler::new(CannedTransport::failing());
    let observations = values(sampler.sample().await);

    assert_eq!(observations, vec![("metadata_service_available", 0.0)]);
    assert_eq!(sampler.transport().opened(), 0);
}

#[tokio::test]
async fn test_not_found_emits_no_notice() {
    let sampler = TerminationSampler::new(CannedTransport::respond(StatusCode::NOT_FOUND, ""));
    let observations = values(sampler.sample().await);

    assert_eq!(
        observations,
        vec![("metadata_service_available", 1.0), ("termination_imminent", 0.0)]
    );
}

#[tokio::test]
async fn test_garbage_body_emits_no_notice() {
    let sampler =
        TerminationSampler::new(CannedTransport::respond(StatusCode::OK, "not-a-timestamp"));
    let observations = values(sampler.sample().await);

    assert_eq!(
        observations,
        vec![("metadata_service_available", 1.0), ("termination_imminent", 0.0)]
    );
}

#[tokio::test]
async fn test_future_notice_emits_countdown() {
    let sampler = TerminationSampler::new(CannedTransport::respond(StatusCode::OK, notice_at(300)));
    let observations = values(sampler.sample().await);

    assert_eq!(observations.len(), 3);
    assert_eq!(observations[0], ("metadata_service_available", 1.0));
    assert_eq!(observations[1], ("termination_imminent", 1.0));
    assert_eq!(observations[2].0, "termination_in");
    // Formatting truncates to whole seconds
    let remaining = observations[2].1;
    assert!(remaining > 298.0 && remaining <= 300.0, "remaining {}", remaining);
}

#[tokio::test]
async fn test_scrape_encodes_only_present_gauges() {
    let sampler = TerminationSampler::new(CannedTransport::respond(StatusCode::NOT_FOUND, ""));
    let collector = sampler.scrape().await.unwrap();
    let text = encode_text(&collector.collect()).unwrap();

    assert!(text.contains("# TYPE metadata_service_available gauge\n"));
    assert!(text.contains("# HELP termination_imminent Instance is about to be terminated\n"));
    assert!(!text.contains("termination_in"));
}

#[tokio::test]
async fn test_past_notice_omits_countdown() {
    let sampler = TerminationSampler::new(CannedTransport::respond(StatusCode::OK, notice_at(-10)));
    let observations = values(sampler.sample().await);

    assert_eq!(
        observations,
        vec![("metadata_service_available", 1.0), ("termination_imminent", 1.0)]
    );
}

#[tokio::test]
async fn test_repeated_samples_are_identical() {
    let sampler = TerminationSampler::new(CannedTransport::respond(
        StatusCode::OK,
        "2004-02-29T00:00:00Z",
    ));

    let first = sampler.sample().await;
    for _ in 0..5 {
        assert_eq!(sampler.sample().await, first);
    }
    assert_eq!(first, TerminationSample::Notice { remaining: None });
}

#[tokio::test]
async fn test_body_released_once_per_sample() {
    let cases = [
        (StatusCode::NOT_FOUND, String::new()),
        (StatusCode::OK, "not-a-timestamp".to_string()),
        (StatusCode::OK, notice_at(-10)),
        (StatusCode::OK, notice_at(300)),
    ];

    for (status, body) in cases {
        let sampler = TerminationSampler::new(CannedTransport::respond(status, body));
        for round in 1..=3 {
            sampler.sample().await;
            assert_eq!(sampler.transport().opened(), round);
            assert_eq!(sampler.transport().closed(), round);
        }
    }
}

#[tokio::test]
async fn test_http_not_found() {
    let stub = MetadataStub::spawn(404, "<html>404 - Not Found</html>").await;
    let sampler = TerminationSampler::new(HttpTransport::new(stub.url(), Duration::from_secs(1)).unwrap());

    assert_eq!(sampler.sample().await, TerminationSample::NoNotice);
    assert_eq!(stub.hits(), 1);
}

#[tokio::test]
async fn test_http_future_notice() {
    let stub = MetadataStub::spawn(200, notice_at(120)).await;
    let sampler = TerminationSampler::new(HttpTransport::new(stub.url(), Duration::from_secs(1)).unwrap());

    let remaining = sampler.sample().await.remaining().unwrap();
    assert!(remaining > Duration::from_secs(118) && remaining <= Duration::from_secs(120));
}

#[tokio::test]
async fn test_http_server_error_is_no_notice() {
    let stub = MetadataStub::spawn(500, "Internal Server Error").await;
    let sampler = TerminationSampler::new(HttpTransport::new(stub.url(), Duration::from_secs(1)).unwrap());

    assert_eq!(sampler.sample().await, TerminationSample::NoNotice);
}

#[tokio::test]
async fn test_http_timeout_is_bounded() {
    let stub = MetadataStub::spawn_silent().await;
    let transport = HttpTransport::new(stub.url(), Duration::from_millis(200)).unwrap();

    let started = Instant::now();
    let err = transport.fetch().await.unwrap_err();
    assert!(matches!(err, TransportError::Timeout), "got {:?}", err);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_default_timeout_marks_unavailable() {
    let stub = MetadataStub::spawn_silent().await;
    let config = MetadataConfig {
        url: stub.url(),
        ..MetadataConfig::default()
    };
    let sampler = TerminationSampler::from_config(&config).unwrap();

    let started = Instant::now();
    assert_eq!(sampler.sample().await, TerminationSample::Unavailable);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(900), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "elapsed {:?}", elapsed);
}
