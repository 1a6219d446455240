//! Failure handling: nothing here may stop the loop

use std::fs;

use assert_matches::assert_matches;
use minilide_monitor::daemon::{CycleError, Daemon};
use minilide_monitor::monitors::bands::AlertDecision;
use tempfile::{NamedTempFile, tempdir};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_unreachable_device_writes_nothing() {
    // Nothing listens on the discard port
    let dir = tempdir().unwrap();
    let config = test_config("http://127.0.0.1:9", dir.path());
    let notifier = RecordingNotifier::default();
    let report = RecordingReport::default();
    let mut daemon = daemon_with(&config, &notifier, &report);

    let result = daemon.run_cycle(at(14, 7, 0)).await;

    assert_matches!(result, Err(CycleError::Network(_)));
    assert!(!config.storage.data_dir.exists());
    assert_eq!(daemon.state().alerts.consecutive_alert_batches(), 0);
    assert_eq!(notifier.count(), 0);
}

#[tokio::test]
async fn test_device_error_status_is_network_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let dir = tempdir().unwrap();
    let config = test_config(&server.uri(), dir.path());
    let notifier = RecordingNotifier::default();
    let report = RecordingReport::default();
    let mut daemon = daemon_with(&config, &notifier, &report);

    let tick = daemon.tick(at(14, 7, 2)).await;

    assert_matches!(tick.extraction, Some(Err(CycleError::Network(_))));
    // the slot is consumed, the next tick in the window does not retry
    assert!(daemon.tick(at(14, 7, 6)).await.extraction.is_none());
}

#[tokio::test]
async fn test_page_without_temperatures_is_parse_error() {
    let server = MockServer::start().await;
    serve_page(&server, "<html><body><p>Booting...</p></body></html>".to_string()).await;
    let dir = tempdir().unwrap();
    let config = test_config(&server.uri(), dir.path());
    let notifier = RecordingNotifier::default();
    let report = RecordingReport::default();
    let mut daemon = daemon_with(&config, &notifier, &report);

    let result = daemon.run_cycle(at(14, 7, 0)).await;

    assert_matches!(result, Err(CycleError::Parse(_)));
    assert!(!config.storage.data_dir.exists());
}

#[tokio::test]
async fn test_network_failure_keeps_alert_state() {
    let server = MockServer::start().await;
    serve_page(&server, out_of_band_page()).await;
    let dir = tempdir().unwrap();
    let config = test_config(&server.uri(), dir.path());
    let notifier = RecordingNotifier::default();
    let report = RecordingReport::default();
    let mut daemon = daemon_with(&config, &notifier, &report);

    daemon.run_cycle(at(14, 7, 0)).await.unwrap();
    let before = daemon.state().clone();

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    assert!(daemon.run_cycle(at(14, 12, 0)).await.is_err());

    assert_eq!(daemon.state(), &before);
    assert_eq!(daemon.state().alerts.consecutive_alert_batches(), 1);
}

#[tokio::test]
async fn test_storage_failure_still_alerts() {
    let server = MockServer::start().await;
    serve_page(&server, out_of_band_page()).await;
    let dir = tempdir().unwrap();
    // a regular file where the data directory should be
    let blocker = NamedTempFile::new_in(dir.path()).unwrap();
    let mut config = test_config(&server.uri(), dir.path());
    config.storage.data_dir = blocker.path().to_path_buf();
    let notifier = RecordingNotifier::default();
    let report = RecordingReport::default();
    let mut daemon = daemon_with(&config, &notifier, &report);

    let cycle = daemon.run_cycle(at(14, 7, 0)).await.unwrap();

    assert!(cycle.stored.is_none());
    assert_matches!(cycle.decision, AlertDecision::Notify(_));
    assert_eq!(notifier.count(), 1);
}

#[tokio::test]
async fn test_failed_notification_still_counts() {
    let server = MockServer::start().await;
    serve_page(&server, out_of_band_page()).await;
    let dir = tempdir().unwrap();
    let config = test_config(&server.uri(), dir.path());
    let report = RecordingReport::default();
    let mut daemon = Daemon::new(&config, Box::new(FailingNotifier), Box::new(report)).unwrap();

    for minute in 0..4 {
        daemon.run_cycle(at(14, 7, minute)).await.unwrap();
    }

    assert_eq!(daemon.state().alerts.consecutive_alert_batches(), 3);
    let month_path = config.storage.data_dir.join("temperatures_03-2025.csv");
    let month = fs::read_to_string(month_path).unwrap();
    assert_eq!(month.lines().count(), 1 + 4 * 3);
}
