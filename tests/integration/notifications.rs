//! Notification transports against mocked endpoints

use assert_matches::assert_matches;
use minilide_monitor::alerts::{ALERT_TITLE, AlertManager, NotificationError, Notifier};
use minilide_monitor::config::{Alert, Discord, Pushbullet, Webhook};
use minilide_monitor::daemon::Daemon;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

const BODY: &str = "Sensor 1: 35.0°C (out of range 10.0-30.0°C)";

#[tokio::test]
async fn test_pushbullet_note() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/pushes"))
        .and(header("Access-Token", "secret-token"))
        .and(body_partial_json(json!({
            "type": "note",
            "title": ALERT_TITLE,
            "body": BODY,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "active": true })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = AlertManager::new(Some(Alert::Pushbullet(Pushbullet {
        token: Some("secret-token".to_string()),
        url: format!("{}/v2/pushes", server.uri()),
    })));

    manager.send(ALERT_TITLE, BODY).await.unwrap();
}

#[tokio::test]
async fn test_pushbullet_rejection_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let manager = AlertManager::new(Some(Alert::Pushbullet(Pushbullet {
        token: Some("expired".to_string()),
        url: server.uri(),
    })));

    let result = manager.send(ALERT_TITLE, BODY).await;

    assert_matches!(result, Err(NotificationError::Status(401, _)));
}

#[tokio::test]
async fn test_discord_embed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(json!({
            "content": format!("🌡️ {ALERT_TITLE} <@1234>"),
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let manager = AlertManager::new(Some(Alert::Discord(Discord {
        url: format!("{}/hook", server.uri()),
        user_id: Some("1234".to_string()),
    })));

    manager.send(ALERT_TITLE, BODY).await.unwrap();
}

#[tokio::test]
async fn test_webhook_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "title": ALERT_TITLE,
            "message": BODY,
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let manager = AlertManager::new(Some(Alert::Webhook(Webhook { url: server.uri() })));

    manager.send(ALERT_TITLE, BODY).await.unwrap();
}

#[tokio::test]
async fn test_daemon_delivers_through_configured_webhook() {
    let device = MockServer::start().await;
    serve_page(&device, out_of_band_page()).await;
    let hook = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "title": ALERT_TITLE })))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&hook)
        .await;
    let dir = tempdir().unwrap();
    let mut config = test_config(&device.uri(), dir.path());
    config.notifier = Some(Alert::Webhook(Webhook { url: hook.uri() }));
    let mut daemon = Daemon::from_config(&config).unwrap();

    daemon.run_cycle(at(14, 7, 0)).await.unwrap();
    // suppressed cycles do not reach the channel
    config.max_alerts = 1;
    let mut throttled = Daemon::from_config(&config).unwrap();
    throttled.run_cycle(at(14, 12, 0)).await.unwrap();
    throttled.run_cycle(at(14, 18, 30)).await.unwrap();

    hook.verify().await;
}
