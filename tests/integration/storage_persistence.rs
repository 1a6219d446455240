//! Monthly files and the mirror as seen from outside the store

use std::fs;

use minilide_monitor::Reading;
use minilide_monitor::storage::{MonthKey, MonthlyStore, summarize};
use pretty_assertions::assert_eq;
use tempfile::tempdir;
use wiremock::MockServer;

use crate::helpers::*;

#[tokio::test]
async fn test_first_cycle_creates_month_and_mirror() {
    let server = MockServer::start().await;
    serve_page(&server, in_band_page()).await;
    let dir = tempdir().unwrap();
    let config = test_config(&server.uri(), dir.path());
    let notifier = RecordingNotifier::default();
    let report = RecordingReport::default();
    let mut daemon = daemon_with(&config, &notifier, &report);

    daemon.run_cycle(at(14, 7, 0)).await.unwrap();

    let expected = "timestamp,capteur,temperature\n\
                    2025-03-14 07:00:00,Sensor 1,21.5\n\
                    2025-03-14 07:00:00,Sensor 2,-20.0\n\
                    2025-03-14 07:00:00,Sensor 3,-18.0\n";
    let month_path = config.storage.data_dir.join("temperatures_03-2025.csv");
    let month = fs::read_to_string(month_path).unwrap();
    let mirror = fs::read_to_string(config.storage.data_dir.join("temperatures.csv")).unwrap();
    assert_eq!(month, expected);
    assert_eq!(mirror, expected);
}

#[test]
fn test_append_then_read_keeps_insertion_order() {
    let dir = tempdir().unwrap();
    let store = MonthlyStore::new(dir.path());
    let key = MonthKey::of(&at(1, 0, 0));

    let mut expected = Vec::new();
    for (day, hour) in [(1, 7), (1, 12), (2, 7), (14, 18)] {
        let now = at(day, hour, 0);
        let batch = vec![
            Reading::new(now, "Sensor 1", 20.0 + f64::from(hour)),
            Reading::new(now, "Sensor 2", -20.0),
        ];
        store.append(&batch, now).unwrap();
        expected.extend(batch);

        let month = store.read_month(key).unwrap();
        assert!(month.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    assert_eq!(store.read_month(key).unwrap(), expected);
}

#[test]
fn test_refresh_mirror_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = MonthlyStore::new(dir.path());
    let now = at(14, 7, 0);
    store
        .append(&[Reading::new(now, "Sensor 1", 21.25), Reading::new(now, "Fridge", 4.0)], now)
        .unwrap();
    let key = MonthKey::of(&now);

    store.refresh_mirror(key).unwrap();
    let first = fs::read(store.mirror_path()).unwrap();
    store.refresh_mirror(key).unwrap();
    let second = fs::read(store.mirror_path()).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_summary_over_mirror_when_month_missing() {
    let dir = tempdir().unwrap();
    let store = MonthlyStore::new(dir.path());
    fs::write(
        store.mirror_path(),
        "date,sensor,temp\n\
         2025-04-01 07:00:00,Sensor 2,-20\n\
         2025-04-01 12:00:00,Sensor 2,\"-16,5\"\n",
    )
    .unwrap();

    let readings = store.load_month_or_mirror(MonthKey::new(2025, 4).unwrap()).unwrap();
    let summaries = summarize(&readings);

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].count, 2);
    assert_eq!(summaries[0].min, -20.0);
    assert_eq!(summaries[0].last, -16.5);
}
