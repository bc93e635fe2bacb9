//! Health sweeps against real HTTP status endpoints, plus durable storage.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use region_router::alerts::AlertSeverity;
use region_router::config::{RegionConfig, RouterConfig};
use region_router::health::HttpProbe;
use region_router::region::RegionStatus;
use region_router::storage::{FileStore, Store};
use region_router::RouterCore;

mod common;

fn region(id: &str, latitude: f64, longitude: f64, health: Option<SocketAddr>) -> RegionConfig {
    let mut endpoints = BTreeMap::new();
    endpoints.insert("chat".to_string(), format!("wss://chat.{}.test", id));
    if let Some(addr) = health {
        endpoints.insert("health".to_string(), format!("http://{}/health", addr));
    }
    RegionConfig {
        id: id.to_string(),
        latitude,
        longitude,
        endpoints,
    }
}

fn http_core(regions: Vec<RegionConfig>, store: Arc<dyn Store>) -> RouterCore {
    let mut config = common::test_config();
    config.routing.default_region = regions[0].id.clone();
    config.regions = regions;
    config.health_check.probe_timeout_ms = 300;
    RouterCore::new(config, store, Arc::new(HttpProbe::new())).unwrap()
}

fn memory() -> Arc<dyn Store> {
    Arc::new(region_router::storage::MemoryStore::new())
}

#[tokio::test]
async fn test_http_probe_verdicts() {
    let healthy = common::start_fixed_status_server(
        200,
        r#"{"status":"healthy","cpu_usage":0.3,"memory_usage":0.4,"active_connections":120,"error_rate":0.01}"#,
    )
    .await;
    let busy = common::start_fixed_status_server(
        200,
        r#"{"status":"healthy","cpu_usage":0.95,"error_rate":0.0}"#,
    )
    .await;
    let failing = common::start_fixed_status_server(503, "{}").await;

    let core = http_core(
        vec![
            region("a-healthy", 50.0, 8.0, Some(healthy)),
            region("b-busy", 38.0, -77.0, Some(busy)),
            region("c-failing", 1.0, 103.0, Some(failing)),
            region("d-no-endpoint", -33.0, 151.0, None),
        ],
        memory(),
    );

    let report = core.run_health_sweep().await.unwrap();
    assert_eq!(report.healthy, 1);
    assert_eq!(report.unhealthy, 3);

    let statuses = core.region_statuses().unwrap();
    let by_id = |id: &str| statuses.iter().find(|s| s.region == id).unwrap().clone();

    let a = by_id("a-healthy");
    assert_eq!(a.status, RegionStatus::Healthy);
    assert_eq!(a.active_users, 120);
    assert!(a.last_health_check_at.is_some());

    assert_eq!(by_id("b-busy").status, RegionStatus::Degraded);
    assert_eq!(by_id("c-failing").status, RegionStatus::Offline);
    assert_eq!(by_id("d-no-endpoint").status, RegionStatus::Offline);
    assert_eq!(by_id("c-failing").error_rate, 1.0);

    let alerts = core.active_alerts().unwrap();
    assert_eq!(alerts.len(), 3);
    let busy_alert = alerts.iter().find(|a| a.service == "b-busy").unwrap();
    assert_eq!(busy_alert.severity, AlertSeverity::Warning);
    assert_eq!(busy_alert.metric, "cpu_usage");
    let failing_alert = alerts.iter().find(|a| a.service == "c-failing").unwrap();
    assert_eq!(failing_alert.severity, AlertSeverity::Critical);
}

#[tokio::test]
async fn test_self_reported_unhealthy_region() {
    let addr = common::start_fixed_status_server(200, r#"{"status":"maintenance"}"#).await;
    let core = http_core(vec![region("eu", 50.0, 8.0, Some(addr))], memory());

    core.run_health_sweep().await.unwrap();
    let eu = core.registry().get("eu").unwrap();
    assert_eq!(eu.status, RegionStatus::Degraded);
}

#[tokio::test]
async fn test_slow_region_does_not_stall_the_sweep() {
    let slow = common::start_status_server(|| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        (200, r#"{"status":"healthy"}"#.to_string())
    })
    .await;
    let fast = common::start_fixed_status_server(200, r#"{"status":"healthy"}"#).await;

    let core = http_core(
        vec![
            region("eu", 50.0, 8.0, Some(fast)),
            region("us", 38.0, -77.0, Some(slow)),
        ],
        memory(),
    );

    let started = std::time::Instant::now();
    let report = core.run_health_sweep().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(report.healthy, 1);

    let history = core.region_history("us", None).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, RegionStatus::Offline);
    assert!(history[0].error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_history_is_newest_first_and_limited() {
    let addr = common::start_fixed_status_server(200, r#"{"status":"healthy"}"#).await;
    let core = http_core(vec![region("eu", 50.0, 8.0, Some(addr))], memory());

    for _ in 0..3 {
        core.run_health_sweep().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let history = core.region_history("eu", Some(2)).unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].observed_at >= history[1].observed_at);
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("router.json");
    let addr = common::start_fixed_status_server(200, r#"{"status":"healthy"}"#).await;

    {
        let store: Arc<dyn Store> = Arc::new(FileStore::open(&path).unwrap());
        let core = http_core(
            vec![
                region("eu", 50.11, 8.68, Some(addr)),
                region("us", 38.95, -77.45, None),
            ],
            store,
        );
        core.run_health_sweep().await.unwrap();
        core.get_routing("user-1", Some(common::berlin())).unwrap();
        core.flush().unwrap();
    }

    let store: Arc<dyn Store> = Arc::new(FileStore::open(&path).unwrap());
    let mapping = store.get_mapping("user-1").unwrap().unwrap();
    assert_eq!(mapping.assigned_region, "eu");

    let core = http_core(
        vec![
            region("eu", 50.11, 8.68, Some(addr)),
            region("us", 38.95, -77.45, None),
        ],
        store,
    );
    // Persisted health survives re-registration.
    assert_eq!(core.registry().get("us").unwrap().status, RegionStatus::Offline);
    assert_eq!(core.region_history("eu", None).unwrap().len(), 1);
}

#[tokio::test]
async fn test_region_removed_from_config_is_gone_after_restart() {
    use region_router::health::ScriptedProbe;
    use region_router::region::GeoPoint;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("router.json");

    {
        let store: Arc<dyn Store> = Arc::new(FileStore::open(&path).unwrap());
        let probe = Arc::new(ScriptedProbe::new());
        common::all_healthy(&probe, 40.0);
        let core = RouterCore::new(common::test_config(), store, probe).unwrap();
        core.run_health_sweep().await.unwrap();
        core.flush().unwrap();
    }

    let mut config = common::test_config();
    config.regions.retain(|r| r.id != "asia");
    let store: Arc<dyn Store> = Arc::new(FileStore::open(&path).unwrap());
    let probe = Arc::new(ScriptedProbe::new());
    common::all_healthy(&probe, 40.0);
    let core = RouterCore::new(config, store, probe).unwrap();

    let ids: Vec<String> = core
        .region_statuses()
        .unwrap()
        .into_iter()
        .map(|r| r.region)
        .collect();
    assert_eq!(ids, vec!["eu", "us"]);

    let report = core.run_health_sweep().await.unwrap();
    assert_eq!(report.results.len(), 2);

    let singapore = GeoPoint::new(1.29, 103.85);
    let routed = core.get_routing("user-sg", Some(singapore)).unwrap();
    assert_ne!(routed.region, "asia");
}

#[tokio::test]
async fn test_default_config_regions_are_well_formed() {
    let config = RouterConfig::default();
    for region in &config.regions {
        assert!(region.endpoints.contains_key("health"));
        assert!(region.location().is_valid());
    }
}

#[tokio::test]
async fn test_sweep_alerts_reach_external_dispatcher() {
    use region_router::alerts::{AlertDispatcher, ChannelDispatcher};
    use region_router::health::{ProbeReading, ScriptedProbe};

    let (dispatcher, mut rx) = ChannelDispatcher::new();
    let probe = Arc::new(ScriptedProbe::new());
    probe.set_reading("eu", ProbeReading::healthy(40.0));
    probe.set_reading("us", ProbeReading::healthy(40.0).with_error_rate(0.2));
    probe.set_reading("asia", ProbeReading::healthy(40.0));

    let core = RouterCore::with_dispatchers(
        common::test_config(),
        memory(),
        probe,
        vec![Arc::new(dispatcher) as Arc<dyn AlertDispatcher>],
    )
    .unwrap();
    core.run_health_sweep().await.unwrap();

    let alert = rx.try_recv().unwrap();
    assert_eq!(alert.service, "us");
    assert_eq!(alert.metric, "error_rate");
    assert!(rx.try_recv().is_err());
}
