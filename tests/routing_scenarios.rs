//! End-to-end routing and failover behaviour over the scripted probe.

use region_router::error::RouterError;
use region_router::health::ProbeReading;
use region_router::region::{GeoPoint, RegionStatus};
use region_router::routing::FailoverReason;
use region_router::telemetry::{MetricName, ServiceName, ServiceStatus};

mod common;

#[tokio::test]
async fn test_berlin_routes_to_eu_when_us_is_slow() {
    let (core, probe) = common::scripted_core(common::test_config());
    probe.set_reading("eu", ProbeReading::healthy(50.0).with_cpu(0.5));
    probe.set_reading("us", ProbeReading::healthy(450.0));
    probe.set_reading("asia", ProbeReading::healthy(120.0));
    core.run_health_sweep().await.unwrap();

    let us = core.registry().get("us").unwrap();
    assert_eq!(us.status, RegionStatus::Degraded);

    let response = core.get_routing("user-1", Some(common::berlin())).unwrap();
    assert_eq!(response.region, "eu");
    assert_eq!(response.health.status, RegionStatus::Healthy);
    assert_eq!(response.health.latency_ms, 50.0);
}

#[tokio::test]
async fn test_all_unhealthy_routing_falls_back_but_failover_fails() {
    let (core, probe) = common::scripted_core(common::test_config());
    common::all_unhealthy(&probe);
    core.run_health_sweep().await.unwrap();

    let response = core.get_routing("user-1", Some(common::berlin())).unwrap();
    assert_eq!(response.region, "us");
    assert_eq!(response.path, "fallback");

    let err = core
        .force_failover("user-1", "eu", FailoverReason::Manual)
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::NoHealthyRegion { .. }));
}

#[tokio::test]
async fn test_routing_always_returns_a_registered_region() {
    let (core, probe) = common::scripted_core(common::test_config());
    common::all_healthy(&probe, 80.0);
    core.run_health_sweep().await.unwrap();

    let registered = ["eu", "us", "asia"];
    let points = [
        GeoPoint::new(90.0, 180.0),
        GeoPoint::new(-90.0, -180.0),
        GeoPoint::new(0.0, 0.0),
        GeoPoint::new(-33.87, 151.21),
        GeoPoint::new(64.15, -21.94),
        GeoPoint::new(95.0, 0.0),
    ];
    for (i, point) in points.iter().enumerate() {
        let response = core.get_routing(&format!("user-{}", i), Some(*point)).unwrap();
        assert!(registered.contains(&response.region.as_str()));
    }

    common::all_unhealthy(&probe);
    core.run_health_sweep().await.unwrap();
    let response = core.get_routing("late-user", None).unwrap();
    assert!(registered.contains(&response.region.as_str()));
}

#[tokio::test]
async fn test_failover_never_targets_the_region_being_left() {
    let (core, probe) = common::scripted_core(common::test_config());
    common::all_healthy(&probe, 60.0);

    for from in ["eu", "us", "asia"] {
        let event = core
            .force_failover("user-1", from, FailoverReason::Health)
            .await
            .unwrap();
        assert_ne!(event.to_region, from);
    }
    assert_eq!(core.failover_log("user-1").unwrap().len(), 3);
}

#[tokio::test]
async fn test_repeated_routing_is_idempotent() {
    let (core, probe) = common::scripted_core(common::test_config());
    common::all_healthy(&probe, 60.0);
    core.run_health_sweep().await.unwrap();

    let first = core.get_routing("user-1", Some(common::berlin())).unwrap();
    let second = core.get_routing("user-1", Some(common::berlin())).unwrap();
    assert_eq!(first.region, second.region);
    assert_eq!(second.path, "sticky");
}

#[tokio::test]
async fn test_failover_repins_routing() {
    let (core, probe) = common::scripted_core(common::test_config());
    common::all_healthy(&probe, 60.0);
    core.run_health_sweep().await.unwrap();

    let before = core.get_routing("user-1", Some(common::berlin())).unwrap();
    assert_eq!(before.region, "eu");

    let event = core
        .force_failover("user-1", "eu", FailoverReason::Manual)
        .await
        .unwrap();
    let after = core.get_routing("user-1", Some(common::berlin())).unwrap();
    assert_eq!(after.region, event.to_region);
    assert_eq!(after.path, "sticky");
}

#[tokio::test]
async fn test_any_single_breach_degrades_a_region() {
    let breaches = [
        ProbeReading::healthy(400.0),
        ProbeReading::healthy(50.0).with_cpu(0.81),
        ProbeReading::healthy(50.0).with_error_rate(0.051),
    ];
    for reading in breaches {
        let (core, probe) = common::scripted_core(common::test_config());
        common::all_healthy(&probe, 50.0);
        probe.set_reading("eu", reading);
        core.run_health_sweep().await.unwrap();

        let statuses = core.region_statuses().unwrap();
        let eu = statuses.iter().find(|r| r.region == "eu").unwrap();
        assert!(!eu.healthy);
        assert_eq!(eu.status, RegionStatus::Degraded);
        assert_eq!(statuses.iter().filter(|r| r.healthy).count(), 2);
    }
}

#[tokio::test]
async fn test_service_turns_critical_past_two_issues() {
    let (core, _) = common::scripted_core(common::test_config());

    core.record_metric(MetricName::ChatDeliveryLatency, 900.0).unwrap();
    core.record_metric(MetricName::ChatSyncLatency, 1_500.0).unwrap();
    core.run_service_sweep().unwrap();
    let chat = |core: &region_router::RouterCore| {
        core.system_health()
            .unwrap()
            .services
            .into_iter()
            .find(|s| s.service_name == ServiceName::Chat)
            .unwrap()
    };
    assert_eq!(chat(&core).status, ServiceStatus::Degraded);

    core.record_metric(MetricName::Requests(ServiceName::Chat), 10.0).unwrap();
    core.record_metric(MetricName::Errors(ServiceName::Chat), 3.0).unwrap();
    core.run_service_sweep().unwrap();
    let chat = chat(&core);
    assert_eq!(chat.status, ServiceStatus::Critical);
    assert_eq!(chat.issues.len(), 3);
    assert_eq!(
        core.system_health().unwrap().overall_status,
        ServiceStatus::Critical
    );
}
