//! Request handlers for the public API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::alerts::SystemAlert;
use crate::router::{RegionStatusView, RoutingResponse};
use crate::error::RouterError;
use crate::http::server::AppState;
use crate::region::{GeoPoint, HealthCheckResult};
use crate::routing::{FailoverEvent, FailoverReason};
use crate::telemetry::{MetricName, RollingAverage, SystemHealth};

impl IntoResponse for RouterError {
    fn into_response(self) -> Response {
        let status = match &self {
            RouterError::UnknownRegion(_) | RouterError::AlertNotFound(_) => StatusCode::NOT_FOUND,
            RouterError::NoHealthyRegion { .. } => StatusCode::SERVICE_UNAVAILABLE,
            RouterError::DependencyUnavailable(_) | RouterError::Storage(_) => {
                tracing::error!(error = %self, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, RouterError>;

#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl LocationQuery {
    fn location(&self) -> Option<GeoPoint> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        }
    }
}

pub async fn get_routing(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<LocationQuery>,
) -> ApiResult<RoutingResponse> {
    Ok(Json(state.core.get_routing(&user_id, query.location())?))
}

#[derive(Debug, Deserialize)]
pub struct FailoverRequest {
    pub user_id: String,
    pub from_region: String,
    #[serde(default)]
    pub reason: FailoverReason,
}

pub async fn force_failover(
    State(state): State<AppState>,
    Json(request): Json<FailoverRequest>,
) -> ApiResult<FailoverEvent> {
    let event = state
        .core
        .force_failover(&request.user_id, &request.from_region, request.reason)
        .await?;
    Ok(Json(event))
}

pub async fn get_regions(State(state): State<AppState>) -> ApiResult<Vec<RegionStatusView>> {
    Ok(Json(state.core.region_statuses()?))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub async fn get_region_history(
    State(state): State<AppState>,
    Path(region_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<HealthCheckResult>> {
    Ok(Json(state.core.region_history(&region_id, query.limit)?))
}

#[derive(Debug, Deserialize)]
pub struct RecordMetricRequest {
    pub metric: MetricName,
    pub value: f64,
}

pub async fn record_metric(
    State(state): State<AppState>,
    Json(request): Json<RecordMetricRequest>,
) -> ApiResult<RollingAverage> {
    Ok(Json(state.core.record_metric(request.metric, request.value)?))
}

pub async fn get_system_health(State(state): State<AppState>) -> ApiResult<SystemHealth> {
    Ok(Json(state.core.system_health()?))
}

pub async fn get_alerts(State(state): State<AppState>) -> ApiResult<Vec<SystemAlert>> {
    Ok(Json(state.core.active_alerts()?))
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub resolved_by: String,
}

pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<Uuid>,
    Json(request): Json<ResolveRequest>,
) -> ApiResult<SystemAlert> {
    Ok(Json(state.core.resolve_alert(alert_id, &request.resolved_by)?))
}

pub async fn get_failovers(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<FailoverEvent>> {
    Ok(Json(state.core.failover_log(&user_id)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (RouterError::UnknownRegion("x".into()), StatusCode::NOT_FOUND),
            (RouterError::AlertNotFound("x".into()), StatusCode::NOT_FOUND),
            (
                RouterError::NoHealthyRegion { excluded: "eu".into() },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                RouterError::DependencyUnavailable("db".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_location_requires_both_coordinates() {
        let partial = LocationQuery { lat: Some(1.0), lon: None };
        assert!(partial.location().is_none());
        let full = LocationQuery { lat: Some(1.0), lon: Some(2.0) };
        assert_eq!(full.location(), Some(GeoPoint::new(1.0, 2.0)));
    }
}
