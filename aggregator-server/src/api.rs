use std::sync::Arc;

use aggregator_core::{
    AggregatedResult, AggregationError, Aggregator, StatsCollector,
    error::{API_UNAVAILABLE, INVALID_LOCATION, LOCATION_LOOKUP_FAILED, LOCATION_NOT_FOUND},
};
use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub stats: Arc<StatsCollector>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/aggregate", get(aggregate))
        .route("/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateParams {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub news_query: Option<String>,
}

#[derive(Debug, Serialize)]
struct AggregateResponse {
    success: bool,
    data: AggregatedResult,
}

async fn aggregate(
    State(state): State<AppState>,
    params: Result<Query<AggregateParams>, QueryRejection>,
) -> Result<Json<AggregateResponse>, ApiError> {
    let Query(params) = params.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "rejected aggregate query string");
        ApiError(AggregationError::invalid_location())
    })?;

    let location = params.location.unwrap_or_default();

    // In-flight calls are cancelled by the aggregator if this future is dropped.
    let cancel = CancellationToken::new();

    let data = state
        .aggregator
        .aggregate(&location, params.news_query.as_deref(), &cancel)
        .await
        .map_err(|err| {
            warn!(
                location = %location,
                error_code = %err.code,
                message = %err.message,
                "aggregation failed"
            );
            ApiError(err)
        })?;

    info!(location = %location, "aggregated data served");
    Ok(Json(AggregateResponse { success: true, data }))
}

async fn stats(State(state): State<AppState>) -> Response {
    let summary = state.stats.summarize();
    if summary.is_empty() {
        return Json(json!({ "message": "No statistics available yet." })).into_response();
    }
    Json(summary).into_response()
}

/// HTTP status for an aggregation failure code.
pub fn status_for(code: &str) -> StatusCode {
    match code {
        INVALID_LOCATION => StatusCode::BAD_REQUEST,
        LOCATION_NOT_FOUND | LOCATION_LOOKUP_FAILED => StatusCode::NOT_FOUND,
        API_UNAVAILABLE => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Aggregation failure rendered as a JSON body. Not-found and unavailable responses carry
/// only the message.
#[derive(Debug)]
pub struct ApiError(pub AggregationError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0.code);
        let body = if status == StatusCode::NOT_FOUND || status == StatusCode::SERVICE_UNAVAILABLE {
            json!({ "error": self.0.message })
        } else {
            json!({ "error": self.0.message, "errorCode": self.0.code })
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_failure_codes() {
        assert_eq!(status_for("INVALID_LOCATION"), StatusCode::BAD_REQUEST);
        assert_eq!(status_for("LOCATION_NOT_FOUND"), StatusCode::NOT_FOUND);
        assert_eq!(status_for("LOCATION_LOOKUP_FAILED"), StatusCode::NOT_FOUND);
        assert_eq!(status_for("API_UNAVAILABLE"), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for("EMPTY_RESPONSE"), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_for("503"), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
