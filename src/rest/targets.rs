use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::common::target::TargetGroup;
use crate::server::rest_server::AppState;

pub const JOB_QUERY_PARAM: &str = "prom_job";
const REFRESH_INTERVAL_HEADER: &str = "X-Prometheus-Refresh-Interval-Seconds";

/// Prometheus HTTP SD endpoint. `?prom_job=NAME` narrows the answer to one job; an unknown
/// job yields an empty list rather than an error.
pub async fn get_targets(
    State(st): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Some(interval) = headers.get(REFRESH_INTERVAL_HEADER).and_then(|v| v.to_str().ok()) {
        log::debug!("Received Prometheus refresh interval: {}s", interval);
    }

    let snapshot = st.targets.snapshot();
    let encoded = match params.get(JOB_QUERY_PARAM).filter(|job| !job.is_empty()) {
        Some(job) => {
            let groups: &[TargetGroup] = snapshot.get(job.as_str()).map(Vec::as_slice).unwrap_or_default();
            serde_json::to_vec(groups)
        }
        None => {
            let groups: Vec<&TargetGroup> = snapshot.values().flatten().collect();
            serde_json::to_vec(&groups)
        }
    };

    match encoded {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            log::error!("Failed to encode targets: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}
