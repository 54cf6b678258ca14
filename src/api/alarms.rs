use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{battery::DateQuery, error::ApiError, response::ApiResponse},
    controller::{AppState, UpdateStatus},
    domain::BatteryId,
    repo::{AlarmAction, ProgramAlarm},
};

/// Operator decision on an alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Reject,
}

impl From<Decision> for AlarmAction {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accept => AlarmAction::Accept,
            Decision::Reject => AlarmAction::Reject,
        }
    }
}

/// Body of POST /api/v1/batteries/:id/alarms/:alarm_id
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: Decision,
}

/// GET /api/v1/batteries/:id/alarms
pub async fn list_alarms(
    State(state): State<AppState>,
    Path(id): Path<BatteryId>,
    Query(query): Query<DateQuery>,
) -> Result<Json<ApiResponse<Vec<ProgramAlarm>>>, ApiError> {
    state.controller.battery(id)?;
    let date = query.resolve(&state);
    let alarms = state.repos.alarms.list(id, date).await?;
    let count = alarms.len();
    Ok(Json(ApiResponse::success(alarms).with_count(count)))
}

/// POST /api/v1/batteries/:id/alarms/:alarm_id
pub async fn resolve_alarm(
    State(state): State<AppState>,
    Path((id, alarm_id)): Path<(BatteryId, Uuid)>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<ApiResponse<ProgramAlarm>>, ApiError> {
    let alarm = state
        .controller
        .resolve_alarm(id, alarm_id, request.decision.into(), Utc::now())
        .await?;
    Ok(Json(ApiResponse::success(alarm)))
}

/// GET /api/v1/batteries/:id/status
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<BatteryId>,
) -> Result<Json<ApiResponse<UpdateStatus>>, ApiError> {
    Ok(Json(ApiResponse::success(state.controller.status(id)?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_parsing() {
        let accept: DecisionRequest = serde_json::from_str(r#"{"decision": "accept"}"#).unwrap();
        assert_eq!(AlarmAction::from(accept.decision), AlarmAction::Accept);
        assert!(serde_json::from_str::<DecisionRequest>(r#"{"decision": "idle"}"#).is_err());
    }
}
