use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    api::{battery::DateQuery, error::ApiError, response::ApiResponse},
    controller::{ActivationOutcome, AppState},
    domain::{BatteryId, ProgramActivation, ProgramDefinition},
};

/// Body of PUT /api/v1/batteries/:id/programs/:name/activation
///
/// `start`/`end` are clock hours.
#[derive(Debug, Deserialize, Validate)]
pub struct ActivationRequest {
    pub date: Option<NaiveDate>,
    pub status: bool,
    #[validate(range(max = 23))]
    pub start: Option<u8>,
    #[validate(range(max = 23))]
    pub end: Option<u8>,
    #[serde(default)]
    pub is_manual: bool,
}

/// A configured program and its activation of the day
#[derive(Debug, Serialize)]
pub struct ProgramView {
    #[serde(flatten)]
    definition: ProgramDefinition,
    activation: Option<ProgramActivation>,
}

/// GET /api/v1/batteries/:id/programs
pub async fn list_programs(
    State(state): State<AppState>,
    Path(id): Path<BatteryId>,
    Query(query): Query<DateQuery>,
) -> Result<Json<ApiResponse<Vec<ProgramView>>>, ApiError> {
    let battery = state.controller.battery(id)?;
    let date = query.resolve(&state);
    let activations = state.repos.programs.activations(id, date).await?;
    let views: Vec<ProgramView> = battery
        .programs
        .iter()
        .map(|definition| ProgramView {
            definition: definition.clone(),
            activation: activations
                .iter()
                .find(|a| a.program.eq_ignore_ascii_case(&definition.name))
                .cloned(),
        })
        .collect();
    let count = views.len();
    Ok(Json(ApiResponse::success(views).with_count(count)))
}

/// PUT /api/v1/batteries/:id/programs/:name/activation
pub async fn put_activation(
    State(state): State<AppState>,
    Path((id, name)): Path<(BatteryId, String)>,
    Json(request): Json<ActivationRequest>,
) -> Result<Json<ApiResponse<ActivationOutcome>>, ApiError> {
    request.validate()?;
    let now = Utc::now();
    let activation = ProgramActivation {
        battery_id: id,
        program: name,
        date: request
            .date
            .unwrap_or_else(|| state.controller.local_date(now)),
        status: request.status,
        start: request.start,
        end: request.end,
        is_manual: request.is_manual,
    };
    let outcome = state.controller.record_activation(activation, now).await?;
    Ok(Json(ApiResponse::success(outcome)))
}
