use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::{
    api::{battery::DateQuery, error::ApiError, response::ApiResponse},
    controller::{AppState, LoadUpdate},
    domain::{BatteryId, Hour},
    repo::{consumption::HourValues, LoadSource},
};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct HourValue {
    #[validate(range(min = 1, max = 24))]
    pub hour: Hour,
    #[validate(range(min = 0.0))]
    pub value: f64,
}

/// Body of PUT /api/v1/batteries/:id/load
#[derive(Debug, Deserialize, Validate)]
pub struct LoadRequest {
    pub date: Option<NaiveDate>,
    /// Manual override unless stated otherwise
    #[serde(default = "manual")]
    pub source: LoadSource,
    #[validate(length(min = 1, max = 24))]
    pub values: Vec<HourValue>,
}

impl LoadRequest {
    /// Validate the request and every hourly value.
    pub fn check(&self) -> Result<(), ValidationErrors> {
        self.validate()?;
        self.values.iter().try_for_each(|v| v.validate())
    }
}

fn manual() -> LoadSource {
    LoadSource::Manual
}

/// Baseline, overrides and the merged load of one day
#[derive(Debug, Serialize)]
pub struct LoadView {
    date: NaiveDate,
    baseline: HourValues,
    manual: HourValues,
    effective: HourValues,
}

/// GET /api/v1/batteries/:id/load
pub async fn get_load(
    State(state): State<AppState>,
    Path(id): Path<BatteryId>,
    Query(query): Query<DateQuery>,
) -> Result<Json<ApiResponse<LoadView>>, ApiError> {
    state.controller.battery(id)?;
    let date = query.resolve(&state);
    let consumption = &state.repos.consumption;
    let view = LoadView {
        date,
        baseline: consumption.values(id, date, LoadSource::Baseline).await?,
        manual: consumption.values(id, date, LoadSource::Manual).await?,
        effective: consumption.effective(id, date).await?,
    };
    Ok(Json(ApiResponse::success(view)))
}

/// PUT /api/v1/batteries/:id/load
pub async fn put_load(
    State(state): State<AppState>,
    Path(id): Path<BatteryId>,
    Json(request): Json<LoadRequest>,
) -> Result<Json<ApiResponse<LoadUpdate>>, ApiError> {
    request.check()?;
    let now = Utc::now();
    let date = request
        .date
        .unwrap_or_else(|| state.controller.local_date(now));
    let values: HourValues = request.values.iter().map(|v| (v.hour, v.value)).collect();
    let update = state
        .controller
        .update_load(id, date, request.source, &values, now)
        .await?;
    tracing::info!(
        battery_id = id,
        %date,
        source = %request.source,
        needs_update = update.needs_update,
        "load updated"
    );
    Ok(Json(ApiResponse::success(update)))
}

/// DELETE /api/v1/batteries/:id/load - drop manual overrides
pub async fn delete_manual_load(
    State(state): State<AppState>,
    Path(id): Path<BatteryId>,
    Query(query): Query<DateQuery>,
) -> Result<Json<ApiResponse<LoadUpdate>>, ApiError> {
    let date = query.resolve(&state);
    let update = state
        .controller
        .clear_manual_load(id, date, Utc::now())
        .await?;
    Ok(Json(ApiResponse::success(update)))
}
