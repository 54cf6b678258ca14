use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::{
    api::{error::ApiError, response::ApiResponse},
    controller::{AppState, ControlledBattery, RunOutcome, Trigger},
    domain::{BatteryId, BatteryProfile, DailySchedule, ProgramDefinition},
};

/// Battery with its configured programs
#[derive(Debug, Serialize)]
pub struct BatteryView {
    #[serde(flatten)]
    profile: BatteryProfile,
    programs: Vec<ProgramDefinition>,
}

impl From<&ControlledBattery> for BatteryView {
    fn from(battery: &ControlledBattery) -> Self {
        Self {
            profile: battery.profile.clone(),
            programs: battery.programs.clone(),
        }
    }
}

/// `?date=YYYY-MM-DD`, today in the controller timezone when absent
#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<NaiveDate>,
}

impl DateQuery {
    pub fn resolve(&self, state: &AppState) -> NaiveDate {
        self.date
            .unwrap_or_else(|| state.controller.local_date(Utc::now()))
    }
}

/// GET /api/v1/batteries
pub async fn list_batteries(State(state): State<AppState>) -> Json<ApiResponse<Vec<BatteryView>>> {
    let batteries: Vec<BatteryView> = state.controller.batteries().map(BatteryView::from).collect();
    let count = batteries.len();
    Json(ApiResponse::success(batteries).with_count(count))
}

/// GET /api/v1/batteries/:id
pub async fn get_battery(
    State(state): State<AppState>,
    Path(id): Path<BatteryId>,
) -> Result<Json<ApiResponse<BatteryView>>, ApiError> {
    let battery = state.controller.battery(id)?;
    Ok(Json(ApiResponse::success(BatteryView::from(battery))))
}

/// GET /api/v1/batteries/:id/consumption - persisted day schedule
pub async fn get_consumption(
    State(state): State<AppState>,
    Path(id): Path<BatteryId>,
    Query(query): Query<DateQuery>,
) -> Result<Json<ApiResponse<DailySchedule>>, ApiError> {
    state.controller.battery(id)?;
    let date = query.resolve(&state);
    let schedule = state
        .repos
        .schedules
        .find(id, date)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("schedule of battery {id} on {date}")))?;
    let rows = schedule.rows.len();
    Ok(Json(ApiResponse::success(schedule).with_count(rows)))
}

/// POST /api/v1/batteries/:id/optimize - recompute today's schedule now
pub async fn optimize(
    State(state): State<AppState>,
    Path(id): Path<BatteryId>,
) -> Result<Json<ApiResponse<RunOutcome>>, ApiError> {
    tracing::info!(battery_id = id, "manual optimization requested");
    let started = Instant::now();
    let outcome = state.controller.run(id, Trigger::Manual).await?;
    Ok(Json(
        ApiResponse::success(outcome).with_duration(started.elapsed().as_millis() as u64),
    ))
}
