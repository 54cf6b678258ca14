use axum::{
    routing::{get, post, put},
    Router,
};

use crate::{
    api::{alarms, battery, health, load, programs},
    controller::AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/batteries", get(battery::list_batteries))
        .route("/batteries/:id", get(battery::get_battery))
        .route("/batteries/:id/consumption", get(battery::get_consumption))
        .route("/batteries/:id/optimize", post(battery::optimize))
        .route(
            "/batteries/:id/load",
            get(load::get_load)
                .put(load::put_load)
                .delete(load::delete_manual_load),
        )
        .route("/batteries/:id/programs", get(programs::list_programs))
        .route(
            "/batteries/:id/programs/:name/activation",
            put(programs::put_activation),
        )
        .route("/batteries/:id/alarms", get(alarms::list_alarms))
        .route("/batteries/:id/alarms/:alarm_id", post(alarms::resolve_alarm))
        .route("/batteries/:id/status", get(alarms::get_status))
        .with_state(state)
}
