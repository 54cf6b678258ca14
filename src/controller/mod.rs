pub mod dispatch;
pub mod error;
pub mod triggers;

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::optimizer::MilpOptimizer;
use crate::repo::Repositories;

pub use dispatch::{
    ActivationOutcome, ControlledBattery, DispatchController, LoadUpdate, RunOutcome, UpdateStatus,
};
pub use error::DispatchError;
pub use triggers::Trigger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub controller: Arc<DispatchController>,
    pub repos: Repositories,
}

impl AppState {
    pub fn new(cfg: Config) -> Result<Self> {
        Self::with_repos(cfg, Repositories::in_memory())
    }

    pub fn with_repos(cfg: Config, repos: Repositories) -> Result<Self> {
        let batteries = cfg
            .batteries
            .iter()
            .map(|b| Ok(ControlledBattery::new(b.profile()?, b.programs.clone())))
            .collect::<Result<Vec<_>>>()?;

        let strategy = Arc::new(MilpOptimizer::new(
            cfg.optimizer.clone(),
            cfg.controller.solve_timeout(),
        ));
        let controller = Arc::new(DispatchController::new(
            batteries,
            strategy,
            repos.clone(),
            cfg.controller.timezone,
        ));
        info!(batteries = cfg.batteries.len(), "dispatch controller ready");

        Ok(Self {
            cfg,
            controller,
            repos,
        })
    }
}

pub fn spawn_controller_tasks(state: AppState) {
    let controller = state.controller.clone();
    let tick = Duration::from_secs(state.cfg.controller.tick_seconds.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        loop {
            interval.tick().await;
            let results = controller.run_pending_at(Utc::now()).await;
            if !results.is_empty() {
                debug!(runs = results.len(), "pending batteries processed");
            }
        }
    });

    let controller = state.controller.clone();
    let every = Duration::from_secs(state.cfg.controller.reoptimize_every_minutes.max(1) * 60);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let results = controller.run_all_at(Utc::now()).await;
            let failed = results.iter().filter(|(_, r)| r.is_err()).count();
            info!(batteries = results.len(), failed, "periodic reoptimization finished");
        }
    });
}
