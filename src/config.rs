use anyhow::{Context, Result};
use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use crate::domain::{BatteryId, BatteryProfile, HourRange, ProgramDefinition};
use crate::optimizer::OptimizerSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub controller: ControllerConfig,
    #[serde(default)]
    pub optimizer: OptimizerSettings,
    #[serde(default)]
    pub batteries: Vec<BatteryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub enable_cors: bool,
}

fn default_request_timeout() -> u64 {
    60
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    /// Local timezone of the sites; decides "today" and the elapsed hours.
    pub timezone: Tz,
    /// Interval of the needs-update drain.
    pub tick_seconds: u64,
    /// Interval of the full recompute of every battery.
    pub reoptimize_every_minutes: u64,
    pub solve_timeout_secs: u64,
}

impl ControllerConfig {
    pub fn solve_timeout(&self) -> Duration {
        Duration::from_secs(self.solve_timeout_secs)
    }
}

/// One battery as configured, with the programs it takes part in.
#[derive(Debug, Clone, Deserialize)]
pub struct BatteryConfig {
    pub id: BatteryId,
    pub name: String,
    pub soc_max: f64,
    pub soc_min_coefficient: f64,
    pub p_max: f64,
    pub p_charge_max: f64,
    #[serde(default)]
    pub feeder_max: f64,
    #[serde(default)]
    pub charging_margin: f64,
    pub first_charging_window: HourRange,
    pub second_charging_window: HourRange,
    #[serde(default)]
    pub programs: Vec<ProgramDefinition>,
}

impl BatteryConfig {
    pub fn profile(&self) -> Result<BatteryProfile> {
        let profile = BatteryProfile::new(
            self.id,
            &self.name,
            self.soc_max,
            self.soc_min_coefficient,
            self.p_max,
            self.p_charge_max,
            self.first_charging_window,
            self.second_charging_window,
        )
        .with_context(|| format!("battery {} ({})", self.id, self.name))?;
        Ok(profile.with_feeder(self.feeder_max, self.charging_margin))
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // A missing .env is fine
        let _ = dotenvy::dotenv();
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("BESS__").split("__"));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Self = figment.extract().context("invalid configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        self.optimizer
            .validate()
            .context("invalid optimizer settings")?;
        if self.controller.tick_seconds == 0 || self.controller.reoptimize_every_minutes == 0 {
            anyhow::bail!("controller intervals must be positive");
        }
        if self.controller.solve_timeout_secs == 0 {
            anyhow::bail!("controller.solve_timeout_secs must be positive");
        }
        let mut seen = std::collections::BTreeSet::new();
        for battery in &self.batteries {
            if !seen.insert(battery.id) {
                anyhow::bail!("battery id {} is configured twice", battery.id);
            }
            battery.profile()?;
            if let Some(p) = battery
                .programs
                .iter()
                .find(|p| self.optimizer.reward(p.priority).is_none())
            {
                anyhow::bail!(
                    "battery {}: program {} has unknown priority tier {}",
                    battery.id,
                    p.name,
                    p.priority
                );
            }
        }
        Ok(())
    }
}
