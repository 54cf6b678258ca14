//! MILP (Mixed-Integer Linear Programming) dispatch
//!
//! Exact 24-hour schedule for one battery. Per hour the model holds
//! discharge, charge and grid powers, the SOC, two "desired" powers and four
//! binaries:
//! - `u_charge`/`u_discharge` select the battery mode (at most one per hour)
//! - `b_charge`/`b_discharge` linearize `min(..)` through big-M
//!
//! When a mode is selected its power is pinned to the desired power, which is
//! `min(load, soc_prev)` for discharge and `min(p_charge_max, soc_max -
//! soc_prev)` for charge.

use async_trait::async_trait;
use good_lp::{
    constraint, microlp, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::domain::{
    hours, slot, BatteryProfile, ChargingStatus, Hour, HourlyLoad, ProgramWindow, HOURS_PER_DAY,
};
use crate::optimizer::{
    prioritize, CostModel, DispatchInput, DispatchPlan, DispatchStrategy, HourlyDispatch,
    OptimizationError, OptimizerSettings,
};

/// Optimizer solving the daily dispatch MILP with a time budget.
pub struct MilpOptimizer {
    settings: OptimizerSettings,
    time_limit: Duration,
}

impl Default for MilpOptimizer {
    fn default() -> Self {
        Self {
            settings: OptimizerSettings::default(),
            time_limit: Duration::from_secs(30),
        }
    }
}

impl MilpOptimizer {
    pub fn new(settings: OptimizerSettings, time_limit: Duration) -> Self {
        Self {
            settings,
            time_limit,
        }
    }

    pub fn settings(&self) -> &OptimizerSettings {
        &self.settings
    }
}

#[async_trait]
impl DispatchStrategy for MilpOptimizer {
    async fn dispatch(&self, input: DispatchInput) -> Result<DispatchPlan, OptimizationError> {
        let settings = self.settings.clone();
        // The solver cannot be interrupted; a timed-out solve finishes on its
        // blocking thread and its result is dropped.
        let task = tokio::task::spawn_blocking(move || {
            solve(
                &input.load,
                &input.battery,
                &input.programs,
                input.initial_soc,
                &settings,
            )
        });

        match tokio::time::timeout(self.time_limit, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(OptimizationError::Solver(format!(
                "solver task failed: {join_error}"
            ))),
            Err(_) => {
                warn!(time_limit_ms = self.time_limit.as_millis() as u64, "dispatch solve timed out");
                Err(OptimizationError::SolverTimeout(self.time_limit))
            }
        }
    }
}

/// Variables of one hour.
struct HourVars {
    discharge: Variable,
    charge: Variable,
    grid: Variable,
    soc: Variable,
    desired_discharge: Variable,
    desired_charge: Variable,
    u_charge: Variable,
    u_discharge: Variable,
    b_charge: Variable,
    b_discharge: Variable,
}

fn expr(value: impl Into<Expression>) -> Expression {
    value.into()
}

/// Solve the daily dispatch of `battery` for `load` under `programs`.
pub fn solve(
    load: &HourlyLoad,
    battery: &BatteryProfile,
    programs: &[ProgramWindow],
    initial_soc: f64,
    settings: &OptimizerSettings,
) -> Result<DispatchPlan, OptimizationError> {
    settings.validate()?;
    battery.validate()?;
    if !initial_soc.is_finite() || initial_soc < battery.soc_min || initial_soc > battery.soc_max {
        return Err(OptimizationError::invalid(format!(
            "initial soc {initial_soc} is outside [{}, {}]",
            battery.soc_min, battery.soc_max
        )));
    }

    let program_schedule = prioritize(programs, settings)?;
    let costs = CostModel::build(battery, &program_schedule, settings);

    let load_max: Vec<f64> = hours().map(|h| load.at(h).min(battery.p_max)).collect();
    let magnitude = [battery.soc_max, battery.p_max, battery.p_charge_max]
        .into_iter()
        .chain(load_max.iter().copied())
        .fold(0.0, f64::max);
    let m = settings.big_m;
    if m <= magnitude {
        return Err(OptimizationError::invalid(format!(
            "big_m {m} must exceed the largest power or soc magnitude {magnitude}"
        )));
    }

    let started = Instant::now();
    let mut vars = ProblemVariables::new();
    let hourly: Vec<HourVars> = hours()
        .map(|_| HourVars {
            discharge: vars.add(variable().min(0.0).max(battery.p_max)),
            charge: vars.add(variable().min(0.0).max(battery.p_charge_max)),
            grid: vars.add(variable().min(0.0)),
            soc: vars.add(variable().min(battery.soc_min).max(battery.soc_max)),
            desired_discharge: vars.add(variable().min(0.0)),
            desired_charge: vars.add(variable().min(0.0)),
            u_charge: vars.add(variable().binary()),
            u_discharge: vars.add(variable().binary()),
            b_charge: vars.add(variable().binary()),
            b_discharge: vars.add(variable().binary()),
        })
        .collect();

    let objective: Expression = hourly
        .iter()
        .enumerate()
        .map(|(i, v)| {
            expr(v.discharge) * -costs.discharge_reward[i]
                + expr(v.charge) * costs.charge_cost[i]
                + expr(v.grid) * costs.grid_cost[i]
        })
        .sum();

    let mut model = vars.minimise(objective).using(microlp);

    for (i, v) in hourly.iter().enumerate() {
        let soc_prev = if i == 0 {
            expr(initial_soc)
        } else {
            expr(hourly[i - 1].soc)
        };
        let headroom_prev = expr(battery.soc_max) - soc_prev.clone();
        let load_cap = expr(load_max[i]);
        let charge_cap = expr(battery.p_charge_max);
        let demand = load.at((i + 1) as Hour);

        // Electrical balance
        model.add_constraint(constraint!(expr(v.discharge) + v.grid == expr(demand) + v.charge));

        // Mode caps and exclusivity
        model.add_constraint(constraint!(expr(v.discharge) <= expr(v.u_discharge) * battery.p_max));
        model.add_constraint(constraint!(expr(v.charge) <= expr(v.u_charge) * battery.p_charge_max));
        model.add_constraint(constraint!(expr(v.u_charge) + v.u_discharge <= expr(1.0)));

        // SOC continuity
        model.add_constraint(constraint!(expr(v.soc) == soc_prev.clone() - v.discharge + v.charge));

        // desired_discharge == min(load_cap, soc_prev)
        model.add_constraint(constraint!(
            soc_prev.clone() - load_cap.clone() <= expr(v.b_discharge) * m
        ));
        model.add_constraint(constraint!(
            load_cap.clone() - soc_prev.clone() <= (expr(1.0) - v.b_discharge) * m
        ));
        model.add_constraint(constraint!(expr(v.desired_discharge) <= load_cap.clone()));
        model.add_constraint(constraint!(expr(v.desired_discharge) <= soc_prev.clone()));
        model.add_constraint(constraint!(
            expr(v.desired_discharge) >= load_cap.clone() - (expr(1.0) - v.b_discharge) * m
        ));
        model.add_constraint(constraint!(
            expr(v.desired_discharge) >= soc_prev.clone() - expr(v.b_discharge) * m
        ));

        // discharge == desired_discharge when discharging, else 0
        model.add_constraint(constraint!(expr(v.discharge) <= expr(v.u_discharge) * m));
        model.add_constraint(constraint!(expr(v.discharge) <= expr(v.desired_discharge)));
        model.add_constraint(constraint!(
            expr(v.discharge) >= expr(v.desired_discharge) - (expr(1.0) - v.u_discharge) * m
        ));

        // desired_charge == min(p_charge_max, headroom_prev)
        model.add_constraint(constraint!(
            headroom_prev.clone() - charge_cap.clone() <= expr(v.b_charge) * m
        ));
        model.add_constraint(constraint!(
            charge_cap.clone() - headroom_prev.clone() <= (expr(1.0) - v.b_charge) * m
        ));
        model.add_constraint(constraint!(expr(v.desired_charge) <= charge_cap.clone()));
        model.add_constraint(constraint!(expr(v.desired_charge) <= headroom_prev.clone()));
        model.add_constraint(constraint!(
            expr(v.desired_charge) >= charge_cap.clone() - (expr(1.0) - v.b_charge) * m
        ));
        model.add_constraint(constraint!(
            expr(v.desired_charge) >= headroom_prev.clone() - expr(v.b_charge) * m
        ));

        // charge == desired_charge when charging, else 0
        model.add_constraint(constraint!(expr(v.charge) <= expr(v.u_charge) * m));
        model.add_constraint(constraint!(expr(v.charge) <= expr(v.desired_charge)));
        model.add_constraint(constraint!(
            expr(v.charge) >= expr(v.desired_charge) - (expr(1.0) - v.u_charge) * m
        ));
    }

    // Never charge during the best discharge opportunity or outside the
    // preferred windows; never discharge without an incentive.
    let no_charge: BTreeSet<Hour> = program_schedule
        .top_program_hours()
        .into_iter()
        .chain(costs.non_charging_hours())
        .collect();
    for hour in &no_charge {
        model.add_constraint(constraint!(expr(hourly[slot(*hour)].u_charge) == expr(0.0)));
    }
    let inactive = program_schedule.inactive_hours();
    for hour in &inactive {
        model.add_constraint(constraint!(expr(hourly[slot(*hour)].u_discharge) == expr(0.0)));
    }
    debug!(
        battery_id = battery.id,
        no_charge_hours = no_charge.len(),
        inactive_hours = inactive.len(),
        "dispatch model built"
    );

    let solution = model.solve().map_err(|e| match e {
        ResolutionError::Infeasible | ResolutionError::Unbounded => {
            error!(
                battery_id = battery.id,
                initial_soc,
                load = ?load.values(),
                programs = ?programs,
                battery = ?battery,
                error = %e,
                "dispatch model has no optimal solution"
            );
            OptimizationError::InfeasibleModel(e.to_string())
        }
        other => OptimizationError::Solver(other.to_string()),
    })?;

    let epsilon = settings.activity_epsilon;
    let mut objective_value = 0.0;
    let mut plan_hours = Vec::with_capacity(HOURS_PER_DAY);
    for (i, v) in hourly.iter().enumerate() {
        let hour = (i + 1) as Hour;
        let discharge_power = solution.value(v.discharge).max(0.0);
        let charge_power = solution.value(v.charge).max(0.0);
        let grid_power = solution.value(v.grid).max(0.0);
        let charging_status = ChargingStatus::classify(charge_power, discharge_power, epsilon);
        objective_value += -costs.discharge_reward[i] * discharge_power
            + costs.charge_cost[i] * charge_power
            + costs.grid_cost[i] * grid_power;

        plan_hours.push(HourlyDispatch {
            hour,
            discharge_power,
            charge_power,
            grid_power,
            soc: solution.value(v.soc),
            charging_status,
            charging_mode: program_schedule.charging_mode(hour),
            utility_power: charging_status.sign() * (charge_power + discharge_power)
                + load.at(hour),
        });
    }

    let plan = DispatchPlan {
        battery_id: battery.id,
        initial_soc,
        objective: objective_value,
        hours: plan_hours,
    };
    info!(
        battery_id = battery.id,
        objective = plan.objective,
        total_discharge = plan.total_discharge(),
        total_charge = plan.total_charge(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "dispatch solved"
    );
    Ok(plan)
}
