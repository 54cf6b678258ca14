use chrono::{DateTime, Days, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::triggers::{classify_activation, describe_change, future_load_changed, ActivationChange};
use super::{DispatchError, Trigger};
use crate::domain::{
    BatteryId, BatteryProfile, DailySchedule, HourlyLoad, ProgramActivation, ProgramDefinition,
    ProgramWindow,
};
use crate::optimizer::{reconcile, DispatchInput, DispatchStrategy, OptimizationError, ReconcileContext};
use crate::repo::consumption::HourValues;
use crate::repo::{AlarmAction, LoadSource, ProgramAlarm, Repositories};

/// A battery under control with the programs it takes part in.
pub struct ControlledBattery {
    pub profile: BatteryProfile,
    pub programs: Vec<ProgramDefinition>,
    run_lock: tokio::sync::Mutex<()>,
}

impl ControlledBattery {
    pub fn new(profile: BatteryProfile, programs: Vec<ProgramDefinition>) -> Self {
        Self {
            profile,
            programs,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn program(&self, name: &str) -> Option<&ProgramDefinition> {
        self.programs.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// Result of one successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub trigger: Trigger,
    pub objective: f64,
    pub initial_soc: f64,
    pub frozen_hours: usize,
    pub schedule: DailySchedule,
}

/// Result of storing a program activation.
#[derive(Debug, Clone, Serialize)]
pub struct ActivationOutcome {
    pub activation: ProgramActivation,
    pub alarm: Option<ProgramAlarm>,
    pub needs_update: bool,
}

/// Whether a battery waits for a recompute, and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpdateStatus {
    pub battery_id: BatteryId,
    pub needs_update: bool,
    pub trigger: Option<Trigger>,
}

/// Result of a load update.
#[derive(Debug, Clone, Serialize)]
pub struct LoadUpdate {
    pub effective: HourValues,
    pub needs_update: bool,
}

/// Gathers inputs, runs the dispatch strategy, reconciles and persists the
/// day schedule of each battery. Runs of one battery are serialized, runs of
/// different batteries are independent.
pub struct DispatchController {
    batteries: BTreeMap<BatteryId, ControlledBattery>,
    strategy: Arc<dyn DispatchStrategy>,
    repos: Repositories,
    timezone: Tz,
    pending: Mutex<BTreeMap<BatteryId, Trigger>>,
}

impl DispatchController {
    pub fn new(
        batteries: Vec<ControlledBattery>,
        strategy: Arc<dyn DispatchStrategy>,
        repos: Repositories,
        timezone: Tz,
    ) -> Self {
        Self {
            batteries: batteries.into_iter().map(|b| (b.profile.id, b)).collect(),
            strategy,
            repos,
            timezone,
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn batteries(&self) -> impl Iterator<Item = &ControlledBattery> {
        self.batteries.values()
    }

    pub fn battery(&self, battery_id: BatteryId) -> Result<&ControlledBattery, DispatchError> {
        self.batteries
            .get(&battery_id)
            .ok_or(DispatchError::UnknownBattery(battery_id))
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Local date of `now`.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }

    /// Queue a recompute of `battery_id`. The latest cause wins.
    pub fn mark_for_update(&self, battery_id: BatteryId, trigger: Trigger) {
        self.pending.lock().insert(battery_id, trigger);
    }

    pub fn pending(&self) -> Vec<BatteryId> {
        self.pending.lock().keys().copied().collect()
    }

    pub fn status(&self, battery_id: BatteryId) -> Result<UpdateStatus, DispatchError> {
        self.battery(battery_id)?;
        let trigger = self.pending.lock().get(&battery_id).copied();
        Ok(UpdateStatus {
            battery_id,
            needs_update: trigger.is_some(),
            trigger,
        })
    }

    pub async fn run(&self, battery_id: BatteryId, trigger: Trigger) -> Result<RunOutcome, DispatchError> {
        self.run_at(battery_id, Utc::now(), trigger).await
    }

    /// Compute and persist today's schedule of `battery_id` as seen at `now`.
    pub async fn run_at(
        &self,
        battery_id: BatteryId,
        now: DateTime<Utc>,
        trigger: Trigger,
    ) -> Result<RunOutcome, DispatchError> {
        let battery = self.battery(battery_id)?;
        let _guard = battery.run_lock.lock().await;
        let started = Instant::now();

        let local = now.with_timezone(&self.timezone);
        let date = local.date_naive();
        let clock_hour = local.hour();
        debug!(battery_id, %trigger, %date, clock_hour, "dispatch run started");

        let load_values = self.repos.consumption.effective(battery_id, date).await?;
        let load = HourlyLoad::from_map(&load_values)?;
        let programs = self.program_windows(battery, date).await?;
        let initial_soc = self.initial_soc(battery, date).await?;
        let previous = self.repos.schedules.find(battery_id, date).await?;

        let plan = self
            .strategy
            .dispatch(DispatchInput {
                load: load.clone(),
                battery: battery.profile.clone(),
                programs,
                initial_soc,
            })
            .await?;

        let reconciled = reconcile(
            &plan,
            &load,
            previous.as_ref(),
            ReconcileContext {
                date,
                clock_hour: Some(clock_hour),
                soc_reserve: battery.profile.soc_min,
                run_id: Uuid::new_v4(),
                now,
            },
        );
        self.repos
            .schedules
            .upsert(reconciled.schedule.clone())
            .await?;

        info!(
            battery_id,
            %trigger,
            %date,
            objective = plan.objective,
            frozen_hours = reconciled.frozen_hours,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "dispatch schedule persisted"
        );
        Ok(RunOutcome {
            trigger,
            objective: plan.objective,
            initial_soc,
            frozen_hours: reconciled.frozen_hours,
            schedule: reconciled.schedule,
        })
    }

    /// Run every battery marked for update. A battery whose run fails with a
    /// retryable error stays marked.
    pub async fn run_pending_at(&self, now: DateTime<Utc>) -> Vec<(BatteryId, Result<RunOutcome, DispatchError>)> {
        let due = std::mem::take(&mut *self.pending.lock());
        let mut results = Vec::with_capacity(due.len());
        for (battery_id, trigger) in due {
            let result = self.run_at(battery_id, now, trigger).await;
            if let Err(e) = &result {
                warn!(battery_id, %trigger, error = %e, retryable = e.is_retryable(), "pending dispatch failed");
                if e.is_retryable() {
                    // a newer mark keeps its own cause
                    self.pending.lock().entry(battery_id).or_insert(trigger);
                }
            }
            results.push((battery_id, result));
        }
        results
    }

    /// Recompute every battery.
    pub async fn run_all_at(&self, now: DateTime<Utc>) -> Vec<(BatteryId, Result<RunOutcome, DispatchError>)> {
        let mut results = Vec::with_capacity(self.batteries.len());
        for battery_id in self.batteries.keys().copied() {
            let result = self.run_at(battery_id, now, Trigger::Periodic).await;
            if let Err(e) = &result {
                warn!(battery_id, error = %e, "periodic dispatch failed");
            }
            results.push((battery_id, result));
        }
        results
    }

    /// Store a program activation, raising an alarm and marking the battery
    /// when the change affects dispatch.
    pub async fn record_activation(
        &self,
        activation: ProgramActivation,
        now: DateTime<Utc>,
    ) -> Result<ActivationOutcome, DispatchError> {
        let battery = self.battery(activation.battery_id)?;
        let definition = battery
            .program(&activation.program)
            .ok_or_else(|| DispatchError::UnknownProgram {
                battery_id: activation.battery_id,
                program: activation.program.clone(),
            })?;
        activation.to_window(definition)?;

        let mut activation = activation;
        activation.program = definition.name.clone();
        let previous = self.repos.programs.upsert(activation.clone()).await?;

        let is_today = activation.date == self.local_date(now);
        let change = classify_activation(previous.as_ref(), &activation);
        let mut alarm = None;
        let needs_update = match (change, previous) {
            (ActivationChange::Alarm, Some(previous)) => {
                let raised = ProgramAlarm {
                    id: Uuid::new_v4(),
                    battery_id: activation.battery_id,
                    program: activation.program.clone(),
                    date: activation.date,
                    raised_at: now,
                    message: describe_change(&previous, &activation),
                    previous,
                    current: activation.clone(),
                    action: AlarmAction::Idle,
                    cleared_at: None,
                };
                warn!(
                    battery_id = raised.battery_id,
                    program = %raised.program,
                    message = %raised.message,
                    "program activation changed"
                );
                self.repos.alarms.raise(raised.clone()).await?;
                alarm = Some(raised);
                is_today
            }
            (ActivationChange::First, _) => is_today && activation.status,
            _ => false,
        };

        if needs_update {
            self.mark_for_update(activation.battery_id, Trigger::ProgramChange);
        }
        Ok(ActivationOutcome {
            activation,
            alarm,
            needs_update,
        })
    }

    /// Store load values and mark the battery when today's remaining hours
    /// changed.
    pub async fn update_load(
        &self,
        battery_id: BatteryId,
        date: NaiveDate,
        source: LoadSource,
        values: &HourValues,
        now: DateTime<Utc>,
    ) -> Result<LoadUpdate, DispatchError> {
        self.battery(battery_id)?;
        HourlyLoad::check_values(values)?;

        let before = self.repos.consumption.effective(battery_id, date).await?;
        self.repos
            .consumption
            .upsert(battery_id, date, source, values)
            .await?;
        self.after_load_change(battery_id, date, before, now).await
    }

    /// Drop the manual overrides of a day.
    pub async fn clear_manual_load(
        &self,
        battery_id: BatteryId,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<LoadUpdate, DispatchError> {
        self.battery(battery_id)?;
        let before = self.repos.consumption.effective(battery_id, date).await?;
        self.repos.consumption.clear_manual(battery_id, date).await?;
        self.after_load_change(battery_id, date, before, now).await
    }

    async fn after_load_change(
        &self,
        battery_id: BatteryId,
        date: NaiveDate,
        before: HourValues,
        now: DateTime<Utc>,
    ) -> Result<LoadUpdate, DispatchError> {
        let effective = self.repos.consumption.effective(battery_id, date).await?;
        let local = now.with_timezone(&self.timezone);
        let needs_update =
            date == local.date_naive() && future_load_changed(&before, &effective, local.hour());
        if needs_update {
            debug!(battery_id, %date, "future load changed");
            self.mark_for_update(battery_id, Trigger::LoadUpdate);
        }
        Ok(LoadUpdate {
            effective,
            needs_update,
        })
    }

    /// Record the operator's decision on an open alarm. Rejecting drops the
    /// pending recompute, accepting keeps the battery queued.
    pub async fn resolve_alarm(
        &self,
        battery_id: BatteryId,
        alarm_id: Uuid,
        action: AlarmAction,
        now: DateTime<Utc>,
    ) -> Result<ProgramAlarm, DispatchError> {
        self.battery(battery_id)?;
        if action == AlarmAction::Idle {
            return Err(OptimizationError::invalid("an alarm is handled by accept or reject").into());
        }
        let unknown = || DispatchError::UnknownAlarm { battery_id, alarm_id };
        let alarm = self
            .repos
            .alarms
            .find(battery_id, alarm_id)
            .await?
            .ok_or_else(unknown)?;
        if !alarm.is_open() {
            return Err(DispatchError::AlarmHandled(alarm_id));
        }

        let resolved = self
            .repos
            .alarms
            .resolve(battery_id, alarm_id, action, now)
            .await?
            .ok_or_else(unknown)?;
        match action {
            AlarmAction::Accept => self.mark_for_update(battery_id, Trigger::ProgramChange),
            _ => {
                self.pending.lock().remove(&battery_id);
            }
        }
        info!(battery_id, %alarm_id, %action, program = %resolved.program, "alarm handled");
        Ok(resolved)
    }

    /// Program windows of the day, one per configured program.
    async fn program_windows(
        &self,
        battery: &ControlledBattery,
        date: NaiveDate,
    ) -> Result<Vec<ProgramWindow>, DispatchError> {
        let activations = self
            .repos
            .programs
            .activations(battery.profile.id, date)
            .await?;

        battery
            .programs
            .iter()
            .map(|definition| {
                match activations
                    .iter()
                    .find(|a| a.program.eq_ignore_ascii_case(&definition.name))
                {
                    Some(activation) => Ok(activation.to_window(definition)?),
                    None => Ok(ProgramWindow::inactive(&definition.name, definition.priority)),
                }
            })
            .collect()
    }

    /// Yesterday's closing SOC, or a full battery when there is none.
    async fn initial_soc(&self, battery: &ControlledBattery, date: NaiveDate) -> Result<f64, DispatchError> {
        let profile = &battery.profile;
        let Some(yesterday) = date.checked_sub_days(Days::new(1)) else {
            return Ok(profile.soc_max);
        };
        let closing = self
            .repos
            .schedules
            .find(profile.id, yesterday)
            .await?
            .and_then(|s| s.closing_soc())
            .filter(|soc| soc.is_finite());

        Ok(match closing {
            None => profile.soc_max,
            Some(soc) => {
                let clamped = profile.clamp_soc(soc);
                if clamped != soc {
                    warn!(battery_id = profile.id, soc, clamped, "closing soc outside limits");
                }
                clamped
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{hours, ChargingStatus, HourRange};
    use crate::optimizer::{DispatchPlan, HourlyDispatch, MockDispatchStrategy};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn profile() -> BatteryProfile {
        BatteryProfile::new(
            1,
            "pcs-1",
            1000.0,
            0.1,
            500.0,
            120.0,
            HourRange::new(22, 24).unwrap(),
            HourRange::new(2, 10).unwrap(),
        )
        .unwrap()
    }

    fn programs() -> Vec<ProgramDefinition> {
        vec![
            ProgramDefinition { name: "GA".into(), priority: 1 },
            ProgramDefinition { name: "DR".into(), priority: 2 },
        ]
    }

    fn idle_plan(input: &DispatchInput) -> DispatchPlan {
        DispatchPlan {
            battery_id: input.battery.id,
            initial_soc: input.initial_soc,
            objective: 42.0,
            hours: hours()
                .map(|hour| HourlyDispatch {
                    hour,
                    discharge_power: 0.0,
                    charge_power: 0.0,
                    grid_power: input.load.at(hour),
                    soc: input.initial_soc,
                    charging_status: ChargingStatus::Idle,
                    charging_mode: 0,
                    utility_power: input.load.at(hour),
                })
                .collect(),
        }
    }

    fn controller(strategy: MockDispatchStrategy) -> (DispatchController, Repositories) {
        let repos = Repositories::in_memory();
        let controller = DispatchController::new(
            vec![ControlledBattery::new(profile(), programs())],
            Arc::new(strategy),
            repos.clone(),
            chrono_tz::UTC,
        );
        (controller, repos)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 2).unwrap()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 2, hour, 30, 0).unwrap()
    }

    fn flat_load() -> HourValues {
        hours().map(|h| (h, 300.0)).collect()
    }

    fn ga(status: bool, start: Option<u8>, end: Option<u8>) -> ProgramActivation {
        ProgramActivation {
            battery_id: 1,
            program: "GA".into(),
            date: date(),
            status,
            start,
            end,
            is_manual: false,
        }
    }

    #[tokio::test]
    async fn test_run_persists_full_day() {
        let mut strategy = MockDispatchStrategy::new();
        strategy
            .expect_dispatch()
            .times(1)
            .returning(|input| Ok(idle_plan(&input)));
        let (controller, repos) = controller(strategy);
        repos
            .consumption
            .upsert(1, date(), LoadSource::Baseline, &flat_load())
            .await
            .unwrap();

        let outcome = controller.run_at(1, at(9), Trigger::Manual).await.unwrap();
        assert_eq!(outcome.objective, 42.0);
        assert_eq!(outcome.initial_soc, 1000.0);
        assert_eq!(outcome.frozen_hours, 0);

        let stored = repos.schedules.find(1, date()).await.unwrap().unwrap();
        assert_eq!(stored.rows.len(), 24);
        assert_eq!(stored, outcome.schedule);
    }

    #[tokio::test]
    async fn test_missing_load_is_retryable_and_persists_nothing() {
        let mut strategy = MockDispatchStrategy::new();
        strategy.expect_dispatch().never();
        let (controller, repos) = controller(strategy);

        let err = controller.run_at(1, at(9), Trigger::Manual).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Optimization(OptimizationError::InvalidInput { retryable: true, .. })
        ));
        assert!(repos.schedules.find(1, date()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_solver_failure_keeps_last_schedule() {
        let mut strategy = MockDispatchStrategy::new();
        let mut calls = 0;
        strategy.expect_dispatch().times(2).returning(move |input| {
            calls += 1;
            if calls == 1 {
                Ok(idle_plan(&input))
            } else {
                Err(OptimizationError::SolverTimeout(std::time::Duration::from_secs(1)))
            }
        });
        let (controller, repos) = controller(strategy);
        repos
            .consumption
            .upsert(1, date(), LoadSource::Baseline, &flat_load())
            .await
            .unwrap();

        let first = controller.run_at(1, at(9), Trigger::Manual).await.unwrap();
        let err = controller.run_at(1, at(10), Trigger::Manual).await.unwrap_err();
        assert!(err.is_retryable());
        let stored = repos.schedules.find(1, date()).await.unwrap().unwrap();
        assert_eq!(stored, first.schedule);
    }

    #[tokio::test]
    async fn test_unknown_battery() {
        let (controller, _) = controller(MockDispatchStrategy::new());
        let err = controller.run_at(9, at(9), Trigger::Manual).await.unwrap_err();
        assert!(matches!(err, DispatchError::UnknownBattery(9)));
    }

    #[tokio::test]
    async fn test_programs_and_initial_soc_reach_strategy() {
        let mut strategy = MockDispatchStrategy::new();
        strategy
            .expect_dispatch()
            .withf(|input| {
                input.initial_soc == 640.0
                    && input.programs.len() == 2
                    && input.programs[0].effective_hours() == Some(HourRange::new(15, 16).unwrap())
                    && input.programs[1].effective_hours().is_none()
            })
            .times(1)
            .returning(|input| Ok(idle_plan(&input)));
        let (controller, repos) = controller(strategy);
        repos
            .consumption
            .upsert(1, date(), LoadSource::Baseline, &flat_load())
            .await
            .unwrap();
        repos.programs.upsert(ga(true, Some(14), Some(15))).await.unwrap();

        let yesterday = date().pred_opt().unwrap();
        let rows = hours()
            .map(|hour| crate::domain::ScheduleRow {
                hour,
                charging_status: ChargingStatus::Idle,
                charging_mode: 0,
                power: 0.0,
                soc: 640.0,
                display_soc: 740.0,
                utility_power: 300.0,
            })
            .collect();
        repos
            .schedules
            .upsert(DailySchedule {
                battery_id: 1,
                date: yesterday,
                run_id: Uuid::new_v4(),
                updated_at: at(0),
                rows,
            })
            .await
            .unwrap();

        controller.run_at(1, at(9), Trigger::Manual).await.unwrap();
    }

    #[tokio::test]
    async fn test_activation_alarms_and_marks() {
        let (controller, repos) = controller(MockDispatchStrategy::new());

        let first = controller
            .record_activation(ga(true, Some(14), Some(15)), at(8))
            .await
            .unwrap();
        assert!(first.alarm.is_none());
        assert!(first.needs_update);
        controller.pending.lock().clear();

        let same = controller
            .record_activation(ga(true, Some(14), Some(15)), at(9))
            .await
            .unwrap();
        assert!(same.alarm.is_none());
        assert!(!same.needs_update);

        let moved = controller
            .record_activation(ga(true, Some(16), Some(17)), at(10))
            .await
            .unwrap();
        assert!(moved.alarm.is_some());
        assert_eq!(controller.pending(), vec![1]);
        assert_eq!(repos.alarms.list(1, date()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_activation_for_unknown_program_is_rejected() {
        let (controller, _) = controller(MockDispatchStrategy::new());
        let mut activation = ga(true, Some(14), Some(15));
        activation.program = "XYZ".into();
        let err = controller.record_activation(activation, at(8)).await.unwrap_err();
        assert!(matches!(err, DispatchError::UnknownProgram { .. }));
    }

    #[tokio::test]
    async fn test_past_load_change_does_not_mark() {
        let (controller, _) = controller(MockDispatchStrategy::new());
        controller
            .update_load(1, date(), LoadSource::Baseline, &flat_load(), at(23))
            .await
            .unwrap();

        let past = controller
            .update_load(1, date(), LoadSource::Manual, &BTreeMap::from([(5, 10.0)]), at(10))
            .await
            .unwrap();
        assert!(!past.needs_update);
        assert_eq!(past.effective[&5], 10.0);

        let future = controller
            .update_load(1, date(), LoadSource::Manual, &BTreeMap::from([(20, 10.0)]), at(10))
            .await
            .unwrap();
        assert!(future.needs_update);

        controller.pending.lock().clear();
        let cleared = controller.clear_manual_load(1, date(), at(10)).await.unwrap();
        assert!(cleared.needs_update);
        assert_eq!(cleared.effective[&20], 300.0);
    }

    #[tokio::test]
    async fn test_pending_runs_drain_and_retry() {
        let mut strategy = MockDispatchStrategy::new();
        strategy
            .expect_dispatch()
            .times(1)
            .returning(|input| Ok(idle_plan(&input)));
        let (controller, repos) = controller(strategy);

        controller.mark_for_update(1, Trigger::LoadUpdate);
        let results = controller.run_pending_at(at(9)).await;
        assert!(results[0].1.is_err());
        // no load yet, retryable
        assert_eq!(controller.pending(), vec![1]);
        assert_eq!(controller.status(1).unwrap().trigger, Some(Trigger::LoadUpdate));

        repos
            .consumption
            .upsert(1, date(), LoadSource::Baseline, &flat_load())
            .await
            .unwrap();
        let results = controller.run_pending_at(at(9)).await;
        assert_eq!(results[0].1.as_ref().unwrap().trigger, Trigger::LoadUpdate);
        assert!(controller.pending().is_empty());
        assert!(!controller.status(1).unwrap().needs_update);
    }

    /// Strategy that holds each dispatch open for a while and records the
    /// highest number of dispatches in flight.
    #[derive(Default)]
    struct SlowStrategy {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl DispatchStrategy for SlowStrategy {
        async fn dispatch(&self, input: DispatchInput) -> Result<DispatchPlan, OptimizationError> {
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(idle_plan(&input))
        }
    }

    async fn slow_controller() -> (DispatchController, Arc<SlowStrategy>) {
        let strategy = Arc::new(SlowStrategy::default());
        let repos = Repositories::in_memory();
        let mut second = profile();
        second.id = 2;
        let controller = DispatchController::new(
            vec![
                ControlledBattery::new(profile(), programs()),
                ControlledBattery::new(second, programs()),
            ],
            strategy.clone(),
            repos.clone(),
            chrono_tz::UTC,
        );
        for battery_id in [1, 2] {
            repos
                .consumption
                .upsert(battery_id, date(), LoadSource::Baseline, &flat_load())
                .await
                .unwrap();
        }
        (controller, strategy)
    }

    #[tokio::test]
    async fn test_runs_of_one_battery_are_serialized() {
        let (controller, strategy) = slow_controller().await;
        let (first, second) = tokio::join!(
            controller.run_at(1, at(9), Trigger::Manual),
            controller.run_at(1, at(9), Trigger::LoadUpdate),
        );
        assert!(first.is_ok() && second.is_ok());
        assert_eq!(strategy.peak.load(Ordering::SeqCst), 1);
        assert_eq!(strategy.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_runs_of_different_batteries_overlap() {
        let (controller, strategy) = slow_controller().await;
        let (first, second) = tokio::join!(
            controller.run_at(1, at(9), Trigger::Manual),
            controller.run_at(2, at(9), Trigger::Manual),
        );
        assert!(first.is_ok() && second.is_ok());
        assert_eq!(strategy.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_activation_change_runs_as_program_change() {
        let mut strategy = MockDispatchStrategy::new();
        strategy
            .expect_dispatch()
            .times(1)
            .returning(|input| Ok(idle_plan(&input)));
        let (controller, repos) = controller(strategy);
        repos
            .consumption
            .upsert(1, date(), LoadSource::Baseline, &flat_load())
            .await
            .unwrap();

        controller
            .record_activation(ga(true, Some(14), Some(15)), at(8))
            .await
            .unwrap();
        assert_eq!(controller.status(1).unwrap().trigger, Some(Trigger::ProgramChange));

        let results = controller.run_pending_at(at(8)).await;
        assert_eq!(results[0].1.as_ref().unwrap().trigger, Trigger::ProgramChange);
    }

    #[tokio::test]
    async fn test_resolving_alarms() {
        let (controller, repos) = controller(MockDispatchStrategy::new());
        controller
            .record_activation(ga(true, Some(14), Some(15)), at(8))
            .await
            .unwrap();
        let moved = controller
            .record_activation(ga(true, Some(16), Some(17)), at(9))
            .await
            .unwrap();
        let alarm = moved.alarm.unwrap();
        assert_eq!(alarm.action, AlarmAction::Idle);
        assert_eq!(controller.pending(), vec![1]);

        let rejected = controller
            .resolve_alarm(1, alarm.id, AlarmAction::Reject, at(10))
            .await
            .unwrap();
        assert_eq!(rejected.action, AlarmAction::Reject);
        assert_eq!(rejected.cleared_at, Some(at(10)));
        assert!(controller.pending().is_empty());
        assert_eq!(repos.alarms.list(1, date()).await.unwrap()[0], rejected);

        let again = controller
            .resolve_alarm(1, alarm.id, AlarmAction::Accept, at(11))
            .await
            .unwrap_err();
        assert!(matches!(again, DispatchError::AlarmHandled(_)));

        let unknown = controller
            .resolve_alarm(1, Uuid::new_v4(), AlarmAction::Accept, at(11))
            .await
            .unwrap_err();
        assert!(matches!(unknown, DispatchError::UnknownAlarm { .. }));

        let off = controller
            .record_activation(ga(false, None, None), at(12))
            .await
            .unwrap();
        controller.pending.lock().clear();
        let accepted = controller
            .resolve_alarm(1, off.alarm.unwrap().id, AlarmAction::Accept, at(13))
            .await
            .unwrap();
        assert_eq!(accepted.action, AlarmAction::Accept);
        assert_eq!(controller.status(1).unwrap().trigger, Some(Trigger::ProgramChange));
    }
}
