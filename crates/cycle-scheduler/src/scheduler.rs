//! Cycle Scheduler Implementation

use crate::timer::{CycleTimer, OverrunFlag};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use telemetry::status;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Scheduler configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Cycle period must be non-zero")]
    ZeroPeriod,
    #[error("Timer rate must be non-zero")]
    ZeroTimerRate,
}

/// Configuration for the cycle scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Counter ticks per control cycle (default: 6250)
    pub period_ticks: u32,
    /// Counter rate in Hz (default: 250 kHz, 16 MHz / 64)
    pub timer_hz: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period_ticks: 6250,
            timer_hz: 250_000,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.period_ticks == 0 {
            return Err(SchedulerError::ZeroPeriod);
        }
        if self.timer_hz == 0 {
            return Err(SchedulerError::ZeroTimerRate);
        }
        Ok(())
    }

    /// Control cycles per second
    pub fn loop_hz(&self) -> f32 {
        self.timer_hz as f32 / self.period_ticks.max(1) as f32
    }
}

/// How a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Boundary reached normally
    OnTime,
    /// Work alone used up the period, boundary already passed on entry
    Slow,
    /// Counter overflowed before the boundary was observed
    Overrun,
}

impl CycleOutcome {
    /// Status bits this outcome contributes to a record
    pub fn status_bits(self) -> u32 {
        match self {
            CycleOutcome::OnTime => 0,
            CycleOutcome::Slow => status::MAIN_LOOP_SLOW,
            CycleOutcome::Overrun => status::TIMER_OVERFLOW,
        }
    }
}

/// Fixed-period cycle gate
pub struct CycleScheduler<T: CycleTimer> {
    timer: T,
    overrun: Arc<OverrunFlag>,
    config: SchedulerConfig,
    /// Outcome of the previous boundary, reported on the next `begin_cycle`
    carried: u32,
    overruns: u32,
}

impl<T: CycleTimer> CycleScheduler<T> {
    pub fn new(timer: T, config: SchedulerConfig) -> Self {
        info!(
            "Cycle scheduler: {} ticks per cycle ({:.1} Hz)",
            config.period_ticks,
            config.loop_hz()
        );
        Self {
            timer,
            overrun: Arc::new(OverrunFlag::new()),
            config,
            carried: 0,
            overruns: 0,
        }
    }

    /// Flag the counter-overflow interrupt should raise
    pub fn overrun_flag(&self) -> Arc<OverrunFlag> {
        self.overrun.clone()
    }

    /// Reset the counter and overflow flag.
    ///
    /// Returns status bits left by the previous boundary wait, which ran
    /// after that cycle's record was already persisted.
    pub fn begin_cycle(&mut self) -> u32 {
        self.timer.reset();
        self.overrun.clear();
        std::mem::take(&mut self.carried)
    }

    /// Busy-wait until the period elapses or the counter overflows
    pub fn wait_for_cycle_boundary(&mut self) -> CycleOutcome {
        let period = self.config.period_ticks;
        let slow = self.timer.ticks() >= period;

        let outcome = loop {
            if self.overrun.is_set() {
                break CycleOutcome::Overrun;
            }
            if self.timer.ticks() >= period {
                break if slow { CycleOutcome::Slow } else { CycleOutcome::OnTime };
            }
            std::hint::spin_loop();
        };

        match outcome {
            CycleOutcome::OnTime => {}
            CycleOutcome::Slow => debug!("Cycle work exceeded {} ticks", period),
            CycleOutcome::Overrun => {
                self.overruns += 1;
                warn!("Cycle overrun ({} total)", self.overruns);
            }
        }

        self.carried |= outcome.status_bits();
        outcome
    }

    /// Overruns since construction
    pub fn overrun_count(&self) -> u32 {
        self.overruns
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockTimer;

    fn scheduler(step: u32) -> CycleScheduler<MockTimer> {
        let mut scheduler = CycleScheduler::new(MockTimer::new(step), SchedulerConfig::default());
        let flag = scheduler.overrun_flag();
        scheduler.timer.attach_overflow(flag);
        scheduler
    }

    #[test]
    fn test_default_loop_rate() {
        let config = SchedulerConfig::default();
        assert!((config.loop_hz() - 40.0).abs() < 1e-3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_period_rejected() {
        let config = SchedulerConfig { period_ticks: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(SchedulerError::ZeroPeriod));
    }

    #[test]
    fn test_on_time_cycle() {
        let mut scheduler = scheduler(100);
        assert_eq!(scheduler.begin_cycle(), 0);
        scheduler.timer().spend(1000);
        assert_eq!(scheduler.wait_for_cycle_boundary(), CycleOutcome::OnTime);
        assert_eq!(scheduler.begin_cycle(), 0);
        assert_eq!(scheduler.timer().resets(), 2);
    }

    #[test]
    fn test_slow_cycle_is_carried() {
        let mut scheduler = scheduler(100);
        scheduler.begin_cycle();
        scheduler.timer().spend(7000);
        assert_eq!(scheduler.wait_for_cycle_boundary(), CycleOutcome::Slow);
        assert_eq!(scheduler.begin_cycle(), status::MAIN_LOOP_SLOW);
        assert_eq!(scheduler.begin_cycle(), 0);
    }

    #[test]
    fn test_overflow_reports_overrun() {
        let mut scheduler = scheduler(100);
        scheduler.begin_cycle();
        scheduler.timer().spend(70_000);
        assert_eq!(scheduler.wait_for_cycle_boundary(), CycleOutcome::Overrun);
        assert_eq!(scheduler.overrun_count(), 1);

        let carried = scheduler.begin_cycle();
        assert_ne!(carried & status::TIMER_OVERFLOW, 0);
        assert!(!scheduler.overrun_flag().is_set());
    }

    #[test]
    fn test_overflow_flag_wins_over_counter() {
        let mut scheduler = scheduler(1);
        scheduler.begin_cycle();
        scheduler.overrun_flag().on_overflow();
        assert_eq!(scheduler.wait_for_cycle_boundary(), CycleOutcome::Overrun);
    }
}
