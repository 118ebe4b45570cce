//! Recurring report passes on a cron schedule.
//!
//! One pass runs at a time. A firing that arrives while the previous pass is still
//! running is skipped, and a pass that fails or panics never stops the schedule.

use chrono::{DateTime, Utc};
use cron::Schedule;
use log::{error, info, warn};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;

use crate::reporter::{ReportOutcome, Reporter};

/// Top of every hour.
pub const DEFAULT_CRON: &str = "0 0 * * * *";

/// Spring's marker for a disabled cron trigger.
pub const DISABLED_CRON: &str = "-";

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Invalid cron expression: {0}")]
    InvalidCron(String),
}

/// Cron expression wrapper, seconds first (6 or 7 fields). `?` is accepted as `*`.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: Option<Schedule>,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let expression = expression.trim();
        if expression == DISABLED_CRON {
            return Ok(Self {
                expression: expression.to_string(),
                schedule: None,
            });
        }

        let normalized = expression.replace('?', "*");
        let schedule = Schedule::from_str(&normalized)
            .map_err(|e| ScheduleError::InvalidCron(format!("{expression}: {e}")))?;
        Ok(Self {
            expression: expression.to_string(),
            schedule: Some(schedule),
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn is_disabled(&self) -> bool {
        self.schedule.is_none()
    }

    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.as_ref()?.after(&after).next()
    }
}

impl Default for CronSchedule {
    fn default() -> Self {
        Self {
            expression: DEFAULT_CRON.to_string(),
            schedule: Schedule::from_str(DEFAULT_CRON).ok(),
        }
    }
}

/// Releases the in-flight flag when a pass ends, including by panic.
struct PassGuard(Arc<AtomicBool>);

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ReportScheduler {
    reporter: Arc<Reporter>,
    schedule: CronSchedule,
    enabled: bool,
    running: Arc<AtomicBool>,
}

impl ReportScheduler {
    pub fn new(reporter: Arc<Reporter>, schedule: CronSchedule) -> Self {
        Self {
            reporter,
            schedule,
            enabled: true,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Starts one pass on the blocking pool, or returns `None` if one is in flight.
    pub fn fire(&self) -> Option<JoinHandle<ReportOutcome>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Previous @InjectValue scan is still running, skipping this firing");
            return None;
        }

        let guard = PassGuard(Arc::clone(&self.running));
        let reporter = Arc::clone(&self.reporter);
        Some(tokio::task::spawn_blocking(move || {
            let _guard = guard;
            reporter.run_once()
        }))
    }

    /// Fires passes until `shutdown` completes or the schedule runs out.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        if !self.enabled {
            info!("Periodic @InjectValue reporting is disabled");
            return;
        }
        if self.schedule.is_disabled() {
            info!("@InjectValue report schedule is `{DISABLED_CRON}`, nothing to run");
            return;
        }

        info!(
            "Scheduling @InjectValue reports with cron `{}`",
            self.schedule.expression()
        );
        tokio::pin!(shutdown);

        loop {
            let now = Utc::now();
            let Some(next) = self.schedule.next_after(now) else {
                warn!(
                    "Cron `{}` has no upcoming firing times, stopping",
                    self.schedule.expression()
                );
                break;
            };
            let wait = (next - now).to_std().unwrap_or_default();

            tokio::select! {
                () = &mut shutdown => {
                    info!("Stopping @InjectValue report scheduler");
                    break;
                }
                () = tokio::time::sleep(wait) => {}
            }

            if let Some(pass) = self.fire() {
                tokio::spawn(async move {
                    if let Err(e) = pass.await {
                        error!("@InjectValue report pass aborted: {e}");
                    }
                });
            }
        }
    }
}
