//! Daily trigger for the pipeline.
//!
//! Fires once at startup (optional) and then every day at the configured
//! local hour/minute. Runs are awaited back to back inside one task, so two
//! runs never overlap; a slot that passes while a run is still going is
//! skipped.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Local, TimeZone};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::Env;
use crate::error::ConfigError;
use crate::pipeline::Pipeline;

/// When the pipeline runs.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Local hour, 0–23.
    pub hour: u32,
    /// Minute, 0–59.
    pub minute: u32,
    /// Run once immediately when the scheduler starts.
    pub run_on_startup: bool,
}

impl ScheduleConfig {
    pub fn from_lookup(env: &Env) -> Result<Self, ConfigError> {
        let hour: u32 = env.parse_or("SCHEDULE_HOUR", 8)?;
        let minute: u32 = env.parse_or("SCHEDULE_MINUTE", 0)?;
        if hour > 23 {
            return Err(ConfigError::InvalidValue {
                key: "SCHEDULE_HOUR".to_string(),
                message: format!("{hour} is not in 0-23"),
            });
        }
        if minute > 59 {
            return Err(ConfigError::InvalidValue {
                key: "SCHEDULE_MINUTE".to_string(),
                message: format!("{minute} is not in 0-59"),
            });
        }
        Ok(Self {
            hour,
            minute,
            run_on_startup: env.flag_or("RUN_ON_STARTUP", true)?,
        })
    }

    /// Six-field cron expression (`sec min hour dom month dow`).
    pub fn cron_expression(&self) -> String {
        format!("0 {} {} * * *", self.minute, self.hour)
    }

    pub fn schedule(&self) -> Result<cron::Schedule, ConfigError> {
        cron::Schedule::from_str(&self.cron_expression()).map_err(|e| {
            ConfigError::InvalidValue {
                key: "SCHEDULE_HOUR/SCHEDULE_MINUTE".to_string(),
                message: format!("invalid cron: {e}"),
            }
        })
    }
}

/// Next fire time strictly after `from`.
pub fn next_fire_after<Tz: TimeZone>(
    schedule: &cron::Schedule,
    from: &DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    schedule.after(from).next()
}

/// Spawn the scheduler loop.
///
/// Returns a `JoinHandle` and a shutdown flag. Set the flag to stop after the
/// current wait; abort the handle to stop immediately.
///
/// Fails with [`crate::error::Error::Config`] if the schedule does not form a
/// valid cron expression.
pub fn spawn_scheduler(
    pipeline: Arc<Pipeline>,
    config: ScheduleConfig,
) -> crate::error::Result<(JoinHandle<()>, Arc<AtomicBool>)> {
    let schedule = config.schedule()?;
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!(
            "Scheduler started, running daily at {:02}:{:02}",
            config.hour, config.minute
        );

        if config.run_on_startup {
            info!("Running pipeline immediately on startup");
            run_once(&pipeline).await;
        }

        let mut last_fire: Option<DateTime<Local>> = None;
        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Scheduler shutting down");
                return;
            }

            // Never fire the same slot twice if the wall clock lags the timer.
            let now = Local::now();
            let from = last_fire.map_or(now, |f| f.max(now));
            let Some(next) = next_fire_after(&schedule, &from) else {
                error!("Schedule has no upcoming fire time; stopping");
                return;
            };

            info!(next_run = %next.to_rfc3339(), "Next pipeline run scheduled");
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Scheduler shutting down");
                return;
            }

            last_fire = Some(next);
            run_once(&pipeline).await;
        }
    });

    Ok((handle, shutdown_flag))
}

/// Run the pipeline and absorb a fatal run error.
async fn run_once(pipeline: &Pipeline) {
    if let Err(e) = pipeline.run().await {
        error!(error = %e, "Pipeline run aborted; waiting for next trigger");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Timelike, Utc};

    fn config(hour: u32, minute: u32) -> ScheduleConfig {
        ScheduleConfig {
            hour,
            minute,
            run_on_startup: true,
        }
    }

    #[test]
    fn cron_expression_fields() {
        assert_eq!(config(8, 5).cron_expression(), "0 5 8 * * *");
    }

    #[test]
    fn next_fire_later_today() {
        let schedule = config(8, 0).schedule().unwrap();
        let from = Utc.with_ymd_and_hms(2026, 10, 19, 7, 0, 0).unwrap();
        let next = next_fire_after(&schedule, &from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap());
    }

    #[test]
    fn next_fire_rolls_to_tomorrow() {
        let schedule = config(8, 0).schedule().unwrap();
        let from = Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap();
        let next = next_fire_after(&schedule, &from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 20, 8, 0, 0).unwrap());
    }

    #[test]
    fn next_fire_is_strictly_after() {
        let schedule = config(8, 0).schedule().unwrap();
        let at_slot = Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap();
        let next = next_fire_after(&schedule, &at_slot).unwrap();
        assert_eq!((next - at_slot).num_days(), 1);
        assert_eq!(next.hour(), 8);
    }

    #[test]
    fn config_defaults() {
        let config = ScheduleConfig::from_lookup(&Env::from_pairs(&[])).unwrap();
        assert_eq!((config.hour, config.minute), (8, 0));
        assert!(config.run_on_startup);
    }

    #[test]
    fn config_rejects_out_of_range() {
        let env = Env::from_pairs(&[("SCHEDULE_HOUR", "24")]);
        assert!(ScheduleConfig::from_lookup(&env).is_err());
        let env = Env::from_pairs(&[("SCHEDULE_MINUTE", "60")]);
        assert!(ScheduleConfig::from_lookup(&env).is_err());
    }

    #[test]
    fn config_startup_run_can_be_disabled() {
        let env = Env::from_pairs(&[("RUN_ON_STARTUP", "false")]);
        assert!(!ScheduleConfig::from_lookup(&env).unwrap().run_on_startup);
    }
}
