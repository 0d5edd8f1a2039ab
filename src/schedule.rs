//! Daily trigger using a cron expression
//!
//! Fires the fan-out job once per day at a fixed local time in a fixed UTC
//! offset. Runs are awaited one at a time, so they never overlap.

use crate::config::Config;
use crate::error::Result;
use crate::fanout::FanoutJob;
use chrono::{DateTime, FixedOffset, Utc};
use cron::Schedule;
use std::str::FromStr;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Once-a-day schedule at `hour:minute` in `offset`
#[derive(Debug, Clone)]
pub struct DailySchedule {
    cron_expr: String,
    schedule: Schedule,
    offset: FixedOffset,
}

impl DailySchedule {
    pub fn new(hour: u32, minute: u32, offset: FixedOffset) -> Result<Self> {
        // Cron crate needs 6 fields (sec min hour dom month dow)
        let cron_expr = format!("0 {} {} * * *", minute, hour);
        let schedule = Schedule::from_str(&cron_expr)?;

        Ok(Self {
            cron_expr,
            schedule,
            offset,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.schedule_hour, config.schedule_minute, config.schedule_offset)
    }

    pub fn cron_expr(&self) -> &str {
        &self.cron_expr
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Next trigger instant strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<FixedOffset>> {
        self.schedule.after(&now.with_timezone(&self.offset)).next()
    }
}

/// Sleep until each trigger instant and run the job, forever
pub async fn run(schedule: DailySchedule, job: FanoutJob) {
    info!(
        "Daily reminder scheduled ({} at UTC{})",
        schedule.cron_expr(),
        schedule.offset()
    );

    loop {
        let now = Utc::now();
        let Some(next) = schedule.next_after(now) else {
            error!("Schedule {} has no upcoming runs, stopping", schedule.cron_expr());
            return;
        };

        let wait = (next.with_timezone(&Utc) - now).to_std().unwrap_or_default();
        info!("Next reminder run at {} (in {}s)", next, wait.as_secs());
        tokio::time::sleep(wait).await;

        let report = job.run().await;
        info!("Reminder run finished: {}", report);
    }
}

/// Start the scheduler as a background task
pub fn spawn(schedule: DailySchedule, job: FanoutJob) -> JoinHandle<()> {
    tokio::spawn(run(schedule, job))
}
