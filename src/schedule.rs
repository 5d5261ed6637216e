use chrono::{DateTime, TimeDelta, Timelike, Utc};
use chrono_tz::Tz;
use configuration::{ConfigError, ScheduleSettings};
use pipeline::Pipeline;
use std::future::Future;
use tokio::task::{JoinError, JoinSet};

/// Fires once an hour at a fixed minute, evaluated in a given timezone
/// (the equivalent of the cron expression `<minute> * * * *`).
///
/// The timezone matters for zones with a non-whole-hour offset: minute 0 in
/// Asia/Kolkata is minute 30 in UTC.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlySchedule {
    pub minute: u32,
    pub timezone: Tz,
}

impl HourlySchedule {
    pub fn from_settings(settings: &ScheduleSettings) -> Result<Self, ConfigError> {
        Ok(Self { minute: settings.minute, timezone: settings.timezone()? })
    }

    /// The first firing instant strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.timezone);
        let top_of_hour = now
            - TimeDelta::minutes(i64::from(local.minute()))
            - TimeDelta::seconds(i64::from(local.second()))
            - TimeDelta::nanoseconds(i64::from(local.nanosecond()));

        let mut next = top_of_hour + TimeDelta::minutes(i64::from(self.minute));
        while next <= now {
            next += TimeDelta::hours(1);
        }
        next
    }

    /// The tick to wait for next, never at or before the one that last fired.
    ///
    /// Guards against the wall clock stepping backwards while sleeping, which
    /// would otherwise hand back the tick that just ran.
    pub fn following(&self, now: DateTime<Utc>, last_fired: Option<DateTime<Utc>>) -> DateTime<Utc> {
        let reference = last_fired.map_or(now, |fired| now.max(fired));
        self.next_after(reference)
    }
}

/// Starts one pipeline run per tick until `shutdown` resolves.
///
/// Each run is spawned, so a slow run never delays the next tick. Overlapping
/// runs are safe because writes replace rows by `(symbol, date)`. Runs already
/// started when `shutdown` fires are awaited, so each one closes its store.
pub async fn run_schedule(pipeline: Pipeline, schedule: HourlySchedule, shutdown: impl Future<Output = ()>) {
    tracing::info!(
        symbol = %pipeline.symbol(),
        minute = schedule.minute,
        timezone = %schedule.timezone,
        "Hourly schedule started."
    );

    let mut runs = JoinSet::new();
    let mut last_fired = None;
    tokio::pin!(shutdown);

    loop {
        while let Some(finished) = runs.try_join_next() {
            report_join(finished);
        }

        let now = Utc::now();
        let next = schedule.following(now, last_fired);
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::info!(next_run = %next.with_timezone(&schedule.timezone), "Waiting for the next run.");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                last_fired = Some(next);
                let pipeline = pipeline.clone();
                runs.spawn(async move {
                    pipeline.run().await;
                });
            }
            _ = &mut shutdown => {
                tracing::info!(in_flight = runs.len(), "Interrupted, stopping the schedule.");
                break;
            }
        }
    }

    while let Some(finished) = runs.join_next().await {
        report_join(finished);
    }
    tracing::info!("Schedule stopped.");
}

fn report_join(finished: Result<(), JoinError>) {
    if let Err(e) = finished {
        tracing::error!(error = %e, "Scheduled run did not complete.");
    }
}
