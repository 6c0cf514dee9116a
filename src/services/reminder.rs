use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use teloxide::types::ChatId;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::bot::presentation;
use crate::bot::transport::Messenger;
use crate::config::{ReminderMode, ReminderSettings, Whitelist};
use crate::database::{connection::DatabaseManager, models::*};
use crate::services::timezone::TimezoneService;
use crate::utils::logging::{log_delivery_error, log_system_event};

/// Counts from one pass over the whitelist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum Check {
    Sent,
    Skipped,
}

/// One reminder pass. Scheduling lives in [`ReminderService`].
pub struct ReminderChecker {
    messenger: Arc<dyn Messenger>,
    db: DatabaseManager,
    timezone: TimezoneService,
    whitelist: Whitelist,
    threshold: chrono::Duration,
    mode: ReminderMode,
    /// Last feeding each user was already reminded about (once-per-feeding mode).
    notified: Mutex<HashMap<i64, DateTime<Utc>>>,
    /// Held for the length of a pass so scheduled passes never overlap.
    running: Mutex<()>,
}

impl ReminderChecker {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        db: DatabaseManager,
        timezone: TimezoneService,
        whitelist: Whitelist,
        threshold: chrono::Duration,
        mode: ReminderMode,
    ) -> Self {
        Self {
            messenger,
            db,
            timezone,
            whitelist,
            threshold,
            mode,
            notified: Mutex::new(HashMap::new()),
            running: Mutex::new(()),
        }
    }

    /// Checks every whitelisted user. A failure for one user never stops the pass.
    ///
    /// Returns `None` without checking anyone when another pass is still running.
    pub async fn tick(&self) -> Option<TickReport> {
        let Ok(_running) = self.running.try_lock() else {
            tracing::debug!("Reminder tick skipped: previous pass still running");
            return None;
        };
        let mut report = TickReport::default();

        for name in self.whitelist.names() {
            match self.check_user(name).await {
                Ok(Check::Sent) => report.sent += 1,
                Ok(Check::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!("Reminder check for {} failed: {}", name, e);
                }
            }
        }

        tracing::debug!(
            "Reminder tick finished: {} sent, {} skipped, {} failed",
            report.sent,
            report.skipped,
            report.failed
        );
        Some(report)
    }

    async fn check_user(&self, username: &str) -> anyhow::Result<Check> {
        // Users appear once they log their first feeding; never create them here.
        let Some(user) = User::find_by_username(&self.db.pool, username).await? else {
            return Ok(Check::Skipped);
        };

        let Some(last) =
            FeedingLog::last_for_user(&self.db.pool, user.id, self.timezone.storage_tz()).await?
        else {
            return Ok(Check::Skipped);
        };

        let elapsed = self.timezone.elapsed_since(&last.timestamp);
        if elapsed <= self.threshold {
            return Ok(Check::Skipped);
        }

        let last_instant = last.timestamp.with_timezone(&Utc);
        if self.mode == ReminderMode::OncePerFeeding
            && self.notified.lock().await.get(&user.id) == Some(&last_instant)
        {
            return Ok(Check::Skipped);
        }

        let text = presentation::reminder(elapsed, &self.timezone.to_user(&last.timestamp));
        let chat_id = ChatId(user.id);
        if let Err(e) = self.messenger.send_text(chat_id, &text, None).await {
            log_delivery_error("reminder", chat_id.0, &e.to_string());
            return Err(e);
        }

        if self.mode == ReminderMode::OncePerFeeding {
            self.notified.lock().await.insert(user.id, last_instant);
        }

        tracing::info!(
            "Sent feeding reminder to {} ({} minutes since last feeding)",
            username,
            elapsed.num_minutes()
        );
        Ok(Check::Sent)
    }
}

pub struct ReminderService {
    checker: Arc<ReminderChecker>,
    scheduler: JobScheduler,
    first_delay: Duration,
    interval: Duration,
}

impl ReminderService {
    pub async fn new(
        checker: Arc<ReminderChecker>,
        settings: &ReminderSettings,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            checker,
            scheduler,
            first_delay: settings.first_delay,
            interval: settings.interval,
        })
    }

    /// First pass after `first_delay`, then one every `interval`.
    pub async fn start(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let checker = self.checker.clone();
        let interval = self.interval;

        let first_job = Job::new_one_shot_async(self.first_delay, move |_uuid, l| {
            let checker = checker.clone();
            Box::pin(async move {
                checker.tick().await;

                let repeat_checker = checker.clone();
                let repeating = Job::new_repeated_async(interval, move |_uuid, _l| {
                    let checker = repeat_checker.clone();
                    Box::pin(async move {
                        checker.tick().await;
                    })
                });

                match repeating {
                    Ok(job) => {
                        if let Err(e) = l.add(job).await {
                            tracing::error!("Failed to schedule repeating reminder job: {}", e);
                        }
                    }
                    Err(e) => tracing::error!("Failed to create repeating reminder job: {}", e),
                }
            })
        })?;

        self.scheduler.add(first_job).await?;
        self.scheduler.start().await?;

        log_system_event(
            "Reminder service started",
            Some(&format!(
                "first check in {}s, then every {}s",
                self.first_delay.as_secs(),
                self.interval.as_secs()
            )),
        );
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.scheduler.shutdown().await?;
        Ok(())
    }

    /// Runs a pass immediately, outside the schedule. `None` if a pass is already running.
    pub async fn check_now(&self) -> Option<TickReport> {
        self.checker.tick().await
    }
}
