//! Update cycles and month-boundary summaries.
//!
//! A cycle refreshes every tracked user for the current month, then, on the
//! first day(s) of a month, posts the previous month's standings once.
//! Cycles never overlap: a trigger that arrives while one is running is
//! dropped. The month of the last posted summary is persisted so a restart
//! on the 1st does not post it again.

use crate::aggregator::{self, CycleTally, DegradedPolicy};
use crate::db::Db;
use crate::delivery::Delivery;
use crate::fetcher::CountFetcher;
use crate::period::PeriodKey;
use crate::reporter;
use chrono::{Datelike, NaiveDate};
use leaderboard_types::{CycleOutcome, CycleReport, SummaryStatus};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// service_state key holding the last summarized month
pub const LAST_SUMMARY_KEY: &str = "last_summary_period";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerState {
    pub phase: Phase,
    pub last_summary_period: Option<PeriodKey>,
}

impl SchedulerState {
    pub fn new(last_summary_period: Option<PeriodKey>) -> Self {
        Self {
            phase: Phase::Idle,
            last_summary_period,
        }
    }

    /// Idle -> Running. `None` while a cycle is already running.
    pub fn begin(self) -> Option<Self> {
        match self.phase {
            Phase::Running => None,
            Phase::Idle => Some(Self {
                phase: Phase::Running,
                ..self
            }),
        }
    }

    /// The month to summarize on `today`, if any. Due within the first
    /// `grace_days` days of a month when the previous month is unsent.
    pub fn summary_due(&self, today: NaiveDate, grace_days: u32) -> Option<PeriodKey> {
        if today.day() > grace_days {
            return None;
        }
        let previous = PeriodKey::from_date(today).previous();
        match self.last_summary_period {
            Some(sent) if sent >= previous => None,
            _ => Some(previous),
        }
    }

    /// Running -> Idle, recording the month summarized during the cycle
    pub fn finish(self, summarized: Option<PeriodKey>) -> Self {
        let last_summary_period = match (self.last_summary_period, summarized) {
            (Some(prev), Some(new)) => Some(prev.max(new)),
            (prev, new) => new.or(prev),
        };
        Self {
            phase: Phase::Idle,
            last_summary_period,
        }
    }
}

/// Returns the state to Idle when a cycle ends, including when the cycle
/// future is dropped part way through.
struct CycleGuard<'a> {
    state: &'a Mutex<SchedulerState>,
    summarized: Option<PeriodKey>,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        *state = state.finish(self.summarized);
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub degraded_policy: DegradedPolicy,
    /// Pause between users within a cycle
    pub pace: Duration,
    pub summary_grace_days: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            degraded_policy: DegradedPolicy::Zero,
            pace: Duration::from_millis(500),
            summary_grace_days: 1,
        }
    }
}

pub struct Scheduler {
    db: Arc<Db>,
    fetcher: Arc<dyn CountFetcher>,
    delivery: Arc<dyn Delivery>,
    settings: SchedulerSettings,
    state: Mutex<SchedulerState>,
    last_tick_at: Mutex<Option<String>>,
    last_report: Mutex<Option<CycleReport>>,
}

impl Scheduler {
    pub fn new(
        db: Arc<Db>,
        fetcher: Arc<dyn CountFetcher>,
        delivery: Arc<dyn Delivery>,
        settings: SchedulerSettings,
    ) -> Result<Self, String> {
        let marker = db
            .get_state(LAST_SUMMARY_KEY)
            .map_err(|e| format!("Failed to load summary marker: {}", e))?;
        let last_summary_period = match marker {
            Some(raw) => match PeriodKey::parse(&raw) {
                Ok(period) => Some(period),
                Err(e) => {
                    log::warn!("[LEADERBOARD] Ignoring stored summary marker: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            db,
            fetcher,
            delivery,
            settings,
            state: Mutex::new(SchedulerState::new(last_summary_period)),
            last_tick_at: Mutex::new(None),
            last_report: Mutex::new(None),
        })
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn fetcher(&self) -> &dyn CountFetcher {
        self.fetcher.as_ref()
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock()
    }

    pub fn last_tick_at(&self) -> Option<String> {
        self.last_tick_at.lock().clone()
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report.lock().clone()
    }

    /// Run a cycle for the local calendar date
    pub async fn run_now(&self) -> CycleOutcome {
        self.run_cycle(chrono::Local::now().date_naive()).await
    }

    pub async fn run_cycle(&self, today: NaiveDate) -> CycleOutcome {
        let running = {
            let mut state = self.state.lock();
            match state.begin() {
                Some(next) => {
                    *state = next;
                    next
                }
                None => {
                    log::debug!("[LEADERBOARD] Cycle already running, trigger dropped");
                    return CycleOutcome::Skipped;
                }
            }
        };
        let mut guard = CycleGuard {
            state: &self.state,
            summarized: None,
        };

        let started_at = chrono::Utc::now().to_rfc3339();
        let period = PeriodKey::from_date(today);
        let due = running.summary_due(today, self.settings.summary_grace_days);

        log::info!("[LEADERBOARD] Cycle started for {}", period);

        let tally = match aggregator::update_all(
            &self.db,
            self.fetcher.as_ref(),
            &period,
            self.settings.degraded_policy,
            self.settings.pace,
        )
        .await
        {
            Ok(tally) => tally,
            Err(e) => {
                log::error!("[LEADERBOARD] Failed to list tracked users: {}", e);
                CycleTally::default()
            }
        };

        let summary = match due {
            Some(previous) => self.send_summary(&previous).await,
            None => SummaryStatus::NotDue,
        };

        if matches!(
            summary,
            SummaryStatus::Delivered { .. } | SummaryStatus::Empty { .. }
        ) {
            guard.summarized = due;
        }
        drop(guard);

        let finished_at = chrono::Utc::now().to_rfc3339();
        let report = CycleReport {
            period: period.to_string(),
            started_at,
            finished_at: finished_at.clone(),
            updated: tally.updated,
            degraded: tally.degraded,
            failed: tally.failed,
            summary,
        };

        log::info!(
            "[LEADERBOARD] Cycle complete: {} updated, {} degraded, {} failed",
            report.updated,
            report.degraded,
            report.failed
        );

        *self.last_tick_at.lock() = Some(finished_at);
        *self.last_report.lock() = Some(report.clone());

        CycleOutcome::Completed(report)
    }

    /// Post the summary for `period`. The marker is persisted before this
    /// returns `Delivered` or `Empty`, with no await in between.
    async fn send_summary(&self, period: &PeriodKey) -> SummaryStatus {
        let period_str = period.to_string();
        let entries = match reporter::period_summary(&self.db, period) {
            Ok(Some(entries)) => entries,
            Ok(None) => {
                log::info!("[LEADERBOARD] No snapshots for {}, summary skipped", period);
                self.persist_marker(period);
                return SummaryStatus::Empty { period: period_str };
            }
            Err(e) => {
                log::warn!("[LEADERBOARD] Failed to read snapshots for {}: {}", period, e);
                return SummaryStatus::DeliveryFailed {
                    period: period_str,
                    error: e.to_string(),
                };
            }
        };

        let text = reporter::render_period(period, &entries);
        match self.delivery.deliver(&text).await {
            Ok(()) => {
                self.persist_marker(period);
                log::info!(
                    "[LEADERBOARD] Posted summary for {} via {}",
                    period,
                    self.delivery.name()
                );
                SummaryStatus::Delivered { period: period_str }
            }
            Err(e) => {
                log::warn!("[LEADERBOARD] Failed to post summary for {}: {}", period, e);
                SummaryStatus::DeliveryFailed {
                    period: period_str,
                    error: e,
                }
            }
        }
    }

    fn persist_marker(&self, period: &PeriodKey) {
        if let Err(e) = self.db.set_state(LAST_SUMMARY_KEY, &period.to_string()) {
            log::warn!("[LEADERBOARD] Failed to persist summary marker: {}", e);
        }
    }
}

/// Background loop: one cycle per interval, the first immediately.
pub async fn run_worker(scheduler: Arc<Scheduler>, interval: Duration, shutdown: CancellationToken) {
    log::info!(
        "[LEADERBOARD] Worker started (update interval: {}s)",
        interval.as_secs()
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        tokio::select! {
            _ = shutdown.cancelled() => {
                log::info!("[LEADERBOARD] Shutdown during cycle, committed updates stand");
                break;
            }
            outcome = scheduler.run_now() => {
                if let CycleOutcome::Skipped = outcome {
                    log::debug!("[LEADERBOARD] Tick skipped, a cycle was already running");
                }
            }
        }
    }

    log::info!("[LEADERBOARD] Worker stopped");
}
