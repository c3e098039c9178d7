//! Per-user refresh of current counts and monthly snapshots.

use crate::db::{Db, StoreResult};
use crate::fetcher::CountFetcher;
use crate::period::PeriodKey;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// What to record when a scheduled fetch fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DegradedPolicy {
    /// Write 0 to both the current record and the month snapshot
    #[default]
    Zero,
    /// Leave both untouched
    RetainPrevious,
}

impl FromStr for DegradedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zero" => Ok(DegradedPolicy::Zero),
            "retain" | "retain_previous" | "skip" => Ok(DegradedPolicy::RetainPrevious),
            other => Err(format!("Unknown degraded policy '{}'", other)),
        }
    }
}

impl fmt::Display for DegradedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradedPolicy::Zero => write!(f, "zero"),
            DegradedPolicy::RetainPrevious => write!(f, "retain"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    Updated(u64),
    /// Fetch failed; holds the count written under the policy, if any
    Degraded(Option<u64>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleTally {
    pub updated: usize,
    pub degraded: usize,
    pub failed: usize,
}

/// Refresh one user. `period` is fixed by the caller for the whole cycle.
pub async fn update_one(
    db: &Db,
    fetcher: &dyn CountFetcher,
    username: &str,
    period: &PeriodKey,
    policy: DegradedPolicy,
) -> StoreResult<UpdateResult> {
    let outcome = fetcher.fetch(username).await;

    let (count, result) = if outcome.success {
        (outcome.count, UpdateResult::Updated(outcome.count))
    } else {
        match policy {
            DegradedPolicy::Zero => (0, UpdateResult::Degraded(Some(0))),
            DegradedPolicy::RetainPrevious => return Ok(UpdateResult::Degraded(None)),
        }
    };

    db.record_count(username, period, count)?;
    Ok(result)
}

/// Refresh every tracked user. A failure for one user never stops the rest.
pub async fn update_all(
    db: &Db,
    fetcher: &dyn CountFetcher,
    period: &PeriodKey,
    policy: DegradedPolicy,
    pace: Duration,
) -> StoreResult<CycleTally> {
    let usernames = db.list_identities()?;
    let mut tally = CycleTally::default();

    log::debug!(
        "[LEADERBOARD] Updating {} users for {}",
        usernames.len(),
        period
    );

    for (i, username) in usernames.iter().enumerate() {
        if i > 0 && !pace.is_zero() {
            tokio::time::sleep(pace).await;
        }

        match update_one(db, fetcher, username, period, policy).await {
            Ok(UpdateResult::Updated(count)) => {
                log::debug!("[LEADERBOARD] {}: {} problems", username, count);
                tally.updated += 1;
            }
            Ok(UpdateResult::Degraded(recorded)) => {
                log::warn!(
                    "[LEADERBOARD] Fetch failed for {} (policy {}, recorded {:?})",
                    username,
                    policy,
                    recorded
                );
                tally.degraded += 1;
            }
            Err(e) if e.is_not_found() => {
                log::debug!("[LEADERBOARD] {} was removed mid-cycle", username);
            }
            Err(e) => {
                log::warn!("[LEADERBOARD] Failed to store update for {}: {}", username, e);
                tally.failed += 1;
            }
        }
    }

    Ok(tally)
}
