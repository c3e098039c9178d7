//! Chat command handling.
//!
//! A chat bridge forwards raw message text; this module parses it and
//! returns the reply text to post back.

use crate::period::PeriodKey;
use crate::registry;
use crate::reporter;
use crate::scheduler::Scheduler;
use leaderboard_types::{AddOutcome, CycleOutcome, RemoveOutcome, SummaryStatus};

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    /// `!adduser <username>`
    AddUser(String),
    /// `!removeuser <username>`
    RemoveUser(String),
    /// `!leaderboard`
    Leaderboard,
    /// `!monthly [YYYY-MM]`, defaults to last month
    Monthly(Option<String>),
    /// `!update`
    Update,
    /// `!help`
    Help,
}

/// Parse a command. The `!` prefix is optional.
pub fn parse(text: &str) -> Option<Command> {
    let mut parts = text.split_whitespace();
    let command = parts.next()?.trim_start_matches('!').to_lowercase();
    let arg = parts.next().map(|s| s.to_string());

    match command.as_str() {
        "adduser" | "add" | "track" => arg.map(Command::AddUser),
        "removeuser" | "remove" | "untrack" => arg.map(Command::RemoveUser),
        "leaderboard" | "lb" | "top" => Some(Command::Leaderboard),
        "monthly" | "month" => Some(Command::Monthly(arg)),
        "update" | "refresh" => Some(Command::Update),
        "help" | "?" => Some(Command::Help),
        _ => {
            log::debug!("[LEADERBOARD] Unknown command '{}'", command);
            None
        }
    }
}

pub async fn execute(cmd: Command, scheduler: &Scheduler) -> Result<String, String> {
    let db = scheduler.db();
    match cmd {
        Command::AddUser(username) => {
            let outcome = registry::add(db, scheduler.fetcher(), &username)
                .await
                .map_err(|e| e.to_string())?;
            Ok(match outcome {
                AddOutcome::Created {
                    username,
                    problems_solved,
                    fetched: true,
                } => format!(
                    "Added user {} to leaderboard tracking ({} problems solved)",
                    username, problems_solved
                ),
                AddOutcome::Created { username, .. } => format!(
                    "Added user {} to leaderboard tracking. Their profile could not be read yet, \
                    so they start at 0.",
                    username
                ),
                AddOutcome::AlreadyExists { username } => {
                    format!("User {} is already being tracked", username)
                }
                AddOutcome::InvalidIdentity { username } => {
                    format!("`{}` is not a valid CodeChef username", username)
                }
            })
        }
        Command::RemoveUser(username) => {
            let outcome = registry::remove(db, &username).map_err(|e| e.to_string())?;
            Ok(match outcome {
                RemoveOutcome::Removed { username } => {
                    format!("Removed user {} from leaderboard tracking", username)
                }
                RemoveOutcome::NotFound { username } => {
                    format!("User {} is not being tracked", username)
                }
            })
        }
        Command::Leaderboard => {
            let entries = reporter::live_leaderboard(db).map_err(|e| e.to_string())?;
            Ok(reporter::render_live(&entries))
        }
        Command::Monthly(period) => {
            let period = match period {
                Some(raw) => PeriodKey::parse(&raw)?,
                None => PeriodKey::from_date(chrono::Local::now().date_naive()).previous(),
            };
            match reporter::period_summary(db, &period).map_err(|e| e.to_string())? {
                Some(entries) => Ok(reporter::render_period(&period, &entries)),
                None => Ok(format!("No stats recorded for {}", period)),
            }
        }
        Command::Update => Ok(match scheduler.run_now().await {
            CycleOutcome::Completed(report) => {
                let mut reply = format!(
                    "Leaderboard updated for {}: {} refreshed, {} unreachable",
                    report.period, report.updated, report.degraded
                );
                if report.failed > 0 {
                    reply.push_str(&format!(", {} failed to save", report.failed));
                }
                if let SummaryStatus::Delivered { period } = report.summary {
                    reply.push_str(&format!("\nPosted the {} summary", period));
                }
                reply
            }
            CycleOutcome::Skipped => "An update is already in progress".to_string(),
        }),
        Command::Help => Ok(help()),
    }
}

pub fn help() -> String {
    "**Leaderboard commands:**\n\
    - `!adduser <username>` - Start tracking a CodeChef user\n\
    - `!removeuser <username>` - Stop tracking a user\n\
    - `!leaderboard` - Show the current leaderboard\n\
    - `!monthly [YYYY-MM]` - Show a month's standings (default: last month)\n\
    - `!update` - Refresh all counts now\n\
    - `!help` - Show this message"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::DegradedPolicy;
    use crate::db::Db;
    use crate::scheduler::SchedulerSettings;
    use crate::test_support::{RecordingDelivery, ScriptedFetcher};
    use std::sync::Arc;
    use std::time::Duration;

    fn scheduler(fetcher: Arc<ScriptedFetcher>) -> Scheduler {
        let settings = SchedulerSettings {
            degraded_policy: DegradedPolicy::Zero,
            pace: Duration::ZERO,
            summary_grace_days: 1,
        };
        Scheduler::new(
            Arc::new(Db::open(":memory:").unwrap()),
            fetcher,
            Arc::new(RecordingDelivery::default()),
            settings,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_add_remove() {
        assert_eq!(parse("!adduser alice"), Some(Command::AddUser("alice".into())));
        assert_eq!(parse("removeuser bob"), Some(Command::RemoveUser("bob".into())));
        assert_eq!(parse("!adduser"), None);
    }

    #[test]
    fn test_parse_reports() {
        assert_eq!(parse("!leaderboard"), Some(Command::Leaderboard));
        assert_eq!(parse("LB"), Some(Command::Leaderboard));
        assert_eq!(parse("!monthly"), Some(Command::Monthly(None)));
        assert_eq!(
            parse("!monthly 2024-05"),
            Some(Command::Monthly(Some("2024-05".into())))
        );
        assert_eq!(parse("!update"), Some(Command::Update));
        assert_eq!(parse("?"), Some(Command::Help));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("!tip alice 100"), None);
    }

    #[tokio::test]
    async fn test_add_then_leaderboard() {
        let s = scheduler(Arc::new(ScriptedFetcher::new(&[("alice", 12)])));

        let reply = execute(Command::AddUser("alice".into()), &s).await.unwrap();
        assert_eq!(reply, "Added user alice to leaderboard tracking (12 problems solved)");

        let reply = execute(Command::AddUser("alice".into()), &s).await.unwrap();
        assert_eq!(reply, "User alice is already being tracked");

        let reply = execute(Command::Leaderboard, &s).await.unwrap();
        assert!(reply.contains("🥇 1. alice: 12 problems"));
    }

    #[tokio::test]
    async fn test_remove_unknown_user() {
        let s = scheduler(Arc::new(ScriptedFetcher::new(&[])));
        let reply = execute(Command::RemoveUser("ghost".into()), &s).await.unwrap();
        assert_eq!(reply, "User ghost is not being tracked");
    }

    #[tokio::test]
    async fn test_monthly_without_data() {
        let s = scheduler(Arc::new(ScriptedFetcher::new(&[])));
        let reply = execute(Command::Monthly(Some("2024-05".into())), &s)
            .await
            .unwrap();
        assert_eq!(reply, "No stats recorded for 2024-05");
        assert!(execute(Command::Monthly(Some("May".into())), &s).await.is_err());
    }

    #[tokio::test]
    async fn test_update_refreshes_counts() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[("alice", 12)]));
        let s = scheduler(fetcher.clone());
        execute(Command::AddUser("alice".into()), &s).await.unwrap();

        fetcher.set("alice", 20);
        let reply = execute(Command::Update, &s).await.unwrap();
        assert!(reply.contains("1 refreshed, 0 unreachable"));

        let board = reporter::live_leaderboard(s.db()).unwrap();
        assert_eq!(board[0].problems_solved, 20);
    }
}
