//! Ranked leaderboards and their chat rendering. Read-only over the store.

use crate::db::{Db, StoreResult};
use crate::period::PeriodKey;
use leaderboard_types::RankedEntry;

/// Sort by count descending, then username ascending, and number from 1
pub fn rank(mut rows: Vec<(String, u64)>) -> Vec<RankedEntry> {
    rows.sort_by(|(a_name, a_count), (b_name, b_count)| {
        b_count.cmp(a_count).then_with(|| a_name.cmp(b_name))
    });
    rows.into_iter()
        .enumerate()
        .map(|(i, (username, problems_solved))| RankedEntry {
            rank: i + 1,
            username,
            problems_solved,
        })
        .collect()
}

pub fn live_leaderboard(db: &Db) -> StoreResult<Vec<RankedEntry>> {
    Ok(rank(db.get_current_counts()?))
}

/// `None` when the month has no snapshots, so there is nothing to send
pub fn period_summary(db: &Db, period: &PeriodKey) -> StoreResult<Option<Vec<RankedEntry>>> {
    let rows = db.get_snapshots(period)?;
    if rows.is_empty() {
        return Ok(None);
    }
    Ok(Some(rank(rows)))
}

fn medal(rank: usize) -> &'static str {
    match rank {
        1 => "🥇",
        2 => "🥈",
        3 => "🥉",
        _ => "👤",
    }
}

fn render_entries(out: &mut String, entries: &[RankedEntry]) {
    for entry in entries {
        out.push_str(&format!(
            "{} {}. {}: {} problems\n",
            medal(entry.rank),
            entry.rank,
            entry.username,
            entry.problems_solved
        ));
    }
}

pub fn render_live(entries: &[RankedEntry]) -> String {
    if entries.is_empty() {
        return "No users are currently being tracked!".to_string();
    }
    let mut out = String::from("🏆 **CodeChef Leaderboard** 🏆\n\n");
    render_entries(&mut out, entries);
    out
}

pub fn render_period(period: &PeriodKey, entries: &[RankedEntry]) -> String {
    let mut out = format!("📊 **Monthly Leaderboard - {}** 📊\n\n", period);
    render_entries(&mut out, entries);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(rank: usize, username: &str, problems_solved: u64) -> RankedEntry {
        RankedEntry {
            rank,
            username: username.to_string(),
            problems_solved,
        }
    }

    #[test]
    fn test_rank_ties_break_alphabetically() {
        let expected = vec![entry(1, "a", 5), entry(2, "b", 5), entry(3, "c", 3)];
        for order in [["a", "b", "c"], ["c", "b", "a"], ["b", "c", "a"]] {
            let rows = order
                .iter()
                .map(|u| (u.to_string(), if *u == "c" { 3 } else { 5 }))
                .collect();
            assert_eq!(rank(rows), expected);
        }
    }

    #[test]
    fn test_live_leaderboard_reads_current_counts() {
        let db = Db::open(":memory:").unwrap();
        for (user, count) in [("bob", 7), ("alice", 12)] {
            db.create_identity(user, count).unwrap();
        }
        assert_eq!(
            live_leaderboard(&db).unwrap(),
            vec![entry(1, "alice", 12), entry(2, "bob", 7)]
        );
    }

    #[test]
    fn test_period_summary_empty_is_none() {
        let db = Db::open(":memory:").unwrap();
        let may = PeriodKey::parse("2024-05").unwrap();
        assert_eq!(period_summary(&db, &may).unwrap(), None);

        db.upsert_snapshot("alice", &may, 4).unwrap();
        assert_eq!(period_summary(&db, &may).unwrap(), Some(vec![entry(1, "alice", 4)]));
    }

    #[test]
    fn test_render_live() {
        let text = render_live(&[
            entry(1, "alice", 15),
            entry(2, "bob", 7),
            entry(3, "carol", 6),
            entry(4, "dave", 1),
        ]);
        assert!(text.starts_with("🏆 **CodeChef Leaderboard** 🏆\n\n"));
        assert!(text.contains("🥇 1. alice: 15 problems\n"));
        assert!(text.contains("🥉 3. carol: 6 problems\n"));
        assert!(text.contains("👤 4. dave: 1 problems\n"));
        assert_eq!(render_live(&[]), "No users are currently being tracked!");
    }

    #[test]
    fn test_render_period_title() {
        let period = PeriodKey::parse("2024-05").unwrap();
        let text = render_period(&period, &[entry(1, "alice", 4)]);
        assert!(text.starts_with("📊 **Monthly Leaderboard - 2024-05** 📊"));
    }
}
