//! Tracker registry: adding and removing monitored users.

use crate::db::{Db, StoreResult};
use crate::error::StoreError;
use crate::fetcher::CountFetcher;
use leaderboard_types::{AddOutcome, CurrentRecord, RemoveOutcome};

const MAX_USERNAME_LEN: usize = 64;

/// Trim whitespace and a leading `@`. Returns `None` if what remains cannot
/// be a profile handle.
pub fn normalize_username(raw: &str) -> Option<String> {
    let name = raw.trim().trim_start_matches('@');
    let valid = !name.is_empty()
        && name.len() <= MAX_USERNAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    valid.then(|| name.to_string())
}

/// Start tracking a user. The initial count comes from one fetch; a failed
/// fetch registers the user with 0. The user and count are stored by one
/// insert, so a failed add leaves nothing behind.
pub async fn add(db: &Db, fetcher: &dyn CountFetcher, raw_username: &str) -> StoreResult<AddOutcome> {
    let Some(username) = normalize_username(raw_username) else {
        return Ok(AddOutcome::InvalidIdentity {
            username: raw_username.trim().to_string(),
        });
    };

    if db.identity_exists(&username)? {
        return Ok(AddOutcome::AlreadyExists { username });
    }

    let outcome = fetcher.fetch(&username).await;
    if !outcome.success {
        log::warn!(
            "[LEADERBOARD] Initial fetch failed for {}, registering with 0",
            username
        );
    }

    match db.create_identity(&username, outcome.count) {
        Ok(()) => {}
        Err(StoreError::AlreadyExists(_)) => return Ok(AddOutcome::AlreadyExists { username }),
        Err(e) => return Err(e),
    }

    log::info!(
        "[LEADERBOARD] Now tracking {} ({} problems)",
        username,
        outcome.count
    );

    Ok(AddOutcome::Created {
        username,
        problems_solved: outcome.count,
        fetched: outcome.success,
    })
}

pub fn remove(db: &Db, raw_username: &str) -> StoreResult<RemoveOutcome> {
    let username = normalize_username(raw_username).unwrap_or_else(|| raw_username.trim().to_string());
    match db.delete_identity(&username) {
        Ok(()) => {
            log::info!("[LEADERBOARD] Stopped tracking {}", username);
            Ok(RemoveOutcome::Removed { username })
        }
        Err(StoreError::NotFound(_)) => Ok(RemoveOutcome::NotFound { username }),
        Err(e) => Err(e),
    }
}

pub fn list(db: &Db) -> StoreResult<Vec<CurrentRecord>> {
    db.get_current_records()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedFetcher;

    #[test]
    fn test_normalize_username() {
        assert_eq!(normalize_username("  @alice_99 ").as_deref(), Some("alice_99"));
        assert_eq!(normalize_username("bob.smith-2").as_deref(), Some("bob.smith-2"));
        assert_eq!(normalize_username("   "), None);
        assert_eq!(normalize_username("../etc/passwd"), None);
        assert_eq!(normalize_username("al ice"), None);
    }

    #[tokio::test]
    async fn test_add_uses_fetched_count() {
        let db = Db::open(":memory:").unwrap();
        let fetcher = ScriptedFetcher::new(&[("alice", 12)]);

        let outcome = add(&db, &fetcher, "alice").await.unwrap();
        assert_eq!(
            outcome,
            AddOutcome::Created {
                username: "alice".into(),
                problems_solved: 12,
                fetched: true
            }
        );
        assert_eq!(db.get_current_counts().unwrap(), vec![("alice".to_string(), 12)]);
    }

    #[tokio::test]
    async fn test_add_with_failed_fetch_registers_zero() {
        let db = Db::open(":memory:").unwrap();
        let fetcher = ScriptedFetcher::new(&[]);

        let outcome = add(&db, &fetcher, "bob").await.unwrap();
        assert!(matches!(outcome, AddOutcome::Created { problems_solved: 0, fetched: false, .. }));
        assert_eq!(db.get_current_counts().unwrap(), vec![("bob".to_string(), 0)]);
    }

    #[tokio::test]
    async fn test_add_twice_keeps_first_record() {
        let db = Db::open(":memory:").unwrap();
        let fetcher = ScriptedFetcher::new(&[("alice", 12)]);
        add(&db, &fetcher, "alice").await.unwrap();

        let second = ScriptedFetcher::new(&[("alice", 99)]);
        let outcome = add(&db, &second, "alice").await.unwrap();

        assert_eq!(outcome, AddOutcome::AlreadyExists { username: "alice".into() });
        assert_eq!(second.calls(), 0);
        assert_eq!(db.get_current_counts().unwrap(), vec![("alice".to_string(), 12)]);
    }

    #[tokio::test]
    async fn test_add_invalid_identity_skips_fetch() {
        let db = Db::open(":memory:").unwrap();
        let fetcher = ScriptedFetcher::new(&[]);

        let outcome = add(&db, &fetcher, "a/b").await.unwrap();
        assert!(matches!(outcome, AddOutcome::InvalidIdentity { .. }));
        assert_eq!(fetcher.calls(), 0);
        assert!(db.list_identities().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_insert_leaves_nothing_registered() {
        let db = Db::open(":memory:").unwrap();
        db.execute_batch(
            "CREATE TRIGGER reject_users BEFORE INSERT ON users
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .unwrap();
        let fetcher = ScriptedFetcher::new(&[("alice", 12)]);

        assert!(add(&db, &fetcher, "alice").await.is_err());
        assert!(db.list_identities().unwrap().is_empty());

        db.execute_batch("DROP TRIGGER reject_users").unwrap();
        let outcome = add(&db, &fetcher, "alice").await.unwrap();
        assert!(matches!(outcome, AddOutcome::Created { problems_solved: 12, .. }));
    }

    #[tokio::test]
    async fn test_remove() {
        let db = Db::open(":memory:").unwrap();
        let fetcher = ScriptedFetcher::new(&[("alice", 12)]);
        add(&db, &fetcher, "alice").await.unwrap();

        assert_eq!(
            remove(&db, "@alice").unwrap(),
            RemoveOutcome::Removed { username: "alice".into() }
        );
        assert_eq!(
            remove(&db, "alice").unwrap(),
            RemoveOutcome::NotFound { username: "alice".into() }
        );
        assert!(list(&db).unwrap().is_empty());
    }
}
