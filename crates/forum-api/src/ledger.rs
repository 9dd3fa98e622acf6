use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use forum_db::Database;
use forum_types::models::{Target, VoteValue};

use crate::error::ForumError;

/// Result of a committed vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub score: i64,
    pub user_vote: VoteValue,
}

/// One signed vote per (user, target); scores are always recomputed as the
/// sum over the vote table, never cached.
///
/// Latest write wins. Flipping +1 to -1 moves the score by 2.
#[derive(Clone)]
pub struct VoteLedger {
    db: Arc<Database>,
}

impl VoteLedger {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record `value` as the user's vote on `target`, replacing any earlier
    /// vote, and return the score as of that commit. `value` must be +1 or -1.
    pub fn cast_vote(&self, user_id: Uuid, target: Target, value: i64) -> Result<VoteOutcome, ForumError> {
        let value = VoteValue::try_from(value)?;
        let score = self.db.upsert_vote(
            &user_id.to_string(),
            target,
            value,
            &Utc::now().to_rfc3339(),
        )?;

        debug!("User {} voted {} on {} (score {})", user_id, value.as_i64(), target, score);
        Ok(VoteOutcome {
            score,
            user_vote: value,
        })
    }

    /// Zero when nothing has been cast.
    pub fn get_score(&self, target: Target) -> Result<i64, ForumError> {
        Ok(self.db.vote_score(target)?)
    }

    pub fn user_vote(&self, user_id: Uuid, target: Target) -> Result<Option<VoteValue>, ForumError> {
        Ok(self.db.get_vote(&user_id.to_string(), target)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::tests::test_store;

    fn setup(names: &[&str]) -> (VoteLedger, Vec<Uuid>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let store = test_store(db.clone());
        let ids = names
            .iter()
            .map(|name| store.create_user(&format!("{}@x.com", name), name, "hash").unwrap().id)
            .collect();
        (VoteLedger::new(db), ids)
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let (ledger, ids) = setup(&["alice"]);
        for bad in [0, 2, -2, i64::MAX] {
            let err = ledger.cast_vote(ids[0], Target::post(1), bad).unwrap_err();
            assert!(matches!(err, ForumError::InvalidVoteValue(v) if v == bad));
        }
        assert_eq!(ledger.get_score(Target::post(1)).unwrap(), 0);
        assert_eq!(ledger.user_vote(ids[0], Target::post(1)).unwrap(), None);
    }

    #[test]
    fn test_first_vote_reads_back() {
        let (ledger, ids) = setup(&["alice"]);
        let outcome = ledger.cast_vote(ids[0], Target::comment(9), -1).unwrap();
        assert_eq!(outcome.score, -1);
        assert_eq!(ledger.get_score(Target::comment(9)).unwrap(), -1);
    }

    #[test]
    fn test_flip_and_second_voter() {
        let (ledger, ids) = setup(&["alice", "bob"]);
        let (a, b) = (ids[0], ids[1]);
        let post = Target::post(7);

        assert_eq!(ledger.cast_vote(a, post, 1).unwrap().score, 1);
        assert_eq!(ledger.get_score(post).unwrap(), 1);

        assert_eq!(ledger.cast_vote(a, post, -1).unwrap().score, -1);
        assert_eq!(ledger.get_score(post).unwrap(), -1);

        assert_eq!(ledger.cast_vote(b, post, 1).unwrap().score, 0);
        assert_eq!(ledger.get_score(post).unwrap(), 0);

        assert_eq!(ledger.user_vote(a, post).unwrap(), Some(VoteValue::Down));
        assert_eq!(ledger.user_vote(b, post).unwrap(), Some(VoteValue::Up));
    }

    #[test]
    fn test_repeat_vote_is_idempotent() {
        let (ledger, ids) = setup(&["alice"]);
        let post = Target::post(1);
        for _ in 0..5 {
            assert_eq!(ledger.cast_vote(ids[0], post, 1).unwrap().score, 1);
        }
    }

    #[test]
    fn test_posts_and_comments_are_separate_targets() {
        let (ledger, ids) = setup(&["alice"]);
        ledger.cast_vote(ids[0], Target::post(5), 1).unwrap();
        ledger.cast_vote(ids[0], Target::comment(5), -1).unwrap();
        assert_eq!(ledger.get_score(Target::post(5)).unwrap(), 1);
        assert_eq!(ledger.get_score(Target::comment(5)).unwrap(), -1);
    }

    #[test]
    fn test_concurrent_votes() {
        let names: Vec<String> = (0..8).map(|i| format!("user{}", i)).collect();
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (ledger, ids) = setup(&name_refs);
        let post = Target::post(42);

        // Every user votes +1 from several threads at once.
        let handles: Vec<_> = ids
            .iter()
            .flat_map(|&id| std::iter::repeat_n(id, 4))
            .map(|id| {
                let ledger = ledger.clone();
                std::thread::spawn(move || ledger.cast_vote(id, post, 1).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(ledger.get_score(post).unwrap(), ids.len() as i64);
        for &id in &ids {
            assert_eq!(ledger.user_vote(id, post).unwrap(), Some(VoteValue::Up));
        }
    }
}
