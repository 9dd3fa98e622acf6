use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use forum_db::Database;

use crate::error::ForumError;

pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Raw token bytes before encoding.
const TOKEN_BYTES: usize = 32;
/// Anything longer cannot have come from `issue_session`.
const MAX_TOKEN_LEN: usize = 128;

/// Opaque bearer token handed to the client. `Debug` is redacted so the
/// value never ends up in logs by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(B64.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: SessionToken,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Issues, validates and revokes sessions.
///
/// A session is `Active` until `expires_at` passes or it is revoked; both
/// terminal states look the same to callers (the token resolves to nothing).
/// Expired rows are filtered at read time, so [`SessionManager::purge_expired`]
/// is only storage hygiene.
///
/// Issuing a session replaces any the user already holds, atomically: at most
/// one live session per user.
#[derive(Clone)]
pub struct SessionManager {
    db: Arc<Database>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_ttl(db, Duration::hours(DEFAULT_SESSION_TTL_HOURS))
    }

    pub fn with_ttl(db: Arc<Database>, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    pub fn issue_session(&self, user_id: Uuid) -> Result<IssuedSession, ForumError> {
        self.issue_session_at(user_id, Utc::now())
    }

    pub fn issue_session_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<IssuedSession, ForumError> {
        let token = SessionToken::generate();
        let expires_at = now.checked_add_signed(self.ttl).ok_or(ForumError::SessionTtl)?;

        let replaced = self.db.replace_sessions(
            &session_id(token.as_str()),
            &user_id.to_string(),
            expires_at.timestamp_millis(),
            &now.to_rfc3339(),
        )?;

        if replaced > 0 {
            debug!("Replaced {} prior session(s) for user {}", replaced, user_id);
        }
        info!("Issued session for user {} (expires {})", user_id, expires_at);

        Ok(IssuedSession {
            token,
            user_id,
            expires_at,
        })
    }

    pub fn validate_session(&self, token: &str) -> Result<Option<Uuid>, ForumError> {
        self.validate_session_at(token, Utc::now())
    }

    /// The owning user, if `token` names a session still live at `now`.
    /// Read-only.
    pub fn validate_session_at(&self, token: &str, now: DateTime<Utc>) -> Result<Option<Uuid>, ForumError> {
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return Ok(None);
        }

        let Some(row) = self
            .db
            .get_active_session(&session_id(token), now.timestamp_millis())?
        else {
            return Ok(None);
        };

        let user_id = row
            .user_id
            .parse::<Uuid>()
            .map_err(|e| anyhow::anyhow!("Corrupt user_id '{}' on session: {}", row.user_id, e))?;
        Ok(Some(user_id))
    }

    /// Idempotent: revoking an unknown or already revoked token is fine.
    pub fn revoke_session(&self, token: &str) -> Result<(), ForumError> {
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return Ok(());
        }
        if self.db.delete_session(&session_id(token))? {
            info!("Session revoked");
        }
        Ok(())
    }

    /// Delete rows already past expiry. Returns how many went.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, ForumError> {
        Ok(self.db.delete_expired_sessions(now.timestamp_millis())?)
    }
}

/// Stored key for a token: hex SHA-256, so the sessions table never holds a
/// usable bearer value.
fn session_id(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn setup() -> (SessionManager, Uuid) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let user_id = Uuid::new_v4();
        db.create_user(&user_id.to_string(), "a@x.com", "alice", "hash", "2026-01-01T00:00:00Z")
            .unwrap();
        (SessionManager::new(db), user_id)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_800_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_issue_and_validate() {
        let (sessions, user_id) = setup();
        let issued = sessions.issue_session(user_id).unwrap();
        assert_eq!(sessions.validate_session(issued.token.as_str()).unwrap(), Some(user_id));
        assert!(issued.expires_at > Utc::now() + Duration::hours(23));
    }

    #[test]
    fn test_tokens_are_unpredictable() {
        let (sessions, user_id) = setup();
        let a = sessions.issue_session(user_id).unwrap().token;
        let b = sessions.issue_session(user_id).unwrap().token;
        assert_ne!(a, b);
        assert_eq!(B64.decode(a.as_str()).unwrap().len(), TOKEN_BYTES);
        assert_eq!(format!("{:?}", a), "SessionToken(..)");
    }

    #[test]
    fn test_unknown_tokens_are_absent() {
        let (sessions, user_id) = setup();
        sessions.issue_session(user_id).unwrap();
        assert_eq!(sessions.validate_session("").unwrap(), None);
        assert_eq!(sessions.validate_session("bogus").unwrap(), None);
        assert_eq!(sessions.validate_session(&"x".repeat(4096)).unwrap(), None);
    }

    #[test]
    fn test_expires_exactly_at_deadline() {
        let (sessions, user_id) = setup();
        let issued = sessions.issue_session_at(user_id, at(0)).unwrap();
        let token = issued.token.as_str();
        let deadline = at(0) + Duration::hours(24);
        assert_eq!(issued.expires_at, deadline);

        assert_eq!(sessions.validate_session_at(token, deadline - Duration::milliseconds(1)).unwrap(), Some(user_id));
        assert_eq!(sessions.validate_session_at(token, deadline).unwrap(), None);
        assert_eq!(sessions.validate_session_at(token, deadline + Duration::hours(1)).unwrap(), None);
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let (sessions, user_id) = setup();
        let issued = sessions.issue_session(user_id).unwrap();
        sessions.revoke_session(issued.token.as_str()).unwrap();
        assert_eq!(sessions.validate_session(issued.token.as_str()).unwrap(), None);

        sessions.revoke_session(issued.token.as_str()).unwrap();
        sessions.revoke_session("never-issued").unwrap();
    }

    #[test]
    fn test_new_login_replaces_old_session() {
        let (sessions, user_id) = setup();
        let first = sessions.issue_session(user_id).unwrap();
        let second = sessions.issue_session(user_id).unwrap();
        assert_eq!(sessions.validate_session(first.token.as_str()).unwrap(), None);
        assert_eq!(sessions.validate_session(second.token.as_str()).unwrap(), Some(user_id));
    }

    #[test]
    fn test_unrepresentable_ttl_is_an_error() {
        let (sessions, user_id) = setup();
        let sessions = SessionManager::with_ttl(sessions.db.clone(), Duration::MAX);
        assert!(matches!(sessions.issue_session(user_id), Err(ForumError::SessionTtl)));
        assert_eq!(sessions.purge_expired(at(0)).unwrap(), 0);
    }

    #[test]
    fn test_purge_only_touches_expired() {
        let (sessions, user_id) = setup();
        let issued = sessions.issue_session_at(user_id, at(0)).unwrap();
        assert_eq!(sessions.purge_expired(at(60)).unwrap(), 0);
        assert_eq!(sessions.validate_session_at(issued.token.as_str(), at(60)).unwrap(), Some(user_id));

        assert_eq!(sessions.purge_expired(at(0) + Duration::hours(25)).unwrap(), 1);
        assert_eq!(sessions.validate_session_at(issued.token.as_str(), at(60)).unwrap(), None);
    }
}
