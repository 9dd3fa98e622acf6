use std::sync::Arc;

use tracing::warn;

use forum_db::Database;
use forum_types::models::User;

use crate::error::ForumError;
use crate::sessions::SessionManager;

/// Maps a request's session token to the acting user. Every mutating
/// operation goes through here first.
#[derive(Clone)]
pub struct IdentityResolver {
    sessions: SessionManager,
    db: Arc<Database>,
}

impl IdentityResolver {
    pub fn new(sessions: SessionManager, db: Arc<Database>) -> Self {
        Self { sessions, db }
    }

    /// `Unauthenticated` when the token is missing, unknown or expired, or
    /// when its user no longer exists. Read-only.
    pub fn resolve_caller(&self, token: Option<&str>) -> Result<User, ForumError> {
        let token = token.ok_or(ForumError::Unauthenticated)?;
        let user_id = self
            .sessions
            .validate_session(token)?
            .ok_or(ForumError::Unauthenticated)?;

        match self.db.get_user_by_id(&user_id.to_string())? {
            Some(row) => Ok(row.into_user()?),
            None => {
                warn!("Live session for missing user {}", user_id);
                Err(ForumError::Unauthenticated)
            }
        }
    }
}
