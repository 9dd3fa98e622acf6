use std::fmt;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use forum_types::models::User;

/// Database row types. These map directly to SQLite rows and stay distinct
/// from the forum-types models so the password hash cannot leak upward.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: String,
}

impl UserRow {
    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: self
                .id
                .parse()
                .with_context(|| format!("corrupt user id '{}'", self.id))?,
            created_at: parse_timestamp(&self.created_at)
                .with_context(|| format!("corrupt created_at on user '{}'", self.id))?,
            email: self.email,
            username: self.username,
        })
    }
}

pub struct SessionRow {
    pub id: String,
    pub user_id: String,
    /// Unix milliseconds.
    pub expires_at: i64,
}

/// Unique user column that an insert collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Username,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => f.write_str("email"),
            Self::Username => f.write_str("username"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewUserOutcome {
    Created,
    Conflict(UniqueField),
}

/// Accepts RFC 3339 as written by this crate, and SQLite's
/// "YYYY-MM-DD HH:MM:SS" for rows written by hand.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .with_context(|| format!("unparseable timestamp '{}'", raw))
}
