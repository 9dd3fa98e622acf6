use crate::Database;
use crate::models::{NewUserOutcome, SessionRow, UniqueField, UserRow};
use anyhow::{Result, anyhow};
use forum_types::models::{Target, VoteValue};
use rusqlite::{Connection, ErrorCode, TransactionBehavior};

impl Database {
    // -- Users --

    /// Insert a user. A collision on either unique column is reported as
    /// [`NewUserOutcome::Conflict`] rather than an error.
    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        username: &str,
        password_hash: &str,
        created_at: &str,
    ) -> Result<NewUserOutcome> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, email, username, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, email, username, password_hash, created_at),
            );

            match inserted {
                Ok(_) => Ok(NewUserOutcome::Created),
                Err(rusqlite::Error::SqliteFailure(err, Some(msg)))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    if msg.contains("users.email") {
                        Ok(NewUserOutcome::Conflict(UniqueField::Email))
                    } else if msg.contains("users.username") {
                        Ok(NewUserOutcome::Conflict(UniqueField::Username))
                    } else {
                        Err(anyhow!("Constraint violation inserting user: {}", msg))
                    }
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Sessions --

    /// Drop every session the user holds and insert the new one, in a single
    /// transaction. Returns how many prior sessions were removed.
    pub fn replace_sessions(
        &self,
        session_id: &str,
        user_id: &str,
        expires_at: i64,
        created_at: &str,
    ) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let removed = tx.execute("DELETE FROM sessions WHERE user_id = ?1", [user_id])?;
            tx.execute(
                "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![session_id, user_id, expires_at, created_at],
            )?;
            tx.commit()?;
            Ok(removed)
        })
    }

    /// Fetch a session that is still live at `now` (unix millis).
    pub fn get_active_session(&self, session_id: &str, now: i64) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, expires_at FROM sessions WHERE id = ?1 AND expires_at > ?2",
                rusqlite::params![session_id, now],
                |row| {
                    Ok(SessionRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        expires_at: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Returns whether a row was actually removed.
    pub fn delete_session(&self, session_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM sessions WHERE id = ?1", [session_id])?;
            Ok(removed > 0)
        })
    }

    pub fn delete_expired_sessions(&self, now: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now])?;
            Ok(removed)
        })
    }

    // -- Votes --

    /// Insert-or-replace the user's vote on `target` and return the target's
    /// new aggregate score. Both statements run in one transaction, and the
    /// primary key over (user_id, target_id, target_kind) arbitrates the
    /// conflict, so there is never a separate existence check.
    pub fn upsert_vote(
        &self,
        user_id: &str,
        target: Target,
        value: VoteValue,
        created_at: &str,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute(
                "INSERT INTO votes (user_id, target_id, target_kind, value, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (user_id, target_id, target_kind) DO UPDATE SET value = excluded.value",
                rusqlite::params![user_id, target.id, target.kind.as_str(), value.as_i64(), created_at],
            )?;
            let score = query_score(&tx, target)?;
            tx.commit()?;
            Ok(score)
        })
    }

    pub fn vote_score(&self, target: Target) -> Result<i64> {
        self.with_conn(|conn| query_score(conn, target))
    }

    pub fn get_vote(&self, user_id: &str, target: Target) -> Result<Option<VoteValue>> {
        self.with_conn(|conn| {
            let raw: Option<i64> = conn
                .query_row(
                    "SELECT value FROM votes WHERE user_id = ?1 AND target_id = ?2 AND target_kind = ?3",
                    rusqlite::params![user_id, target.id, target.kind.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            raw.map(|v| VoteValue::try_from(v).map_err(|e| anyhow!("Corrupt vote row for {}: {}", target, e)))
                .transpose()
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, email, username, password_hash, created_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                username: row.get(2)?,
                password_hash: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_score(conn: &Connection, target: Target) -> Result<i64> {
    let score = conn.query_row(
        "SELECT COALESCE(SUM(value), 0) FROM votes WHERE target_id = ?1 AND target_kind = ?2",
        rusqlite::params![target.id, target.kind.as_str()],
        |row| row.get(0),
    )?;
    Ok(score)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
