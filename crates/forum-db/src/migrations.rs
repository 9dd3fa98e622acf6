use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, sessions, votes)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE,
                username        TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash   TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            -- id is the SHA-256 of the bearer token, never the token itself
            CREATE TABLE sessions (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                expires_at  INTEGER NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_sessions_user ON sessions(user_id);

            CREATE TABLE votes (
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                target_id   INTEGER NOT NULL,
                target_kind TEXT NOT NULL CHECK (target_kind IN ('post', 'comment')),
                value       INTEGER NOT NULL CHECK (value IN (-1, 1)),
                created_at  TEXT NOT NULL,
                PRIMARY KEY (user_id, target_id, target_kind)
            );

            CREATE INDEX idx_votes_target ON votes(target_kind, target_id);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
