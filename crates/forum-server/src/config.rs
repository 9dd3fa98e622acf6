use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use axum_extra::extract::cookie::SameSite;
use chrono::Duration;

use forum_api::middleware::CookieSettings;
use forum_api::sessions::DEFAULT_SESSION_TTL_HOURS;

/// One year.
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub session_ttl: Duration,
    pub cookies: CookieSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = var("FORUM_DB_PATH").unwrap_or_else(|| "forum.db".into());
        let host = var("FORUM_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("FORUM_PORT")
            .unwrap_or_else(|| "8082".into())
            .parse()
            .context("FORUM_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let session_ttl_hours: i64 = match var("FORUM_SESSION_TTL_HOURS") {
            Some(raw) => raw.parse().context("FORUM_SESSION_TTL_HOURS must be an integer")?,
            None => DEFAULT_SESSION_TTL_HOURS,
        };
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&session_ttl_hours) {
            bail!(
                "FORUM_SESSION_TTL_HOURS must be between 1 and {}, got {}",
                MAX_SESSION_TTL_HOURS,
                session_ttl_hours
            );
        }
        let session_ttl =
            Duration::try_hours(session_ttl_hours).context("FORUM_SESSION_TTL_HOURS out of range")?;

        let secure = match var("FORUM_COOKIE_SECURE").as_deref() {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => bail!("FORUM_COOKIE_SECURE must be true or false, got '{}'", other),
        };
        let same_site = match var("FORUM_COOKIE_SAME_SITE").as_deref() {
            None | Some("") => None,
            Some("strict") => Some(SameSite::Strict),
            Some("lax") => Some(SameSite::Lax),
            Some("none") => Some(SameSite::None),
            Some(other) => bail!("FORUM_COOKIE_SAME_SITE must be strict, lax or none, got '{}'", other),
        };

        Ok(Self {
            db_path: db_path.into(),
            addr,
            session_ttl,
            cookies: CookieSettings { secure, same_site },
        })
    }
}
