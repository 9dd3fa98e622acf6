use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::CookieJar;
use tracing::info;

use forum_db::Database;
use forum_types::api::{LoginRequest, RegisterRequest, SessionResponse};
use forum_types::models::User;

use crate::credentials::CredentialStore;
use crate::error::{ForumError, blocking};
use crate::extract::ApiJson;
use crate::identity::IdentityResolver;
use crate::ledger::VoteLedger;
use crate::middleware::{CookieSettings, clear_session_cookie, session_cookie, session_token};
use crate::sessions::SessionManager;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub credentials: CredentialStore,
    pub sessions: SessionManager,
    pub identity: IdentityResolver,
    pub votes: VoteLedger,
    pub cookies: CookieSettings,
}

impl AppStateInner {
    /// Wire the components around one store handle.
    pub fn new(
        db: Arc<Database>,
        credentials: CredentialStore,
        sessions: SessionManager,
        cookies: CookieSettings,
    ) -> Self {
        Self {
            identity: IdentityResolver::new(sessions.clone(), db.clone()),
            votes: VoteLedger::new(db),
            credentials,
            sessions,
            cookies,
        }
    }
}

/// POST /auth/register — creates the account and logs it in.
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ForumError> {
    let credentials = state.credentials.clone();
    let sessions = state.sessions.clone();
    let (user, issued) = blocking(move || {
        let user = credentials.register(&req.email, &req.username, &req.password)?;
        let issued = sessions.issue_session(user.id)?;
        Ok((user, issued))
    })
    .await?;

    let jar = jar.add(session_cookie(&state.cookies, &issued));

    Ok((
        StatusCode::CREATED,
        jar,
        Json(SessionResponse {
            user_id: user.id,
            username: user.username,
            expires_at: issued.expires_at,
        }),
    ))
}

/// POST /auth/login — the error for an unknown account and for a wrong
/// password is the same 401.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ForumError> {
    let credentials = state.credentials.clone();
    let sessions = state.sessions.clone();
    let (user, issued) = blocking(move || {
        let user = credentials.authenticate(&req.login, &req.password)?;
        let issued = sessions.issue_session(user.id)?;
        Ok((user, issued))
    })
    .await?;

    info!("Successful login for user {}", user.username);
    let jar = jar.add(session_cookie(&state.cookies, &issued));

    Ok((
        jar,
        Json(SessionResponse {
            user_id: user.id,
            username: user.username,
            expires_at: issued.expires_at,
        }),
    ))
}

/// POST /auth/logout — idempotent; always clears the cookie.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ForumError> {
    if let Some(token) = session_token(&jar) {
        let sessions = state.sessions.clone();
        blocking(move || sessions.revoke_session(&token)).await?;
    }

    Ok((StatusCode::NO_CONTENT, clear_session_cookie(jar)))
}

/// GET /auth/me
pub async fn me(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}
