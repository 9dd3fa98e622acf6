use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::OffsetDateTime;

use crate::auth::AppState;
use crate::error::{ForumError, blocking};
use crate::sessions::IssuedSession;

pub const SESSION_COOKIE: &str = "session_id";

/// Cookie attributes the deployment decides on. `HttpOnly` and `Path=/` are
/// always set.
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieSettings {
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

pub fn session_cookie(settings: &CookieSettings, issued: &IssuedSession) -> Cookie<'static> {
    let mut builder = Cookie::build((SESSION_COOKIE, issued.token.as_str().to_owned()))
        .path("/")
        .http_only(true)
        .secure(settings.secure);

    if let Some(same_site) = settings.same_site {
        builder = builder.same_site(same_site);
    }
    if let Ok(expires) = OffsetDateTime::from_unix_timestamp(issued.expires_at.timestamp()) {
        builder = builder.expires(expires);
    }

    builder.build()
}

/// Path must match the issued cookie or browsers keep the old one.
pub fn clear_session_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

pub fn session_token(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE).map(|c| c.value().to_owned())
}

/// Resolve the `session_id` cookie to a user and put it in request
/// extensions. Rejects with 401 otherwise.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ForumError> {
    let token = session_token(&jar);
    let identity = state.identity.clone();
    let user = blocking(move || identity.resolve_caller(token.as_deref())).await?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
