use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{TargetKind, VoteValue};

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// `login` is an email when it contains '@', otherwise a username.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[serde(alias = "email", alias = "username")]
    pub login: String,
    pub password: String,
}

/// Returned by register and login. The session token itself travels only in
/// the `session_id` cookie.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

// -- Votes --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CastVoteRequest {
    pub value: i64,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub success: bool,
    pub target_id: i64,
    pub target_kind: TargetKind,
    pub score: i64,
    pub user_vote: Option<VoteValue>,
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub target_id: i64,
    pub target_kind: TargetKind,
    pub score: i64,
}

// -- Errors --

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}
