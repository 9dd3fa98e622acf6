use axum::{
    Extension, Json,
    extract::{Path, State},
};

use forum_types::api::{CastVoteRequest, ScoreResponse, VoteResponse};
use forum_types::models::{Target, User};

use crate::auth::AppState;
use crate::error::{ForumError, blocking};
use crate::extract::ApiJson;

pub async fn vote_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(user): Extension<User>,
    ApiJson(req): ApiJson<CastVoteRequest>,
) -> Result<Json<VoteResponse>, ForumError> {
    cast(state, user, Target::post(post_id), req.value).await
}

pub async fn vote_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    Extension(user): Extension<User>,
    ApiJson(req): ApiJson<CastVoteRequest>,
) -> Result<Json<VoteResponse>, ForumError> {
    cast(state, user, Target::comment(comment_id), req.value).await
}

/// The caller's current vote on a post, with the post's score.
pub async fn my_post_vote(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(user): Extension<User>,
) -> Result<Json<VoteResponse>, ForumError> {
    current_vote(state, user, Target::post(post_id)).await
}

pub async fn my_comment_vote(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    Extension(user): Extension<User>,
) -> Result<Json<VoteResponse>, ForumError> {
    current_vote(state, user, Target::comment(comment_id)).await
}

pub async fn post_score(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<ScoreResponse>, ForumError> {
    score(state, Target::post(post_id)).await
}

pub async fn comment_score(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
) -> Result<Json<ScoreResponse>, ForumError> {
    score(state, Target::comment(comment_id)).await
}

async fn cast(state: AppState, user: User, target: Target, value: i64) -> Result<Json<VoteResponse>, ForumError> {
    let votes = state.votes.clone();
    let outcome = blocking(move || votes.cast_vote(user.id, target, value)).await?;

    Ok(Json(VoteResponse {
        success: true,
        target_id: target.id,
        target_kind: target.kind,
        score: outcome.score,
        user_vote: Some(outcome.user_vote),
    }))
}

async fn current_vote(state: AppState, user: User, target: Target) -> Result<Json<VoteResponse>, ForumError> {
    let votes = state.votes.clone();
    let (score, user_vote) = blocking(move || {
        let user_vote = votes.user_vote(user.id, target)?;
        let score = votes.get_score(target)?;
        Ok((score, user_vote))
    })
    .await?;

    Ok(Json(VoteResponse {
        success: true,
        target_id: target.id,
        target_kind: target.kind,
        score,
        user_vote,
    }))
}

async fn score(state: AppState, target: Target) -> Result<Json<ScoreResponse>, ForumError> {
    let votes = state.votes.clone();
    let score = blocking(move || votes.get_score(target)).await?;

    Ok(Json(ScoreResponse {
        target_id: target.id,
        target_kind: target.kind,
        score,
    }))
}
