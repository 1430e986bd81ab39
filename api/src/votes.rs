use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use redline_shared::{CastVote, TargetKind, VoteResponse};
use serde::Deserialize;

use crate::error::AppResult;
use crate::ledger::{self, VotePolicy};
use crate::{auth, db, AppState};

#[derive(Deserialize)]
pub struct VoteQuery {
    kind: TargetKind,
    id: i64,
}

/// GET /api/votes?kind=comment&id=123
pub async fn get_votes(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<VoteQuery>,
) -> AppResult<Json<VoteResponse>> {
    let voter_id = auth::optional_user_id(&headers, &state.jwt_secret);

    let resp = db::run(&state.db, move |conn| {
        ledger::current(conn, voter_id, params.kind, params.id)
    })
    .await?;

    Ok(Json(resp))
}

/// POST /api/votes — up/down vote on a comment
pub async fn cast_vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CastVote>,
) -> AppResult<Json<VoteResponse>> {
    let voter_id = auth::extract_user_id(&headers, &state.jwt_secret)?;

    let resp = db::run(&state.db, move |conn| {
        ledger::toggle_vote(
            conn,
            voter_id,
            TargetKind::Comment,
            payload.comment_id,
            VotePolicy::Signed(payload.direction),
        )
    })
    .await?;

    Ok(Json(resp))
}
