//! Corrections and the single "best" designation per post.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use redline_shared::{Correction, CreateCorrection, TargetKind, VoteCorrection, VoteResponse};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::db::{self, CORRECTION_COLUMNS};
use crate::error::{AppError, AppResult};
use crate::ledger::{self, VotePolicy};
use crate::{auth, posts, AppState};

/// Who may set a post's best correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BestChoicePolicy {
    /// Any authenticated user.
    Anyone,
    /// Only the author of the post.
    AuthorOnly,
}

/// Corrections for a post, most voted first. Display order only: ranking
/// never changes which correction is marked best.
pub fn ranked(conn: &Connection, post_id: i64) -> AppResult<Vec<Correction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CORRECTION_COLUMNS} FROM corrections r
         WHERE r.post_id = ?1
         ORDER BY r.vote_count DESC, r.created_at ASC, r.id ASC"
    ))?;
    let rows = stmt
        .query_map([post_id], db::correction_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn submit(
    conn: &Connection,
    post_id: i64,
    author_id: i64,
    content: &str,
    explanation: Option<&str>,
) -> AppResult<Correction> {
    let content = ammonia::clean(content);
    if content.trim().is_empty() {
        return Err(AppError::Validation("A correction cannot be empty".into()));
    }
    let explanation = explanation
        .map(ammonia::clean)
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty());

    posts::ensure_exists(conn, post_id)?;

    conn.execute(
        "INSERT INTO corrections (post_id, author_id, content, explanation)
         VALUES (?1, ?2, ?3, ?4)",
        params![post_id, author_id, content.trim(), explanation],
    )?;

    let id = conn.last_insert_rowid();
    let correction = conn.query_row(
        &format!("SELECT {CORRECTION_COLUMNS} FROM corrections r WHERE r.id = ?1"),
        [id],
        db::correction_from_row,
    )?;

    Ok(correction)
}

fn owning_post(conn: &Connection, correction_id: i64) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT post_id FROM corrections WHERE id = ?1",
        [correction_id],
        |row| row.get(0),
    )
    .optional()
}

/// Toggle `voter_id`'s vote on a correction of `post_id`.
pub fn vote(
    conn: &mut Connection,
    post_id: i64,
    correction_id: i64,
    voter_id: i64,
) -> AppResult<VoteResponse> {
    // post_id is immutable, so the check cannot go stale before the ledger runs.
    if owning_post(conn, correction_id)? != Some(post_id) {
        return Err(AppError::NotFound);
    }

    ledger::toggle_vote(
        conn,
        voter_id,
        TargetKind::Correction,
        correction_id,
        VotePolicy::Toggle,
    )
}

/// Mark `correction_id` as the best correction of `post_id`, replacing any
/// earlier choice.
pub fn choose_best(
    conn: &mut Connection,
    policy: BestChoicePolicy,
    post_id: i64,
    correction_id: i64,
    actor_id: i64,
) -> AppResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let post_author: i64 = tx
        .query_row(
            "SELECT author_id FROM posts WHERE id = ?1",
            [post_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(AppError::NotFound)?;

    if policy == BestChoicePolicy::AuthorOnly && post_author != actor_id {
        return Err(AppError::Forbidden);
    }

    if owning_post(&tx, correction_id)? != Some(post_id) {
        return Err(AppError::InvalidState(format!(
            "correction {correction_id} does not belong to post {post_id}"
        )));
    }

    tx.execute(
        "UPDATE posts SET best_correction_id = ?1 WHERE id = ?2",
        params![correction_id, post_id],
    )?;
    tx.commit()?;

    tracing::info!(post_id, correction_id, actor_id, "best correction chosen");
    Ok(())
}

// ── Handlers ──

/// GET /api/posts/:id/corrections
pub async fn list_corrections(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> AppResult<Json<Vec<Correction>>> {
    let corrections = db::run(&state.db, move |conn| {
        posts::ensure_exists(conn, post_id)?;
        ranked(conn, post_id)
    })
    .await?;

    Ok(Json(corrections))
}

/// POST /api/corrections
pub async fn create_correction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateCorrection>,
) -> AppResult<Json<Correction>> {
    let author_id = auth::extract_user_id(&headers, &state.jwt_secret)?;

    let correction = db::run(&state.db, move |conn| {
        submit(
            conn,
            payload.post_id,
            author_id,
            &payload.content,
            payload.explanation.as_deref(),
        )
    })
    .await?;

    Ok(Json(correction))
}

/// POST /api/corrections/vote — toggle
pub async fn vote_correction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<VoteCorrection>,
) -> AppResult<Json<VoteResponse>> {
    let voter_id = auth::extract_user_id(&headers, &state.jwt_secret)?;

    let resp = db::run(&state.db, move |conn| {
        vote(conn, payload.post_id, payload.correction_id, voter_id)
    })
    .await?;

    Ok(Json(resp))
}

/// PATCH /api/corrections/:post_id/best/:correction_id
pub async fn set_best(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((post_id, correction_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    let actor_id = auth::extract_user_id(&headers, &state.jwt_secret)?;
    let policy = state.best_choice;

    db::run(&state.db, move |conn| {
        choose_best(conn, policy, post_id, correction_id, actor_id)
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
