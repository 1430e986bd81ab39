use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use redline_shared::{Comment, CreateComment};
use rusqlite::{params, Connection};

use crate::db::{self, COMMENT_COLUMNS};
use crate::error::{AppError, AppResult};
use crate::{auth, posts, AppState};

/// Comments on a post, newest first.
pub fn for_post(conn: &Connection, post_id: i64) -> AppResult<Vec<Comment>> {
    posts::ensure_exists(conn, post_id)?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {COMMENT_COLUMNS} FROM comments c
         WHERE c.post_id = ?1
         ORDER BY c.created_at DESC, c.id DESC"
    ))?;
    let rows = stmt
        .query_map([post_id], db::comment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

pub fn insert(conn: &Connection, author_id: i64, payload: &CreateComment) -> AppResult<Comment> {
    let content = ammonia::clean(&payload.content);

    if content.trim().is_empty() {
        return Err(AppError::Validation("A comment cannot be empty".into()));
    }

    posts::ensure_exists(conn, payload.post_id)?;

    conn.execute(
        "INSERT INTO comments (post_id, author_id, content) VALUES (?1, ?2, ?3)",
        params![payload.post_id, author_id, content.trim()],
    )?;

    let id = conn.last_insert_rowid();
    let comment = conn.query_row(
        &format!("SELECT {COMMENT_COLUMNS} FROM comments c WHERE c.id = ?1"),
        [id],
        db::comment_from_row,
    )?;

    Ok(comment)
}

// ── Handlers ──

/// GET /api/comments/:post_id
pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> AppResult<Json<Vec<Comment>>> {
    let comments = db::run(&state.db, move |conn| for_post(conn, post_id)).await?;
    Ok(Json(comments))
}

/// POST /api/comments
pub async fn create_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateComment>,
) -> AppResult<Json<Comment>> {
    let author_id = auth::extract_user_id(&headers, &state.jwt_secret)?;
    let comment = db::run(&state.db, move |conn| insert(conn, author_id, &payload)).await?;
    Ok(Json(comment))
}
