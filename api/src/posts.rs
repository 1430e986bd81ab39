use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use redline_shared::{CreatePost, Post, PostDetail};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{self, POST_COLUMNS};
use crate::error::{AppError, AppResult};
use crate::{auth, corrections, AppState};

pub fn load(conn: &Connection, post_id: i64) -> AppResult<Post> {
    conn.query_row(
        &format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = ?1"),
        [post_id],
        db::post_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

pub fn ensure_exists(conn: &Connection, post_id: i64) -> AppResult<()> {
    conn.query_row("SELECT 1 FROM posts WHERE id = ?1", [post_id], |_| Ok(()))
        .optional()?
        .ok_or(AppError::NotFound)
}

/// Newest first.
pub fn list(conn: &Connection) -> AppResult<Vec<PostDetail>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {POST_COLUMNS} FROM posts p ORDER BY p.created_at DESC, p.id DESC"
    ))?;
    let posts = stmt
        .query_map([], db::post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    posts
        .into_iter()
        .map(|post| {
            let corrections = corrections::ranked(conn, post.id)?;
            Ok(PostDetail { post, corrections })
        })
        .collect()
}

pub fn insert(conn: &Connection, author_id: i64, payload: &CreatePost) -> AppResult<Post> {
    let title = ammonia::clean(&payload.title);
    let content = ammonia::clean(&payload.content);

    if title.trim().is_empty() || content.trim().is_empty() {
        return Err(AppError::Validation(
            "A post needs a title and some content".into(),
        ));
    }

    conn.execute(
        "INSERT INTO posts (title, content, category, author_id) VALUES (?1, ?2, ?3, ?4)",
        params![
            title.trim(),
            content.trim(),
            payload.category.as_str(),
            author_id
        ],
    )?;

    load(conn, conn.last_insert_rowid())
}

pub fn set_suggestion(conn: &Connection, post_id: i64, suggestion: &str) -> AppResult<()> {
    let affected = conn.execute(
        "UPDATE posts SET suggestion = ?1 WHERE id = ?2",
        params![suggestion, post_id],
    )?;
    if affected == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

// ── Handlers ──

/// GET /api/posts
pub async fn list_posts(State(state): State<AppState>) -> AppResult<Json<Vec<PostDetail>>> {
    let posts = db::run(&state.db, |conn| list(conn)).await?;
    Ok(Json(posts))
}

/// GET /api/posts/:id
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<PostDetail>> {
    let detail = db::run(&state.db, move |conn| {
        let post = load(conn, id)?;
        let corrections = corrections::ranked(conn, id)?;
        Ok(PostDetail { post, corrections })
    })
    .await?;

    Ok(Json(detail))
}

/// POST /api/posts
pub async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePost>,
) -> AppResult<Json<Post>> {
    let author_id = auth::extract_user_id(&headers, &state.jwt_secret)?;

    let post = db::run(&state.db, move |conn| insert(conn, author_id, &payload)).await?;
    tracing::info!(post_id = post.id, author_id, "post created");

    Ok(Json(post))
}

#[cfg(test)]
mod tests {
    use redline_shared::Category;

    use super::*;
    use crate::db::testing;

    fn draft(title: &str, content: &str) -> CreatePost {
        CreatePost {
            title: title.into(),
            content: content.into(),
            category: Category::Writing,
        }
    }

    #[test]
    fn insert_returns_canonical_post() {
        let (pool, _dir) = testing::pool();
        let conn = pool.get().unwrap();

        let post = insert(&conn, 3, &draft("  Essay ", "The cat sit on the mat.")).unwrap();
        assert_eq!(post.title, "Essay");
        assert_eq!(post.author_id, 3);
        assert_eq!(post.category, Category::Writing);
        assert!(post.suggestion.is_none());
        assert!(post.best_correction_id.is_none());
    }

    #[test]
    fn blank_content_is_a_validation_error() {
        let (pool, _dir) = testing::pool();
        let conn = pool.get().unwrap();

        let err = insert(&conn, 3, &draft("Essay", "   ")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(list(&conn).unwrap().is_empty());
    }

    #[test]
    fn list_is_newest_first() {
        let (pool, _dir) = testing::pool();
        let conn = pool.get().unwrap();

        let older = insert(&conn, 1, &draft("One", "first")).unwrap();
        let newer = insert(&conn, 1, &draft("Two", "second")).unwrap();
        let ids: Vec<i64> = list(&conn).unwrap().iter().map(|d| d.post.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[test]
    fn suggestion_on_missing_post_is_not_found() {
        let (pool, _dir) = testing::pool();
        let conn = pool.get().unwrap();
        assert!(matches!(
            set_suggestion(&conn, 77, "Try 'sits'."),
            Err(AppError::NotFound)
        ));
    }
}
