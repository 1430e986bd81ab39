use r2d2_sqlite::SqliteConnectionManager;
use redline_shared::{Category, Comment, Correction, Post};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};

use crate::error::{AppError, AppResult};
use crate::DbPool;

pub const POST_COLUMNS: &str =
    "p.id, p.title, p.content, p.category, p.author_id, p.created_at, p.suggestion, p.best_correction_id";

pub const COMMENT_COLUMNS: &str =
    "c.id, c.post_id, c.author_id, c.content, c.created_at, c.vote_count";

pub const CORRECTION_COLUMNS: &str =
    "r.id, r.post_id, r.author_id, r.content, r.explanation, r.created_at, r.vote_count";

pub fn create_pool(database_url: &str) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_url).with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )
    });
    let pool = r2d2::Pool::builder().max_size(8).build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> AppResult<()> {
    let conn = pool.get()?;

    tracing::info!("Applying schema");
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS posts (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            title               TEXT NOT NULL,
            content             TEXT NOT NULL,
            category            TEXT NOT NULL
                                CHECK (category IN ('Writing', 'Grammar', 'Vocabulary')),
            author_id           INTEGER NOT NULL,
            created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            suggestion          TEXT,
            best_correction_id  INTEGER,
            FOREIGN KEY (best_correction_id, id) REFERENCES corrections(id, post_id)
        );

        CREATE TABLE IF NOT EXISTS comments (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id     INTEGER NOT NULL REFERENCES posts(id),
            author_id   INTEGER NOT NULL,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            vote_count  INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id);

        CREATE TABLE IF NOT EXISTS corrections (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id     INTEGER NOT NULL REFERENCES posts(id),
            author_id   INTEGER NOT NULL,
            content     TEXT NOT NULL,
            explanation TEXT,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            vote_count  INTEGER NOT NULL DEFAULT 0 CHECK (vote_count >= 0),
            UNIQUE (id, post_id)
        );
        CREATE INDEX IF NOT EXISTS idx_corrections_post ON corrections(post_id);

        -- One ledger row per (voter, target); the cached counts above are
        -- projections of this table.
        CREATE TABLE IF NOT EXISTS votes (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            voter_id    INTEGER NOT NULL,
            target_kind TEXT NOT NULL CHECK (target_kind IN ('comment', 'correction')),
            target_id   INTEGER NOT NULL,
            value       INTEGER NOT NULL CHECK (value IN (1, -1)),
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            UNIQUE (voter_id, target_kind, target_id)
        );
        CREATE INDEX IF NOT EXISTS idx_votes_target ON votes(target_kind, target_id);
        ",
    )?;

    Ok(())
}

/// Run blocking storage work off the async runtime.
pub async fn run<T, F>(pool: &DbPool, f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut *conn)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

pub fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let category: String = row.get(3)?;
    let category = category
        .parse::<Category>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into()))?;

    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        category,
        author_id: row.get(4)?,
        created_at: row.get(5)?,
        suggestion: row.get(6)?,
        best_correction_id: row.get(7)?,
    })
}

pub fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        vote_count: row.get(5)?,
    })
}

pub fn correction_from_row(row: &Row<'_>) -> rusqlite::Result<Correction> {
    Ok(Correction {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        content: row.get(3)?,
        explanation: row.get(4)?,
        created_at: row.get(5)?,
        vote_count: row.get(6)?,
    })
}


#[cfg(test)]
mod tests {
    use super::testing;

    #[test]
    fn migrations_are_idempotent() {
        let (pool, _dir) = testing::pool();
        super::run_migrations(&pool).unwrap();
    }

    #[test]
    fn category_outside_the_closed_set_is_rejected() {
        let (pool, _dir) = testing::pool();
        let conn = pool.get().unwrap();
        let result = conn.execute(
            "INSERT INTO posts (title, content, category, author_id)
             VALUES ('t', 'c', 'Poetry', 1)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn best_correction_must_belong_to_the_post() {
        let (pool, _dir) = testing::pool();
        let conn = pool.get().unwrap();
        let first = testing::seed_post(&conn, 1);
        let second = testing::seed_post(&conn, 1);
        conn.execute(
            "INSERT INTO corrections (post_id, author_id, content) VALUES (?1, 2, 'x')",
            [second],
        )
        .unwrap();
        let foreign = conn.last_insert_rowid();

        let result = conn.execute(
            "UPDATE posts SET best_correction_id = ?1 WHERE id = ?2",
            [foreign, first],
        );
        assert!(result.is_err());
    }
}
