pub mod auth;
pub mod comments;
pub mod config;
pub mod corrections;
pub mod db;
pub mod error;
pub mod ledger;
pub mod posts;
pub mod suggest;
pub mod votes;

use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::corrections::BestChoicePolicy;
use crate::suggest::Suggester;

pub type DbPool = r2d2::Pool<r2d2_sqlite::SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub jwt_secret: String,
    pub best_choice: BestChoicePolicy,
    pub suggester: Option<Arc<dyn Suggester>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(|| async { "ok" }))
        // Posts
        .route("/api/posts", get(posts::list_posts).post(posts::create_post))
        .route("/api/posts/{id}", get(posts::get_post))
        .route(
            "/api/posts/{id}/corrections",
            get(corrections::list_corrections),
        )
        // Comments
        .route("/api/comments", post(comments::create_comment))
        .route("/api/comments/{post_id}", get(comments::list_comments))
        // Votes
        .route("/api/votes", get(votes::get_votes).post(votes::cast_vote))
        // Corrections
        .route("/api/corrections", post(corrections::create_correction))
        .route("/api/corrections/vote", post(corrections::vote_correction))
        .route(
            "/api/corrections/{post_id}/best/{correction_id}",
            patch(corrections::set_best),
        )
        // Suggestions
        .route("/api/suggest", post(suggest::suggest))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
