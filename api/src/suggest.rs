//! Writing suggestions from an upstream enrichment service. Best effort:
//! a post is complete without one, and nothing waits on this at creation.

use async_trait::async_trait;
use axum::{extract::State, http::HeaderMap, Json};
use redline_shared::{SuggestRequest, SuggestResponse};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::{auth, db, posts, AppState};

#[derive(Debug, thiserror::Error)]
pub enum SuggestError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("empty suggestion")]
    Empty,
}

#[async_trait]
pub trait Suggester: Send + Sync {
    async fn suggest(&self, content: &str) -> Result<String, SuggestError>;
}

#[derive(Serialize)]
struct UpstreamRequest<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct UpstreamResponse {
    suggestion: String,
}

/// POSTs `{ "content": ... }` to a configured URL and expects
/// `{ "suggestion": ... }` back.
pub struct HttpSuggester {
    client: reqwest::Client,
    url: String,
}

impl HttpSuggester {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Suggester for HttpSuggester {
    async fn suggest(&self, content: &str) -> Result<String, SuggestError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&UpstreamRequest { content })
            .send()
            .await?
            .error_for_status()?
            .json::<UpstreamResponse>()
            .await?;

        let suggestion = resp.suggestion.trim();
        if suggestion.is_empty() {
            return Err(SuggestError::Empty);
        }
        Ok(suggestion.to_string())
    }
}

/// POST /api/suggest
pub async fn suggest(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SuggestRequest>,
) -> AppResult<Json<SuggestResponse>> {
    auth::extract_user_id(&headers, &state.jwt_secret)?;
    let suggester = state.suggester.clone().ok_or(AppError::Unavailable)?;

    let post_id = payload.post_id;
    let post = db::run(&state.db, move |conn| posts::load(conn, post_id)).await?;

    let suggestion = suggester
        .suggest(&post.content)
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    let stored = suggestion.clone();
    db::run(&state.db, move |conn| {
        posts::set_suggestion(conn, post_id, &stored)
    })
    .await?;

    tracing::debug!(post_id, "suggestion stored");
    Ok(Json(SuggestResponse { suggestion }))
}
