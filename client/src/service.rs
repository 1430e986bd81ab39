use async_trait::async_trait;
use redline_shared::*;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ClientError;

/// The remote board service the feed reconciles against.
#[async_trait]
pub trait FeedService: Send + Sync + 'static {
    async fn list_posts(&self) -> Result<Vec<PostDetail>, ClientError>;
    async fn create_post(&self, draft: &CreatePost) -> Result<Post, ClientError>;
    async fn fetch_comments(&self, post_id: i64) -> Result<Vec<Comment>, ClientError>;
    async fn create_comment(&self, draft: &CreateComment) -> Result<Comment, ClientError>;
    async fn vote_comment(
        &self,
        comment_id: i64,
        direction: VoteDirection,
    ) -> Result<VoteResponse, ClientError>;
    async fn create_correction(&self, draft: &CreateCorrection) -> Result<Correction, ClientError>;
    async fn vote_correction(
        &self,
        post_id: i64,
        correction_id: i64,
    ) -> Result<VoteResponse, ClientError>;
    async fn choose_best(&self, post_id: i64, correction_id: i64) -> Result<(), ClientError>;
    async fn suggest(&self, post_id: i64) -> Result<String, ClientError>;
}

/// [`FeedService`] over the JSON HTTP API.
#[derive(Debug, Clone)]
pub struct HttpFeedService {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpFeedService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.request(Method::GET, path).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self.request(Method::POST, path).json(body).send().await?;
        Ok(check(resp).await?.json().await?)
    }
}

async fn check(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp
        .json::<ErrorBody>()
        .await
        .map(|b| b.message)
        .unwrap_or_else(|_| status.to_string());
    Err(ClientError::from_status(status.as_u16(), message))
}

#[async_trait]
impl FeedService for HttpFeedService {
    async fn list_posts(&self) -> Result<Vec<PostDetail>, ClientError> {
        self.get("/api/posts").await
    }

    async fn create_post(&self, draft: &CreatePost) -> Result<Post, ClientError> {
        self.post("/api/posts", draft).await
    }

    async fn fetch_comments(&self, post_id: i64) -> Result<Vec<Comment>, ClientError> {
        self.get(&format!("/api/comments/{post_id}")).await
    }

    async fn create_comment(&self, draft: &CreateComment) -> Result<Comment, ClientError> {
        self.post("/api/comments", draft).await
    }

    async fn vote_comment(
        &self,
        comment_id: i64,
        direction: VoteDirection,
    ) -> Result<VoteResponse, ClientError> {
        self.post("/api/votes", &CastVote { comment_id, direction })
            .await
    }

    async fn create_correction(&self, draft: &CreateCorrection) -> Result<Correction, ClientError> {
        self.post("/api/corrections", draft).await
    }

    async fn vote_correction(
        &self,
        post_id: i64,
        correction_id: i64,
    ) -> Result<VoteResponse, ClientError> {
        self.post(
            "/api/corrections/vote",
            &VoteCorrection {
                post_id,
                correction_id,
            },
        )
        .await
    }

    async fn choose_best(&self, post_id: i64, correction_id: i64) -> Result<(), ClientError> {
        let path = format!("/api/corrections/{post_id}/best/{correction_id}");
        let resp = self.request(Method::PATCH, &path).send().await?;
        check(resp).await?;
        Ok(())
    }

    async fn suggest(&self, post_id: i64) -> Result<String, ClientError> {
        let resp: SuggestResponse = self
            .post("/api/suggest", &SuggestRequest { post_id })
            .await?;
        Ok(resp.suggestion)
    }
}
