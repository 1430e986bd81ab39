//! Client-side projection of the board, reconciled against the service.
//!
//! Counts and designations are only ever taken from server responses. A
//! mutation that fails leaves the projection exactly as it was before.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use redline_shared::*;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::ClientError;
use crate::service::FeedService;
use crate::timeline::Timeline;

/// A single field the server confirmed in response to one of our mutations.
#[derive(Debug, Clone, PartialEq)]
enum FieldWrite {
    Votes {
        kind: TargetKind,
        target_id: i64,
        count: i64,
    },
    Best {
        post_id: i64,
        correction_id: i64,
    },
    Suggestion {
        post_id: i64,
        text: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Votes(TargetKind, i64),
    Best(i64),
    Suggestion(i64),
}

impl FieldWrite {
    fn field(&self) -> Field {
        match self {
            FieldWrite::Votes {
                kind, target_id, ..
            } => Field::Votes(*kind, *target_id),
            FieldWrite::Best { post_id, .. } => Field::Best(*post_id),
            FieldWrite::Suggestion { post_id, .. } => Field::Suggestion(*post_id),
        }
    }
}

#[derive(Debug, Default)]
pub struct FeedState {
    posts: Timeline<Post, CreatePost>,
    comments: HashMap<i64, Timeline<Comment, CreateComment>>,
    corrections: HashMap<i64, Timeline<Correction, CreateCorrection>>,
    comment_errors: HashMap<i64, ClientError>,
    user_votes: HashMap<(TargetKind, i64), Option<i32>>,
    /// Field writes keyed by the ticket at which the server confirmed them.
    /// Kept only while some load issued before that ticket is in flight.
    writes: HashMap<Field, (u64, FieldWrite)>,
    loads_in_flight: BTreeSet<u64>,
}

impl FeedState {
    fn apply(&mut self, write: &FieldWrite) {
        match write {
            FieldWrite::Votes {
                kind: TargetKind::Comment,
                target_id,
                count,
            } => {
                for timeline in self.comments.values_mut() {
                    if timeline.update(*target_id, |c| c.vote_count = *count) {
                        break;
                    }
                }
            }
            FieldWrite::Votes {
                kind: TargetKind::Correction,
                target_id,
                count,
            } => {
                for timeline in self.corrections.values_mut() {
                    if timeline.update(*target_id, |c| c.vote_count = *count) {
                        break;
                    }
                }
            }
            FieldWrite::Best {
                post_id,
                correction_id,
            } => {
                self.posts.update(*post_id, |p| {
                    p.best_correction_id = Some(*correction_id);
                });
            }
            FieldWrite::Suggestion { post_id, text } => {
                self.posts.update(*post_id, |p| {
                    if p.suggestion.is_none() {
                        p.suggestion = Some(text.clone());
                    }
                });
            }
        }
    }

    /// Apply a server-confirmed write and remember it for any load that
    /// was issued before it and has not landed yet.
    fn confirm_write(&mut self, ticket: u64, write: FieldWrite) {
        self.apply(&write);
        if self.loads_in_flight.iter().any(|&issued| issued < ticket) {
            self.writes.insert(write.field(), (ticket, write));
        }
    }

    /// A load issued at `issued` has been installed: put back every write
    /// confirmed after it was issued, then forget writes no remaining load
    /// could miss.
    fn finish_load(&mut self, issued: u64) {
        let newer: Vec<FieldWrite> = self
            .writes
            .values()
            .filter(|(ticket, _)| *ticket > issued)
            .map(|(_, write)| write.clone())
            .collect();
        for write in &newer {
            self.apply(write);
        }
        self.forget_load(issued);
    }

    fn forget_load(&mut self, issued: u64) {
        self.loads_in_flight.remove(&issued);
        match self.loads_in_flight.first().copied() {
            Some(oldest) => self.writes.retain(|_, (ticket, _)| *ticket > oldest),
            None => self.writes.clear(),
        }
    }

    /// Drop own-vote records for targets the projection no longer holds.
    fn prune_user_votes(&mut self) {
        let comments = &self.comments;
        let corrections = &self.corrections;
        self.user_votes.retain(|(kind, id), _| match kind {
            TargetKind::Comment => comments.values().any(|t| t.get(*id).is_some()),
            TargetKind::Correction => corrections.values().any(|t| t.get(*id).is_some()),
        });
    }
}

/// Handle to the detached suggestion request started after a post is
/// created. Dropping it leaves the request running in the background.
#[derive(Debug)]
pub struct SuggestionTask {
    handle: JoinHandle<Option<String>>,
}

impl SuggestionTask {
    /// Wait for the request. `None` if it failed or produced nothing.
    pub async fn outcome(self) -> Option<String> {
        self.handle.await.ok().flatten()
    }
}

pub struct FeedStore<S> {
    service: Arc<S>,
    state: Arc<Mutex<FeedState>>,
    tickets: Arc<AtomicU64>,
}

impl<S> Clone for FeedStore<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            state: self.state.clone(),
            tickets: self.tickets.clone(),
        }
    }
}

fn require_text(text: &str, what: &str) -> Result<(), ClientError> {
    if text.trim().is_empty() {
        return Err(ClientError::Validation(format!("{what} cannot be empty")));
    }
    Ok(())
}

impl<S: FeedService> FeedStore<S> {
    pub fn new(service: S) -> Self {
        Self {
            service: Arc::new(service),
            state: Arc::new(Mutex::new(FeedState::default())),
            tickets: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    fn next_ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Stamp a load before its request goes out.
    async fn begin_load(&self) -> u64 {
        let mut state = self.state.lock().await;
        let issued = self.next_ticket();
        state.loads_in_flight.insert(issued);
        issued
    }

    /// Record a field the server just confirmed. The ticket is drawn under
    /// the state lock so it orders against load stamps.
    async fn confirm_write(&self, write: FieldWrite) {
        let mut state = self.state.lock().await;
        let ticket = self.next_ticket();
        state.confirm_write(ticket, write);
    }

    // ── Loading ──

    /// Fetch every post, then each post's comments concurrently. A failed
    /// comment fetch only affects its own post. Fields the server confirmed
    /// after this load was issued survive a snapshot that predates them.
    pub async fn load(&self) -> Result<(), ClientError> {
        let issued = self.begin_load().await;
        let details = match self.service.list_posts().await {
            Ok(details) => details,
            Err(e) => {
                self.state.lock().await.forget_load(issued);
                return Err(e);
            }
        };
        let post_ids: Vec<i64> = details.iter().map(|d| d.post.id).collect();

        {
            let mut state = self.state.lock().await;
            let mut posts = Vec::with_capacity(details.len());
            for PostDetail { post, corrections } in details {
                state
                    .corrections
                    .entry(post.id)
                    .or_default()
                    .replace_confirmed(corrections);
                posts.push(post);
            }
            state.posts.replace_confirmed(posts);
            state.finish_load(issued);
        }

        join_all(post_ids.into_iter().map(|id| self.load_comments(id))).await;
        self.state.lock().await.prune_user_votes();
        Ok(())
    }

    pub async fn load_comments(&self, post_id: i64) -> Result<(), ClientError> {
        let issued = self.begin_load().await;
        match self.service.fetch_comments(post_id).await {
            Ok(comments) => {
                let mut state = self.state.lock().await;
                state.comment_errors.remove(&post_id);
                state
                    .comments
                    .entry(post_id)
                    .or_default()
                    .replace_confirmed(comments);
                state.finish_load(issued);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(post_id, error = %e, "failed to load comments");
                let mut state = self.state.lock().await;
                state.forget_load(issued);
                state.comment_errors.insert(post_id, e.clone());
                Err(e)
            }
        }
    }

    // ── Posts ──

    /// Create a post, then start the suggestion request without waiting
    /// for it.
    pub async fn create_post(
        &self,
        draft: CreatePost,
    ) -> Result<(Post, SuggestionTask), ClientError> {
        require_text(&draft.title, "Title")?;
        require_text(&draft.content, "Content")?;

        let ticket = self.next_ticket();
        self.state.lock().await.posts.begin(ticket, draft.clone());

        match self.service.create_post(&draft).await {
            Ok(post) => {
                {
                    let mut state = self.state.lock().await;
                    state.posts.confirm(ticket, post.clone());
                    state.comments.entry(post.id).or_default();
                    state.corrections.entry(post.id).or_default();
                }
                let task = self.spawn_suggestion(&post);
                Ok((post, task))
            }
            Err(e) => {
                self.state.lock().await.posts.abandon(ticket);
                Err(e)
            }
        }
    }

    fn spawn_suggestion(&self, post: &Post) -> SuggestionTask {
        let store = self.clone();
        let post_id = post.id;

        let handle = tokio::spawn(async move {
            match store.service.suggest(post_id).await {
                Ok(suggestion) => {
                    store
                        .confirm_write(FieldWrite::Suggestion {
                            post_id,
                            text: suggestion.clone(),
                        })
                        .await;
                    Some(suggestion)
                }
                Err(e) => {
                    tracing::warn!(post_id, error = %e, "suggestion request failed");
                    None
                }
            }
        });

        SuggestionTask { handle }
    }

    pub async fn choose_best(&self, post_id: i64, correction_id: i64) -> Result<(), ClientError> {
        self.service.choose_best(post_id, correction_id).await?;
        self.confirm_write(FieldWrite::Best {
            post_id,
            correction_id,
        })
        .await;
        Ok(())
    }

    // ── Comments ──

    pub async fn create_comment(
        &self,
        post_id: i64,
        content: impl Into<String>,
    ) -> Result<Comment, ClientError> {
        let draft = CreateComment {
            post_id,
            content: content.into(),
        };
        require_text(&draft.content, "Comment")?;

        let ticket = self.next_ticket();
        self.state
            .lock()
            .await
            .comments
            .entry(post_id)
            .or_default()
            .begin(ticket, draft.clone());

        let result = self.service.create_comment(&draft).await;

        let mut state = self.state.lock().await;
        let timeline = state.comments.entry(post_id).or_default();
        match result {
            Ok(comment) => {
                timeline.confirm(ticket, comment.clone());
                Ok(comment)
            }
            Err(e) => {
                timeline.abandon(ticket);
                Err(e)
            }
        }
    }

    /// Vote on a comment and adopt the count the server reports.
    pub async fn vote_comment(
        &self,
        comment_id: i64,
        direction: VoteDirection,
    ) -> Result<i64, ClientError> {
        let resp = self.service.vote_comment(comment_id, direction).await?;
        self.record_vote(TargetKind::Comment, comment_id, &resp).await;
        Ok(resp.vote_count)
    }

    // ── Corrections ──

    pub async fn submit_correction(
        &self,
        post_id: i64,
        content: impl Into<String>,
        explanation: Option<String>,
    ) -> Result<Correction, ClientError> {
        let draft = CreateCorrection {
            post_id,
            content: content.into(),
            explanation,
        };
        require_text(&draft.content, "Correction")?;

        let ticket = self.next_ticket();
        self.state
            .lock()
            .await
            .corrections
            .entry(post_id)
            .or_default()
            .begin(ticket, draft.clone());

        let result = self.service.create_correction(&draft).await;

        let mut state = self.state.lock().await;
        let timeline = state.corrections.entry(post_id).or_default();
        match result {
            Ok(correction) => {
                timeline.confirm(ticket, correction.clone());
                Ok(correction)
            }
            Err(e) => {
                timeline.abandon(ticket);
                Err(e)
            }
        }
    }

    /// Toggle a vote on a correction and adopt the count the server reports.
    pub async fn vote_correction(
        &self,
        post_id: i64,
        correction_id: i64,
    ) -> Result<i64, ClientError> {
        let resp = self.service.vote_correction(post_id, correction_id).await?;
        self.record_vote(TargetKind::Correction, correction_id, &resp).await;
        Ok(resp.vote_count)
    }

    async fn record_vote(&self, kind: TargetKind, target_id: i64, resp: &VoteResponse) {
        let mut state = self.state.lock().await;
        let ticket = self.next_ticket();
        state.confirm_write(
            ticket,
            FieldWrite::Votes {
                kind,
                target_id,
                count: resp.vote_count,
            },
        );
        state.user_votes.insert((kind, target_id), resp.user_vote);
    }

    // ── Reads ──

    pub async fn posts(&self) -> Vec<Post> {
        self.state.lock().await.posts.items()
    }

    pub async fn post(&self, post_id: i64) -> Option<Post> {
        self.state.lock().await.posts.get(post_id).cloned()
    }

    pub async fn comments(&self, post_id: i64) -> Vec<Comment> {
        self.state
            .lock()
            .await
            .comments
            .get(&post_id)
            .map(Timeline::items)
            .unwrap_or_default()
    }

    pub async fn corrections(&self, post_id: i64) -> Vec<Correction> {
        self.state
            .lock()
            .await
            .corrections
            .get(&post_id)
            .map(Timeline::items)
            .unwrap_or_default()
    }

    pub async fn pending_posts(&self) -> usize {
        self.state.lock().await.posts.pending()
    }

    pub async fn pending_comments(&self, post_id: i64) -> usize {
        self.state
            .lock()
            .await
            .comments
            .get(&post_id)
            .map_or(0, Timeline::pending)
    }

    pub async fn pending_corrections(&self, post_id: i64) -> usize {
        self.state
            .lock()
            .await
            .corrections
            .get(&post_id)
            .map_or(0, Timeline::pending)
    }

    /// Why the last comment load for this post failed, if it did.
    pub async fn comment_load_error(&self, post_id: i64) -> Option<ClientError> {
        self.state
            .lock()
            .await
            .comment_errors
            .get(&post_id)
            .cloned()
    }

    /// This user's own vote as last reported by the server.
    pub async fn user_vote(&self, kind: TargetKind, target_id: i64) -> Option<i32> {
        self.state
            .lock()
            .await
            .user_votes
            .get(&(kind, target_id))
            .copied()
            .flatten()
    }
}
