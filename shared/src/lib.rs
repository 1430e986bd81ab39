use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Posts ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Writing,
    Grammar,
    Vocabulary,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Writing, Category::Grammar, Category::Vocabulary];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Writing => "Writing",
            Category::Grammar => "Grammar",
            Category::Vocabulary => "Vocabulary",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub author_id: i64,
    pub created_at: String,
    /// Filled in later by the suggestion service, if ever.
    pub suggestion: Option<String>,
    pub best_correction_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePost {
    pub title: String,
    pub content: String,
    pub category: Category,
}

/// A post together with its corrections, ranked by votes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetail {
    pub post: Post,
    pub corrections: Vec<Correction>,
}

// ── Comments ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub content: String,
    pub created_at: String,
    pub vote_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateComment {
    pub post_id: i64,
    pub content: String,
}

// ── Corrections ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub content: String,
    pub explanation: Option<String>,
    pub created_at: String,
    pub vote_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCorrection {
    pub post_id: i64,
    pub content: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteCorrection {
    pub post_id: i64,
    pub correction_id: i64,
}

// ── Votes ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Comment,
    Correction,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Comment => "comment",
            TargetKind::Correction => "correction",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn value(self) -> i32 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastVote {
    pub comment_id: i64,
    pub direction: VoteDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResponse {
    pub vote_count: i64,
    /// The caller's own ledger entry after the call, if any.
    pub user_vote: Option<i32>,
}

// ── Suggestions ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestRequest {
    /// The suggestion is always computed from this post's stored body.
    pub post_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestResponse {
    pub suggestion: String,
}

// ── Errors ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
