pub mod error;
pub mod service;
pub mod store;
pub mod timeline;

pub use error::ClientError;
pub use service::{FeedService, HttpFeedService};
pub use store::{FeedState, FeedStore, SuggestionTask};
