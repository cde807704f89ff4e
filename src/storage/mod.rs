//! Persistence seams for posts, users and sessions.
//!
//! Every trait here has an in-memory implementation (see [`memory`]) and a
//! Postgres implementation (see [`postgres`]) satisfying the same contract.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use error_stack::Result;
use std::fmt::Debug;

use crate::auth::SessionError;
use crate::model::{Comment, Post, PostError, User, UserError, UserSnapshot, VoteAction};
use crate::types::form::Credentials;
use crate::types::id::{
    marker::{CommentMarker, PostMarker, UserMarker},
    Id,
};

pub mod memory;
pub mod postgres;

pub use self::memory::{MemoryPostRepository, MemorySessionStore, MemoryUserRepository};
pub use self::postgres::{PgPostRepository, PgSessionStore, PgUserRepository};

#[async_trait]
pub trait PostRepository: Debug + Send + Sync {
    async fn all(&self) -> Result<Vec<Post>, PostError>;

    /// Loads a post and counts the read as one view.
    async fn by_id(&self, id: Id<PostMarker>) -> Result<Post, PostError>;

    async fn by_category(&self, category: &str) -> Result<Vec<Post>, PostError>;

    async fn by_author(&self, username: &str) -> Result<Vec<Post>, PostError>;

    async fn add(&self, post: Post) -> Result<Post, PostError>;

    async fn add_comment(&self, post_id: Id<PostMarker>, comment: Comment)
        -> Result<Post, PostError>;

    async fn delete_comment(
        &self,
        post_id: Id<PostMarker>,
        comment_id: Id<CommentMarker>,
        requester: Id<UserMarker>,
    ) -> Result<Post, PostError>;

    async fn vote(
        &self,
        post_id: Id<PostMarker>,
        user_id: Id<UserMarker>,
        action: VoteAction,
    ) -> Result<Post, PostError>;

    /// Returns the deleted post.
    async fn delete(&self, post_id: Id<PostMarker>, requester: Id<UserMarker>)
        -> Result<Post, PostError>;

    async fn upvote(&self, post_id: Id<PostMarker>, user_id: Id<UserMarker>) -> Result<Post, PostError> {
        self.vote(post_id, user_id, VoteAction::Upvote).await
    }

    async fn downvote(&self, post_id: Id<PostMarker>, user_id: Id<UserMarker>) -> Result<Post, PostError> {
        self.vote(post_id, user_id, VoteAction::Downvote).await
    }

    async fn unvote(&self, post_id: Id<PostMarker>, user_id: Id<UserMarker>) -> Result<Post, PostError> {
        self.vote(post_id, user_id, VoteAction::Unvote).await
    }
}

#[async_trait]
pub trait UserRepository: Debug + Send + Sync {
    /// Creates a new user with a hashed password.
    async fn register(&self, credentials: &Credentials) -> Result<User, UserError>;

    /// Finds the user by username and checks the password.
    async fn authorize(&self, credentials: &Credentials) -> Result<User, UserError>;

    async fn by_id(&self, id: Id<UserMarker>) -> Result<User, UserError>;
}

/// Server-side half of a session, keyed by its token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: Id<UserMarker>,
    /// Snapshot taken at issuance. Only kept by stores living
    /// next to the process, durable stores leave it out.
    pub user: Option<UserSnapshot>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[async_trait]
pub trait SessionStore: Debug + Send + Sync {
    async fn insert(&self, record: SessionRecord) -> Result<(), SessionError>;

    async fn find(&self, token: &str) -> Result<Option<SessionRecord>, SessionError>;

    /// Returns whether a record was deleted.
    async fn delete(&self, token: &str) -> Result<bool, SessionError>;

    /// Deletes every record expired at `now` and returns how many.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, SessionError>;
}

pub(crate) fn post_not_found(id: Id<PostMarker>) -> error_stack::Report<PostError> {
    error_stack::Report::new(PostError::NotFound).attach_printable(format!("post {id} does not exist"))
}
