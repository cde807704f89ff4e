use chrono::{DateTime, Utc};
use error_stack::{Report, Result, ResultExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::vote::{DuplicateVote, Ledger, LedgerChange, Vote, VoteAction, VoteValue};
use super::{Comment, UserSnapshot};
use crate::types::form::posts::PostDraft;
use crate::types::id::{
    marker::{CommentMarker, PostMarker, UserMarker},
    Id,
};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PostError {
    #[error("post not found")]
    NotFound,
    #[error("comment not found")]
    CommentNotFound,
    #[error("requester is not the author of this resource")]
    Forbidden,
    #[error("invalid post data")]
    Validation,
    #[error("failed to access post storage")]
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Text,
    Link,
}

impl PostKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Link => "link",
        }
    }
}

/// Payload of a post. Exactly one of them exists per post kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PostContent {
    Text { text: String },
    Link { url: String },
}

impl PostContent {
    #[must_use]
    pub fn kind(&self) -> PostKind {
        match self {
            Self::Text { .. } => PostKind::Text,
            Self::Link { .. } => PostKind::Link,
        }
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Link { url } => Some(url),
            Self::Text { .. } => None,
        }
    }

    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Link { .. } => None,
        }
    }
}

/// A post together with everything it exclusively owns: its
/// comments and its vote ledger.
///
/// Posts have no editable state besides views, comments and votes.
/// They can only be deleted by their author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Id<PostMarker>,
    pub title: String,
    pub views: u64,
    #[serde(flatten)]
    pub content: PostContent,
    pub author: UserSnapshot,
    pub category: String,
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
    comments: Vec<Comment>,
    #[serde(flatten)]
    ledger: Ledger,
}

impl Post {
    /// Publishes a draft under the given ID. The author's own upvote is
    /// recorded right away and the creation time comes from the ID.
    pub fn create(id: Id<PostMarker>, draft: PostDraft, author: UserSnapshot) -> Result<Self, PostError> {
        draft.validate().change_context(PostError::Validation)?;

        let content = draft.content();
        Ok(Self {
            id,
            title: draft.title,
            views: 0,
            content,
            category: draft.category,
            created_at: id.created_at(),
            comments: Vec::new(),
            ledger: Ledger::with_author(author.id),
            author,
        })
    }

    /// Reassembles a post from what storage kept about it.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: Id<PostMarker>,
        title: String,
        views: u64,
        content: PostContent,
        author: UserSnapshot,
        category: String,
        created_at: DateTime<Utc>,
        comments: Vec<Comment>,
        votes: Vec<Vote>,
    ) -> std::result::Result<Self, DuplicateVote> {
        Ok(Self {
            id,
            title,
            views,
            content,
            author,
            category,
            created_at,
            comments,
            ledger: Ledger::from_votes(votes)?,
        })
    }

    #[must_use]
    pub fn kind(&self) -> PostKind {
        self.content.kind()
    }

    #[must_use]
    pub fn is_authored_by(&self, user_id: Id<UserMarker>) -> bool {
        self.author.id == user_id
    }

    pub fn ensure_deletable_by(&self, requester: Id<UserMarker>) -> Result<(), PostError> {
        if self.is_authored_by(requester) {
            Ok(())
        } else {
            Err(Report::new(PostError::Forbidden)
                .attach_printable(format!("post {} is not authored by {requester}", self.id)))
        }
    }

    pub fn record_view(&mut self) {
        self.views = self.views.saturating_add(1);
    }

    // comments
    #[must_use]
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    #[must_use]
    pub fn comment(&self, id: Id<CommentMarker>) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    pub fn add_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
    }

    /// Only the author of the comment may delete it, regardless
    /// of who wrote the post.
    pub fn remove_comment(
        &mut self,
        id: Id<CommentMarker>,
        requester: Id<UserMarker>,
    ) -> Result<Comment, PostError> {
        let index = self
            .comments
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| {
                Report::new(PostError::CommentNotFound)
                    .attach_printable(format!("no comment {id} in post {}", self.id))
            })?;

        if self.comments[index].author.id != requester {
            return Err(Report::new(PostError::Forbidden)
                .attach_printable(format!("comment {id} is not authored by {requester}")));
        }

        Ok(self.comments.swap_remove(index))
    }

    // votes
    pub fn vote(&mut self, user_id: Id<UserMarker>, action: VoteAction) -> LedgerChange {
        self.ledger.apply(user_id, action)
    }

    pub fn upvote(&mut self, user_id: Id<UserMarker>) -> LedgerChange {
        self.vote(user_id, VoteAction::Upvote)
    }

    pub fn downvote(&mut self, user_id: Id<UserMarker>) -> LedgerChange {
        self.vote(user_id, VoteAction::Downvote)
    }

    pub fn unvote(&mut self, user_id: Id<UserMarker>) -> LedgerChange {
        self.vote(user_id, VoteAction::Unvote)
    }

    #[must_use]
    pub fn votes(&self) -> &[Vote] {
        self.ledger.votes()
    }

    #[must_use]
    pub fn vote_of(&self, user_id: Id<UserMarker>) -> Option<VoteValue> {
        self.ledger.vote_of(user_id)
    }

    #[must_use]
    pub fn score(&self) -> i64 {
        self.ledger.score()
    }

    #[must_use]
    pub fn upvote_percentage(&self) -> i64 {
        self.ledger.upvote_percentage()
    }
}
