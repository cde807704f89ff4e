use chrono::{DateTime, Utc};
use serde::Serialize;

use super::UserSnapshot;
use crate::types::id::{marker::CommentMarker, Id};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
    pub author: UserSnapshot,
    pub body: String,
}

impl Comment {
    /// Creation time is taken from the snowflake ID.
    #[must_use]
    pub fn new(id: Id<CommentMarker>, author: UserSnapshot, body: String) -> Self {
        Self {
            id,
            created_at: id.created_at(),
            author,
            body,
        }
    }
}
