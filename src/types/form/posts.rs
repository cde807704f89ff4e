use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{field_checks, into_result, InvalidForm};
use crate::model::{PostContent, PostKind};
use crate::types::validation::{validate_category, validate_comment, validate_link, validate_title};

/// Data needed to publish a new post.
///
/// Both `url` and `text` may be sent, but only the one
/// that matches the post `type` survives creation.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct PostDraft {
    #[validate(custom = "validate_title")]
    pub title: String,
    #[serde(rename = "type")]
    pub kind: PostKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[validate(custom = "validate_category")]
    pub category: String,
}

impl PostDraft {
    #[must_use]
    pub fn text(
        title: impl Into<String>,
        category: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            kind: PostKind::Text,
            url: None,
            text: Some(text.into()),
            category: category.into(),
        }
    }

    #[must_use]
    pub fn link(
        title: impl Into<String>,
        category: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            kind: PostKind::Link,
            url: Some(url.into()),
            text: None,
            category: category.into(),
        }
    }

    /// The URL is only checked for link posts.
    pub fn validate(&self) -> error_stack::Result<(), InvalidForm> {
        let mut errors = field_checks(self);
        if self.kind == PostKind::Link {
            if let Err(error) = validate_link(self.url.as_deref()) {
                errors.add("url", error);
            }
        }
        into_result(&errors)
    }

    /// Keeps the payload that matches the post kind and drops the other one.
    #[must_use]
    pub fn content(&self) -> PostContent {
        match self.kind {
            PostKind::Text => PostContent::Text {
                text: self.text.clone().unwrap_or_default(),
            },
            PostKind::Link => PostContent::Link {
                url: self.url.clone().unwrap_or_default(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CommentDraft {
    #[validate(custom = "validate_comment")]
    pub comment: String,
}

impl CommentDraft {
    #[must_use]
    pub fn new(comment: impl Into<String>) -> Self {
        Self {
            comment: comment.into(),
        }
    }

    pub fn validate(&self) -> error_stack::Result<(), InvalidForm> {
        into_result(&field_checks(self))
    }
}
