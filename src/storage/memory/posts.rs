use async_trait::async_trait;
use error_stack::Result;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::model::{Comment, Post, PostError, VoteAction};
use crate::storage::{post_not_found, PostRepository};
use crate::types::id::{
    marker::{CommentMarker, PostMarker, UserMarker},
    Id,
};

/// Every post lives behind a single lock. Reads share it while
/// each mutation holds it exclusively from lookup to write back.
#[derive(Debug, Default)]
pub struct MemoryPostRepository {
    posts: RwLock<HashMap<Id<PostMarker>, Post>>,
}

impl MemoryPostRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn filtered(&self, predicate: impl Fn(&Post) -> bool) -> Vec<Post> {
        let posts = self.posts.read().await;
        posts.values().filter(|p| predicate(p)).cloned().collect()
    }
}

#[async_trait]
impl PostRepository for MemoryPostRepository {
    #[tracing::instrument(skip(self), name = "memory.posts.all")]
    async fn all(&self) -> Result<Vec<Post>, PostError> {
        Ok(self.filtered(|_| true).await)
    }

    #[tracing::instrument(skip(self), name = "memory.posts.by_id")]
    async fn by_id(&self, id: Id<PostMarker>) -> Result<Post, PostError> {
        let mut posts = self.posts.write().await;
        let post = posts.get_mut(&id).ok_or_else(|| post_not_found(id))?;
        post.record_view();
        Ok(post.clone())
    }

    #[tracing::instrument(skip(self), name = "memory.posts.by_category")]
    async fn by_category(&self, category: &str) -> Result<Vec<Post>, PostError> {
        Ok(self.filtered(|p| p.category == category).await)
    }

    #[tracing::instrument(skip(self), name = "memory.posts.by_author")]
    async fn by_author(&self, username: &str) -> Result<Vec<Post>, PostError> {
        Ok(self.filtered(|p| p.author.username == username).await)
    }

    #[tracing::instrument(skip_all, fields(post.id = %post.id), name = "memory.posts.add")]
    async fn add(&self, post: Post) -> Result<Post, PostError> {
        let mut posts = self.posts.write().await;
        posts.insert(post.id, post.clone());
        Ok(post)
    }

    #[tracing::instrument(skip(self, comment), name = "memory.posts.add_comment")]
    async fn add_comment(
        &self,
        post_id: Id<PostMarker>,
        comment: Comment,
    ) -> Result<Post, PostError> {
        let mut posts = self.posts.write().await;
        let post = posts.get_mut(&post_id).ok_or_else(|| post_not_found(post_id))?;
        post.add_comment(comment);
        Ok(post.clone())
    }

    #[tracing::instrument(skip(self), name = "memory.posts.delete_comment")]
    async fn delete_comment(
        &self,
        post_id: Id<PostMarker>,
        comment_id: Id<CommentMarker>,
        requester: Id<UserMarker>,
    ) -> Result<Post, PostError> {
        let mut posts = self.posts.write().await;
        let post = posts.get_mut(&post_id).ok_or_else(|| post_not_found(post_id))?;
        post.remove_comment(comment_id, requester)?;
        Ok(post.clone())
    }

    #[tracing::instrument(skip(self), name = "memory.posts.vote")]
    async fn vote(
        &self,
        post_id: Id<PostMarker>,
        user_id: Id<UserMarker>,
        action: VoteAction,
    ) -> Result<Post, PostError> {
        let mut posts = self.posts.write().await;
        let post = posts.get_mut(&post_id).ok_or_else(|| post_not_found(post_id))?;
        post.vote(user_id, action);
        Ok(post.clone())
    }

    #[tracing::instrument(skip(self), name = "memory.posts.delete")]
    async fn delete(
        &self,
        post_id: Id<PostMarker>,
        requester: Id<UserMarker>,
    ) -> Result<Post, PostError> {
        let mut posts = self.posts.write().await;
        let post = posts.get(&post_id).ok_or_else(|| post_not_found(post_id))?;
        post.ensure_deletable_by(requester)?;
        posts.remove(&post_id).ok_or_else(|| post_not_found(post_id))
    }
}
