use error_stack::ResultExt;

use crate::auth::Session;
use crate::http::Result;
use crate::model::{Comment, Post, PostError, VoteAction};
use crate::types::form::{CommentDraft, PostDraft};
use crate::types::id::{
    marker::{CommentMarker, PostMarker},
    Id,
};
use crate::App;

#[tracing::instrument(skip_all, name = "services.posts.list")]
pub async fn list(app: &App) -> Result<Vec<Post>> {
    Ok(app.posts.all().await?)
}

/// Counts as one view of the post.
#[tracing::instrument(skip(app), name = "services.posts.by_id")]
pub async fn by_id(app: &App, id: Id<PostMarker>) -> Result<Post> {
    Ok(app.posts.by_id(id).await?)
}

#[tracing::instrument(skip(app), name = "services.posts.by_category")]
pub async fn by_category(app: &App, category: &str) -> Result<Vec<Post>> {
    Ok(app.posts.by_category(category).await?)
}

#[tracing::instrument(skip(app), name = "services.posts.by_author")]
pub async fn by_author(app: &App, username: &str) -> Result<Vec<Post>> {
    Ok(app.posts.by_author(username).await?)
}

#[tracing::instrument(skip_all, fields(user.id = %session.user.id), name = "services.posts.create")]
pub async fn create(app: &App, session: &Session, draft: PostDraft) -> Result<Post> {
    let post = Post::create(app.snowflake.next_id(), draft, session.user.clone())?;
    let post = app.posts.add(post).await?;
    tracing::info!(post.id = %post.id, "published post");
    Ok(post)
}

#[tracing::instrument(skip_all, fields(user.id = %session.user.id, %post_id), name = "services.posts.comment")]
pub async fn comment(
    app: &App,
    session: &Session,
    post_id: Id<PostMarker>,
    draft: CommentDraft,
) -> Result<Post> {
    draft.validate().change_context(PostError::Validation)?;

    let comment = Comment::new(app.snowflake.next_id(), session.user.clone(), draft.comment);
    Ok(app.posts.add_comment(post_id, comment).await?)
}

#[tracing::instrument(skip_all, fields(user.id = %session.user.id, %post_id, %comment_id), name = "services.posts.delete_comment")]
pub async fn delete_comment(
    app: &App,
    session: &Session,
    post_id: Id<PostMarker>,
    comment_id: Id<CommentMarker>,
) -> Result<Post> {
    Ok(app
        .posts
        .delete_comment(post_id, comment_id, session.user.id)
        .await?)
}

#[tracing::instrument(skip_all, fields(user.id = %session.user.id, %post_id, ?action), name = "services.posts.vote")]
pub async fn vote(
    app: &App,
    session: &Session,
    post_id: Id<PostMarker>,
    action: VoteAction,
) -> Result<Post> {
    Ok(app.posts.vote(post_id, session.user.id, action).await?)
}

/// Only the author may delete a post. Returns the deleted post.
#[tracing::instrument(skip_all, fields(user.id = %session.user.id, %post_id), name = "services.posts.delete")]
pub async fn delete(app: &App, session: &Session, post_id: Id<PostMarker>) -> Result<Post> {
    let post = app.posts.delete(post_id, session.user.id).await?;
    tracing::info!("deleted post");
    Ok(post)
}
