use async_trait::async_trait;
use chrono::{DateTime, Utc};
use error_stack::{Report, Result, ResultExt};
use sqlx::FromRow;
use std::collections::HashMap;

use crate::database::{self, Connection, ErrorExt};
use crate::model::{
    Comment, LedgerChange, Post, PostContent, PostError, UserSnapshot, Vote, VoteAction, VoteValue,
};
use crate::storage::{post_not_found, PostRepository};
use crate::types::id::{
    marker::{CommentMarker, PostMarker, UserMarker},
    Id,
};

macro_rules! select_posts {
    ($($tail:literal)?) => {
        concat!(
            "SELECT id, title, kind, url, text, category, author_id, author_name, views, created_at FROM posts",
            $(" ", $tail)?
        )
    };
}

#[derive(Debug, FromRow)]
struct PostRow {
    id: Id<PostMarker>,
    title: String,
    kind: String,
    url: Option<String>,
    text: Option<String>,
    category: String,
    author_id: Id<UserMarker>,
    author_name: String,
    views: i64,
    created_at: DateTime<Utc>,
}

impl PostRow {
    fn into_post(self, comments: Vec<Comment>, votes: Vec<Vote>) -> Result<Post, PostError> {
        let content = match self.kind.as_str() {
            "text" => PostContent::Text {
                text: self.text.unwrap_or_default(),
            },
            "link" => PostContent::Link {
                url: self.url.unwrap_or_default(),
            },
            other => {
                return Err(Report::new(PostError::Storage)
                    .attach_printable(format!("post {} has unknown kind {other:?}", self.id)))
            }
        };

        let author = UserSnapshot {
            id: self.author_id,
            username: self.author_name,
        };

        Post::restore(
            self.id,
            self.title,
            u64::try_from(self.views).unwrap_or_default(),
            content,
            author,
            self.category,
            self.created_at,
            comments,
            votes,
        )
        .change_context(PostError::Storage)
    }
}

#[derive(Debug, FromRow)]
struct VoteRow {
    post_id: Id<PostMarker>,
    user_id: Id<UserMarker>,
    value: i16,
}

#[derive(Debug, FromRow)]
struct CommentRow {
    id: Id<CommentMarker>,
    post_id: Id<PostMarker>,
    author_id: Id<UserMarker>,
    author_name: String,
    body: String,
    created_at: DateTime<Utc>,
}

/// Posts spread over `posts`, `post_votes` and `post_comments`.
///
/// Mutations lock the post row for the whole transaction, apply the
/// change to the loaded aggregate and write back only what changed.
#[derive(Debug, Clone)]
pub struct PgPostRepository {
    pool: database::Pool,
}

impl PgPostRepository {
    #[must_use]
    pub fn new(pool: database::Pool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, query: &'static str, bind: Option<&str>) -> Result<Vec<Post>, PostError> {
        let mut conn = self.pool.get().await.change_context(PostError::Storage)?;

        let mut query = sqlx::query_as::<_, PostRow>(query);
        if let Some(bind) = bind {
            query = query.bind(bind);
        }

        let rows = query
            .fetch_all(&mut *conn)
            .await
            .into_db_error()
            .change_context(PostError::Storage)?;

        hydrate(&mut conn, rows).await
    }

    async fn begin(&self) -> Result<database::Transaction, PostError> {
        self.pool.begin().await.change_context(PostError::Storage)
    }
}

/// Loads votes and comments of every row.
async fn hydrate(conn: &mut Connection, rows: Vec<PostRow>) -> Result<Vec<Post>, PostError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids = rows.iter().map(|row| row.id).collect::<Vec<_>>();
    let vote_rows = sqlx::query_as::<_, VoteRow>(
        "SELECT post_id, user_id, value FROM post_votes WHERE post_id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await
    .into_db_error()
    .change_context(PostError::Storage)?;

    let comment_rows = sqlx::query_as::<_, CommentRow>(
        "SELECT id, post_id, author_id, author_name, body, created_at FROM post_comments \
         WHERE post_id = ANY($1) ORDER BY id",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await
    .into_db_error()
    .change_context(PostError::Storage)?;

    let mut votes: HashMap<Id<PostMarker>, Vec<Vote>> = HashMap::new();
    for row in vote_rows {
        let value = VoteValue::try_from(row.value).change_context(PostError::Storage)?;
        votes.entry(row.post_id).or_default().push(Vote {
            user_id: row.user_id,
            value,
        });
    }

    let mut comments: HashMap<Id<PostMarker>, Vec<Comment>> = HashMap::new();
    for row in comment_rows {
        comments.entry(row.post_id).or_default().push(Comment {
            id: row.id,
            created_at: row.created_at,
            author: UserSnapshot {
                id: row.author_id,
                username: row.author_name,
            },
            body: row.body,
        });
    }

    rows.into_iter()
        .map(|row| {
            let comments = comments.remove(&row.id).unwrap_or_default();
            let votes = votes.remove(&row.id).unwrap_or_default();
            row.into_post(comments, votes)
        })
        .collect()
}

/// Loads the post and keeps its row locked until the transaction ends.
async fn lock(conn: &mut Connection, id: Id<PostMarker>) -> Result<Post, PostError> {
    let row = sqlx::query_as::<_, PostRow>(select_posts!("WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .into_db_error()
        .change_context(PostError::Storage)?
        .ok_or_else(|| post_not_found(id))?;

    hydrate(conn, vec![row])
        .await?
        .pop()
        .ok_or_else(|| post_not_found(id))
}

async fn write_vote(
    conn: &mut Connection,
    post_id: Id<PostMarker>,
    change: LedgerChange,
) -> Result<(), PostError> {
    let query = match change {
        LedgerChange::Unchanged => return Ok(()),
        LedgerChange::Inserted(vote) | LedgerChange::Changed(vote) => sqlx::query(
            "INSERT INTO post_votes (post_id, user_id, value) VALUES ($1, $2, $3) \
             ON CONFLICT (post_id, user_id) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(post_id)
        .bind(vote.user_id)
        .bind(i16::from(vote.value)),
        LedgerChange::Removed(vote) => {
            sqlx::query("DELETE FROM post_votes WHERE post_id = $1 AND user_id = $2")
                .bind(post_id)
                .bind(vote.user_id)
        }
    };

    query
        .execute(conn)
        .await
        .into_db_error()
        .change_context(PostError::Storage)?;

    Ok(())
}

#[async_trait]
impl PostRepository for PgPostRepository {
    #[tracing::instrument(skip(self), name = "pg.posts.all")]
    async fn all(&self) -> Result<Vec<Post>, PostError> {
        self.fetch(select_posts!("ORDER BY id DESC"), None).await
    }

    #[tracing::instrument(skip(self), name = "pg.posts.by_id")]
    async fn by_id(&self, id: Id<PostMarker>) -> Result<Post, PostError> {
        let mut conn = self.pool.get().await.change_context(PostError::Storage)?;

        let row = sqlx::query_as::<_, PostRow>(
            "UPDATE posts SET views = views + 1 WHERE id = $1 \
             RETURNING id, title, kind, url, text, category, author_id, author_name, views, created_at",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .into_db_error()
        .change_context(PostError::Storage)?
        .ok_or_else(|| post_not_found(id))?;

        hydrate(&mut conn, vec![row])
            .await?
            .pop()
            .ok_or_else(|| post_not_found(id))
    }

    #[tracing::instrument(skip(self), name = "pg.posts.by_category")]
    async fn by_category(&self, category: &str) -> Result<Vec<Post>, PostError> {
        self.fetch(select_posts!("WHERE category = $1 ORDER BY id DESC"), Some(category))
            .await
    }

    #[tracing::instrument(skip(self), name = "pg.posts.by_author")]
    async fn by_author(&self, username: &str) -> Result<Vec<Post>, PostError> {
        self.fetch(select_posts!("WHERE author_name = $1 ORDER BY id DESC"), Some(username))
            .await
    }

    #[tracing::instrument(skip_all, fields(post.id = %post.id), name = "pg.posts.add")]
    async fn add(&self, post: Post) -> Result<Post, PostError> {
        let mut tx = self.begin().await?;

        sqlx::query(
            "INSERT INTO posts (id, title, kind, url, text, category, author_id, author_name, views, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(post.kind().as_str())
        .bind(post.content.url())
        .bind(post.content.text())
        .bind(&post.category)
        .bind(post.author.id)
        .bind(&post.author.username)
        .bind(i64::try_from(post.views).unwrap_or(i64::MAX))
        .bind(post.created_at)
        .execute(&mut *tx)
        .await
        .into_db_error()
        .change_context(PostError::Storage)?;

        for vote in post.votes() {
            write_vote(&mut tx, post.id, LedgerChange::Inserted(*vote)).await?;
        }
        for comment in post.comments() {
            insert_comment(&mut tx, post.id, comment).await?;
        }

        tx.commit()
            .await
            .into_db_error()
            .change_context(PostError::Storage)?;

        Ok(post)
    }

    #[tracing::instrument(skip(self, comment), name = "pg.posts.add_comment")]
    async fn add_comment(
        &self,
        post_id: Id<PostMarker>,
        comment: Comment,
    ) -> Result<Post, PostError> {
        let mut tx = self.begin().await?;
        let mut post = lock(&mut tx, post_id).await?;

        insert_comment(&mut tx, post_id, &comment).await?;
        post.add_comment(comment);

        tx.commit()
            .await
            .into_db_error()
            .change_context(PostError::Storage)?;

        Ok(post)
    }

    #[tracing::instrument(skip(self), name = "pg.posts.delete_comment")]
    async fn delete_comment(
        &self,
        post_id: Id<PostMarker>,
        comment_id: Id<CommentMarker>,
        requester: Id<UserMarker>,
    ) -> Result<Post, PostError> {
        let mut tx = self.begin().await?;
        let mut post = lock(&mut tx, post_id).await?;
        post.remove_comment(comment_id, requester)?;

        sqlx::query("DELETE FROM post_comments WHERE id = $1 AND post_id = $2")
            .bind(comment_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .into_db_error()
            .change_context(PostError::Storage)?;

        tx.commit()
            .await
            .into_db_error()
            .change_context(PostError::Storage)?;

        Ok(post)
    }

    #[tracing::instrument(skip(self), name = "pg.posts.vote")]
    async fn vote(
        &self,
        post_id: Id<PostMarker>,
        user_id: Id<UserMarker>,
        action: VoteAction,
    ) -> Result<Post, PostError> {
        let mut tx = self.begin().await?;
        let mut post = lock(&mut tx, post_id).await?;

        let change = post.vote(user_id, action);
        write_vote(&mut tx, post_id, change).await?;

        tx.commit()
            .await
            .into_db_error()
            .change_context(PostError::Storage)?;

        Ok(post)
    }

    #[tracing::instrument(skip(self), name = "pg.posts.delete")]
    async fn delete(
        &self,
        post_id: Id<PostMarker>,
        requester: Id<UserMarker>,
    ) -> Result<Post, PostError> {
        let mut tx = self.begin().await?;
        let post = lock(&mut tx, post_id).await?;
        post.ensure_deletable_by(requester)?;

        // votes and comments are removed along with it
        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await
            .into_db_error()
            .change_context(PostError::Storage)?;

        tx.commit()
            .await
            .into_db_error()
            .change_context(PostError::Storage)?;

        Ok(post)
    }
}

async fn insert_comment(
    conn: &mut Connection,
    post_id: Id<PostMarker>,
    comment: &Comment,
) -> Result<(), PostError> {
    sqlx::query(
        "INSERT INTO post_comments (id, post_id, author_id, author_name, body, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(comment.id)
    .bind(post_id)
    .bind(comment.author.id)
    .bind(&comment.author.username)
    .bind(&comment.body)
    .bind(comment.created_at)
    .execute(conn)
    .await
    .into_db_error()
    .change_context(PostError::Storage)?;

    Ok(())
}
