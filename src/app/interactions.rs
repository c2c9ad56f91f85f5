use anyhow::{anyhow, Result};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::blog::{BlogComment, CommentStatus, NewComment, PostStats, RatingDistribution};
use crate::infra::db::Db;

const COMMENT_COLUMNS: &str =
    "id, post_id, name, email, comment, status::text AS status, created_at";

/// Comments, ratings and likes attached to blog posts.
#[derive(Clone)]
pub struct InteractionService {
    db: Db,
}

impl InteractionService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn post_exists(&self, post_id: Uuid, include_drafts: bool) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
                SELECT 1 FROM blog_posts WHERE id = $1 AND ($2 OR status = 'published') \
             )",
        )
        .bind(post_id)
        .bind(include_drafts)
        .fetch_one(self.db.pool())
        .await?;
        Ok(exists)
    }

    /// New comments wait in `pending` until moderated. Returns `None` when the
    /// post does not exist or is not published.
    pub async fn add_comment(
        &self,
        post_id: Uuid,
        comment: NewComment,
    ) -> Result<Option<BlogComment>> {
        let row = sqlx::query(&format!(
            "INSERT INTO blog_comments (post_id, name, email, comment) \
             SELECT $1, $2, $3, $4 \
             WHERE EXISTS (SELECT 1 FROM blog_posts WHERE id = $1 AND status = 'published') \
             RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(post_id)
        .bind(comment.name)
        .bind(comment.email)
        .bind(comment.comment)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(comment_from_row).transpose()
    }

    /// Newest first. `status = None` returns every comment.
    pub async fn list_comments(
        &self,
        post_id: Uuid,
        status: Option<CommentStatus>,
    ) -> Result<Vec<BlogComment>> {
        let rows = sqlx::query(&format!(
            "SELECT {COMMENT_COLUMNS} \
             FROM blog_comments \
             WHERE post_id = $1 \
               AND ($2::comment_status IS NULL OR status = $2::comment_status) \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(post_id)
        .bind(status.map(|status| status.as_db()))
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(comment_from_row).collect()
    }

    pub async fn moderate_comment(
        &self,
        comment_id: Uuid,
        status: CommentStatus,
    ) -> Result<Option<BlogComment>> {
        let row = sqlx::query(&format!(
            "UPDATE blog_comments SET status = $2::comment_status \
             WHERE id = $1 \
             RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(comment_id)
        .bind(status.as_db())
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(comment_from_row).transpose()
    }

    pub async fn delete_comment(&self, comment_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM blog_comments WHERE id = $1")
            .bind(comment_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Inserts or replaces the caller's rating. Returns `false` when the post
    /// is not published.
    pub async fn rate_post(&self, post_id: Uuid, user_id: Uuid, rating: i32) -> Result<bool> {
        let row = sqlx::query(
            "INSERT INTO blog_ratings (post_id, user_id, rating) \
             SELECT $1, $2, $3 \
             WHERE EXISTS (SELECT 1 FROM blog_posts WHERE id = $1 AND status = 'published') \
             ON CONFLICT (post_id, user_id) \
             DO UPDATE SET rating = EXCLUDED.rating, updated_at = now() \
             RETURNING post_id",
        )
        .bind(post_id)
        .bind(user_id)
        .bind(rating)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.is_some())
    }

    /// Idempotent; returns whether a new like was recorded.
    pub async fn like_post(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO blog_likes (post_id, user_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(post_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn unlike_post(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM blog_likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn post_stats(&self, post_id: Uuid) -> Result<PostStats> {
        let pool = self.db.pool();

        let ratings = sqlx::query(
            "SELECT rating, COUNT(*) AS count FROM blog_ratings WHERE post_id = $1 GROUP BY rating",
        )
        .bind(post_id)
        .fetch_all(pool);

        let counts = sqlx::query(
            "SELECT \
                (SELECT COALESCE(AVG(rating)::float8, 0) FROM blog_ratings WHERE post_id = $1) AS average_rating, \
                (SELECT COUNT(*) FROM blog_likes WHERE post_id = $1) AS total_likes, \
                (SELECT COUNT(*) FROM blog_comments WHERE post_id = $1) AS total_comments",
        )
        .bind(post_id)
        .fetch_one(pool);

        let (ratings, counts) = tokio::try_join!(ratings, counts)?;

        let mut distribution = RatingDistribution::default();
        for row in &ratings {
            distribution.record(row.get("rating"), row.get("count"));
        }

        Ok(PostStats::new(
            counts.get("average_rating"),
            distribution,
            counts.get("total_likes"),
            counts.get("total_comments"),
        ))
    }
}

fn comment_from_row(row: &PgRow) -> Result<BlogComment> {
    let status: String = row.get("status");
    let status = CommentStatus::from_db(&status)
        .ok_or_else(|| anyhow!("unknown comment status: {}", status))?;

    Ok(BlogComment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        name: row.get("name"),
        email: row.get("email"),
        comment: row.get("comment"),
        status,
        created_at: row.get("created_at"),
    })
}
