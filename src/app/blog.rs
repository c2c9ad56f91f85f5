use anyhow::{anyhow, Result};
use bytes::Bytes;
use image::ImageFormat;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::app::query::{push_page, push_text_search};
use crate::domain::blog::{
    BlogCategory, BlogCategoryCount, BlogPost, BlogPostFilter, BlogPostPatch, BlogStats,
    ImageUpload, NewBlogPost, PostStats, PostStatus, RatingDistribution,
};
use crate::domain::pagination::Pagination;
use crate::infra::{db::Db, storage::ObjectStorage};

/// Post columns plus interaction figures aggregated per post.
const POST_SELECT: &str = "SELECT p.id, p.title, p.author, p.content, \
        p.category::text AS category, p.status::text AS status, p.published_date, \
        p.image_key, p.created_at, p.updated_at, \
        COALESCE(r.average_rating, 0) AS average_rating, \
        r.r1, r.r2, r.r3, r.r4, r.r5, \
        l.total_likes, c.total_comments \
     FROM blog_posts p \
     LEFT JOIN LATERAL ( \
        SELECT AVG(rating)::float8 AS average_rating, \
               COUNT(*) FILTER (WHERE rating = 1) AS r1, \
               COUNT(*) FILTER (WHERE rating = 2) AS r2, \
               COUNT(*) FILTER (WHERE rating = 3) AS r3, \
               COUNT(*) FILTER (WHERE rating = 4) AS r4, \
               COUNT(*) FILTER (WHERE rating = 5) AS r5 \
        FROM blog_ratings WHERE post_id = p.id \
     ) r ON TRUE \
     LEFT JOIN LATERAL ( \
        SELECT COUNT(*) AS total_likes FROM blog_likes WHERE post_id = p.id \
     ) l ON TRUE \
     LEFT JOIN LATERAL ( \
        SELECT COUNT(*) AS total_comments FROM blog_comments WHERE post_id = p.id \
     ) c ON TRUE";

#[derive(Clone)]
pub struct BlogService {
    db: Db,
    storage: ObjectStorage,
    image_url_ttl_seconds: u64,
}

impl BlogService {
    pub fn new(db: Db, storage: ObjectStorage, image_url_ttl_seconds: u64) -> Self {
        Self {
            db,
            storage,
            image_url_ttl_seconds,
        }
    }

    pub async fn create_post(
        &self,
        post: NewBlogPost,
        image: Option<ImageUpload>,
    ) -> Result<BlogPost> {
        let post_id = Uuid::new_v4();
        let image_key = match image {
            Some(image) => Some(self.store_image(post_id, image).await?),
            None => None,
        };

        let inserted = sqlx::query(
            "INSERT INTO blog_posts (id, title, author, content, category, status, published_date, image_key) \
             VALUES ($1, $2, $3, $4, $5::blog_category, $6::post_status, \
                     COALESCE($7, CASE WHEN $6::post_status = 'published' THEN now() END), $8)",
        )
        .bind(post_id)
        .bind(post.title)
        .bind(post.author)
        .bind(post.content)
        .bind(post.category.as_db())
        .bind(post.status.as_db())
        .bind(post.published_date)
        .bind(&image_key)
        .execute(self.db.pool())
        .await;

        if let Err(err) = inserted {
            if let Some(key) = image_key {
                self.discard_image(&key).await;
            }
            return Err(err.into());
        }

        tracing::info!(post_id = %post_id, "blog post created");

        self.get_post(post_id, true)
            .await?
            .ok_or_else(|| anyhow!("blog post {} missing after insert", post_id))
    }

    /// Drafts are only returned when `include_drafts` is set.
    pub async fn get_post(&self, post_id: Uuid, include_drafts: bool) -> Result<Option<BlogPost>> {
        let mut query = QueryBuilder::<Postgres>::new(POST_SELECT);
        query.push(" WHERE p.id = ").push_bind(post_id);
        if !include_drafts {
            query.push(" AND p.status = 'published'");
        }

        let row = query.build().fetch_optional(self.db.pool()).await?;
        let mut post = match row {
            Some(row) => post_from_row(&row)?,
            None => return Ok(None),
        };
        post.image_url = self.image_url(post.image_key.as_deref()).await;

        Ok(Some(post))
    }

    pub async fn list_posts(
        &self,
        filter: &BlogPostFilter,
        include_drafts: bool,
    ) -> Result<(Vec<BlogPost>, Pagination)> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM blog_posts p");
        push_post_filter(&mut count_query, filter, include_drafts);
        let total: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(self.db.pool())
            .await?;

        let mut query = QueryBuilder::<Postgres>::new(POST_SELECT);
        push_post_filter(&mut query, filter, include_drafts);
        query.push(" ORDER BY COALESCE(p.published_date, p.created_at) DESC, p.id DESC");
        push_page(&mut query, filter.page.limit, filter.page.offset());

        let rows = query.build().fetch_all(self.db.pool()).await?;
        let mut posts = rows
            .iter()
            .map(post_from_row)
            .collect::<Result<Vec<_>>>()?;

        let urls = futures::future::join_all(
            posts
                .iter()
                .map(|post| self.image_url(post.image_key.as_deref())),
        )
        .await;
        for (post, url) in posts.iter_mut().zip(urls) {
            post.image_url = url;
        }

        Ok((posts, Pagination::new(total, filter.page)))
    }

    /// Applies the patch and swaps the image when a new one is supplied.
    pub async fn update_post(
        &self,
        post_id: Uuid,
        patch: BlogPostPatch,
        image: Option<ImageUpload>,
    ) -> Result<Option<BlogPost>> {
        let previous_key: Option<Option<String>> =
            sqlx::query_scalar("SELECT image_key FROM blog_posts WHERE id = $1")
                .bind(post_id)
                .fetch_optional(self.db.pool())
                .await?;
        let Some(previous_key) = previous_key else {
            return Ok(None);
        };

        let new_key = match image {
            Some(image) => Some(self.store_image(post_id, image).await?),
            None => None,
        };

        let result = sqlx::query(
            "UPDATE blog_posts \
             SET title = COALESCE($2, title), \
                 author = COALESCE($3, author), \
                 content = COALESCE($4, content), \
                 category = COALESCE($5::blog_category, category), \
                 status = COALESCE($6::post_status, status), \
                 published_date = COALESCE($7, CASE \
                     WHEN COALESCE($6::post_status, status) = 'published' AND published_date IS NULL \
                     THEN now() ELSE published_date END), \
                 image_key = COALESCE($8, image_key), \
                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(post_id)
        .bind(patch.title)
        .bind(patch.author)
        .bind(patch.content)
        .bind(patch.category.map(|category| category.as_db()))
        .bind(patch.status.map(|status| status.as_db()))
        .bind(patch.published_date)
        .bind(&new_key)
        .execute(self.db.pool())
        .await;

        let updated = match result {
            Ok(result) => result.rows_affected() > 0,
            Err(err) => {
                if let Some(key) = new_key {
                    self.discard_image(&key).await;
                }
                return Err(err.into());
            }
        };

        if !updated {
            if let Some(key) = new_key {
                self.discard_image(&key).await;
            }
            return Ok(None);
        }

        if new_key.is_some() {
            if let Some(key) = previous_key {
                self.discard_image(&key).await;
            }
        }

        self.get_post(post_id, true).await
    }

    /// Comments, ratings and likes go with the post through `ON DELETE CASCADE`.
    pub async fn delete_post(&self, post_id: Uuid) -> Result<bool> {
        let deleted: Option<Option<String>> =
            sqlx::query_scalar("DELETE FROM blog_posts WHERE id = $1 RETURNING image_key")
                .bind(post_id)
                .fetch_optional(self.db.pool())
                .await?;

        match deleted {
            Some(image_key) => {
                if let Some(key) = image_key {
                    self.discard_image(&key).await;
                }
                tracing::info!(post_id = %post_id, "blog post deleted");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Dashboard figures, read from one snapshot so the category breakdown
    /// sums to `total_posts`.
    pub async fn stats(&self) -> Result<BlogStats> {
        let mut tx = self.db.pool().begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let totals = sqlx::query(
            "SELECT \
                (SELECT COUNT(*) FROM blog_posts) AS total_posts, \
                (SELECT COUNT(*) FROM blog_posts WHERE status = 'published') AS published_posts, \
                (SELECT COUNT(*) FROM blog_posts WHERE status = 'draft') AS draft_posts, \
                (SELECT COUNT(*) FROM blog_comments) AS total_comments, \
                (SELECT COUNT(*) FROM blog_comments WHERE status = 'pending') AS pending_comments, \
                (SELECT COUNT(*) FROM blog_likes) AS total_likes, \
                (SELECT COUNT(*) FROM blog_ratings) AS total_ratings, \
                (SELECT COALESCE(AVG(rating)::float8, 0) FROM blog_ratings) AS average_rating",
        )
        .fetch_one(&mut *tx)
        .await?;

        let by_category = sqlx::query(
            "SELECT category::text AS category, COUNT(*) AS count \
             FROM blog_posts \
             GROUP BY category \
             ORDER BY count DESC, category::text ASC",
        )
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut category_breakdown = Vec::with_capacity(by_category.len());
        for row in &by_category {
            let category: String = row.get("category");
            let category = BlogCategory::from_db(&category)
                .ok_or_else(|| anyhow!("unknown blog category: {}", category))?;
            category_breakdown.push(BlogCategoryCount {
                category,
                count: row.get("count"),
            });
        }

        Ok(BlogStats {
            total_posts: totals.get("total_posts"),
            published_posts: totals.get("published_posts"),
            draft_posts: totals.get("draft_posts"),
            total_comments: totals.get("total_comments"),
            pending_comments: totals.get("pending_comments"),
            total_likes: totals.get("total_likes"),
            total_ratings: totals.get("total_ratings"),
            average_rating: totals.get("average_rating"),
            category_breakdown,
        })
    }

    async fn store_image(&self, post_id: Uuid, image: ImageUpload) -> Result<String> {
        let key = format!("blog/{}/{}.{}", post_id, Uuid::new_v4(), image.extension);
        self.storage
            .put(&key, image.content_type, image.bytes)
            .await?;
        Ok(key)
    }

    async fn discard_image(&self, key: &str) {
        if let Err(err) = self.storage.delete(key).await {
            tracing::warn!(error = ?err, image_key = key, "failed to delete blog image");
        }
    }

    async fn image_url(&self, key: Option<&str>) -> Option<String> {
        let key = key?;
        match self
            .storage
            .presigned_get_url(key, self.image_url_ttl_seconds)
            .await
        {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::warn!(error = ?err, image_key = key, "failed to presign blog image");
                None
            }
        }
    }
}

/// Checks size and sniffs the format; only JPEG, PNG and WebP are accepted.
pub fn inspect_image(bytes: Bytes, max_bytes: usize) -> Result<ImageUpload, String> {
    if bytes.is_empty() {
        return Err("image is empty".to_string());
    }
    if bytes.len() > max_bytes {
        return Err(format!("image must be at most {} bytes", max_bytes));
    }

    let format = image::guess_format(&bytes).map_err(|_| "unrecognized image format".to_string())?;
    let (content_type, extension) = match format {
        ImageFormat::Jpeg => ("image/jpeg", "jpg"),
        ImageFormat::Png => ("image/png", "png"),
        ImageFormat::WebP => ("image/webp", "webp"),
        _ => return Err("image must be JPEG, PNG or WebP".to_string()),
    };

    image::load_from_memory_with_format(&bytes, format)
        .map_err(|err| format!("failed to decode image: {}", err))?;

    Ok(ImageUpload {
        content_type,
        extension,
        bytes,
    })
}

fn push_post_filter(
    builder: &mut QueryBuilder<'_, Postgres>,
    filter: &BlogPostFilter,
    include_drafts: bool,
) {
    builder.push(" WHERE TRUE");
    if !include_drafts {
        builder.push(" AND p.status = 'published'");
    } else if let Some(status) = filter.status {
        builder
            .push(" AND p.status = ")
            .push_bind(status.as_db())
            .push("::post_status");
    }
    if let Some(category) = filter.category {
        builder
            .push(" AND p.category = ")
            .push_bind(category.as_db())
            .push("::blog_category");
    }
    if let Some(search) = &filter.search {
        push_text_search(builder, &["p.title", "p.content", "p.author"], search);
    }
}

fn post_from_row(row: &PgRow) -> Result<BlogPost> {
    let category: String = row.get("category");
    let category = BlogCategory::from_db(&category)
        .ok_or_else(|| anyhow!("unknown blog category: {}", category))?;
    let status: String = row.get("status");
    let status =
        PostStatus::from_db(&status).ok_or_else(|| anyhow!("unknown post status: {}", status))?;

    let mut distribution = RatingDistribution::default();
    for (rating, column) in [(1, "r1"), (2, "r2"), (3, "r3"), (4, "r4"), (5, "r5")] {
        distribution.record(rating, row.get(column));
    }

    Ok(BlogPost {
        id: row.get("id"),
        title: row.get("title"),
        author: row.get("author"),
        content: row.get("content"),
        category,
        status,
        published_date: row.get("published_date"),
        image_key: row.get("image_key"),
        image_url: None,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        stats: PostStats::new(
            row.get("average_rating"),
            distribution,
            row.get("total_likes"),
            row.get("total_comments"),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes() -> Bytes {
        let mut buffer = Cursor::new(Vec::new());
        image::RgbImage::new(2, 2)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        Bytes::from(buffer.into_inner())
    }

    #[test]
    fn accepts_png_upload() {
        let upload = inspect_image(png_bytes(), 1024 * 1024).unwrap();
        assert_eq!(upload.content_type, "image/png");
        assert_eq!(upload.extension, "png");
    }

    #[test]
    fn rejects_oversized_and_unknown_payloads() {
        assert!(inspect_image(png_bytes(), 8).is_err());
        assert!(inspect_image(Bytes::from_static(b"not an image"), 1024).is_err());
        assert!(inspect_image(Bytes::new(), 1024).is_err());
    }

    #[test]
    fn public_listing_forces_published_status() {
        let filter = BlogPostFilter {
            status: Some(PostStatus::Draft),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM blog_posts p");
        push_post_filter(&mut builder, &filter, false);
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM blog_posts p WHERE TRUE AND p.status = 'published'"
        );
    }

    #[test]
    fn admin_listing_filters_by_requested_status() {
        let filter = BlogPostFilter {
            status: Some(PostStatus::Draft),
            category: Some(BlogCategory::Safety),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM blog_posts p");
        push_post_filter(&mut builder, &filter, true);
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM blog_posts p WHERE TRUE AND p.status = $1::post_status AND p.category = $2::blog_category"
        );
    }
}
