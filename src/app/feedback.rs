use anyhow::{anyhow, Result};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::app::query::{push_page, push_text_search};
use crate::app::Guarded;
use crate::domain::feedback::{
    CategoryCount, Feedback, FeedbackCategory, FeedbackFilter, FeedbackPatch, FeedbackStats,
    NewFeedback, RatingCount,
};
use crate::domain::pagination::Pagination;
use crate::domain::user::{Actor, UserSummary};
use crate::infra::db::Db;

const FEEDBACK_COLUMNS: &str = "f.id, f.user_id, u.name AS user_name, u.email AS user_email, \
     f.subject, f.category::text AS category, f.rating, f.message, f.is_anonymous, \
     f.created_at, f.updated_at";

#[derive(Clone)]
pub struct FeedbackService {
    db: Db,
}

impl FeedbackService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create(&self, actor: &Actor, feedback: NewFeedback) -> Result<Feedback> {
        let row = sqlx::query(&format!(
            "WITH f AS ( \
                INSERT INTO feedback (user_id, subject, category, rating, message, is_anonymous) \
                VALUES ($1, $2, $3::feedback_category, $4, $5, $6) \
                RETURNING * \
             ) \
             SELECT {FEEDBACK_COLUMNS} FROM f JOIN users u ON u.id = f.user_id"
        ))
        .bind(actor.user_id)
        .bind(feedback.subject)
        .bind(feedback.category.as_db())
        .bind(feedback.rating)
        .bind(feedback.message)
        .bind(feedback.is_anonymous)
        .fetch_one(self.db.pool())
        .await?;

        feedback_from_row(&row, false)
    }

    pub async fn list_own(&self, actor: &Actor) -> Result<Vec<Feedback>> {
        let rows = sqlx::query(&format!(
            "SELECT {FEEDBACK_COLUMNS} \
             FROM feedback f \
             JOIN users u ON u.id = f.user_id \
             WHERE f.user_id = $1 \
             ORDER BY f.created_at DESC, f.id DESC"
        ))
        .bind(actor.user_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(|row| feedback_from_row(row, false)).collect()
    }

    /// Admin listing. Anonymous records come back without owner details.
    pub async fn list_all(&self, filter: &FeedbackFilter) -> Result<(Vec<Feedback>, Pagination)> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM feedback f");
        push_filter(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(self.db.pool())
            .await?;

        let mut query = list_query(filter);
        let rows = query.build().fetch_all(self.db.pool()).await?;

        let feedback = rows
            .iter()
            .map(|row| feedback_from_row(row, true))
            .collect::<Result<Vec<_>>>()?;

        Ok((feedback, Pagination::new(total, filter.page)))
    }

    /// Only the owner may edit. The row is locked for the check-then-write.
    pub async fn update(
        &self,
        feedback_id: Uuid,
        actor: &Actor,
        patch: FeedbackPatch,
    ) -> Result<Guarded<Feedback>> {
        let mut tx = self.db.pool().begin().await?;

        let owner_id: Option<Uuid> =
            sqlx::query_scalar("SELECT user_id FROM feedback WHERE id = $1 FOR UPDATE")
                .bind(feedback_id)
                .fetch_optional(&mut *tx)
                .await?;

        match owner_id {
            None => {
                tx.rollback().await?;
                return Ok(Guarded::NotFound);
            }
            Some(owner_id) if !actor.owns(owner_id) => {
                tx.rollback().await?;
                return Ok(Guarded::Forbidden);
            }
            Some(_) => {}
        }

        let row = sqlx::query(&format!(
            "WITH f AS ( \
                UPDATE feedback \
                SET subject = COALESCE($2, subject), \
                    category = COALESCE($3::feedback_category, category), \
                    rating = COALESCE($4, rating), \
                    message = COALESCE($5, message), \
                    is_anonymous = COALESCE($6, is_anonymous), \
                    updated_at = now() \
                WHERE id = $1 \
                RETURNING * \
             ) \
             SELECT {FEEDBACK_COLUMNS} FROM f JOIN users u ON u.id = f.user_id"
        ))
        .bind(feedback_id)
        .bind(patch.subject)
        .bind(patch.category.map(|category| category.as_db()))
        .bind(patch.rating)
        .bind(patch.message)
        .bind(patch.is_anonymous)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Guarded::Allowed(feedback_from_row(&row, false)?))
    }

    /// The owner or any admin may delete.
    pub async fn delete(&self, feedback_id: Uuid, actor: &Actor) -> Result<Guarded<()>> {
        let mut tx = self.db.pool().begin().await?;

        let owner_id: Option<Uuid> =
            sqlx::query_scalar("SELECT user_id FROM feedback WHERE id = $1 FOR UPDATE")
                .bind(feedback_id)
                .fetch_optional(&mut *tx)
                .await?;

        match owner_id {
            None => {
                tx.rollback().await?;
                return Ok(Guarded::NotFound);
            }
            Some(owner_id) if !actor.owns(owner_id) && !actor.is_admin() => {
                tx.rollback().await?;
                return Ok(Guarded::Forbidden);
            }
            Some(_) => {}
        }

        sqlx::query("DELETE FROM feedback WHERE id = $1")
            .bind(feedback_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Guarded::Allowed(()))
    }

    /// Dashboard figures. Every read shares one snapshot, and the totals come
    /// from the rating histogram so the breakdown always sums to the total.
    pub async fn stats(&self) -> Result<FeedbackStats> {
        let mut tx = self.db.pool().begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let by_rating = sqlx::query(
            "SELECT rating, COUNT(*) AS count \
             FROM feedback \
             GROUP BY rating \
             ORDER BY rating DESC",
        )
        .fetch_all(&mut *tx)
        .await?;

        let by_category = sqlx::query(
            "SELECT category::text AS category, COUNT(*) AS count, AVG(rating)::float8 AS average_rating \
             FROM feedback \
             GROUP BY category \
             ORDER BY count DESC, category::text ASC",
        )
        .fetch_all(&mut *tx)
        .await?;

        let recent = sqlx::query(
            "SELECT COUNT(*) AS recent FROM feedback \
             WHERE created_at >= now() - INTERVAL '7 days'",
        )
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let rating_breakdown: Vec<RatingCount> = by_rating
            .iter()
            .map(|row| RatingCount {
                rating: row.get("rating"),
                count: row.get("count"),
            })
            .collect();
        let (total_feedback, overall_rating) = rating_totals(&rating_breakdown);

        let mut category_breakdown = Vec::with_capacity(by_category.len());
        for row in &by_category {
            let category: String = row.get("category");
            let category = FeedbackCategory::from_db(&category)
                .ok_or_else(|| anyhow!("unknown feedback category: {}", category))?;
            category_breakdown.push(CategoryCount {
                category,
                count: row.get("count"),
                average_rating: row.get("average_rating"),
            });
        }

        Ok(FeedbackStats {
            total_feedback,
            overall_rating,
            rating_breakdown,
            category_breakdown,
            recent_feedback: recent.get("recent"),
        })
    }
}

/// Record count and mean rating from a rating histogram; the mean is 0 when empty.
fn rating_totals(breakdown: &[RatingCount]) -> (i64, f64) {
    let total: i64 = breakdown.iter().map(|entry| entry.count).sum();
    if total == 0 {
        return (0, 0.0);
    }
    let sum: i64 = breakdown
        .iter()
        .map(|entry| i64::from(entry.rating) * entry.count)
        .sum();
    (total, sum as f64 / total as f64)
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &FeedbackFilter) {
    builder.push(" WHERE TRUE");
    if let Some(category) = filter.category {
        builder
            .push(" AND f.category = ")
            .push_bind(category.as_db())
            .push("::feedback_category");
    }
    if let Some(rating) = filter.rating {
        builder.push(" AND f.rating = ").push_bind(rating);
    }
    if let Some(search) = &filter.search {
        push_text_search(builder, &["f.subject", "f.message"], search);
    }
}

fn list_query(filter: &FeedbackFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {FEEDBACK_COLUMNS} FROM feedback f JOIN users u ON u.id = f.user_id"
    ));
    push_filter(&mut builder, filter);
    builder.push(" ORDER BY f.created_at DESC, f.id DESC");
    push_page(&mut builder, filter.page.limit, filter.page.offset());
    builder
}

fn feedback_from_row(row: &PgRow, hide_anonymous: bool) -> Result<Feedback> {
    let category: String = row.get("category");
    let category = FeedbackCategory::from_db(&category)
        .ok_or_else(|| anyhow!("unknown feedback category: {}", category))?;
    let is_anonymous: bool = row.get("is_anonymous");

    let user = if hide_anonymous && is_anonymous {
        None
    } else {
        Some(UserSummary {
            id: row.get("user_id"),
            name: row.get("user_name"),
            email: row.get("user_email"),
        })
    };

    Ok(Feedback {
        id: row.get("id"),
        user,
        subject: row.get("subject"),
        category,
        rating: row.get("rating"),
        message: row.get("message"),
        is_anonymous,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pagination::PageRequest;

    #[test]
    fn unfiltered_listing_only_pages() {
        let builder = list_query(&FeedbackFilter::default());
        let sql = builder.sql();
        assert!(sql.contains("WHERE TRUE ORDER BY f.created_at DESC, f.id DESC"));
        assert!(sql.ends_with("LIMIT $1 OFFSET $2"));
    }

    #[test]
    fn filters_compose_in_order() {
        let filter = FeedbackFilter {
            category: Some(FeedbackCategory::Equipment),
            rating: Some(5),
            search: Some("tent".to_string()),
            page: PageRequest::new(Some(2), Some(5)).unwrap(),
        };
        let builder = list_query(&filter);
        let sql = builder.sql();
        assert!(sql.contains("f.category = $1::feedback_category"));
        assert!(sql.contains("AND f.rating = $2"));
        assert!(sql.contains("f.subject ILIKE $3 ESCAPE '\\' OR f.message ILIKE $4 ESCAPE '\\'"));
        assert!(sql.ends_with("LIMIT $5 OFFSET $6"));
    }

    #[test]
    fn totals_follow_the_rating_histogram() {
        assert_eq!(rating_totals(&[]), (0, 0.0));

        let breakdown = [
            RatingCount { rating: 5, count: 2 },
            RatingCount { rating: 4, count: 2 },
            RatingCount { rating: 1, count: 1 },
        ];
        assert_eq!(rating_totals(&breakdown), (5, 19.0 / 5.0));
    }

    #[test]
    fn count_query_shares_the_predicate() {
        let filter = FeedbackFilter {
            rating: Some(3),
            ..Default::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM feedback f");
        push_filter(&mut builder, &filter);
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM feedback f WHERE TRUE AND f.rating = $1"
        );
    }
}
