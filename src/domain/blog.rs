use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::feedback::{MAX_RATING, MIN_RATING};
use crate::domain::pagination::PageRequest;
use crate::domain::text_enum;

text_enum! {
    pub enum BlogCategory {
        CampingTips => "camping-tips",
        GearReviews => "gear-reviews",
        Destinations => "destinations",
        OutdoorCooking => "outdoor-cooking",
        Safety => "safety",
    }
}

text_enum! {
    pub enum PostStatus {
        Draft => "draft",
        Published => "published",
    }
}

text_enum! {
    pub enum CommentStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub content: String,
    pub category: BlogCategory,
    pub status: PostStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub published_date: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub image_key: Option<String>,
    /// Presigned URL for the image (populated at response time)
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(flatten)]
    pub stats: PostStats,
}

#[derive(Debug, Clone)]
pub struct NewBlogPost {
    pub title: String,
    pub author: String,
    pub content: String,
    pub category: BlogCategory,
    pub status: PostStatus,
    pub published_date: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Default)]
pub struct BlogPostPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub content: Option<String>,
    pub category: Option<BlogCategory>,
    pub status: Option<PostStatus>,
    pub published_date: Option<OffsetDateTime>,
}

/// An uploaded image that passed format and size checks.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub content_type: &'static str,
    pub extension: &'static str,
    pub bytes: bytes::Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct BlogPostFilter {
    pub status: Option<PostStatus>,
    pub category: Option<BlogCategory>,
    pub search: Option<String>,
    pub page: PageRequest,
}

/// Count of ratings per star value, 1 through 5.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatingDistribution {
    counts: [i64; 5],
}

impl RatingDistribution {
    pub fn record(&mut self, rating: i32, count: i64) {
        if (MIN_RATING..=MAX_RATING).contains(&rating) {
            self.counts[(rating - MIN_RATING) as usize] += count;
        }
    }

    pub fn count(&self, rating: i32) -> i64 {
        if (MIN_RATING..=MAX_RATING).contains(&rating) {
            self.counts[(rating - MIN_RATING) as usize]
        } else {
            0
        }
    }

    pub fn total(&self) -> i64 {
        self.counts.iter().sum()
    }
}

impl Serialize for RatingDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (index, count) in self.counts.iter().enumerate() {
            map.serialize_entry(&(index as i32 + MIN_RATING).to_string(), count)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum EngagementLevel {
    High,
    Low,
}

/// Interaction statistics derived from ratings, likes and comments.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostStats {
    pub average_rating: f64,
    pub total_ratings: i64,
    pub rating_distribution: RatingDistribution,
    pub total_likes: i64,
    pub total_comments: i64,
    pub total_engagement: i64,
    pub engagement_level: EngagementLevel,
}

impl PostStats {
    pub fn new(
        average_rating: f64,
        rating_distribution: RatingDistribution,
        total_likes: i64,
        total_comments: i64,
    ) -> Self {
        let total_ratings = rating_distribution.total();
        let engagement_level = if total_ratings > 0 || total_likes > 0 || total_comments > 0 {
            EngagementLevel::High
        } else {
            EngagementLevel::Low
        };
        Self {
            average_rating,
            total_ratings,
            rating_distribution,
            total_likes,
            total_comments,
            total_engagement: total_ratings + total_likes + total_comments,
            engagement_level,
        }
    }
}

impl Default for PostStats {
    fn default() -> Self {
        Self::new(0.0, RatingDistribution::default(), 0, 0)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogComment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub name: String,
    pub email: String,
    pub comment: String,
    pub status: CommentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub name: String,
    pub email: String,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlogCategoryCount {
    pub category: BlogCategory,
    pub count: i64,
}

/// Blog-wide dashboard figures.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlogStats {
    pub total_posts: i64,
    pub published_posts: i64,
    pub draft_posts: i64,
    pub total_comments: i64,
    pub pending_comments: i64,
    pub total_likes: i64,
    pub total_ratings: i64,
    pub average_rating: f64,
    pub category_breakdown: Vec<BlogCategoryCount>,
}
