use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::pagination::PageRequest;
use crate::domain::text_enum;
use crate::domain::user::UserSummary;

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

text_enum! {
    pub enum FeedbackCategory {
        Service => "service",
        Equipment => "equipment",
        Website => "website",
        Staff => "staff",
        Pricing => "pricing",
        Suggestion => "suggestion",
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: Uuid,
    /// `None` when the record is anonymous and shown in an admin view.
    pub user: Option<UserSummary>,
    pub subject: String,
    pub category: FeedbackCategory,
    pub rating: i32,
    pub message: String,
    pub is_anonymous: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub subject: String,
    pub category: FeedbackCategory,
    pub rating: i32,
    pub message: String,
    pub is_anonymous: bool,
}

/// Partial update: `None` keeps the stored value, `Some` replaces it.
#[derive(Debug, Clone, Default)]
pub struct FeedbackPatch {
    pub subject: Option<String>,
    pub category: Option<FeedbackCategory>,
    pub rating: Option<i32>,
    pub message: Option<String>,
    pub is_anonymous: Option<bool>,
}

impl FeedbackPatch {
    pub fn is_empty(&self) -> bool {
        self.subject.is_none()
            && self.category.is_none()
            && self.rating.is_none()
            && self.message.is_none()
            && self.is_anonymous.is_none()
    }
}

/// Normalized admin listing filter. `None` means "do not filter on this field".
#[derive(Debug, Clone, Default)]
pub struct FeedbackFilter {
    pub category: Option<FeedbackCategory>,
    pub rating: Option<i32>,
    pub search: Option<String>,
    pub page: PageRequest,
}

impl FeedbackFilter {
    /// Builds a filter from raw query values.
    ///
    /// Empty strings and `"all"` disable a filter; a blank search is ignored.
    /// Unknown categories and ratings outside 1..=5 are errors.
    pub fn from_raw(
        category: Option<&str>,
        rating: Option<&str>,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Self, String> {
        let category = match selector(category) {
            Some(value) => Some(
                FeedbackCategory::from_db(value)
                    .ok_or_else(|| format!("unknown category: {}", value))?,
            ),
            None => None,
        };

        let rating = match selector(rating) {
            Some(value) => {
                let rating = value
                    .parse::<i32>()
                    .map_err(|_| format!("invalid rating: {}", value))?;
                if !is_valid_rating(rating) {
                    return Err("rating must be between 1 and 5".to_string());
                }
                Some(rating)
            }
            None => None,
        };

        let search = search
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Ok(Self {
            category,
            rating,
            search,
            page,
        })
    }
}

fn selector(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("all"))
}

pub fn is_valid_rating(rating: i32) -> bool {
    (MIN_RATING..=MAX_RATING).contains(&rating)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RatingCount {
    pub rating: i32,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category: FeedbackCategory,
    pub count: i64,
    pub average_rating: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackStats {
    pub total_feedback: i64,
    pub overall_rating: f64,
    /// Descending by rating; only ratings that occur are listed.
    pub rating_breakdown: Vec<RatingCount>,
    /// Descending by count, ties broken by category name.
    pub category_breakdown: Vec<CategoryCount>,
    /// Records created within the last seven days.
    pub recent_feedback: i64,
}
