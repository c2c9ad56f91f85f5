use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::app::auth::AuthService;
use crate::app::blog::{inspect_image, BlogService};
use crate::app::feedback::FeedbackService;
use crate::app::interactions::InteractionService;
use crate::app::support::SupportService;
use crate::app::Guarded;
use crate::domain::blog::{
    BlogCategory, BlogComment, BlogPost, BlogPostFilter, BlogPostPatch, BlogStats, CommentStatus,
    ImageUpload, NewBlogPost, NewComment, PostStats, PostStatus,
};
use crate::domain::feedback::{
    is_valid_rating, Feedback, FeedbackCategory, FeedbackFilter, FeedbackPatch, FeedbackStats,
    NewFeedback,
};
use crate::domain::pagination::{PageRequest, Pagination};
use crate::domain::support::{
    NewTicket, SupportTicket, TicketCategory, TicketFilter, TicketPriority, TicketStatus,
};
use crate::domain::user::{Actor, User};
use crate::http::extract::{ApiJson, ApiPath, ApiQuery};
use crate::http::validation::{
    choice, email, filter_choice, optional_choice, optional_text, required_text,
};
use crate::http::{AdminUser, AppError, AuthUser};
use crate::AppState;

const SUBJECT_MAX_CHARS: usize = 200;
const FEEDBACK_MESSAGE_MAX_CHARS: usize = 2000;
const TICKET_DESCRIPTION_MAX_CHARS: usize = 5000;
const POST_TITLE_MAX_CHARS: usize = 200;
const POST_AUTHOR_MAX_CHARS: usize = 100;
const POST_CONTENT_MAX_CHARS: usize = 50_000;
const COMMENT_NAME_MAX_CHARS: usize = 100;
const COMMENT_MAX_CHARS: usize = 1000;
const MAX_PASSWORD_LEN: usize = 128;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    database: &'static str,
    redis: &'static str,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

impl MessageResponse {
    fn ok(message: &'static str) -> Json<Self> {
        Json(Self {
            success: true,
            message,
        })
    }
}

#[derive(Deserialize)]
pub struct ConfirmQuery {
    pub confirm: Option<bool>,
}

fn require_confirmation(query: &ConfirmQuery) -> Result<(), AppError> {
    if query.confirm != Some(true) {
        return Err(AppError::bad_request(
            "deletion must be confirmed with confirm=true",
        ));
    }
    Ok(())
}

fn page_request(page: Option<i64>, limit: Option<i64>) -> Result<PageRequest, AppError> {
    PageRequest::new(page, limit).map_err(AppError::bad_request)
}

fn status_label(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "unavailable"
    }
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        database: status_label(db),
        redis: status_label(redis),
    })
}

// ============================================================================
// Auth Handlers
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub user: User,
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let service = AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.access_ttl_minutes,
    );
    let session = service
        .login(&payload.email, &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match session {
        Some((token, user)) => Ok(Json(LoginResponse {
            success: true,
            token: token.token,
            expires_at: token.expires_at,
            user,
        })),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

// ============================================================================
// Feedback Handlers
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFeedbackRequest {
    pub subject: String,
    pub category: String,
    pub rating: i32,
    pub message: String,
    #[serde(default)]
    pub is_anonymous: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFeedbackRequest {
    pub subject: Option<String>,
    pub category: Option<String>,
    pub rating: Option<i32>,
    pub message: Option<String>,
    pub is_anonymous: Option<bool>,
}

#[derive(Deserialize)]
pub struct FeedbackListQuery {
    pub category: Option<String>,
    pub rating: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct FeedbackResponse {
    pub success: bool,
    pub message: &'static str,
    pub feedback: Feedback,
}

#[derive(Serialize)]
pub struct FeedbackListResponse {
    pub success: bool,
    pub feedback: Vec<Feedback>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

#[derive(Serialize)]
pub struct FeedbackStatsResponse {
    pub success: bool,
    pub stats: FeedbackStats,
}

fn validate_rating(rating: i32) -> Result<i32, AppError> {
    if !is_valid_rating(rating) {
        return Err(AppError::bad_request("rating must be between 1 and 5"));
    }
    Ok(rating)
}

pub async fn create_feedback(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(payload): ApiJson<CreateFeedbackRequest>,
) -> Result<(StatusCode, Json<FeedbackResponse>), AppError> {
    let feedback = NewFeedback {
        subject: required_text("subject", &payload.subject, SUBJECT_MAX_CHARS)?,
        category: choice("category", &payload.category, FeedbackCategory::from_db)?,
        rating: validate_rating(payload.rating)?,
        message: required_text("message", &payload.message, FEEDBACK_MESSAGE_MAX_CHARS)?,
        is_anonymous: payload.is_anonymous,
    };

    let service = FeedbackService::new(state.db.clone());
    let feedback = service.create(&actor, feedback).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %actor.user_id, "failed to create feedback");
        AppError::internal("failed to submit feedback")
    })?;

    Ok((
        StatusCode::CREATED,
        Json(FeedbackResponse {
            success: true,
            message: "Feedback submitted successfully",
            feedback,
        }),
    ))
}

pub async fn list_my_feedback(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<Json<FeedbackListResponse>, AppError> {
    let service = FeedbackService::new(state.db.clone());
    let feedback = service.list_own(&actor).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %actor.user_id, "failed to list own feedback");
        AppError::internal("failed to load feedback")
    })?;

    Ok(Json(FeedbackListResponse {
        success: true,
        feedback,
        pagination: None,
    }))
}

/// Admin listing. `category` and `rating` filter exactly unless empty or
/// `all`. A rating outside 1..=5 can never match, so it is rejected with 400
/// instead of returning an empty page.
pub async fn list_all_feedback(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    ApiQuery(query): ApiQuery<FeedbackListQuery>,
) -> Result<Json<FeedbackListResponse>, AppError> {
    let page = page_request(query.page, query.limit)?;
    let filter = FeedbackFilter::from_raw(
        query.category.as_deref(),
        query.rating.as_deref(),
        query.search.as_deref(),
        page,
    )
    .map_err(AppError::bad_request)?;

    let service = FeedbackService::new(state.db.clone());
    let (feedback, pagination) = service.list_all(&filter).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list feedback");
        AppError::internal("failed to load feedback")
    })?;

    Ok(Json(FeedbackListResponse {
        success: true,
        feedback,
        pagination: Some(pagination),
    }))
}

pub async fn feedback_stats(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<FeedbackStatsResponse>, AppError> {
    let service = FeedbackService::new(state.db.clone());
    let stats = service.stats().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to compute feedback stats");
        AppError::internal("failed to load feedback statistics")
    })?;

    Ok(Json(FeedbackStatsResponse {
        success: true,
        stats,
    }))
}

pub async fn update_feedback(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(feedback_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateFeedbackRequest>,
) -> Result<Json<FeedbackResponse>, AppError> {
    let patch = FeedbackPatch {
        subject: optional_text("subject", payload.subject.as_deref(), SUBJECT_MAX_CHARS)?,
        category: optional_choice(
            "category",
            payload.category.as_deref(),
            FeedbackCategory::from_db,
        )?,
        rating: payload.rating.map(validate_rating).transpose()?,
        message: optional_text(
            "message",
            payload.message.as_deref(),
            FEEDBACK_MESSAGE_MAX_CHARS,
        )?,
        is_anonymous: payload.is_anonymous,
    };
    if patch.is_empty() {
        return Err(AppError::bad_request("no fields to update"));
    }

    let service = FeedbackService::new(state.db.clone());
    let outcome = service
        .update(feedback_id, &actor, patch)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, feedback_id = %feedback_id, "failed to update feedback");
            AppError::internal("failed to update feedback")
        })?;

    match outcome {
        Guarded::Allowed(feedback) => Ok(Json(FeedbackResponse {
            success: true,
            message: "Feedback updated successfully",
            feedback,
        })),
        Guarded::NotFound => Err(AppError::not_found("Feedback not found")),
        Guarded::Forbidden => Err(AppError::forbidden("You can only update your own feedback")),
    }
}

pub async fn delete_feedback(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(feedback_id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    remove_feedback(&state, actor, feedback_id).await
}

pub async fn admin_delete_feedback(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(feedback_id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    let response = remove_feedback(&state, admin, feedback_id).await?;
    tracing::info!(admin_id = %admin.user_id, feedback_id = %feedback_id, "feedback deleted by admin");
    Ok(response)
}

async fn remove_feedback(
    state: &AppState,
    actor: Actor,
    feedback_id: Uuid,
) -> Result<Json<MessageResponse>, AppError> {
    let service = FeedbackService::new(state.db.clone());
    let outcome = service.delete(feedback_id, &actor).await.map_err(|err| {
        tracing::error!(error = ?err, feedback_id = %feedback_id, "failed to delete feedback");
        AppError::internal("failed to delete feedback")
    })?;

    match outcome {
        Guarded::Allowed(()) => Ok(MessageResponse::ok("Feedback deleted successfully")),
        Guarded::NotFound => Err(AppError::not_found("Feedback not found")),
        Guarded::Forbidden => Err(AppError::forbidden("You can only delete your own feedback")),
    }
}

// ============================================================================
// Blog Post Handlers
// ============================================================================

#[derive(Deserialize)]
pub struct BlogListQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct BlogPostResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub post: BlogPost,
}

#[derive(Serialize)]
pub struct BlogListResponse {
    pub success: bool,
    pub posts: Vec<BlogPost>,
    pub pagination: Pagination,
}

#[derive(Serialize)]
pub struct BlogStatsResponse {
    pub success: bool,
    pub stats: BlogStats,
}

/// Raw multipart fields of a post form, before validation.
#[derive(Default)]
struct PostForm {
    title: Option<String>,
    author: Option<String>,
    content: Option<String>,
    category: Option<String>,
    status: Option<String>,
    published_date: Option<String>,
    image: Option<Bytes>,
}

async fn read_post_form(mut multipart: Multipart) -> Result<PostForm, AppError> {
    let mut form = PostForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(err.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let bytes = field
                .bytes()
                .await
                .map_err(|err| AppError::bad_request(err.body_text()))?;
            if !bytes.is_empty() {
                form.image = Some(bytes);
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|err| AppError::bad_request(err.body_text()))?;
        match name.as_str() {
            "title" => form.title = Some(value),
            "author" => form.author = Some(value),
            "content" => form.content = Some(value),
            "category" => form.category = Some(value),
            "status" => form.status = Some(value),
            "publishedDate" => form.published_date = Some(value),
            _ => {}
        }
    }

    Ok(form)
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
fn parse_published_date(value: &str) -> Result<OffsetDateTime, AppError> {
    let value = value.trim();
    if let Ok(timestamp) = OffsetDateTime::parse(value, &Rfc3339) {
        return Ok(timestamp);
    }
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .map(|date| date.midnight().assume_utc())
        .map_err(|_| AppError::bad_request("publishedDate must be an RFC 3339 timestamp or YYYY-MM-DD"))
}

fn form_image(state: &AppState, image: Option<Bytes>) -> Result<Option<ImageUpload>, AppError> {
    image
        .map(|bytes| inspect_image(bytes, state.image_max_bytes).map_err(AppError::bad_request))
        .transpose()
}

fn blog_service(state: &AppState) -> BlogService {
    BlogService::new(
        state.db.clone(),
        state.storage.clone(),
        state.image_url_ttl_seconds,
    )
}

pub async fn list_blog_posts(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    ApiQuery(query): ApiQuery<BlogListQuery>,
) -> Result<Json<BlogListResponse>, AppError> {
    let include_drafts = viewer.map(|AuthUser(actor)| actor.is_admin()).unwrap_or(false);
    let filter = BlogPostFilter {
        status: filter_choice("status", query.status.as_deref(), PostStatus::from_db)?,
        category: filter_choice("category", query.category.as_deref(), BlogCategory::from_db)?,
        search: query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string),
        page: page_request(query.page, query.limit)?,
    };

    let (posts, pagination) = blog_service(&state)
        .list_posts(&filter, include_drafts)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list blog posts");
            AppError::internal("failed to load blog posts")
        })?;

    Ok(Json(BlogListResponse {
        success: true,
        posts,
        pagination,
    }))
}

pub async fn get_blog_post(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> Result<Json<BlogPostResponse>, AppError> {
    let include_drafts = viewer.map(|AuthUser(actor)| actor.is_admin()).unwrap_or(false);
    let post = blog_service(&state)
        .get_post(post_id, include_drafts)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to get blog post");
            AppError::internal("failed to load blog post")
        })?
        .ok_or_else(|| AppError::not_found("Blog post not found"))?;

    Ok(Json(BlogPostResponse {
        success: true,
        message: None,
        post,
    }))
}

pub async fn create_blog_post(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<BlogPostResponse>), AppError> {
    let form = read_post_form(multipart).await?;

    let post = NewBlogPost {
        title: required_text(
            "title",
            form.title.as_deref().unwrap_or_default(),
            POST_TITLE_MAX_CHARS,
        )?,
        author: required_text(
            "author",
            form.author.as_deref().unwrap_or_default(),
            POST_AUTHOR_MAX_CHARS,
        )?,
        content: required_text(
            "content",
            form.content.as_deref().unwrap_or_default(),
            POST_CONTENT_MAX_CHARS,
        )?,
        category: choice(
            "category",
            form.category.as_deref().unwrap_or_default(),
            BlogCategory::from_db,
        )?,
        status: optional_choice("status", form.status.as_deref(), PostStatus::from_db)?
            .unwrap_or(PostStatus::Draft),
        published_date: form
            .published_date
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .map(parse_published_date)
            .transpose()?,
    };
    let image = form_image(&state, form.image)?;

    let post = blog_service(&state)
        .create_post(post, image)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, admin_id = %admin.user_id, "failed to create blog post");
            AppError::internal("failed to create blog post")
        })?;

    Ok((
        StatusCode::CREATED,
        Json(BlogPostResponse {
            success: true,
            message: Some("Blog post created successfully"),
            post,
        }),
    ))
}

pub async fn update_blog_post(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(post_id): ApiPath<Uuid>,
    multipart: Multipart,
) -> Result<Json<BlogPostResponse>, AppError> {
    let form = read_post_form(multipart).await?;

    let patch = BlogPostPatch {
        title: optional_text("title", form.title.as_deref(), POST_TITLE_MAX_CHARS)?,
        author: optional_text("author", form.author.as_deref(), POST_AUTHOR_MAX_CHARS)?,
        content: optional_text("content", form.content.as_deref(), POST_CONTENT_MAX_CHARS)?,
        category: optional_choice("category", form.category.as_deref(), BlogCategory::from_db)?,
        status: optional_choice("status", form.status.as_deref(), PostStatus::from_db)?,
        published_date: form
            .published_date
            .as_deref()
            .map(parse_published_date)
            .transpose()?,
    };
    let image = form_image(&state, form.image)?;

    let unchanged = patch.title.is_none()
        && patch.author.is_none()
        && patch.content.is_none()
        && patch.category.is_none()
        && patch.status.is_none()
        && patch.published_date.is_none()
        && image.is_none();
    if unchanged {
        return Err(AppError::bad_request("no fields to update"));
    }

    let post = blog_service(&state)
        .update_post(post_id, patch, image)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to update blog post");
            AppError::internal("failed to update blog post")
        })?
        .ok_or_else(|| AppError::not_found("Blog post not found"))?;

    tracing::info!(admin_id = %admin.user_id, post_id = %post_id, "blog post updated");

    Ok(Json(BlogPostResponse {
        success: true,
        message: Some("Blog post updated successfully"),
        post,
    }))
}

pub async fn delete_blog_post(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiQuery(confirm): ApiQuery<ConfirmQuery>,
) -> Result<Json<MessageResponse>, AppError> {
    require_confirmation(&confirm)?;

    let deleted = blog_service(&state)
        .delete_post(post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to delete blog post");
            AppError::internal("failed to delete blog post")
        })?;

    if !deleted {
        return Err(AppError::not_found("Blog post not found"));
    }

    tracing::info!(admin_id = %admin.user_id, post_id = %post_id, "blog post deleted by admin");
    Ok(MessageResponse::ok("Blog post deleted successfully"))
}

pub async fn blog_stats(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<BlogStatsResponse>, AppError> {
    let stats = blog_service(&state).stats().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to compute blog stats");
        AppError::internal("failed to load blog statistics")
    })?;

    Ok(Json(BlogStatsResponse {
        success: true,
        stats,
    }))
}

// ============================================================================
// Blog Interaction Handlers
// ============================================================================

#[derive(Deserialize)]
pub struct CommentListQuery {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub name: String,
    pub email: String,
    pub comment: String,
}

#[derive(Deserialize)]
pub struct ModerateCommentRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct RatePostRequest {
    pub rating: i32,
}

#[derive(Serialize)]
pub struct CommentResponse {
    pub success: bool,
    pub message: &'static str,
    pub comment: BlogComment,
}

#[derive(Serialize)]
pub struct CommentListResponse {
    pub success: bool,
    pub comments: Vec<BlogComment>,
}

#[derive(Serialize)]
pub struct PostStatsResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
    pub stats: PostStats,
}

async fn ensure_published(service: &InteractionService, post_id: Uuid) -> Result<(), AppError> {
    let exists = service.post_exists(post_id, false).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %post_id, "failed to look up blog post");
        AppError::internal("failed to load blog post")
    })?;
    if !exists {
        return Err(AppError::not_found("Blog post not found"));
    }
    Ok(())
}

async fn fresh_stats(
    service: &InteractionService,
    post_id: Uuid,
    liked: Option<bool>,
) -> Result<Json<PostStatsResponse>, AppError> {
    let stats = service.post_stats(post_id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %post_id, "failed to compute post stats");
        AppError::internal("failed to load post statistics")
    })?;

    Ok(Json(PostStatsResponse {
        success: true,
        liked,
        stats,
    }))
}

pub async fn list_comments(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<CommentListQuery>,
) -> Result<Json<CommentListResponse>, AppError> {
    let is_admin = viewer.map(|AuthUser(actor)| actor.is_admin()).unwrap_or(false);
    let status = if is_admin {
        filter_choice("status", query.status.as_deref(), CommentStatus::from_db)?
    } else {
        Some(CommentStatus::Approved)
    };

    let service = InteractionService::new(state.db.clone());
    let exists = service.post_exists(post_id, is_admin).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %post_id, "failed to look up blog post");
        AppError::internal("failed to load blog post")
    })?;
    if !exists {
        return Err(AppError::not_found("Blog post not found"));
    }

    let comments = service
        .list_comments(post_id, status)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to list comments");
            AppError::internal("failed to load comments")
        })?;

    Ok(Json(CommentListResponse {
        success: true,
        comments,
    }))
}

pub async fn add_comment(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), AppError> {
    let comment = NewComment {
        name: required_text("name", &payload.name, COMMENT_NAME_MAX_CHARS)?,
        email: email(&payload.email)?,
        comment: required_text("comment", &payload.comment, COMMENT_MAX_CHARS)?,
    };

    let service = InteractionService::new(state.db.clone());
    let comment = service
        .add_comment(post_id, comment)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to add comment");
            AppError::internal("failed to submit comment")
        })?
        .ok_or_else(|| AppError::not_found("Blog post not found"))?;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            success: true,
            message: "Comment submitted and awaiting moderation",
            comment,
        }),
    ))
}

pub async fn moderate_comment(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(comment_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<ModerateCommentRequest>,
) -> Result<Json<CommentResponse>, AppError> {
    let status = choice("status", &payload.status, CommentStatus::from_db)?;

    let service = InteractionService::new(state.db.clone());
    let comment = service
        .moderate_comment(comment_id, status)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %comment_id, "failed to moderate comment");
            AppError::internal("failed to moderate comment")
        })?
        .ok_or_else(|| AppError::not_found("Comment not found"))?;

    tracing::info!(
        admin_id = %admin.user_id,
        comment_id = %comment_id,
        status = %status,
        "comment moderated"
    );

    Ok(Json(CommentResponse {
        success: true,
        message: "Comment status updated",
        comment,
    }))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(comment_id): ApiPath<Uuid>,
    ApiQuery(confirm): ApiQuery<ConfirmQuery>,
) -> Result<Json<MessageResponse>, AppError> {
    require_confirmation(&confirm)?;

    let service = InteractionService::new(state.db.clone());
    let deleted = service.delete_comment(comment_id).await.map_err(|err| {
        tracing::error!(error = ?err, comment_id = %comment_id, "failed to delete comment");
        AppError::internal("failed to delete comment")
    })?;

    if !deleted {
        return Err(AppError::not_found("Comment not found"));
    }

    tracing::info!(admin_id = %admin.user_id, comment_id = %comment_id, "comment deleted by admin");
    Ok(MessageResponse::ok("Comment deleted successfully"))
}

pub async fn rate_post(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<RatePostRequest>,
) -> Result<Json<PostStatsResponse>, AppError> {
    let rating = validate_rating(payload.rating)?;

    let service = InteractionService::new(state.db.clone());
    let rated = service
        .rate_post(post_id, actor.user_id, rating)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to rate post");
            AppError::internal("failed to rate post")
        })?;
    if !rated {
        return Err(AppError::not_found("Blog post not found"));
    }

    fresh_stats(&service, post_id, None).await
}

pub async fn like_post(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(post_id): ApiPath<Uuid>,
) -> Result<Json<PostStatsResponse>, AppError> {
    let service = InteractionService::new(state.db.clone());
    ensure_published(&service, post_id).await?;

    service
        .like_post(post_id, actor.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to like post");
            AppError::internal("failed to like post")
        })?;

    fresh_stats(&service, post_id, Some(true)).await
}

pub async fn unlike_post(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiPath(post_id): ApiPath<Uuid>,
) -> Result<Json<PostStatsResponse>, AppError> {
    let service = InteractionService::new(state.db.clone());
    ensure_published(&service, post_id).await?;

    service
        .unlike_post(post_id, actor.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to unlike post");
            AppError::internal("failed to unlike post")
        })?;

    fresh_stats(&service, post_id, Some(false)).await
}

// ============================================================================
// Support Ticket Handlers
// ============================================================================

#[derive(Deserialize)]
pub struct CreateTicketRequest {
    pub subject: String,
    pub category: String,
    pub priority: Option<String>,
    pub description: String,
}

#[derive(Deserialize)]
pub struct TicketStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct TicketListQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct TicketResponse {
    pub success: bool,
    pub message: &'static str,
    pub ticket: SupportTicket,
}

#[derive(Serialize)]
pub struct TicketListResponse {
    pub success: bool,
    pub tickets: Vec<SupportTicket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

pub async fn create_ticket(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ApiJson(payload): ApiJson<CreateTicketRequest>,
) -> Result<(StatusCode, Json<TicketResponse>), AppError> {
    let ticket = NewTicket {
        subject: required_text("subject", &payload.subject, SUBJECT_MAX_CHARS)?,
        category: choice("category", &payload.category, TicketCategory::from_db)?,
        priority: optional_choice("priority", payload.priority.as_deref(), TicketPriority::from_db)?
            .unwrap_or(TicketPriority::Medium),
        description: required_text(
            "description",
            &payload.description,
            TICKET_DESCRIPTION_MAX_CHARS,
        )?,
    };

    let service = SupportService::new(state.db.clone());
    let ticket = service
        .create_ticket(&actor, ticket)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %actor.user_id, "failed to create ticket");
            AppError::internal("failed to submit support ticket")
        })?;

    Ok((
        StatusCode::CREATED,
        Json(TicketResponse {
            success: true,
            message: "Support ticket submitted successfully",
            ticket,
        }),
    ))
}

pub async fn list_my_tickets(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<Json<TicketListResponse>, AppError> {
    let service = SupportService::new(state.db.clone());
    let tickets = service.list_own(&actor).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %actor.user_id, "failed to list own tickets");
        AppError::internal("failed to load support tickets")
    })?;

    Ok(Json(TicketListResponse {
        success: true,
        tickets,
        pagination: None,
    }))
}

pub async fn list_tickets(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    ApiQuery(query): ApiQuery<TicketListQuery>,
) -> Result<Json<TicketListResponse>, AppError> {
    let filter = TicketFilter {
        status: filter_choice("status", query.status.as_deref(), TicketStatus::from_db)?,
        priority: filter_choice("priority", query.priority.as_deref(), TicketPriority::from_db)?,
        category: filter_choice("category", query.category.as_deref(), TicketCategory::from_db)?,
        page: page_request(query.page, query.limit)?,
    };

    let service = SupportService::new(state.db.clone());
    let (tickets, pagination) = service.list(&filter).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list tickets");
        AppError::internal("failed to load support tickets")
    })?;

    Ok(Json(TicketListResponse {
        success: true,
        tickets,
        pagination: Some(pagination),
    }))
}

pub async fn update_ticket_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(ticket_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<TicketStatusRequest>,
) -> Result<Json<TicketResponse>, AppError> {
    let status = choice("status", &payload.status, TicketStatus::from_db)?;

    let service = SupportService::new(state.db.clone());
    let ticket = service
        .update_status(ticket_id, status)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, ticket_id = %ticket_id, "failed to update ticket");
            AppError::internal("failed to update support ticket")
        })?
        .ok_or_else(|| AppError::not_found("Support ticket not found"))?;

    tracing::info!(
        admin_id = %admin.user_id,
        ticket_id = %ticket_id,
        status = %status,
        "ticket status updated"
    );

    Ok(Json(TicketResponse {
        success: true,
        message: "Support ticket status updated",
        ticket,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn published_date_accepts_timestamps_and_dates() {
        let timestamp = parse_published_date("2024-05-01T08:30:00Z").unwrap();
        assert_eq!(timestamp.hour(), 8);

        let date = parse_published_date("2024-05-01").unwrap();
        assert_eq!(date.date().to_string(), "2024-05-01");
        assert_eq!(date.hour(), 0);

        assert!(parse_published_date("May 1st").is_err());
    }

    #[test]
    fn deletion_requires_explicit_confirmation() {
        assert!(require_confirmation(&ConfirmQuery { confirm: None }).is_err());
        assert!(require_confirmation(&ConfirmQuery { confirm: Some(false) }).is_err());
        assert!(require_confirmation(&ConfirmQuery { confirm: Some(true) }).is_ok());
    }

    #[test]
    fn rating_outside_one_to_five_is_rejected() {
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
        assert_eq!(validate_rating(5).unwrap(), 5);
    }
}
