use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{
    validate_post, CreatePostRequest, DataResponse, Pagination, PostIdQuery, UpdatePostRequest,
    POSTS_PER_PAGE,
};
use super::repo;
use crate::{
    auth::{dto::MessageResponse, session::AuthSession},
    error::{ApiError, ValidationError},
    posts::repo::{Post, PostWithAuthor},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/all-posts", get(all_posts))
        .route("/single-post", get(single_post))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/create-post", post(create_post))
        .route("/update-post", put(update_post))
        .route("/delete-post", delete(delete_post))
}

fn parse_post_id(raw: Option<String>) -> Result<Uuid, ApiError> {
    let raw = raw.ok_or(ApiError::PostIdRequired)?;
    Uuid::parse_str(&raw).map_err(|_| ApiError::PostNotFound)
}

fn ensure_owner(found: Option<Post>, user_id: Uuid) -> Result<Post, ApiError> {
    let post = found.ok_or(ApiError::PostNotFound)?;
    if post.user_id != user_id {
        return Err(ApiError::Forbidden);
    }
    Ok(post)
}

#[instrument(skip(state))]
pub async fn all_posts(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<DataResponse<Vec<PostWithAuthor>>>, ApiError> {
    let posts = repo::list(&state.db, POSTS_PER_PAGE, pagination.offset()).await?;
    Ok(Json(DataResponse {
        success: true,
        message: "All posts",
        data: posts,
    }))
}

#[instrument(skip(state))]
pub async fn single_post(
    State(state): State<AppState>,
    Query(query): Query<PostIdQuery>,
) -> Result<Json<DataResponse<PostWithAuthor>>, ApiError> {
    let post_id = parse_post_id(query.post_id)?;
    let post = repo::get(&state.db, post_id)
        .await?
        .ok_or(ApiError::PostNotFound)?;
    Ok(Json(DataResponse {
        success: true,
        message: "Single post",
        data: post,
    }))
}

#[instrument(skip_all)]
pub async fn create_post(
    State(state): State<AppState>,
    AuthSession(claims): AuthSession,
    payload: Option<Json<CreatePostRequest>>,
) -> Result<(StatusCode, Json<DataResponse<Post>>), ApiError> {
    let Json(payload) = payload.ok_or(ValidationError::Body)?;
    let title = payload.title.trim().to_string();
    let description = payload.description.trim().to_string();
    validate_post(&title, &description)?;

    let post = repo::create(&state.db, claims.sub, &title, &description).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            success: true,
            message: "Post created successfully",
            data: post,
        }),
    ))
}

#[instrument(skip_all)]
pub async fn update_post(
    State(state): State<AppState>,
    AuthSession(claims): AuthSession,
    Query(query): Query<PostIdQuery>,
    payload: Option<Json<UpdatePostRequest>>,
) -> Result<Json<DataResponse<Post>>, ApiError> {
    let Json(payload) = payload.ok_or(ApiError::InvalidUpdate(ValidationError::Body))?;
    let title = payload.title.trim().to_string();
    let description = payload.description.trim().to_string();
    validate_post(&title, &description).map_err(ApiError::InvalidUpdate)?;

    let post_id = parse_post_id(query.post_id)?;
    ensure_owner(repo::find(&state.db, post_id).await?, claims.sub)?;

    let post = repo::update(&state.db, post_id, &title, &description).await?;
    Ok(Json(DataResponse {
        success: true,
        message: "Post updated successfully",
        data: post,
    }))
}

#[instrument(skip_all)]
pub async fn delete_post(
    State(state): State<AppState>,
    AuthSession(claims): AuthSession,
    Query(query): Query<PostIdQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    let post_id = parse_post_id(query.post_id)?;
    ensure_owner(repo::find(&state.db, post_id).await?, claims.sub)?;

    repo::delete(&state.db, post_id).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Post deleted successfully",
    }))
}
