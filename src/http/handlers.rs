use axum::{
    extract::{Query, State},
    http::{Method, StatusCode},
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::app::auth::{AuthService, Registration};
use crate::app::comments::CommentService;
use crate::app::follows::FollowService;
use crate::app::groups::GroupService;
use crate::app::permissions::Caller;
use crate::app::posts::{PostInput, PostService};
use crate::domain::comment::Comment;
use crate::domain::follow::Follow;
use crate::domain::group::{is_valid_slug, Group, NewGroup, TITLE_MAX_LEN};
use crate::domain::post::{Post, PostChanges};
use crate::domain::user::User;
use crate::http::extract::{IdPath, JsonBody};
use crate::http::pagination::{Page, PageQuery, RequestUrl};
use crate::http::{AdminToken, AppError, AuthUser};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.store.ping().await.is_ok();
    let counters = state.rate_limiter.ping().await.is_ok();
    let status = if store && counters { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn required_text(text: Option<String>) -> Result<String, AppError> {
    let text = text.ok_or_else(|| AppError::bad_request("text is required"))?;
    check_text(&text)?;
    Ok(text)
}

fn check_text(text: &str) -> Result<(), AppError> {
    if text.trim().is_empty() {
        return Err(AppError::bad_request("text may not be blank"));
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct PostPayload {
    pub text: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub image: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub group: Option<Option<i64>>,
}

pub async fn list_posts(
    State(state): State<AppState>,
    _caller: Caller,
    RequestUrl(url): RequestUrl,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<Post>>, AppError> {
    let service = PostService::new(state.store.clone());
    let Some(window) = page.window() else {
        let posts = service
            .list_posts(None)
            .await
            .map_err(|err| AppError::from_service(err, "failed to list posts"))?;
        return Ok(Json(Page::All(posts)));
    };

    let count = service
        .count_posts()
        .await
        .map_err(|err| AppError::from_service(err, "failed to count posts"))?;
    let posts = service
        .list_posts(Some(window))
        .await
        .map_err(|err| AppError::from_service(err, "failed to list posts"))?;

    Ok(Json(Page::window(&url, window, count, posts)))
}

pub async fn create_post(
    State(state): State<AppState>,
    caller: Caller,
    JsonBody(payload): JsonBody<PostPayload>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    if caller.actor.is_none() {
        return Err(AppError::unauthorized("authentication credentials were not provided"));
    }
    let text = required_text(payload.text)?;

    let service = PostService::new(state.store.clone());
    let post = service
        .create_post(
            caller,
            PostInput {
                text,
                image: payload.image.flatten(),
                group_id: payload.group.flatten(),
            },
        )
        .await
        .map_err(|err| AppError::from_service(err, "failed to create post"))?;

    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn get_post(
    State(state): State<AppState>,
    caller: Caller,
    IdPath(id): IdPath<i64>,
) -> Result<Json<Post>, AppError> {
    let service = PostService::new(state.store.clone());
    let post = service
        .get_post(caller, id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to fetch post"))?;

    Ok(Json(post))
}

pub async fn replace_post(
    State(state): State<AppState>,
    caller: Caller,
    IdPath(id): IdPath<i64>,
    JsonBody(payload): JsonBody<PostPayload>,
) -> Result<Json<Post>, AppError> {
    if caller.actor.is_none() {
        return Err(AppError::unauthorized("authentication credentials were not provided"));
    }
    let changes = PostChanges {
        text: Some(required_text(payload.text)?),
        image: payload.image,
        group_id: payload.group,
    };
    update_post_with(state, caller, id, changes).await
}

pub async fn update_post(
    State(state): State<AppState>,
    caller: Caller,
    IdPath(id): IdPath<i64>,
    JsonBody(payload): JsonBody<PostPayload>,
) -> Result<Json<Post>, AppError> {
    if caller.actor.is_none() {
        return Err(AppError::unauthorized("authentication credentials were not provided"));
    }
    if let Some(text) = &payload.text {
        check_text(text)?;
    }
    let changes = PostChanges {
        text: payload.text,
        image: payload.image,
        group_id: payload.group,
    };
    update_post_with(state, caller, id, changes).await
}

async fn update_post_with(
    state: AppState,
    caller: Caller,
    id: i64,
    changes: PostChanges,
) -> Result<Json<Post>, AppError> {
    let service = PostService::new(state.store.clone());
    let post = service
        .update_post(caller, id, changes)
        .await
        .map_err(|err| AppError::from_service(err, "failed to update post"))?;

    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<AppState>,
    caller: Caller,
    IdPath(id): IdPath<i64>,
) -> Result<StatusCode, AppError> {
    let service = PostService::new(state.store.clone());
    service
        .delete_post(caller, id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to delete post"))?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct CommentPayload {
    pub text: Option<String>,
}

pub async fn list_comments(
    State(state): State<AppState>,
    _caller: Caller,
    IdPath(post_id): IdPath<i64>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let service = CommentService::new(state.store.clone());
    let comments = service
        .list_comments(post_id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to list comments"))?;

    Ok(Json(comments))
}

pub async fn create_comment(
    State(state): State<AppState>,
    caller: Caller,
    IdPath(post_id): IdPath<i64>,
    JsonBody(payload): JsonBody<CommentPayload>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    if caller.actor.is_none() {
        return Err(AppError::unauthorized("authentication credentials were not provided"));
    }
    let text = required_text(payload.text)?;

    let service = CommentService::new(state.store.clone());
    let comment = service
        .create_comment(caller, post_id, text)
        .await
        .map_err(|err| AppError::from_service(err, "failed to create comment"))?;

    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn get_comment(
    State(state): State<AppState>,
    caller: Caller,
    IdPath((post_id, id)): IdPath<(i64, i64)>,
) -> Result<Json<Comment>, AppError> {
    let service = CommentService::new(state.store.clone());
    let comment = service
        .get_comment(caller, post_id, id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to fetch comment"))?;

    Ok(Json(comment))
}

pub async fn replace_comment(
    State(state): State<AppState>,
    caller: Caller,
    IdPath((post_id, id)): IdPath<(i64, i64)>,
    JsonBody(payload): JsonBody<CommentPayload>,
) -> Result<Json<Comment>, AppError> {
    if caller.actor.is_none() {
        return Err(AppError::unauthorized("authentication credentials were not provided"));
    }
    let text = required_text(payload.text)?;
    update_comment_with(state, caller, post_id, id, Some(text)).await
}

pub async fn update_comment(
    State(state): State<AppState>,
    caller: Caller,
    IdPath((post_id, id)): IdPath<(i64, i64)>,
    JsonBody(payload): JsonBody<CommentPayload>,
) -> Result<Json<Comment>, AppError> {
    if caller.actor.is_none() {
        return Err(AppError::unauthorized("authentication credentials were not provided"));
    }
    if let Some(text) = &payload.text {
        check_text(text)?;
    }
    update_comment_with(state, caller, post_id, id, payload.text).await
}

async fn update_comment_with(
    state: AppState,
    caller: Caller,
    post_id: i64,
    id: i64,
    text: Option<String>,
) -> Result<Json<Comment>, AppError> {
    let service = CommentService::new(state.store.clone());
    let comment = match text {
        Some(text) => service.update_comment(caller, post_id, id, text).await,
        // Nothing to change; still subject to the author check.
        None => service.get_comment(caller, post_id, id).await,
    }
    .map_err(|err| AppError::from_service(err, "failed to update comment"))?;

    Ok(Json(comment))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    caller: Caller,
    IdPath((post_id, id)): IdPath<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    let service = CommentService::new(state.store.clone());
    service
        .delete_comment(caller, post_id, id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to delete comment"))?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_groups(
    State(state): State<AppState>,
    _caller: Caller,
) -> Result<Json<Vec<Group>>, AppError> {
    let service = GroupService::new(state.store.clone());
    let groups = service
        .list_groups()
        .await
        .map_err(|err| AppError::from_service(err, "failed to list groups"))?;

    Ok(Json(groups))
}

pub async fn get_group(
    State(state): State<AppState>,
    _caller: Caller,
    IdPath(id): IdPath<i64>,
) -> Result<Json<Group>, AppError> {
    let service = GroupService::new(state.store.clone());
    let group = service
        .get_group(id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to fetch group"))?;

    Ok(Json(group))
}

#[derive(Deserialize)]
pub struct CreateGroupRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

pub async fn admin_create_group(
    State(state): State<AppState>,
    _admin: AdminToken,
    JsonBody(payload): JsonBody<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), AppError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("title is required"));
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(AppError::bad_request("title must be at most 200 characters"));
    }
    let slug = payload.slug.trim();
    if !is_valid_slug(slug) {
        return Err(AppError::bad_request(
            "slug must be 1-50 characters of letters, numbers, underscores or hyphens",
        ));
    }

    let service = GroupService::new(state.store.clone());
    let group = service
        .create_group(NewGroup {
            title: title.to_string(),
            slug: slug.to_string(),
            description: payload.description,
        })
        .await
        .map_err(|err| AppError::from_service(err, "failed to create group"))?;

    Ok((StatusCode::CREATED, Json(group)))
}

#[derive(Deserialize)]
pub struct FollowRequest {
    pub following: Option<String>,
}

#[derive(Deserialize)]
pub struct FollowQuery {
    pub search: Option<String>,
}

pub async fn list_follows(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<FollowQuery>,
) -> Result<Json<Vec<Follow>>, AppError> {
    let caller = Caller::new(Some(auth.user_id()), &Method::GET);
    let service = FollowService::new(state.store.clone());
    let follows = service
        .list_follows(caller, query.search.as_deref())
        .await
        .map_err(|err| AppError::from_service(err, "failed to list follows"))?;

    Ok(Json(follows))
}

pub async fn create_follow(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(payload): JsonBody<FollowRequest>,
) -> Result<(StatusCode, Json<Follow>), AppError> {
    let caller = Caller::new(Some(auth.user_id()), &Method::POST);
    let service = FollowService::new(state.store.clone());
    let follow = service
        .create_follow(caller, payload.following.as_deref().unwrap_or_default())
        .await
        .map_err(|err| AppError::from_service(err, "failed to follow user"))?;

    Ok((StatusCode::CREATED, Json(follow)))
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub email: Option<String>,
}

pub async fn create_user(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("username and password are required"));
    }

    let service = AuthService::new(state.store.clone(), state.tokens);
    let user = service
        .signup(Registration {
            username: payload.username,
            email: payload.email,
            password: payload.password,
        })
        .await
        .map_err(|err| AppError::from_service(err, "failed to create user"))?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_current_user(auth: AuthUser) -> Json<User> {
    Json(auth.user)
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenPairResponse {
    pub access: String,
    pub refresh: String,
}

pub async fn create_token(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<TokenPairResponse>, AppError> {
    const MAX_PASSWORD_LEN: usize = 128;

    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::bad_request("username and password are required"));
    }
    if payload.password.chars().count() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let service = AuthService::new(state.store.clone(), state.tokens);
    let tokens = service
        .login(payload.username.trim(), &payload.password)
        .await
        .map_err(|err| AppError::from_service(err, "failed to login"))?;

    match tokens {
        Some(tokens) => Ok(Json(TokenPairResponse {
            access: tokens.access_token,
            refresh: tokens.refresh_token,
        })),
        None => Err(AppError::unauthorized("no active account found with the given credentials")),
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh: String,
}

#[derive(Serialize)]
pub struct AccessTokenResponse {
    pub access: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RefreshRequest>,
) -> Result<Json<AccessTokenResponse>, AppError> {
    if payload.refresh.trim().is_empty() {
        return Err(AppError::bad_request("refresh is required"));
    }

    let service = AuthService::new(state.store.clone(), state.tokens);
    let access = service
        .refresh(payload.refresh.trim())
        .await
        .map_err(|err| AppError::from_service(err, "failed to refresh token"))?;

    match access {
        Some(access) => Ok(Json(AccessTokenResponse { access })),
        None => Err(AppError::unauthorized("token is invalid or expired")),
    }
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub token: String,
}

pub async fn verify_token(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<VerifyRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if payload.token.trim().is_empty() {
        return Err(AppError::bad_request("token is required"));
    }

    let service = AuthService::new(state.store.clone(), state.tokens);
    let valid = service.verify(payload.token.trim()).map_err(|err| {
        tracing::error!(error = ?err, "failed to verify token");
        AppError::internal("failed to verify token")
    })?;

    if !valid {
        return Err(AppError::unauthorized("token is invalid or expired"));
    }
    Ok(Json(serde_json::json!({})))
}
