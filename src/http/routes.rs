use axum::{middleware, routing::get, routing::post, Router};

use crate::http::handlers;
use crate::http::middleware::rate_limit::ip_rate_limit_middleware;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route(
            "/posts/",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route(
            "/posts/:id/",
            get(handlers::get_post)
                .put(handlers::replace_post)
                .patch(handlers::update_post)
                .delete(handlers::delete_post),
        )
}

pub fn comments() -> Router<AppState> {
    Router::new()
        .route(
            "/posts/:post_id/comments/",
            get(handlers::list_comments).post(handlers::create_comment),
        )
        .route(
            "/posts/:post_id/comments/:id/",
            get(handlers::get_comment)
                .put(handlers::replace_comment)
                .patch(handlers::update_comment)
                .delete(handlers::delete_comment),
        )
}

pub fn groups() -> Router<AppState> {
    Router::new()
        .route("/groups/", get(handlers::list_groups))
        .route("/groups/:id/", get(handlers::get_group))
}

pub fn follows() -> Router<AppState> {
    Router::new().route(
        "/follow/",
        get(handlers::list_follows).post(handlers::create_follow),
    )
}

/// Signup and token endpoints. Login and signup are limited per client IP.
pub fn accounts(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users/", post(handlers::create_user))
        .route("/users/me/", get(handlers::get_current_user))
        .route("/jwt/create/", post(handlers::create_token))
        .route("/jwt/refresh/", post(handlers::refresh_token))
        .route("/jwt/verify/", post(handlers::verify_token))
        .route_layer(middleware::from_fn_with_state(
            state,
            ip_rate_limit_middleware,
        ))
}

pub fn admin() -> Router<AppState> {
    Router::new().route("/admin/groups/", post(handlers::admin_create_group))
}
