use axum::http::HeaderName;
use axum::Router;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

mod auth;
mod error;
mod extract;
mod handlers;
pub mod middleware;
pub mod pagination;
mod routes;

pub use auth::{AdminToken, AuthUser, MaybeAuthUser};
pub use error::AppError;

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::posts())
        .merge(routes::comments())
        .merge(routes::groups())
        .merge(routes::follows())
        .merge(routes::accounts(state.clone()))
        .merge(routes::admin());

    Router::new()
        .merge(routes::health())
        .nest("/api/v1", api)
        .with_state(state)
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
}
