use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use axum::http::HeaderName;
use subtle::ConstantTimeEq;

use crate::app::auth::AuthService;
use crate::app::permissions::Caller;
use crate::domain::user::User;
use crate::http::AppError;
use crate::AppState;

/// The authenticated user behind a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

impl AuthUser {
    pub fn user_id(&self) -> i64 {
        self.user.id
    }
}

/// Anonymous when no `Authorization` header is sent. A header that is present
/// but unusable is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

#[derive(Debug, Clone)]
pub struct AdminToken;

const ADMIN_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-admin-token");

async fn authenticate(parts: &Parts, state: &AppState) -> Result<Option<AuthUser>, AppError> {
    let auth_header = match parts.headers.get(header::AUTHORIZATION) {
        Some(value) => value
            .to_str()
            .map_err(|_| AppError::unauthorized("invalid Authorization header"))?,
        None => return Ok(None),
    };

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::unauthorized("invalid Authorization header"))?;

    let service = AuthService::new(state.store.clone(), state.tokens);
    let session = service.authenticate_access_token(token).map_err(|err| {
        tracing::error!(error = ?err, "failed to authenticate");
        AppError::internal("failed to authenticate")
    })?;
    let session = session.ok_or_else(|| AppError::unauthorized("invalid token"))?;

    let user = service
        .get_current_user(session.user_id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to authenticate"))?
        .ok_or_else(|| AppError::unauthorized("user not found"))?;

    Ok(Some(AuthUser { user }))
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state)
            .await?
            .ok_or_else(|| AppError::unauthorized("authentication credentials were not provided"))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(authenticate(parts, state).await?))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let MaybeAuthUser(auth) = MaybeAuthUser::from_request_parts(parts, state).await?;
        Ok(Caller::new(auth.map(|auth| auth.user_id()), &parts.method))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state
            .admin_token
            .as_ref()
            .ok_or_else(|| AppError::forbidden("admin token not configured"))?;

        let provided = parts
            .headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::forbidden("missing admin token"))?;

        if !bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
            return Err(AppError::forbidden("invalid admin token"));
        }

        Ok(AdminToken)
    }
}
