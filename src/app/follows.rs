//! Follow edges: creation with the no-self-follow and no-duplicate rules,
//! and the actor-scoped listing with username search.

use crate::app::error::{ServiceError, ServiceResult};
use crate::app::permissions::{can_modify_follow, require_authenticated, Caller};
use crate::domain::follow::Follow;
use crate::infra::store::{SharedStore, StoreError};

pub const FOLLOWING_REQUIRED_MESSAGE: &str = "following is required";
pub const SELF_FOLLOW_MESSAGE: &str = "cannot follow yourself";
pub const DUPLICATE_FOLLOW_MESSAGE: &str = "already following this user";
pub const USER_NOT_FOUND_MESSAGE: &str = "user not found";

#[derive(Clone)]
pub struct FollowService {
    store: SharedStore,
}

impl FollowService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Makes the caller follow `target_username`.
    ///
    /// The self and duplicate checks run before the insert and are enforced
    /// again by the store, so a racing identical request fails with the same
    /// validation error.
    pub async fn create_follow(&self, caller: Caller, target_username: &str) -> ServiceResult<Follow> {
        let actor = require_authenticated(caller)?;
        let target_username = target_username.trim();
        if target_username.is_empty() {
            return Err(ServiceError::validation(FOLLOWING_REQUIRED_MESSAGE));
        }

        let target = self
            .store
            .find_user_by_username(target_username)
            .await?
            .ok_or_else(|| ServiceError::not_found(USER_NOT_FOUND_MESSAGE))?;

        if target.id == actor {
            return Err(ServiceError::validation(SELF_FOLLOW_MESSAGE));
        }
        if self.store.follow_exists(actor, target.id).await? {
            return Err(ServiceError::validation(DUPLICATE_FOLLOW_MESSAGE));
        }

        match self.store.create_follow(actor, target.id).await {
            Ok(follow) => {
                tracing::info!(
                    follow_id = follow.id,
                    user_id = actor,
                    following_id = target.id,
                    "follow created"
                );
                Ok(follow)
            }
            Err(StoreError::UniqueViolation(_)) => {
                Err(ServiceError::validation(DUPLICATE_FOLLOW_MESSAGE))
            }
            Err(StoreError::CheckViolation(_)) => Err(ServiceError::validation(SELF_FOLLOW_MESSAGE)),
            Err(StoreError::ForeignKeyViolation(_)) => {
                Err(ServiceError::not_found(USER_NOT_FOUND_MESSAGE))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Edges whose follower is the caller, ordered by id and narrowed by
    /// `search`.
    pub async fn list_follows(&self, caller: Caller, search: Option<&str>) -> ServiceResult<Vec<Follow>> {
        let actor = require_authenticated(caller)?;
        let terms = search_terms(search.unwrap_or_default());
        let follows = self.store.list_follows(actor, &terms).await?;
        Ok(follows
            .into_iter()
            .filter(|follow| can_modify_follow(caller, follow))
            .collect())
    }
}

/// Splits a search string on whitespace and commas, dropping empty terms.
pub fn search_terms(search: &str) -> Vec<String> {
    search
        .replace('\0', "")
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}
