use crate::app::error::{ServiceError, ServiceResult};
use crate::domain::group::{Group, NewGroup};
use crate::infra::store::{SharedStore, StoreError};

pub const GROUP_NOT_FOUND_MESSAGE: &str = "group not found";
pub const DUPLICATE_SLUG_MESSAGE: &str = "group with this slug already exists";

#[derive(Clone)]
pub struct GroupService {
    store: SharedStore,
}

impl GroupService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn list_groups(&self) -> ServiceResult<Vec<Group>> {
        Ok(self.store.list_groups().await?)
    }

    pub async fn get_group(&self, id: i64) -> ServiceResult<Group> {
        self.store
            .get_group(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(GROUP_NOT_FOUND_MESSAGE))
    }

    /// Administrative creation; callers are checked by the HTTP layer.
    pub async fn create_group(&self, group: NewGroup) -> ServiceResult<Group> {
        match self.store.create_group(group).await {
            Ok(group) => {
                tracing::info!(group_id = group.id, slug = %group.slug, "group created");
                Ok(group)
            }
            Err(StoreError::UniqueViolation(_)) => Err(ServiceError::validation(DUPLICATE_SLUG_MESSAGE)),
            Err(err) => Err(err.into()),
        }
    }
}
