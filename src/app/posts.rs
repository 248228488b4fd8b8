use crate::app::error::{ServiceError, ServiceResult};
use crate::app::permissions::{can_modify, ensure, require_authenticated, Caller};
use crate::domain::post::{NewPost, Post, PostChanges};
use crate::infra::store::{PageWindow, SharedStore, StoreError, POSTS_GROUP_FKEY};

pub const POST_NOT_FOUND_MESSAGE: &str = "post not found";
pub const INVALID_GROUP_MESSAGE: &str = "invalid group";

/// Fields accepted when creating a post. `text` is already validated.
#[derive(Debug, Clone)]
pub struct PostInput {
    pub text: String,
    pub image: Option<String>,
    pub group_id: Option<i64>,
}

#[derive(Clone)]
pub struct PostService {
    store: SharedStore,
}

impl PostService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn count_posts(&self) -> ServiceResult<i64> {
        Ok(self.store.count_posts().await?)
    }

    pub async fn list_posts(&self, window: Option<PageWindow>) -> ServiceResult<Vec<Post>> {
        Ok(self.store.list_posts(window).await?)
    }

    pub async fn create_post(&self, caller: Caller, input: PostInput) -> ServiceResult<Post> {
        let author_id = require_authenticated(caller)?;
        self.check_group(input.group_id).await?;

        let post = self
            .store
            .create_post(NewPost {
                author_id,
                text: input.text,
                image: input.image,
                group_id: input.group_id,
            })
            .await
            .map_err(map_group_violation)?;

        tracing::info!(post_id = post.id, author_id, "post created");
        Ok(post)
    }

    pub async fn get_post(&self, caller: Caller, id: i64) -> ServiceResult<Post> {
        let post = self.find_post(id).await?;
        ensure(can_modify(caller, &post))?;
        Ok(post)
    }

    /// Applies `changes` to a post owned by the caller. PUT and PATCH both land
    /// here; PUT simply supplies every field.
    pub async fn update_post(&self, caller: Caller, id: i64, changes: PostChanges) -> ServiceResult<Post> {
        require_authenticated(caller)?;
        let post = self.find_post(id).await?;
        ensure(can_modify(caller, &post))?;
        if let Some(group_id) = changes.group_id {
            self.check_group(group_id).await?;
        }

        self.store
            .update_post(id, changes)
            .await
            .map_err(map_group_violation)?
            .ok_or_else(|| ServiceError::not_found(POST_NOT_FOUND_MESSAGE))
    }

    pub async fn delete_post(&self, caller: Caller, id: i64) -> ServiceResult<()> {
        require_authenticated(caller)?;
        let post = self.find_post(id).await?;
        ensure(can_modify(caller, &post))?;

        if !self.store.delete_post(id).await? {
            return Err(ServiceError::not_found(POST_NOT_FOUND_MESSAGE));
        }
        tracing::info!(post_id = id, "post deleted");
        Ok(())
    }

    async fn find_post(&self, id: i64) -> ServiceResult<Post> {
        self.store
            .get_post(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(POST_NOT_FOUND_MESSAGE))
    }

    async fn check_group(&self, group_id: Option<i64>) -> ServiceResult<()> {
        match group_id {
            Some(group_id) if self.store.get_group(group_id).await?.is_none() => {
                Err(ServiceError::validation(INVALID_GROUP_MESSAGE))
            }
            _ => Ok(()),
        }
    }
}

// A group deleted between the check and the write still surfaces as a
// validation failure.
fn map_group_violation(err: StoreError) -> ServiceError {
    match err {
        StoreError::ForeignKeyViolation(constraint) if constraint == POSTS_GROUP_FKEY => {
            ServiceError::validation(INVALID_GROUP_MESSAGE)
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::group::NewGroup;
    use crate::domain::user::{NewUser, User};
    use crate::infra::memory::MemoryStore;
    use crate::infra::store::Store;
    use axum::http::Method;
    use std::sync::Arc;

    async fn user(store: &SharedStore, username: &str) -> User {
        store
            .create_user(NewUser {
                username: username.to_string(),
                email: None,
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap()
    }

    fn input(text: &str, group_id: Option<i64>) -> PostInput {
        PostInput {
            text: text.to_string(),
            image: None,
            group_id,
        }
    }

    #[tokio::test]
    async fn only_the_author_can_change_a_post() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let service = PostService::new(store.clone());
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;

        let post = service
            .create_post(Caller::new(Some(alice.id), &Method::POST), input("hello", None))
            .await
            .unwrap();
        assert_eq!(post.author, "alice");

        let read = service
            .get_post(Caller::new(Some(bob.id), &Method::GET), post.id)
            .await
            .unwrap();
        assert_eq!(read.text, "hello");

        assert!(matches!(
            service
                .delete_post(Caller::new(Some(bob.id), &Method::DELETE), post.id)
                .await,
            Err(ServiceError::Forbidden(_))
        ));

        let changes = PostChanges {
            text: Some("edited".to_string()),
            ..PostChanges::default()
        };
        let updated = service
            .update_post(Caller::new(Some(alice.id), &Method::PATCH), post.id, changes)
            .await
            .unwrap();
        assert_eq!(updated.text, "edited");

        service
            .delete_post(Caller::new(Some(alice.id), &Method::DELETE), post.id)
            .await
            .unwrap();
        assert!(matches!(
            service
                .get_post(Caller::new(None, &Method::GET), post.id)
                .await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unknown_group_is_rejected() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let service = PostService::new(store.clone());
        let alice = user(&store, "alice").await;
        let group = store
            .create_group(NewGroup {
                title: "Cats".to_string(),
                slug: "cats".to_string(),
                description: String::new(),
            })
            .await
            .unwrap();
        let caller = Caller::new(Some(alice.id), &Method::POST);

        match service.create_post(caller, input("hello", Some(999))).await {
            Err(ServiceError::Validation(message)) => assert_eq!(message, INVALID_GROUP_MESSAGE),
            other => panic!("unexpected result: {:?}", other),
        }

        let post = service
            .create_post(caller, input("hello", Some(group.id)))
            .await
            .unwrap();
        assert_eq!(post.group, Some(group.id));

        let cleared = service
            .update_post(
                Caller::new(Some(alice.id), &Method::PATCH),
                post.id,
                PostChanges {
                    group_id: Some(None),
                    ..PostChanges::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.group, None);
        assert_eq!(cleared.text, "hello");
    }
}
