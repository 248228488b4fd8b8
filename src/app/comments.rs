use crate::app::error::{ServiceError, ServiceResult};
use crate::app::permissions::{can_modify, ensure, require_authenticated, Caller};
use crate::app::posts::POST_NOT_FOUND_MESSAGE;
use crate::domain::comment::{Comment, NewComment};
use crate::infra::store::{SharedStore, StoreError, COMMENTS_POST_FKEY};

pub const COMMENT_NOT_FOUND_MESSAGE: &str = "comment not found";

/// Comments nested under a post. Every call resolves the post first, so a
/// missing post is reported before anything about the comment.
#[derive(Clone)]
pub struct CommentService {
    store: SharedStore,
}

impl CommentService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn list_comments(&self, post_id: i64) -> ServiceResult<Vec<Comment>> {
        self.require_post(post_id).await?;
        Ok(self.store.list_comments(post_id).await?)
    }

    pub async fn create_comment(&self, caller: Caller, post_id: i64, text: String) -> ServiceResult<Comment> {
        let author_id = require_authenticated(caller)?;
        self.require_post(post_id).await?;

        let comment = self
            .store
            .create_comment(NewComment {
                author_id,
                post_id,
                text,
            })
            .await
            .map_err(|err| match err {
                StoreError::ForeignKeyViolation(constraint) if constraint == COMMENTS_POST_FKEY => {
                    ServiceError::not_found(POST_NOT_FOUND_MESSAGE)
                }
                other => other.into(),
            })?;

        tracing::info!(comment_id = comment.id, post_id, author_id, "comment created");
        Ok(comment)
    }

    pub async fn get_comment(&self, caller: Caller, post_id: i64, id: i64) -> ServiceResult<Comment> {
        self.require_post(post_id).await?;
        let comment = self.find_comment(post_id, id).await?;
        ensure(can_modify(caller, &comment))?;
        Ok(comment)
    }

    pub async fn update_comment(
        &self,
        caller: Caller,
        post_id: i64,
        id: i64,
        text: String,
    ) -> ServiceResult<Comment> {
        require_authenticated(caller)?;
        self.require_post(post_id).await?;
        let comment = self.find_comment(post_id, id).await?;
        ensure(can_modify(caller, &comment))?;

        self.store
            .update_comment(comment.id, text)
            .await?
            .ok_or_else(|| ServiceError::not_found(COMMENT_NOT_FOUND_MESSAGE))
    }

    pub async fn delete_comment(&self, caller: Caller, post_id: i64, id: i64) -> ServiceResult<()> {
        require_authenticated(caller)?;
        self.require_post(post_id).await?;
        let comment = self.find_comment(post_id, id).await?;
        ensure(can_modify(caller, &comment))?;

        if !self.store.delete_comment(comment.id).await? {
            return Err(ServiceError::not_found(COMMENT_NOT_FOUND_MESSAGE));
        }
        tracing::info!(comment_id = id, post_id, "comment deleted");
        Ok(())
    }

    async fn require_post(&self, post_id: i64) -> ServiceResult<()> {
        match self.store.get_post(post_id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::not_found(POST_NOT_FOUND_MESSAGE)),
        }
    }

    async fn find_comment(&self, post_id: i64, id: i64) -> ServiceResult<Comment> {
        self.store
            .get_comment(post_id, id)
            .await?
            .ok_or_else(|| ServiceError::not_found(COMMENT_NOT_FOUND_MESSAGE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::post::NewPost;
    use crate::domain::user::NewUser;
    use crate::infra::memory::MemoryStore;
    use crate::infra::store::Store;
    use axum::http::Method;
    use std::sync::Arc;

    #[tokio::test]
    async fn comments_are_scoped_to_their_post() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let service = CommentService::new(store.clone());
        let alice = store
            .create_user(NewUser {
                username: "alice".to_string(),
                email: None,
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        let mut post_ids = Vec::new();
        for text in ["first", "second"] {
            let post = store
                .create_post(NewPost {
                    author_id: alice.id,
                    text: text.to_string(),
                    image: None,
                    group_id: None,
                })
                .await
                .unwrap();
            post_ids.push(post.id);
        }

        let writer = Caller::new(Some(alice.id), &Method::POST);
        let comment = service
            .create_comment(writer, post_ids[0], "nice".to_string())
            .await
            .unwrap();
        assert_eq!(comment.post, post_ids[0]);

        let reader = Caller::new(None, &Method::GET);
        assert!(service.get_comment(reader, post_ids[0], comment.id).await.is_ok());
        assert!(matches!(
            service.get_comment(reader, post_ids[1], comment.id).await,
            Err(ServiceError::NotFound(message)) if message == COMMENT_NOT_FOUND_MESSAGE
        ));
        assert!(matches!(
            service.list_comments(999).await,
            Err(ServiceError::NotFound(message)) if message == POST_NOT_FOUND_MESSAGE
        ));
        assert!(service.list_comments(post_ids[1]).await.unwrap().is_empty());
    }
}
