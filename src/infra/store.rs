use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::comment::{Comment, NewComment};
use crate::domain::follow::Follow;
use crate::domain::group::{Group, NewGroup};
use crate::domain::post::{NewPost, Post, PostChanges};
use crate::domain::user::{NewUser, User, UserCredentials};

// Constraint names shared by both backends. They match migrations/0001_init.sql.
pub const USERS_USERNAME_KEY: &str = "users_username_key";
pub const GROUPS_SLUG_KEY: &str = "groups_slug_key";
pub const POSTS_GROUP_FKEY: &str = "posts_group_id_fkey";
pub const POSTS_AUTHOR_FKEY: &str = "posts_author_id_fkey";
pub const COMMENTS_POST_FKEY: &str = "comments_post_id_fkey";
pub const COMMENTS_AUTHOR_FKEY: &str = "comments_author_id_fkey";
pub const FOLLOWS_USER_FOLLOWING_KEY: &str = "follows_user_following_key";
pub const FOLLOWS_NO_SELF_FOLLOW: &str = "follows_no_self_follow";
pub const FOLLOWS_USER_FKEY: &str = "follows_user_id_fkey";
pub const FOLLOWS_FOLLOWING_FKEY: &str = "follows_following_id_fkey";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("check constraint violated: {0}")]
    CheckViolation(String),
    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            match db_err.code().as_deref() {
                Some("23505") => return Self::UniqueViolation(constraint),
                Some("23514") => return Self::CheckViolation(constraint),
                Some("23503") => return Self::ForeignKeyViolation(constraint),
                _ => {}
            }
        }
        Self::Backend(err.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Slice of an ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: i64,
    pub offset: i64,
}

/// Relational persistence for users, groups, posts, comments and follows.
///
/// Uniqueness, self-follow and referential rules are enforced here as well as
/// in the services, so racing writers get a typed violation instead of a
/// duplicate row.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn get_user(&self, id: i64) -> StoreResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn find_credentials(&self, username: &str) -> StoreResult<Option<UserCredentials>>;

    async fn create_group(&self, group: NewGroup) -> StoreResult<Group>;
    async fn list_groups(&self) -> StoreResult<Vec<Group>>;
    async fn get_group(&self, id: i64) -> StoreResult<Option<Group>>;

    async fn create_post(&self, post: NewPost) -> StoreResult<Post>;
    async fn get_post(&self, id: i64) -> StoreResult<Option<Post>>;
    async fn count_posts(&self) -> StoreResult<i64>;
    /// Posts ordered by id; `None` returns all of them.
    async fn list_posts(&self, window: Option<PageWindow>) -> StoreResult<Vec<Post>>;
    async fn update_post(&self, id: i64, changes: PostChanges) -> StoreResult<Option<Post>>;
    /// Removes the post and its comments.
    async fn delete_post(&self, id: i64) -> StoreResult<bool>;

    async fn create_comment(&self, comment: NewComment) -> StoreResult<Comment>;
    async fn list_comments(&self, post_id: i64) -> StoreResult<Vec<Comment>>;
    async fn get_comment(&self, post_id: i64, id: i64) -> StoreResult<Option<Comment>>;
    async fn update_comment(&self, id: i64, text: String) -> StoreResult<Option<Comment>>;
    async fn delete_comment(&self, id: i64) -> StoreResult<bool>;

    async fn follow_exists(&self, user_id: i64, following_id: i64) -> StoreResult<bool>;
    async fn create_follow(&self, user_id: i64, following_id: i64) -> StoreResult<Follow>;
    /// Edges whose follower is `user_id`, ordered by id. Every term must occur
    /// case-insensitively in either username of the edge.
    async fn list_follows(&self, user_id: i64, terms: &[String]) -> StoreResult<Vec<Follow>>;
}

pub type SharedStore = Arc<dyn Store>;
