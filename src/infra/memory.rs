//! In-process store used by tests and `STORE_BACKEND=memory`.
//!
//! All tables sit behind one async `RwLock`, so every write is serialized and
//! constraint checks happen atomically with the insert. Data is lost on
//! restart.

use async_trait::async_trait;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::domain::comment::{Comment, NewComment};
use crate::domain::follow::Follow;
use crate::domain::group::{Group, NewGroup};
use crate::domain::post::{NewPost, Post, PostChanges};
use crate::domain::user::{NewUser, User, UserCredentials};
use crate::infra::store::{
    PageWindow, Store, StoreError, StoreResult, COMMENTS_AUTHOR_FKEY, COMMENTS_POST_FKEY,
    FOLLOWS_FOLLOWING_FKEY, FOLLOWS_NO_SELF_FOLLOW, FOLLOWS_USER_FKEY,
    FOLLOWS_USER_FOLLOWING_KEY, GROUPS_SLUG_KEY, POSTS_AUTHOR_FKEY, POSTS_GROUP_FKEY,
    USERS_USERNAME_KEY,
};

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, UserCredentials>,
    groups: BTreeMap<i64, Group>,
    posts: BTreeMap<i64, Post>,
    comments: BTreeMap<i64, Comment>,
    follows: BTreeMap<i64, Follow>,
    last_user_id: i64,
    last_group_id: i64,
    last_post_id: i64,
    last_comment_id: i64,
    last_follow_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn username(&self, user_id: i64, constraint: &str) -> StoreResult<String> {
        self.users
            .get(&user_id)
            .map(|credentials| credentials.user.username.clone())
            .ok_or_else(|| StoreError::ForeignKeyViolation(constraint.to_string()))
    }

    fn check_group(&self, group_id: Option<i64>) -> StoreResult<()> {
        match group_id {
            Some(id) if !self.groups.contains_key(&id) => {
                Err(StoreError::ForeignKeyViolation(POSTS_GROUP_FKEY.to_string()))
            }
            _ => Ok(()),
        }
    }
}

fn next_id(last: &mut i64) -> i64 {
    *last += 1;
    *last
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|existing| existing.user.username == user.username)
        {
            return Err(StoreError::UniqueViolation(USERS_USERNAME_KEY.to_string()));
        }

        let id = next_id(&mut tables.last_user_id);
        let created = User {
            id,
            username: user.username,
            email: user.email,
            date_joined: OffsetDateTime::now_utc(),
        };
        tables.users.insert(
            id,
            UserCredentials {
                user: created.clone(),
                password_hash: user.password_hash,
            },
        );
        Ok(created)
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).map(|credentials| credentials.user.clone()))
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .find_credentials(username)
            .await?
            .map(|credentials| credentials.user))
    }

    async fn find_credentials(&self, username: &str) -> StoreResult<Option<UserCredentials>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|credentials| credentials.user.username == username)
            .cloned())
    }

    async fn create_group(&self, group: NewGroup) -> StoreResult<Group> {
        let mut tables = self.tables.write().await;
        if tables.groups.values().any(|existing| existing.slug == group.slug) {
            return Err(StoreError::UniqueViolation(GROUPS_SLUG_KEY.to_string()));
        }

        let id = next_id(&mut tables.last_group_id);
        let created = Group {
            id,
            title: group.title,
            slug: group.slug,
            description: group.description,
        };
        tables.groups.insert(id, created.clone());
        Ok(created)
    }

    async fn list_groups(&self) -> StoreResult<Vec<Group>> {
        let tables = self.tables.read().await;
        Ok(tables.groups.values().cloned().collect())
    }

    async fn get_group(&self, id: i64) -> StoreResult<Option<Group>> {
        let tables = self.tables.read().await;
        Ok(tables.groups.get(&id).cloned())
    }

    async fn create_post(&self, post: NewPost) -> StoreResult<Post> {
        let mut tables = self.tables.write().await;
        let author = tables.username(post.author_id, POSTS_AUTHOR_FKEY)?;
        tables.check_group(post.group_id)?;

        let id = next_id(&mut tables.last_post_id);
        let created = Post {
            id,
            author_id: post.author_id,
            author,
            text: post.text,
            pub_date: OffsetDateTime::now_utc(),
            image: post.image,
            group: post.group_id,
        };
        tables.posts.insert(id, created.clone());
        Ok(created)
    }

    async fn get_post(&self, id: i64) -> StoreResult<Option<Post>> {
        let tables = self.tables.read().await;
        Ok(tables.posts.get(&id).cloned())
    }

    async fn count_posts(&self) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables.posts.len() as i64)
    }

    async fn list_posts(&self, window: Option<PageWindow>) -> StoreResult<Vec<Post>> {
        let tables = self.tables.read().await;
        let posts = tables.posts.values().cloned();
        Ok(match window {
            Some(window) => posts
                .skip(window.offset.max(0) as usize)
                .take(window.limit.max(0) as usize)
                .collect(),
            None => posts.collect(),
        })
    }

    async fn update_post(&self, id: i64, changes: PostChanges) -> StoreResult<Option<Post>> {
        let mut tables = self.tables.write().await;
        if let Some(group_id) = changes.group_id {
            tables.check_group(group_id)?;
        }

        let Some(post) = tables.posts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(text) = changes.text {
            post.text = text;
        }
        if let Some(image) = changes.image {
            post.image = image;
        }
        if let Some(group_id) = changes.group_id {
            post.group = group_id;
        }
        Ok(Some(post.clone()))
    }

    async fn delete_post(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.posts.remove(&id).is_none() {
            return Ok(false);
        }
        tables.comments.retain(|_, comment| comment.post != id);
        Ok(true)
    }

    async fn create_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let mut tables = self.tables.write().await;
        let author = tables.username(comment.author_id, COMMENTS_AUTHOR_FKEY)?;
        if !tables.posts.contains_key(&comment.post_id) {
            return Err(StoreError::ForeignKeyViolation(COMMENTS_POST_FKEY.to_string()));
        }

        let id = next_id(&mut tables.last_comment_id);
        let created = Comment {
            id,
            author_id: comment.author_id,
            author,
            post: comment.post_id,
            text: comment.text,
            created: OffsetDateTime::now_utc(),
        };
        tables.comments.insert(id, created.clone());
        Ok(created)
    }

    async fn list_comments(&self, post_id: i64) -> StoreResult<Vec<Comment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .values()
            .filter(|comment| comment.post == post_id)
            .cloned()
            .collect())
    }

    async fn get_comment(&self, post_id: i64, id: i64) -> StoreResult<Option<Comment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .comments
            .get(&id)
            .filter(|comment| comment.post == post_id)
            .cloned())
    }

    async fn update_comment(&self, id: i64, text: String) -> StoreResult<Option<Comment>> {
        let mut tables = self.tables.write().await;
        Ok(tables.comments.get_mut(&id).map(|comment| {
            comment.text = text;
            comment.clone()
        }))
    }

    async fn delete_comment(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.comments.remove(&id).is_some())
    }

    async fn follow_exists(&self, user_id: i64, following_id: i64) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .values()
            .any(|edge| edge.user_id == user_id && edge.following_id == following_id))
    }

    async fn create_follow(&self, user_id: i64, following_id: i64) -> StoreResult<Follow> {
        let mut tables = self.tables.write().await;
        if user_id == following_id {
            return Err(StoreError::CheckViolation(FOLLOWS_NO_SELF_FOLLOW.to_string()));
        }
        let user = tables.username(user_id, FOLLOWS_USER_FKEY)?;
        let following = tables.username(following_id, FOLLOWS_FOLLOWING_FKEY)?;
        if tables
            .follows
            .values()
            .any(|edge| edge.user_id == user_id && edge.following_id == following_id)
        {
            return Err(StoreError::UniqueViolation(
                FOLLOWS_USER_FOLLOWING_KEY.to_string(),
            ));
        }

        let id = next_id(&mut tables.last_follow_id);
        let created = Follow {
            id,
            user_id,
            user,
            following_id,
            following,
        };
        tables.follows.insert(id, created.clone());
        Ok(created)
    }

    async fn list_follows(&self, user_id: i64, terms: &[String]) -> StoreResult<Vec<Follow>> {
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .values()
            .filter(|edge| edge.user_id == user_id)
            .filter(|edge| {
                terms.iter().all(|term| {
                    contains_ignore_case(&edge.user, term)
                        || contains_ignore_case(&edge.following, term)
                })
            })
            .cloned()
            .collect())
    }
}
