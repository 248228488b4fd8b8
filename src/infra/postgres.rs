use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::domain::comment::{Comment, NewComment};
use crate::domain::follow::Follow;
use crate::domain::group::{Group, NewGroup};
use crate::domain::post::{NewPost, Post, PostChanges};
use crate::domain::user::{NewUser, User, UserCredentials};
use crate::infra::db::Db;
use crate::infra::store::{PageWindow, Store, StoreResult};

const POST_SELECT: &str = "SELECT p.id, p.author_id, u.username AS author, p.text, p.pub_date, \
                                  p.image, p.group_id \
                           FROM posts p \
                           JOIN users u ON u.id = p.author_id";

const COMMENT_SELECT: &str = "SELECT c.id, c.author_id, u.username AS author, c.post_id, c.text, \
                                     c.created \
                              FROM comments c \
                              JOIN users u ON u.id = c.author_id";

#[async_trait]
impl Store for Db {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(self.pool()).await?;
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let row = sqlx::query(
            "INSERT INTO users (username, email, password_hash) \
             VALUES ($1, $2, $3) \
             RETURNING id, username, email, date_joined",
        )
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .fetch_one(self.pool())
        .await?;

        Ok(user_from_row(&row))
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, date_joined FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, date_joined FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_credentials(&self, username: &str) -> StoreResult<Option<UserCredentials>> {
        let row = sqlx::query(
            "SELECT id, username, email, date_joined, password_hash \
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(|row| UserCredentials {
            user: user_from_row(&row),
            password_hash: row.get("password_hash"),
        }))
    }

    async fn create_group(&self, group: NewGroup) -> StoreResult<Group> {
        let row = sqlx::query(
            "INSERT INTO groups (title, slug, description) VALUES ($1, $2, $3) \
             RETURNING id, title, slug, description",
        )
        .bind(group.title)
        .bind(group.slug)
        .bind(group.description)
        .fetch_one(self.pool())
        .await?;

        Ok(group_from_row(&row))
    }

    async fn list_groups(&self) -> StoreResult<Vec<Group>> {
        let rows = sqlx::query("SELECT id, title, slug, description FROM groups ORDER BY id")
            .fetch_all(self.pool())
            .await?;

        Ok(rows.iter().map(group_from_row).collect())
    }

    async fn get_group(&self, id: i64) -> StoreResult<Option<Group>> {
        let row = sqlx::query("SELECT id, title, slug, description FROM groups WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.as_ref().map(group_from_row))
    }

    async fn create_post(&self, post: NewPost) -> StoreResult<Post> {
        let row = sqlx::query(
            "WITH inserted_post AS ( \
                INSERT INTO posts (author_id, text, image, group_id) \
                VALUES ($1, $2, $3, $4) \
                RETURNING id, author_id, text, pub_date, image, group_id \
             ) \
             SELECT p.*, u.username AS author \
             FROM inserted_post p \
             JOIN users u ON u.id = p.author_id",
        )
        .bind(post.author_id)
        .bind(post.text)
        .bind(post.image)
        .bind(post.group_id)
        .fetch_one(self.pool())
        .await?;

        Ok(post_from_row(&row))
    }

    async fn get_post(&self, id: i64) -> StoreResult<Option<Post>> {
        let row = sqlx::query(&format!("{POST_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    async fn count_posts(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }

    async fn list_posts(&self, window: Option<PageWindow>) -> StoreResult<Vec<Post>> {
        let rows = match window {
            Some(window) => {
                sqlx::query(&format!("{POST_SELECT} ORDER BY p.id LIMIT $1 OFFSET $2"))
                    .bind(window.limit)
                    .bind(window.offset)
                    .fetch_all(self.pool())
                    .await?
            }
            None => {
                sqlx::query(&format!("{POST_SELECT} ORDER BY p.id"))
                    .fetch_all(self.pool())
                    .await?
            }
        };

        Ok(rows.iter().map(post_from_row).collect())
    }

    async fn update_post(&self, id: i64, changes: PostChanges) -> StoreResult<Option<Post>> {
        let (set_image, image) = match changes.image {
            Some(image) => (true, image),
            None => (false, None),
        };
        let (set_group, group_id) = match changes.group_id {
            Some(group_id) => (true, group_id),
            None => (false, None),
        };

        let row = sqlx::query(
            "WITH updated_post AS ( \
                UPDATE posts \
                SET text = COALESCE($2, text), \
                    image = CASE WHEN $3 THEN $4 ELSE image END, \
                    group_id = CASE WHEN $5 THEN $6 ELSE group_id END \
                WHERE id = $1 \
                RETURNING id, author_id, text, pub_date, image, group_id \
             ) \
             SELECT p.*, u.username AS author \
             FROM updated_post p \
             JOIN users u ON u.id = p.author_id",
        )
        .bind(id)
        .bind(changes.text)
        .bind(set_image)
        .bind(image)
        .bind(set_group)
        .bind(group_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    async fn delete_post(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let row = sqlx::query(
            "WITH inserted_comment AS ( \
                INSERT INTO comments (author_id, post_id, text) VALUES ($1, $2, $3) \
                RETURNING id, author_id, post_id, text, created \
             ) \
             SELECT c.*, u.username AS author \
             FROM inserted_comment c \
             JOIN users u ON u.id = c.author_id",
        )
        .bind(comment.author_id)
        .bind(comment.post_id)
        .bind(comment.text)
        .fetch_one(self.pool())
        .await?;

        Ok(comment_from_row(&row))
    }

    async fn list_comments(&self, post_id: i64) -> StoreResult<Vec<Comment>> {
        let rows = sqlx::query(&format!("{COMMENT_SELECT} WHERE c.post_id = $1 ORDER BY c.id"))
            .bind(post_id)
            .fetch_all(self.pool())
            .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    async fn get_comment(&self, post_id: i64, id: i64) -> StoreResult<Option<Comment>> {
        let row = sqlx::query(&format!(
            "{COMMENT_SELECT} WHERE c.id = $1 AND c.post_id = $2"
        ))
        .bind(id)
        .bind(post_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.as_ref().map(comment_from_row))
    }

    async fn update_comment(&self, id: i64, text: String) -> StoreResult<Option<Comment>> {
        let row = sqlx::query(
            "WITH updated_comment AS ( \
                UPDATE comments SET text = $2 WHERE id = $1 \
                RETURNING id, author_id, post_id, text, created \
             ) \
             SELECT c.*, u.username AS author \
             FROM updated_comment c \
             JOIN users u ON u.id = c.author_id",
        )
        .bind(id)
        .bind(text)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.as_ref().map(comment_from_row))
    }

    async fn delete_comment(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn follow_exists(&self, user_id: i64, following_id: i64) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE user_id = $1 AND following_id = $2)",
        )
        .bind(user_id)
        .bind(following_id)
        .fetch_one(self.pool())
        .await?;
        Ok(exists)
    }

    async fn create_follow(&self, user_id: i64, following_id: i64) -> StoreResult<Follow> {
        let row = sqlx::query(
            "WITH inserted_follow AS ( \
                INSERT INTO follows (user_id, following_id) VALUES ($1, $2) \
                RETURNING id, user_id, following_id \
             ) \
             SELECT f.id, f.user_id, u.username AS user_name, \
                    f.following_id, t.username AS following_name \
             FROM inserted_follow f \
             JOIN users u ON u.id = f.user_id \
             JOIN users t ON t.id = f.following_id",
        )
        .bind(user_id)
        .bind(following_id)
        .fetch_one(self.pool())
        .await?;

        Ok(follow_from_row(&row))
    }

    async fn list_follows(&self, user_id: i64, terms: &[String]) -> StoreResult<Vec<Follow>> {
        let patterns: Vec<String> = terms
            .iter()
            .map(|term| format!("%{}%", escape_like(term)))
            .collect();

        let rows = sqlx::query(
            "SELECT f.id, f.user_id, u.username AS user_name, \
                    f.following_id, t.username AS following_name \
             FROM follows f \
             JOIN users u ON u.id = f.user_id \
             JOIN users t ON t.id = f.following_id \
             WHERE f.user_id = $1 \
               AND NOT EXISTS ( \
                   SELECT 1 FROM unnest($2::text[]) AS term(pattern) \
                   WHERE u.username NOT ILIKE term.pattern \
                     AND t.username NOT ILIKE term.pattern \
               ) \
             ORDER BY f.id",
        )
        .bind(user_id)
        .bind(patterns)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(follow_from_row).collect())
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        date_joined: row.get("date_joined"),
    }
}

fn group_from_row(row: &PgRow) -> Group {
    Group {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
    }
}

fn post_from_row(row: &PgRow) -> Post {
    Post {
        id: row.get("id"),
        author_id: row.get("author_id"),
        author: row.get("author"),
        text: row.get("text"),
        pub_date: row.get("pub_date"),
        image: row.get("image"),
        group: row.get("group_id"),
    }
}

fn comment_from_row(row: &PgRow) -> Comment {
    Comment {
        id: row.get("id"),
        author_id: row.get("author_id"),
        author: row.get("author"),
        post: row.get("post_id"),
        text: row.get("text"),
        created: row.get("created"),
    }
}

fn follow_from_row(row: &PgRow) -> Follow {
    Follow {
        id: row.get("id"),
        user_id: row.get("user_id"),
        user: row.get("user_name"),
        following_id: row.get("following_id"),
        following: row.get("following_name"),
    }
}
