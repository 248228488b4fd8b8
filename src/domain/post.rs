use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    #[serde(skip)]
    pub author_id: i64,
    /// Author's username.
    pub author: String,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    pub image: Option<String>,
    pub group: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: i64,
    pub text: String,
    pub image: Option<String>,
    pub group_id: Option<i64>,
}

/// Partial update. The outer `Option` of `image`/`group_id` marks presence,
/// the inner one carries an explicit null.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub text: Option<String>,
    pub image: Option<Option<String>>,
    pub group_id: Option<Option<i64>>,
}
