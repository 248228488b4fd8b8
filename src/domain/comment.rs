use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    #[serde(skip)]
    pub author_id: i64,
    pub author: String,
    pub post: i64,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub author_id: i64,
    pub post_id: i64,
    pub text: String,
}
