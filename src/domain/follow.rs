use serde::{Deserialize, Serialize};

/// Directed edge: `user` follows `following`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    pub id: i64,
    #[serde(skip)]
    pub user_id: i64,
    pub user: String,
    #[serde(skip)]
    pub following_id: i64,
    pub following: String,
}
