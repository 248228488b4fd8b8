pub mod auth;
pub mod comments;
pub mod error;
pub mod follows;
pub mod groups;
pub mod permissions;
pub mod posts;
pub mod rate_limiter;
