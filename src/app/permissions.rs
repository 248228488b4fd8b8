//! Authorization predicates.
//!
//! Every function here is pure: it looks at who is calling, how (read or
//! write) and the resource, and answers yes or no. Services turn a "no" into
//! [`ServiceError::Forbidden`] or [`ServiceError::Unauthenticated`].

use axum::http::Method;

use crate::app::error::{ServiceError, ServiceResult};
use crate::domain::comment::Comment;
use crate::domain::follow::Follow;
use crate::domain::post::Post;

pub const FORBIDDEN_MESSAGE: &str = "you do not have permission to perform this action";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    pub fn from_method(method: &Method) -> Self {
        if is_safe_method(method) {
            Access::Read
        } else {
            Access::Write
        }
    }
}

/// GET, HEAD and OPTIONS never mutate state.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// The acting user (if any) and the kind of access requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub actor: Option<i64>,
    pub access: Access,
}

impl Caller {
    pub fn new(actor: Option<i64>, method: &Method) -> Self {
        Self {
            actor,
            access: Access::from_method(method),
        }
    }
}

pub trait Authored {
    fn author_id(&self) -> i64;
}

impl Authored for Post {
    fn author_id(&self) -> i64 {
        self.author_id
    }
}

impl Authored for Comment {
    fn author_id(&self) -> i64 {
        self.author_id
    }
}

/// Author-only mutation: reads are open, writes need the author.
pub fn can_modify<R: Authored>(caller: Caller, resource: &R) -> bool {
    caller.access == Access::Read || caller.actor == Some(resource.author_id())
}

/// Follow edges are visible to authenticated callers only, and only the
/// follower may change one.
pub fn can_modify_follow(caller: Caller, follow: &Follow) -> bool {
    match caller.actor {
        Some(actor) => caller.access == Access::Read || actor == follow.user_id,
        None => false,
    }
}

pub fn require_authenticated(caller: Caller) -> ServiceResult<i64> {
    caller.actor.ok_or(ServiceError::Unauthenticated)
}

pub fn ensure(allowed: bool) -> ServiceResult<()> {
    if allowed {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(FORBIDDEN_MESSAGE.to_string()))
    }
}
