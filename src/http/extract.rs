use axum::extract::{FromRequest, FromRequestParts};

use crate::http::AppError;

/// `Json` whose rejections render as 400 through [`AppError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// `Path` whose rejections render as 404 through [`AppError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct IdPath<T>(pub T);
