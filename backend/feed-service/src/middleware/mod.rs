//! Request identity
//!
//! Authentication happens at the gateway, which forwards the caller's id in
//! `X-User-Id`. Handlers take [`ViewerId`] as an extractor.

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::AuthorId;

pub const VIEWER_HEADER: &str = "X-User-Id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerId(pub AuthorId);

impl ViewerId {
    fn from_header(req: &HttpRequest) -> Result<Self, AppError> {
        let raw = req
            .headers()
            .get(VIEWER_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", VIEWER_HEADER)))?;

        let value = raw
            .to_str()
            .map_err(|_| AppError::Unauthorized(format!("malformed {} header", VIEWER_HEADER)))?;

        Uuid::parse_str(value.trim())
            .map(|id| ViewerId(AuthorId(id)))
            .map_err(|_| AppError::Unauthorized(format!("malformed {} header", VIEWER_HEADER)))
    }
}

impl FromRequest for ViewerId {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Self::from_header(req))
    }
}
