// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for the request context.
//!
//! The pipeline in [`middleware`](super::middleware) has already validated,
//! authenticated and authorized the request by the time a handler runs:
//!
//! ```rust,ignore
//! async fn my_handler(Ctx(ctx): Ctx) -> impl IntoResponse {
//!     // ctx.identity, ctx.project, ctx.store ...
//! }
//! ```

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::context::RequestContext;
use crate::error::ApiError;

/// Shared, read-only handle on the [`RequestContext`].
pub struct Ctx(pub Arc<RequestContext>);

impl<S> FromRequestParts<S> for Ctx
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Arc<RequestContext>>()
            .cloned()
            .map(Ctx)
            .ok_or_else(|| ApiError::internal("Request context missing"))
    }
}
