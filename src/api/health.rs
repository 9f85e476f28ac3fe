// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::Query,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::auth::{Ctx, Requester};
use crate::error::ApiError;
use crate::push::{authorize_details, health_check, HealthReport};

/// Query parameters for the health check.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct HealthQuery {
    /// `true` to include push failure reasons.
    #[serde(default)]
    pub details: Option<String>,
    /// API key, required with `details=true`.
    #[serde(default)]
    pub key: Option<String>,
}

/// Service health check.
///
/// Always 200; push problems show up as `"status": "warning"`. Asking for
/// details requires an admin viewer, service admin or the service token.
#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "Health",
    params(HealthQuery),
    responses(
        (status = 200, description = "Health report", body = HealthReport),
        (status = 401, description = "Details requested without an admin key")
    )
)]
pub async fn health(Ctx(ctx): Ctx, Query(query): Query<HealthQuery>) -> Result<Response, ApiError> {
    let detailed = query.details.as_deref() == Some("true");

    // Authorize before probing anything so topology never leaks.
    let requester = if detailed {
        let key = query.key.as_deref().unwrap_or_default();
        Some(authorize_details(key, &ctx.service, ctx.store()).await?)
    } else {
        None
    };

    let report = health_check(detailed, &ctx.service, ctx.push.as_deref(), ctx.store()).await;

    let mut response = Json(report).into_response();
    if let Some(uuid) = requester {
        response.extensions_mut().insert(Requester(uuid));
    }
    Ok(response)
}
