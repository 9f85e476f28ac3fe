// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::Json;
use tracing::info;

use crate::auth::Ctx;
use crate::error::ApiError;
use crate::models::ProjectResponse;
use crate::store::StoreError;

/// Create a project under the name given in the path.
#[utoipa::path(
    post,
    path = "/v1/projects/{project}",
    tag = "Projects",
    params(
        ("project" = String, Path, description = "Project name"),
        ("key" = String, Query, description = "API key")
    ),
    responses(
        (status = 200, description = "Project created", body = ProjectResponse),
        (status = 401, description = "Missing or unknown key"),
        (status = 403, description = "Key is not a service admin"),
        (status = 409, description = "Project already exists")
    )
)]
pub async fn create_project(Ctx(ctx): Ctx) -> Result<Json<ProjectResponse>, ApiError> {
    let name = ctx
        .project
        .name()
        .ok_or_else(|| ApiError::bad_request("Project name missing"))?;
    if ctx.project.uuid().is_some() {
        return Err(ApiError::conflict("Project already exists"));
    }

    let project = match ctx.store().insert_project(name).await {
        Ok(project) => project,
        Err(StoreError::Conflict(_)) => return Err(ApiError::conflict("Project already exists")),
        Err(e) => return Err(e.into()),
    };

    info!(project = %project.name, uuid = %project.uuid, user = %ctx.identity.user_name, "Project created");
    Ok(Json(project.into()))
}
