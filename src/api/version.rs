// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

/// Build information of the running server.
#[derive(Debug, Serialize, ToSchema)]
pub struct VersionResponse {
    pub release: String,
    /// `BUILD_COMMIT` at compile time, `unknown` otherwise.
    pub commit: String,
    pub build_time: String,
    pub os: String,
    pub arch: String,
}

impl VersionResponse {
    pub fn current() -> Self {
        Self {
            release: env!("CARGO_PKG_VERSION").to_string(),
            commit: option_env!("BUILD_COMMIT").unwrap_or("unknown").to_string(),
            build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/version",
    tag = "Health",
    responses(
        (status = 200, description = "Build information", body = VersionResponse)
    )
)]
pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse::current())
}
