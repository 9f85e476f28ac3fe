// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Resolve an API key into an identity scoped to the request's project.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::policy::PROJECTS_CREATE;
use super::{Role, RoleSet};
use crate::context::ProjectScope;
use crate::error::ApiError;
use crate::state::ServiceConfig;
use crate::store::Store;

/// Who is making the request and which roles they hold for it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identity {
    pub user_name: String,
    /// Empty for anonymous and service-token requests.
    pub user_uuid: String,
    pub roles: RoleSet,
}

impl Identity {
    /// Identity of unauthenticated (public) requests.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Identity granted to holders of the service token. It carries no user.
    pub fn service() -> Self {
        Self {
            roles: RoleSet::only(Role::ServiceAdmin),
            ..Self::default()
        }
    }
}

/// Compare two secrets through their SHA-256 digests so the comparison time
/// does not depend on where they first differ.
pub fn tokens_match(presented: &str, expected: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    bool::from(presented.ct_eq(&expected))
}

/// Resolve `credential` into an [`Identity`] for `route`.
///
/// Checks run in this order:
/// 1. an empty key is rejected with 401
/// 2. a named but unknown project is rejected with 404, except on project
///    creation where the project is expected not to exist yet
/// 3. the service token resolves to a `service_admin` identity
/// 4. the key must belong to a user holding at least one role in scope:
///    project roles inside an existing project, service roles otherwise
pub async fn authenticate(
    route: &str,
    project: &ProjectScope,
    credential: &str,
    service: &ServiceConfig,
    store: &dyn Store,
) -> Result<Identity, ApiError> {
    if credential.is_empty() {
        return Err(ApiError::unauthorized());
    }

    if route != PROJECTS_CREATE && project.is_unresolved() {
        return Err(ApiError::not_found("project"));
    }

    if service.is_service_token(credential) {
        return Ok(Identity::service());
    }

    let Some(user) = store.user_by_token(credential).await? else {
        return Err(ApiError::unauthorized());
    };

    // Project creation is a service-level action even when the name is taken.
    let roles = match project.uuid() {
        Some(uuid) if route != PROJECTS_CREATE => user.project_roles(uuid),
        _ => user.service_roles,
    };
    if roles.is_empty() {
        return Err(ApiError::unauthorized());
    }

    Ok(Identity {
        user_name: user.name,
        user_uuid: user.uuid,
        roles,
    })
}
