// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Route policy table and the authorization decision.
//!
//! Keeping route names and the default table in one place avoids drift
//! between the router, the store seed and the tests.

use std::collections::HashMap;

use tracing::warn;

use super::{Role, RoleSet};
use crate::state::ServiceConfig;
use crate::store::Store;

pub const PROJECTS_CREATE: &str = "projects:create";
pub const TOPICS_PUBLISH: &str = "topics:publish";
pub const SUBSCRIPTIONS_PULL: &str = "subscriptions:pull";
pub const SUBSCRIPTIONS_ACKNOWLEDGE: &str = "subscriptions:acknowledge";
pub const SUBSCRIPTIONS_OFFSETS: &str = "subscriptions:offsets";
pub const SUBSCRIPTIONS_MODIFY_OFFSET: &str = "subscriptions:modifyOffset";

/// Routes served without authentication.
pub const HEALTH: &str = "health";
pub const VERSION: &str = "version";

/// Built-in route → permitted roles table.
pub fn default_route_policies() -> HashMap<String, RoleSet> {
    let consumers = RoleSet::from([Role::ProjectAdmin, Role::Consumer, Role::PushWorker]);

    HashMap::from([
        (PROJECTS_CREATE.to_string(), RoleSet::only(Role::ServiceAdmin)),
        (
            TOPICS_PUBLISH.to_string(),
            RoleSet::from([Role::ProjectAdmin, Role::Publisher]),
        ),
        (SUBSCRIPTIONS_PULL.to_string(), consumers),
        (SUBSCRIPTIONS_ACKNOWLEDGE.to_string(), consumers),
        (
            SUBSCRIPTIONS_OFFSETS.to_string(),
            RoleSet::from([Role::ProjectAdmin, Role::Consumer]),
        ),
        (
            SUBSCRIPTIONS_MODIFY_OFFSET.to_string(),
            RoleSet::only(Role::ProjectAdmin),
        ),
    ])
}

/// Decide whether `roles` may invoke `route`.
///
/// The service token is accepted unconditionally, independently of how the
/// identity was resolved. Otherwise access is granted iff `roles` shares at
/// least one role with the route's entry. A missing entry or a failed lookup
/// denies.
pub async fn authorize(
    route: &str,
    credential: &str,
    roles: &RoleSet,
    service: &ServiceConfig,
    store: &dyn Store,
) -> bool {
    if service.is_service_token(credential) {
        return true;
    }

    match store.route_roles(route).await {
        Ok(Some(permitted)) => roles.intersects(&permitted),
        Ok(None) => {
            warn!(route, "No policy entry for route, denying");
            false
        }
        Err(e) => {
            warn!(route, error = %e, "Policy lookup failed, denying");
            false
        }
    }
}
