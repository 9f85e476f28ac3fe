// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Roles and role sets for authorization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Closed role vocabulary.
///
/// ## Scopes
///
/// - Project roles: `ProjectAdmin`, `Publisher`, `Consumer`
/// - Service roles: `ServiceAdmin`, `AdminViewer`, `PushWorker`
///
/// A user may hold different project roles in every project it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Unrestricted service operator
    ServiceAdmin,
    /// Read-only operator (detailed health, listings)
    AdminViewer,
    /// Manages a single project
    ProjectAdmin,
    /// Publishes to topics of a project
    Publisher,
    /// Pulls from subscriptions of a project
    Consumer,
    /// Identity of the push delivery workers
    PushWorker,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::ServiceAdmin,
        Role::AdminViewer,
        Role::ProjectAdmin,
        Role::Publisher,
        Role::Consumer,
        Role::PushWorker,
    ];

    /// Parse a role name. Matching is exact: `Publisher` or `publisher ` is
    /// not a role.
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "service_admin" => Some(Role::ServiceAdmin),
            "admin_viewer" => Some(Role::AdminViewer),
            "project_admin" => Some(Role::ProjectAdmin),
            "publisher" => Some(Role::Publisher),
            "consumer" => Some(Role::Consumer),
            "push_worker" => Some(Role::PushWorker),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::ServiceAdmin => "service_admin",
            Role::AdminViewer => "admin_viewer",
            Role::ProjectAdmin => "project_admin",
            Role::Publisher => "publisher",
            Role::Consumer => "consumer",
            Role::PushWorker => "push_worker",
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order-irrelevant set of roles.
///
/// Backed by a bitmask so equality, intersection and subset checks are
/// exact and cheap. Serialized as a list of role names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Role>", into = "Vec<Role>")]
pub struct RoleSet(u8);

impl RoleSet {
    pub const fn empty() -> Self {
        RoleSet(0)
    }

    pub fn only(role: Role) -> Self {
        RoleSet(role.bit())
    }

    pub fn with(self, role: Role) -> Self {
        RoleSet(self.0 | role.bit())
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// True when at least one role is present in both sets.
    pub fn intersects(&self, other: &RoleSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn intersection(&self, other: &RoleSet) -> RoleSet {
        RoleSet(self.0 & other.0)
    }

    pub fn is_subset_of(&self, other: &RoleSet) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn is_superset_of(&self, other: &RoleSet) -> bool {
        other.is_subset_of(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        Role::ALL.into_iter().filter(|role| self.contains(*role))
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        iter.into_iter().fold(RoleSet::empty(), RoleSet::with)
    }
}

impl<const N: usize> From<[Role; N]> for RoleSet {
    fn from(roles: [Role; N]) -> Self {
        roles.into_iter().collect()
    }
}

impl From<Vec<Role>> for RoleSet {
    fn from(roles: Vec<Role>) -> Self {
        roles.into_iter().collect()
    }
}

impl From<RoleSet> for Vec<Role> {
    fn from(set: RoleSet) -> Self {
        set.iter().collect()
    }
}

impl std::fmt::Display for RoleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.iter().map(|role| role.as_str()).collect();
        write!(f, "[{}]", names.join(","))
    }
}
