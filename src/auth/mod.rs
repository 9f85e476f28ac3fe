// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! API key authentication and role-based authorization for the pub/sub API.
//!
//! ## Auth Flow
//!
//! 1. The client sends its API key as the `key` query parameter
//! 2. The request pipeline:
//!    - resolves the project named in the path once
//!    - maps the key to a user and the roles it holds in that project
//!    - checks the roles against the route's policy entry
//! 3. The handler reads the resulting context through [`Ctx`]
//!
//! ## Security
//!
//! - Every route except health and version requires a key
//! - The service token passes authentication and authorization
//! - A route without a policy entry is denied
//! - Keys are compared through SHA-256 digests and never logged

pub mod extractor;
pub mod identity;
pub mod middleware;
pub mod policy;
pub mod roles;

pub use extractor::Ctx;
pub use identity::{authenticate, tokens_match, Identity};
pub use middleware::{Requester, RouteScope};
pub use policy::authorize;
pub use roles::{Role, RoleSet};
