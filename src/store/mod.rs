// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Store Collaborator
//!
//! Read access to projects, users, topics, subscriptions and the route
//! policy table. The request pipeline never shares a store handle between
//! requests: each request opens a [`StoreSession`] (a clone of the process
//! store) that is closed exactly once when the session is dropped, whatever
//! the outcome of the request.

use std::ops::Deref;

use async_trait::async_trait;

use crate::auth::RoleSet;
use crate::models::{Project, Subscription, Topic, User};

pub mod memory;

pub use memory::{InMemoryStore, StoreData};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("store handle used after close")]
    Closed,
    #[error("unexpected store failure: {0}")]
    Unexpected(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Resolve a project name to its UUID.
    async fn project_uuid(&self, name: &str) -> StoreResult<Option<String>>;

    /// Register a new project under a fresh UUID.
    async fn insert_project(&self, name: &str) -> StoreResult<Project>;

    /// Find the user holding the API key `token`.
    async fn user_by_token(&self, token: &str) -> StoreResult<Option<User>>;

    /// Roles permitted to invoke `route`. `None` when the route has no entry.
    async fn route_roles(&self, route: &str) -> StoreResult<Option<RoleSet>>;

    async fn topic(&self, project_uuid: &str, name: &str) -> StoreResult<Option<Topic>>;

    async fn subscription(&self, project_uuid: &str, name: &str)
        -> StoreResult<Option<Subscription>>;

    async fn update_subscription_offset(
        &self,
        project_uuid: &str,
        name: &str,
        offset: i64,
    ) -> StoreResult<()>;

    /// Move the subscription offset to `offset` unless it is already past
    /// it. Returns the offset the subscription ends up at.
    async fn advance_subscription_offset(
        &self,
        project_uuid: &str,
        name: &str,
        offset: i64,
    ) -> StoreResult<i64>;

    /// Private handle for one request.
    fn clone_store(&self) -> Box<dyn Store>;

    /// Release this handle. Further calls fail with [`StoreError::Closed`].
    fn close(&self);
}

/// Request-scoped store handle, closed on drop.
pub struct StoreSession {
    inner: Box<dyn Store>,
}

impl StoreSession {
    pub fn open(store: &dyn Store) -> Self {
        Self {
            inner: store.clone_store(),
        }
    }
}

impl Deref for StoreSession {
    type Target = dyn Store;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl Drop for StoreSession {
    fn drop(&mut self) {
        self.inner.close();
    }
}
