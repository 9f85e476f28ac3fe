// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Request Context
//!
//! Everything a handler needs for one request, assembled once by the
//! pipeline in `auth::middleware` and shared read-only afterwards.
//! Handlers obtain it through the [`Ctx`](crate::auth::Ctx) extractor.

use std::sync::Arc;

use crate::auth::Identity;
use crate::broker::Broker;
use crate::error::ApiError;
use crate::push::PushClient;
use crate::state::ServiceConfig;
use crate::store::{Store, StoreResult, StoreSession};

/// The project named in the request path, resolved against the store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectScope {
    name: Option<String>,
    uuid: Option<String>,
}

impl ProjectScope {
    /// Scope of routes that do not name a project.
    pub fn global() -> Self {
        Self::default()
    }

    /// Look up `name` once. An unknown name yields a scope with a name but
    /// no UUID; the caller decides whether that is an error.
    pub async fn resolve(name: Option<&str>, store: &dyn Store) -> StoreResult<Self> {
        let Some(name) = name else {
            return Ok(Self::global());
        };
        let uuid = store.project_uuid(name).await?;
        Ok(Self {
            name: Some(name.to_string()),
            uuid,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    /// A project was named but does not exist.
    pub fn is_unresolved(&self) -> bool {
        self.name.is_some() && self.uuid.is_none()
    }

    /// UUID of an existing project, 404 otherwise.
    pub fn require_uuid(&self) -> Result<&str, ApiError> {
        self.uuid().ok_or_else(|| ApiError::not_found("project"))
    }
}

/// Per-request state. Never mutated once the pipeline hands it over.
pub struct RequestContext {
    /// Policy name of the matched route.
    pub route: &'static str,
    pub project: ProjectScope,
    pub identity: Identity,
    pub broker: Arc<dyn Broker>,
    /// Private store clone, closed when the context is dropped.
    pub store: StoreSession,
    pub push: Option<Arc<dyn PushClient>>,
    pub service: Arc<ServiceConfig>,
}

impl RequestContext {
    /// The request store as a trait object.
    pub fn store(&self) -> &dyn Store {
        &*self.store
    }
}
