// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::tokens_match;
use crate::broker::{Broker, MemoryBroker};
use crate::push::PushClient;
use crate::store::{InMemoryStore, Store};

/// Service-wide settings consulted by the request pipeline.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Operator token that passes every authentication and authorization
    /// check. `None` disables the bypass.
    pub service_token: Option<String>,
    pub push_enabled: bool,
    /// Key of the user the push server acts as.
    pub push_worker_token: String,
}

impl ServiceConfig {
    pub fn is_service_token(&self, credential: &str) -> bool {
        match self.service_token.as_deref() {
            Some(token) if !token.is_empty() && !credential.is_empty() => {
                tokens_match(credential, token)
            }
            _ => false,
        }
    }
}

/// Process-wide collaborators, cloned into every route's pipeline.
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<dyn Broker>,
    pub store: Arc<dyn Store>,
    pub push: Option<Arc<dyn PushClient>>,
    pub service: Arc<ServiceConfig>,
}

impl AppState {
    pub fn new(broker: Arc<dyn Broker>, store: Arc<dyn Store>, service: ServiceConfig) -> Self {
        Self {
            broker,
            store,
            push: None,
            service: Arc::new(service),
        }
    }

    pub fn with_push_client(mut self, push: Arc<dyn PushClient>) -> Self {
        self.push = Some(push);
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(
            Arc::new(MemoryBroker::new()),
            Arc::new(InMemoryStore::new()),
            ServiceConfig::default(),
        )
    }
}
