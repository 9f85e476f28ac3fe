// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Service health aggregation.
//!
//! Publishing and consuming stay available when the push subsystem is
//! unhealthy, so push problems degrade the report to `warning` and never
//! fail the health request itself.

use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use super::PushClient;
use crate::auth::{Role, RoleSet};
use crate::error::ApiError;
use crate::state::ServiceConfig;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PushServerInfo {
    pub endpoint: String,
    pub status: String,
}

/// Snapshot of service health for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct HealthReport {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub push_servers: Vec<PushServerInfo>,
    /// `"disabled"` when push delivery is switched off.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_functionality: Option<String>,
}

impl HealthReport {
    fn ok() -> Self {
        Self {
            status: HealthStatus::Ok,
            push_servers: Vec::new(),
            push_functionality: None,
        }
    }

    fn degrade(&mut self) {
        self.status = HealthStatus::Warning;
    }
}

/// Gate for `details=true`: only admin viewers, service admins and the
/// service token may see push topology. Returns the requester's UUID
/// (empty for the service token).
pub async fn authorize_details(
    credential: &str,
    service: &ServiceConfig,
    store: &dyn Store,
) -> Result<String, ApiError> {
    if service.is_service_token(credential) {
        return Ok(String::new());
    }
    if credential.is_empty() {
        return Err(ApiError::unauthorized());
    }

    let viewers = RoleSet::from([Role::AdminViewer, Role::ServiceAdmin]);
    match store.user_by_token(credential).await? {
        Some(user) if user.service_roles.intersects(&viewers) => Ok(user.uuid),
        _ => Err(ApiError::unauthorized()),
    }
}

/// Build the health report. Callers asking for `detailed` output must have
/// passed [`authorize_details`] first.
pub async fn health_check(
    detailed: bool,
    service: &ServiceConfig,
    push: Option<&dyn PushClient>,
    store: &dyn Store,
) -> HealthReport {
    let mut report = HealthReport::ok();

    if !service.push_enabled {
        report.push_functionality = Some("disabled".to_string());
        return report;
    }

    if !push_worker_valid(&service.push_worker_token, store).await {
        report.degrade();
    }

    let Some(client) = push else {
        warn!("Push is enabled but no push client is configured");
        report.degrade();
        return report;
    };

    let health = client.health_check().await;
    if !health.is_serving() {
        report.degrade();
    }
    report.push_servers.push(PushServerInfo {
        endpoint: client.target(),
        status: health.format(detailed),
    });

    report
}

/// The push worker token must belong to a user holding `push_worker`.
async fn push_worker_valid(token: &str, store: &dyn Store) -> bool {
    if token.is_empty() {
        warn!("Push worker token is not configured");
        return false;
    }
    match store.user_by_token(token).await {
        Ok(Some(user)) if user.service_roles.contains(Role::PushWorker) => true,
        Ok(_) => {
            warn!("Push worker token does not belong to a push worker");
            false
        }
        Err(e) => {
            warn!(error = %e, "Push worker token lookup failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::testing::RecordingPushClient;
    use crate::push::PushHealth;
    use crate::store::InMemoryStore;
    use axum::http::StatusCode;

    fn service(push_enabled: bool, worker: &str) -> ServiceConfig {
        ServiceConfig {
            service_token: Some("SERVICE_TOKEN".to_string()),
            push_enabled,
            push_worker_token: worker.to_string(),
        }
    }

    #[tokio::test]
    async fn push_disabled_reports_only_the_flag() {
        let store = InMemoryStore::fixture();
        let client = RecordingPushClient::new(PushHealth::Serving);

        let report = health_check(true, &service(false, ""), Some(&client), &store).await;
        assert_eq!(report.status, HealthStatus::Ok);
        assert_eq!(report.push_functionality.as_deref(), Some("disabled"));
        assert!(report.push_servers.is_empty());
        assert_eq!(client.probes(), 0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json, serde_json::json!({"status": "ok", "push_functionality": "disabled"}));
    }

    #[tokio::test]
    async fn healthy_push_is_ok() {
        let store = InMemoryStore::fixture();
        let client = RecordingPushClient::new(PushHealth::Serving);

        let report = health_check(false, &service(true, "push_token"), Some(&client), &store).await;
        assert_eq!(report.status, HealthStatus::Ok);
        assert_eq!(
            report.push_servers,
            vec![PushServerInfo {
                endpoint: "push.local:5555".to_string(),
                status: "SERVING".to_string(),
            }]
        );
        assert!(report.push_functionality.is_none());
    }

    #[tokio::test]
    async fn invalid_worker_token_degrades() {
        let store = InMemoryStore::fixture();
        let client = RecordingPushClient::new(PushHealth::Serving);

        for token in ["", "missing", "S3CR3T1"] {
            let report = health_check(false, &service(true, token), Some(&client), &store).await;
            assert_eq!(report.status, HealthStatus::Warning, "token {token:?}");
            assert_eq!(report.push_servers.len(), 1);
        }
    }

    #[tokio::test]
    async fn unhealthy_push_degrades_and_hides_reason() {
        let store = InMemoryStore::fixture();
        let client = RecordingPushClient::new(PushHealth::Unreachable("refused".to_string()));

        let report = health_check(false, &service(true, "push_token"), Some(&client), &store).await;
        assert_eq!(report.status, HealthStatus::Warning);
        assert_eq!(report.push_servers[0].status, "UNAVAILABLE");

        let report = health_check(true, &service(true, "push_token"), Some(&client), &store).await;
        assert_eq!(report.push_servers[0].status, "UNREACHABLE: refused");
    }

    #[tokio::test]
    async fn missing_client_degrades() {
        let store = InMemoryStore::fixture();
        let report = health_check(false, &service(true, "push_token"), None, &store).await;
        assert_eq!(report.status, HealthStatus::Warning);
        assert!(report.push_servers.is_empty());
    }

    #[tokio::test]
    async fn details_require_admin_roles() {
        let store = InMemoryStore::fixture();
        let config = service(true, "push_token");

        assert_eq!(authorize_details("VIEWERKEY", &config, &store).await.unwrap(), "uuid5");
        assert_eq!(authorize_details("ADMINKEY", &config, &store).await.unwrap(), "uuid6");
        assert_eq!(authorize_details("SERVICE_TOKEN", &config, &store).await.unwrap(), "");

        for key in ["", "S3CR3T1", "push_token", "WRONG"] {
            let err = authorize_details(key, &config, &store).await.unwrap_err();
            assert_eq!(err.status, StatusCode::UNAUTHORIZED, "key {key:?}");
        }
    }
}
