// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Push Subsystem
//!
//! The push server delivers consumed messages to subscriber endpoints. This
//! service only needs two things from it: where it lives and whether it is
//! serving. Both are folded into the health report by [`health`].

use async_trait::async_trait;

pub mod health;
pub mod http;

pub use health::{authorize_details, health_check, HealthReport, HealthStatus, PushServerInfo};
pub use http::HttpPushClient;

/// Health signal reported by the push server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushHealth {
    Serving,
    /// Reachable but reporting itself unhealthy.
    NotServing(String),
    /// Could not be reached at all.
    Unreachable(String),
}

impl PushHealth {
    pub fn is_serving(&self) -> bool {
        matches!(self, PushHealth::Serving)
    }

    /// Status string for the health report. Failure details are only
    /// disclosed on detailed checks.
    pub fn format(&self, detailed: bool) -> String {
        match (self, detailed) {
            (PushHealth::Serving, _) => "SERVING".to_string(),
            (PushHealth::NotServing(reason), true) => format!("NOT_SERVING: {reason}"),
            (PushHealth::Unreachable(reason), true) => format!("UNREACHABLE: {reason}"),
            (_, false) => "UNAVAILABLE".to_string(),
        }
    }
}

#[async_trait]
pub trait PushClient: Send + Sync {
    /// Endpoint the client talks to.
    fn target(&self) -> String;

    async fn health_check(&self) -> PushHealth;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_hides_details_unless_asked() {
        let down = PushHealth::Unreachable("connection refused".to_string());
        assert_eq!(down.format(false), "UNAVAILABLE");
        assert_eq!(down.format(true), "UNREACHABLE: connection refused");

        let sick = PushHealth::NotServing("503 Service Unavailable".to_string());
        assert_eq!(sick.format(false), "UNAVAILABLE");
        assert_eq!(sick.format(true), "NOT_SERVING: 503 Service Unavailable");

        assert_eq!(PushHealth::Serving.format(false), "SERVING");
        assert_eq!(PushHealth::Serving.format(true), "SERVING");
        assert!(!down.is_serving());
    }
}
