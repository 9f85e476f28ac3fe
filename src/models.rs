// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Data Models
//!
//! Request/response bodies of the REST API and the entities read from the
//! store collaborator.
//!
//! ## Model Categories
//!
//! - **Messages**: the unit published to and consumed from a broker
//! - **Store entities**: projects, users, topics and subscriptions
//! - **Operation bodies**: publish, pull, acknowledge and offset calls

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::RoleSet;

// =============================================================================
// Messages
// =============================================================================

/// A message as handed to and returned from a broker backend.
///
/// `message_id` is always assigned by the broker on publish; whatever the
/// caller put there is overwritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Base64 encoded payload.
    pub data: String,
    #[serde(default)]
    pub publish_time: String,
}

impl Message {
    /// Build an unpublished message stamped with the current time.
    pub fn new(data: impl Into<String>, attributes: BTreeMap<String, String>) -> Self {
        Self {
            message_id: String::new(),
            attributes,
            data: data.into(),
            publish_time: Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
        }
    }

    /// Serialized form stored by the broker backends.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Store Entities
// =============================================================================

/// Tenant boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub uuid: String,
    pub name: String,
    #[serde(default = "Utc::now")]
    pub created_on: DateTime<Utc>,
}

/// Roles a user holds inside one project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectRoles {
    pub project_uuid: String,
    pub roles: RoleSet,
}

/// A user identity with its key and roles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub uuid: String,
    pub name: String,
    /// API key presented as `?key=`.
    pub token: String,
    #[serde(default)]
    pub projects: Vec<ProjectRoles>,
    #[serde(default)]
    pub service_roles: RoleSet,
}

impl User {
    /// Roles of this user inside `project_uuid`, empty if not a member.
    pub fn project_roles(&self, project_uuid: &str) -> RoleSet {
        self.projects
            .iter()
            .find(|membership| membership.project_uuid == project_uuid)
            .map(|membership| membership.roles)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topic {
    pub project_uuid: String,
    pub name: String,
}

impl Topic {
    /// Name of the topic on the broker backend.
    pub fn full_name(&self) -> String {
        broker_topic_name(&self.project_uuid, &self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscription {
    pub project_uuid: String,
    pub name: String,
    /// Topic name inside the same project.
    pub topic: String,
    /// Next offset to consume from.
    #[serde(default)]
    pub offset: i64,
}

impl Subscription {
    pub fn full_topic_name(&self) -> String {
        broker_topic_name(&self.project_uuid, &self.topic)
    }
}

/// Broker topics are namespaced by project UUID, never by project name.
pub fn broker_topic_name(project_uuid: &str, topic: &str) -> String {
    format!("{project_uuid}.{topic}")
}

// =============================================================================
// Operation Bodies
// =============================================================================

/// Message as submitted by a publisher.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PublishMessage {
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Base64 encoded payload.
    pub data: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PublishRequest {
    pub messages: Vec<PublishMessage>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub message_ids: Vec<String>,
}

/// Pull options. Values are strings on the wire.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    #[serde(default)]
    pub max_messages: Option<String>,
    #[serde(default)]
    pub return_immediately: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedMessage {
    pub ack_id: String,
    pub message: Message,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    pub received_messages: Vec<ReceivedMessage>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeRequest {
    pub ack_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OffsetsResponse {
    /// Next-available offset of the topic on the broker.
    pub max: i64,
    /// Offset the subscription will consume from next.
    pub current: i64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ModifyOffsetRequest {
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProjectResponse {
    pub name: String,
    pub uuid: String,
    pub created_on: String,
}

impl From<Project> for ProjectResponse {
    fn from(project: Project) -> Self {
        Self {
            name: project.name,
            uuid: project.uuid,
            created_on: project
                .created_on
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}
