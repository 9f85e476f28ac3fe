// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory store.
//!
//! Clones share the same data behind a `tokio::sync::RwLock`, the way a
//! connection pool hands out sessions to one database. Each clone counts as
//! an open session until it is closed.
//!
//! The store can be seeded from a JSON document:
//!
//! ```json
//! {
//!   "projects": [{"uuid": "argo_uuid", "name": "ARGO"}],
//!   "users": [{"uuid": "uuid1", "name": "UserA", "token": "S3CR3T1",
//!              "projects": [{"project_uuid": "argo_uuid", "roles": ["publisher"]}]}],
//!   "topics": [{"project_uuid": "argo_uuid", "name": "topic1"}],
//!   "subscriptions": [{"project_uuid": "argo_uuid", "name": "sub1", "topic": "topic1"}],
//!   "policies": {"topics:publish": ["project_admin", "publisher"]}
//! }
//! ```
//!
//! A missing `policies` object falls back to the built-in route policy table.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::auth::{policy::default_route_policies, RoleSet};
use crate::models::{Project, Subscription, Topic, User};

/// Everything the in-memory store holds.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
    #[serde(default = "default_route_policies")]
    pub policies: HashMap<String, RoleSet>,
}

impl Default for StoreData {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            users: Vec::new(),
            topics: Vec::new(),
            subscriptions: Vec::new(),
            policies: default_route_policies(),
        }
    }
}

pub struct InMemoryStore {
    data: Arc<RwLock<StoreData>>,
    sessions: Arc<AtomicUsize>,
    /// Set on request clones only; the process store is never "closed".
    session: bool,
    closed: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::from_data(StoreData::default())
    }

    pub fn from_data(data: StoreData) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            sessions: Arc::new(AtomicUsize::new(0)),
            session: false,
            closed: AtomicBool::new(false),
        }
    }

    /// Load a JSON seed document.
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Unexpected(format!("{}: {e}", path.display())))?;
        let data: StoreData = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Unexpected(format!("{}: {e}", path.display())))?;
        Ok(Self::from_data(data))
    }

    /// Number of request clones not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn project_uuid(&self, name: &str) -> StoreResult<Option<String>> {
        self.ensure_open()?;
        let data = self.data.read().await;
        Ok(data
            .projects
            .iter()
            .find(|project| project.name == name)
            .map(|project| project.uuid.clone()))
    }

    async fn insert_project(&self, name: &str) -> StoreResult<Project> {
        self.ensure_open()?;
        let mut data = self.data.write().await;
        if data.projects.iter().any(|project| project.name == name) {
            return Err(StoreError::Conflict(format!("project {name}")));
        }

        let project = Project {
            uuid: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_on: Utc::now(),
        };
        data.projects.push(project.clone());
        Ok(project)
    }

    async fn user_by_token(&self, token: &str) -> StoreResult<Option<User>> {
        self.ensure_open()?;
        if token.is_empty() {
            return Ok(None);
        }
        let data = self.data.read().await;
        Ok(data.users.iter().find(|user| user.token == token).cloned())
    }

    async fn route_roles(&self, route: &str) -> StoreResult<Option<RoleSet>> {
        self.ensure_open()?;
        let data = self.data.read().await;
        Ok(data.policies.get(route).copied())
    }

    async fn topic(&self, project_uuid: &str, name: &str) -> StoreResult<Option<Topic>> {
        self.ensure_open()?;
        let data = self.data.read().await;
        Ok(data
            .topics
            .iter()
            .find(|topic| topic.project_uuid == project_uuid && topic.name == name)
            .cloned())
    }

    async fn subscription(
        &self,
        project_uuid: &str,
        name: &str,
    ) -> StoreResult<Option<Subscription>> {
        self.ensure_open()?;
        let data = self.data.read().await;
        Ok(data
            .subscriptions
            .iter()
            .find(|sub| sub.project_uuid == project_uuid && sub.name == name)
            .cloned())
    }

    async fn update_subscription_offset(
        &self,
        project_uuid: &str,
        name: &str,
        offset: i64,
    ) -> StoreResult<()> {
        self.ensure_open()?;
        let mut data = self.data.write().await;
        let Some(sub) = data
            .subscriptions
            .iter_mut()
            .find(|sub| sub.project_uuid == project_uuid && sub.name == name)
        else {
            return Err(StoreError::NotFound(format!("subscription {name}")));
        };
        sub.offset = offset;
        Ok(())
    }

    async fn advance_subscription_offset(
        &self,
        project_uuid: &str,
        name: &str,
        offset: i64,
    ) -> StoreResult<i64> {
        self.ensure_open()?;
        let mut data = self.data.write().await;
        let Some(sub) = data
            .subscriptions
            .iter_mut()
            .find(|sub| sub.project_uuid == project_uuid && sub.name == name)
        else {
            return Err(StoreError::NotFound(format!("subscription {name}")));
        };
        sub.offset = sub.offset.max(offset);
        Ok(sub.offset)
    }

    fn clone_store(&self) -> Box<dyn Store> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Box::new(InMemoryStore {
            data: Arc::clone(&self.data),
            sessions: Arc::clone(&self.sessions),
            session: true,
            closed: AtomicBool::new(false),
        })
    }

    fn close(&self) {
        if self.session && !self.closed.swap(true, Ordering::SeqCst) {
            self.sessions.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
impl InMemoryStore {
    /// Store with one populated project used across the test suite.
    ///
    /// | user     | key        | roles                                  |
    /// |----------|------------|----------------------------------------|
    /// | UserA    | S3CR3T1    | ARGO: consumer, publisher; ARGO2: consumer |
    /// | UserB    | S3CR3T2    | ARGO: publisher                        |
    /// | UserZ    | S3CR3T3    | ARGO: project_admin                    |
    /// | PushUser | push_token | service: push_worker; ARGO: consumer   |
    /// | Viewer   | VIEWERKEY  | service: admin_viewer                  |
    /// | Operator | ADMINKEY   | service: service_admin                 |
    pub(crate) fn fixture() -> Self {
        use crate::auth::Role;
        use crate::models::ProjectRoles;

        fn user(uuid: &str, name: &str, token: &str, projects: Vec<ProjectRoles>, service: RoleSet) -> User {
            User {
                uuid: uuid.into(),
                name: name.into(),
                token: token.into(),
                projects,
                service_roles: service,
            }
        }
        fn member(project_uuid: &str, roles: RoleSet) -> ProjectRoles {
            ProjectRoles {
                project_uuid: project_uuid.into(),
                roles,
            }
        }

        let project = |uuid: &str, name: &str| Project {
            uuid: uuid.into(),
            name: name.into(),
            created_on: Utc::now(),
        };
        let topic = |name: &str| Topic {
            project_uuid: "argo_uuid".into(),
            name: name.into(),
        };
        let subscription = |name: &str, topic: &str| Subscription {
            project_uuid: "argo_uuid".into(),
            name: name.into(),
            topic: topic.into(),
            offset: 0,
        };

        Self::from_data(StoreData {
            projects: vec![project("argo_uuid", "ARGO"), project("argo_uuid2", "ARGO2")],
            users: vec![
                user(
                    "uuid1",
                    "UserA",
                    "S3CR3T1",
                    vec![
                        member("argo_uuid", RoleSet::from([Role::Consumer, Role::Publisher])),
                        member("argo_uuid2", RoleSet::only(Role::Consumer)),
                    ],
                    RoleSet::empty(),
                ),
                user(
                    "uuid2",
                    "UserB",
                    "S3CR3T2",
                    vec![member("argo_uuid", RoleSet::only(Role::Publisher))],
                    RoleSet::empty(),
                ),
                user(
                    "uuid3",
                    "UserZ",
                    "S3CR3T3",
                    vec![member("argo_uuid", RoleSet::only(Role::ProjectAdmin))],
                    RoleSet::empty(),
                ),
                user(
                    "uuid4",
                    "PushUser",
                    "push_token",
                    vec![member("argo_uuid", RoleSet::only(Role::Consumer))],
                    RoleSet::only(Role::PushWorker),
                ),
                user("uuid5", "Viewer", "VIEWERKEY", Vec::new(), RoleSet::only(Role::AdminViewer)),
                user("uuid6", "Operator", "ADMINKEY", Vec::new(), RoleSet::only(Role::ServiceAdmin)),
            ],
            topics: vec![topic("topic1"), topic("topic2"), topic("topic3")],
            subscriptions: vec![subscription("sub1", "topic1"), subscription("sub2", "topic2")],
            policies: default_route_policies(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{policy, Role};
    use std::io::Write;

    #[tokio::test]
    async fn resolves_projects_by_name() {
        let store = InMemoryStore::fixture();
        assert_eq!(store.project_uuid("ARGO").await.unwrap().as_deref(), Some("argo_uuid"));
        assert_eq!(store.project_uuid("argo").await.unwrap(), None);
    }

    #[tokio::test]
    async fn insert_project_rejects_duplicates() {
        let store = InMemoryStore::fixture();
        let created = store.insert_project("NEWPROJ").await.unwrap();
        assert_eq!(store.project_uuid("NEWPROJ").await.unwrap(), Some(created.uuid));

        let err = store.insert_project("ARGO").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn empty_token_never_matches() {
        let mut data = StoreData::default();
        data.users.push(User {
            uuid: "u".into(),
            name: "blank".into(),
            token: String::new(),
            projects: Vec::new(),
            service_roles: RoleSet::only(Role::ServiceAdmin),
        });
        let store = InMemoryStore::from_data(data);
        assert!(store.user_by_token("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clones_share_data_and_close_once() {
        let store = InMemoryStore::fixture();
        let session = store.clone_store();
        session
            .update_subscription_offset("argo_uuid", "sub1", 4)
            .await
            .unwrap();
        assert_eq!(
            store.subscription("argo_uuid", "sub1").await.unwrap().unwrap().offset,
            4
        );

        assert_eq!(store.open_sessions(), 1);
        session.close();
        session.close();
        assert_eq!(store.open_sessions(), 0);
        assert!(matches!(
            session.project_uuid("ARGO").await,
            Err(StoreError::Closed)
        ));

        // The process store itself stays usable.
        store.close();
        assert!(store.project_uuid("ARGO").await.is_ok());
    }

    #[tokio::test]
    async fn updating_unknown_subscription_fails() {
        let store = InMemoryStore::fixture();
        let err = store
            .update_subscription_offset("argo_uuid", "nope", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn advancing_never_moves_the_offset_back() {
        let store = InMemoryStore::fixture();
        assert_eq!(store.advance_subscription_offset("argo_uuid", "sub1", 10).await.unwrap(), 10);
        assert_eq!(store.advance_subscription_offset("argo_uuid", "sub1", 1).await.unwrap(), 10);
        assert_eq!(
            store.subscription("argo_uuid", "sub1").await.unwrap().unwrap().offset,
            10
        );

        let err = store
            .advance_subscription_offset("argo_uuid", "nope", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_advances_keep_the_highest_offset() {
        let store = Arc::new(InMemoryStore::fixture());
        let mut tasks = Vec::new();
        for offset in (1..=50).rev() {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                let session = store.clone_store();
                session.advance_subscription_offset("argo_uuid", "sub1", offset).await.unwrap();
                session.close();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(
            store.subscription("argo_uuid", "sub1").await.unwrap().unwrap().offset,
            50
        );
    }

    #[tokio::test]
    async fn loads_seed_file_with_default_policies() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "projects": [{{"uuid": "p1", "name": "PROJ"}}],
                "users": [{{"uuid": "u1", "name": "alice", "token": "k1",
                            "projects": [{{"project_uuid": "p1", "roles": ["publisher"]}}]}}]
            }}"#
        )
        .unwrap();

        let store = InMemoryStore::load(file.path()).unwrap();
        let user = store.user_by_token("k1").await.unwrap().unwrap();
        assert_eq!(user.project_roles("p1"), RoleSet::only(Role::Publisher));
        assert!(store
            .route_roles(policy::TOPICS_PUBLISH)
            .await
            .unwrap()
            .is_some());
    }

    #[test]
    fn seed_with_unknown_role_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"policies": {{"topics:publish": ["publsher"]}}}}"#).unwrap();
        assert!(InMemoryStore::load(file.path()).is_err());
    }
}
