// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request pipeline middleware.
//!
//! Every route is wrapped in one of two pipelines:
//!
//! | Pipeline | Stages |
//! |----------|--------|
//! | [`secure`] | validate → inject → authenticate → authorize → handler → log |
//! | [`public`] | validate → inject → handler → log |
//!
//! The first failing stage writes the error response and no later stage
//! runs, except logging which always runs. The request context is built
//! once and inserted into the request extensions as an
//! `Arc<RequestContext>`; its store session closes when the last reference
//! is dropped, whatever the outcome.
//!
//! ```rust,ignore
//! let publish = post(topics::publish).route_layer(from_fn_with_state(
//!     RouteScope::new(state.clone(), policy::TOPICS_PUBLISH),
//!     middleware::secure,
//! ));
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::PathRejection, FromRequestParts, Path, Query, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::info;

use super::{authenticate, authorize, Identity};
use crate::context::{ProjectScope, RequestContext};
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::{StoreError, StoreSession};
use crate::validation::validate_path_params;

/// Middleware state: the shared collaborators plus the route's policy name.
#[derive(Clone)]
pub struct RouteScope {
    pub state: AppState,
    pub route: &'static str,
}

impl RouteScope {
    pub fn new(state: AppState, route: &'static str) -> Self {
        Self { state, route }
    }
}

/// Requester recorded by a handler that authenticates on its own.
///
/// Public routes carry an anonymous identity; a handler that later resolves
/// the caller inserts this into the response extensions so the request log
/// still names them.
#[derive(Debug, Clone)]
pub struct Requester(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Authenticated,
    Public,
}

/// A stage failure, with the caller's UUID when authentication already
/// resolved it.
#[derive(Debug)]
struct Rejected {
    error: ApiError,
    requester: String,
}

impl From<ApiError> for Rejected {
    fn from(error: ApiError) -> Self {
        Self {
            error,
            requester: String::new(),
        }
    }
}

impl From<StoreError> for Rejected {
    fn from(error: StoreError) -> Self {
        ApiError::from(error).into()
    }
}

#[derive(Debug, Default, Deserialize)]
struct KeyQuery {
    #[serde(default)]
    key: String,
}

/// Pipeline for routes that require an authorized API key.
pub async fn secure(State(scope): State<RouteScope>, request: Request, next: Next) -> Response {
    run(scope, request, next, Access::Authenticated).await
}

/// Pipeline for unauthenticated routes.
pub async fn public(State(scope): State<RouteScope>, request: Request, next: Next) -> Response {
    run(scope, request, next, Access::Public).await
}

async fn run(scope: RouteScope, request: Request, next: Next, access: Access) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    // The query string carries the API key and is never logged.
    let path = request.uri().path().to_string();
    let (mut parts, body) = request.into_parts();

    let (response, requester) = match admit(&scope, &mut parts, access).await {
        Ok(context) => {
            let requester = context.identity.user_uuid.clone();
            parts.extensions.insert(context);
            let response = next.run(Request::from_parts(parts, body)).await;
            let requester = response
                .extensions()
                .get::<Requester>()
                .map(|r| r.0.clone())
                .unwrap_or(requester);
            (response, requester)
        }
        Err(Rejected { error, requester }) => (error.into_response(), requester),
    };

    info!(
        "type" = "request_log",
        method = %method,
        path = %path,
        action = scope.route,
        requester = %requester,
        status = response.status().as_u16(),
        processing_time = ?started.elapsed(),
        "Request handled"
    );

    response
}

/// Run every stage before the handler and build the request context.
async fn admit(
    scope: &RouteScope,
    parts: &mut Parts,
    access: Access,
) -> Result<Arc<RequestContext>, Rejected> {
    let params = path_params(parts).await?;
    validate_path_params(&params)?;

    let state = &scope.state;
    let store = StoreSession::open(state.store.as_ref());
    let project = ProjectScope::resolve(params.get("project").map(String::as_str), &*store).await?;

    let identity = match access {
        Access::Public => Identity::anonymous(),
        Access::Authenticated => {
            let credential = credential(parts);
            let identity =
                authenticate(scope.route, &project, &credential, &state.service, &*store).await?;
            if !authorize(scope.route, &credential, &identity.roles, &state.service, &*store).await
            {
                return Err(Rejected {
                    error: ApiError::forbidden(),
                    requester: identity.user_uuid,
                });
            }
            identity
        }
    };

    Ok(Arc::new(RequestContext {
        route: scope.route,
        project,
        identity,
        broker: Arc::clone(&state.broker),
        store,
        push: state.push.clone(),
        service: Arc::clone(&state.service),
    }))
}

async fn path_params(parts: &mut Parts) -> Result<BTreeMap<String, String>, ApiError> {
    match Path::<BTreeMap<String, String>>::from_request_parts(parts, &()).await {
        Ok(Path(params)) => Ok(params),
        Err(PathRejection::MissingPathParams(_)) => Ok(BTreeMap::new()),
        Err(e) => Err(ApiError::bad_request(e.body_text())),
    }
}

/// The `key` query parameter, empty when absent or unparsable.
fn credential(parts: &Parts) -> String {
    Query::<KeyQuery>::try_from_uri(&parts.uri)
        .map(|Query(q)| q.key)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{policy, Ctx};
    use crate::broker::MemoryBroker;
    use crate::state::ServiceConfig;
    use crate::store::InMemoryStore;
    use axum::{
        body::{to_bytes, Body},
        http::{self, StatusCode},
        middleware::from_fn_with_state,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn whoami(Ctx(ctx): Ctx) -> Json<Value> {
        Json(json!({
            "user": ctx.identity.user_name,
            "project": ctx.project.uuid(),
            "route": ctx.route,
            "roles": ctx.identity.roles,
        }))
    }

    fn app(store: Arc<InMemoryStore>) -> Router {
        let service = ServiceConfig {
            service_token: Some("SERVICE_TOKEN".to_string()),
            ..ServiceConfig::default()
        };
        let state = AppState::new(Arc::new(MemoryBroker::new()), store, service);

        Router::new()
            .route(
                "/projects/{project}/topics/{topic}",
                post(whoami).route_layer(from_fn_with_state(
                    RouteScope::new(state.clone(), policy::TOPICS_PUBLISH),
                    secure,
                )),
            )
            .route(
                "/open",
                get(whoami).route_layer(from_fn_with_state(
                    RouteScope::new(state, policy::HEALTH),
                    public,
                )),
            )
    }

    async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(http::Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn authorized_request_reaches_handler_with_context() {
        let store = Arc::new(InMemoryStore::fixture());
        let (status, body) = call(
            app(Arc::clone(&store)),
            "POST",
            "/projects/ARGO/topics/topic1?key=S3CR3T2",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"], "UserB");
        assert_eq!(body["project"], "argo_uuid");
        assert_eq!(body["route"], "topics:publish");
        assert_eq!(store.open_sessions(), 0);
    }

    #[tokio::test]
    async fn stage_failures_short_circuit() {
        let cases = [
            ("/projects/ARGO/topics/bad.topic?key=S3CR3T2", StatusCode::BAD_REQUEST),
            ("/projects/ARGO/topics/topic1", StatusCode::UNAUTHORIZED),
            ("/projects/NOPE/topics/topic1?key=S3CR3T2", StatusCode::NOT_FOUND),
            ("/projects/ARGO/topics/topic1?key=WRONG", StatusCode::UNAUTHORIZED),
            ("/projects/ARGO2/topics/topic1?key=S3CR3T1", StatusCode::FORBIDDEN),
        ];

        for (uri, expected) in cases {
            let store = Arc::new(InMemoryStore::fixture());
            let (status, body) = call(app(Arc::clone(&store)), "POST", uri).await;
            assert_eq!(status, expected, "{uri}");
            assert_eq!(body["error"]["code"], expected.as_u16(), "{uri}");
            assert_eq!(store.open_sessions(), 0, "{uri}");
        }
    }

    #[tokio::test]
    async fn validation_runs_before_authentication() {
        let store = Arc::new(InMemoryStore::fixture());
        let (status, body) = call(app(store), "POST", "/projects/AR.GO/topics/topic1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Invalid project name");
    }

    #[tokio::test]
    async fn service_token_bypasses_roles() {
        let store = Arc::new(InMemoryStore::fixture());
        let (status, body) = call(
            app(store),
            "POST",
            "/projects/ARGO2/topics/topic1?key=SERVICE_TOKEN",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"], "");
        assert_eq!(body["roles"], json!(["service_admin"]));
    }

    fn scope(store: Arc<InMemoryStore>, route: &'static str) -> RouteScope {
        let service = ServiceConfig {
            service_token: Some("SERVICE_TOKEN".to_string()),
            ..ServiceConfig::default()
        };
        RouteScope::new(AppState::new(Arc::new(MemoryBroker::new()), store, service), route)
    }

    fn parts(uri: &str) -> Parts {
        http::Request::builder().uri(uri).body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn denied_requests_keep_the_authenticated_requester() {
        let store = Arc::new(InMemoryStore::fixture());
        let scope = scope(Arc::clone(&store), policy::TOPICS_PUBLISH);

        // Viewer authenticates through service roles but may not publish.
        let mut denied = parts("/publish?key=VIEWERKEY");
        let Err(rejected) = admit(&scope, &mut denied, Access::Authenticated).await else {
            panic!("viewer must not be admitted to publish");
        };
        assert_eq!(rejected.error.status, StatusCode::FORBIDDEN);
        assert_eq!(rejected.requester, "uuid5");

        let mut unknown = parts("/publish?key=WRONG");
        let Err(rejected) = admit(&scope, &mut unknown, Access::Authenticated).await else {
            panic!("unknown key must not be admitted");
        };
        assert_eq!(rejected.error.status, StatusCode::UNAUTHORIZED);
        assert!(rejected.requester.is_empty());
        assert_eq!(store.open_sessions(), 0);
    }

    #[tokio::test]
    async fn public_pipeline_skips_authentication() {
        let store = Arc::new(InMemoryStore::fixture());
        let (status, body) = call(app(Arc::clone(&store)), "GET", "/open").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"], "");
        assert_eq!(body["project"], Value::Null);
        assert_eq!(store.open_sessions(), 0);
    }
}
