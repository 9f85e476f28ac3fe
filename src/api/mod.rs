// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, MethodRouter},
    Router,
};
use serde::de::DeserializeOwned;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{middleware, policy, Role, RouteScope},
    error::ApiError,
    models::{
        AcknowledgeRequest, Message, ModifyOffsetRequest, OffsetsResponse, ProjectResponse,
        PublishMessage, PublishRequest, PublishResponse, PullRequest, PullResponse,
        ReceivedMessage,
    },
    push::{HealthReport, HealthStatus, PushServerInfo},
    state::AppState,
};

pub mod health;
pub mod projects;
pub mod subscriptions;
pub mod topics;
pub mod version;

/// Wrap `handler` in the authenticated pipeline under the policy `route`.
fn secured(state: &AppState, route: &'static str, handler: MethodRouter) -> MethodRouter {
    handler.route_layer(from_fn_with_state(
        RouteScope::new(state.clone(), route),
        middleware::secure,
    ))
}

/// Wrap `handler` in the unauthenticated pipeline.
fn open(state: &AppState, route: &'static str, handler: MethodRouter) -> MethodRouter {
    handler.route_layer(from_fn_with_state(
        RouteScope::new(state.clone(), route),
        middleware::public,
    ))
}

/// Decode a JSON request body, reporting failures in the error envelope.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))
}

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route(
            "/projects/{project}",
            secured(&state, policy::PROJECTS_CREATE, post(projects::create_project)),
        )
        .route(
            "/projects/{project}/topics/{topic}/publish",
            secured(&state, policy::TOPICS_PUBLISH, post(topics::publish)),
        )
        .route(
            "/projects/{project}/subscriptions/{subscription}/pull",
            secured(&state, policy::SUBSCRIPTIONS_PULL, post(subscriptions::pull)),
        )
        .route(
            "/projects/{project}/subscriptions/{subscription}/acknowledge",
            secured(
                &state,
                policy::SUBSCRIPTIONS_ACKNOWLEDGE,
                post(subscriptions::acknowledge),
            ),
        )
        .route(
            "/projects/{project}/subscriptions/{subscription}/offsets",
            secured(&state, policy::SUBSCRIPTIONS_OFFSETS, get(subscriptions::offsets)),
        )
        .route(
            "/projects/{project}/subscriptions/{subscription}/modifyOffset",
            secured(
                &state,
                policy::SUBSCRIPTIONS_MODIFY_OFFSET,
                post(subscriptions::modify_offset),
            ),
        )
        .route("/health", open(&state, policy::HEALTH, get(health::health)))
        .route("/version", open(&state, policy::VERSION, get(version::version)));

    Router::new()
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        projects::create_project,
        topics::publish,
        subscriptions::pull,
        subscriptions::acknowledge,
        subscriptions::offsets,
        subscriptions::modify_offset,
        health::health,
        version::version
    ),
    components(
        schemas(
            Role,
            Message,
            PublishMessage,
            PublishRequest,
            PublishResponse,
            PullRequest,
            PullResponse,
            ReceivedMessage,
            AcknowledgeRequest,
            OffsetsResponse,
            ModifyOffsetRequest,
            ProjectResponse,
            HealthReport,
            HealthStatus,
            PushServerInfo,
            version::VersionResponse
        )
    ),
    tags(
        (name = "Projects", description = "Project registration"),
        (name = "Topics", description = "Publishing"),
        (name = "Subscriptions", description = "Consuming and offset bookkeeping"),
        (name = "Health", description = "Service health and build information")
    )
)]
pub struct ApiDoc;
