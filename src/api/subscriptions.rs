// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Subscription endpoints: pull, acknowledge and offset management.
//!
//! A subscription's `offset` is the next broker offset it consumes from.
//! Acknowledging message `n` moves it to `n + 1`; it never moves backwards
//! except through `modifyOffset`, and never past the topic's `get_offset`.

use axum::{body::Bytes, extract::Path, Json};
use serde_json::{json, Value};
use tracing::info;

use super::parse_json;
use crate::auth::Ctx;
use crate::context::RequestContext;
use crate::error::ApiError;
use crate::models::{
    AcknowledgeRequest, Message, ModifyOffsetRequest, OffsetsResponse, PullRequest, PullResponse,
    ReceivedMessage, Subscription,
};

/// Messages returned by a pull that does not set `maxMessages`.
pub const DEFAULT_MAX_MESSAGES: usize = 1;

async fn load_subscription(ctx: &RequestContext, name: &str) -> Result<Subscription, ApiError> {
    let project_uuid = ctx.project.require_uuid()?;
    ctx.store()
        .subscription(project_uuid, name)
        .await?
        .ok_or_else(|| ApiError::not_found("subscription"))
}

fn ack_prefix(project: &str, subscription: &str) -> String {
    format!("projects/{project}/subscriptions/{subscription}:")
}

/// Message ID carried by `ack_id`, if it belongs to this subscription.
fn parse_ack_id(ack_id: &str, prefix: &str) -> Option<i64> {
    ack_id
        .strip_prefix(prefix)?
        .parse::<i64>()
        .ok()
        .filter(|id| *id >= 0)
}

fn parse_max_messages(value: Option<&str>) -> Result<usize, ApiError> {
    match value {
        None | Some("") => Ok(DEFAULT_MAX_MESSAGES),
        Some(raw) => raw
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ApiError::bad_request("Invalid maxMessages value")),
    }
}

fn parse_return_immediately(value: Option<&str>) -> Result<bool, ApiError> {
    match value {
        None | Some("") => Ok(false),
        Some(raw) => raw
            .parse::<bool>()
            .map_err(|_| ApiError::bad_request("Invalid returnImmediately value")),
    }
}

/// Pull messages from the subscription's current offset.
#[utoipa::path(
    post,
    path = "/v1/projects/{project}/subscriptions/{subscription}/pull",
    tag = "Subscriptions",
    params(
        ("project" = String, Path, description = "Project name"),
        ("subscription" = String, Path, description = "Subscription name"),
        ("key" = String, Query, description = "API key")
    ),
    request_body = PullRequest,
    responses(
        (status = 200, description = "Pulled messages", body = PullResponse),
        (status = 400, description = "Invalid pull options"),
        (status = 403, description = "Key lacks a consuming role"),
        (status = 404, description = "Project or subscription not found")
    )
)]
pub async fn pull(
    Ctx(ctx): Ctx,
    Path((project, name)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<PullResponse>, ApiError> {
    let subscription = load_subscription(&ctx, &name).await?;

    let options: PullRequest = if body.is_empty() {
        PullRequest::default()
    } else {
        parse_json(&body)?
    };
    let max = parse_max_messages(options.max_messages.as_deref())?;
    let immediate = parse_return_immediately(options.return_immediately.as_deref())?;

    let payloads = ctx
        .broker
        .consume(&subscription.full_topic_name(), subscription.offset, immediate)
        .await?;

    let prefix = ack_prefix(&project, &subscription.name);
    let mut received_messages = Vec::with_capacity(payloads.len().min(max));
    for payload in payloads.into_iter().take(max) {
        let message: Message = serde_json::from_str(&payload)
            .map_err(|e| ApiError::internal(format!("Corrupt message on broker: {e}")))?;
        received_messages.push(ReceivedMessage {
            ack_id: format!("{prefix}{}", message.message_id),
            message,
        });
    }

    Ok(Json(PullResponse { received_messages }))
}

/// Acknowledge pulled messages, advancing the subscription offset past the
/// highest acknowledged message.
#[utoipa::path(
    post,
    path = "/v1/projects/{project}/subscriptions/{subscription}/acknowledge",
    tag = "Subscriptions",
    params(
        ("project" = String, Path, description = "Project name"),
        ("subscription" = String, Path, description = "Subscription name"),
        ("key" = String, Query, description = "API key")
    ),
    request_body = AcknowledgeRequest,
    responses(
        (status = 200, description = "Acknowledged"),
        (status = 400, description = "Missing, foreign or out of range ack ids"),
        (status = 404, description = "Project or subscription not found")
    )
)]
pub async fn acknowledge(
    Ctx(ctx): Ctx,
    Path((project, name)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let subscription = load_subscription(&ctx, &name).await?;
    let request: AcknowledgeRequest = parse_json(&body)?;
    if request.ack_ids.is_empty() {
        return Err(ApiError::bad_request("No ack ids given"));
    }

    let prefix = ack_prefix(&project, &subscription.name);
    let mut highest = -1;
    for ack_id in &request.ack_ids {
        let id = parse_ack_id(ack_id, &prefix)
            .ok_or_else(|| ApiError::bad_request(format!("Invalid ack id: {ack_id}")))?;
        highest = highest.max(id);
    }

    let next = highest + 1;
    let max = ctx.broker.get_offset(&subscription.full_topic_name()).await?;
    if next > max {
        return Err(ApiError::bad_request(format!(
            "Ack id beyond the end of the topic: {highest}"
        )));
    }

    let offset = ctx
        .store()
        .advance_subscription_offset(&subscription.project_uuid, &subscription.name, next)
        .await?;
    if offset == next {
        info!(subscription = %subscription.name, offset, "Subscription offset advanced");
    }

    Ok(Json(json!({})))
}

/// Current and maximum offsets of a subscription.
#[utoipa::path(
    get,
    path = "/v1/projects/{project}/subscriptions/{subscription}/offsets",
    tag = "Subscriptions",
    params(
        ("project" = String, Path, description = "Project name"),
        ("subscription" = String, Path, description = "Subscription name"),
        ("key" = String, Query, description = "API key")
    ),
    responses(
        (status = 200, description = "Offsets", body = OffsetsResponse),
        (status = 404, description = "Project or subscription not found")
    )
)]
pub async fn offsets(
    Ctx(ctx): Ctx,
    Path((_project, name)): Path<(String, String)>,
) -> Result<Json<OffsetsResponse>, ApiError> {
    let subscription = load_subscription(&ctx, &name).await?;
    let max = ctx.broker.get_offset(&subscription.full_topic_name()).await?;

    Ok(Json(OffsetsResponse {
        max,
        current: subscription.offset,
    }))
}

/// Move a subscription to an arbitrary offset within the topic.
#[utoipa::path(
    post,
    path = "/v1/projects/{project}/subscriptions/{subscription}/modifyOffset",
    tag = "Subscriptions",
    params(
        ("project" = String, Path, description = "Project name"),
        ("subscription" = String, Path, description = "Subscription name"),
        ("key" = String, Query, description = "API key")
    ),
    request_body = ModifyOffsetRequest,
    responses(
        (status = 200, description = "Offset updated"),
        (status = 400, description = "Offset out of range"),
        (status = 404, description = "Project or subscription not found")
    )
)]
pub async fn modify_offset(
    Ctx(ctx): Ctx,
    Path((_project, name)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let subscription = load_subscription(&ctx, &name).await?;
    let request: ModifyOffsetRequest = parse_json(&body)?;

    let max = ctx.broker.get_offset(&subscription.full_topic_name()).await?;
    if !(0..=max).contains(&request.offset) {
        return Err(ApiError::bad_request("Offset out of range"));
    }

    ctx.store()
        .update_subscription_offset(&subscription.project_uuid, &subscription.name, request.offset)
        .await?;
    info!(
        subscription = %subscription.name,
        offset = request.offset,
        user = %ctx.identity.user_name,
        "Subscription offset modified"
    );

    Ok(Json(json!({})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn ack_ids_are_scoped_to_the_subscription() {
        let prefix = ack_prefix("ARGO", "sub1");
        assert_eq!(prefix, "projects/ARGO/subscriptions/sub1:");
        assert_eq!(parse_ack_id("projects/ARGO/subscriptions/sub1:4", &prefix), Some(4));
        assert_eq!(parse_ack_id("projects/ARGO/subscriptions/sub2:4", &prefix), None);
        assert_eq!(parse_ack_id("projects/ARGO/subscriptions/sub1:-1", &prefix), None);
        assert_eq!(parse_ack_id("projects/ARGO/subscriptions/sub1:x", &prefix), None);
    }

    #[test]
    fn pull_options_arrive_as_strings() {
        assert_eq!(parse_max_messages(None).unwrap(), DEFAULT_MAX_MESSAGES);
        assert_eq!(parse_max_messages(Some("10")).unwrap(), 10);
        for bad in ["0", "-1", "ten"] {
            assert_eq!(
                parse_max_messages(Some(bad)).unwrap_err().status,
                StatusCode::BAD_REQUEST
            );
        }

        assert!(!parse_return_immediately(None).unwrap());
        assert!(parse_return_immediately(Some("true")).unwrap());
        assert!(parse_return_immediately(Some("yes")).is_err());
    }
}
