// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{body::Bytes, extract::Path, Json};
use base64ct::{Base64, Encoding};
use tracing::{error, info};

use super::parse_json;
use crate::auth::Ctx;
use crate::error::ApiError;
use crate::models::{Message, PublishRequest, PublishResponse};

/// Publish messages to a topic.
///
/// Every message is validated before any is handed to the broker, so a
/// rejected request publishes nothing. Publishing itself is not atomic: if
/// the broker fails partway, earlier messages stay on the topic, the client
/// gets a 500 and the IDs already assigned are logged.
#[utoipa::path(
    post,
    path = "/v1/projects/{project}/topics/{topic}/publish",
    tag = "Topics",
    params(
        ("project" = String, Path, description = "Project name"),
        ("topic" = String, Path, description = "Topic name"),
        ("key" = String, Query, description = "API key")
    ),
    request_body = PublishRequest,
    responses(
        (status = 200, description = "Messages published", body = PublishResponse),
        (status = 400, description = "Invalid name or message"),
        (status = 401, description = "Missing or unknown key"),
        (status = 403, description = "Key lacks a publishing role"),
        (status = 404, description = "Project or topic not found")
    )
)]
pub async fn publish(
    Ctx(ctx): Ctx,
    Path((_project, topic)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<PublishResponse>, ApiError> {
    let project_uuid = ctx.project.require_uuid()?;
    let topic = ctx
        .store()
        .topic(project_uuid, &topic)
        .await?
        .ok_or_else(|| ApiError::not_found("topic"))?;

    let request: PublishRequest = parse_json(&body)?;
    if request.messages.is_empty() {
        return Err(ApiError::bad_request("No messages to publish"));
    }
    for message in &request.messages {
        if message.data.is_empty() {
            return Err(ApiError::bad_request("Message data must not be empty"));
        }
        Base64::decode_vec(&message.data)
            .map_err(|_| ApiError::bad_request("Message data must be base64 encoded"))?;
    }

    let full_name = topic.full_name();
    let mut message_ids = Vec::with_capacity(request.messages.len());
    for message in request.messages {
        match ctx
            .broker
            .publish(&full_name, Message::new(message.data, message.attributes))
            .await
        {
            Ok(receipt) => message_ids.push(receipt.message_id),
            Err(e) => {
                error!(
                    topic = %full_name,
                    published = ?message_ids,
                    error = %e,
                    "Publish interrupted"
                );
                return Err(e.into());
            }
        }
    }

    info!(
        topic = %full_name,
        count = message_ids.len(),
        user = %ctx.identity.user_name,
        "Messages published"
    );

    Ok(Json(PublishResponse { message_ids }))
}
