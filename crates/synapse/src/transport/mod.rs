// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A2A HTTP surface: contract types, router construction, and serving.

pub mod auth;
pub mod gate;
pub mod http;
pub mod observer;
pub mod state;

pub use state::Store;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::error::ErrorCode;

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Machine-readable code plus human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorCode {
    /// Convert this error code into a transport [`ErrorBody`].
    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    /// Convert this error code into an axum JSON error response.
    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body(message) };
        (status, Json(body))
    }
}

/// Build the axum `Router` with the full A2A surface.
pub fn build_router(state: Arc<Store>) -> Router {
    Router::new()
        .route("/.well-known/agent.json", get(http::agent_card))
        .route("/status", get(http::status))
        .route("/message", post(http::legacy_message))
        .route("/tasks/create", post(http::create_task))
        .route("/tasks/send", post(http::send_task))
        .route("/tasks/send-priority", post(http::send_priority))
        // The literal `board` segment outranks the `{id}` matcher.
        .route("/tasks/board", get(http::board_list).post(http::board_create))
        .route("/tasks/board/available", get(http::board_available))
        .route("/tasks/board/{id}/claim", post(http::board_claim))
        .route("/tasks/board/{id}/complete", post(http::board_complete))
        .route("/tasks/{id}", get(http::get_task))
        .route("/tasks/{id}/cancel", post(http::cancel_task))
        .route("/spawn", post(http::spawn_agent))
        .route("/team/start", post(http::team_start))
        .route("/external/discover", post(http::external_discover))
        .route("/external/agents", get(http::external_list))
        .route("/external/agents/{alias}/send", post(http::external_send))
        .route("/webhooks", get(http::webhook_list).post(http::webhook_register))
        .route("/webhooks/deliveries", get(http::webhook_deliveries))
        .route("/webhooks/{*url}", delete(http::webhook_unregister))
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
