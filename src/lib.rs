// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Pub/Sub - Multi-tenant Messaging Server
//!
//! Clients publish messages to project-scoped topics and consume them
//! through subscriptions. Every request passes a security pipeline before
//! it reaches a pluggable broker backend.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - API key authentication, role policies and the request pipeline
//! - `broker` - Broker interface with in-memory and Kafka backends
//! - `push` - Push server client and health aggregation
//! - `store` - Projects, users, topics, subscriptions and route policies

pub mod api;
pub mod auth;
pub mod broker;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod models;
pub mod push;
pub mod state;
pub mod store;
pub mod validation;
