//! Service integrations for external APIs and clients.
//!
//! This module contains implementations for the services used by the whoasked bot:
//! - Chat services (e.g., Slack)
//! - Database services (e.g., SurrealDB)
//!
//! Each service module defines both a generic trait and a concrete implementation,
//! allowing for extensibility and easy testing.

pub mod chat;
pub mod db;
