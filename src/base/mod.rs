//! Core components, types, and utilities for the whoasked bot.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - The retention policy applied to stored histories.
//! - Reply text and history formatting.
//! - Common types and result handling.

pub mod config;
pub mod replies;
pub mod retention;
pub mod types;
