//! Event handling and user interactions for the whoasked bot.
//!
//! This module provides functionality for handling chat events:
//! - Recording @-mentions and quotes as they arrive
//! - Answering "who asked me?" queries

pub mod mention_recorder;
pub mod query;
