//! Sovereign - terminal client for a streaming financial research assistant.

pub mod auth;
pub mod client;
pub mod config;
pub mod conversation;
pub mod decoder;
pub mod event;
pub mod session;
