//! Core domain + application logic for the chat-room command bot.
//!
//! This crate is transport-agnostic. The websocket connection lives behind
//! the `OutboundPort` trait and the `InboundEvent` stream, implemented in the
//! adapter crate.

pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod scheduler;
pub mod security;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
