//! Conversation persistence for the Glossy Chat assistant.
//!
//! - `chat`: conversation model, tiered client-side store, reply generation
//! - `server`: transactional `SQLite` service exposed over HTTP
//! - `transport`: HTTP client for the server API

// Forbidden outright
#![deny(unsafe_code)]
#![forbid(unsafe_op_in_unsafe_fn)]

// Hygiene
#![warn(missing_docs)]
#![warn(unused_imports)]
#![warn(unused_variables)]
#![deny(unused_must_use)]
#![deny(nonstandard_style)]
#![deny(overflowing_literals)]

// Clippy discipline
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_in_result)]
#![deny(clippy::redundant_clone)]
#![deny(clippy::too_many_arguments)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

/// Conversation model, client storage tiers and responders.
pub mod chat;
/// HTTP server, routes and the relational conversation service.
#[allow(clippy::missing_errors_doc, clippy::unused_async)]
pub mod server;
/// Entry helpers to start the Glossy Chat server.
pub mod start_glossy_chat;
/// HTTP client for the conversation API.
pub mod transport;
