//! JSON API over axum.
//!
//! Handlers parse and validate the request, resolve the caller from the
//! bearer token, and hand off to the [`Engine`](crate::engine::Engine).
//! Every error leaves as an [`ApiError`](error::ApiError) body.

pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;
