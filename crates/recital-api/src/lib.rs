//! Recital API Library
//!
//! This crate provides the HTTP handlers, middleware, and application setup
//! around the recitation pipeline.

mod api_doc;
pub mod constants;
mod handlers;
mod middleware;
pub mod setup;
mod telemetry;

// Public modules
pub mod auth;
pub mod error;
pub mod state;

// Re-exports
pub use api_doc::openapi;
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
