//! Library crate for questnest-back, exposing modules for binaries and integration tests.

/// Clients for external services.
pub mod adapters;
/// Runtime configuration.
pub mod config;
/// Persistence layer.
pub mod dao;
/// Request and response payloads.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP and WebSocket routes.
pub mod routes;
/// Business rules behind the routes.
pub mod services;
/// Shared application state.
pub mod state;
