//! HTTP API.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tracing + timeout layers)
//!     → auth.rs (bearer token, privileged routes only)
//!     → handlers.rs (decode, call RouterCore, encode JSON)
//! ```
//!
//! # Design Decisions
//! - Handlers hold no logic beyond decoding; every operation lives on
//!   `RouterCore`
//! - Core errors map to status codes in one place

pub mod auth;
pub mod handlers;
pub mod server;

pub use server::{AppState, HttpServer};
