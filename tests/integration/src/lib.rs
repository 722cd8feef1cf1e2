//! Integration test utilities for the realtime client
//!
//! Runs the client over real WebSockets against an in-process axum server.

pub mod helpers;

pub use helpers::*;
