//! HTTP API: request gateway, server wiring, routing, and request/response
//! mapping.

pub mod app;
pub mod config;
pub mod context;
pub mod gateway;
pub mod middleware;

pub use gateway::{Gateway, GatewayError, GatewayResult, Page};
