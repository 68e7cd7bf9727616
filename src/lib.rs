//! `sig-gateway` — a reverse-proxy gateway that authenticates autonomous
//! agents via HTTP message signatures before forwarding requests to a
//! merchant origin.
//!
//! # Environment variables
//!
//! See [`config::GatewayConfig::from_env`] for the full list.

pub mod base_string;
pub mod config;
pub mod envelope;
pub mod error;
pub mod gate;
pub mod proxy;
pub mod rate_limit;
pub mod registry;
pub mod replay;
pub mod router;
pub mod sanitize;
pub mod security_headers;
pub mod verify;
