//! Turnstile - GraphQL User Gateway
//!
//! This crate implements a GraphQL gateway in front of a user-management
//! REST service. Every inbound operation passes a request-admission pipeline
//! (depth limit, cost limit, per-client rate limit) before any resolver
//! forwards to the upstream.

pub mod admission;
pub mod config;
pub mod error;
pub mod graphql;
pub mod http;
pub mod session;
pub mod upstream;
