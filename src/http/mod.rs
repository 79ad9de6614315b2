//! HTTP surface of the gateway.

mod handler;
mod server;

pub use handler::{graphql_handler, GraphQLHttpRequest};
pub use server::{router, serve_with_shutdown, AppState};
