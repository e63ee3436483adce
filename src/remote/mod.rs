//! Remote gateway: HTTP access to the backend's REST collections.

pub mod api_types;
mod client;
mod error;

pub use client::RemoteGateway;
pub use error::{GatewayError, GatewayResult};
