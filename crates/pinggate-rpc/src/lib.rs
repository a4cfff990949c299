//! Authenticated Ping service served over two transports.
//!
//! One RPC method (`ping.Ping/SayHello`) is served by a TLS-secured
//! gRPC listener, and mirrored by an HTTP/1.1 JSON gateway that relays
//! every request to that same listener as a gRPC client. Both paths
//! share a single authorization decision.
//!
//! # Security model
//!
//! - The binary listener only accepts TLS connections. Every call must
//!   carry `login` and `password` metadata; the [`auth::AuthInterceptor`]
//!   rejects the call before any handler runs otherwise.
//! - The gateway forwards exactly two HTTP headers (`Login`,
//!   `Password`) into call metadata, chosen by
//!   [`credentials::credential_header_matcher`]. Everything else is
//!   dropped at the boundary.
//! - Handlers receive an [`auth::Authenticated`] request, which can only
//!   be built from a call the interceptor has enriched.
//!
//! # Modules
//!
//! - [`credentials`]: HTTP header allow-list and metadata translation.
//! - [`auth`]: `Authenticator`, `AuthInterceptor`, `Authenticated<T>`.
//! - [`ping_service`]: `PingHandler` trait and the stock `Greeter`.
//! - [`tls`]: certificate/key loading for both sides of the connection.
//! - [`server`]: `BinaryListener::start()` entry point.
//! - [`gateway`]: `GatewayListener::start()` entry point.
//! - [`client`]: `PingClient` with per-call credentials.
//! - [`launcher`]: starts and supervises both listeners.

pub mod auth;
pub mod client;
pub mod credentials;
pub mod gateway;
pub mod launcher;
pub mod ping_service;
pub mod server;
pub mod tls;

/// Generated protobuf/gRPC code from `proto/ping.proto`.
pub mod proto {
    tonic::include_proto!("ping");
}

// Re-exports for consumers.
pub use auth::{AuthInterceptor, Authenticated, Authenticator};
pub use client::{ClientError, PingClient};
pub use gateway::GatewayListener;
pub use ping_service::{Greeter, PingHandler};
pub use proto::PingMessage;
pub use server::{BinaryListener, RunningListener};
