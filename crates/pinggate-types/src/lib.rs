//! Core shared types for the pinggate services.
//!
//! This crate defines the types every other crate in the workspace
//! agrees on: the credential pair a caller presents, the identity the
//! server derives from it, and the two error families (per-call
//! authorization failures and listener startup/serve failures).

pub mod config;

use std::fmt;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Login/password pair presented by a caller on every call.
///
/// Constructed by the caller before dialing and attached to each
/// outbound call. The server never persists it.
#[derive(Clone, Eq, PartialEq)]
pub struct Credentials {
    /// Account name.
    pub login: String,
    /// Shared secret for `login`.
    pub password: String,
}

impl Credentials {
    /// Creates a new credential pair.
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ClientIdentity
// ---------------------------------------------------------------------------

/// Opaque token stating "this call was authenticated".
///
/// Produced only by a successful authentication and attached to that
/// single call. It is not signed; downstream code must trust the
/// process that attached it.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Wraps a raw identity token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// AuthError
// ---------------------------------------------------------------------------

/// Per-call authorization failure.
///
/// Returned to the immediate caller as the call's error. Never retried
/// by the server and never affects other in-flight calls.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum AuthError {
    /// The call carried no `login`/`password` metadata.
    #[error("missing credentials")]
    MissingCredentials,

    /// The presented login does not match the configured one.
    #[error("unknown user {login}")]
    UnknownUser {
        /// The login the caller presented.
        login: String,
    },

    /// The login matched but the password did not.
    #[error("bad password")]
    BadPassword,

    /// The call reached a gate that was wired incorrectly.
    #[error("internal configuration error: {reason}")]
    InternalConfig {
        /// Description of the wiring defect.
        reason: String,
    },
}

impl AuthError {
    /// Stable, machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing-credentials",
            Self::UnknownUser { .. } => "unknown-user",
            Self::BadPassword => "bad-password",
            Self::InternalConfig { .. } => "internal-config",
        }
    }
}

// ---------------------------------------------------------------------------
// ListenerError
// ---------------------------------------------------------------------------

/// Startup or serve failure of one of the two listeners.
///
/// Startup variants (`Bind`, `TlsLoad`, `Registration`, `Config`) signal
/// misconfiguration and are never retried.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The TCP socket could not be bound.
    #[error("failed to bind {addr}: {reason}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O failure.
        reason: String,
    },

    /// Certificate or key material could not be loaded.
    #[error("could not load TLS material from {path}: {reason}")]
    TlsLoad {
        /// File the material was read from.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// The gateway could not register the backend endpoint.
    #[error("could not register service: {reason}")]
    Registration {
        /// What went wrong.
        reason: String,
    },

    /// A running listener stopped with an error.
    #[error("{listener} listener failed: {reason}")]
    Serve {
        /// Which listener stopped (`grpc` or `gateway`).
        listener: &'static str,
        /// What went wrong.
        reason: String,
    },

    /// The configuration was rejected before anything was started.
    #[error("config error: {reason}")]
    Config {
        /// Human-readable description of the rejected value.
        reason: String,
    },
}

/// Convenience alias for listener operations.
pub type Result<T> = std::result::Result<T, ListenerError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
