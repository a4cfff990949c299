//! Authentication for the binary listener.
//!
//! # Flow
//!
//! Every inbound call passes through [`AuthInterceptor`] before any
//! handler sees it. The interceptor asks the [`Authenticator`] to check
//! the `login`/`password` metadata against the configured pair:
//!
//! - failure: the call ends with the [`AuthError`] mapped to a
//!   `tonic::Status`; the handler is never invoked and nothing is
//!   retried.
//! - success: a [`ClientIdentity`] is attached to the request, and the
//!   handler receives it wrapped in [`Authenticated`].
//!
//! The interceptor is bound to the Ping service by
//! `PingServer::with_interceptor`, so it cannot be installed on a
//! different service type. The wiring defects that remain possible at
//! run time (an interceptor without an authenticator, a handler reached
//! without the interceptor) surface as `AuthError::InternalConfig`.
//!
//! # Security notes
//!
//! - Login and password are compared in constant time.
//! - The password never appears in logs or error messages.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tonic::metadata::MetadataMap;
use tonic::{Code, Request, Status};

use pinggate_types::config::AuthConfig;
use pinggate_types::{AuthError, ClientIdentity};

/// Metadata key carrying the login.
pub const LOGIN_KEY: &str = "login";
/// Metadata key carrying the password.
pub const PASSWORD_KEY: &str = "password";
/// Status metadata naming the kind of authorization failure.
pub const AUTH_FAILURE_KEY: &str = "x-auth-failure";

/// Tracing target for the authentication audit trail.
pub const AUDIT_TARGET: &str = "pinggate::audit";

// ---------------------------------------------------------------------------
// Authenticator
// ---------------------------------------------------------------------------

/// Checks a call's credentials against the configured pair.
///
/// Stateless apart from the read-only configuration, so a single
/// instance is shared by every call.
#[derive(Clone)]
pub struct Authenticator {
    config: Arc<AuthConfig>,
}

impl Authenticator {
    /// Creates an authenticator expecting the credentials in `config`.
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Validates the `login`/`password` metadata of one call.
    ///
    /// Emits exactly one audit event on success and none on failure.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingCredentials`] if either key is absent.
    /// - [`AuthError::UnknownUser`] if the login does not match,
    ///   whatever the password.
    /// - [`AuthError::BadPassword`] if only the password does not match.
    pub fn authenticate(&self, metadata: &MetadataMap) -> Result<ClientIdentity, AuthError> {
        let (login, password) = match (
            metadata_value(metadata, LOGIN_KEY),
            metadata_value(metadata, PASSWORD_KEY),
        ) {
            (Some(login), Some(password)) => (login, password),
            _ => return Err(AuthError::MissingCredentials),
        };

        if !constant_time_eq(&login, self.config.login.as_bytes()) {
            return Err(AuthError::UnknownUser {
                login: String::from_utf8_lossy(&login).into_owned(),
            });
        }
        if !constant_time_eq(&password, self.config.password.as_bytes()) {
            return Err(AuthError::BadPassword);
        }

        tracing::info!(
            target: AUDIT_TARGET,
            login = %self.config.login,
            "authenticated client"
        );
        Ok(ClientIdentity::new(self.config.client_identity.clone()))
    }
}

/// Joins the raw bytes of every value stored under `key`; `None` only if
/// the key is absent.
fn metadata_value(metadata: &MetadataMap, key: &str) -> Option<Vec<u8>> {
    let mut values = metadata.get_all(key).iter().peekable();
    values.peek()?;

    let mut joined = Vec::new();
    for value in values {
        joined.extend_from_slice(value.as_encoded_bytes());
    }
    Some(joined)
}

/// Compares two byte slices in constant time.
///
/// The comparison time depends only on the lengths, not on the content.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

// ---------------------------------------------------------------------------
// AuthInterceptor
// ---------------------------------------------------------------------------

/// gRPC interceptor gating every call on the [`Authenticator`].
///
/// Implements `tonic::service::Interceptor` and is cloneable so it can
/// wrap any number of services. `Default` yields an interceptor with no
/// authenticator bound, which rejects every call as a wiring defect.
#[derive(Clone, Default)]
pub struct AuthInterceptor {
    authenticator: Option<Authenticator>,
}

impl AuthInterceptor {
    /// Creates an interceptor backed by `authenticator`.
    pub fn new(authenticator: Authenticator) -> Self {
        Self {
            authenticator: Some(authenticator),
        }
    }

    /// Authenticates `request` and attaches the resulting identity.
    ///
    /// The returned request is the input plus one [`ClientIdentity`]
    /// extension; metadata and payload are untouched.
    pub fn intercept<T>(&self, mut request: Request<T>) -> Result<Request<T>, AuthError> {
        let authenticator = self
            .authenticator
            .as_ref()
            .ok_or_else(|| AuthError::InternalConfig {
                reason: "interceptor has no authenticator bound".into(),
            })?;

        let identity = authenticator.authenticate(request.metadata())?;
        request.extensions_mut().insert(identity);
        Ok(request)
    }
}

impl tonic::service::Interceptor for AuthInterceptor {
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        self.intercept(request).map_err(|e| {
            tracing::warn!(kind = e.kind(), "call denied: {e}");
            status_from_auth_error(&e)
        })
    }
}

// ---------------------------------------------------------------------------
// Authenticated
// ---------------------------------------------------------------------------

/// A request that has passed the [`AuthInterceptor`].
///
/// Handlers take this instead of a raw `tonic::Request`, which makes the
/// authenticated precondition part of their signature.
#[derive(Debug)]
pub struct Authenticated<T> {
    identity: ClientIdentity,
    metadata: MetadataMap,
    message: T,
}

impl<T> Authenticated<T> {
    /// Unwraps an intercepted request.
    ///
    /// # Errors
    ///
    /// [`AuthError::InternalConfig`] if the request carries no
    /// [`ClientIdentity`], i.e. it never went through the interceptor.
    pub fn from_request(request: Request<T>) -> Result<Self, AuthError> {
        let (metadata, extensions, message) = request.into_parts();
        let identity = extensions
            .get::<ClientIdentity>()
            .cloned()
            .ok_or_else(|| AuthError::InternalConfig {
                reason: "handler reached without authentication".into(),
            })?;

        Ok(Self {
            identity,
            metadata,
            message,
        })
    }

    /// Identity attached by the interceptor.
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Call metadata as received.
    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    /// Request payload.
    pub fn message(&self) -> &T {
        &self.message
    }

    /// Consumes the wrapper, returning the payload.
    pub fn into_message(self) -> T {
        self.message
    }
}

// ---------------------------------------------------------------------------
// Status mapping
// ---------------------------------------------------------------------------

/// Maps an [`AuthError`] to the status returned to the caller.
///
/// Credential failures become `Unauthenticated`, wiring defects
/// `Internal`. The failure kind travels in [`AUTH_FAILURE_KEY`].
pub fn status_from_auth_error(error: &AuthError) -> Status {
    let code = match error {
        AuthError::InternalConfig { .. } => Code::Internal,
        _ => Code::Unauthenticated,
    };

    let mut metadata = MetadataMap::new();
    metadata.insert(AUTH_FAILURE_KEY, tonic::metadata::MetadataValue::from_static(error.kind()));

    Status::with_metadata(code, error.to_string(), metadata)
}

/// Recovers the [`AuthError`] behind a status, if it was one.
///
/// Returns `None` for every status not produced by
/// [`status_from_auth_error`], e.g. transport failures.
pub fn auth_error_from_status(status: &Status) -> Option<AuthError> {
    let kind = status.metadata().get(AUTH_FAILURE_KEY)?.to_str().ok()?;

    match (status.code(), kind) {
        (Code::Unauthenticated, "missing-credentials") => Some(AuthError::MissingCredentials),
        (Code::Unauthenticated, "unknown-user") => Some(AuthError::UnknownUser {
            login: status
                .message()
                .strip_prefix("unknown user ")
                .unwrap_or_default()
                .to_string(),
        }),
        (Code::Unauthenticated, "bad-password") => Some(AuthError::BadPassword),
        (Code::Internal, "internal-config") => Some(AuthError::InternalConfig {
            reason: status.message().to_string(),
        }),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
