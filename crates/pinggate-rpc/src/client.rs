//! gRPC client for the Ping service.
//!
//! [`PingClient`] dials the binary listener over TLS and attaches the
//! caller's credentials to every call as `login` / `password` metadata.
//! Plaintext endpoints are refused outright.

use std::path::Path;

use thiserror::Error;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::interceptor::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::{Request, Status};

use pinggate_types::{AuthError, Credentials};

use crate::auth::{auth_error_from_status, LOGIN_KEY, PASSWORD_KEY};
use crate::proto;
use crate::proto::PingMessage;
use crate::tls;

/// Errors returned by [`PingClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Endpoint, TLS material or credentials are unusable.
    #[error("client configuration error: {reason}")]
    Config { reason: String },

    /// The TLS connection could not be established.
    #[error("failed to connect to {endpoint}: {reason}")]
    Connect {
        endpoint: String,
        reason: String,
    },

    /// The server rejected the credentials.
    #[error("access denied: {0}")]
    Denied(AuthError),

    /// Any other failed call.
    #[error("call failed: {0}")]
    Transport(Status),
}

impl From<Status> for ClientError {
    fn from(status: Status) -> Self {
        match auth_error_from_status(&status) {
            Some(auth) => Self::Denied(auth),
            None => Self::Transport(status),
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials interceptor
// ---------------------------------------------------------------------------

/// Adds `login` and `password` metadata to every outgoing call.
#[derive(Clone)]
pub struct CredentialsInterceptor {
    login: MetadataValue<Ascii>,
    password: MetadataValue<Ascii>,
}

impl CredentialsInterceptor {
    /// # Errors
    ///
    /// [`ClientError::Config`] if either value holds anything but visible
    /// ASCII and spaces.
    pub fn new(credentials: &Credentials) -> Result<Self, ClientError> {
        Ok(Self {
            login: ascii_metadata(&credentials.login, "login")?,
            password: ascii_metadata(&credentials.password, "password")?,
        })
    }
}

/// Parses `value` as metadata, accepting visible ASCII and spaces only.
fn ascii_metadata(value: &str, field: &str) -> Result<MetadataValue<Ascii>, ClientError> {
    let invalid = || ClientError::Config {
        reason: format!("{field} is not valid ASCII metadata"),
    };
    if !value.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
        return Err(invalid());
    }
    value.parse().map_err(|_| invalid())
}

impl Interceptor for CredentialsInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let metadata = request.metadata_mut();
        metadata.insert(LOGIN_KEY, self.login.clone());
        metadata.insert(PASSWORD_KEY, self.password.clone());
        Ok(request)
    }
}

// ---------------------------------------------------------------------------
// PingClient
// ---------------------------------------------------------------------------

/// TLS client for `ping.Ping`.
#[derive(Clone)]
pub struct PingClient {
    inner: proto::ping_client::PingClient<InterceptedService<Channel, CredentialsInterceptor>>,
}

impl PingClient {
    /// Connects to `endpoint`, trusting the certificate at `ca_cert_path`.
    ///
    /// `endpoint` is either `host:port` or an `https://` URI.
    /// `domain_name` must match a name in the server certificate.
    pub async fn connect(
        endpoint: &str,
        ca_cert_path: &Path,
        domain_name: &str,
        credentials: &Credentials,
    ) -> Result<Self, ClientError> {
        let tls_config =
            tls::client_tls_config(ca_cert_path, domain_name).map_err(|e| ClientError::Config {
                reason: e.to_string(),
            })?;
        Self::connect_with_tls(endpoint, tls_config, credentials).await
    }

    /// Connects to `endpoint` with a ready-made TLS configuration.
    pub async fn connect_with_tls(
        endpoint: &str,
        tls_config: ClientTlsConfig,
        credentials: &Credentials,
    ) -> Result<Self, ClientError> {
        let uri = https_uri(endpoint)?;
        let interceptor = CredentialsInterceptor::new(credentials)?;

        let channel = Endpoint::from_shared(uri.clone())
            .map_err(|e| ClientError::Config {
                reason: format!("invalid endpoint '{endpoint}': {e}"),
            })?
            .tls_config(tls_config)
            .map_err(|e| ClientError::Config {
                reason: e.to_string(),
            })?
            .connect()
            .await
            .map_err(|e| ClientError::Connect {
                endpoint: uri.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(endpoint = %uri, "connected to Ping service");

        Ok(Self {
            inner: proto::ping_client::PingClient::with_interceptor(channel, interceptor),
        })
    }

    /// Sends `greeting` and returns the server's reply greeting.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Denied`] if the server rejected the credentials.
    /// - [`ClientError::Transport`] for any other failure.
    pub async fn say_hello(&mut self, greeting: &str) -> Result<String, ClientError> {
        let request = Request::new(PingMessage {
            greeting: greeting.to_string(),
        });
        let reply = self.inner.say_hello(request).await?;
        Ok(reply.into_inner().greeting)
    }
}

/// Normalises `endpoint` to an `https://` URI, refusing plaintext.
fn https_uri(endpoint: &str) -> Result<String, ClientError> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(ClientError::Config {
            reason: "endpoint is empty".into(),
        });
    }
    if endpoint.starts_with("http://") {
        return Err(ClientError::Config {
            reason: format!("'{endpoint}' is plaintext; transport security is required"),
        });
    }
    if endpoint.starts_with("https://") {
        Ok(endpoint.to_string())
    } else {
        Ok(format!("https://{endpoint}"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use tonic::Code;

    use super::*;
    use crate::auth::status_from_auth_error;

    #[test]
    fn bare_address_gets_https_scheme() {
        assert_eq!(https_uri("localhost:7777").unwrap(), "https://localhost:7777");
        assert_eq!(https_uri("https://localhost:7777").unwrap(), "https://localhost:7777");
    }

    #[test]
    fn plaintext_endpoint_is_refused() {
        assert!(matches!(
            https_uri("http://localhost:7777"),
            Err(ClientError::Config { .. })
        ));
        assert!(matches!(https_uri("  "), Err(ClientError::Config { .. })));
    }

    #[test]
    fn interceptor_sets_both_keys() {
        let mut interceptor =
            CredentialsInterceptor::new(&Credentials::new("john", "doe")).unwrap();
        let request = interceptor.call(Request::new(())).unwrap();

        let metadata = request.metadata();
        assert_eq!(metadata.get(LOGIN_KEY).unwrap(), "john");
        assert_eq!(metadata.get(PASSWORD_KEY).unwrap(), "doe");
    }

    #[test]
    fn interceptor_replaces_existing_values() {
        let mut interceptor =
            CredentialsInterceptor::new(&Credentials::new("john", "doe")).unwrap();
        let mut request = Request::new(());
        request.metadata_mut().insert(LOGIN_KEY, "mallory".parse().unwrap());

        let request = interceptor.call(request).unwrap();
        assert_eq!(request.metadata().get_all(LOGIN_KEY).iter().count(), 1);
        assert_eq!(request.metadata().get(LOGIN_KEY).unwrap(), "john");
    }

    #[test]
    fn non_ascii_credentials_are_config_errors() {
        for (login, password) in [("jöhn", "doe"), ("john", "dö"), ("john", "d\toe")] {
            let result = CredentialsInterceptor::new(&Credentials::new(login, password));
            assert!(matches!(result, Err(ClientError::Config { .. })), "{login}/{password}");
        }
    }

    #[test]
    fn spaces_are_allowed_in_credentials() {
        assert!(CredentialsInterceptor::new(&Credentials::new("john", "correct horse")).is_ok());
    }

    #[test]
    fn auth_status_becomes_denied() {
        let status = status_from_auth_error(&AuthError::BadPassword);
        assert!(matches!(
            ClientError::from(status),
            ClientError::Denied(AuthError::BadPassword)
        ));
    }

    #[test]
    fn other_status_stays_transport() {
        let error = ClientError::from(Status::unavailable("connection refused"));
        match error {
            ClientError::Transport(status) => assert_eq!(status.code(), Code::Unavailable),
            other => panic!("expected Transport, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_ca_certificate_is_config_error() {
        let result = PingClient::connect(
            "localhost:7777",
            Path::new("/nonexistent/server.crt"),
            "localhost",
            &Credentials::new("john", "doe"),
        )
        .await;
        assert!(matches!(result, Err(ClientError::Config { .. })));
    }
}
