//! Service configuration with defaults.
//!
//! Every value has a default matching the stock deployment: the binary
//! endpoint on `localhost:7777`, the HTTP/1.1 gateway on
//! `localhost:7778`, and certificate material under `cert/`.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ListenerError, Result};

// ---------------------------------------------------------------------------
// AuthConfig
// ---------------------------------------------------------------------------

/// Expected credentials, injected into the authenticator at construction.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// The only login accepted.
    pub login: String,
    /// Password expected for `login`.
    pub password: String,
    /// Identity token attached to every authenticated call.
    pub client_identity: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login: "john".into(),
            password: "doe".into(),
            client_identity: "42".into(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("client_identity", &self.client_identity)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// TlsPaths
// ---------------------------------------------------------------------------

/// Locations of the transport-layer encryption material.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsPaths {
    /// Server certificate (PEM). Also the trust root for the gateway's
    /// outbound connection.
    pub cert_path: PathBuf,
    /// Server private key (PEM). Used by the binary listener only.
    pub key_path: PathBuf,
    /// Name the gateway expects in the server certificate.
    pub domain_name: String,
}

impl Default for TlsPaths {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from("cert/server.crt"),
            key_path: PathBuf::from("cert/server.key"),
            domain_name: "localhost".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// GatewayConfig
// ---------------------------------------------------------------------------

/// Full configuration for both listeners.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// `host:port` of the binary RPC endpoint.
    pub grpc_addr: String,
    /// `host:port` of the HTTP/1.1 JSON gateway.
    pub gateway_addr: String,
    /// Certificate and key locations.
    pub tls: TlsPaths,
    /// Expected credentials.
    pub auth: AuthConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            grpc_addr: "localhost:7777".into(),
            gateway_addr: "localhost:7778".into(),
            tls: TlsPaths::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// - Empty bind address, login, domain name or TLS path.
    /// - Both listeners configured on the same fixed address.
    pub fn validate(&self) -> Result<()> {
        if self.grpc_addr.trim().is_empty() {
            return Err(config_error("grpc_addr must not be empty"));
        }
        if self.gateway_addr.trim().is_empty() {
            return Err(config_error("gateway_addr must not be empty"));
        }
        if self.grpc_addr == self.gateway_addr && !is_ephemeral(&self.grpc_addr) {
            return Err(config_error(format!(
                "grpc_addr and gateway_addr must differ, both are {}",
                self.grpc_addr
            )));
        }
        if self.tls.cert_path.as_os_str().is_empty() {
            return Err(config_error("TLS certificate path must not be empty"));
        }
        if self.tls.key_path.as_os_str().is_empty() {
            return Err(config_error("TLS key path must not be empty"));
        }
        if self.tls.domain_name.is_empty() {
            return Err(config_error("TLS domain name must not be empty"));
        }
        if self.auth.login.is_empty() {
            return Err(config_error("expected login must not be empty"));
        }
        if self.auth.client_identity.is_empty() {
            return Err(config_error("client identity must not be empty"));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config_error(reason: impl Into<String>) -> ListenerError {
    ListenerError::Config {
        reason: reason.into(),
    }
}

/// Port 0 lets the OS pick, so two listeners never collide on it.
fn is_ephemeral(addr: &str) -> bool {
    addr.rsplit_once(':').is_some_and(|(_, port)| port == "0")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grpc_addr, "localhost:7777");
        assert_eq!(config.gateway_addr, "localhost:7778");
        assert_eq!(config.auth.login, "john");
        assert_eq!(config.auth.password, "doe");
    }

    #[test]
    fn rejects_shared_address() {
        let config = GatewayConfig {
            gateway_addr: "localhost:7777".into(),
            ..GatewayConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ListenerError::Config { .. })
        ));
    }

    #[test]
    fn allows_shared_ephemeral_address() {
        let config = GatewayConfig {
            grpc_addr: "127.0.0.1:0".into(),
            gateway_addr: "127.0.0.1:0".into(),
            ..GatewayConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_empty_login() {
        let mut config = GatewayConfig::default();
        config.auth.login.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_key_path() {
        let mut config = GatewayConfig::default();
        config.tls.key_path = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() -> std::result::Result<(), serde_json::Error> {
        let json = r#"{ "grpc_addr": "0.0.0.0:9000", "auth": { "login": "alice" } }"#;
        let config: GatewayConfig = serde_json::from_str(json)?;
        assert_eq!(config.grpc_addr, "0.0.0.0:9000");
        assert_eq!(config.gateway_addr, "localhost:7778");
        assert_eq!(config.auth.login, "alice");
        assert_eq!(config.auth.password, "doe");
        Ok(())
    }

    #[test]
    fn auth_config_debug_redacts_password() {
        let printed = format!("{:?}", AuthConfig::default());
        assert!(!printed.contains("doe"));
    }
}
