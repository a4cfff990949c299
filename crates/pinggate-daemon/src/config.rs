//! CLI argument parsing and config file support.
//!
//! Settings are layered: built-in defaults, then an optional JSON config
//! file, then CLI flags. The expected password is never taken from argv;
//! it comes from the config file or `PINGGATE_PASSWORD`.

use std::path::{Path, PathBuf};

use clap::Parser;
use thiserror::Error;

use pinggate_types::config::GatewayConfig;

/// Environment variable holding the expected password.
pub const PASSWORD_ENV: &str = "PINGGATE_PASSWORD";

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// Ping service daemon: TLS gRPC listener plus HTTP/1.1 JSON gateway.
#[derive(Debug, Parser)]
#[command(name = "pinggate-daemon", version, about)]
pub struct CliArgs {
    /// Load settings from a JSON config file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Address of the binary gRPC endpoint (default: localhost:7777).
    #[arg(long, value_name = "HOST:PORT")]
    pub grpc_addr: Option<String>,

    /// Address of the HTTP/1.1 gateway (default: localhost:7778).
    #[arg(long, value_name = "HOST:PORT")]
    pub gateway_addr: Option<String>,

    /// Server certificate, PEM (default: cert/server.crt).
    #[arg(long, value_name = "PATH")]
    pub cert: Option<PathBuf>,

    /// Server private key, PEM (default: cert/server.key).
    #[arg(long, value_name = "PATH")]
    pub key: Option<PathBuf>,

    /// Name the gateway expects in the server certificate (default: localhost).
    #[arg(long, value_name = "NAME")]
    pub tls_domain: Option<String>,

    /// The only login accepted (default: john).
    #[arg(long)]
    pub login: Option<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DaemonConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Loads a JSON config file. Missing fields keep their defaults.
///
/// Example `pinggate.json`:
/// ```json
/// {
///   "grpc_addr": "0.0.0.0:7777",
///   "gateway_addr": "0.0.0.0:7778",
///   "tls": { "cert_path": "/etc/pinggate/server.crt", "key_path": "/etc/pinggate/server.key" },
///   "auth": { "login": "john" }
/// }
/// ```
pub fn load_file(path: &Path) -> Result<GatewayConfig, DaemonConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| DaemonConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&text).map_err(|source| DaemonConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Builds the final configuration from flags and the password variable.
pub fn resolve(
    cli: &CliArgs,
    password_env: Option<String>,
) -> Result<GatewayConfig, DaemonConfigError> {
    let config = match &cli.config {
        Some(path) => load_file(path)?,
        None => GatewayConfig::default(),
    };
    Ok(merge_cli(config, cli, password_env))
}

/// Applies CLI overrides onto `config`.
fn merge_cli(
    mut config: GatewayConfig,
    cli: &CliArgs,
    password_env: Option<String>,
) -> GatewayConfig {
    if let Some(ref addr) = cli.grpc_addr {
        config.grpc_addr = addr.clone();
    }
    if let Some(ref addr) = cli.gateway_addr {
        config.gateway_addr = addr.clone();
    }
    if let Some(ref path) = cli.cert {
        config.tls.cert_path = path.clone();
    }
    if let Some(ref path) = cli.key {
        config.tls.key_path = path.clone();
    }
    if let Some(ref domain) = cli.tls_domain {
        config.tls.domain_name = domain.clone();
    }
    if let Some(ref login) = cli.login {
        config.auth.login = login.clone();
    }
    if let Some(password) = password_env {
        config.auth.password = password;
    }
    config
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("pinggate-daemon").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn no_flags_gives_defaults() {
        let config = resolve(&parse(&[]), None).unwrap();
        assert_eq!(config.grpc_addr, "localhost:7777");
        assert_eq!(config.gateway_addr, "localhost:7778");
        assert_eq!(config.auth.login, "john");
        assert_eq!(config.auth.password, "doe");
    }

    #[test]
    fn flags_override_defaults() {
        let cli = parse(&[
            "--grpc-addr",
            "0.0.0.0:9000",
            "--gateway-addr",
            "0.0.0.0:9001",
            "--cert",
            "/etc/ping/server.crt",
            "--key",
            "/etc/ping/server.key",
            "--tls-domain",
            "ping.internal",
            "--login",
            "alice",
        ]);
        let config = resolve(&cli, None).unwrap();

        assert_eq!(config.grpc_addr, "0.0.0.0:9000");
        assert_eq!(config.gateway_addr, "0.0.0.0:9001");
        assert_eq!(config.tls.cert_path, PathBuf::from("/etc/ping/server.crt"));
        assert_eq!(config.tls.key_path, PathBuf::from("/etc/ping/server.key"));
        assert_eq!(config.tls.domain_name, "ping.internal");
        assert_eq!(config.auth.login, "alice");
    }

    #[test]
    fn password_flag_does_not_exist() {
        let result = CliArgs::try_parse_from(["pinggate-daemon", "--password", "doe"]);
        assert!(result.is_err());
    }

    #[test]
    fn password_comes_from_environment() {
        let config = resolve(&parse(&[]), Some("s3cret".into())).unwrap();
        assert_eq!(config.auth.password, "s3cret");
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pinggate.json");
        std::fs::write(
            &path,
            r#"{
                "grpc_addr": "10.0.0.1:7777",
                "gateway_addr": "10.0.0.1:7778",
                "auth": { "login": "bob", "password": "pw" }
            }"#,
        )
        .unwrap();

        let cli = parse(&["--config", path.to_str().unwrap(), "--gateway-addr", "10.0.0.1:8080"]);
        let config = resolve(&cli, None).unwrap();

        assert_eq!(config.grpc_addr, "10.0.0.1:7777");
        assert_eq!(config.gateway_addr, "10.0.0.1:8080");
        assert_eq!(config.auth.login, "bob");
        assert_eq!(config.auth.password, "pw");
        assert_eq!(config.tls.domain_name, "localhost");
    }

    #[test]
    fn missing_config_file_is_read_error() {
        let cli = parse(&["--config", "/nonexistent/pinggate.json"]);
        assert!(matches!(resolve(&cli, None), Err(DaemonConfigError::Read { .. })));
    }

    #[test]
    fn malformed_config_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pinggate.json");
        std::fs::write(&path, "{ grpc_addr: ").unwrap();

        let cli = parse(&["--config", path.to_str().unwrap()]);
        assert!(matches!(resolve(&cli, None), Err(DaemonConfigError::Parse { .. })));
    }
}
