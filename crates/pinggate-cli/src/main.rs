//! Pinggate CLI client.
//!
//! Dials the binary endpoint over TLS with static credentials, sends one
//! greeting and prints the reply.

use std::path::PathBuf;

use clap::Parser;

use pinggate_rpc::{ClientError, PingClient};
use pinggate_types::Credentials;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Pinggate: send a greeting to the Ping service.
#[derive(Debug, Parser)]
#[command(name = "pinggate", version, about)]
struct Cli {
    /// Binary endpoint of the Ping service (`host:port` or `https://` URI).
    #[arg(long, default_value = "localhost:7777")]
    endpoint: String,

    /// Certificate the server presents, used as the trust root.
    #[arg(long, value_name = "PATH", default_value = "cert/server.crt")]
    ca_cert: PathBuf,

    /// Name expected in the server certificate.
    #[arg(long, value_name = "NAME", default_value = "localhost")]
    tls_domain: String,

    /// Login sent with every call.
    #[arg(long, default_value = "john")]
    login: String,

    /// Password sent with every call.
    #[arg(long, env = "PINGGATE_PASSWORD", default_value = "doe", hide_env_values = true)]
    password: String,

    /// Greeting to send.
    #[arg(long, default_value = "foo")]
    greeting: String,

    /// Output in JSON format (machine-readable).
    #[arg(long)]
    json: bool,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match send_greeting(&cli).await {
        Ok(reply) => {
            tracing::info!(greeting = %reply, "response from server");
            if cli.json {
                println!("{}", serde_json::json!({ "greeting": reply }));
            } else {
                println!("{reply}");
            }
        }
        Err(e) => {
            tracing::error!("{e}");
            if cli.json {
                eprintln!("{}", error_json(&e));
            }
            std::process::exit(1);
        }
    }
}

async fn send_greeting(cli: &Cli) -> Result<String, ClientError> {
    let credentials = Credentials::new(cli.login.clone(), cli.password.clone());
    let mut client =
        PingClient::connect(&cli.endpoint, &cli.ca_cert, &cli.tls_domain, &credentials).await?;
    client.say_hello(&cli.greeting).await
}

/// JSON error object; denials carry the failure kind.
fn error_json(error: &ClientError) -> serde_json::Value {
    match error {
        ClientError::Denied(auth) => serde_json::json!({
            "error": error.to_string(),
            "kind": auth.kind(),
        }),
        _ => serde_json::json!({ "error": error.to_string() }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
