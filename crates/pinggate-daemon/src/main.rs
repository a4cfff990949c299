//! Pinggate Daemon -- the Ping service and its HTTP/1.1 gateway.
//!
//! Usage:
//!
//!   pinggate-daemon [OPTIONS]
//!
//! Options:
//!
//!   --config <PATH>            Load settings from a JSON file
//!   --grpc-addr <HOST:PORT>    Binary endpoint (default: localhost:7777)
//!   --gateway-addr <HOST:PORT> HTTP/1.1 gateway (default: localhost:7778)
//!   --cert <PATH>              Server certificate (default: cert/server.crt)
//!   --key <PATH>               Server private key (default: cert/server.key)
//!   --tls-domain <NAME>        Name in the certificate (default: localhost)
//!   --login <LOGIN>            Accepted login (default: john)
//!
//! Environment:
//!
//!   PINGGATE_PASSWORD          Expected password (default: doe)
//!   RUST_LOG                   Log level filter (default: info)
//!
//! The daemon runs until interrupted with Ctrl+C, or until either listener
//! fails, in which case it exits with status 1.

use clap::Parser;

use pinggate_rpc::launcher;

mod config;

#[tokio::main]
async fn main() {
    // Tracing / logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    print_banner();

    let cli = config::CliArgs::parse();

    let gateway_config = match config::resolve(&cli, std::env::var(config::PASSWORD_ENV).ok()) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        grpc_addr = %gateway_config.grpc_addr,
        gateway_addr = %gateway_config.gateway_addr,
        cert = %gateway_config.tls.cert_path.display(),
        login = %gateway_config.auth.login,
        "configuration loaded"
    );

    if let Err(e) = launcher::run(gateway_config, ctrl_c()).await {
        tracing::error!("daemon error: {e}");
        std::process::exit(1);
    }

    tracing::info!("daemon stopped");
}

/// Resolves on the first Ctrl+C.
async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C, shutting down..."),
        Err(e) => {
            // Without a signal handler only a listener failure ends the run.
            tracing::warn!(%e, "could not listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

fn print_banner() {
    println!(
        r#"
        _                         _
  _ __ (_)_ __   __ _  __ _  __ _| |_ ___
 | '_ \| | '_ \ / _` |/ _` |/ _` | __/ _ \
 | |_) | | | | | (_| | (_| | (_| | ||  __/
 | .__/|_|_| |_|\__, |\__, |\__,_|\__\___|
 |_|            |___/ |___/    daemon v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
