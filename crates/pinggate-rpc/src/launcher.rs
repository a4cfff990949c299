//! Starts and supervises both listeners.
//!
//! [`run`] brings up the binary listener first, then the gateway pointed
//! at it, and waits. Either listener stopping on its own is fatal for the
//! whole process: the other one is told to shut down and the first error
//! is returned. The caller's `shutdown` future triggers a graceful stop
//! of both.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::sync::watch;
use tokio::task::JoinError;

use pinggate_types::config::GatewayConfig;
use pinggate_types::{ListenerError, Result};

use crate::gateway::{GatewayListener, GATEWAY_LISTENER};
use crate::server::{flatten_join, BinaryListener, GRPC_LISTENER};

enum Exit {
    Shutdown,
    Grpc(std::result::Result<Result<()>, JoinError>),
    Gateway(std::result::Result<Result<()>, JoinError>),
}

/// Runs both listeners until `shutdown` resolves or one of them stops.
///
/// # Errors
///
/// - [`ListenerError::Config`] if `config` fails validation.
/// - Any startup error of either listener.
/// - [`ListenerError::Serve`] if a listener fails or exits while the
///   other is still expected to run.
pub async fn run<F>(config: GatewayConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    config.validate()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let binary = BinaryListener::start(&config, shutdown_rx.clone()).await?;
    let backend_addr = dial_addr(binary.local_addr()).to_string();

    let gateway = match GatewayListener::start(&config, &backend_addr, shutdown_rx).await {
        Ok(gateway) => gateway,
        Err(e) => {
            let _ = shutdown_tx.send(true);
            if let Err(join_err) = binary.join().await {
                tracing::warn!(%join_err, "gRPC server stopped with error during abort");
            }
            return Err(e);
        }
    };

    tracing::info!(
        grpc = %binary.local_addr(),
        gateway = %gateway.local_addr(),
        "listeners running"
    );

    let mut grpc_handle = binary.into_handle();
    let mut gateway_handle = gateway.into_handle();
    tokio::pin!(shutdown);

    let exit = tokio::select! {
        () = &mut shutdown => Exit::Shutdown,
        res = &mut grpc_handle => Exit::Grpc(res),
        res = &mut gateway_handle => Exit::Gateway(res),
    };

    // Every path below stops the survivor before returning.
    let _ = shutdown_tx.send(true);

    match exit {
        Exit::Shutdown => {
            tracing::info!("shutdown requested, draining listeners");
            let grpc = flatten_join(GRPC_LISTENER, grpc_handle.await);
            let gateway = flatten_join(GATEWAY_LISTENER, gateway_handle.await);
            grpc.and(gateway)
        }
        Exit::Grpc(res) => {
            let err = unexpected_exit(GRPC_LISTENER, res);
            tracing::error!(%err, "gRPC server stopped, stopping gateway");
            drain_survivor(GATEWAY_LISTENER, gateway_handle.await);
            Err(err)
        }
        Exit::Gateway(res) => {
            let err = unexpected_exit(GATEWAY_LISTENER, res);
            tracing::error!(%err, "REST server stopped, stopping gRPC server");
            drain_survivor(GRPC_LISTENER, grpc_handle.await);
            Err(err)
        }
    }
}

/// Error for a listener that ended without being asked to.
fn unexpected_exit(
    listener: &'static str,
    joined: std::result::Result<Result<()>, JoinError>,
) -> ListenerError {
    match flatten_join(listener, joined) {
        Ok(()) => ListenerError::Serve {
            listener,
            reason: "stopped unexpectedly".into(),
        },
        Err(e) => e,
    }
}

/// Joins the listener left running after the other one failed.
///
/// Its own error is logged, not returned: the first failure wins.
fn drain_survivor(
    listener: &'static str,
    joined: std::result::Result<Result<()>, JoinError>,
) -> Option<ListenerError> {
    let err = flatten_join(listener, joined).err()?;
    tracing::warn!(listener, %err, "listener stopped with error during shutdown");
    Some(err)
}

/// Address the gateway dials to reach a listener bound at `bound`.
///
/// A wildcard bind is reached through loopback of the same family.
pub fn dial_addr(bound: SocketAddr) -> SocketAddr {
    let ip = match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, bound.port())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_is_dialled_through_loopback() {
        let v4: SocketAddr = "0.0.0.0:7777".parse().unwrap();
        assert_eq!(dial_addr(v4), "127.0.0.1:7777".parse::<SocketAddr>().unwrap());

        let v6: SocketAddr = "[::]:7777".parse().unwrap();
        assert_eq!(dial_addr(v6), "[::1]:7777".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn concrete_address_is_dialled_as_is() {
        let addr: SocketAddr = "192.0.2.10:7777".parse().unwrap();
        assert_eq!(dial_addr(addr), addr);
    }

    #[test]
    fn clean_exit_counts_as_unexpected() {
        let err = unexpected_exit(GATEWAY_LISTENER, Ok(Ok(())));
        assert!(matches!(err, ListenerError::Serve { listener, .. } if listener == "gateway"));
    }

    #[test]
    fn serve_error_is_kept() {
        let serve_err = ListenerError::Serve {
            listener: GRPC_LISTENER,
            reason: "boom".into(),
        };
        let err = unexpected_exit(GRPC_LISTENER, Ok(Err(serve_err)));
        assert_eq!(err.to_string(), "grpc listener failed: boom");
    }

    #[test]
    fn survivor_error_is_reported() {
        let serve_err = ListenerError::Serve {
            listener: GATEWAY_LISTENER,
            reason: "drain failed".into(),
        };
        let err = drain_survivor(GATEWAY_LISTENER, Ok(Err(serve_err))).unwrap();
        assert_eq!(err.to_string(), "gateway listener failed: drain failed");
        assert!(drain_survivor(GRPC_LISTENER, Ok(Ok(()))).is_none());
    }

    #[tokio::test]
    async fn invalid_config_fails_before_binding() {
        let config = GatewayConfig {
            grpc_addr: String::new(),
            ..GatewayConfig::default()
        };
        let result = run(config, std::future::pending()).await;
        assert!(matches!(result, Err(ListenerError::Config { .. })));
    }

    #[tokio::test]
    async fn missing_certificate_fails_startup() {
        let mut config = GatewayConfig {
            grpc_addr: "127.0.0.1:0".into(),
            gateway_addr: "127.0.0.1:0".into(),
            ..GatewayConfig::default()
        };
        config.tls.cert_path = "/nonexistent/server.crt".into();
        config.tls.key_path = "/nonexistent/server.key".into();

        let result = run(config, std::future::pending()).await;
        assert!(matches!(result, Err(ListenerError::TlsLoad { .. })));
    }
}
