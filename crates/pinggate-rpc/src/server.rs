//! Binary listener entry point.
//!
//! [`BinaryListener::start`] binds the TCP socket, loads the TLS
//! identity, installs the [`AuthInterceptor`] in front of the Ping
//! service and spawns the serve loop as a tokio task. Each startup step
//! is fatal on failure; nothing is spawned unless all of them succeed.
//!
//! # Graceful shutdown
//!
//! The listener accepts a `tokio::sync::watch::Receiver<bool>` that
//! signals shutdown. When the watch value becomes `true`, the server
//! stops accepting new connections and drains in-flight calls.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

use pinggate_types::config::GatewayConfig;
use pinggate_types::{ListenerError, Result};

use crate::auth::{AuthInterceptor, Authenticator};
use crate::ping_service::{Greeter, PingHandler, PingServiceImpl};
use crate::proto::ping_server::PingServer;
use crate::tls;

/// Listener name used in logs and [`ListenerError::Serve`].
pub const GRPC_LISTENER: &str = "grpc";

// ---------------------------------------------------------------------------
// Shutdown helper
// ---------------------------------------------------------------------------

/// Returns a future that resolves when the shutdown watch fires.
pub(crate) async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            break;
        }
        if rx.changed().await.is_err() {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// RunningListener
// ---------------------------------------------------------------------------

/// A listener whose serve loop is running on its own task.
#[derive(Debug)]
pub struct RunningListener {
    name: &'static str,
    local_addr: SocketAddr,
    handle: JoinHandle<Result<()>>,
}

impl RunningListener {
    pub(crate) fn new(
        name: &'static str,
        local_addr: SocketAddr,
        handle: JoinHandle<Result<()>>,
    ) -> Self {
        Self {
            name,
            local_addr,
            handle,
        }
    }

    /// Address the socket is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Gives up the task handle, e.g. to await it in a `select!`.
    pub fn into_handle(self) -> JoinHandle<Result<()>> {
        self.handle
    }

    /// Waits for the serve loop to end.
    pub async fn join(self) -> Result<()> {
        flatten_join(self.name, self.handle.await)
    }
}

/// Collapses a task result into the listener's own result.
pub(crate) fn flatten_join(
    listener: &'static str,
    joined: std::result::Result<Result<()>, tokio::task::JoinError>,
) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(ListenerError::Serve {
            listener,
            reason: format!("task aborted: {e}"),
        }),
    }
}

// ---------------------------------------------------------------------------
// BinaryListener
// ---------------------------------------------------------------------------

/// Manages the lifecycle of the TLS gRPC server.
pub struct BinaryListener;

impl BinaryListener {
    /// Starts the listener with the stock [`Greeter`] handler.
    ///
    /// # Errors
    ///
    /// - [`ListenerError::Bind`] if `config.grpc_addr` cannot be bound.
    /// - [`ListenerError::TlsLoad`] if the certificate or key is unusable.
    pub async fn start(
        config: &GatewayConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<RunningListener> {
        Self::start_with_handler(config, Greeter, shutdown_rx).await
    }

    /// Starts the listener serving `handler` behind the interceptor.
    pub async fn start_with_handler<H: PingHandler>(
        config: &GatewayConfig,
        handler: H,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<RunningListener> {
        // 1. Bind.
        let listener = TcpListener::bind(&config.grpc_addr)
            .await
            .map_err(|e| ListenerError::Bind {
                addr: config.grpc_addr.clone(),
                reason: e.to_string(),
            })?;
        let local_addr = listener.local_addr().map_err(|e| ListenerError::Bind {
            addr: config.grpc_addr.clone(),
            reason: e.to_string(),
        })?;

        // 2. Load TLS identity.
        let tls_config = tls::server_tls_config(&config.tls)?;
        let mut tls_builder = Server::builder()
            .tls_config(tls_config)
            .map_err(|e| tls::tls_error(&config.tls.cert_path, e))?;

        // 3 + 4. Gate the service and register it.
        let interceptor = AuthInterceptor::new(Authenticator::new(config.auth.clone()));
        let service = PingServer::with_interceptor(PingServiceImpl::new(handler), interceptor);
        let router = tls_builder.add_service(service);

        tracing::info!(addr = %local_addr, "starting HTTP/2 gRPC server");

        // 5. Serve.
        let incoming = TcpListenerStream::new(listener);
        let handle = tokio::spawn(async move {
            let result = router
                .serve_with_incoming_shutdown(incoming, wait_for_shutdown(shutdown_rx))
                .await;

            match result {
                Ok(()) => {
                    tracing::info!("gRPC server stopped");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(%e, "gRPC server error");
                    Err(ListenerError::Serve {
                        listener: GRPC_LISTENER,
                        reason: e.to_string(),
                    })
                }
            }
        });

        Ok(RunningListener::new(GRPC_LISTENER, local_addr, handle))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn shutdown_helper_returns_when_signalled() {
        let (tx, rx) = watch::channel(false);
        let waiter = tokio::spawn(wait_for_shutdown(rx));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn shutdown_helper_returns_if_already_set() {
        let (_tx, rx) = watch::channel(true);
        tokio::time::timeout(Duration::from_secs(1), wait_for_shutdown(rx))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn shutdown_helper_returns_when_sender_dropped() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), wait_for_shutdown(rx))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_tls_material_fails_before_serving() {
        let config = GatewayConfig {
            grpc_addr: "127.0.0.1:0".into(),
            tls: pinggate_types::config::TlsPaths {
                cert_path: "/nonexistent/server.crt".into(),
                key_path: "/nonexistent/server.key".into(),
                domain_name: "localhost".into(),
            },
            ..GatewayConfig::default()
        };
        let (_tx, rx) = watch::channel(false);

        let result = BinaryListener::start(&config, rx).await;
        assert!(matches!(result, Err(ListenerError::TlsLoad { .. })));
    }

    #[tokio::test]
    async fn occupied_port_is_bind_error() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = GatewayConfig {
            grpc_addr: taken.local_addr().unwrap().to_string(),
            ..GatewayConfig::default()
        };
        let (_tx, rx) = watch::channel(false);

        let result = BinaryListener::start(&config, rx).await;
        assert!(matches!(result, Err(ListenerError::Bind { .. })));
    }

    #[test]
    fn aborted_task_is_serve_error() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let joined = runtime.block_on(async {
            let handle = tokio::spawn(std::future::pending::<Result<()>>());
            handle.abort();
            handle.await
        });

        assert!(matches!(
            flatten_join(GRPC_LISTENER, joined),
            Err(ListenerError::Serve { listener, .. }) if listener == "grpc"
        ));
    }
}
