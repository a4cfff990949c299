//! HTTP/1.1 JSON gateway entry point.
//!
//! [`GatewayListener::start`] mirrors the Ping service as
//! `POST /1/ping`. Each request is translated into a gRPC call against
//! the binary listener:
//!
//! 1. The JSON body becomes a `PingMessage` (an empty body is an empty
//!    message).
//! 2. Allow-listed headers become call metadata (see
//!    [`crate::credentials`]).
//! 3. The call goes out over TLS on a channel shared by all requests.
//! 4. The reply is rendered as JSON, or the gRPC status is mapped to an
//!    HTTP status with a JSON error body.
//!
//! The gateway never authenticates anything itself; it only carries the
//! caller's credentials to the backend, which decides.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};

use pinggate_types::config::GatewayConfig;
use pinggate_types::{ListenerError, Result};

use crate::credentials::forward_credential_headers;
use crate::proto::ping_client::PingClient;
use crate::proto::PingMessage;
use crate::server::{wait_for_shutdown, RunningListener};
use crate::tls;

/// Listener name used in logs and [`ListenerError::Serve`].
pub const GATEWAY_LISTENER: &str = "gateway";

/// HTTP route mirroring `ping.Ping/SayHello`.
pub const PING_ROUTE: &str = "/1/ping";

// ---------------------------------------------------------------------------
// Error body
// ---------------------------------------------------------------------------

/// JSON body returned for every failed relay.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: i32,
    message: String,
}

/// HTTP status a gRPC JSON gateway reports for each gRPC code.
pub fn http_status_from_code(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        Code::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::REQUEST_TIMEOUT),
        Code::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists => StatusCode::CONFLICT,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::FailedPrecondition => StatusCode::BAD_REQUEST,
        Code::Aborted => StatusCode::CONFLICT,
        Code::OutOfRange => StatusCode::BAD_REQUEST,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: &Status) -> Response {
    let body = ErrorBody {
        error: status.message().to_string(),
        code: status.code() as i32,
        message: status.message().to_string(),
    };
    (http_status_from_code(status.code()), Json(body)).into_response()
}

// ---------------------------------------------------------------------------
// Relay handler
// ---------------------------------------------------------------------------

/// State shared by every gateway request.
#[derive(Clone)]
struct GatewayState {
    client: PingClient<Channel>,
}

async fn relay_say_hello(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let message = if body.is_empty() {
        PingMessage::default()
    } else {
        match serde_json::from_slice::<PingMessage>(&body) {
            Ok(message) => message,
            Err(e) => {
                return error_response(&Status::invalid_argument(format!(
                    "invalid JSON body: {e}"
                )));
            }
        }
    };

    let mut request = tonic::Request::new(message);
    *request.metadata_mut() = forward_credential_headers(&headers);

    let mut client = state.client.clone();
    match client.say_hello(request).await {
        Ok(reply) => (StatusCode::OK, Json(reply.into_inner())).into_response(),
        Err(status) => {
            tracing::warn!(
                code = ?status.code(),
                message = status.message(),
                "relayed call failed"
            );
            error_response(&status)
        }
    }
}

fn router(client: PingClient<Channel>) -> Router {
    Router::new()
        .route(PING_ROUTE, post(relay_say_hello))
        .with_state(GatewayState { client })
}

// ---------------------------------------------------------------------------
// GatewayListener
// ---------------------------------------------------------------------------

/// Manages the lifecycle of the HTTP/1.1 gateway.
pub struct GatewayListener;

impl GatewayListener {
    /// Starts the gateway, relaying to the binary listener at `backend_addr`.
    ///
    /// The backend channel connects lazily, so the gateway may start
    /// before the binary listener accepts connections.
    ///
    /// # Errors
    ///
    /// - [`ListenerError::TlsLoad`] if the server certificate cannot be
    ///   loaded as a trust root.
    /// - [`ListenerError::Registration`] if `backend_addr` is not a
    ///   valid endpoint.
    /// - [`ListenerError::Bind`] if `config.gateway_addr` cannot be bound.
    pub async fn start(
        config: &GatewayConfig,
        backend_addr: &str,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<RunningListener> {
        // Trust material: the server certificate, no key.
        let tls_config = tls::client_tls_config(&config.tls.cert_path, &config.tls.domain_name)?;

        // Register the backend endpoint.
        let endpoint = Endpoint::from_shared(format!("https://{backend_addr}"))
            .map_err(|e| ListenerError::Registration {
                reason: format!("invalid backend address '{backend_addr}': {e}"),
            })?
            .tls_config(tls_config)
            .map_err(|e| tls::tls_error(&config.tls.cert_path, e))?;
        let client = PingClient::new(endpoint.connect_lazy());

        // Bind and serve.
        let listener = TcpListener::bind(&config.gateway_addr)
            .await
            .map_err(|e| ListenerError::Bind {
                addr: config.gateway_addr.clone(),
                reason: e.to_string(),
            })?;
        let local_addr = listener.local_addr().map_err(|e| ListenerError::Bind {
            addr: config.gateway_addr.clone(),
            reason: e.to_string(),
        })?;

        tracing::info!(
            addr = %local_addr,
            backend = %backend_addr,
            "starting HTTP/1.1 REST server"
        );

        let app = router(client);
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
                .await;

            match result {
                Ok(()) => {
                    tracing::info!("REST server stopped");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(%e, "REST server error");
                    Err(ListenerError::Serve {
                        listener: GATEWAY_LISTENER,
                        reason: e.to_string(),
                    })
                }
            }
        });

        Ok(RunningListener::new(GATEWAY_LISTENER, local_addr, handle))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
