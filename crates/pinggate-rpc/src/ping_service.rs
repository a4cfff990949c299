//! `Ping` gRPC implementation.
//!
//! [`PingServiceImpl`] adapts the generated tonic trait to a
//! [`PingHandler`], converting the raw request into an
//! [`Authenticated`] one first. Handlers therefore never run for a call
//! the interceptor did not approve.

use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::auth::{status_from_auth_error, Authenticated};
use crate::proto;
use crate::proto::PingMessage;

/// Greeting returned by [`Greeter`] for every call.
pub const REPLY_GREETING: &str = "bar";

// ---------------------------------------------------------------------------
// PingHandler
// ---------------------------------------------------------------------------

/// Request handling for the `Ping` service.
///
/// Each method receives an already authenticated call. Additional
/// methods added to the service get their own entry here and are gated
/// by the same interceptor.
#[tonic::async_trait]
pub trait PingHandler: Send + Sync + 'static {
    /// Answers a greeting.
    async fn say_hello(&self, call: Authenticated<PingMessage>) -> Result<PingMessage, Status>;
}

/// Stock handler: logs the greeting and always answers [`REPLY_GREETING`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Greeter;

#[tonic::async_trait]
impl PingHandler for Greeter {
    async fn say_hello(&self, call: Authenticated<PingMessage>) -> Result<PingMessage, Status> {
        tracing::info!(
            greeting = %call.message().greeting,
            client = %call.identity(),
            "received message"
        );

        Ok(PingMessage {
            greeting: REPLY_GREETING.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Service state
// ---------------------------------------------------------------------------

/// gRPC implementation of `Ping`, delegating to a [`PingHandler`].
pub struct PingServiceImpl<H = Greeter> {
    handler: Arc<H>,
}

impl<H: PingHandler> PingServiceImpl<H> {
    /// Creates a new `PingServiceImpl` around `handler`.
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }
}

// ---------------------------------------------------------------------------
// tonic trait implementation
// ---------------------------------------------------------------------------

#[tonic::async_trait]
impl<H: PingHandler> proto::ping_server::Ping for PingServiceImpl<H> {
    async fn say_hello(
        &self,
        request: Request<PingMessage>,
    ) -> std::result::Result<Response<PingMessage>, Status> {
        let call = Authenticated::from_request(request).map_err(|e| {
            tracing::error!(%e, "unauthenticated call reached the handler");
            status_from_auth_error(&e)
        })?;

        let reply = self.handler.say_hello(call).await?;
        Ok(Response::new(reply))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use pinggate_types::ClientIdentity;
    use tonic::Code;

    use super::*;
    use crate::proto::ping_server::Ping;

    fn authenticated_request(greeting: &str) -> Request<PingMessage> {
        let mut request = Request::new(PingMessage {
            greeting: greeting.into(),
        });
        request.extensions_mut().insert(ClientIdentity::new("42"));
        request
    }

    #[tokio::test]
    async fn greeter_answers_bar() {
        let service = PingServiceImpl::new(Greeter);
        let reply = service.say_hello(authenticated_request("foo")).await.unwrap();
        assert_eq!(reply.into_inner().greeting, "bar");
    }

    #[tokio::test]
    async fn reply_ignores_input_greeting() {
        let service = PingServiceImpl::new(Greeter);
        for greeting in ["", "foo", "something else"] {
            let reply = service
                .say_hello(authenticated_request(greeting))
                .await
                .unwrap();
            assert_eq!(reply.into_inner().greeting, REPLY_GREETING);
        }
    }

    #[tokio::test]
    async fn unintercepted_request_is_internal_error() {
        let service = PingServiceImpl::new(Greeter);
        let request = Request::new(PingMessage {
            greeting: "foo".into(),
        });

        let status = service.say_hello(request).await.unwrap_err();
        assert_eq!(status.code(), Code::Internal);
    }
}
