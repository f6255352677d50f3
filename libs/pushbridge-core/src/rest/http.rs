//! reqwest-backed transport for the request dispatcher.
//!
//! `issue` fires the HTTP call on its own task and never blocks the
//! caller; the outcome lands as a [`RestResponse`] on the channel the
//! binding's response pump drains. The pump owns the follow-up work:
//! clear the request by correlation id, route the body by request id,
//! surface errors as transport-error events.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::PushError;
use crate::rest::dispatcher::{RequestContext, RequestTransport};
use crate::rest::queue::{RequestTarget, Verb};

/// Completed (or failed) HTTP exchange, correlated back to its request.
#[derive(Debug, Clone)]
pub struct RestResponse {
    pub req_id: i32,
    pub correlation_id: String,
    pub aux_info: String,
    pub status: u16,
    pub body: Vec<u8>,
    /// Transport failure or non-success status; `None` on success.
    pub error: Option<PushError>,
}

pub type RestResponseSender = mpsc::UnboundedSender<RestResponse>;
pub type RestResponseReceiver = mpsc::UnboundedReceiver<RestResponse>;

/// HTTP transport shared by the REST bindings.
pub struct HttpTransport {
    client: reqwest::Client,
    responses: RestResponseSender,
}

impl HttpTransport {
    /// Creates the transport together with the response receiver the
    /// binding's pump will drain.
    pub fn channel() -> (Arc<Self>, RestResponseReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                client: reqwest::Client::new(),
                responses: tx,
            }),
            rx,
        )
    }
}

#[async_trait]
impl RequestTransport for HttpTransport {
    async fn issue(
        &self,
        verb: Verb,
        ctx: &RequestContext,
        target: &RequestTarget,
        payload: &[u8],
    ) {
        let client = self.client.clone();
        let responses = self.responses.clone();
        let ctx = ctx.clone();
        let target = target.clone();
        let payload = payload.to_vec();

        tokio::spawn(async move {
            let mut request = match verb {
                Verb::Get => client.get(&target.url),
                Verb::Post => client.post(&target.url).body(payload),
                Verb::Put => client.put(&target.url).body(payload),
                Verb::Delete => client.delete(&target.url),
            };
            for (name, value) in &target.headers {
                request = request.header(name, value);
            }

            let response = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let error = if status.is_success() {
                        None
                    } else {
                        Some(PushError::Status(status.as_u16()))
                    };
                    let body = response.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
                    trace!(
                        req_id = ctx.req_id,
                        correlation_id = %ctx.correlation_id,
                        status = status.as_u16(),
                        "http exchange finished"
                    );
                    RestResponse {
                        req_id: ctx.req_id,
                        correlation_id: ctx.correlation_id,
                        aux_info: ctx.aux_info,
                        status: status.as_u16(),
                        body,
                        error,
                    }
                }
                Err(err) => RestResponse {
                    req_id: ctx.req_id,
                    correlation_id: ctx.correlation_id,
                    aux_info: ctx.aux_info,
                    status: 0,
                    body: Vec::new(),
                    error: Some(PushError::Transport(err.to_string())),
                },
            };

            // Receiver gone means the binding is tearing down.
            let _ = responses.send(response);
        });
    }
}
