//! Reliable request dispatcher.
//!
//! Owns one request queue and one periodic tick task per provider. A
//! request submitted while online with `immediate` set bypasses the queue
//! entirely; everything else is queued and retried on the tick with
//! online gating, an at-most-one outstanding response discipline and a
//! bounded retry budget. Requests that exhaust the budget are dropped
//! silently so an unreachable endpoint cannot grow the queue forever.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::config::DispatcherConfig;
use crate::rest::queue::{new_correlation_id, PendingRequest, RequestQueue, RequestTarget, Verb};

/// Context registered on every transport call so the asynchronous
/// response can be correlated back and cleared.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub req_id: i32,
    pub correlation_id: String,
    pub aux_info: String,
}

/// Injected transport the dispatcher issues verbs through.
///
/// Implementations must not block: network I/O is fired off and the
/// completion comes back through the collaborator's own response path,
/// which calls [`RequestDispatcher::clear`] when done.
#[async_trait]
pub trait RequestTransport: Send + Sync {
    async fn issue(&self, verb: Verb, ctx: &RequestContext, target: &RequestTarget, payload: &[u8]);
}

struct DispatcherState {
    queue: RequestQueue,
    config: DispatcherConfig,
    online: bool,
    waiting_for_response: bool,
    waiting_counter: u32,
}

/// Reliable request dispatcher, one per provider.
pub struct RequestDispatcher {
    transport: Arc<dyn RequestTransport>,
    state: Mutex<DispatcherState>,
    ticker_running: AtomicBool,
}

impl RequestDispatcher {
    pub fn new(config: DispatcherConfig, transport: Arc<dyn RequestTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            state: Mutex::new(DispatcherState {
                queue: RequestQueue::new(),
                config,
                online: true,
                waiting_for_response: false,
                waiting_counter: 0,
            }),
            ticker_running: AtomicBool::new(false),
        })
    }

    /// Submits a request.
    ///
    /// With `immediate` set while online the request goes straight through
    /// the transport and `true` is returned; the queue is untouched.
    /// Otherwise the request is queued behind a fresh correlation id, the
    /// tick task is started if idle, and `false` is returned.
    pub async fn submit(
        self: &Arc<Self>,
        verb: Verb,
        req_id: i32,
        target: RequestTarget,
        payload: Vec<u8>,
        immediate: bool,
        aux_info: &str,
    ) -> bool {
        let online = self.state.lock().await.online;

        if immediate && online {
            let ctx = RequestContext {
                req_id,
                correlation_id: new_correlation_id(),
                aux_info: aux_info.to_string(),
            };
            trace!(req_id, correlation_id = %ctx.correlation_id, "immediate send");
            self.transport.issue(verb, &ctx, &target, &payload).await;
            return true;
        }

        {
            let mut state = self.state.lock().await;
            state.queue.push_back(PendingRequest {
                verb,
                req_id,
                correlation_id: new_correlation_id(),
                target,
                payload,
                retry_count: 0,
                aux_info: aux_info.to_string(),
            });
            debug!(req_id, pending = state.queue.len(), "request queued");
        }
        self.ensure_ticker();
        false
    }

    /// Removes the queued request matching `correlation_id` and ends the
    /// outstanding-response window. Collaborator response handlers must
    /// call this for every completed request, success or failure.
    pub async fn clear(&self, correlation_id: &str) {
        let mut state = self.state.lock().await;
        state.queue.clear(correlation_id);
        state.waiting_for_response = false;
        state.waiting_counter = 0;
    }

    /// Empties the queue, e.g. on provider teardown.
    pub async fn clear_all(&self) {
        let mut state = self.state.lock().await;
        state.queue.clear_all();
        state.waiting_for_response = false;
        state.waiting_counter = 0;
    }

    /// Reconfigures tick interval, response timeout and retry budget.
    /// Takes effect on the next tick.
    pub async fn set_timers(
        &self,
        request_interval_ms: u64,
        response_timeout_ticks: u32,
        max_retry_count: u32,
    ) {
        let mut state = self.state.lock().await;
        state.config.request_interval_ms = request_interval_ms;
        state.config.response_timeout_ticks = response_timeout_ticks;
        state.config.max_retry_count = max_retry_count;
    }

    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    pub async fn is_online(&self) -> bool {
        self.state.lock().await.online
    }

    /// Updates the online state. While offline no request is ever issued;
    /// queued entries wait for the next online tick.
    pub async fn set_online(&self, online: bool) {
        let mut state = self.state.lock().await;
        if state.online != online {
            debug!(online, "online state changed");
        }
        state.online = online;
    }

    fn ensure_ticker(self: &Arc<Self>) {
        if self.ticker_running.swap(true, Ordering::SeqCst) {
            return;
        }
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let interval = {
                    dispatcher.state.lock().await.config.request_interval_ms
                };
                tokio::time::sleep(Duration::from_millis(interval)).await;
                dispatcher.tick().await;

                let state = dispatcher.state.lock().await;
                if state.queue.is_empty() && !state.waiting_for_response {
                    break;
                }
            }
            dispatcher.ticker_running.store(false, Ordering::SeqCst);

            // A submit may have raced the shutdown check; restart if so.
            let state = dispatcher.state.lock().await;
            if !state.queue.is_empty() || state.waiting_for_response {
                drop(state);
                dispatcher.ensure_ticker();
            }
        });
    }

    /// One queue pass. Normally driven by the internal tick task.
    pub async fn tick(&self) {
        let (verb, ctx, target, payload) = {
            let mut state = self.state.lock().await;

            // Never issue anything while offline.
            if !state.online {
                return;
            }

            // A response is still outstanding from the previous pass:
            // count the wait out before starting a new attempt.
            if state.waiting_for_response {
                state.waiting_counter += 1;
                if state.waiting_counter > state.config.response_timeout_ticks {
                    debug!("response wait timed out, resuming retries");
                    state.waiting_for_response = false;
                    state.waiting_counter = 0;
                }
                return;
            }
            state.waiting_counter = 0;

            let max_retry = state.config.max_retry_count;
            let exhausted = match state.queue.front_mut() {
                // Post entries are issued on every pass; the other verbs
                // only while their retry budget lasts. Inherited verb
                // asymmetry, kept for behavioral compatibility.
                Some(head) => head.verb != Verb::Post && head.retry_count > max_retry,
                None => return,
            };
            if exhausted {
                if let Some(dropped) = state.queue.drop_head() {
                    debug!(
                        req_id = dropped.req_id,
                        correlation_id = %dropped.correlation_id,
                        retries = dropped.retry_count,
                        "retry budget exhausted, dropping request"
                    );
                }
                return;
            }

            let job = {
                let Some(head) = state.queue.front_mut() else {
                    return;
                };
                head.retry_count += 1;
                let ctx = RequestContext {
                    req_id: head.req_id,
                    correlation_id: head.correlation_id.clone(),
                    aux_info: head.aux_info.clone(),
                };
                (head.verb, ctx, head.target.clone(), head.payload.clone())
            };
            state.waiting_for_response = true;
            job
        };

        trace!(
            req_id = ctx.req_id,
            correlation_id = %ctx.correlation_id,
            "issuing queued request"
        );
        // Issued outside the state lock so a transport may call straight
        // back into `clear` without stalling the tick task.
        self.transport.issue(verb, &ctx, &target, &payload).await;

        let mut state = self.state.lock().await;
        let max_retry = state.config.max_retry_count;
        let Some(head) = state.queue.front_mut() else {
            return;
        };
        // A response may have cleared the entry while the request was in
        // flight; the head is then someone else's request.
        if head.correlation_id != ctx.correlation_id {
            return;
        }
        // Rotate the head to the tail for another pass while it still has
        // budget; Post rotates unconditionally. Otherwise drop it for good.
        if head.verb == Verb::Post || head.retry_count <= max_retry {
            state.queue.rotate_head_to_back();
        } else if let Some(dropped) = state.queue.drop_head() {
            debug!(
                req_id = dropped.req_id,
                correlation_id = %dropped.correlation_id,
                retries = dropped.retry_count,
                "retry budget exhausted, dropping request"
            );
        }
    }
}
