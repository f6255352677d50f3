//! REST transport core: request queue, reliable dispatcher and the
//! reqwest transport the bindings share.

pub mod dispatcher;
pub mod http;
pub mod queue;

pub use dispatcher::{RequestContext, RequestDispatcher, RequestTransport};
pub use http::{HttpTransport, RestResponse, RestResponseReceiver, RestResponseSender};
pub use queue::{new_correlation_id, PendingRequest, RequestQueue, RequestTarget, Verb};
