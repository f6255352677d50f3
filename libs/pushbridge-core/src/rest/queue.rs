//! Ordered queue of pending outbound requests.
//!
//! FIFO except for head-of-line retry: the dispatcher re-issues the head
//! and either rotates it to the tail for another pass or drops it once its
//! retry budget is spent.

use std::collections::VecDeque;

use uuid::Uuid;

/// HTTP-style verb of a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

/// Opaque transport descriptor: where the request goes and how.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestTarget {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl RequestTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// One queued outbound request.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub verb: Verb,
    /// Caller-supplied tag used to route the eventual response.
    pub req_id: i32,
    /// System-generated id used to locate and clear the request.
    pub correlation_id: String,
    pub target: RequestTarget,
    pub payload: Vec<u8>,
    pub retry_count: u32,
    pub aux_info: String,
}

pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Pending-request queue owned by one dispatcher.
#[derive(Debug, Default)]
pub struct RequestQueue {
    entries: VecDeque<PendingRequest>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, request: PendingRequest) {
        self.entries.push_back(request);
    }

    pub fn front_mut(&mut self) -> Option<&mut PendingRequest> {
        self.entries.front_mut()
    }

    /// Moves the head entry to the tail to wait for another pass.
    pub fn rotate_head_to_back(&mut self) {
        if let Some(head) = self.entries.pop_front() {
            self.entries.push_back(head);
        }
    }

    pub fn drop_head(&mut self) -> Option<PendingRequest> {
        self.entries.pop_front()
    }

    /// Removes the first entry matching `correlation_id`; no-op if absent.
    pub fn clear(&mut self, correlation_id: &str) {
        if let Some(pos) = self
            .entries
            .iter()
            .position(|r| r.correlation_id == correlation_id)
        {
            self.entries.remove(pos);
        }
    }

    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingRequest> {
        self.entries.iter()
    }
}
