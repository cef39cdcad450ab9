//! Pooled per-request state.
//!
//! # Responsibilities
//! - Hand each request an exclusively owned, empty context
//! - Recycle contexts through a lock-free queue
//!
//! # Design Decisions
//! - The pool resets a context on release, callers never reset by hand
//! - Only the path buffer's capacity survives reuse
//! - Idle contexts are bounded; surplus ones are dropped

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam::queue::SegQueue;

use crate::fetch::Source;
use crate::module::ParsedRequest;

/// Mutable state for one in-flight request.
#[derive(Debug, Default)]
pub struct RequestContext {
    /// Raw request path, decoded from the URI.
    pub path: String,
    /// Parsed form of `path`, once parsing succeeded.
    pub request: Option<ParsedRequest>,
    /// Correlation id propagated in `x-request-id`.
    pub request_id: Option<String>,
    /// Source that served the response.
    pub source: Option<Source>,
    /// When handling started.
    pub started: Option<Instant>,
}

impl RequestContext {
    fn reset(&mut self) {
        self.path.clear();
        self.request = None;
        self.request_id = None;
        self.source = None;
        self.started = None;
    }

    /// True when no field carries request data.
    pub fn is_clear(&self) -> bool {
        self.path.is_empty()
            && self.request.is_none()
            && self.request_id.is_none()
            && self.source.is_none()
            && self.started.is_none()
    }
}

/// Anonymous pool of request contexts.
#[derive(Debug)]
pub struct ContextPool {
    idle: SegQueue<RequestContext>,
    idle_count: AtomicUsize,
    max_idle: usize,
}

impl ContextPool {
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: SegQueue::new(),
            idle_count: AtomicUsize::new(0),
            max_idle,
        }
    }

    /// Take a clear context, allocating when the pool is empty.
    pub fn acquire(self: &Arc<Self>) -> PooledContext {
        let context = match self.idle.pop() {
            Some(context) => {
                self.idle_count.fetch_sub(1, Ordering::Relaxed);
                context
            }
            None => RequestContext::default(),
        };
        PooledContext {
            context,
            pool: Arc::clone(self),
        }
    }

    /// Number of contexts waiting for reuse.
    pub fn idle(&self) -> usize {
        self.idle_count.load(Ordering::Relaxed)
    }

    fn release(&self, mut context: RequestContext) {
        context.reset();
        let mut current = self.idle_count.load(Ordering::Relaxed);
        while current < self.max_idle {
            match self.idle_count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    self.idle.push(context);
                    return;
                }
                Err(actual) => current = actual,
            }
        }
    }
}

/// A context checked out of the pool; returned on drop.
#[derive(Debug)]
pub struct PooledContext {
    context: RequestContext,
    pool: Arc<ContextPool>,
}

impl Deref for PooledContext {
    type Target = RequestContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

impl DerefMut for PooledContext {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.context
    }
}

impl Drop for PooledContext {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.context));
    }
}
