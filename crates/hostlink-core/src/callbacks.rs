//! Asynchronous reply correlation
//!
//! Each owner keeps its own [`CallbackRegistry`]. A request carries the id
//! returned by [`CallbackRegistry::register`]; the matching reply resolves it
//! exactly once.

use hashbrown::HashMap;
use tracing::{debug, trace};

use crate::errors::ProtocolError;
use crate::types::CallbackId;

/// A pending reply handler, run at most once
pub type Continuation<T> = Box<dyn FnOnce(T) + Send>;

/// Pending continuations of one owner keyed by callback id
pub struct CallbackRegistry<T> {
    pending: HashMap<CallbackId, Continuation<T>>,
    next_id: u32,
}

impl<T> Default for CallbackRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CallbackRegistry<T> {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            next_id: 1,
        }
    }

    /// Store a continuation and return the id to send with the request
    ///
    /// Ids increase from 1, never use 0, and skip ids that are still pending
    /// once the counter wraps.
    pub fn register<F>(&mut self, continuation: F) -> CallbackId
    where
        F: FnOnce(T) + Send + 'static,
    {
        let id = loop {
            let candidate = CallbackId::new(self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            if !candidate.is_none() && !self.pending.contains_key(&candidate) {
                break candidate;
            }
        };
        self.pending.insert(id, Box::new(continuation));
        trace!(callback_id = %id, "registered callback");
        id
    }

    /// Remove the continuation for `id` and run it with `payload`
    ///
    /// Id 0 means no callback was requested and is ignored. An id that was
    /// never issued or has already been resolved is an error.
    pub fn resolve(&mut self, id: CallbackId, payload: T) -> Result<(), ProtocolError> {
        if id.is_none() {
            return Ok(());
        }
        let continuation = self
            .pending
            .remove(&id)
            .ok_or(ProtocolError::UnknownCallback { callback_id: id })?;
        continuation(payload);
        Ok(())
    }

    /// Drop every pending continuation without running it
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        if cancelled > 0 {
            debug!(cancelled, "cancelled pending callbacks");
        }
        cancelled
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: CallbackId) -> bool {
        self.pending.contains_key(&id)
    }
}
