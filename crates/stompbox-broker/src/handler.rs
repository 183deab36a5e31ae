//! Host-side message handlers
//!
//! Handlers are the inbound mirror of the subscription registry: clients
//! SEND to a destination, the host's registered callback receives the
//! frame. One handler per destination; a later registration replaces the
//! earlier one.

use dashmap::DashMap;
use std::sync::Arc;
use stompbox_core::Frame;

/// Callback invoked with each SEND frame addressed to its destination
pub type Handler = Arc<dyn Fn(Frame) + Send + Sync>;

/// Handlers by destination
pub struct HandlerRegistry {
    handlers: DashMap<String, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Register a handler for a destination, replacing any existing one
    pub fn subscribe<F>(&self, destination: &str, handler: F)
    where
        F: Fn(Frame) + Send + Sync + 'static,
    {
        self.handlers
            .insert(destination.to_string(), Arc::new(handler));
    }

    /// Drop the handler for a destination
    pub fn unsubscribe(&self, destination: &str) {
        self.handlers.remove(destination);
    }

    /// Invoke the handler for a destination. Returns whether one was
    /// registered.
    ///
    /// The callback is cloned out and the map reference released before the
    /// call, so a handler may re-enter the registry (subscribe, unsubscribe
    /// itself) without deadlocking on its own shard.
    pub fn dispatch(&self, destination: &str, frame: &Frame) -> bool {
        let handler = match self.handlers.get(destination) {
            Some(entry) => entry.value().clone(),
            None => return false,
        };
        (handler.as_ref())(frame.clone());
        true
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
