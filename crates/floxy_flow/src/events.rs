// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed publish/subscribe used for all cross-component notification.
//!
//! Every component owns one [`Emitter`] over its own event enum. Emitting an
//! event calls the registered listeners synchronously and also queues the
//! event so that the owner of the component (usually the [`Flow`]) can drain
//! and route it after the current operation returns. An emitter built with
//! [`Emitter::listeners_only`] skips the queue until queueing is turned on.
//!
//! [`Flow`]: crate::flow::Flow

use std::fmt;

/// Handle returned by [`Emitter::on`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Box<dyn FnMut(&E)>;

/// Event emitter for a single event type
pub struct Emitter<E> {
    listeners: Vec<(ListenerId, Listener<E>)>,
    pending: Vec<E>,
    queueing: bool,
    next_id: u64,
}

impl<E> Emitter<E> {
    /// Create an emitter with no listeners
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            pending: Vec::new(),
            queueing: true,
            next_id: 1,
        }
    }

    /// Create an emitter that only calls listeners
    pub fn listeners_only() -> Self {
        Self {
            queueing: false,
            ..Self::new()
        }
    }

    /// Turn queueing on or off. Turning it off drops queued events.
    pub fn set_queueing(&mut self, queueing: bool) {
        self.queueing = queueing;
        if !queueing {
            self.pending.clear();
        }
    }

    /// Whether emitted events are queued for [`Emitter::drain`]
    pub fn is_queueing(&self) -> bool {
        self.queueing
    }

    /// Subscribe a listener
    pub fn on(&mut self, listener: impl FnMut(&E) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Unsubscribe a listener. Returns false if it was not registered.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Notify listeners and queue the event for the owner
    pub fn emit(&mut self, event: E) {
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
        if self.queueing {
            self.pending.push(event);
        }
    }

    /// Take all queued events
    pub fn drain(&mut self) -> Vec<E> {
        std::mem::take(&mut self.pending)
    }

    /// Whether events are waiting to be drained
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Number of subscribed listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.listeners.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_emit_reaches_listeners_and_queue() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut emitter = Emitter::new();
        let sink = Rc::clone(&seen);
        let id = emitter.on(move |e: &u32| sink.borrow_mut().push(*e));

        emitter.emit(1);
        emitter.emit(2);
        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert_eq!(emitter.drain(), vec![1, 2]);
        assert!(!emitter.has_pending());

        assert!(emitter.off(id));
        assert!(!emitter.off(id));
        emitter.emit(3);
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_listeners_only_never_queues() {
        let seen = Rc::new(RefCell::new(0));
        let mut emitter = Emitter::listeners_only();
        let sink = Rc::clone(&seen);
        emitter.on(move |_: &u32| *sink.borrow_mut() += 1);

        for i in 0..100 {
            emitter.emit(i);
        }
        assert_eq!(*seen.borrow(), 100);
        assert!(!emitter.has_pending());

        emitter.set_queueing(true);
        emitter.emit(7);
        assert_eq!(emitter.drain(), vec![7]);
        emitter.emit(8);
        emitter.set_queueing(false);
        assert!(!emitter.has_pending());
    }
}
