//! Subscription management for change notifications.
//!
//! An `EventSource` hands out monotonically increasing subscription IDs and
//! delivers events synchronously, in subscription order. Cascades in the
//! engine run inline inside emission, so a handler may subscribe or
//! unsubscribe re-entrantly; emission snapshots the subscriber list first to
//! keep that safe.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

type Callback<E> = Rc<dyn Fn(&E)>;

/// An ordered list of subscribers to one event stream.
pub struct EventSource<E> {
    subscribers: RefCell<Vec<(SubscriptionId, Callback<E>)>>,
    next_id: Cell<SubscriptionId>,
}

impl<E> Default for EventSource<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventSource<E> {
    /// Creates a new event source with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    /// Subscribes to this event stream.
    ///
    /// Returns the subscription ID that can be used to unsubscribe. Handlers
    /// are invoked in subscription order.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) + 'static,
    {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.subscribers.borrow_mut().push((id, Rc::new(callback)));
        id
    }

    /// Unsubscribes by ID.
    ///
    /// Returns true if the subscription was found and removed. A handler
    /// removed while an emission is in flight may still observe that one
    /// in-flight event.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.borrow_mut();
        if let Some(pos) = subs.iter().position(|(sid, _)| *sid == id) {
            subs.remove(pos);
            true
        } else {
            false
        }
    }

    /// Delivers an event to every current subscriber, in subscription order.
    pub fn emit(&self, event: &E) {
        // Snapshot before invoking: handlers may (un)subscribe re-entrantly.
        let snapshot: Vec<Callback<E>> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for cb in snapshot {
            cb(event);
        }
    }

    /// Returns the number of active subscriptions.
    #[inline]
    pub fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Returns true if there are no subscriptions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscribers.borrow().is_empty()
    }

    /// Removes all subscriptions.
    pub fn clear(&self) {
        self.subscribers.borrow_mut().clear();
    }
}
