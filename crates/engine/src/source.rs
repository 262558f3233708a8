//! Enumerable-source plumbing shared by every collection-to-collection
//! operator.
//!
//! A `SourceBinding` wraps one collection-valued upstream node. It tracks the
//! sequence the upstream's *value* currently holds, re-subscribing whenever
//! that value itself changes (the swap is delivered as Reset), and translates
//! the sequence's structural events into the three hooks operators actually
//! specialize: Reset, Added, Removed. Replace and Move fold into Reset; full
//! reset is the safe default for both.
//!
//! The binding exclusively owns its upstream node and disposes it on
//! teardown.

use crate::operation::Operation;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use ripple_core::{SeqHandle, Value};
use ripple_reactive::{CollectionChange, SubscriptionId};

/// A structural event translated for an operator hook.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceEvent {
    /// Recompute everything from current state.
    Reset,
    /// Items were added starting at `index` (None: position unknowable).
    Added {
        items: Vec<Value>,
        index: Option<usize>,
    },
    /// Items were removed starting at `index`.
    Removed {
        items: Vec<Value>,
        index: Option<usize>,
    },
}

/// Handler invoked for each translated source event.
pub type SourceHandler = Rc<dyn Fn(&SourceEvent)>;

/// Tracks one collection-valued upstream and feeds its structural changes to
/// an operator hook.
pub struct SourceBinding {
    upstream: Rc<dyn Operation>,
    upstream_sub: Cell<SubscriptionId>,
    current: RefCell<Option<(SeqHandle, SubscriptionId)>>,
    handler: SourceHandler,
    disposed: Cell<bool>,
}

impl SourceBinding {
    /// Binds `handler` to the collection held by `upstream`'s value.
    ///
    /// No event fires for the initial binding; the caller reads `items()` to
    /// seed its own state. A non-sequence upstream value binds as an empty
    /// source.
    pub fn bind(upstream: Rc<dyn Operation>, handler: SourceHandler) -> Rc<Self> {
        let binding = Rc::new(Self {
            upstream,
            upstream_sub: Cell::new(0),
            current: RefCell::new(None),
            handler,
            disposed: Cell::new(false),
        });
        let weak = Rc::downgrade(&binding);
        let sub = binding.upstream.changed().subscribe(move |_| {
            if let Some(b) = weak.upgrade() {
                b.rebind(true);
            }
        });
        binding.upstream_sub.set(sub);
        binding.rebind(false);
        binding
    }

    /// The upstream node this binding tracks.
    pub fn upstream(&self) -> &Rc<dyn Operation> {
        &self.upstream
    }

    /// Returns the current source contents, or empty if the upstream value
    /// is not a sequence.
    pub fn items(&self) -> Vec<Value> {
        match &*self.current.borrow() {
            Some((seq, _)) => seq.snapshot(),
            None => Vec::new(),
        }
    }

    /// Returns true if the upstream value currently holds a sequence.
    pub fn has_source(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// Re-resolves the tracked sequence from the upstream value.
    fn rebind(self: &Rc<Self>, notify: bool) {
        if self.disposed.get() {
            return;
        }
        if let Some((seq, sub)) = self.current.borrow_mut().take() {
            seq.changes().unsubscribe(sub);
        }
        let seq = self
            .upstream
            .value()
            .ok()
            .and_then(|v| v.as_seq().cloned());
        if let Some(seq) = seq {
            let weak = Rc::downgrade(self);
            let sub = seq.changes().subscribe(move |change| {
                if let Some(b) = weak.upgrade() {
                    b.forward(change);
                }
            });
            *self.current.borrow_mut() = Some((seq, sub));
        }
        if notify {
            (self.handler)(&SourceEvent::Reset);
        }
    }

    /// Translates one structural event for the operator hook.
    fn forward(&self, change: &CollectionChange<Value>) {
        if self.disposed.get() {
            return;
        }
        let event = match change {
            CollectionChange::Add { items, index } => SourceEvent::Added {
                items: items.clone(),
                index: *index,
            },
            CollectionChange::Remove { items, index } => SourceEvent::Removed {
                items: items.clone(),
                index: *index,
            },
            CollectionChange::Reset
            | CollectionChange::Replace { .. }
            | CollectionChange::Move { .. } => SourceEvent::Reset,
        };
        (self.handler)(&event);
    }

    /// Unsubscribes everywhere and disposes the owned upstream node.
    /// Idempotent.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.upstream
            .changed()
            .unsubscribe(self.upstream_sub.get());
        if let Some((seq, sub)) = self.current.borrow_mut().take() {
            seq.changes().unsubscribe(sub);
        }
        self.upstream.dispose();
    }
}
