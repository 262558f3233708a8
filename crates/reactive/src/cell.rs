//! An observed scalar cell.
//!
//! `ObservedCell` holds one value and raises `ValueChange` only when a newly
//! stored value is unequal to the previous one. This is the primitive behind
//! the engine's no-spurious-notification invariant: equality, not identity,
//! decides whether a cascade continues.

use crate::event::ValueChange;
use crate::publisher::EventSource;
use core::cell::RefCell;

/// A scalar value that notifies on real change.
pub struct ObservedCell<T> {
    value: RefCell<T>,
    changed: EventSource<ValueChange<T>>,
}

impl<T: Clone + PartialEq> ObservedCell<T> {
    /// Creates a cell holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
            changed: EventSource::new(),
        }
    }

    /// Returns the current value.
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    /// Stores `value`, raising `ValueChange` iff it differs from the current
    /// value. Returns true if a change was published.
    pub fn set(&self, value: T) -> bool {
        let old = {
            let mut slot = self.value.borrow_mut();
            if *slot == value {
                return false;
            }
            core::mem::replace(&mut *slot, value.clone())
        };
        self.changed.emit(&ValueChange::new(old, value));
        true
    }

    /// Stores `value` without raising any event.
    pub fn set_silent(&self, value: T) {
        *self.value.borrow_mut() = value;
    }

    /// The value-changed event stream.
    #[inline]
    pub fn changed(&self) -> &EventSource<ValueChange<T>> {
        &self.changed
    }
}
