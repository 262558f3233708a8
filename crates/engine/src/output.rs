//! The observable output sequence of a collection-valued operator.
//!
//! Every collection operator owns one `OutputSeq`. Its handle is wrapped in
//! the operator's Sequence value once at construction; the value never
//! changes afterwards, only the contents behind it do. Enumeration is lazy,
//! delegated back to the operator through a weak closure so the output does
//! not keep its operator alive.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use ripple_core::Value;
use ripple_reactive::{CollectionChange, EventSource, ObservableCollection};

/// The live result sequence exposed by a collection operator.
pub struct OutputSeq {
    changes: EventSource<CollectionChange<Value>>,
    enumerate: RefCell<Option<Rc<dyn Fn() -> Vec<Value>>>>,
}

impl OutputSeq {
    /// Creates an output with no enumerator yet; the operator installs one
    /// before handing its value out.
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            changes: EventSource::new(),
            enumerate: RefCell::new(None),
        })
    }

    /// Installs the enumeration closure. Capture the operator weakly.
    pub fn set_enumerator(&self, f: impl Fn() -> Vec<Value> + 'static) {
        *self.enumerate.borrow_mut() = Some(Rc::new(f));
    }

    /// Announces one structural change to downstream subscribers.
    /// Empty Add/Remove batches are dropped.
    pub fn publish(&self, change: CollectionChange<Value>) {
        if change.is_empty() {
            return;
        }
        self.changes.emit(&change);
    }

    /// Announces a full reset.
    pub fn reset(&self) {
        self.changes.emit(&CollectionChange::Reset);
    }

    /// The structural-change event stream, reachable without the
    /// `ObservableCollection` trait in scope.
    pub fn changes(&self) -> &EventSource<CollectionChange<Value>> {
        &self.changes
    }
}

impl ObservableCollection<Value> for OutputSeq {
    fn snapshot(&self) -> Vec<Value> {
        let enumerate = self.enumerate.borrow().clone();
        match enumerate {
            Some(f) => f(),
            None => Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.snapshot().len()
    }

    fn changes(&self) -> &EventSource<CollectionChange<Value>> {
        &self.changes
    }
}
