//! Consumer-facing views over a compiled query.
//!
//! A view owns its operation graph: compiling is one call, reading is
//! synchronous, and disposing the view tears the whole graph down. The
//! collection view subscribes to the result sequence's own change stream,
//! so the full structural vocabulary (including positioned Replace and
//! Move) reaches subscribers untranslated while a materialized buffer keeps
//! repeated reads free.

use crate::compile::compile;
use crate::context::OperationContext;
use crate::expr::Expr;
use crate::operation::Operation;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use ripple_core::{Result, SeqHandle, Value};
use ripple_reactive::{
    CollectionChange, EventSource, ObservableCollection, SubscriptionId, ValueChange,
};

/// A live, buffered view of a collection-valued query.
pub struct CollectionView {
    root: Rc<dyn Operation>,
    root_sub: Cell<SubscriptionId>,
    current: RefCell<Option<(SeqHandle, SubscriptionId)>>,
    items: RefCell<Vec<Value>>,
    changes: EventSource<CollectionChange<Value>>,
    disposed: Cell<bool>,
}

/// Compiles `expr` under `ctx` and materializes its result collection.
///
/// If the query's value is not a sequence the view is empty.
pub fn watch_collection(expr: &Expr, ctx: &Rc<OperationContext>) -> Result<Rc<CollectionView>> {
    let root = compile(expr, ctx)?;
    Ok(CollectionView::over(root))
}

impl CollectionView {
    /// Wraps an already-compiled root node. Takes ownership of the graph.
    pub fn over(root: Rc<dyn Operation>) -> Rc<Self> {
        let view = Rc::new(Self {
            root,
            root_sub: Cell::new(0),
            current: RefCell::new(None),
            items: RefCell::new(Vec::new()),
            changes: EventSource::new(),
            disposed: Cell::new(false),
        });
        let weak = Rc::downgrade(&view);
        let sub = view.root.changed().subscribe(move |_| {
            if let Some(v) = weak.upgrade() {
                v.resync(true);
            }
        });
        view.root_sub.set(sub);
        view.resync(false);
        view
    }

    /// Re-resolves the tracked sequence from the root's value. A swap of the
    /// sequence itself reads as Reset downstream.
    fn resync(self: &Rc<Self>, notify: bool) {
        if self.disposed.get() {
            return;
        }
        if let Some((seq, sub)) = self.current.borrow_mut().take() {
            seq.changes().unsubscribe(sub);
        }
        let seq = self.root.value().ok().and_then(|v| v.as_seq().cloned());
        let fresh = match &seq {
            Some(s) => s.snapshot(),
            None => Vec::new(),
        };
        if let Some(seq) = seq {
            let weak = Rc::downgrade(self);
            let sub = seq.changes().subscribe(move |change| {
                if let Some(v) = weak.upgrade() {
                    v.apply(change);
                }
            });
            *self.current.borrow_mut() = Some((seq, sub));
        }
        *self.items.borrow_mut() = fresh;
        if notify {
            self.changes.emit(&CollectionChange::Reset);
        }
    }

    /// Applies one structural event to the buffer, then republishes it
    /// unchanged.
    fn apply(&self, change: &CollectionChange<Value>) {
        if self.disposed.get() {
            return;
        }
        {
            let mut buffer = self.items.borrow_mut();
            match change {
                CollectionChange::Add { items, index } => {
                    let at = index.unwrap_or(buffer.len()).min(buffer.len());
                    buffer.splice(at..at, items.iter().cloned());
                }
                CollectionChange::Remove { items, index } => match index {
                    Some(i) => {
                        let start = (*i).min(buffer.len());
                        let end = (start + items.len()).min(buffer.len());
                        buffer.drain(start..end);
                    }
                    None => {
                        for item in items {
                            if let Some(pos) = buffer.iter().position(|x| x == item) {
                                buffer.remove(pos);
                            }
                        }
                    }
                },
                CollectionChange::Replace { old, new, index } => {
                    let at = match index {
                        Some(i) if *i < buffer.len() => Some(*i),
                        Some(_) => None,
                        None => old
                            .first()
                            .and_then(|o| buffer.iter().position(|x| x == o)),
                    };
                    if let Some(i) = at {
                        let end = (i + old.len()).min(buffer.len());
                        buffer.splice(i..end, new.iter().cloned());
                    }
                }
                CollectionChange::Move { items, from, to } => {
                    let start = (*from).min(buffer.len());
                    let end = (start + items.len()).min(buffer.len());
                    let moved: Vec<Value> = buffer.drain(start..end).collect();
                    let at = (*to).min(buffer.len());
                    buffer.splice(at..at, moved);
                }
                CollectionChange::Reset => {}
            }
        }
        if matches!(change, CollectionChange::Reset) {
            let fresh = match &*self.current.borrow() {
                Some((seq, _)) => seq.snapshot(),
                None => Vec::new(),
            };
            *self.items.borrow_mut() = fresh;
        }
        self.changes.emit(change);
    }

    /// Returns the element at `index`, if any.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.borrow().get(index).cloned()
    }

    /// Tears down the view and its whole operation graph. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.root.changed().unsubscribe(self.root_sub.get());
        if let Some((seq, sub)) = self.current.borrow_mut().take() {
            seq.changes().unsubscribe(sub);
        }
        self.root.dispose();
        self.changes.clear();
    }

    /// Returns true once the view has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

impl ObservableCollection<Value> for CollectionView {
    fn snapshot(&self) -> Vec<Value> {
        self.items.borrow().clone()
    }

    fn len(&self) -> usize {
        self.items.borrow().len()
    }

    fn changes(&self) -> &EventSource<CollectionChange<Value>> {
        &self.changes
    }
}

/// A live view of a scalar-valued query.
pub struct ScalarView {
    root: Rc<dyn Operation>,
}

/// Compiles `expr` under `ctx` as a scalar query.
pub fn watch_scalar(expr: &Expr, ctx: &Rc<OperationContext>) -> Result<ScalarView> {
    let root = compile(expr, ctx)?;
    Ok(ScalarView { root })
}

impl ScalarView {
    /// The current value, or the latched evaluation error.
    pub fn current(&self) -> Result<Value> {
        self.root.value()
    }

    /// The value-changed event stream.
    pub fn changed(&self) -> &EventSource<ValueChange<Value>> {
        self.root.changed()
    }

    /// Tears down the view's operation graph. Idempotent.
    pub fn dispose(&self) {
        self.root.dispose();
    }

    /// Returns true once the view has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.root.is_disposed()
    }
}
