//! The operation-node contract.
//!
//! An operation is a live, value-holding unit evaluating one expression node
//! incrementally. It owns the child operations it constructed, republishes a
//! `ValueChange` whenever its recomputed value is unequal to the previous
//! one, and tears down deterministically: unsubscribe from children first,
//! then dispose the owned ones.
//!
//! Runtime evaluation failures latch: the node records the error, publishes
//! `Null` as a placeholder, and `value()` returns the error until a later
//! successful recompute clears it. Construction never returns a half-built
//! node; the initial value (or latched error) is computed before the
//! constructor hands the node back.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use ripple_core::{Error, Result, SeqHandle, Value};
use ripple_reactive::{EventSource, ObservableCollection, SubscriptionId, ValueChange};

/// Shared state embedded in every operation node.
pub struct OperationCore {
    value: RefCell<Value>,
    error: RefCell<Option<Error>>,
    changed: EventSource<ValueChange<Value>>,
    links: RefCell<Vec<Link>>,
    tag: RefCell<Option<Value>>,
    disposed: Cell<bool>,
}

struct Link {
    node: Rc<dyn Operation>,
    sub: SubscriptionId,
    owned: bool,
}

impl Default for OperationCore {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationCore {
    /// Creates a core with no value yet; the owning constructor must call
    /// `set_initial` before the node is handed out.
    pub fn new() -> Self {
        Self {
            value: RefCell::new(Value::Null),
            error: RefCell::new(None),
            changed: EventSource::new(),
            links: RefCell::new(Vec::new()),
            tag: RefCell::new(None),
            disposed: Cell::new(false),
        }
    }

    /// Stores the initial evaluation result without raising any event.
    pub fn set_initial(&self, result: Result<Value>) {
        match result {
            Ok(v) => {
                *self.value.borrow_mut() = v;
                *self.error.borrow_mut() = None;
            }
            Err(e) => {
                *self.value.borrow_mut() = Value::Null;
                *self.error.borrow_mut() = Some(e);
            }
        }
    }

    /// Returns the current value, or the latched evaluation error.
    pub fn try_value(&self) -> Result<Value> {
        if let Some(err) = self.error.borrow().as_ref() {
            return Err(err.clone());
        }
        Ok(self.value.borrow().clone())
    }

    /// Returns the current value ignoring any latched error.
    pub fn raw_value(&self) -> Value {
        self.value.borrow().clone()
    }

    /// Stores a successfully recomputed value.
    ///
    /// Raises `ValueChange` iff the value is unequal to the previous one, or
    /// a latched error is being cleared (parents must re-pull to clear their
    /// own latched state).
    pub fn publish(&self, value: Value) {
        if self.disposed.get() {
            return;
        }
        let had_error = self.error.borrow_mut().take().is_some();
        let old = {
            let mut slot = self.value.borrow_mut();
            if *slot == value && !had_error {
                return;
            }
            core::mem::replace(&mut *slot, value.clone())
        };
        self.changed.emit(&ValueChange::new(old, value));
    }

    /// Latches an evaluation error, publishing `Null` as the placeholder.
    pub fn publish_error(&self, error: Error) {
        if self.disposed.get() {
            return;
        }
        {
            let mut slot = self.error.borrow_mut();
            if slot.as_ref() == Some(&error) {
                return;
            }
            *slot = Some(error);
        }
        let old = core::mem::replace(&mut *self.value.borrow_mut(), Value::Null);
        self.changed.emit(&ValueChange::new(old, Value::Null));
    }

    /// The value-changed event stream.
    #[inline]
    pub fn changed(&self) -> &EventSource<ValueChange<Value>> {
        &self.changed
    }

    /// Records a child subscription for teardown.
    ///
    /// `owned` children are disposed when this node is disposed; borrowed
    /// ones (context-bound variables) are only unsubscribed from.
    pub fn attach(&self, node: Rc<dyn Operation>, sub: SubscriptionId, owned: bool) {
        self.links.borrow_mut().push(Link { node, sub, owned });
    }

    /// Unsubscribes from every child, then disposes the owned ones.
    pub fn teardown(&self) {
        let links = core::mem::take(&mut *self.links.borrow_mut());
        for link in &links {
            link.node.changed().unsubscribe(link.sub);
        }
        for link in links {
            if link.owned {
                link.node.dispose();
            }
        }
        self.changed.clear();
    }

    /// Marks this core as disposed, returning the previous flag.
    pub fn mark_disposed(&self) -> bool {
        self.disposed.replace(true)
    }

    /// Returns true once the node has been disposed.
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Returns the opaque tag attachment, if set.
    pub fn tag(&self) -> Option<Value> {
        self.tag.borrow().clone()
    }

    /// Sets the opaque tag attachment (the source element a per-element node
    /// belongs to).
    pub fn set_tag(&self, tag: Option<Value>) {
        *self.tag.borrow_mut() = tag;
    }
}

/// A live, value-holding unit evaluating one expression node incrementally.
pub trait Operation {
    /// The shared node state.
    fn core(&self) -> &OperationCore;

    /// Recomputes this node's value from its children's current values.
    fn evaluate(&self) -> Result<Value>;

    /// Operator-specific teardown (source bindings, containers), run before
    /// the generic child teardown.
    fn on_dispose(&self) {}

    /// Returns the current value, or the latched evaluation error.
    fn value(&self) -> Result<Value> {
        self.core().try_value()
    }

    /// The value-changed event stream.
    fn changed(&self) -> &EventSource<ValueChange<Value>> {
        self.core().changed()
    }

    /// Re-evaluates and publishes the outcome. The standard reaction to a
    /// child's value change.
    fn refresh(&self) {
        if self.core().is_disposed() {
            return;
        }
        match self.evaluate() {
            Ok(v) => self.core().publish(v),
            Err(e) => self.core().publish_error(e),
        }
    }

    /// Disposes this node: unsubscribes from children first, then disposes
    /// owned children. Idempotent; no events fire afterwards.
    fn dispose(&self) {
        if self.core().mark_disposed() {
            return;
        }
        self.on_dispose();
        self.core().teardown();
    }

    /// Returns true once the node has been disposed.
    fn is_disposed(&self) -> bool {
        self.core().is_disposed()
    }
}

/// Subscribes `owner` to `child`'s value changes, re-evaluating on each, and
/// records the link for teardown.
pub fn watch<T>(owner: &Rc<T>, child: Rc<dyn Operation>, owned: bool)
where
    T: Operation + 'static,
{
    let weak = Rc::downgrade(owner);
    let sub = child.changed().subscribe(move |_| {
        if let Some(op) = weak.upgrade() {
            op.refresh();
        }
    });
    owner.core().attach(child, sub, owned);
}

/// A constant-valued leaf node.
pub struct ConstantOperation {
    core: OperationCore,
    value: Value,
}

impl ConstantOperation {
    /// Creates a constant node.
    pub fn new(value: Value) -> Rc<Self> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
            value: value.clone(),
        });
        node.core.set_initial(Ok(value));
        node
    }
}

impl Operation for ConstantOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn evaluate(&self) -> Result<Value> {
        Ok(self.value.clone())
    }
}

/// The settable lambda-parameter binding inside a per-element sub-graph.
pub struct ItemOperation {
    core: OperationCore,
}

impl ItemOperation {
    /// Creates an item node holding `value`.
    pub fn new(value: Value) -> Rc<Self> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
        });
        node.core.set_initial(Ok(value));
        node
    }

    /// Rebinds the node to a new element value, cascading if it differs.
    pub fn set_item(&self, value: Value) {
        self.core.publish(value);
    }
}

impl Operation for ItemOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn evaluate(&self) -> Result<Value> {
        Ok(self.core.raw_value())
    }
}

/// A reference to a context-bound variable node.
///
/// Mirrors the bound node's value. The bound node is owned by its context,
/// never by this reference; disposal only unsubscribes.
pub struct VariableOperation {
    core: OperationCore,
    target: Rc<dyn Operation>,
}

impl VariableOperation {
    /// Creates a reference to the node bound to `target`.
    pub fn new(target: Rc<dyn Operation>) -> Rc<Self> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
            target: target.clone(),
        });
        node.core.set_initial(node.target.value());
        watch(&node, target, false);
        node
    }
}

impl Operation for VariableOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn evaluate(&self) -> Result<Value> {
        self.target.value()
    }
}

/// Adapts a live observable collection into a constant Sequence-valued leaf.
///
/// The node's value never changes; the collection announces its own
/// structural changes to whoever binds to it downstream.
pub struct SourceOperation {
    core: OperationCore,
    handle: SeqHandle,
}

impl SourceOperation {
    /// Wraps a collection as a leaf node.
    pub fn new(collection: Rc<dyn ObservableCollection<Value>>) -> Rc<Self> {
        let handle = SeqHandle::new(collection);
        let node = Rc::new(Self {
            core: OperationCore::new(),
            handle: handle.clone(),
        });
        node.core.set_initial(Ok(Value::Sequence(handle)));
        node
    }

    /// The wrapped sequence handle.
    pub fn handle(&self) -> &SeqHandle {
        &self.handle
    }
}

impl Operation for SourceOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn evaluate(&self) -> Result<Value> {
        Ok(Value::Sequence(self.handle.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;
    use ripple_reactive::ObservableVec;

    #[test]
    fn test_constant_operation() {
        let node = ConstantOperation::new(Value::Int(5));
        assert_eq!(node.value(), Ok(Value::Int(5)));
        assert!(!node.is_disposed());
    }

    #[test]
    fn test_item_operation_fires_on_change_only() {
        let node = ItemOperation::new(Value::Int(1));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let seen_clone = seen.clone();
        node.changed().subscribe(move |c| {
            seen_clone.borrow_mut().push((c.old.clone(), c.new.clone()));
        });

        node.set_item(Value::Int(1));
        node.set_item(Value::Int(2));

        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0], (Value::Int(1), Value::Int(2)));
    }

    #[test]
    fn test_variable_mirrors_target() {
        let item = ItemOperation::new(Value::Int(1));
        let var = VariableOperation::new(item.clone());

        assert_eq!(var.value(), Ok(Value::Int(1)));

        item.set_item(Value::Int(9));
        assert_eq!(var.value(), Ok(Value::Int(9)));
    }

    #[test]
    fn test_variable_dispose_leaves_target_alive() {
        let item = ItemOperation::new(Value::Int(1));
        let var = VariableOperation::new(item.clone());

        var.dispose();
        assert!(var.is_disposed());
        assert!(!item.is_disposed());

        // No events reach a disposed node.
        item.set_item(Value::Int(2));
        assert_eq!(var.core().raw_value(), Value::Int(1));
    }

    #[test]
    fn test_dispose_idempotent() {
        let node = ConstantOperation::new(Value::Int(1));
        node.dispose();
        node.dispose();
        assert!(node.is_disposed());
    }

    #[test]
    fn test_publish_error_latches_until_cleared() {
        let node = ItemOperation::new(Value::Int(1));

        node.core()
            .publish_error(Error::null_target("age"));
        assert_eq!(node.value(), Err(Error::null_target("age")));
        assert_eq!(node.core().raw_value(), Value::Null);

        node.core().publish(Value::Int(3));
        assert_eq!(node.value(), Ok(Value::Int(3)));
    }

    #[test]
    fn test_source_operation_value_is_stable() {
        let source = Rc::new(ObservableVec::from_items(vec![Value::Int(1)]));
        let node = SourceOperation::new(source.clone());

        let before = node.value().unwrap();
        source.push(Value::Int(2));
        let after = node.value().unwrap();

        // Same wrapper object; contents evolved in place.
        assert_eq!(before, after);
        assert_eq!(node.handle().snapshot(), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_tag_attachment() {
        let node = ConstantOperation::new(Value::Int(1));
        assert_eq!(node.core().tag(), None);
        node.core().set_tag(Some(Value::from("elem")));
        assert_eq!(node.core().tag(), Some(Value::from("elem")));
    }
}
