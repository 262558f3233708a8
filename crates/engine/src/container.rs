//! Per-element lambda sub-graphs.
//!
//! `ElementGraphs` maintains one compiled copy of a lambda body per distinct
//! element of a source collection, keyed by value equality with an occurrence
//! count. Duplicate elements share a single sub-graph; the graph is disposed
//! when the last occurrence leaves the source. The lambda body is
//! probe-compiled once at attach time, so structurally invalid lambdas fail
//! construction even over an empty source.
//!
//! Operators consume translated `ContainerEvent`s: structural add/remove
//! batches paired with the per-element results, plus `ItemResult` when a
//! live sub-graph recomputes its value for a still-present element.

use crate::compile::compile;
use crate::context::OperationContext;
use crate::expr::Expr;
use crate::operation::{ItemOperation, Operation};
use crate::source::{SourceBinding, SourceEvent};
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use hashbrown::HashMap;
use ripple_core::{Result, Value};
use ripple_reactive::{EventSource, SubscriptionId};

/// A source change translated with per-element lambda results attached.
#[derive(Clone, Debug, PartialEq)]
pub enum ContainerEvent {
    /// The source changed wholesale; sub-graphs have been reconciled.
    Reset,
    /// Elements were added; `results[i]` is the lambda result for `items[i]`.
    Added {
        items: Vec<Value>,
        results: Vec<Value>,
        index: Option<usize>,
    },
    /// Elements were removed; `results[i]` is the last lambda result each had.
    Removed {
        items: Vec<Value>,
        results: Vec<Value>,
        index: Option<usize>,
    },
    /// A live sub-graph recomputed its result for a still-present element.
    ItemResult { item: Value, old: Value, new: Value },
}

struct Entry {
    refs: usize,
    body: Rc<dyn Operation>,
    scope: Rc<OperationContext>,
    sub: SubscriptionId,
}

/// One compiled lambda sub-graph per distinct source element.
pub struct ElementGraphs {
    context: Rc<OperationContext>,
    param: String,
    body: Expr,
    entries: RefCell<HashMap<Value, Entry>>,
    binding: RefCell<Option<Rc<SourceBinding>>>,
    events: EventSource<ContainerEvent>,
    disposed: Cell<bool>,
}

impl ElementGraphs {
    /// Compiles `lambda` against `upstream`'s elements.
    ///
    /// The body is probe-compiled against a placeholder element first;
    /// structural compile errors are deterministic in the element value, so
    /// this surfaces them even when the source is currently empty.
    pub fn attach(
        context: &Rc<OperationContext>,
        param: &str,
        body: &Expr,
        upstream: Rc<dyn Operation>,
    ) -> Result<Rc<Self>> {
        let probe_item = ItemOperation::new(Value::Null);
        let probe_scope = OperationContext::with_variable(context, param, probe_item);
        let probe = compile(body, &probe_scope)?;
        probe.dispose();
        probe_scope.dispose_bindings();

        let container = Rc::new(Self {
            context: context.clone(),
            param: String::from(param),
            body: body.clone(),
            entries: RefCell::new(HashMap::new()),
            binding: RefCell::new(None),
            events: EventSource::new(),
            disposed: Cell::new(false),
        });

        let weak = Rc::downgrade(&container);
        let binding = SourceBinding::bind(
            upstream,
            Rc::new(move |event: &SourceEvent| {
                if let Some(c) = weak.upgrade() {
                    c.on_source(event);
                }
            }),
        );
        for item in binding.items() {
            container.acquire(&item);
        }
        *container.binding.borrow_mut() = Some(binding);
        Ok(container)
    }

    /// The translated event stream operators subscribe to.
    pub fn events(&self) -> &EventSource<ContainerEvent> {
        &self.events
    }

    /// The current source contents, duplicates included.
    pub fn items(&self) -> Vec<Value> {
        match &*self.binding.borrow() {
            Some(b) => b.items(),
            None => Vec::new(),
        }
    }

    /// The current lambda result for a present element.
    ///
    /// Per-element evaluation failures read as Null; collection operators
    /// never latch a whole-query error for one element.
    pub fn result_for(self: &Rc<Self>, item: &Value) -> Value {
        if let Some(entry) = self.entries.borrow().get(item) {
            return entry.body.value().unwrap_or(Value::Null);
        }
        // Not resident: evaluate transiently without keeping a graph.
        let item_node = ItemOperation::new(item.clone());
        let scope = OperationContext::with_variable(&self.context, &self.param, item_node);
        match compile(&self.body, &scope) {
            Ok(body) => {
                let result = body.value().unwrap_or(Value::Null);
                body.dispose();
                scope.dispose_bindings();
                result
            }
            Err(_) => Value::Null,
        }
    }

    /// Current (item, result) pairs in source order.
    pub fn pairs(self: &Rc<Self>) -> Vec<(Value, Value)> {
        self.items()
            .into_iter()
            .map(|item| {
                let result = self.result_for(&item);
                (item, result)
            })
            .collect()
    }

    fn on_source(self: &Rc<Self>, event: &SourceEvent) {
        if self.disposed.get() {
            return;
        }
        match event {
            SourceEvent::Reset => {
                self.reconcile();
                self.events.emit(&ContainerEvent::Reset);
            }
            SourceEvent::Added { items, index } => {
                let results: Vec<Value> = items.iter().map(|i| self.acquire(i)).collect();
                self.events.emit(&ContainerEvent::Added {
                    items: items.clone(),
                    results,
                    index: *index,
                });
            }
            SourceEvent::Removed { items, index } => {
                let results: Vec<Value> = items.iter().map(|i| self.release(i)).collect();
                self.events.emit(&ContainerEvent::Removed {
                    items: items.clone(),
                    results,
                    index: *index,
                });
            }
        }
    }

    /// Bumps the occurrence count for `item`, building its sub-graph on the
    /// first occurrence. Returns the current lambda result.
    fn acquire(self: &Rc<Self>, item: &Value) -> Value {
        if let Some(entry) = self.entries.borrow_mut().get_mut(item) {
            entry.refs += 1;
            return entry.body.value().unwrap_or(Value::Null);
        }
        let entry = self.build_entry(item, 1);
        let result = entry.body.value().unwrap_or(Value::Null);
        self.entries.borrow_mut().insert(item.clone(), entry);
        result
    }

    /// Drops one occurrence of `item`, disposing its sub-graph when the last
    /// occurrence leaves. Returns the result the element last had.
    fn release(self: &Rc<Self>, item: &Value) -> Value {
        let (result, emptied) = {
            let mut entries = self.entries.borrow_mut();
            let Some(entry) = entries.get_mut(item) else {
                return Value::Null;
            };
            let result = entry.body.value().unwrap_or(Value::Null);
            entry.refs = entry.refs.saturating_sub(1);
            (result, entry.refs == 0)
        };
        if emptied {
            if let Some(entry) = self.entries.borrow_mut().remove(item) {
                Self::drop_entry(entry);
            }
        }
        result
    }

    /// Rebuilds occurrence counts from a fresh source snapshot.
    fn reconcile(self: &Rc<Self>) {
        let mut desired: HashMap<Value, usize> = HashMap::new();
        for item in self.items() {
            *desired.entry(item).or_insert(0) += 1;
        }

        let stale: Vec<Value> = self
            .entries
            .borrow()
            .keys()
            .filter(|k| !desired.contains_key(*k))
            .cloned()
            .collect();
        for key in stale {
            if let Some(entry) = self.entries.borrow_mut().remove(&key) {
                Self::drop_entry(entry);
            }
        }

        for (item, count) in desired {
            if let Some(entry) = self.entries.borrow_mut().get_mut(&item) {
                entry.refs = count;
                continue;
            }
            let entry = self.build_entry(&item, count);
            self.entries.borrow_mut().insert(item, entry);
        }
    }

    fn build_entry(self: &Rc<Self>, item: &Value, refs: usize) -> Entry {
        let item_node = ItemOperation::new(item.clone());
        let scope = OperationContext::with_variable(&self.context, &self.param, item_node);
        // Structural compile errors are deterministic in the element value;
        // the probe in attach already rejected them.
        let body: Rc<dyn Operation> = match compile(&self.body, &scope) {
            Ok(body) => body,
            Err(_) => crate::operation::ConstantOperation::new(Value::Null),
        };
        body.core().set_tag(Some(item.clone()));

        let weak = Rc::downgrade(self);
        let element = item.clone();
        let sub = body.changed().subscribe(move |change| {
            if let Some(c) = weak.upgrade() {
                if c.disposed.get() {
                    return;
                }
                c.events.emit(&ContainerEvent::ItemResult {
                    item: element.clone(),
                    old: change.old.clone(),
                    new: change.new.clone(),
                });
            }
        });
        Entry {
            refs,
            body,
            scope,
            sub,
        }
    }

    fn drop_entry(entry: Entry) {
        entry.body.changed().unsubscribe(entry.sub);
        entry.body.dispose();
        entry.scope.dispose_bindings();
    }

    /// Tears down every sub-graph and the source binding. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        if let Some(binding) = self.binding.borrow_mut().take() {
            binding.dispose();
        }
        let entries = core::mem::take(&mut *self.entries.borrow_mut());
        for (_, entry) in entries {
            Self::drop_entry(entry);
        }
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::SourceOperation;
    use alloc::vec;
    use ripple_reactive::ObservableVec;

    fn setup(
        items: Vec<Value>,
    ) -> (
        Rc<ObservableVec<Value>>,
        Rc<ElementGraphs>,
        Rc<RefCell<Vec<ContainerEvent>>>,
    ) {
        let source = Rc::new(ObservableVec::from_items(items));
        let upstream = SourceOperation::new(source.clone());
        let ctx = OperationContext::root();
        // x * 2
        let body = Expr::mul(Expr::var("x"), Expr::constant(Value::Int(2)));
        let container = ElementGraphs::attach(&ctx, "x", &body, upstream).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        container.events().subscribe(move |e| {
            seen_clone.borrow_mut().push(e.clone());
        });
        (source, container, seen)
    }

    #[test]
    fn test_initial_population_and_results() {
        let (_source, container, _seen) = setup(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(container.result_for(&Value::Int(1)), Value::Int(2));
        assert_eq!(container.result_for(&Value::Int(2)), Value::Int(4));
        assert_eq!(
            container.pairs(),
            vec![
                (Value::Int(1), Value::Int(2)),
                (Value::Int(2), Value::Int(4))
            ]
        );
    }

    #[test]
    fn test_add_emits_results() {
        let (source, _container, seen) = setup(vec![]);
        source.push(Value::Int(5));

        assert_eq!(
            *seen.borrow(),
            vec![ContainerEvent::Added {
                items: vec![Value::Int(5)],
                results: vec![Value::Int(10)],
                index: Some(0),
            }]
        );
    }

    #[test]
    fn test_remove_reports_last_result() {
        let (source, _container, seen) = setup(vec![Value::Int(3)]);
        source.remove_at(0);

        assert_eq!(
            *seen.borrow(),
            vec![ContainerEvent::Removed {
                items: vec![Value::Int(3)],
                results: vec![Value::Int(6)],
                index: Some(0),
            }]
        );
    }

    #[test]
    fn test_duplicates_share_one_graph() {
        let (source, container, _seen) = setup(vec![Value::Int(1), Value::Int(1)]);
        assert_eq!(container.entries.borrow().len(), 1);
        assert_eq!(container.entries.borrow()[&Value::Int(1)].refs, 2);

        source.remove_at(0);
        assert_eq!(container.entries.borrow().len(), 1);

        source.remove_at(0);
        assert!(container.entries.borrow().is_empty());
    }

    #[test]
    fn test_reset_reconciles_graphs() {
        let (source, container, seen) = setup(vec![Value::Int(1), Value::Int(2)]);
        source.set_all(vec![Value::Int(2), Value::Int(3), Value::Int(3)]);

        assert_eq!(seen.borrow().last(), Some(&ContainerEvent::Reset));
        let entries = container.entries.borrow();
        assert_eq!(entries.len(), 2);
        assert!(!entries.contains_key(&Value::Int(1)));
        assert_eq!(entries[&Value::Int(3)].refs, 2);
    }

    #[test]
    fn test_invalid_lambda_fails_attach_on_empty_source() {
        let source: Rc<ObservableVec<Value>> = Rc::new(ObservableVec::new());
        let upstream = SourceOperation::new(source);
        let ctx = OperationContext::root();
        // free variable the scope never supplies
        let body = Expr::var("missing");

        let result = ElementGraphs::attach(&ctx, "x", &body, upstream);
        assert!(result.is_err());
    }

    #[test]
    fn test_outer_variable_change_fires_item_result() {
        let source = Rc::new(ObservableVec::from_items(vec![Value::Int(10)]));
        let upstream = SourceOperation::new(source);
        let outer = ItemOperation::new(Value::Int(1));
        let ctx = OperationContext::with_variable(
            &OperationContext::root(),
            "k",
            outer.clone(),
        );
        let body = Expr::add(Expr::var("x"), Expr::var("k"));
        let container = ElementGraphs::attach(&ctx, "x", &body, upstream).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        container.events().subscribe(move |e| {
            seen_clone.borrow_mut().push(e.clone());
        });

        outer.set_item(Value::Int(5));

        assert_eq!(
            *seen.borrow(),
            vec![ContainerEvent::ItemResult {
                item: Value::Int(10),
                old: Value::Int(11),
                new: Value::Int(15),
            }]
        );
    }

    #[test]
    fn test_dispose_tears_down_graphs() {
        let (source, container, seen) = setup(vec![Value::Int(1)]);
        container.dispose();
        container.dispose();

        source.push(Value::Int(2));
        assert!(seen.borrow().is_empty());
        assert!(container.entries.borrow().is_empty());
    }
}
