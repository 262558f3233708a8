//! Scalar aggregate operators: Count, Sum, Average, Min, Max, Any, All,
//! First and Single (with OrDefault forms).
//!
//! Aggregates come in three operand shapes. Plain forms read the source
//! elements directly. Predicate forms (Count, Any, First, Single) keep one
//! predicate sub-graph per distinct element and aggregate over the passing
//! elements. Selector forms (Sum, Average, Min, Max, All) aggregate over the
//! per-element lambda results.
//!
//! Count, Sum and Average maintain running accumulators adjusted per change;
//! a source Reset rebuilds them from scratch. The remaining kinds rescan on
//! every change and rely on equality-gated publishing to stay quiet when the
//! outcome is unchanged.

use crate::container::{ContainerEvent, ElementGraphs};
use crate::context::OperationContext;
use crate::expr::Expr;
use crate::operation::{Operation, OperationCore};
use crate::source::{SourceBinding, SourceEvent};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use ripple_core::{DataType, Error, Result, Value};

/// Which aggregate a node computes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateKind {
    Count,
    Sum,
    Average,
    Min,
    Max,
    Any,
    All,
    First { or_default: bool },
    Single { or_default: bool },
}

impl AggregateKind {
    fn name(&self) -> &'static str {
        match self {
            AggregateKind::Count => "Count",
            AggregateKind::Sum => "Sum",
            AggregateKind::Average => "Average",
            AggregateKind::Min => "Min",
            AggregateKind::Max => "Max",
            AggregateKind::Any => "Any",
            AggregateKind::All => "All",
            AggregateKind::First { .. } => "First",
            AggregateKind::Single { .. } => "Single",
        }
    }

    /// Kinds whose value derives from running accumulators.
    fn is_delta(&self) -> bool {
        matches!(
            self,
            AggregateKind::Count | AggregateKind::Sum | AggregateKind::Average
        )
    }
}

/// Running accumulators over the operand stream.
#[derive(Default)]
struct NumericState {
    total: i64,
    int_sum: i64,
    float_sum: f64,
    floats: i64,
    nulls: i64,
    non_numeric: i64,
}

impl NumericState {
    fn add(&mut self, v: &Value) {
        self.total += 1;
        match v {
            Value::Null => self.nulls += 1,
            Value::Int(i) => self.int_sum = self.int_sum.wrapping_add(*i),
            Value::Float(f) => {
                self.float_sum += f;
                self.floats += 1;
            }
            _ => self.non_numeric += 1,
        }
    }

    fn remove(&mut self, v: &Value) {
        self.total -= 1;
        match v {
            Value::Null => self.nulls -= 1,
            Value::Int(i) => self.int_sum = self.int_sum.wrapping_sub(*i),
            Value::Float(f) => {
                self.float_sum -= f;
                self.floats -= 1;
            }
            _ => self.non_numeric -= 1,
        }
    }

    fn rebuild(values: &[Value]) -> Self {
        let mut state = Self::default();
        for v in values {
            state.add(v);
        }
        state
    }

    fn numeric_count(&self) -> i64 {
        self.total - self.nulls - self.non_numeric
    }

    fn sum_f64(&self) -> f64 {
        self.int_sum as f64 + self.float_sum
    }
}

enum Operands {
    /// Source elements as-is.
    Items(Rc<SourceBinding>),
    /// Source elements whose predicate result is true.
    Filtered(Rc<ElementGraphs>),
    /// Per-element selector results.
    Mapped(Rc<ElementGraphs>),
}

/// A scalar aggregate over a collection-valued upstream.
pub struct AggregateOperation {
    core: OperationCore,
    kind: AggregateKind,
    operands: RefCell<Option<Operands>>,
    state: RefCell<NumericState>,
}

impl AggregateOperation {
    /// Aggregates the source elements directly (no lambda).
    pub fn over_items(kind: AggregateKind, upstream: Rc<dyn Operation>) -> Rc<Self> {
        let node = Self::bare(kind);
        let weak = Rc::downgrade(&node);
        let binding = SourceBinding::bind(
            upstream,
            Rc::new(move |event: &SourceEvent| {
                if let Some(n) = weak.upgrade() {
                    n.on_items(event);
                }
            }),
        );
        *node.operands.borrow_mut() = Some(Operands::Items(binding));
        node.prime();
        node
    }

    /// Aggregates the elements whose predicate sub-graph yields true.
    pub fn filtered(
        ctx: &Rc<OperationContext>,
        kind: AggregateKind,
        upstream: Rc<dyn Operation>,
        param: &str,
        predicate: &Expr,
    ) -> Result<Rc<Self>> {
        Self::with_container(ctx, kind, upstream, param, predicate, false)
    }

    /// Aggregates the per-element selector results.
    pub fn mapped(
        ctx: &Rc<OperationContext>,
        kind: AggregateKind,
        upstream: Rc<dyn Operation>,
        param: &str,
        selector: &Expr,
    ) -> Result<Rc<Self>> {
        Self::with_container(ctx, kind, upstream, param, selector, true)
    }

    fn bare(kind: AggregateKind) -> Rc<Self> {
        Rc::new(Self {
            core: OperationCore::new(),
            kind,
            operands: RefCell::new(None),
            state: RefCell::new(NumericState::default()),
        })
    }

    fn with_container(
        ctx: &Rc<OperationContext>,
        kind: AggregateKind,
        upstream: Rc<dyn Operation>,
        param: &str,
        body: &Expr,
        mapped: bool,
    ) -> Result<Rc<Self>> {
        let node = Self::bare(kind);
        let container = ElementGraphs::attach(ctx, param, body, upstream)?;
        let weak = Rc::downgrade(&node);
        container.events().subscribe(move |event| {
            if let Some(n) = weak.upgrade() {
                n.on_container(event, mapped);
            }
        });
        let operands = if mapped {
            Operands::Mapped(container)
        } else {
            Operands::Filtered(container)
        };
        *node.operands.borrow_mut() = Some(operands);
        node.prime();
        Ok(node)
    }

    fn prime(&self) {
        *self.state.borrow_mut() = NumericState::rebuild(&self.values());
        self.core.set_initial(self.evaluate());
    }

    /// The current operand values, in source order.
    fn values(&self) -> Vec<Value> {
        match &*self.operands.borrow() {
            Some(Operands::Items(binding)) => binding.items(),
            Some(Operands::Filtered(container)) => container
                .pairs()
                .into_iter()
                .filter(|(_, result)| result.is_true())
                .map(|(item, _)| item)
                .collect(),
            Some(Operands::Mapped(container)) => container
                .pairs()
                .into_iter()
                .map(|(_, result)| result)
                .collect(),
            None => Vec::new(),
        }
    }

    fn occurrences(&self, item: &Value) -> usize {
        let container = match &*self.operands.borrow() {
            Some(Operands::Filtered(c)) | Some(Operands::Mapped(c)) => c.clone(),
            _ => return 0,
        };
        container.items().iter().filter(|i| *i == item).count()
    }

    fn on_items(&self, event: &SourceEvent) {
        if self.core.is_disposed() {
            return;
        }
        if self.kind.is_delta() {
            let mut state = self.state.borrow_mut();
            match event {
                SourceEvent::Added { items, .. } => {
                    for item in items {
                        state.add(item);
                    }
                }
                SourceEvent::Removed { items, .. } => {
                    for item in items {
                        state.remove(item);
                    }
                }
                SourceEvent::Reset => {
                    drop(state);
                    let values = self.values();
                    *self.state.borrow_mut() = NumericState::rebuild(&values);
                }
            }
        }
        self.refresh();
    }

    fn on_container(&self, event: &ContainerEvent, mapped: bool) {
        if self.core.is_disposed() {
            return;
        }
        if self.kind.is_delta() {
            match event {
                ContainerEvent::Added { items, results, .. } => {
                    let mut state = self.state.borrow_mut();
                    for (item, result) in items.iter().zip(results) {
                        if mapped {
                            state.add(result);
                        } else if result.is_true() {
                            state.add(item);
                        }
                    }
                }
                ContainerEvent::Removed { items, results, .. } => {
                    let mut state = self.state.borrow_mut();
                    for (item, result) in items.iter().zip(results) {
                        if mapped {
                            state.remove(result);
                        } else if result.is_true() {
                            state.remove(item);
                        }
                    }
                }
                ContainerEvent::ItemResult { item, old, new } => {
                    // The flip applies once per occurrence of the element.
                    let occ = self.occurrences(item);
                    let mut state = self.state.borrow_mut();
                    for _ in 0..occ {
                        if mapped {
                            state.remove(old);
                            state.add(new);
                        } else {
                            if old.is_true() {
                                state.remove(item);
                            }
                            if new.is_true() {
                                state.add(item);
                            }
                        }
                    }
                }
                ContainerEvent::Reset => {
                    let values = self.values();
                    *self.state.borrow_mut() = NumericState::rebuild(&values);
                }
            }
        }
        self.refresh();
    }

    fn eval_sum(&self) -> Result<Value> {
        let state = self.state.borrow();
        if state.non_numeric > 0 {
            return Err(self.first_non_numeric_error());
        }
        if state.floats > 0 {
            Ok(Value::Float(state.sum_f64()))
        } else {
            Ok(Value::Int(state.int_sum))
        }
    }

    fn eval_average(&self) -> Result<Value> {
        let state = self.state.borrow();
        if state.non_numeric > 0 {
            return Err(self.first_non_numeric_error());
        }
        let count = state.numeric_count();
        if count == 0 {
            return Ok(Value::Null);
        }
        Ok(Value::Float(state.sum_f64() / count as f64))
    }

    fn first_non_numeric_error(&self) -> Error {
        let got = self
            .values()
            .iter()
            .find(|v| !v.is_null() && v.as_numeric().is_none())
            .and_then(|v| v.data_type());
        Error::type_mismatch(DataType::Float, got)
    }

    fn eval_extremum(&self, max: bool) -> Result<Value> {
        let best = self
            .values()
            .into_iter()
            .filter(|v| !v.is_null())
            .reduce(|a, b| {
                let keep_b = if max { b > a } else { b < a };
                if keep_b {
                    b
                } else {
                    a
                }
            });
        Ok(best.unwrap_or(Value::Null))
    }
}

impl Operation for AggregateOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn evaluate(&self) -> Result<Value> {
        match self.kind {
            AggregateKind::Count => Ok(Value::Int(self.state.borrow().total)),
            AggregateKind::Sum => self.eval_sum(),
            AggregateKind::Average => self.eval_average(),
            AggregateKind::Min => self.eval_extremum(false),
            AggregateKind::Max => self.eval_extremum(true),
            AggregateKind::Any => Ok(Value::Boolean(!self.values().is_empty())),
            AggregateKind::All => {
                Ok(Value::Boolean(self.values().iter().all(|v| v.is_true())))
            }
            AggregateKind::First { or_default } => match self.values().into_iter().next() {
                Some(v) => Ok(v),
                None if or_default => Ok(Value::Null),
                None => Err(Error::no_elements(self.kind.name())),
            },
            AggregateKind::Single { or_default } => {
                let mut values = self.values().into_iter();
                match (values.next(), values.next()) {
                    (Some(v), None) => Ok(v),
                    (None, _) if or_default => Ok(Value::Null),
                    (None, _) => Err(Error::no_elements(self.kind.name())),
                    (Some(_), Some(_)) => Err(Error::multiple_elements(self.kind.name())),
                }
            }
        }
    }

    fn on_dispose(&self) {
        match self.operands.borrow_mut().take() {
            Some(Operands::Items(binding)) => binding.dispose(),
            Some(Operands::Filtered(container)) | Some(Operands::Mapped(container)) => {
                container.dispose()
            }
            None => {}
        }
    }
}
