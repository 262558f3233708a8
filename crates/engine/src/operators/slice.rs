//! The Take, Skip, Cast and DefaultIfEmpty operators.

use super::{install, refresh_seq, SeqOperator, SeqState};
use crate::operation::{Operation, OperationCore};
use crate::source::{SourceBinding, SourceEvent};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use ripple_core::{DataType, Result, Value};

fn bind_refresh<T>(node: &Rc<T>, upstream: Rc<dyn Operation>) -> Rc<SourceBinding>
where
    T: SeqOperator + 'static,
{
    let weak = Rc::downgrade(node);
    SourceBinding::bind(
        upstream,
        Rc::new(move |_: &SourceEvent| {
            if let Some(n) = weak.upgrade() {
                refresh_seq(&*n);
            }
        }),
    )
}

/// Subscribes a scalar operand so its changes recompute the operator, and
/// records the link for teardown.
fn watch_operand<T>(node: &Rc<T>, operand: &Rc<dyn Operation>)
where
    T: SeqOperator + 'static,
{
    let weak = Rc::downgrade(node);
    let sub = operand.changed().subscribe(move |_| {
        if let Some(n) = weak.upgrade() {
            refresh_seq(&*n);
        }
    });
    node.core().attach(operand.clone(), sub, true);
}

fn operand_count(operand: &Rc<dyn Operation>) -> usize {
    operand
        .value()
        .ok()
        .and_then(|v| v.as_i64())
        .unwrap_or(0)
        .max(0) as usize
}

/// Yields the first `count` source elements. A Null or non-integer count
/// reads as zero.
pub struct TakeOperation {
    core: OperationCore,
    seq: SeqState,
    binding: RefCell<Option<Rc<SourceBinding>>>,
    count: Rc<dyn Operation>,
}

impl TakeOperation {
    pub fn new(upstream: Rc<dyn Operation>, count: Rc<dyn Operation>) -> Rc<Self> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
            seq: SeqState::new(),
            binding: RefCell::new(None),
            count: count.clone(),
        });
        *node.binding.borrow_mut() = Some(bind_refresh(&node, upstream));
        watch_operand(&node, &count);
        node.core.set_initial(Ok(node.seq.value()));
        install(&node);
        node
    }
}

impl SeqOperator for TakeOperation {
    fn seq(&self) -> &SeqState {
        &self.seq
    }

    fn compute(&self) -> Vec<Value> {
        let n = operand_count(&self.count);
        let mut items = match &*self.binding.borrow() {
            Some(b) => b.items(),
            None => Vec::new(),
        };
        items.truncate(n);
        items
    }
}

impl Operation for TakeOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn evaluate(&self) -> Result<Value> {
        Ok(self.seq.value())
    }

    fn on_dispose(&self) {
        if let Some(binding) = self.binding.borrow_mut().take() {
            binding.dispose();
        }
        self.seq.out().changes().clear();
    }
}

/// Skips the first `count` source elements.
pub struct SkipOperation {
    core: OperationCore,
    seq: SeqState,
    binding: RefCell<Option<Rc<SourceBinding>>>,
    count: Rc<dyn Operation>,
}

impl SkipOperation {
    pub fn new(upstream: Rc<dyn Operation>, count: Rc<dyn Operation>) -> Rc<Self> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
            seq: SeqState::new(),
            binding: RefCell::new(None),
            count: count.clone(),
        });
        *node.binding.borrow_mut() = Some(bind_refresh(&node, upstream));
        watch_operand(&node, &count);
        node.core.set_initial(Ok(node.seq.value()));
        install(&node);
        node
    }
}

impl SeqOperator for SkipOperation {
    fn seq(&self) -> &SeqState {
        &self.seq
    }

    fn compute(&self) -> Vec<Value> {
        let n = operand_count(&self.count);
        let items = match &*self.binding.borrow() {
            Some(b) => b.items(),
            None => Vec::new(),
        };
        items.into_iter().skip(n).collect()
    }
}

impl Operation for SkipOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn evaluate(&self) -> Result<Value> {
        Ok(self.seq.value())
    }

    fn on_dispose(&self) {
        if let Some(binding) = self.binding.borrow_mut().take() {
            binding.dispose();
        }
        self.seq.out().changes().clear();
    }
}

/// Converts every element to a target type; unconvertible elements read as
/// Null.
pub struct CastOperation {
    core: OperationCore,
    seq: SeqState,
    binding: RefCell<Option<Rc<SourceBinding>>>,
    target: DataType,
}

impl CastOperation {
    pub fn new(upstream: Rc<dyn Operation>, target: DataType) -> Rc<Self> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
            seq: SeqState::new(),
            binding: RefCell::new(None),
            target,
        });
        *node.binding.borrow_mut() = Some(bind_refresh(&node, upstream));
        node.core.set_initial(Ok(node.seq.value()));
        install(&node);
        node
    }
}

impl SeqOperator for CastOperation {
    fn seq(&self) -> &SeqState {
        &self.seq
    }

    fn compute(&self) -> Vec<Value> {
        let items = match &*self.binding.borrow() {
            Some(b) => b.items(),
            None => Vec::new(),
        };
        items
            .into_iter()
            .map(|v| v.convert(self.target).unwrap_or(Value::Null))
            .collect()
    }
}

impl Operation for CastOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn evaluate(&self) -> Result<Value> {
        Ok(self.seq.value())
    }

    fn on_dispose(&self) {
        if let Some(binding) = self.binding.borrow_mut().take() {
            binding.dispose();
        }
        self.seq.out().changes().clear();
    }
}

/// Substitutes a single default element while the source is empty.
pub struct DefaultIfEmptyOperation {
    core: OperationCore,
    seq: SeqState,
    binding: RefCell<Option<Rc<SourceBinding>>>,
    default: Option<Rc<dyn Operation>>,
}

impl DefaultIfEmptyOperation {
    pub fn new(upstream: Rc<dyn Operation>, default: Option<Rc<dyn Operation>>) -> Rc<Self> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
            seq: SeqState::new(),
            binding: RefCell::new(None),
            default: default.clone(),
        });
        *node.binding.borrow_mut() = Some(bind_refresh(&node, upstream));
        if let Some(default) = default {
            watch_operand(&node, &default);
        }
        node.core.set_initial(Ok(node.seq.value()));
        install(&node);
        node
    }
}

impl SeqOperator for DefaultIfEmptyOperation {
    fn seq(&self) -> &SeqState {
        &self.seq
    }

    fn compute(&self) -> Vec<Value> {
        let items = match &*self.binding.borrow() {
            Some(b) => b.items(),
            None => Vec::new(),
        };
        if !items.is_empty() {
            return items;
        }
        let default = self
            .default
            .as_ref()
            .and_then(|d| d.value().ok())
            .unwrap_or(Value::Null);
        alloc::vec![default]
    }
}

impl Operation for DefaultIfEmptyOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn evaluate(&self) -> Result<Value> {
        Ok(self.seq.value())
    }

    fn on_dispose(&self) {
        if let Some(binding) = self.binding.borrow_mut().take() {
            binding.dispose();
        }
        self.seq.out().changes().clear();
    }
}
