//! The Select and SelectMany operators.

use super::{install, refresh_seq, SeqOperator, SeqState};
use crate::container::ElementGraphs;
use crate::context::OperationContext;
use crate::expr::Expr;
use crate::operation::{Operation, OperationCore};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use ripple_core::{Result, SeqHandle, Value};
use ripple_reactive::SubscriptionId;

/// Projects each source element through a per-element sub-graph.
///
/// Output order mirrors source order; duplicates in the source share one
/// sub-graph but still project one output element per occurrence.
pub struct SelectOperation {
    core: OperationCore,
    seq: SeqState,
    container: RefCell<Option<Rc<ElementGraphs>>>,
}

impl SelectOperation {
    pub fn new(
        ctx: &Rc<OperationContext>,
        upstream: Rc<dyn Operation>,
        param: &str,
        selector: &Expr,
    ) -> Result<Rc<Self>> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
            seq: SeqState::new(),
            container: RefCell::new(None),
        });
        let container = ElementGraphs::attach(ctx, param, selector, upstream)?;
        let weak = Rc::downgrade(&node);
        container.events().subscribe(move |_| {
            if let Some(n) = weak.upgrade() {
                refresh_seq(&*n);
            }
        });
        *node.container.borrow_mut() = Some(container);
        node.core.set_initial(Ok(node.seq.value()));
        install(&node);
        Ok(node)
    }
}

impl SeqOperator for SelectOperation {
    fn seq(&self) -> &SeqState {
        &self.seq
    }

    fn compute(&self) -> Vec<Value> {
        match &*self.container.borrow() {
            Some(container) => container
                .pairs()
                .into_iter()
                .map(|(_, result)| result)
                .collect(),
            None => Vec::new(),
        }
    }
}

impl Operation for SelectOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn evaluate(&self) -> Result<Value> {
        Ok(self.seq.value())
    }

    fn on_dispose(&self) {
        if let Some(container) = self.container.borrow_mut().take() {
            container.dispose();
        }
        self.seq.out().changes().clear();
    }
}

/// Projects each element to a sequence and flattens the results in source
/// order.
///
/// The operator watches each distinct projected sequence, so mutations deep
/// inside a nested collection re-flatten the output. Non-sequence projection
/// results (including Null) contribute nothing.
pub struct SelectManyOperation {
    core: OperationCore,
    seq: SeqState,
    container: RefCell<Option<Rc<ElementGraphs>>>,
    nested: RefCell<Vec<(SeqHandle, SubscriptionId)>>,
}

impl SelectManyOperation {
    pub fn new(
        ctx: &Rc<OperationContext>,
        upstream: Rc<dyn Operation>,
        param: &str,
        selector: &Expr,
    ) -> Result<Rc<Self>> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
            seq: SeqState::new(),
            container: RefCell::new(None),
            nested: RefCell::new(Vec::new()),
        });
        let container = ElementGraphs::attach(ctx, param, selector, upstream)?;
        let weak = Rc::downgrade(&node);
        container.events().subscribe(move |_| {
            if let Some(n) = weak.upgrade() {
                n.rewire();
                refresh_seq(&*n);
            }
        });
        *node.container.borrow_mut() = Some(container);
        node.core.set_initial(Ok(node.seq.value()));
        node.rewire();
        install(&node);
        Ok(node)
    }

    /// Re-subscribes to the current set of distinct projected sequences.
    fn rewire(self: &Rc<Self>) {
        for (seq, sub) in self.nested.borrow_mut().drain(..) {
            seq.changes().unsubscribe(sub);
        }
        let container = match &*self.container.borrow() {
            Some(c) => c.clone(),
            None => return,
        };
        let mut wired: Vec<(SeqHandle, SubscriptionId)> = Vec::new();
        for (_, result) in container.pairs() {
            let Some(handle) = result.as_seq().cloned() else {
                continue;
            };
            if wired.iter().any(|(h, _)| h.ptr_eq(&handle)) {
                continue;
            }
            let weak = Rc::downgrade(self);
            let sub = handle.changes().subscribe(move |_| {
                if let Some(n) = weak.upgrade() {
                    refresh_seq(&*n);
                }
            });
            wired.push((handle, sub));
        }
        *self.nested.borrow_mut() = wired;
    }
}

impl SeqOperator for SelectManyOperation {
    fn seq(&self) -> &SeqState {
        &self.seq
    }

    fn compute(&self) -> Vec<Value> {
        let container = match &*self.container.borrow() {
            Some(c) => c.clone(),
            None => return Vec::new(),
        };
        let mut flat = Vec::new();
        for (_, result) in container.pairs() {
            if let Some(handle) = result.as_seq() {
                flat.extend(handle.snapshot());
            }
        }
        flat
    }
}

impl Operation for SelectManyOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn evaluate(&self) -> Result<Value> {
        Ok(self.seq.value())
    }

    fn on_dispose(&self) {
        for (seq, sub) in self.nested.borrow_mut().drain(..) {
            seq.changes().unsubscribe(sub);
        }
        if let Some(container) = self.container.borrow_mut().take() {
            container.dispose();
        }
        self.seq.out().changes().clear();
    }
}
