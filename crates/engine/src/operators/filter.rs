//! The Where operator.

use super::{install, refresh_seq, SeqOperator, SeqState};
use crate::container::ElementGraphs;
use crate::context::OperationContext;
use crate::expr::Expr;
use crate::operation::{Operation, OperationCore};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use ripple_core::{Result, Value};

/// Filters source elements by a per-element predicate sub-graph.
///
/// Elements whose predicate reads as anything but `true` (including Null and
/// per-element evaluation failures) are excluded. Output preserves source
/// order.
pub struct WhereOperation {
    core: OperationCore,
    seq: SeqState,
    container: RefCell<Option<Rc<ElementGraphs>>>,
}

impl WhereOperation {
    pub fn new(
        ctx: &Rc<OperationContext>,
        upstream: Rc<dyn Operation>,
        param: &str,
        predicate: &Expr,
    ) -> Result<Rc<Self>> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
            seq: SeqState::new(),
            container: RefCell::new(None),
        });
        let container = ElementGraphs::attach(ctx, param, predicate, upstream)?;
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

impl SeqOperator for WhereOperation {
    fn seq(&self) -> &SeqState {
        &self.seq
    }

    fn compute(&self) -> Vec<Value> {
        match &*self.container.borrow() {
            Some(container) => container
                .pairs()
                .into_iter()
                .filter(|(_, result)| result.is_true())
                .map(|(item, _)| item)
                .collect(),
            None => Vec::new(),
        }
    }
}

impl Operation for WhereOperation {
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
