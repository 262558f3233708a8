//! The OrderBy operator.

use super::{install, refresh_seq, SeqOperator, SeqState};
use crate::container::{ContainerEvent, ElementGraphs};
use crate::context::OperationContext;
use crate::expr::Expr;
use crate::operation::{Operation, OperationCore};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::cmp::Ordering;
use ripple_core::{Result, Value};

/// One element in the maintained sort order: its key, its current source
/// position (the stability tiebreak) and the element itself.
struct SortEntry {
    key: Value,
    pos: usize,
    item: Value,
}

fn insertion_point(sorted: &[SortEntry], key: &Value, pos: usize, descending: bool) -> usize {
    sorted.partition_point(|e| {
        let ord = if descending {
            key.cmp(&e.key)
        } else {
            e.key.cmp(key)
        };
        match ord {
            Ordering::Less => true,
            Ordering::Equal => e.pos < pos,
            Ordering::Greater => false,
        }
    })
}

/// Sorts source elements by a per-element key sub-graph.
///
/// The sorted order is a maintained structure, not a recomputation: an added
/// element binary-searches into place, a removal drops its entry, and a key
/// change re-inserts the affected entries. Only a source Reset re-sorts from
/// scratch. Keys are compared with the total value ordering; equal keys keep
/// source order, tracked per entry as its current source position.
pub struct OrderByOperation {
    core: OperationCore,
    seq: SeqState,
    container: RefCell<Option<Rc<ElementGraphs>>>,
    sorted: RefCell<Vec<SortEntry>>,
    descending: bool,
}

impl OrderByOperation {
    pub fn new(
        ctx: &Rc<OperationContext>,
        upstream: Rc<dyn Operation>,
        param: &str,
        key: &Expr,
        descending: bool,
    ) -> Result<Rc<Self>> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
            seq: SeqState::new(),
            container: RefCell::new(None),
            sorted: RefCell::new(Vec::new()),
            descending,
        });
        let container = ElementGraphs::attach(ctx, param, key, upstream)?;
        let weak = Rc::downgrade(&node);
        container.events().subscribe(move |event| {
            if let Some(n) = weak.upgrade() {
                n.on_container(event);
                refresh_seq(&*n);
            }
        });
        *node.container.borrow_mut() = Some(container);
        node.rebuild();
        node.core.set_initial(Ok(node.seq.value()));
        install(&node);
        Ok(node)
    }

    fn on_container(&self, event: &ContainerEvent) {
        if self.core.is_disposed() {
            return;
        }
        match event {
            ContainerEvent::Added {
                items,
                results,
                index: Some(i),
            } => self.apply_add(*i, items, results),
            ContainerEvent::Removed {
                items,
                index: Some(i),
                ..
            } => self.apply_remove(*i, items.len()),
            ContainerEvent::ItemResult { item, new, .. } => self.rekey(item, new),
            _ => self.rebuild(),
        }
    }

    fn apply_add(&self, index: usize, items: &[Value], keys: &[Value]) {
        let mut sorted = self.sorted.borrow_mut();
        for e in sorted.iter_mut() {
            if e.pos >= index {
                e.pos += items.len();
            }
        }
        for (offset, (item, key)) in items.iter().zip(keys).enumerate() {
            let pos = index + offset;
            let at = insertion_point(sorted.as_slice(), key, pos, self.descending);
            sorted.insert(
                at,
                SortEntry {
                    key: key.clone(),
                    pos,
                    item: item.clone(),
                },
            );
        }
    }

    fn apply_remove(&self, index: usize, count: usize) {
        let mut sorted = self.sorted.borrow_mut();
        sorted.retain(|e| e.pos < index || e.pos >= index + count);
        for e in sorted.iter_mut() {
            if e.pos >= index + count {
                e.pos -= count;
            }
        }
    }

    /// Re-inserts every occurrence of `item` under its new key. Duplicate
    /// elements share one key graph, so one change covers them all.
    fn rekey(&self, item: &Value, key: &Value) {
        let mut sorted = self.sorted.borrow_mut();
        let mut moved = Vec::new();
        let mut k = 0;
        while k < sorted.len() {
            if sorted[k].item == *item {
                moved.push(sorted.remove(k));
            } else {
                k += 1;
            }
        }
        for mut e in moved {
            e.key = key.clone();
            let at = insertion_point(sorted.as_slice(), &e.key, e.pos, self.descending);
            sorted.insert(at, e);
        }
    }

    fn rebuild(&self) {
        let container = match &*self.container.borrow() {
            Some(c) => c.clone(),
            None => return,
        };
        let mut entries: Vec<SortEntry> = container
            .pairs()
            .into_iter()
            .enumerate()
            .map(|(pos, (item, key))| SortEntry { key, pos, item })
            .collect();
        let descending = self.descending;
        entries.sort_by(|a, b| {
            let ord = if descending {
                b.key.cmp(&a.key)
            } else {
                a.key.cmp(&b.key)
            };
            ord.then(a.pos.cmp(&b.pos))
        });
        *self.sorted.borrow_mut() = entries;
    }
}

impl SeqOperator for OrderByOperation {
    fn seq(&self) -> &SeqState {
        &self.seq
    }

    fn compute(&self) -> Vec<Value> {
        self.sorted.borrow().iter().map(|e| e.item.clone()).collect()
    }
}

impl Operation for OrderByOperation {
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
        self.sorted.borrow_mut().clear();
        self.seq.out().changes().clear();
    }
}
