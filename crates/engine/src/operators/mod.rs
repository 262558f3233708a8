//! Query operator nodes.
//!
//! Collection operators share one shape: a stable Sequence value wrapping an
//! `OutputSeq`, and a `compute` that derives the current result list from the
//! operator's own maintained state. Enumeration always re-derives through
//! `compute`; the only list an operator retains is the previous result, held
//! strictly for change detection. After any upstream event the operator
//! re-derives and publishes the narrowest structural change the old/new
//! lists admit: a single insertion, removal or replacement when the lists
//! differ by exactly one position, Reset otherwise.

mod aggregate;
mod filter;
mod group;
mod map;
mod set_ops;
mod slice;
mod sort;

pub use aggregate::{AggregateKind, AggregateOperation};
pub use filter::WhereOperation;
pub use group::{GroupByOperation, GroupSeq};
pub use map::{SelectManyOperation, SelectOperation};
pub use set_ops::{ConcatOperation, DistinctOperation, IntersectOperation};
pub use slice::{CastOperation, DefaultIfEmptyOperation, SkipOperation, TakeOperation};
pub use sort::OrderByOperation;

use crate::operation::Operation;
use crate::output::OutputSeq;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use ripple_core::{SeqHandle, Value};
use ripple_reactive::CollectionChange;

/// The output-side state every collection operator carries. `cached` is the
/// previously published result, kept only to diff against; it is never
/// served to enumerators.
pub(crate) struct SeqState {
    out: Rc<OutputSeq>,
    handle: SeqHandle,
    cached: RefCell<Vec<Value>>,
}

impl SeqState {
    pub(crate) fn new() -> Self {
        let out = OutputSeq::new();
        let handle = SeqHandle::new(out.clone());
        Self {
            out,
            handle,
            cached: RefCell::new(Vec::new()),
        }
    }

    /// The operator's stable Sequence value.
    pub(crate) fn value(&self) -> Value {
        Value::Sequence(self.handle.clone())
    }

    pub(crate) fn out(&self) -> &OutputSeq {
        &self.out
    }
}

/// A collection operator: stable sequence output plus a result derivation.
pub(crate) trait SeqOperator: Operation {
    fn seq(&self) -> &SeqState;

    /// Derives the current result list from the operator's maintained state.
    fn compute(&self) -> Vec<Value>;
}

/// Installs the lazy enumerator and seeds the diff cache. Call once, at the
/// end of the operator's constructor.
pub(crate) fn install<T: SeqOperator + 'static>(node: &Rc<T>) {
    let weak = Rc::downgrade(node);
    node.seq().out.set_enumerator(move || {
        weak.upgrade().map(|n| n.compute()).unwrap_or_default()
    });
    let initial = node.compute();
    *node.seq().cached.borrow_mut() = initial;
}

/// Re-derives the result and publishes the narrowest delta against the cache.
pub(crate) fn refresh_seq<T: SeqOperator + ?Sized>(node: &T) {
    if node.core().is_disposed() {
        return;
    }
    let new = node.compute();
    let old = core::mem::replace(&mut *node.seq().cached.borrow_mut(), new.clone());
    publish_delta(node.seq().out(), &old, &new);
}

fn diverge(short: &[Value], long: &[Value]) -> usize {
    short
        .iter()
        .zip(long)
        .position(|(a, b)| a != b)
        .unwrap_or(short.len())
}

/// Publishes the narrowest structural change turning `old` into `new`.
pub(crate) fn publish_delta(out: &OutputSeq, old: &[Value], new: &[Value]) {
    if old == new {
        return;
    }
    if new.len() == old.len() + 1 {
        let i = diverge(old, new);
        if old[i..] == new[i + 1..] {
            out.publish(CollectionChange::add(
                alloc::vec![new[i].clone()],
                Some(i),
            ));
            return;
        }
    } else if old.len() == new.len() + 1 {
        let i = diverge(new, old);
        if new[i..] == old[i + 1..] {
            out.publish(CollectionChange::remove(
                alloc::vec![old[i].clone()],
                Some(i),
            ));
            return;
        }
    } else if old.len() == new.len() {
        let mut diffs = old.iter().zip(new).enumerate().filter(|(_, (a, b))| a != b);
        if let Some((i, _)) = diffs.next() {
            if diffs.next().is_none() {
                out.publish(CollectionChange::replace(
                    old[i].clone(),
                    new[i].clone(),
                    Some(i),
                ));
                return;
            }
        }
    }
    out.reset();
}
