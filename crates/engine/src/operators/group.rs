//! The GroupBy operator.

use super::{install, refresh_seq, SeqOperator, SeqState};
use crate::container::ElementGraphs;
use crate::context::OperationContext;
use crate::expr::Expr;
use crate::operation::{Operation, OperationCore};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use hashbrown::HashMap;
use ripple_core::{Record, Result, SeqHandle, Value};
use ripple_reactive::{CollectionChange, EventSource, ObservableCollection};

/// The live member sequence of one group.
///
/// A group keeps the same `GroupSeq` object for as long as its key has
/// members, so downstream sub-queries over a group survive membership
/// churn. Contents are replaced wholesale (Reset) when membership changes.
pub struct GroupSeq {
    items: RefCell<Vec<Value>>,
    changes: EventSource<CollectionChange<Value>>,
}

impl GroupSeq {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            items: RefCell::new(Vec::new()),
            changes: EventSource::new(),
        })
    }

    fn set_items(&self, items: Vec<Value>) {
        if *self.items.borrow() == items {
            return;
        }
        *self.items.borrow_mut() = items;
        self.changes.emit(&CollectionChange::Reset);
    }
}

impl ObservableCollection<Value> for GroupSeq {
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

/// Partitions source elements by a per-element key sub-graph.
///
/// Each output element is a record `{key, items}` where `items` is the
/// group's live member sequence. Groups appear in key-first-appearance order
/// and vanish when their last member leaves.
pub struct GroupByOperation {
    core: OperationCore,
    seq: SeqState,
    container: RefCell<Option<Rc<ElementGraphs>>>,
    groups: RefCell<HashMap<Value, Rc<GroupSeq>>>,
}

impl GroupByOperation {
    pub fn new(
        ctx: &Rc<OperationContext>,
        upstream: Rc<dyn Operation>,
        param: &str,
        key: &Expr,
    ) -> Result<Rc<Self>> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
            seq: SeqState::new(),
            container: RefCell::new(None),
            groups: RefCell::new(HashMap::new()),
        });
        let container = ElementGraphs::attach(ctx, param, key, upstream)?;
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

    fn group_record(key: Value, seq: &Rc<GroupSeq>) -> Value {
        Value::Record(Record::new(alloc::vec![
            ("key".into(), key),
            ("items".into(), Value::Sequence(SeqHandle::new(seq.clone()))),
        ]))
    }
}

impl SeqOperator for GroupByOperation {
    fn seq(&self) -> &SeqState {
        &self.seq
    }

    fn compute(&self) -> Vec<Value> {
        let container = match &*self.container.borrow() {
            Some(c) => c.clone(),
            None => return Vec::new(),
        };
        let mut buckets: Vec<(Value, Vec<Value>)> = Vec::new();
        for (item, key) in container.pairs() {
            match buckets.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(item),
                None => buckets.push((key, alloc::vec![item])),
            }
        }

        let mut pending: Vec<(Rc<GroupSeq>, Vec<Value>)> = Vec::new();
        let mut records = Vec::with_capacity(buckets.len());
        {
            let mut groups = self.groups.borrow_mut();
            let live: Vec<Value> = buckets.iter().map(|(k, _)| k.clone()).collect();
            groups.retain(|k, _| live.contains(k));
            for (key, members) in buckets {
                let seq = groups.entry(key.clone()).or_insert_with(GroupSeq::new).clone();
                records.push(Self::group_record(key, &seq));
                pending.push((seq, members));
            }
        }
        // Group resets fire outside the map borrow; handlers may re-read us.
        for (seq, members) in pending {
            seq.set_items(members);
        }
        records
    }
}

impl Operation for GroupByOperation {
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
        self.groups.borrow_mut().clear();
        self.seq.out().changes().clear();
    }
}
