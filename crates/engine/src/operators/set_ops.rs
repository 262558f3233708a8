//! The Concat, Intersect and Distinct operators.
//!
//! The two-source operators keep per-side state maintained from each side's
//! own events: Concat mirrors both segments, Intersect mirrors the first
//! source and keeps an occurrence-counted membership map for the second. An
//! event from one side never enumerates the other.

use super::{install, refresh_seq, SeqOperator, SeqState};
use crate::operation::{Operation, OperationCore};
use crate::source::{SourceBinding, SourceEvent};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use hashbrown::{HashMap, HashSet};
use ripple_core::{Result, Value};

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

fn binding_items(slot: &RefCell<Option<Rc<SourceBinding>>>) -> Vec<Value> {
    match &*slot.borrow() {
        Some(b) => b.items(),
        None => Vec::new(),
    }
}

/// Applies one source event to an ordered mirror of that source. Only a
/// Reset re-enumerates the source itself.
fn apply_ordered(
    mirror: &mut Vec<Value>,
    event: &SourceEvent,
    slot: &RefCell<Option<Rc<SourceBinding>>>,
) {
    match event {
        SourceEvent::Added { items, index } => {
            let at = index.unwrap_or(mirror.len()).min(mirror.len());
            mirror.splice(at..at, items.iter().cloned());
        }
        SourceEvent::Removed { items, index } => match index {
            Some(i) => {
                let start = (*i).min(mirror.len());
                let end = (start + items.len()).min(mirror.len());
                mirror.drain(start..end);
            }
            None => {
                for item in items {
                    if let Some(pos) = mirror.iter().position(|x| x == item) {
                        mirror.remove(pos);
                    }
                }
            }
        },
        SourceEvent::Reset => *mirror = binding_items(slot),
    }
}

/// Applies one source event to an occurrence-count map of that source.
fn apply_counts(
    counts: &mut HashMap<Value, usize>,
    event: &SourceEvent,
    slot: &RefCell<Option<Rc<SourceBinding>>>,
) {
    match event {
        SourceEvent::Added { items, .. } => {
            for item in items {
                *counts.entry(item.clone()).or_insert(0) += 1;
            }
        }
        SourceEvent::Removed { items, .. } => {
            for item in items {
                if let Some(n) = counts.get_mut(item) {
                    *n -= 1;
                    if *n == 0 {
                        counts.remove(item);
                    }
                }
            }
        }
        SourceEvent::Reset => {
            counts.clear();
            for item in binding_items(slot) {
                *counts.entry(item).or_insert(0) += 1;
            }
        }
    }
}

/// Appends the second source's elements after the first's.
pub struct ConcatOperation {
    core: OperationCore,
    seq: SeqState,
    first: RefCell<Option<Rc<SourceBinding>>>,
    second: RefCell<Option<Rc<SourceBinding>>>,
    first_items: RefCell<Vec<Value>>,
    second_items: RefCell<Vec<Value>>,
}

impl ConcatOperation {
    pub fn new(first: Rc<dyn Operation>, second: Rc<dyn Operation>) -> Rc<Self> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
            seq: SeqState::new(),
            first: RefCell::new(None),
            second: RefCell::new(None),
            first_items: RefCell::new(Vec::new()),
            second_items: RefCell::new(Vec::new()),
        });

        let weak = Rc::downgrade(&node);
        let binding = SourceBinding::bind(
            first,
            Rc::new(move |event: &SourceEvent| {
                if let Some(n) = weak.upgrade() {
                    apply_ordered(&mut n.first_items.borrow_mut(), event, &n.first);
                    refresh_seq(&*n);
                }
            }),
        );
        *node.first_items.borrow_mut() = binding.items();
        *node.first.borrow_mut() = Some(binding);

        let weak = Rc::downgrade(&node);
        let binding = SourceBinding::bind(
            second,
            Rc::new(move |event: &SourceEvent| {
                if let Some(n) = weak.upgrade() {
                    apply_ordered(&mut n.second_items.borrow_mut(), event, &n.second);
                    refresh_seq(&*n);
                }
            }),
        );
        *node.second_items.borrow_mut() = binding.items();
        *node.second.borrow_mut() = Some(binding);

        node.core.set_initial(Ok(node.seq.value()));
        install(&node);
        node
    }
}

impl SeqOperator for ConcatOperation {
    fn seq(&self) -> &SeqState {
        &self.seq
    }

    fn compute(&self) -> Vec<Value> {
        let mut items = self.first_items.borrow().clone();
        items.extend(self.second_items.borrow().iter().cloned());
        items
    }
}

impl Operation for ConcatOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn evaluate(&self) -> Result<Value> {
        Ok(self.seq.value())
    }

    fn on_dispose(&self) {
        for slot in [&self.first, &self.second] {
            if let Some(binding) = slot.borrow_mut().take() {
                binding.dispose();
            }
        }
        self.seq.out().changes().clear();
    }
}

/// Yields the distinct elements of the first source that also occur in the
/// second, in the first source's order of first occurrence.
///
/// Membership of the second source lives in an occurrence-count map kept
/// current from that side's events alone; first-side events touch only the
/// first-side mirror.
pub struct IntersectOperation {
    core: OperationCore,
    seq: SeqState,
    first: RefCell<Option<Rc<SourceBinding>>>,
    second: RefCell<Option<Rc<SourceBinding>>>,
    first_items: RefCell<Vec<Value>>,
    second_counts: RefCell<HashMap<Value, usize>>,
}

impl IntersectOperation {
    pub fn new(first: Rc<dyn Operation>, second: Rc<dyn Operation>) -> Rc<Self> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
            seq: SeqState::new(),
            first: RefCell::new(None),
            second: RefCell::new(None),
            first_items: RefCell::new(Vec::new()),
            second_counts: RefCell::new(HashMap::new()),
        });

        let weak = Rc::downgrade(&node);
        let binding = SourceBinding::bind(
            first,
            Rc::new(move |event: &SourceEvent| {
                if let Some(n) = weak.upgrade() {
                    apply_ordered(&mut n.first_items.borrow_mut(), event, &n.first);
                    refresh_seq(&*n);
                }
            }),
        );
        *node.first_items.borrow_mut() = binding.items();
        *node.first.borrow_mut() = Some(binding);

        let weak = Rc::downgrade(&node);
        let binding = SourceBinding::bind(
            second,
            Rc::new(move |event: &SourceEvent| {
                if let Some(n) = weak.upgrade() {
                    apply_counts(&mut n.second_counts.borrow_mut(), event, &n.second);
                    refresh_seq(&*n);
                }
            }),
        );
        {
            let mut counts = node.second_counts.borrow_mut();
            for item in binding.items() {
                *counts.entry(item).or_insert(0) += 1;
            }
        }
        *node.second.borrow_mut() = Some(binding);

        node.core.set_initial(Ok(node.seq.value()));
        install(&node);
        node
    }
}

impl SeqOperator for IntersectOperation {
    fn seq(&self) -> &SeqState {
        &self.seq
    }

    fn compute(&self) -> Vec<Value> {
        let counts = self.second_counts.borrow();
        let mut seen: HashSet<Value> = HashSet::new();
        self.first_items
            .borrow()
            .iter()
            .filter(|item| counts.contains_key(*item) && seen.insert((*item).clone()))
            .cloned()
            .collect()
    }
}

impl Operation for IntersectOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn evaluate(&self) -> Result<Value> {
        Ok(self.seq.value())
    }

    fn on_dispose(&self) {
        for slot in [&self.first, &self.second] {
            if let Some(binding) = slot.borrow_mut().take() {
                binding.dispose();
            }
        }
        self.seq.out().changes().clear();
    }
}

/// Yields each distinct element once, in order of first occurrence.
pub struct DistinctOperation {
    core: OperationCore,
    seq: SeqState,
    binding: RefCell<Option<Rc<SourceBinding>>>,
}

impl DistinctOperation {
    pub fn new(upstream: Rc<dyn Operation>) -> Rc<Self> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
            seq: SeqState::new(),
            binding: RefCell::new(None),
        });
        *node.binding.borrow_mut() = Some(bind_refresh(&node, upstream));
        node.core.set_initial(Ok(node.seq.value()));
        install(&node);
        node
    }
}

impl SeqOperator for DistinctOperation {
    fn seq(&self) -> &SeqState {
        &self.seq
    }

    fn compute(&self) -> Vec<Value> {
        let mut seen: HashSet<Value> = HashSet::new();
        binding_items(&self.binding)
            .into_iter()
            .filter(|item| seen.insert(item.clone()))
            .collect()
    }
}

impl Operation for DistinctOperation {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{ItemOperation, SourceOperation};
    use alloc::string::String;
    use alloc::vec;
    use core::cell::Cell;
    use ripple_core::SeqHandle;
    use ripple_reactive::{
        CollectionChange, EventSource, ObservableCollection, ObservableVec,
    };

    fn strs(s: &str) -> Vec<Value> {
        s.chars().map(|c| Value::String(String::from(c))).collect()
    }

    fn source_node(items: Vec<Value>) -> (Rc<ObservableVec<Value>>, Rc<dyn Operation>) {
        let vec = Rc::new(ObservableVec::from_items(items));
        let node = SourceOperation::new(vec.clone());
        (vec, node)
    }

    fn snapshot(node: &Rc<impl Operation>) -> Vec<Value> {
        node.value().unwrap().as_seq().unwrap().snapshot()
    }

    /// Wraps a collection and counts how often it gets enumerated.
    struct CountingSeq {
        inner: ObservableVec<Value>,
        snapshots: Cell<usize>,
    }

    impl ObservableCollection<Value> for CountingSeq {
        fn snapshot(&self) -> Vec<Value> {
            self.snapshots.set(self.snapshots.get() + 1);
            self.inner.snapshot()
        }

        fn len(&self) -> usize {
            self.inner.len()
        }

        fn changes(&self) -> &EventSource<CollectionChange<Value>> {
            self.inner.changes()
        }
    }

    #[test]
    fn test_concat_preserves_order() {
        let (a, a_node) = source_node(strs("ab"));
        let (_b, b_node) = source_node(strs("c"));
        let node = ConcatOperation::new(a_node, b_node);
        assert_eq!(snapshot(&node), strs("abc"));

        // An insert into the first source lands before the second's items.
        a.push(Value::from("x"));
        assert_eq!(snapshot(&node), strs("abxc"));
    }

    #[test]
    fn test_concat_second_source_add() {
        let (_a, a_node) = source_node(strs("ab"));
        let (b, b_node) = source_node(strs("c"));
        let node = ConcatOperation::new(a_node, b_node);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        node.value()
            .unwrap()
            .as_seq()
            .unwrap()
            .changes()
            .subscribe(move |c| seen_clone.borrow_mut().push(c.clone()));

        b.push(Value::from("d"));
        assert_eq!(
            *seen.borrow(),
            vec![CollectionChange::add(strs("d"), Some(3))]
        );
    }

    #[test]
    fn test_intersect_both_directions() {
        let (a, a_node) = source_node(strs("abc"));
        let (b, b_node) = source_node(strs("bcd"));
        let node = IntersectOperation::new(a_node, b_node);
        assert_eq!(snapshot(&node), strs("bc"));

        // Growing the second source admits more of the first.
        b.push(Value::from("a"));
        assert_eq!(snapshot(&node), strs("abc"));

        // Shrinking the first source drops output members.
        a.remove_item(&Value::from("b"));
        assert_eq!(snapshot(&node), strs("ac"));
    }

    #[test]
    fn test_intersect_is_distinct() {
        let (_a, a_node) = source_node(strs("aab"));
        let (_b, b_node) = source_node(strs("ab"));
        let node = IntersectOperation::new(a_node, b_node);
        assert_eq!(snapshot(&node), strs("ab"));
    }

    #[test]
    fn test_intersect_duplicate_witnesses_count() {
        let (_a, a_node) = source_node(strs("ab"));
        let (b, b_node) = source_node(strs("aa"));
        let node = IntersectOperation::new(a_node, b_node);
        assert_eq!(snapshot(&node), strs("a"));

        // One witness left: still a member.
        b.remove_at(0);
        assert_eq!(snapshot(&node), strs("a"));

        b.remove_at(0);
        assert_eq!(snapshot(&node), strs(""));
    }

    #[test]
    fn test_intersect_add_does_not_enumerate_other_side() {
        let (a, a_node) = source_node(strs("ab"));
        let counting = Rc::new(CountingSeq {
            inner: ObservableVec::from_items(strs("bc")),
            snapshots: Cell::new(0),
        });
        let b_node: Rc<dyn Operation> =
            ItemOperation::new(Value::Sequence(SeqHandle::new(counting.clone())));
        let node = IntersectOperation::new(a_node, b_node);
        assert_eq!(snapshot(&node), strs("b"));

        let settled = counting.snapshots.get();
        a.push(Value::from("c"));
        assert_eq!(snapshot(&node), strs("bc"));
        assert_eq!(counting.snapshots.get(), settled);
    }

    #[test]
    fn test_distinct_first_occurrence_order() {
        let (vec, upstream) = source_node(strs("abab"));
        let node = DistinctOperation::new(upstream);
        assert_eq!(snapshot(&node), strs("ab"));

        // Removing one duplicate changes nothing downstream.
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        node.value()
            .unwrap()
            .as_seq()
            .unwrap()
            .changes()
            .subscribe(move |c| seen_clone.borrow_mut().push(c.clone()));

        vec.remove_at(2); // second "a"
        assert!(seen.borrow().is_empty());
        assert_eq!(snapshot(&node), strs("ab"));

        // Removing the last occurrence drops it from the output.
        vec.remove_at(0);
        assert_eq!(snapshot(&node), strs("b"));
    }
}
