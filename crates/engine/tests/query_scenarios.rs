//! End-to-end query scenarios.
//!
//! Each test compiles an expression into a live graph through the view
//! layer, mutates the underlying sources, and checks that the observed
//! result stays equal to what a fresh evaluation over the final state
//! would produce.

use std::cell::RefCell;
use std::rc::Rc;

use ripple_core::{Record, SeqHandle, Value};
use ripple_engine::{
    watch_collection, watch_scalar, Expr, OperationContext, SourceOperation, NULL_SAFE,
};
use ripple_reactive::{CollectionChange, ObservableCollection, ObservableVec};

fn ints(vals: &[i64]) -> Vec<Value> {
    vals.iter().map(|v| Value::Int(*v)).collect()
}

fn strs(vals: &[&str]) -> Vec<Value> {
    vals.iter().map(|v| Value::from(*v)).collect()
}

fn person(name: &str, age: i64) -> Value {
    Value::from(Record::new(vec![
        ("name".to_string(), Value::from(name)),
        ("age".to_string(), Value::Int(age)),
    ]))
}

/// Binds one observable source under the name `s`.
fn ctx_with_source(items: Vec<Value>) -> (Rc<ObservableVec<Value>>, Rc<OperationContext>) {
    let vec = Rc::new(ObservableVec::from_items(items));
    let node = SourceOperation::new(vec.clone());
    let ctx = OperationContext::with_variable(&OperationContext::root(), "s", node);
    (vec, ctx)
}

/// Binds two observable sources under the names `a` and `b`.
fn ctx_with_two_sources(
    first: Vec<Value>,
    second: Vec<Value>,
) -> (
    Rc<ObservableVec<Value>>,
    Rc<ObservableVec<Value>>,
    Rc<OperationContext>,
) {
    let a = Rc::new(ObservableVec::from_items(first));
    let b = Rc::new(ObservableVec::from_items(second));
    let node_a: Rc<dyn ripple_engine::Operation> = SourceOperation::new(a.clone());
    let node_b: Rc<dyn ripple_engine::Operation> = SourceOperation::new(b.clone());
    let ctx = OperationContext::with_variables(
        &OperationContext::root(),
        vec![("a".to_string(), node_a), ("b".to_string(), node_b)],
    );
    (a, b, ctx)
}

fn collect_changes(
    view: &Rc<ripple_engine::CollectionView>,
) -> Rc<RefCell<Vec<CollectionChange<Value>>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    view.changes()
        .subscribe(move |c| sink.borrow_mut().push(c.clone()));
    seen
}

#[test]
fn test_where_select_pipeline_tracks_mutations() {
    let (vec, ctx) = ctx_with_source(vec![
        person("ada", 36),
        person("bob", 17),
        person("cyd", 52),
    ]);
    let expr = Expr::var("s")
        .where_("p", Expr::var("p").member("age").ge(Expr::constant(18)))
        .select("p", Expr::var("p").member("name"));
    let view = watch_collection(&expr, &ctx).unwrap();
    assert_eq!(view.snapshot(), strs(&["ada", "cyd"]));

    vec.push(person("dee", 29));
    assert_eq!(view.snapshot(), strs(&["ada", "cyd", "dee"]));

    // Growing up moves bob into the filtered window at his source position.
    vec.replace_at(1, person("bob", 18));
    assert_eq!(view.snapshot(), strs(&["ada", "bob", "cyd", "dee"]));

    vec.remove_at(0);
    assert_eq!(view.snapshot(), strs(&["bob", "cyd", "dee"]));
}

#[test]
fn test_concat_keeps_segment_order_under_inserts() {
    let (a, b, ctx) = ctx_with_two_sources(strs(&["a", "b"]), strs(&["x", "y"]));
    let view = watch_collection(&Expr::var("a").concat(Expr::var("b")), &ctx).unwrap();
    let seen = collect_changes(&view);
    assert_eq!(view.snapshot(), strs(&["a", "b", "x", "y"]));

    // A middle insert into the first segment lands before the whole second
    // segment.
    a.insert(1, Value::from("m"));
    assert_eq!(view.snapshot(), strs(&["a", "m", "b", "x", "y"]));
    assert_eq!(
        seen.borrow().last().unwrap(),
        &CollectionChange::add(strs(&["m"]), Some(1))
    );

    // Inserts into the second segment are offset by the first's length.
    b.insert(0, Value::from("w"));
    assert_eq!(view.snapshot(), strs(&["a", "m", "b", "w", "x", "y"]));
    assert_eq!(
        seen.borrow().last().unwrap(),
        &CollectionChange::add(strs(&["w"]), Some(3))
    );
}

#[test]
fn test_intersect_follows_both_sides() {
    let (a, b, ctx) = ctx_with_two_sources(ints(&[1, 2, 3, 2]), ints(&[2, 4]));
    let view = watch_collection(&Expr::var("a").intersect(Expr::var("b")), &ctx).unwrap();
    assert_eq!(view.snapshot(), ints(&[2]));

    b.push(Value::Int(3));
    assert_eq!(view.snapshot(), ints(&[2, 3]));

    a.remove_item(&Value::Int(3));
    assert_eq!(view.snapshot(), ints(&[2]));

    // Removing the last witness on the second side empties the overlap.
    b.remove_at(0);
    b.remove_at(1);
    assert_eq!(view.snapshot(), ints(&[]));
}

#[test]
fn test_distinct_collapses_duplicates_live() {
    let (vec, ctx) = ctx_with_source(strs(&["a", "b", "a", "c"]));
    let view = watch_collection(&Expr::var("s").distinct(), &ctx).unwrap();
    assert_eq!(view.snapshot(), strs(&["a", "b", "c"]));

    // Removing one of two occurrences keeps the element present, but its
    // slot moves to the surviving occurrence's position in the live source.
    vec.remove_at(0);
    assert_eq!(view.snapshot(), strs(&["b", "a", "c"]));

    vec.remove_item(&Value::from("a"));
    assert_eq!(view.snapshot(), strs(&["b", "c"]));
}

#[test]
fn test_order_by_stays_sorted_under_churn() {
    let (vec, ctx) = ctx_with_source(vec![
        person("cyd", 52),
        person("ada", 36),
        person("bob", 17),
    ]);
    let expr = Expr::var("s")
        .order_by("p", Expr::var("p").member("age"))
        .select("p", Expr::var("p").member("name"));
    let view = watch_collection(&expr, &ctx).unwrap();
    assert_eq!(view.snapshot(), strs(&["bob", "ada", "cyd"]));

    vec.push(person("dee", 29));
    assert_eq!(view.snapshot(), strs(&["bob", "dee", "ada", "cyd"]));

    vec.replace_at(0, person("cyd", 1));
    assert_eq!(view.snapshot(), strs(&["cyd", "bob", "dee", "ada"]));

    vec.remove_at(2);
    assert_eq!(view.snapshot(), strs(&["cyd", "dee", "ada"]));
}

#[test]
fn test_order_by_descending_reverses_keys() {
    let (vec, ctx) = ctx_with_source(ints(&[3, 1, 2]));
    let view = watch_collection(
        &Expr::var("s").order_by_descending("x", Expr::var("x")),
        &ctx,
    )
    .unwrap();
    assert_eq!(view.snapshot(), ints(&[3, 2, 1]));

    vec.push(Value::Int(5));
    assert_eq!(view.snapshot(), ints(&[5, 3, 2, 1]));
}

#[test]
fn test_group_by_identity_survives_membership_change() {
    let (vec, ctx) = ctx_with_source(vec![
        person("ada", 36),
        person("bob", 36),
        person("cyd", 52),
    ]);
    let expr = Expr::var("s").group_by("p", Expr::var("p").member("age"));
    let view = watch_collection(&expr, &ctx).unwrap();
    let seen = collect_changes(&view);

    let groups = view.snapshot();
    assert_eq!(groups.len(), 2);
    let first = groups[0].as_record().unwrap();
    assert_eq!(first.get("key"), Some(&Value::Int(36)));
    let members = first.get("items").unwrap().as_seq().unwrap();
    assert_eq!(
        members.snapshot(),
        vec![person("ada", 36), person("bob", 36)]
    );

    // A new member of an existing group changes no group record, so the
    // group list emits nothing; the member sequence resets instead.
    let member_resets = Rc::new(RefCell::new(0usize));
    let counter = member_resets.clone();
    members
        .changes()
        .subscribe(move |_| *counter.borrow_mut() += 1);
    vec.push(person("dee", 36));
    assert!(seen.borrow().is_empty());
    assert_eq!(*member_resets.borrow(), 1);
    assert_eq!(members.len(), 3);

    // Removing the sole 52-year-old drops that group.
    vec.remove_at(2);
    let groups = view.snapshot();
    assert_eq!(groups.len(), 1);
    assert_eq!(
        groups[0].as_record().unwrap().get("key"),
        Some(&Value::Int(36))
    );
}

#[test]
fn test_select_many_flattens_live_inner_sources() {
    let inner_a = Rc::new(ObservableVec::from_items(ints(&[1, 2])));
    let inner_b = Rc::new(ObservableVec::from_items(ints(&[3])));
    let (_vec, ctx) = ctx_with_source(vec![
        Value::from(SeqHandle::new(inner_a.clone())),
        Value::from(SeqHandle::new(inner_b.clone())),
    ]);
    let view =
        watch_collection(&Expr::var("s").select_many("x", Expr::var("x")), &ctx).unwrap();
    assert_eq!(view.snapshot(), ints(&[1, 2, 3]));

    // Mutating an inner collection cascades through the flattening.
    inner_b.push(Value::Int(4));
    assert_eq!(view.snapshot(), ints(&[1, 2, 3, 4]));

    inner_a.remove_at(0);
    assert_eq!(view.snapshot(), ints(&[2, 3, 4]));
}

#[test]
fn test_take_skip_paging_window() {
    let (vec, ctx) = ctx_with_source(ints(&[1, 2, 3, 4, 5]));
    let expr = Expr::var("s")
        .skip(Expr::constant(1))
        .take(Expr::constant(2));
    let view = watch_collection(&expr, &ctx).unwrap();
    assert_eq!(view.snapshot(), ints(&[2, 3]));

    vec.insert(0, Value::Int(0));
    assert_eq!(view.snapshot(), ints(&[1, 2]));

    vec.clear();
    assert_eq!(view.snapshot(), ints(&[]));
}

#[test]
fn test_cast_then_sum() {
    let (vec, ctx) = ctx_with_source(strs(&["10", "20"]));
    let view = watch_scalar(&Expr::var("s").cast("int").sum(), &ctx).unwrap();
    assert_eq!(view.current(), Ok(Value::Int(30)));

    vec.push(Value::from("12"));
    assert_eq!(view.current(), Ok(Value::Int(42)));

    // An unconvertible element reads as Null and drops out of the sum.
    vec.push(Value::from("nope"));
    assert_eq!(view.current(), Ok(Value::Int(42)));
}

#[test]
fn test_aggregates_over_mutation_sequence() {
    let (vec, ctx) = ctx_with_source(ints(&[4, 6]));
    let count = watch_scalar(&Expr::var("s").count(), &ctx).unwrap();
    let sum = watch_scalar(&Expr::var("s").sum(), &ctx).unwrap();
    let avg = watch_scalar(&Expr::var("s").average(), &ctx).unwrap();

    assert_eq!(count.current(), Ok(Value::Int(2)));
    assert_eq!(sum.current(), Ok(Value::Int(10)));
    assert_eq!(avg.current(), Ok(Value::Float(5.0)));

    vec.push(Value::Int(2));
    vec.remove_at(0);
    vec.replace_at(0, Value::Int(10));
    assert_eq!(count.current(), Ok(Value::Int(2)));
    assert_eq!(sum.current(), Ok(Value::Int(12)));
    assert_eq!(avg.current(), Ok(Value::Float(6.0)));

    vec.clear();
    assert_eq!(count.current(), Ok(Value::Int(0)));
    assert_eq!(sum.current(), Ok(Value::Int(0)));
    assert_eq!(avg.current(), Ok(Value::Null));
}

#[test]
fn test_all_is_vacuously_true_on_cleared_source() {
    let (vec, ctx) = ctx_with_source(ints(&[2, 3]));
    let view = watch_scalar(
        &Expr::var("s").all_where("x", Expr::var("x").gt(Expr::constant(0))),
        &ctx,
    )
    .unwrap();
    assert_eq!(view.current(), Ok(Value::Boolean(true)));

    vec.push(Value::Int(-1));
    assert_eq!(view.current(), Ok(Value::Boolean(false)));

    vec.clear();
    assert_eq!(view.current(), Ok(Value::Boolean(true)));
}

#[test]
fn test_single_where_recovers_from_cardinality_error() {
    let (vec, ctx) = ctx_with_source(ints(&[1, 8, 9]));
    let view = watch_scalar(
        &Expr::var("s").single_where("x", Expr::var("x").gt(Expr::constant(5))),
        &ctx,
    )
    .unwrap();
    assert!(view.current().is_err());

    vec.remove_at(1);
    assert_eq!(view.current(), Ok(Value::Int(9)));

    vec.clear();
    assert!(view.current().is_err());
}

#[test]
fn test_default_if_empty_inside_pipeline() {
    let (vec, ctx) = ctx_with_source(ints(&[7]));
    let expr = Expr::var("s")
        .where_("x", Expr::var("x").gt(Expr::constant(100)))
        .default_if_empty(Some(Expr::constant(0)))
        .first();
    let view = watch_scalar(&expr, &ctx).unwrap();
    assert_eq!(view.current(), Ok(Value::Int(0)));

    vec.push(Value::Int(200));
    assert_eq!(view.current(), Ok(Value::Int(200)));
}

#[test]
fn test_null_safe_member_access_in_select() {
    let (vec, ctx) = ctx_with_source(vec![person("ada", 36), Value::Null]);
    let safe = OperationContext::with_option(&ctx, NULL_SAFE, true);
    let expr = Expr::var("s").select("p", Expr::var("p").member("age"));
    let view = watch_collection(&expr, &safe).unwrap();
    assert_eq!(view.snapshot(), vec![Value::Int(36), Value::Null]);

    vec.push(person("bob", 17));
    assert_eq!(
        view.snapshot(),
        vec![Value::Int(36), Value::Null, Value::Int(17)]
    );
}

#[test]
fn test_dispose_detaches_whole_pipeline() {
    let (vec, ctx) = ctx_with_source(ints(&[1, 2, 3]));
    let expr = Expr::var("s")
        .where_("x", Expr::var("x").gt(Expr::constant(1)))
        .select("x", Expr::var("x").mul(Expr::constant(10)));
    let view = watch_collection(&expr, &ctx).unwrap();
    let seen = collect_changes(&view);
    assert_eq!(view.snapshot(), ints(&[20, 30]));

    view.dispose();

    // The frozen buffer keeps its last contents and nothing fires.
    vec.push(Value::Int(9));
    vec.clear();
    assert_eq!(view.snapshot(), ints(&[20, 30]));
    assert!(seen.borrow().is_empty());
}

#[test]
fn test_scalar_over_shared_source_stays_consistent_with_collection() {
    let (vec, ctx) = ctx_with_source(ints(&[5, 15, 25]));
    let filtered = Expr::var("s").where_("x", Expr::var("x").gt(Expr::constant(10)));
    let view = watch_collection(&filtered.clone(), &ctx).unwrap();
    let total = watch_scalar(&filtered.sum(), &ctx).unwrap();

    assert_eq!(view.snapshot(), ints(&[15, 25]));
    assert_eq!(total.current(), Ok(Value::Int(40)));

    vec.replace_at(0, Value::Int(50));
    assert_eq!(view.snapshot(), ints(&[50, 15, 25]));
    assert_eq!(total.current(), Ok(Value::Int(90)));
}
