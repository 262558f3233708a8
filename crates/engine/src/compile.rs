//! Expression-to-operation dispatch.
//!
//! `compile` maps every expression shape onto its operation node in one
//! exhaustive match. Structural problems (unknown variables, misshapen
//! operator arguments, a lambda outside an operator call) fail here, at
//! construction; value-level problems latch inside the nodes at evaluation.

use crate::context::OperationContext;
use crate::expr::{Expr, QueryMethod};
use crate::operation::{ConstantOperation, Operation, VariableOperation};
use crate::operators::{
    AggregateKind, AggregateOperation, CastOperation, ConcatOperation,
    DefaultIfEmptyOperation, DistinctOperation, GroupByOperation, IntersectOperation,
    OrderByOperation, SelectManyOperation, SelectOperation, SkipOperation, TakeOperation,
    WhereOperation,
};
use crate::scalar::{
    BinaryOperation, ConditionalOperation, IndexOperation, MemberOperation, RecordOperation,
    UnaryOperation,
};
use alloc::format;
use alloc::rc::Rc;
use alloc::vec::Vec;
use ripple_core::{DataType, Error, Result, Value};

/// Compiles an expression into a live operation graph under `ctx`.
pub fn compile(expr: &Expr, ctx: &Rc<OperationContext>) -> Result<Rc<dyn Operation>> {
    let node: Rc<dyn Operation> = match expr {
        Expr::Constant(value) => ConstantOperation::new(value.clone()),
        Expr::Variable(name) => VariableOperation::new(ctx.variable(name)?),
        Expr::Member { target, name } => {
            MemberOperation::new(ctx, compile(target, ctx)?, name)
        }
        Expr::Index { target, index } => {
            IndexOperation::new(ctx, compile(target, ctx)?, compile(index, ctx)?)
        }
        Expr::Binary { op, left, right } => {
            BinaryOperation::new(*op, compile(left, ctx)?, compile(right, ctx)?)
        }
        Expr::Unary { op, expr } => UnaryOperation::new(*op, compile(expr, ctx)?),
        Expr::Conditional {
            cond,
            then,
            otherwise,
        } => ConditionalOperation::new(
            compile(cond, ctx)?,
            compile(then, ctx)?,
            compile(otherwise, ctx)?,
        ),
        Expr::Record { fields } => {
            let mut compiled = Vec::with_capacity(fields.len());
            for (name, field) in fields {
                compiled.push((name.clone(), compile(field, ctx)?));
            }
            RecordOperation::new(compiled)
        }
        Expr::Lambda { .. } => {
            return Err(Error::unsupported(
                "lambda is only valid as a query operator argument",
            ));
        }
        Expr::Call {
            method,
            source,
            args,
        } => return compile_call(*method, source, args, ctx),
    };
    Ok(node)
}

/// The lambda argument of an operator call, if present.
fn lambda_arg<'a>(
    method: QueryMethod,
    args: &'a [Expr],
) -> Result<Option<(&'a str, &'a Expr)>> {
    match args {
        [] => Ok(None),
        [Expr::Lambda { param, body }] => Ok(Some((param, body))),
        _ => Err(Error::unsupported(format!(
            "{} takes at most one lambda argument",
            method.name()
        ))),
    }
}

/// The required lambda argument of an operator call.
fn require_lambda<'a>(method: QueryMethod, args: &'a [Expr]) -> Result<(&'a str, &'a Expr)> {
    lambda_arg(method, args)?.ok_or_else(|| {
        Error::unsupported(format!("{} requires a lambda argument", method.name()))
    })
}

/// The single non-lambda operand of an operator call.
fn single_operand<'a>(method: QueryMethod, args: &'a [Expr]) -> Result<&'a Expr> {
    match args {
        [arg] if !matches!(arg, Expr::Lambda { .. }) => Ok(arg),
        _ => Err(Error::unsupported(format!(
            "{} takes exactly one operand",
            method.name()
        ))),
    }
}

fn no_args(method: QueryMethod, args: &[Expr]) -> Result<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(Error::unsupported(format!(
            "{} takes no arguments",
            method.name()
        )))
    }
}

fn compile_call(
    method: QueryMethod,
    source: &Expr,
    args: &[Expr],
    ctx: &Rc<OperationContext>,
) -> Result<Rc<dyn Operation>> {
    let upstream = compile(source, ctx)?;
    let node: Rc<dyn Operation> = match method {
        QueryMethod::Where => {
            let (param, body) = require_lambda(method, args)?;
            WhereOperation::new(ctx, upstream, param, body)?
        }
        QueryMethod::Select => {
            let (param, body) = require_lambda(method, args)?;
            SelectOperation::new(ctx, upstream, param, body)?
        }
        QueryMethod::SelectMany => {
            let (param, body) = require_lambda(method, args)?;
            SelectManyOperation::new(ctx, upstream, param, body)?
        }
        QueryMethod::OrderBy => {
            let (param, body) = require_lambda(method, args)?;
            OrderByOperation::new(ctx, upstream, param, body, false)?
        }
        QueryMethod::OrderByDescending => {
            let (param, body) = require_lambda(method, args)?;
            OrderByOperation::new(ctx, upstream, param, body, true)?
        }
        QueryMethod::GroupBy => {
            let (param, body) = require_lambda(method, args)?;
            GroupByOperation::new(ctx, upstream, param, body)?
        }
        QueryMethod::Concat => {
            let other = compile(single_operand(method, args)?, ctx)?;
            ConcatOperation::new(upstream, other)
        }
        QueryMethod::Intersect => {
            let other = compile(single_operand(method, args)?, ctx)?;
            IntersectOperation::new(upstream, other)
        }
        QueryMethod::Distinct => {
            no_args(method, args)?;
            DistinctOperation::new(upstream)
        }
        QueryMethod::Cast => {
            let target = cast_target(args)?;
            CastOperation::new(upstream, target)
        }
        QueryMethod::DefaultIfEmpty => {
            let default = match args {
                [] => None,
                [arg] if !matches!(arg, Expr::Lambda { .. }) => Some(compile(arg, ctx)?),
                _ => {
                    return Err(Error::unsupported(
                        "DefaultIfEmpty takes at most one operand",
                    ))
                }
            };
            DefaultIfEmptyOperation::new(upstream, default)
        }
        QueryMethod::Take => {
            let count = compile(single_operand(method, args)?, ctx)?;
            TakeOperation::new(upstream, count)
        }
        QueryMethod::Skip => {
            let count = compile(single_operand(method, args)?, ctx)?;
            SkipOperation::new(upstream, count)
        }
        QueryMethod::Count => {
            aggregate(ctx, method, AggregateKind::Count, upstream, args, false)?
        }
        QueryMethod::Sum => aggregate(ctx, method, AggregateKind::Sum, upstream, args, true)?,
        QueryMethod::Average => {
            aggregate(ctx, method, AggregateKind::Average, upstream, args, true)?
        }
        QueryMethod::Min => aggregate(ctx, method, AggregateKind::Min, upstream, args, true)?,
        QueryMethod::Max => aggregate(ctx, method, AggregateKind::Max, upstream, args, true)?,
        QueryMethod::Any => {
            aggregate(ctx, method, AggregateKind::Any, upstream, args, false)?
        }
        QueryMethod::All => {
            let (param, body) = require_lambda(method, args)?;
            AggregateOperation::mapped(ctx, AggregateKind::All, upstream, param, body)?
        }
        QueryMethod::First => aggregate(
            ctx,
            method,
            AggregateKind::First { or_default: false },
            upstream,
            args,
            false,
        )?,
        QueryMethod::FirstOrDefault => aggregate(
            ctx,
            method,
            AggregateKind::First { or_default: true },
            upstream,
            args,
            false,
        )?,
        QueryMethod::Single => aggregate(
            ctx,
            method,
            AggregateKind::Single { or_default: false },
            upstream,
            args,
            false,
        )?,
        QueryMethod::SingleOrDefault => aggregate(
            ctx,
            method,
            AggregateKind::Single { or_default: true },
            upstream,
            args,
            false,
        )?,
    };
    Ok(node)
}

/// Builds an aggregate node, picking the operand shape from the lambda role:
/// selectors map elements, predicates filter them.
fn aggregate(
    ctx: &Rc<OperationContext>,
    method: QueryMethod,
    kind: AggregateKind,
    upstream: Rc<dyn Operation>,
    args: &[Expr],
    selector: bool,
) -> Result<Rc<AggregateOperation>> {
    match lambda_arg(method, args)? {
        None => Ok(AggregateOperation::over_items(kind, upstream)),
        Some((param, body)) if selector => {
            AggregateOperation::mapped(ctx, kind, upstream, param, body)
        }
        Some((param, body)) => {
            AggregateOperation::filtered(ctx, kind, upstream, param, body)
        }
    }
}

fn cast_target(args: &[Expr]) -> Result<DataType> {
    match args {
        [Expr::Constant(Value::String(name))] => DataType::parse(name).ok_or_else(|| {
            Error::unsupported(format!("Cast target type is unknown: {}", name))
        }),
        _ => Err(Error::unsupported(
            "Cast takes one constant type-name operand",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::SourceOperation;
    use alloc::vec;
    use alloc::vec::Vec;
    use ripple_reactive::ObservableVec;

    fn ctx_with_source(
        items: Vec<Value>,
    ) -> (Rc<ObservableVec<Value>>, Rc<OperationContext>) {
        let vec = Rc::new(ObservableVec::from_items(items));
        let node = SourceOperation::new(vec.clone());
        let ctx = OperationContext::with_variable(&OperationContext::root(), "s", node);
        (vec, ctx)
    }

    fn ints(vals: &[i64]) -> Vec<Value> {
        vals.iter().map(|v| Value::Int(*v)).collect()
    }

    #[test]
    fn test_compile_chained_query() {
        let (vec, ctx) = ctx_with_source(ints(&[4, 11, 25, 9]));
        // s.Where(x => x > 10).Select(x => x * 2)
        let expr = Expr::var("s")
            .where_("x", Expr::var("x").gt(Expr::constant(10)))
            .select("x", Expr::var("x").mul(Expr::constant(2)));

        let node = compile(&expr, &ctx).unwrap();
        let seq = node.value().unwrap().as_seq().unwrap().clone();
        assert_eq!(seq.snapshot(), ints(&[22, 50]));

        vec.push(Value::Int(30));
        assert_eq!(seq.snapshot(), ints(&[22, 50, 60]));
    }

    #[test]
    fn test_compile_aggregate_over_query() {
        let (vec, ctx) = ctx_with_source(ints(&[4, 11]));
        let expr = Expr::var("s").count_where("x", Expr::var("x").gt(Expr::constant(10)));

        let node = compile(&expr, &ctx).unwrap();
        assert_eq!(node.value(), Ok(Value::Int(1)));

        vec.push(Value::Int(99));
        assert_eq!(node.value(), Ok(Value::Int(2)));
    }

    #[test]
    fn test_unbound_variable_fails_construction() {
        let ctx = OperationContext::root();
        let expr = Expr::var("nope").count();
        assert_eq!(
            compile(&expr, &ctx).err(),
            Some(Error::unbound_variable("nope"))
        );
    }

    #[test]
    fn test_bare_lambda_is_unsupported() {
        let ctx = OperationContext::root();
        let expr = Expr::lambda("x", Expr::var("x"));
        assert!(matches!(
            compile(&expr, &ctx),
            Err(Error::UnsupportedExpression { .. })
        ));
    }

    #[test]
    fn test_where_requires_lambda() {
        let (_vec, ctx) = ctx_with_source(vec![]);
        let expr = Expr::call(QueryMethod::Where, Expr::var("s"), vec![]);
        assert!(matches!(
            compile(&expr, &ctx),
            Err(Error::UnsupportedExpression { .. })
        ));
    }

    #[test]
    fn test_cast_rejects_unknown_type() {
        let (_vec, ctx) = ctx_with_source(vec![]);
        let expr = Expr::var("s").cast("widget");
        assert!(compile(&expr, &ctx).is_err());
    }

    #[test]
    fn test_invalid_lambda_fails_even_on_empty_source() {
        let (_vec, ctx) = ctx_with_source(vec![]);
        let expr = Expr::var("s").where_("x", Expr::var("undefined"));
        assert_eq!(
            compile(&expr, &ctx).err(),
            Some(Error::unbound_variable("undefined"))
        );
    }
}
