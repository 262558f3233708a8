//! Scalar expression nodes: binary/unary operators, conditionals, member and
//! index access, record construction.
//!
//! Null propagates through arithmetic, negation, and relational comparison.
//! Logic is three-valued: `false && x` and `true || x` decide without the
//! other operand, otherwise a Null operand yields Null. Equality is plain
//! value equality and never errors; Null equals Null.

use crate::context::{OperationContext, NULL_SAFE};
use crate::expr::{BinaryOp, UnaryOp};
use crate::operation::{watch, Operation, OperationCore};
use crate::source::{SourceBinding, SourceEvent};
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use ripple_core::{DataType, Error, Record, Result, Value};

fn as_tri_bool(v: &Value) -> Result<Option<bool>> {
    match v {
        Value::Null => Ok(None),
        Value::Boolean(b) => Ok(Some(*b)),
        other => Err(Error::type_mismatch(DataType::Boolean, other.data_type())),
    }
}

fn numeric_pair(l: &Value, r: &Value) -> Option<(f64, f64)> {
    Some((l.as_numeric()?, r.as_numeric()?))
}

fn both_int(l: &Value, r: &Value) -> Option<(i64, i64)> {
    Some((l.as_i64()?, r.as_i64()?))
}

/// Evaluates one binary operator over already-computed operand values.
pub fn eval_binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    match op {
        BinaryOp::Eq => Ok(Value::Boolean(l == r)),
        BinaryOp::Ne => Ok(Value::Boolean(l != r)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => eval_relational(op, l, r),
        BinaryOp::And => match (as_tri_bool(l)?, as_tri_bool(r)?) {
            (Some(false), _) | (_, Some(false)) => Ok(Value::Boolean(false)),
            (Some(true), Some(true)) => Ok(Value::Boolean(true)),
            _ => Ok(Value::Null),
        },
        BinaryOp::Or => match (as_tri_bool(l)?, as_tri_bool(r)?) {
            (Some(true), _) | (_, Some(true)) => Ok(Value::Boolean(true)),
            (Some(false), Some(false)) => Ok(Value::Boolean(false)),
            _ => Ok(Value::Null),
        },
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            eval_arithmetic(op, l, r)
        }
    }
}

fn eval_relational(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    let ord = match (l, r) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ if numeric_pair(l, r).is_some() => l.cmp(r),
        _ => {
            let expected = l.data_type().unwrap_or(DataType::Int);
            return Err(Error::type_mismatch(expected, r.data_type()));
        }
    };
    let outcome = match op {
        BinaryOp::Lt => ord.is_lt(),
        BinaryOp::Le => ord.is_le(),
        BinaryOp::Gt => ord.is_gt(),
        BinaryOp::Ge => ord.is_ge(),
        _ => unreachable!(),
    };
    Ok(Value::Boolean(outcome))
}

fn eval_arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    if op == BinaryOp::Add {
        if let (Value::String(a), Value::String(b)) = (l, r) {
            let mut s = String::with_capacity(a.len() + b.len());
            s.push_str(a);
            s.push_str(b);
            return Ok(Value::String(s));
        }
    }
    if let Some((a, b)) = both_int(l, r) {
        return match op {
            BinaryOp::Add => Ok(Value::Int(a.wrapping_add(b))),
            BinaryOp::Sub => Ok(Value::Int(a.wrapping_sub(b))),
            BinaryOp::Mul => Ok(Value::Int(a.wrapping_mul(b))),
            BinaryOp::Div => match a.checked_div(b) {
                Some(q) => Ok(Value::Int(q)),
                None => Err(Error::invalid_operation("division by zero")),
            },
            BinaryOp::Mod => match a.checked_rem(b) {
                Some(m) => Ok(Value::Int(m)),
                None => Err(Error::invalid_operation("division by zero")),
            },
            _ => unreachable!(),
        };
    }
    if let Some((a, b)) = numeric_pair(l, r) {
        return Ok(Value::Float(match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Mod => a % b,
            _ => unreachable!(),
        }));
    }
    let expected = if l.as_numeric().is_some() {
        l.data_type().unwrap_or(DataType::Int)
    } else {
        DataType::Int
    };
    let got = if l.as_numeric().is_some() {
        r.data_type()
    } else {
        l.data_type()
    };
    Err(Error::type_mismatch(expected, got))
}

/// Evaluates one unary operator over an already-computed operand value.
pub fn eval_unary(op: UnaryOp, v: &Value) -> Result<Value> {
    match op {
        UnaryOp::Not => match v {
            Value::Null => Ok(Value::Null),
            Value::Boolean(b) => Ok(Value::Boolean(!b)),
            other => Err(Error::type_mismatch(DataType::Boolean, other.data_type())),
        },
        UnaryOp::Neg => match v {
            Value::Null => Ok(Value::Null),
            Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(Error::type_mismatch(DataType::Int, other.data_type())),
        },
    }
}

/// A binary operator node over two child operations.
pub struct BinaryOperation {
    core: OperationCore,
    op: BinaryOp,
    left: Rc<dyn Operation>,
    right: Rc<dyn Operation>,
}

impl BinaryOperation {
    pub fn new(op: BinaryOp, left: Rc<dyn Operation>, right: Rc<dyn Operation>) -> Rc<Self> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
            op,
            left: left.clone(),
            right: right.clone(),
        });
        node.core.set_initial(node.evaluate());
        watch(&node, left, true);
        watch(&node, right, true);
        node
    }
}

impl Operation for BinaryOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn evaluate(&self) -> Result<Value> {
        let l = self.left.value()?;
        let r = self.right.value()?;
        eval_binary(self.op, &l, &r)
    }
}

/// A unary operator node.
pub struct UnaryOperation {
    core: OperationCore,
    op: UnaryOp,
    operand: Rc<dyn Operation>,
}

impl UnaryOperation {
    pub fn new(op: UnaryOp, operand: Rc<dyn Operation>) -> Rc<Self> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
            op,
            operand: operand.clone(),
        });
        node.core.set_initial(node.evaluate());
        watch(&node, operand, true);
        node
    }
}

impl Operation for UnaryOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn evaluate(&self) -> Result<Value> {
        let v = self.operand.value()?;
        eval_unary(self.op, &v)
    }
}

/// A ternary conditional node. A Null condition selects the else branch.
pub struct ConditionalOperation {
    core: OperationCore,
    cond: Rc<dyn Operation>,
    then: Rc<dyn Operation>,
    otherwise: Rc<dyn Operation>,
}

impl ConditionalOperation {
    pub fn new(
        cond: Rc<dyn Operation>,
        then: Rc<dyn Operation>,
        otherwise: Rc<dyn Operation>,
    ) -> Rc<Self> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
            cond: cond.clone(),
            then: then.clone(),
            otherwise: otherwise.clone(),
        });
        node.core.set_initial(node.evaluate());
        watch(&node, cond, true);
        watch(&node, then, true);
        watch(&node, otherwise, true);
        node
    }
}

impl Operation for ConditionalOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn evaluate(&self) -> Result<Value> {
        let cond = self.cond.value()?;
        match cond {
            Value::Boolean(true) => self.then.value(),
            Value::Boolean(false) | Value::Null => self.otherwise.value(),
            other => Err(Error::type_mismatch(DataType::Boolean, other.data_type())),
        }
    }
}

/// Member access on a record-valued child.
///
/// A missing field reads as Null; a Null target is an error unless the
/// null-safe option is set in scope.
pub struct MemberOperation {
    core: OperationCore,
    target: Rc<dyn Operation>,
    name: String,
    null_safe: bool,
}

impl MemberOperation {
    pub fn new(ctx: &OperationContext, target: Rc<dyn Operation>, name: &str) -> Rc<Self> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
            target: target.clone(),
            name: String::from(name),
            null_safe: ctx.option(NULL_SAFE),
        });
        node.core.set_initial(node.evaluate());
        watch(&node, target, true);
        node
    }
}

impl Operation for MemberOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn evaluate(&self) -> Result<Value> {
        let target = self.target.value()?;
        match target {
            Value::Null => {
                if self.null_safe {
                    Ok(Value::Null)
                } else {
                    Err(Error::null_target(self.name.clone()))
                }
            }
            Value::Record(r) => Ok(r.get(&self.name).cloned().unwrap_or(Value::Null)),
            other => Err(Error::type_mismatch(DataType::Record, other.data_type())),
        }
    }
}

/// Positional access into a sequence-valued child (or string-keyed access
/// into a record).
///
/// The node tracks the sequence's structural changes so the element re-reads
/// when the collection mutates underneath a stable handle. Out-of-range reads
/// as Null.
pub struct IndexOperation {
    core: OperationCore,
    index: Rc<dyn Operation>,
    binding: RefCell<Option<Rc<SourceBinding>>>,
    null_safe: bool,
}

impl IndexOperation {
    pub fn new(
        ctx: &OperationContext,
        target: Rc<dyn Operation>,
        index: Rc<dyn Operation>,
    ) -> Rc<Self> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
            index: index.clone(),
            binding: RefCell::new(None),
            null_safe: ctx.option(NULL_SAFE),
        });
        let weak = Rc::downgrade(&node);
        let binding = SourceBinding::bind(
            target,
            Rc::new(move |_: &SourceEvent| {
                if let Some(n) = weak.upgrade() {
                    n.refresh();
                }
            }),
        );
        *node.binding.borrow_mut() = Some(binding);
        node.core.set_initial(node.evaluate());
        watch(&node, index, true);
        node
    }

    fn target_value(&self) -> Result<Value> {
        match &*self.binding.borrow() {
            Some(b) => b.upstream().value(),
            None => Ok(Value::Null),
        }
    }
}

impl Operation for IndexOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn evaluate(&self) -> Result<Value> {
        let target = self.target_value()?;
        let index = self.index.value()?;
        match target {
            Value::Null => {
                if self.null_safe {
                    Ok(Value::Null)
                } else {
                    Err(Error::null_target("[index]"))
                }
            }
            Value::Sequence(seq) => match index {
                Value::Null => Ok(Value::Null),
                Value::Int(i) => {
                    if i < 0 {
                        return Ok(Value::Null);
                    }
                    Ok(seq.snapshot().into_iter().nth(i as usize).unwrap_or(Value::Null))
                }
                other => Err(Error::type_mismatch(DataType::Int, other.data_type())),
            },
            Value::Record(r) => match index {
                Value::Null => Ok(Value::Null),
                Value::String(name) => Ok(r.get(&name).cloned().unwrap_or(Value::Null)),
                other => Err(Error::type_mismatch(DataType::String, other.data_type())),
            },
            other => Err(Error::type_mismatch(DataType::Sequence, other.data_type())),
        }
    }

    fn on_dispose(&self) {
        if let Some(binding) = self.binding.borrow_mut().take() {
            binding.dispose();
        }
    }
}

/// Record construction from named field children.
pub struct RecordOperation {
    core: OperationCore,
    fields: Vec<(String, Rc<dyn Operation>)>,
}

impl RecordOperation {
    pub fn new(fields: Vec<(String, Rc<dyn Operation>)>) -> Rc<Self> {
        let node = Rc::new(Self {
            core: OperationCore::new(),
            fields: fields.clone(),
        });
        node.core.set_initial(node.evaluate());
        for (_, child) in fields {
            watch(&node, child, true);
        }
        node
    }
}

impl Operation for RecordOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn evaluate(&self) -> Result<Value> {
        let mut fields = Vec::with_capacity(self.fields.len());
        for (name, child) in &self.fields {
            fields.push((name.clone(), child.value()?));
        }
        Ok(Value::Record(Record::new(fields)))
    }
}
