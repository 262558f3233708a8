//! Value type definitions for the Ripple query engine.
//!
//! `Value` is the dynamically typed currency of the operation graph: every
//! node holds one, every collection holds a sequence of them. Equality is by
//! value (NaN equals NaN so change detection stays stable); sequences compare
//! by handle identity, since a live sequence wrapper is one object whose
//! contents evolve in place.

use crate::types::DataType;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use ripple_reactive::{CollectionChange, EventSource, ObservableCollection};

/// An ordered list of named fields, cheap to clone.
///
/// Records are the result of object-construction expressions and the target
/// of member access. Field order is part of the value.
#[derive(Clone, Debug, PartialEq)]
pub struct Record(Rc<Vec<(String, Value)>>);

impl Record {
    /// Creates a record from field pairs.
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        Self(Rc::new(fields))
    }

    /// Returns the value of the named field, if present.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Returns the number of fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the record has no fields.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over (name, value) pairs in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (name, value) in self.0.iter() {
            name.hash(state);
            value.hash(state);
        }
    }
}

/// A shared handle to a live observable sequence of values.
///
/// Handles compare and hash by identity: a node's collection-valued output is
/// one wrapper object for its whole lifetime, and swapping in a *different*
/// wrapper is what constitutes a value change.
#[derive(Clone)]
pub struct SeqHandle(Rc<dyn ObservableCollection<Value>>);

impl SeqHandle {
    /// Wraps a collection in a handle.
    pub fn new(collection: Rc<dyn ObservableCollection<Value>>) -> Self {
        Self(collection)
    }

    /// Returns the current contents of the sequence.
    pub fn snapshot(&self) -> Vec<Value> {
        self.0.snapshot()
    }

    /// Returns the current length of the sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the sequence is currently empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The sequence's structural-change event stream.
    pub fn changes(&self) -> &EventSource<CollectionChange<Value>> {
        self.0.changes()
    }

    /// Returns true if both handles refer to the same collection object.
    pub fn ptr_eq(&self, other: &SeqHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for SeqHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqHandle({:#x})", self.addr())
    }
}

impl PartialEq for SeqHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for SeqHandle {}

impl Hash for SeqHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

/// A dynamically typed runtime value.
#[derive(Clone, Debug)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Named-field record
    Record(Record),
    /// Live observable sequence
    Sequence(SeqHandle),
}

impl Value {
    /// Returns the data type of this value, or None if it's Null.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Int(_) => Some(DataType::Int),
            Value::Float(_) => Some(DataType::Float),
            Value::String(_) => Some(DataType::String),
            Value::Record(_) => Some(DataType::Record),
            Value::Sequence(_) => Some(DataType::Sequence),
        }
    }

    /// Returns true if this value is Null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the boolean value if this is a Boolean, None otherwise.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns true if this value is Boolean(true).
    #[inline]
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Boolean(true))
    }

    /// Returns the i64 value if this is an Int, None otherwise.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the f64 value if this is a Float, None otherwise.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns this value as f64 if it is numeric (Int or Float).
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a reference to the string if this is a String, None otherwise.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Returns a reference to the record if this is a Record, None otherwise.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a reference to the sequence handle if this is a Sequence.
    pub fn as_seq(&self) -> Option<&SeqHandle> {
        match self {
            Value::Sequence(v) => Some(v),
            _ => None,
        }
    }

    /// Creates a default value for the given data type.
    pub fn default_for_type(dt: DataType) -> Self {
        match dt {
            DataType::Boolean => Value::Boolean(false),
            DataType::Int => Value::Int(0),
            DataType::Float => Value::Float(0.0),
            DataType::String => Value::String(String::new()),
            DataType::Record => Value::Record(Record::new(Vec::new())),
            DataType::Sequence => Value::Null,
        }
    }

    /// Converts this value to the target type, or None if unconvertible.
    ///
    /// Null converts to Null for every target type. Int/Float convert to
    /// each other and to String; String parses to Int/Float. Records and
    /// sequences only convert to their own type.
    pub fn convert(&self, target: DataType) -> Option<Value> {
        if self.is_null() {
            return Some(Value::Null);
        }
        if self.data_type() == Some(target) {
            return Some(self.clone());
        }
        match (self, target) {
            (Value::Int(v), DataType::Float) => Some(Value::Float(*v as f64)),
            (Value::Float(v), DataType::Int) => Some(Value::Int(*v as i64)),
            (Value::Int(v), DataType::String) => Some(Value::String(format!("{}", v))),
            (Value::Float(v), DataType::String) => Some(Value::String(format!("{}", v))),
            (Value::Boolean(v), DataType::String) => Some(Value::String(format!("{}", v))),
            (Value::String(s), DataType::Int) => s.parse::<i64>().ok().map(Value::Int),
            (Value::String(s), DataType::Float) => s.parse::<f64>().ok().map(Value::Float),
            _ => None,
        }
    }

    /// Returns a type ordering value for comparing different types.
    fn type_order(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::String(_) => 4,
            Value::Record(_) => 5,
            Value::Sequence(_) => 6,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => {
                // NaN equals NaN so change detection is stable
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b
                }
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Record(r) => r.hash(state),
            Value::Sequence(s) => s.hash(state),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            // Cross-type numeric comparisons
            (Value::Int(a), Value::Float(b)) => {
                let a_f64 = *a as f64;
                if b.is_nan() {
                    Ordering::Less
                } else {
                    a_f64.partial_cmp(b).unwrap_or(Ordering::Equal)
                }
            }
            (Value::Float(a), Value::Int(b)) => {
                let b_f64 = *b as f64;
                if a.is_nan() {
                    Ordering::Greater
                } else {
                    a.partial_cmp(&b_f64).unwrap_or(Ordering::Equal)
                }
            }
            (Value::Float(a), Value::Float(b)) => {
                // NaN is greater than all other values
                match (a.is_nan(), b.is_nan()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
                }
            }
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Record(a), Value::Record(b)) => {
                for ((an, av), (bn, bv)) in a.fields().zip(b.fields()) {
                    match an.cmp(bn).then_with(|| av.cmp(bv)) {
                        Ordering::Equal => continue,
                        ord => return ord,
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Sequence(a), Value::Sequence(b)) => a.addr().cmp(&b.addr()),
            // Different types: order by type discriminant
            _ => self.type_order().cmp(&other.type_order()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
            Value::Record(r) => {
                f.write_str("{")?;
                for (i, (name, value)) in r.fields().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                f.write_str("}")
            }
            Value::Sequence(s) => write!(f, "<sequence of {}>", s.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

impl From<SeqHandle> for Value {
    fn from(v: SeqHandle) -> Self {
        Value::Sequence(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}
