//! Error types for the Ripple query engine.

use crate::types::DataType;
use alloc::string::String;
use core::fmt;

/// Result type alias for Ripple operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for query construction and evaluation.
///
/// Errors are `Clone` because evaluation failures latch inside the failing
/// operation node and are handed back on every read until a later recompute
/// clears them.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// An expression shape the dispatch table cannot map to an operation.
    UnsupportedExpression {
        message: String,
    },
    /// A free variable no context in the chain supplies.
    UnboundVariable {
        name: String,
    },
    /// Member or index access on a Null target without null-safe mode.
    NullTarget {
        member: String,
    },
    /// An operand had the wrong runtime type.
    TypeMismatch {
        expected: DataType,
        got: Option<DataType>,
    },
    /// A First/Single-style scalar found no matching element.
    NoElements {
        operator: String,
    },
    /// A Single-style scalar found more than one matching element.
    MultipleElements {
        operator: String,
    },
    /// Invalid operation.
    InvalidOperation {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedExpression { message } => {
                write!(f, "Unsupported expression: {}", message)
            }
            Error::UnboundVariable { name } => {
                write!(f, "Unbound variable: {}", name)
            }
            Error::NullTarget { member } => {
                write!(f, "Null target accessing member: {}", member)
            }
            Error::TypeMismatch { expected, got } => match got {
                Some(got) => write!(f, "Type mismatch: expected {}, got {}", expected, got),
                None => write!(f, "Type mismatch: expected {}, got null", expected),
            },
            Error::NoElements { operator } => {
                write!(f, "{}: sequence contains no matching element", operator)
            }
            Error::MultipleElements { operator } => {
                write!(
                    f,
                    "{}: sequence contains more than one matching element",
                    operator
                )
            }
            Error::InvalidOperation { message } => {
                write!(f, "Invalid operation: {}", message)
            }
        }
    }
}

impl Error {
    /// Creates an unsupported expression error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::UnsupportedExpression {
            message: message.into(),
        }
    }

    /// Creates an unbound variable error.
    pub fn unbound_variable(name: impl Into<String>) -> Self {
        Error::UnboundVariable { name: name.into() }
    }

    /// Creates a null target error.
    pub fn null_target(member: impl Into<String>) -> Self {
        Error::NullTarget {
            member: member.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: DataType, got: Option<DataType>) -> Self {
        Error::TypeMismatch { expected, got }
    }

    /// Creates a no-elements cardinality error.
    pub fn no_elements(operator: impl Into<String>) -> Self {
        Error::NoElements {
            operator: operator.into(),
        }
    }

    /// Creates a more-than-one-element cardinality error.
    pub fn multiple_elements(operator: impl Into<String>) -> Self {
        Error::MultipleElements {
            operator: operator.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }
}
