//! Runtime type tags for Ripple values.

use core::fmt;

/// The runtime type of a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    Int,
    Float,
    String,
    Record,
    Sequence,
}

impl DataType {
    /// Parses a type name as used by the Cast operator's argument.
    pub fn parse(name: &str) -> Option<DataType> {
        match name {
            "boolean" | "bool" => Some(DataType::Boolean),
            "int" => Some(DataType::Int),
            "float" => Some(DataType::Float),
            "string" => Some(DataType::String),
            "record" => Some(DataType::Record),
            "sequence" => Some(DataType::Sequence),
            _ => None,
        }
    }

    /// Returns the canonical type name.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Boolean => "boolean",
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::String => "string",
            DataType::Record => "record",
            DataType::Sequence => "sequence",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
