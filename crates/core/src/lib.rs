//! Ripple Core - Core value and error types for the Ripple query engine.
//!
//! This crate provides the foundational types shared across the engine:
//!
//! - `DataType`: the supported runtime types (Boolean, Int, Float, String, Record, Sequence)
//! - `Value`: a dynamically typed runtime value, including live sequences
//! - `Record`: an ordered, named field list (the target of member access)
//! - `SeqHandle`: an identity-compared handle to a live observable sequence
//! - `Error`: the engine's error taxonomy
//!
//! # Example
//!
//! ```rust
//! use ripple_core::{DataType, Value};
//!
//! let v = Value::Int(42);
//! assert_eq!(v.data_type(), Some(DataType::Int));
//! assert_eq!(v.as_i64(), Some(42));
//! assert_eq!(v.convert(DataType::Float), Some(Value::Float(42.0)));
//! ```

#![no_std]

extern crate alloc;

mod error;
mod types;
mod value;

pub use error::{Error, Result};
pub use types::DataType;
pub use value::{Record, SeqHandle, Value};
