//! Incremental query evaluation for Ripple.
//!
//! A query is described as an [`Expr`] tree and compiled into a graph of
//! live operation nodes. The graph evaluates once at construction, then
//! stays continuously correct: every mutation of a source collection and
//! every change of a bound variable cascades through the affected nodes
//! only, and downstream consumers observe the result through value-change
//! and collection-change events.
//!
//! The typical entry points are [`watch_collection`] and [`watch_scalar`],
//! which compile an expression under an [`OperationContext`] and hand back
//! an owning view.

#![no_std]

extern crate alloc;

pub mod compile;
pub mod container;
pub mod context;
pub mod expr;
pub mod operation;
pub mod operators;
pub mod output;
pub mod scalar;
pub mod source;
pub mod view;

pub use compile::compile;
pub use context::{OperationContext, NULL_SAFE};
pub use expr::{BinaryOp, Expr, QueryMethod, UnaryOp};
pub use operation::{
    ConstantOperation, ItemOperation, Operation, OperationCore, SourceOperation,
    VariableOperation,
};
pub use view::{watch_collection, watch_scalar, CollectionView, ScalarView};
