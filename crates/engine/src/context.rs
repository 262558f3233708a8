//! Variable-binding scopes.
//!
//! An `OperationContext` maps free-variable names (lambda parameters,
//! top-level source bindings) to the operation node currently bound to each
//! name. Lookup walks up the parent chain, so a child scope shadows its
//! parent. Scopes are immutable after construction; a per-element sub-graph
//! gets a fresh child scope and disposes its own bindings with the graph.

use crate::operation::Operation;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use ripple_core::{Error, Result};

/// Option name: member/index access on a Null target yields Null instead of
/// failing.
pub const NULL_SAFE: &str = "null_safe";

/// A chained variable/option binding scope.
pub struct OperationContext {
    parent: Option<Rc<OperationContext>>,
    variables: Vec<(String, Rc<dyn Operation>)>,
    options: Vec<(String, bool)>,
}

impl OperationContext {
    /// Creates an empty root scope.
    pub fn root() -> Rc<Self> {
        Rc::new(Self {
            parent: None,
            variables: Vec::new(),
            options: Vec::new(),
        })
    }

    /// Creates a child scope binding one variable.
    pub fn with_variable(
        parent: &Rc<Self>,
        name: impl Into<String>,
        node: Rc<dyn Operation>,
    ) -> Rc<Self> {
        Rc::new(Self {
            parent: Some(parent.clone()),
            variables: alloc::vec![(name.into(), node)],
            options: Vec::new(),
        })
    }

    /// Creates a child scope binding several variables at once.
    pub fn with_variables(
        parent: &Rc<Self>,
        variables: Vec<(String, Rc<dyn Operation>)>,
    ) -> Rc<Self> {
        Rc::new(Self {
            parent: Some(parent.clone()),
            variables,
            options: Vec::new(),
        })
    }

    /// Creates a child scope setting one inherited boolean option.
    pub fn with_option(parent: &Rc<Self>, name: impl Into<String>, value: bool) -> Rc<Self> {
        Rc::new(Self {
            parent: Some(parent.clone()),
            variables: Vec::new(),
            options: alloc::vec![(name.into(), value)],
        })
    }

    /// Resolves a variable name, walking up the parent chain.
    ///
    /// Fails with `UnboundVariable` only when the query has a free variable
    /// no scope in the chain supplies - a construction-time error.
    pub fn variable(&self, name: &str) -> Result<Rc<dyn Operation>> {
        if let Some((_, node)) = self.variables.iter().find(|(n, _)| n == name) {
            return Ok(node.clone());
        }
        match &self.parent {
            Some(parent) => parent.variable(name),
            None => Err(Error::unbound_variable(name)),
        }
    }

    /// Resolves an inherited boolean option, defaulting to false.
    pub fn option(&self, name: &str) -> bool {
        if let Some((_, value)) = self.options.iter().find(|(n, _)| n == name) {
            return *value;
        }
        match &self.parent {
            Some(parent) => parent.option(name),
            None => false,
        }
    }

    /// Disposes the nodes bound in this scope (not the parent's).
    ///
    /// Bound variable nodes are owned by the scope that introduced them; the
    /// per-element graph that created the scope calls this on teardown.
    pub fn dispose_bindings(&self) {
        for (_, node) in &self.variables {
            node.dispose();
        }
    }
}
