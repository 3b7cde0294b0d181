use std::collections::BTreeMap;

use crate::core::errors::SimError;
use crate::core::values::{SymbolTable, Value};

/// What a name in scope refers to
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Value(Value),
    /// A port of the component being evaluated; reads see its current value
    Port {
        port: String,
        current: Option<Value>,
    },
}

/// Lexically scoped variable context for expression and statement evaluation.
///
/// The innermost scope is searched first. The symbol table is shared
/// read-only by every context created for the same model.
pub struct Context<'a> {
    symbols: &'a SymbolTable,
    scopes: Vec<BTreeMap<String, Binding>>,
}

impl<'a> Context<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self {
            symbols,
            scopes: vec![BTreeMap::new()],
        }
    }

    /// Create a context with one scope holding the given variables
    pub fn with_vars<I, K>(symbols: &'a SymbolTable, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut ctx = Self::new(symbols);
        for (name, value) in vars {
            ctx.bind(name, value);
        }
        ctx
    }

    pub fn symbols(&self) -> &'a SymbolTable {
        self.symbols
    }

    /// Bind a value in the innermost scope, shadowing outer bindings
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.innermost().insert(name.into(), Binding::Value(value));
    }

    /// Expose a port under its own name
    pub fn bind_port(&mut self, name: &str, current: Option<Value>) {
        self.innermost().insert(
            name.to_string(),
            Binding::Port {
                port: name.to_string(),
                current,
            },
        );
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Read a name as a plain value; ports yield their current value or `unknown`
    pub fn value_of(&self, name: &str) -> Option<Value> {
        self.lookup(name).map(|binding| match binding {
            Binding::Value(v) => v.clone(),
            Binding::Port { current, .. } => current.clone().unwrap_or(Value::Unknown),
        })
    }

    /// Overwrite the nearest existing binding of `name`
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), SimError> {
        let slot = self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name));
        match slot {
            Some(slot) => {
                if let Binding::Port { port, .. } = slot {
                    return Err(SimError::TypeMismatch(format!(
                        "cannot assign to port '{}' inside an executable",
                        port
                    )));
                }
                *slot = Binding::Value(value);
                Ok(())
            }
            None => Err(SimError::UnresolvedReference(format!(
                "assignment to undeclared variable '{}'",
                name
            ))),
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(BTreeMap::new());
    }

    pub fn pop_scope(&mut self) {
        // The root scope is never dropped
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn innermost(&mut self) -> &mut BTreeMap<String, Binding> {
        if self.scopes.is_empty() {
            self.scopes.push(BTreeMap::new());
        }
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }
}
