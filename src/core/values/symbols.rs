use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::value::Value;
use crate::core::errors::SimError;

/// Nesting bound for value-type aliases and datatype fields
const MAX_TYPE_DEPTH: usize = 16;

/// Declared type of a port, parameter, flow or variable
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeRef {
    Any,
    Integer,
    Real,
    Boolean,
    Text,
    /// Enumeration, datatype or value type declared in the model
    Named(String),
}

impl TypeRef {
    /// Map a type name as written in a model to a type reference
    pub fn from_name(name: &str) -> Self {
        match name {
            "" | "Any" | "Void" => TypeRef::Any,
            "Int" | "Integer" => TypeRef::Integer,
            "Real" | "Float" | "Number" => TypeRef::Real,
            "Boolean" | "Bool" => TypeRef::Boolean,
            "String" => TypeRef::Text,
            other => TypeRef::Named(other.to_string()),
        }
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeRef::Any => write!(f, "Any"),
            TypeRef::Integer => write!(f, "Integer"),
            TypeRef::Real => write!(f, "Real"),
            TypeRef::Boolean => write!(f, "Boolean"),
            TypeRef::Text => write!(f, "String"),
            TypeRef::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Read-only table of the model's type declarations.
///
/// Built once when a model is loaded and handed to every evaluation context,
/// so enum literals and datatypes are resolved without global state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolTable {
    enums: BTreeMap<String, Vec<String>>,
    datatypes: BTreeMap<String, Vec<(String, TypeRef)>>,
    value_types: BTreeMap<String, TypeRef>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_enum<I, S>(&mut self, name: &str, literals: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enums
            .insert(name.to_string(), literals.into_iter().map(Into::into).collect());
    }

    pub fn add_datatype(&mut self, name: &str, fields: Vec<(String, TypeRef)>) {
        self.datatypes.insert(name.to_string(), fields);
    }

    /// Declare `name` as a value type refining `base` (e.g. `Celsius extends Real`)
    pub fn add_value_type(&mut self, name: &str, base: TypeRef) {
        self.value_types.insert(name.to_string(), base);
    }

    pub fn has_enum(&self, name: &str) -> bool {
        self.enums.contains_key(name)
    }

    pub fn enum_contains(&self, enum_name: &str, literal: &str) -> bool {
        self.enums
            .get(enum_name)
            .map_or(false, |lits| lits.iter().any(|l| l == literal))
    }

    /// Find the enumeration declaring a bare literal name
    pub fn resolve_enum_literal(&self, literal: &str) -> Option<Value> {
        self.enums
            .iter()
            .find(|(_, lits)| lits.iter().any(|l| l == literal))
            .map(|(name, _)| Value::enum_literal(name.clone(), literal))
    }

    /// Whether `value` is acceptable where `ty` is declared.
    ///
    /// Named types the table does not know are treated as opaque and accept
    /// any observed value.
    pub fn conforms(&self, value: &Value, ty: &TypeRef) -> bool {
        self.conforms_at(value, ty, 0)
    }

    fn conforms_at(&self, value: &Value, ty: &TypeRef, depth: usize) -> bool {
        if depth > MAX_TYPE_DEPTH {
            return false;
        }
        match (ty, value) {
            (TypeRef::Any, _) => true,
            (_, Value::Unknown) => false,
            (TypeRef::Integer, Value::Int(_)) => true,
            (TypeRef::Real, v) => v.is_numeric(),
            (TypeRef::Boolean, Value::Bool(_)) => true,
            (TypeRef::Text, Value::Str(_)) => true,
            (TypeRef::Named(name), v) => {
                if let Some(base) = self.value_types.get(name) {
                    return self.conforms_at(v, base, depth + 1);
                }
                if let Some(literals) = self.enums.get(name) {
                    return match v {
                        Value::Enum { type_name, literal } => {
                            (type_name.is_empty() || type_name == name)
                                && literals.iter().any(|l| l == literal)
                        }
                        _ => false,
                    };
                }
                if let Some(fields) = self.datatypes.get(name) {
                    return match v {
                        Value::Record(record) => fields.iter().all(|(field, field_ty)| {
                            record
                                .get(field)
                                .map_or(false, |fv| self.conforms_at(fv, field_ty, depth + 1))
                        }),
                        _ => false,
                    };
                }
                true
            }
            _ => false,
        }
    }

    /// Fail with `TypeMismatch` when `value` does not conform to `ty`
    pub fn check(&self, value: &Value, ty: &TypeRef, target: &str) -> Result<(), SimError> {
        if self.conforms(value, ty) {
            Ok(())
        } else {
            Err(SimError::TypeMismatch(format!(
                "{} expects {}, got {} ({})",
                target,
                ty,
                value,
                value.kind_name()
            )))
        }
    }

    /// Default value of a declared type
    pub fn default_for(&self, ty: &TypeRef) -> Value {
        self.default_at(ty, 0)
    }

    fn default_at(&self, ty: &TypeRef, depth: usize) -> Value {
        if depth > MAX_TYPE_DEPTH {
            return Value::Unknown;
        }
        match ty {
            TypeRef::Any => Value::Unknown,
            TypeRef::Integer => Value::Int(0),
            TypeRef::Real => Value::Real(0.0),
            TypeRef::Boolean => Value::Bool(false),
            TypeRef::Text => Value::Str(String::new()),
            TypeRef::Named(name) => {
                if let Some(base) = self.value_types.get(name) {
                    self.default_at(base, depth + 1)
                } else if let Some(first) = self.enums.get(name).and_then(|l| l.first()) {
                    Value::enum_literal(name.clone(), first.clone())
                } else if let Some(fields) = self.datatypes.get(name) {
                    Value::Record(
                        fields
                            .iter()
                            .map(|(f, t)| (f.clone(), self.default_at(t, depth + 1)))
                            .collect(),
                    )
                } else {
                    Value::Unknown
                }
            }
        }
    }
}
