use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::context::{Binding, Context};
use crate::core::errors::SimError;
use crate::core::model::ast::{BinaryOp, Expr, UnaryOp};
use crate::core::values::{TypeRef, Value};

/// Evaluate an expression tree against a variable context.
///
/// Identifiers resolve from the innermost scope outward, then through the
/// enum-literal table of the model; anything else is an
/// `UnresolvedReference`. Evaluation has no side effects, so repeated calls
/// with the same context return the same value.
pub fn evaluate(expr: &Expr, ctx: &Context) -> Result<Value, SimError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::EnumLiteral { enum_name, literal } => evaluate_enum_literal(enum_name.as_deref(), literal, ctx),
        Expr::ObjectLiteral { type_name, fields } => {
            let mut record = BTreeMap::new();
            for (name, field_expr) in fields {
                record.insert(name.clone(), evaluate(field_expr, ctx)?);
            }
            let value = Value::Record(record);
            if let Some(type_name) = type_name {
                ctx.symbols()
                    .check(&value, &TypeRef::from_name(type_name), "object literal")?;
            }
            Ok(value)
        }
        Expr::Variable(name) => resolve_name(name, ctx),
        Expr::FieldAccess { object, field } => evaluate_field_access(object, field, ctx),
        Expr::Unary { op, operand } => {
            let op = UnaryOp::parse(op)?;
            let value = evaluate(operand, ctx)?;
            match (op, value) {
                (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                (UnaryOp::Neg, Value::Int(i)) => i
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| SimError::ArithmeticError(format!("overflow negating {}", i))),
                (UnaryOp::Neg, Value::Real(r)) => Ok(Value::Real(-r)),
                (op, other) => Err(SimError::TypeMismatch(format!(
                    "operator {:?} cannot be applied to {} ({})",
                    op,
                    other,
                    other.kind_name()
                ))),
            }
        }
        Expr::Binary { op, left, right } => {
            let op = BinaryOp::parse(op)?;
            evaluate_binary(op, left, right, ctx)
        }
    }
}

fn resolve_name(name: &str, ctx: &Context) -> Result<Value, SimError> {
    if let Some(value) = ctx.value_of(name) {
        return Ok(value);
    }
    ctx.symbols()
        .resolve_enum_literal(name)
        .ok_or_else(|| SimError::UnresolvedReference(format!("identifier '{}' is not defined", name)))
}

fn evaluate_enum_literal(enum_name: Option<&str>, literal: &str, ctx: &Context) -> Result<Value, SimError> {
    let symbols = ctx.symbols();
    match enum_name {
        Some(name) if symbols.enum_contains(name, literal) => Ok(Value::enum_literal(name, literal)),
        Some(name) if symbols.has_enum(name) => Err(SimError::UnresolvedReference(format!(
            "enum '{}' has no literal '{}'",
            name, literal
        ))),
        Some(name) => Err(SimError::UnresolvedReference(format!("enum '{}' is not declared", name))),
        None => symbols.resolve_enum_literal(literal).ok_or_else(|| {
            SimError::UnresolvedReference(format!("enum literal '{}' is not declared", literal))
        }),
    }
}

fn evaluate_field_access(object: &Expr, field: &str, ctx: &Context) -> Result<Value, SimError> {
    // `port.value` reads the port itself; any other field reads through its current value
    if let Expr::Variable(name) = object {
        if let Some(Binding::Port { current, .. }) = ctx.lookup(name) {
            let current = current.clone().unwrap_or(Value::Unknown);
            if field == "value" && current.field("value").is_none() {
                return Ok(current);
            }
            return read_field(&current, field);
        }
    }
    let receiver = evaluate(object, ctx)?;
    read_field(&receiver, field)
}

fn read_field(receiver: &Value, field: &str) -> Result<Value, SimError> {
    match receiver {
        Value::Record(fields) => fields.get(field).cloned().ok_or_else(|| {
            SimError::UnresolvedReference(format!("record {} has no field '{}'", receiver, field))
        }),
        other => Err(SimError::TypeMismatch(format!(
            "field access '.{}' on non-record value {} ({})",
            field,
            other,
            other.kind_name()
        ))),
    }
}

fn expect_bool(value: &Value, op: BinaryOp) -> Result<bool, SimError> {
    value.as_bool().ok_or_else(|| {
        SimError::TypeMismatch(format!(
            "operator {:?} expects Boolean operands, got {} ({})",
            op,
            value,
            value.kind_name()
        ))
    })
}

fn evaluate_binary(op: BinaryOp, left: &Expr, right: &Expr, ctx: &Context) -> Result<Value, SimError> {
    // Logical operators short-circuit on the left operand
    match op {
        BinaryOp::And => {
            let l = expect_bool(&evaluate(left, ctx)?, op)?;
            if !l {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(expect_bool(&evaluate(right, ctx)?, op)?));
        }
        BinaryOp::Or => {
            let l = expect_bool(&evaluate(left, ctx)?, op)?;
            if l {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(expect_bool(&evaluate(right, ctx)?, op)?));
        }
        BinaryOp::Implies => {
            let l = expect_bool(&evaluate(left, ctx)?, op)?;
            if !l {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(expect_bool(&evaluate(right, ctx)?, op)?));
        }
        _ => {}
    }

    let l = evaluate(left, ctx)?;
    let r = evaluate(right, ctx)?;
    apply_binary(op, &l, &r)
}

/// Apply a non-logical binary operator to two evaluated operands
pub fn apply_binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, SimError> {
    match op {
        BinaryOp::Add if l.is_text() || r.is_text() => {
            Ok(Value::Str(format!("{}{}", concat_text(l), concat_text(r))))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            arithmetic(op, l, r)
        }
        BinaryOp::Eq => Ok(Value::Bool(l.loosely_equals(r))),
        BinaryOp::Ne => Ok(Value::Bool(!l.loosely_equals(r))),
        BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Le => {
            let ordering = compare(l, r).ok_or_else(|| {
                SimError::TypeMismatch(format!(
                    "cannot compare {} ({}) with {} ({})",
                    l,
                    l.kind_name(),
                    r,
                    r.kind_name()
                ))
            })?;
            Ok(Value::Bool(match op {
                BinaryOp::Gt => ordering == Ordering::Greater,
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Ge => ordering != Ordering::Less,
                _ => ordering != Ordering::Greater,
            }))
        }
        BinaryOp::And | BinaryOp::Or | BinaryOp::Implies => {
            let a = expect_bool(l, op)?;
            let b = expect_bool(r, op)?;
            Ok(Value::Bool(match op {
                BinaryOp::And => a && b,
                BinaryOp::Or => a || b,
                _ => !a || b,
            }))
        }
    }
}

fn concat_text(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compare(l: &Value, r: &Value) -> Option<Ordering> {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, SimError> {
    if let (Value::Int(a), Value::Int(b)) = (l, r) {
        return integer_arithmetic(op, *a, *b);
    }
    let (a, b) = match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(SimError::TypeMismatch(format!(
                "operator {:?} expects numeric operands, got {} ({}) and {} ({})",
                op,
                l,
                l.kind_name(),
                r,
                r.kind_name()
            )))
        }
    };
    if matches!(op, BinaryOp::Div | BinaryOp::Mod) && b == 0.0 {
        return Err(SimError::ArithmeticError(format!("{} {:?} by zero", l, op)));
    }
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => a % b,
    };
    if !result.is_finite() {
        return Err(SimError::ArithmeticError(format!(
            "{} {:?} {} is not finite",
            l, op, r
        )));
    }
    Ok(Value::Real(result))
}

fn integer_arithmetic(op: BinaryOp, a: i64, b: i64) -> Result<Value, SimError> {
    let overflow = || SimError::ArithmeticError(format!("integer overflow in {} {:?} {}", a, op, b));
    match op {
        BinaryOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
        BinaryOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
        BinaryOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
        BinaryOp::Div | BinaryOp::Mod if b == 0 => {
            Err(SimError::ArithmeticError(format!("{} {:?} by zero", a, op)))
        }
        // Exact integer quotients stay integral, anything else becomes real
        BinaryOp::Div => match a.checked_rem(b) {
            Some(0) => a.checked_div(b).map(Value::Int).ok_or_else(overflow),
            Some(_) => Ok(Value::Real(a as f64 / b as f64)),
            None => Err(overflow()),
        },
        _ => a.checked_rem(b).map(Value::Int).ok_or_else(overflow),
    }
}
