use log::debug;

use crate::core::errors::SimError;
use crate::core::interpreter::{evaluate, Context};
use crate::core::model::ast::Expr;
use crate::core::model::elements::Constraint;
use crate::core::values::{SymbolTable, Value};

/// Which half of a contract is being checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractPhase {
    Pre,
    Post,
}

/// Build the evaluation context of a constraint.
///
/// Declared input names are bound positionally to `inputs` and declared
/// output names to `outputs`. The first input is also visible as `input`,
/// the first output as `output` and `result`.
pub fn constraint_context<'a>(
    constraint: &Constraint,
    symbols: &'a SymbolTable,
    inputs: &[Value],
    outputs: &[Value],
) -> Context<'a> {
    let mut ctx = Context::new(symbols);
    if let Some(first) = inputs.first() {
        ctx.bind("input", first.clone());
    }
    if let Some(first) = outputs.first() {
        ctx.bind("output", first.clone());
        ctx.bind("result", first.clone());
    }
    for (name, value) in constraint.inputs.iter().zip(inputs) {
        ctx.bind(name.clone(), value.clone());
    }
    for (name, value) in constraint.outputs.iter().zip(outputs) {
        ctx.bind(name.clone(), value.clone());
    }
    ctx
}

/// Check every condition the constraint declares.
///
/// Returns `Ok(true)` when all hold and raises `ConstraintViolation` carrying
/// the expression text otherwise. A constraint with neither condition holds
/// trivially.
pub fn validate(constraint: &Constraint, ctx: &Context) -> Result<bool, SimError> {
    check_precondition(constraint, ctx)?;
    check_postcondition(constraint, ctx)
}

pub fn check_precondition(constraint: &Constraint, ctx: &Context) -> Result<bool, SimError> {
    check_phase(constraint, ContractPhase::Pre, ctx)
}

pub fn check_postcondition(constraint: &Constraint, ctx: &Context) -> Result<bool, SimError> {
    check_phase(constraint, ContractPhase::Post, ctx)
}

fn check_phase(constraint: &Constraint, phase: ContractPhase, ctx: &Context) -> Result<bool, SimError> {
    let expr = match phase {
        ContractPhase::Pre => constraint.precondition.as_ref(),
        ContractPhase::Post => constraint.postcondition.as_ref(),
    };
    match expr {
        Some(expr) => check_expression(&constraint.name, expr, ctx),
        None => Ok(true),
    }
}

/// Evaluate one contract expression; anything but `true` is a violation
pub fn check_expression(name: &str, expr: &Expr, ctx: &Context) -> Result<bool, SimError> {
    let outcome = evaluate(expr, ctx)?;
    if outcome == Value::Bool(true) {
        debug!("constraint '{}' holds: {}", name, expr);
        return Ok(true);
    }
    Err(SimError::ConstraintViolation {
        name: name.to_string(),
        expression: expr.to_string(),
        evaluated: render_operands(expr, ctx),
    })
}

/// Render an expression with every resolvable name replaced by its value
fn render_operands(expr: &Expr, ctx: &Context) -> String {
    expr.render_with(&|node| match node {
        Expr::Variable(_) | Expr::FieldAccess { .. } => evaluate(node, ctx).ok().map(|v| v.to_string()),
        _ => None,
    })
}
