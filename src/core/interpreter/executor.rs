use log::trace;

use super::context::Context;
use super::evaluator::evaluate;
use crate::core::errors::SimError;
use crate::core::model::ast::Stmt;
use crate::core::model::elements::Executable;
use crate::core::values::{SymbolTable, TypeRef, Value};

/// Run a statement sequence in the current scope.
///
/// Returns the value of the first `return` reached at any nesting depth, or
/// `None` when the body falls off its end.
pub fn execute(statements: &[Stmt], ctx: &mut Context) -> Result<Option<Value>, SimError> {
    for stmt in statements {
        if let Some(value) = execute_statement(stmt, ctx)? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Run a nested block in its own scope
fn execute_block(statements: &[Stmt], ctx: &mut Context) -> Result<Option<Value>, SimError> {
    ctx.push_scope();
    let result = execute(statements, ctx);
    ctx.pop_scope();
    result
}

fn execute_statement(stmt: &Stmt, ctx: &mut Context) -> Result<Option<Value>, SimError> {
    match stmt {
        Stmt::VariableDecl { name, ty, init } => {
            let value = match init {
                Some(expr) => evaluate(expr, ctx)?,
                None => ctx.symbols().default_for(ty.as_ref().unwrap_or(&TypeRef::Any)),
            };
            if let Some(ty) = ty {
                ctx.symbols().check(&value, ty, &format!("variable '{}'", name))?;
            }
            trace!("let {} = {}", name, value);
            ctx.bind(name.clone(), value);
            Ok(None)
        }
        Stmt::Assign { target, value } => {
            let value = evaluate(value, ctx)?;
            ctx.assign(target, value)?;
            Ok(None)
        }
        Stmt::If {
            condition,
            then_branch,
            else_ifs,
            else_branch,
        } => {
            if condition_holds(condition, ctx)? {
                return execute_block(then_branch, ctx);
            }
            for (cond, body) in else_ifs {
                if condition_holds(cond, ctx)? {
                    return execute_block(body, ctx);
                }
            }
            match else_branch {
                Some(body) => execute_block(body, ctx),
                None => Ok(None),
            }
        }
        Stmt::Return(expr) => evaluate(expr, ctx).map(Some),
    }
}

fn condition_holds(condition: &crate::core::model::ast::Expr, ctx: &Context) -> Result<bool, SimError> {
    let value = evaluate(condition, ctx)?;
    value.as_bool().ok_or_else(|| {
        SimError::TypeMismatch(format!(
            "condition '{}' evaluated to {} ({}), expected Boolean",
            condition,
            value,
            value.kind_name()
        ))
    })
}

/// Invoke an executable with positional arguments.
///
/// Parameters are bound in a fresh scope on top of `ctx`; a missing argument
/// takes the parameter's declared default, then its type's default. Arguments
/// and the returned value are checked against the declared types.
pub fn invoke(exe: &Executable, args: &[Value], ctx: &mut Context) -> Result<Option<Value>, SimError> {
    let symbols = ctx.symbols();
    ctx.push_scope();
    let result = bind_params(exe, args, symbols, ctx).and_then(|_| execute(&exe.body, ctx));
    ctx.pop_scope();

    let result = result?;
    if let Some(value) = &result {
        symbols.check(value, &exe.return_type, &format!("return value of '{}'", exe.name))?;
    }
    Ok(result)
}

/// Invoke an executable in a context holding nothing but its parameters
pub fn invoke_executable(
    exe: &Executable,
    args: &[Value],
    symbols: &SymbolTable,
) -> Result<Option<Value>, SimError> {
    let mut ctx = Context::new(symbols);
    invoke(exe, args, &mut ctx)
}

/// Arguments an executable receives when nothing is supplied for its parameters
pub fn default_arguments(exe: &Executable, symbols: &SymbolTable) -> Vec<Value> {
    exe.params
        .iter()
        .map(|p| p.default.clone().unwrap_or_else(|| symbols.default_for(&p.ty)))
        .collect()
}

fn bind_params(exe: &Executable, args: &[Value], symbols: &SymbolTable, ctx: &mut Context) -> Result<(), SimError> {
    if args.len() > exe.params.len() {
        return Err(SimError::TypeMismatch(format!(
            "'{}' takes {} argument(s), got {}",
            exe.name,
            exe.params.len(),
            args.len()
        )));
    }
    for (i, param) in exe.params.iter().enumerate() {
        let value = match args.get(i) {
            Some(arg) => arg.clone(),
            None => param.default.clone().unwrap_or_else(|| symbols.default_for(&param.ty)),
        };
        symbols.check(&value, &param.ty, &format!("parameter '{}' of '{}'", param.name, exe.name))?;
        ctx.bind(param.name.clone(), value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::ast::Expr;
    use crate::core::model::elements::Param;

    fn classify() -> Executable {
        // if (t > 30) return "hot" else if (t < 10) return "cold" else { let m = "mild"; return m }
        Executable::new(
            "Classify",
            vec![Param::new("t", TypeRef::Real)],
            TypeRef::Text,
            vec![Stmt::if_(
                Expr::binary(">", Expr::var("t"), Expr::lit(30i64)),
                vec![Stmt::ret(Expr::lit("hot"))],
            )
            .else_if(
                Expr::binary("<", Expr::var("t"), Expr::lit(10i64)),
                vec![Stmt::ret(Expr::lit("cold"))],
            )
            .otherwise(vec![
                Stmt::let_("m", Some(TypeRef::Text), Some(Expr::lit("mild"))),
                Stmt::ret(Expr::var("m")),
            ])],
        )
    }

    #[test]
    fn test_if_else_chain() {
        let symbols = SymbolTable::new();
        let exe = classify();
        for (t, expected) in [(35.0, "hot"), (5.0, "cold"), (20.0, "mild")] {
            assert_eq!(
                invoke_executable(&exe, &[Value::Real(t)], &symbols).unwrap(),
                Some(Value::text(expected))
            );
        }
    }

    #[test]
    fn test_return_stops_body() {
        let symbols = SymbolTable::new();
        let mut ctx = Context::new(&symbols);
        let body = vec![
            Stmt::let_("x", None, Some(Expr::lit(1i64))),
            Stmt::if_(Expr::lit(true), vec![Stmt::ret(Expr::var("x"))]),
            Stmt::ret(Expr::lit(99i64)),
        ];
        assert_eq!(execute(&body, &mut ctx).unwrap(), Some(Value::Int(1)));
    }

    #[test]
    fn test_no_return_yields_none() {
        let symbols = SymbolTable::new();
        let mut ctx = Context::new(&symbols);
        let body = vec![Stmt::if_(Expr::lit(false), vec![Stmt::ret(Expr::lit(1i64))])];
        assert_eq!(execute(&body, &mut ctx).unwrap(), None);
    }

    #[test]
    fn test_block_declarations_do_not_leak() {
        let symbols = SymbolTable::new();
        let mut ctx = Context::new(&symbols);
        let body = vec![
            Stmt::let_("x", None, Some(Expr::lit(1i64))),
            Stmt::if_(
                Expr::lit(true),
                vec![
                    Stmt::let_("x", None, Some(Expr::lit(2i64))),
                    Stmt::let_("y", None, Some(Expr::lit(3i64))),
                ],
            ),
            Stmt::ret(Expr::var("x")),
        ];
        assert_eq!(execute(&body, &mut ctx).unwrap(), Some(Value::Int(1)));
        assert_eq!(ctx.value_of("y"), None);
    }

    #[test]
    fn test_assignment_inside_branch_updates_outer_variable() {
        let symbols = SymbolTable::new();
        let mut ctx = Context::new(&symbols);
        let body = vec![
            Stmt::let_("level", Some(TypeRef::Integer), None),
            Stmt::if_(Expr::lit(true), vec![Stmt::assign("level", Expr::lit(4i64))]),
            Stmt::ret(Expr::var("level")),
        ];
        assert_eq!(execute(&body, &mut ctx).unwrap(), Some(Value::Int(4)));
    }

    #[test]
    fn test_non_boolean_condition() {
        let symbols = SymbolTable::new();
        let mut ctx = Context::new(&symbols);
        let body = vec![Stmt::if_(Expr::lit(1i64), vec![])];
        assert!(matches!(execute(&body, &mut ctx), Err(SimError::TypeMismatch(_))));
    }

    #[test]
    fn test_missing_arguments_use_defaults() {
        let symbols = SymbolTable::new();
        let exe = Executable::new(
            "Offset",
            vec![
                Param::new("x", TypeRef::Integer),
                Param::new("by", TypeRef::Integer).with_default(Value::Int(10)),
            ],
            TypeRef::Integer,
            vec![Stmt::ret(Expr::binary("+", Expr::var("x"), Expr::var("by")))],
        );
        assert_eq!(invoke_executable(&exe, &[Value::Int(1)], &symbols).unwrap(), Some(Value::Int(11)));
        assert_eq!(invoke_executable(&exe, &[], &symbols).unwrap(), Some(Value::Int(10)));
        assert_eq!(default_arguments(&exe, &symbols), vec![Value::Int(0), Value::Int(10)]);
    }

    #[test]
    fn test_return_type_is_checked() {
        let symbols = SymbolTable::new();
        let exe = Executable::new("Bad", vec![], TypeRef::Boolean, vec![Stmt::ret(Expr::lit(1i64))]);
        assert!(matches!(
            invoke_executable(&exe, &[], &symbols),
            Err(SimError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_argument_type_is_checked() {
        let symbols = SymbolTable::new();
        let exe = classify();
        assert!(matches!(
            invoke_executable(&exe, &[Value::text("warm")], &symbols),
            Err(SimError::TypeMismatch(_))
        ));
    }
}
