//! Expression and statement trees of executable bodies and contracts.
//!
//! Operators are kept as the tokens the parser produced; the evaluator maps
//! them onto [`BinaryOp`] / [`UnaryOp`] when it runs, so an unknown token
//! surfaces as `UnsupportedOperator` at evaluation time.

use serde::{Deserialize, Serialize};

use crate::core::errors::SimError;
use crate::core::values::{TypeRef, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Numeric, string or boolean constant
    Literal(Value),
    /// `Enum::Literal`, or a bare literal resolved through the symbol table
    EnumLiteral {
        enum_name: Option<String>,
        literal: String,
    },
    /// Record constructor; each field is itself an expression
    ObjectLiteral {
        type_name: Option<String>,
        fields: Vec<(String, Expr)>,
    },
    Variable(String),
    FieldAccess {
        object: Box<Expr>,
        field: String,
    },
    Unary {
        op: String,
        operand: Box<Expr>,
    },
    Binary {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn var(name: &str) -> Self {
        Expr::Variable(name.to_string())
    }

    pub fn field(object: Expr, field: &str) -> Self {
        Expr::FieldAccess {
            object: Box::new(object),
            field: field.to_string(),
        }
    }

    pub fn unary(op: &str, operand: Expr) -> Self {
        Expr::Unary {
            op: op.to_string(),
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: &str, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op: op.to_string(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn enum_lit(enum_name: Option<&str>, literal: &str) -> Self {
        Expr::EnumLiteral {
            enum_name: enum_name.map(str::to_string),
            literal: literal.to_string(),
        }
    }

    pub fn object(type_name: Option<&str>, fields: Vec<(&str, Expr)>) -> Self {
        Expr::ObjectLiteral {
            type_name: type_name.map(str::to_string),
            fields: fields.into_iter().map(|(k, e)| (k.to_string(), e)).collect(),
        }
    }

    /// Render the expression as source text, letting `subst` replace any
    /// sub-expression by its own text (used to show evaluated operands).
    pub fn render_with(&self, subst: &dyn Fn(&Expr) -> Option<String>) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0, subst);
        out
    }

    fn render_into(&self, out: &mut String, parent_prec: u8, subst: &dyn Fn(&Expr) -> Option<String>) {
        if let Some(text) = subst(self) {
            out.push_str(&text);
            return;
        }
        match self {
            Expr::Literal(v) => out.push_str(&v.to_string()),
            Expr::EnumLiteral { enum_name: Some(e), literal } => {
                out.push_str(&format!("{}::{}", e, literal))
            }
            Expr::EnumLiteral { enum_name: None, literal } => out.push_str(literal),
            Expr::ObjectLiteral { type_name, fields } => {
                if let Some(t) = type_name {
                    out.push_str(t);
                    out.push(' ');
                }
                out.push('{');
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(name);
                    out.push_str(" = ");
                    value.render_into(out, 0, subst);
                }
                out.push('}');
            }
            Expr::Variable(name) => out.push_str(name),
            Expr::FieldAccess { object, field } => {
                object.render_into(out, UNARY_PREC + 1, subst);
                out.push('.');
                out.push_str(field);
            }
            Expr::Unary { op, operand } => {
                out.push_str(op);
                operand.render_into(out, UNARY_PREC, subst);
            }
            Expr::Binary { op, left, right } => {
                let prec = BinaryOp::parse(op).map(|o| o.precedence()).unwrap_or(0);
                let wrap = prec < parent_prec;
                if wrap {
                    out.push('(');
                }
                left.render_into(out, prec, subst);
                out.push(' ');
                out.push_str(op);
                out.push(' ');
                // Left-associative: an equal-precedence right child needs parentheses
                right.render_into(out, prec + 1, subst);
                if wrap {
                    out.push(')');
                }
            }
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render_with(&|_| None))
    }
}

const UNARY_PREC: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    And,
    Or,
    Implies,
}

impl BinaryOp {
    /// Map a parser token onto an operator. `=` in expression position is a
    /// comparison; assignment never reaches the evaluator.
    pub fn parse(token: &str) -> Result<Self, SimError> {
        Ok(match token {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            ">" => BinaryOp::Gt,
            "<" => BinaryOp::Lt,
            ">=" => BinaryOp::Ge,
            "<=" => BinaryOp::Le,
            "==" | "=" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "&&" | "and" => BinaryOp::And,
            "||" | "or" => BinaryOp::Or,
            "implies" | "->" => BinaryOp::Implies,
            other => return Err(SimError::UnsupportedOperator(other.to_string())),
        })
    }

    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Implies => 1,
            BinaryOp::Or => 2,
            BinaryOp::And => 3,
            BinaryOp::Eq | BinaryOp::Ne => 4,
            BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Le => 5,
            BinaryOp::Add | BinaryOp::Sub => 6,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    pub fn parse(token: &str) -> Result<Self, SimError> {
        match token {
            "!" | "not" => Ok(UnaryOp::Not),
            "-" => Ok(UnaryOp::Neg),
            other => Err(SimError::UnsupportedOperator(other.to_string())),
        }
    }
}

/// Statements of an executable body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `let name: ty = init;`; without an initializer the type default is bound
    VariableDecl {
        name: String,
        ty: Option<TypeRef>,
        init: Option<Expr>,
    },
    /// `name = value;` on an existing binding
    Assign { target: String, value: Expr },
    /// `if (c) {..} else if (c) {..} else {..}`
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_ifs: Vec<(Expr, Vec<Stmt>)>,
        else_branch: Option<Vec<Stmt>>,
    },
    Return(Expr),
}

impl Stmt {
    pub fn let_(name: &str, ty: Option<TypeRef>, init: Option<Expr>) -> Self {
        Stmt::VariableDecl {
            name: name.to_string(),
            ty,
            init,
        }
    }

    pub fn assign(target: &str, value: Expr) -> Self {
        Stmt::Assign {
            target: target.to_string(),
            value,
        }
    }

    pub fn if_(condition: Expr, then_branch: Vec<Stmt>) -> Self {
        Stmt::If {
            condition,
            then_branch,
            else_ifs: Vec::new(),
            else_branch: None,
        }
    }

    /// Append an `else if` arm to an `If` statement; other statements are returned unchanged
    pub fn else_if(mut self, condition: Expr, body: Vec<Stmt>) -> Self {
        if let Stmt::If { else_ifs, .. } = &mut self {
            else_ifs.push((condition, body));
        }
        self
    }

    /// Attach the `else` arm to an `If` statement
    pub fn otherwise(mut self, body: Vec<Stmt>) -> Self {
        if let Stmt::If { else_branch, .. } = &mut self {
            *else_branch = Some(body);
        }
        self
    }

    pub fn ret(value: Expr) -> Self {
        Stmt::Return(value)
    }
}
