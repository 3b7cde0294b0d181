use serde::Serialize;

/// Errors raised while loading or simulating an architecture model.
///
/// Every variant is cloneable and serializable so a failed step can be kept
/// verbatim inside its trace record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "detail")]
pub enum SimError {
    /// Reported by the external parser; carried through unchanged
    ParseTimeError(String),
    /// The model graph is structurally inconsistent (dangling names, bad flows)
    InvalidModel(String),
    /// A value does not conform to the declared type of its destination
    TypeMismatch(String),
    /// Send or receive attempted against a port of the wrong direction
    InvalidDirection {
        port: String,
        direction: String,
        operation: String,
    },
    /// Variable, field, port or element name could not be resolved
    UnresolvedReference(String),
    /// Operator token not understood by the evaluator
    UnsupportedOperator(String),
    /// Division or modulo by zero, integer overflow
    ArithmeticError(String),
    /// A contract evaluated to false
    ConstraintViolation {
        name: String,
        expression: String,
        evaluated: String,
    },
    /// An allocation names an activity, executable, action or target that does not exist
    MissingAllocation(String),
    /// Reaction cascade went deeper than the configured bound
    CascadeLimitExceeded { limit: usize },
}

impl SimError {
    /// Short, stable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            SimError::ParseTimeError(_) => "ParseTimeError",
            SimError::InvalidModel(_) => "InvalidModel",
            SimError::TypeMismatch(_) => "TypeMismatch",
            SimError::InvalidDirection { .. } => "InvalidDirection",
            SimError::UnresolvedReference(_) => "UnresolvedReference",
            SimError::UnsupportedOperator(_) => "UnsupportedOperator",
            SimError::ArithmeticError(_) => "ArithmeticError",
            SimError::ConstraintViolation { .. } => "ConstraintViolation",
            SimError::MissingAllocation(_) => "MissingAllocation",
            SimError::CascadeLimitExceeded { .. } => "CascadeLimitExceeded",
        }
    }

    /// Only a runaway cascade stops a whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, SimError::CascadeLimitExceeded { .. })
    }
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimError::ParseTimeError(msg) => write!(f, "Parse error: {}", msg),
            SimError::InvalidModel(msg) => write!(f, "Invalid model: {}", msg),
            SimError::TypeMismatch(msg) => write!(f, "Type mismatch: {}", msg),
            SimError::InvalidDirection { port, direction, operation } => write!(
                f,
                "Invalid direction: cannot {} on {} port '{}'",
                operation, direction, port
            ),
            SimError::UnresolvedReference(msg) => write!(f, "Unresolved reference: {}", msg),
            SimError::UnsupportedOperator(op) => write!(f, "Unsupported operator: '{}'", op),
            SimError::ArithmeticError(msg) => write!(f, "Arithmetic error: {}", msg),
            SimError::ConstraintViolation { name, expression, evaluated } => write!(
                f,
                "Constraint '{}' violated: {} ({})",
                name, expression, evaluated
            ),
            SimError::MissingAllocation(msg) => write!(f, "Missing allocation: {}", msg),
            SimError::CascadeLimitExceeded { limit } => {
                write!(f, "Cascade limit exceeded: more than {} nested reactions", limit)
            }
        }
    }
}

impl std::error::Error for SimError {}
