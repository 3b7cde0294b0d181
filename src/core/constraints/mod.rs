pub mod validator;

pub use validator::{
    check_expression, check_postcondition, check_precondition, constraint_context, validate,
    ContractPhase,
};
