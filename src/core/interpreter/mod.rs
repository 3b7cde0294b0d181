pub mod context;
pub mod evaluator;
pub mod executor;

pub use context::{Binding, Context};
pub use evaluator::evaluate;
pub use executor::{default_arguments, execute, invoke, invoke_executable};
