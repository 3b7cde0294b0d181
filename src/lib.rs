pub mod core;

// Re-export commonly used types
pub use crate::core::errors::SimError;
pub use crate::core::execution::{run_batch, ConcurrencyMode, SimulationConfig, SimulationEngine, SimulationInputs};
pub use crate::core::model::{Expr, Model, ModelBuilder, Stmt};
pub use crate::core::trace::{StepKind, Trace, TraceEntry};
pub use crate::core::types::{ComponentId, Direction, PortRef};
pub use crate::core::values::{SymbolTable, TypeRef, Value};
