pub mod allocation;
pub mod config;
pub mod runtime;
pub mod simulation_engine;

// Re-export commonly used types
pub use allocation::{AllocationIndex, ConnectorFunctions};
pub use config::{ConcurrencyMode, SimulationConfig};
pub use runtime::Runtime;
pub use simulation_engine::{run_batch, SimulationEngine, SimulationInputs};
