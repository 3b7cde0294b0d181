pub mod ast;
pub mod builder;
pub mod elements;

// Re-export commonly used types
pub use ast::{BinaryOp, Expr, Stmt, UnaryOp};
pub use builder::{validate_model, ModelBuilder};
pub use elements::{
    Action, Activity, Allocation, Component, Connector, Constraint, ControlMode, Executable, Flow,
    Model, Param, PinDelegation, Port, PortDelegation, Protocol, ProtocolAction,
};
