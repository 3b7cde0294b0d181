pub mod components;
pub mod connections;
pub mod constraints;
pub mod errors;
pub mod execution;
pub mod interpreter;
pub mod model;
pub mod protocol;
pub mod trace;
pub mod types;
pub mod values;
