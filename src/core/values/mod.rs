pub mod symbols;
pub mod value;

// Re-export all public types
pub use symbols::{SymbolTable, TypeRef};
pub use value::Value;
