pub mod connector;
pub mod manager;
pub mod port_validator;

pub use connector::{ConnectorQueue, Delivery};
pub use manager::{Binding, ConnectionManager, ConnectionStats};
pub use port_validator::PortValidator;
