pub mod state_machine;

pub use state_machine::{execute, ActionResult, ProtocolMachine, ProtocolPorts, ProtocolState};
