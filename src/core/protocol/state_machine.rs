use log::debug;
use std::collections::BTreeMap;

use crate::core::errors::SimError;
use crate::core::interpreter::{evaluate, Context};
use crate::core::model::elements::{ControlMode, Port, Protocol, ProtocolAction};
use crate::core::types::Direction;
use crate::core::values::{SymbolTable, Value};

/// Ports a protocol drives.
///
/// Implemented by a plain port map for standalone runs and by the simulation
/// runtime, where a send propagates through connectors.
pub trait ProtocolPorts {
    /// Direction of a port, or `None` when there is no such port
    fn direction(&self, port: &str) -> Option<Direction>;

    /// Value currently held by a port
    fn current(&self, port: &str) -> Option<Value>;

    /// Put a value on a port that may send
    fn send(&mut self, port: &str, value: Value) -> Result<(), SimError>;
}

impl ProtocolPorts for BTreeMap<String, Port> {
    fn direction(&self, port: &str) -> Option<Direction> {
        self.get(port).map(|p| p.direction)
    }

    fn current(&self, port: &str) -> Option<Value> {
        self.get(port).and_then(|p| p.value.clone())
    }

    fn send(&mut self, port: &str, value: Value) -> Result<(), SimError> {
        let slot = self
            .get_mut(port)
            .ok_or_else(|| SimError::UnresolvedReference(format!("port '{}' not found", port)))?;
        slot.value = Some(value);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    Idle,
    /// Zero-based iteration in progress
    Running(usize),
    Done,
}

/// Outcome of one protocol action
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub iteration: usize,
    /// `send` or `receive`
    pub action: &'static str,
    pub port: String,
    pub value: Value,
}

/// Executes the ordered actions of one protocol for as many iterations as
/// its control mode allows
pub struct ProtocolMachine<'p> {
    protocol: &'p Protocol,
    state: ProtocolState,
    /// Values bound by receive actions, visible to later send payloads
    variables: BTreeMap<String, Value>,
    results: Vec<ActionResult>,
}

impl<'p> ProtocolMachine<'p> {
    pub fn new(protocol: &'p Protocol) -> Self {
        Self {
            protocol,
            state: ProtocolState::Idle,
            variables: BTreeMap::new(),
            results: Vec::new(),
        }
    }

    /// Number of passes over the action list for a control mode
    pub fn iterations(control: ControlMode, max_iterations: usize) -> usize {
        match control {
            ControlMode::Once | ControlMode::Perhaps => 1,
            ControlMode::Several => max_iterations.min(3),
            ControlMode::Always => max_iterations,
        }
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// Actions completed so far, including those before a failure
    pub fn results(&self) -> &[ActionResult] {
        &self.results
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Run the protocol to completion.
    ///
    /// Stops at the first failing action, leaving the machine in the
    /// `Running` state of the iteration that failed.
    pub fn run(
        &mut self,
        ports: &mut dyn ProtocolPorts,
        symbols: &SymbolTable,
        max_iterations: usize,
    ) -> Result<&[ActionResult], SimError> {
        let protocol = self.protocol;
        let total = Self::iterations(protocol.control, max_iterations);
        for iteration in 0..total {
            self.state = ProtocolState::Running(iteration);
            for action in &protocol.actions {
                let result = self.step(action, iteration, ports, symbols)?;
                debug!(
                    "protocol '{}' #{} {} {} = {}",
                    protocol.name, iteration, result.action, result.port, result.value
                );
                self.results.push(result);
            }
        }
        self.state = ProtocolState::Done;
        Ok(&self.results)
    }

    fn step(
        &mut self,
        action: &ProtocolAction,
        iteration: usize,
        ports: &mut dyn ProtocolPorts,
        symbols: &SymbolTable,
    ) -> Result<ActionResult, SimError> {
        match action {
            ProtocolAction::Send { port, payload } => {
                let direction = Self::direction_of(ports, port)?;
                if !direction.can_send() {
                    return Err(self.direction_error(port, direction, "send"));
                }
                let ctx = Context::with_vars(symbols, self.variables.clone());
                let value = evaluate(payload, &ctx)?;
                ports.send(port, value.clone())?;
                Ok(ActionResult {
                    iteration,
                    action: "send",
                    port: port.clone(),
                    value,
                })
            }
            ProtocolAction::Receive { port, bind } => {
                let direction = Self::direction_of(ports, port)?;
                if !direction.can_receive() {
                    return Err(self.direction_error(port, direction, "receive"));
                }
                let value = ports.current(port).unwrap_or(Value::Unknown);
                if let Some(name) = bind {
                    self.variables.insert(name.clone(), value.clone());
                }
                Ok(ActionResult {
                    iteration,
                    action: "receive",
                    port: port.clone(),
                    value,
                })
            }
        }
    }

    fn direction_of(ports: &dyn ProtocolPorts, port: &str) -> Result<Direction, SimError> {
        ports
            .direction(port)
            .ok_or_else(|| SimError::UnresolvedReference(format!("port '{}' not found", port)))
    }

    fn direction_error(&self, port: &str, direction: Direction, operation: &str) -> SimError {
        let owner = self.protocol.component.as_deref().unwrap_or(&self.protocol.name);
        SimError::InvalidDirection {
            port: format!("{}.{}", owner, port),
            direction: direction.to_string(),
            operation: operation.to_string(),
        }
    }
}

/// Run a protocol once over a set of ports and return what each action did
pub fn execute(
    protocol: &Protocol,
    ports: &mut dyn ProtocolPorts,
    symbols: &SymbolTable,
    max_iterations: usize,
) -> Result<Vec<ActionResult>, SimError> {
    let mut machine = ProtocolMachine::new(protocol);
    machine.run(ports, symbols, max_iterations).map(<[ActionResult]>::to_vec)
}
