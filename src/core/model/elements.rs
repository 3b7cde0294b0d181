use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ast::{Expr, Stmt};
use crate::core::types::{ComponentId, Direction, PortRef};
use crate::core::values::{SymbolTable, TypeRef, Value};

/// Directional typed attachment point on a component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    pub direction: Direction,
    /// Owning component, kept as a name back-reference
    pub component: ComponentId,
    pub ty: TypeRef,
    pub value: Option<Value>,
}

impl Port {
    pub fn new(component: &str, name: &str, direction: Direction, ty: TypeRef) -> Self {
        Self {
            name: name.to_string(),
            direction,
            component: component.to_string(),
            ty,
            value: None,
        }
    }

    pub fn port_ref(&self) -> PortRef {
        PortRef::new(self.component.clone(), self.name.clone())
    }
}

/// Outer port of a composite forwarding to (or from) a subcomponent port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDelegation {
    pub outer: String,
    pub inner: PortRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: ComponentId,
    pub type_name: Option<String>,
    pub ports: Vec<Port>,
    /// Activities registered on this component, in firing order
    pub activities: Vec<String>,
    pub state: BTreeMap<String, Value>,
    pub subcomponents: Vec<ComponentId>,
    pub delegations: Vec<PortDelegation>,
}

impl Component {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: None,
            ports: Vec::new(),
            activities: Vec::new(),
            state: BTreeMap::new(),
            subcomponents: Vec::new(),
            delegations: Vec::new(),
        }
    }

    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name == name)
    }

    pub fn port_mut(&mut self, name: &str) -> Option<&mut Port> {
        self.ports.iter_mut().find(|p| p.name == name)
    }

    pub fn is_composite(&self) -> bool {
        !self.subcomponents.is_empty()
    }
}

/// Directed edge between two ports carrying a declared payload type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub source: PortRef,
    pub target: PortRef,
    pub ty: TypeRef,
}

impl Flow {
    pub fn new(source: PortRef, target: PortRef, ty: TypeRef) -> Self {
        Self { source, target, ty }
    }
}

/// Mediator between bound ports; may transform and constrain what it carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub name: String,
    pub flows: Vec<Flow>,
    pub transform: Option<String>,
    pub constraint: Option<String>,
}

impl Connector {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            flows: Vec::new(),
            transform: None,
            constraint: None,
        }
    }
}

/// Named, typed parameter with an optional default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
    pub default: Option<Value>,
}

impl Param {
    pub fn new(name: &str, ty: TypeRef) -> Self {
        Self {
            name: name.to_string(),
            ty,
            default: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Step of an activity body; backed by the executable allocated to its name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub constraint: Option<String>,
}

/// Activity pin wired to a port of the owning component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinDelegation {
    pub pin: String,
    pub port: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    pub inputs: Vec<Param>,
    pub outputs: Vec<Param>,
    pub actions: Vec<Action>,
    pub delegations: Vec<PinDelegation>,
}

impl Activity {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            actions: Vec::new(),
            delegations: Vec::new(),
        }
    }

    /// Port a pin is delegated to, if any
    pub fn port_for_pin(&self, pin: &str) -> Option<&str> {
        self.delegations
            .iter()
            .find(|d| d.pin == pin)
            .map(|d| d.port.as_str())
    }
}

/// Function with typed parameters and a statement body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Executable {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: TypeRef,
    pub body: Vec<Stmt>,
}

impl Executable {
    pub fn new(name: &str, params: Vec<Param>, return_type: TypeRef, body: Vec<Stmt>) -> Self {
        Self {
            name: name.to_string(),
            params,
            return_type,
            body,
        }
    }
}

/// Pre/postcondition pair over named inputs and outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub precondition: Option<Expr>,
    pub postcondition: Option<Expr>,
}

impl Constraint {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            precondition: None,
            postcondition: None,
        }
    }
}

/// Repetition mode of a protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    Once,
    Several,
    Always,
    Perhaps,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProtocolAction {
    /// Send the payload (a literal or a protocol variable) on a port
    Send { port: String, payload: Expr },
    /// Read a port's current value, optionally binding it to a variable
    Receive { port: String, bind: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    pub name: String,
    /// Component whose ports the protocol drives during a run
    pub component: Option<ComponentId>,
    pub actions: Vec<ProtocolAction>,
    pub control: ControlMode,
}

/// Declared mapping from an abstract element to its implementer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Allocation {
    /// Activity realised by a connector (transform + constraint) or registered on a component
    Activity { activity: String, target: String },
    /// Executable backing an activity action
    Executable { executable: String, action: String },
}

/// Root registry of a parsed architecture model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub components: BTreeMap<ComponentId, Component>,
    pub connectors: BTreeMap<String, Connector>,
    pub activities: BTreeMap<String, Activity>,
    pub executables: BTreeMap<String, Executable>,
    pub constraints: BTreeMap<String, Constraint>,
    pub protocols: BTreeMap<String, Protocol>,
    /// Delivery schedule of a run; empty means every connector flow in order
    pub flows: Vec<Flow>,
    pub allocations: Vec<Allocation>,
    pub symbols: SymbolTable,
}

impl Model {
    pub fn port(&self, port: &PortRef) -> Option<&Port> {
        self.components.get(port.component()).and_then(|c| c.port(port.port()))
    }

    pub fn port_mut(&mut self, port: &PortRef) -> Option<&mut Port> {
        self.components
            .get_mut(port.component())
            .and_then(|c| c.port_mut(port.port()))
    }
}
