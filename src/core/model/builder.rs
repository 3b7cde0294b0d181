use super::elements::{
    Activity, Allocation, Component, Connector, Constraint, Executable, Flow, Model, PortDelegation,
    Port, Protocol,
};
use crate::core::connections::PortValidator;
use crate::core::errors::SimError;
use crate::core::types::{ComponentId, Direction, PortRef};
use crate::core::values::{SymbolTable, TypeRef, Value};
use std::collections::HashSet;

/// Imperative API for assembling a model graph.
///
/// Stands in for the textual front end: hosts and tests declare components,
/// ports, connectors and behavior, then call [`ModelBuilder::build`], which
/// checks the structure before the engine ever sees it.
pub struct ModelBuilder {
    model: Model,
}

impl ModelBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            model: Model {
                name: name.to_string(),
                ..Model::default()
            },
        }
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.model.symbols
    }

    /// Add a component; adding an existing name keeps the first declaration
    pub fn add_component(&mut self, name: &str) -> ComponentId {
        self.model
            .components
            .entry(name.to_string())
            .or_insert_with(|| Component::new(name));
        name.to_string()
    }

    pub fn set_component_type(&mut self, component: &str, type_name: &str) -> Result<(), SimError> {
        self.component_mut(component)?.type_name = Some(type_name.to_string());
        Ok(())
    }

    /// Declare a port and return its handle
    pub fn add_port(
        &mut self,
        component: &str,
        port: &str,
        direction: Direction,
        ty: TypeRef,
    ) -> Result<PortRef, SimError> {
        let owner = self.component_mut(component)?;
        if owner.port(port).is_some() {
            return Err(SimError::InvalidModel(format!(
                "port '{}' declared twice on component '{}'",
                port, component
            )));
        }
        owner.ports.push(Port::new(component, port, direction, ty));
        Ok(PortRef::new(component, port))
    }

    /// Give a port a value before the run starts
    pub fn set_initial(&mut self, port: &PortRef, value: Value) -> Result<(), SimError> {
        let symbols = &self.model.symbols;
        let slot = self
            .model
            .components
            .get_mut(port.component())
            .and_then(|c| c.port_mut(port.port()))
            .ok_or_else(|| SimError::InvalidModel(format!("port '{}' not declared", port)))?;
        PortValidator::check_payload(symbols, slot, &value)?;
        slot.value = Some(value);
        Ok(())
    }

    /// Nest `child` inside the composite `parent`
    pub fn add_subcomponent(&mut self, parent: &str, child: &str) -> Result<(), SimError> {
        if !self.model.components.contains_key(child) {
            return Err(SimError::InvalidModel(format!("subcomponent '{}' not declared", child)));
        }
        self.component_mut(parent)?.subcomponents.push(child.to_string());
        Ok(())
    }

    /// Wire an outer port of a composite to a port of one of its subcomponents
    pub fn delegate_port(&mut self, parent: &str, outer: &str, inner: PortRef) -> Result<(), SimError> {
        let composite = self.component_mut(parent)?;
        if composite.port(outer).is_none() {
            return Err(SimError::InvalidModel(format!(
                "composite '{}' has no port '{}'",
                parent, outer
            )));
        }
        if !composite.subcomponents.iter().any(|c| c == inner.component()) {
            return Err(SimError::InvalidModel(format!(
                "'{}' is not a subcomponent of '{}'",
                inner.component(),
                parent
            )));
        }
        composite.delegations.push(PortDelegation {
            outer: outer.to_string(),
            inner,
        });
        Ok(())
    }

    pub fn add_connector(&mut self, name: &str, transform: Option<&str>, constraint: Option<&str>) {
        let connector = self
            .model
            .connectors
            .entry(name.to_string())
            .or_insert_with(|| Connector::new(name));
        connector.transform = transform.map(str::to_string);
        connector.constraint = constraint.map(str::to_string);
    }

    /// Bind two ports through a connector
    pub fn connect(&mut self, connector: &str, source: PortRef, target: PortRef, ty: TypeRef) -> Result<(), SimError> {
        let flow = Flow::new(source, target, ty);
        PortValidator::validate_flow(&self.model, &flow)?;
        let connector = self.model.connectors.get_mut(connector).ok_or_else(|| {
            SimError::InvalidModel(format!("connector '{}' not declared", connector))
        })?;
        connector.flows.push(flow);
        Ok(())
    }

    /// Append a flow to the run's delivery schedule
    pub fn add_flow(&mut self, source: PortRef, target: PortRef, ty: TypeRef) -> Result<(), SimError> {
        let flow = Flow::new(source, target, ty);
        PortValidator::validate_flow(&self.model, &flow)?;
        self.model.flows.push(flow);
        Ok(())
    }

    pub fn add_executable(&mut self, executable: Executable) {
        self.model.executables.insert(executable.name.clone(), executable);
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.model.constraints.insert(constraint.name.clone(), constraint);
    }

    pub fn add_activity(&mut self, activity: Activity) {
        self.model.activities.insert(activity.name.clone(), activity);
    }

    pub fn add_protocol(&mut self, protocol: Protocol) {
        self.model.protocols.insert(protocol.name.clone(), protocol);
    }

    /// Register an activity directly on a component
    pub fn register_activity(&mut self, component: &str, activity: &str) -> Result<(), SimError> {
        let owner = self.component_mut(component)?;
        if !owner.activities.iter().any(|a| a == activity) {
            owner.activities.push(activity.to_string());
        }
        Ok(())
    }

    /// Allocate an activity to a connector or a component
    pub fn allocate_activity(&mut self, activity: &str, target: &str) {
        self.model.allocations.push(Allocation::Activity {
            activity: activity.to_string(),
            target: target.to_string(),
        });
    }

    /// Allocate an executable to an activity action
    pub fn allocate_executable(&mut self, executable: &str, action: &str) {
        self.model.allocations.push(Allocation::Executable {
            executable: executable.to_string(),
            action: action.to_string(),
        });
    }

    /// Validate and hand over the finished model
    pub fn build(self) -> Result<Model, SimError> {
        validate_model(&self.model)?;
        Ok(self.model)
    }

    fn component_mut(&mut self, name: &str) -> Result<&mut Component, SimError> {
        self.model
            .components
            .get_mut(name)
            .ok_or_else(|| SimError::InvalidModel(format!("component '{}' not declared", name)))
    }
}

/// Structural checks a model must pass before it can be loaded.
///
/// Allocations are deliberately not checked here: unresolvable allocations
/// are reported per run as `MissingAllocation` trace entries.
pub fn validate_model(model: &Model) -> Result<(), SimError> {
    for (name, component) in &model.components {
        if component.name != *name {
            return Err(SimError::InvalidModel(format!(
                "component registered as '{}' is named '{}'",
                name, component.name
            )));
        }
        for port in &component.ports {
            if port.component != *name {
                return Err(SimError::InvalidModel(format!(
                    "port '{}' of '{}' points back to '{}'",
                    port.name, name, port.component
                )));
            }
        }
        for child in &component.subcomponents {
            if child == name || !model.components.contains_key(child) {
                return Err(SimError::InvalidModel(format!(
                    "component '{}' lists invalid subcomponent '{}'",
                    name, child
                )));
            }
        }
        for delegation in &component.delegations {
            if !component.subcomponents.iter().any(|c| c == delegation.inner.component()) {
                return Err(SimError::InvalidModel(format!(
                    "'{}' delegates '{}' to '{}', which is not one of its subcomponents",
                    name, delegation.outer, delegation.inner
                )));
            }
            PortValidator::resolve(model, &delegation.inner)?;
        }
        for activity in &component.activities {
            if !model.activities.contains_key(activity) {
                return Err(SimError::InvalidModel(format!(
                    "component '{}' registers unknown activity '{}'",
                    name, activity
                )));
            }
        }
    }

    check_containment(model)?;

    for connector in model.connectors.values() {
        for flow in &connector.flows {
            PortValidator::validate_flow(model, flow)?;
        }
        if let Some(transform) = &connector.transform {
            if !model.executables.contains_key(transform) {
                return Err(SimError::InvalidModel(format!(
                    "connector '{}' uses unknown transform '{}'",
                    connector.name, transform
                )));
            }
        }
        if let Some(constraint) = &connector.constraint {
            if !model.constraints.contains_key(constraint) {
                return Err(SimError::InvalidModel(format!(
                    "connector '{}' uses unknown constraint '{}'",
                    connector.name, constraint
                )));
            }
        }
    }

    for flow in &model.flows {
        PortValidator::validate_flow(model, flow)?;
    }

    for protocol in model.protocols.values() {
        if let Some(component) = &protocol.component {
            if !model.components.contains_key(component) {
                return Err(SimError::InvalidModel(format!(
                    "protocol '{}' is bound to unknown component '{}'",
                    protocol.name, component
                )));
            }
        }
    }

    Ok(())
}

/// Composites must nest as a tree: no component may contain itself,
/// directly or through its subcomponents
fn check_containment(model: &Model) -> Result<(), SimError> {
    let mut finished: HashSet<&str> = HashSet::new();
    for root in model.components.keys() {
        if finished.contains(root.as_str()) {
            continue;
        }
        // (component, index of the next child to visit)
        let mut path: Vec<(&str, usize)> = vec![(root.as_str(), 0)];
        while let Some((current, next)) = path.last().copied() {
            let children = model
                .components
                .get(current)
                .map(|c| c.subcomponents.as_slice())
                .unwrap_or_default();
            let Some(child) = children.get(next) else {
                finished.insert(current);
                path.pop();
                continue;
            };
            if let Some(top) = path.last_mut() {
                top.1 += 1;
            }
            if path.iter().any(|(name, _)| *name == child.as_str()) {
                return Err(SimError::InvalidModel(format!(
                    "component '{}' contains itself through '{}'",
                    child, current
                )));
            }
            if !finished.contains(child.as_str()) {
                path.push((child.as_str(), 0));
            }
        }
    }
    Ok(())
}
