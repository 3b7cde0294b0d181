use crate::core::errors::SimError;
use crate::core::model::elements::{Flow, Model, Port};
use crate::core::types::PortRef;
use crate::core::values::{SymbolTable, Value};

/// Port validation utilities for flows, sends and receives
pub struct PortValidator;

impl PortValidator {
    /// Look up a port, failing with `UnresolvedReference` when it does not exist
    pub fn resolve<'m>(model: &'m Model, port: &PortRef) -> Result<&'m Port, SimError> {
        let component = model.components.get(port.component()).ok_or_else(|| {
            SimError::UnresolvedReference(format!("component '{}' not found", port.component()))
        })?;
        component.port(port.port()).ok_or_else(|| {
            let valid: Vec<&str> = component.ports.iter().map(|p| p.name.as_str()).collect();
            SimError::UnresolvedReference(format!(
                "port '{}' not found on component '{}'. Valid ports: {:?}",
                port.port(),
                port.component(),
                valid
            ))
        })
    }

    /// A port may only send when its direction is `out` or `inout`
    pub fn check_send(port: &Port) -> Result<(), SimError> {
        if port.direction.can_send() {
            Ok(())
        } else {
            Err(Self::direction_error(port, "send"))
        }
    }

    /// A port may only receive when its direction is `in` or `inout`
    pub fn check_receive(port: &Port) -> Result<(), SimError> {
        if port.direction.can_receive() {
            Ok(())
        } else {
            Err(Self::direction_error(port, "receive"))
        }
    }

    /// Validate that a port exists and can be the source of a flow
    pub fn validate_source_port<'m>(model: &'m Model, port: &PortRef) -> Result<&'m Port, SimError> {
        let resolved = Self::resolve(model, port)?;
        Self::check_send(resolved)?;
        Ok(resolved)
    }

    /// Validate that a port exists and can be the target of a flow
    pub fn validate_target_port<'m>(model: &'m Model, port: &PortRef) -> Result<&'m Port, SimError> {
        let resolved = Self::resolve(model, port)?;
        Self::check_receive(resolved)?;
        Ok(resolved)
    }

    /// Both ends of a flow must exist and face the right way
    pub fn validate_flow(model: &Model, flow: &Flow) -> Result<(), SimError> {
        Self::validate_source_port(model, &flow.source)?;
        Self::validate_target_port(model, &flow.target)?;
        Ok(())
    }

    /// Payload check performed before a value lands on a port
    pub fn check_payload(symbols: &SymbolTable, port: &Port, value: &Value) -> Result<(), SimError> {
        symbols.check(value, &port.ty, &format!("port '{}'", port.port_ref()))
    }

    fn direction_error(port: &Port, operation: &str) -> SimError {
        SimError::InvalidDirection {
            port: port.port_ref().to_string(),
            direction: port.direction.to_string(),
            operation: operation.to_string(),
        }
    }
}
