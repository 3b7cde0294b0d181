//! Decides whether and how an activity reacts to data arriving on a port.
//!
//! Planning is read-only over the model; the runtime carries the plan out.

use crate::core::errors::SimError;
use crate::core::execution::allocation::AllocationIndex;
use crate::core::model::elements::{Activity, Component, Model};
use crate::core::types::PortRef;
use crate::core::values::{SymbolTable, Value};

/// Everything needed to run one activity once
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionPlan {
    pub component: String,
    pub activity: String,
    pub executable: String,
    /// Constraint of the action, checked around the executable
    pub constraint: Option<String>,
    pub args: Vec<Value>,
    /// State key the result is written to
    pub output_key: Option<String>,
    /// Port the result is sent on
    pub output_port: Option<PortRef>,
}

/// Port an activity pin reads from or writes to: its delegation, else a
/// port of the same name
fn pin_port<'c>(activity: &'c Activity, component: &'c Component, pin: &'c str) -> Option<&'c str> {
    activity
        .port_for_pin(pin)
        .or_else(|| component.port(pin).map(|p| p.name.as_str()))
}

/// Ports feeding the activity's inputs
pub fn input_ports<'c>(activity: &'c Activity, component: &'c Component) -> Vec<&'c str> {
    activity
        .inputs
        .iter()
        .filter_map(|param| pin_port(activity, component, &param.name))
        .filter(|port| component.port(port).map_or(false, |p| p.direction.can_receive()))
        .collect()
}

/// An activity reacts to a port it reads, or to any port when it reads none
pub fn is_interested(activity: &Activity, component: &Component, port: &str) -> bool {
    let inputs = input_ports(activity, component);
    inputs.is_empty() || inputs.contains(&port)
}

/// All port-fed inputs have a value in the component state
pub fn is_ready(activity: &Activity, component: &Component) -> bool {
    input_ports(activity, component)
        .iter()
        .all(|port| component.state.contains_key(*port))
}

/// Argument list for the activity's executable, in input order
pub fn bind_inputs(activity: &Activity, component: &Component, symbols: &SymbolTable) -> Vec<Value> {
    activity
        .inputs
        .iter()
        .map(|param| {
            let from_port = pin_port(activity, component, &param.name).and_then(|p| component.state.get(p));
            from_port
                .or_else(|| component.state.get(&param.name))
                .cloned()
                .or_else(|| param.default.clone())
                .unwrap_or_else(|| symbols.default_for(&param.ty))
        })
        .collect()
}

/// Plan the reaction of one activity to data on `port`.
///
/// Returns `Ok(None)` when the activity does not read that port or is still
/// waiting for some of its inputs.
pub fn plan(
    model: &Model,
    allocations: &AllocationIndex,
    component: &Component,
    activity_name: &str,
    port: &str,
) -> Result<Option<ReactionPlan>, SimError> {
    let activity = model.activities.get(activity_name).ok_or_else(|| {
        SimError::MissingAllocation(format!(
            "activity '{}' registered on '{}' does not exist",
            activity_name, component.name
        ))
    })?;

    if !is_interested(activity, component, port) || !is_ready(activity, component) {
        return Ok(None);
    }

    let action = activity.actions.first().ok_or_else(|| {
        SimError::MissingAllocation(format!("activity '{}' has no actions", activity.name))
    })?;
    let executable = allocations.executable_for_action(&action.name).ok_or_else(|| {
        SimError::MissingAllocation(format!(
            "no executable allocated to action '{}' of activity '{}'",
            action.name, activity.name
        ))
    })?;

    let output = activity.outputs.first();
    let output_key = output.map(|param| param.name.clone());
    let output_port = output
        .and_then(|param| pin_port(activity, component, &param.name))
        .filter(|port| component.port(port).map_or(false, |p| p.direction.can_send()))
        .map(|port| PortRef::new(component.name.clone(), port));

    Ok(Some(ReactionPlan {
        component: component.name.clone(),
        activity: activity.name.clone(),
        executable: executable.to_string(),
        constraint: action.constraint.clone(),
        args: bind_inputs(activity, component, &model.symbols),
        output_key,
        output_port,
    }))
}
