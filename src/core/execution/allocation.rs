use log::debug;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::core::errors::SimError;
use crate::core::model::elements::{Allocation, Model};
use crate::core::types::ComponentId;

/// Transform and constraint a connector applies to what it carries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectorFunctions {
    pub transform: Option<String>,
    pub constraint: Option<String>,
}

/// Allocations resolved into direct name lookups.
///
/// Built once per model so reactions and deliveries never rescan the
/// allocation list.
#[derive(Debug, Default)]
pub struct AllocationIndex {
    /// Action name -> executable backing it
    action_executables: HashMap<String, String>,
    /// Executables named by an allocation or used as a connector transform
    referenced_executables: HashSet<String>,
    connector_functions: HashMap<String, ConnectorFunctions>,
    /// Activities registered on each component, in firing order
    component_activities: BTreeMap<ComponentId, Vec<String>>,
}

impl AllocationIndex {
    /// Resolve every allocation of the model.
    ///
    /// Allocations that cannot be resolved are skipped and returned as
    /// `MissingAllocation` errors for the caller to report.
    pub fn build(model: &Model) -> (Self, Vec<SimError>) {
        let mut index = Self::default();
        let mut problems = Vec::new();

        for (name, component) in &model.components {
            index
                .component_activities
                .insert(name.clone(), component.activities.clone());
        }

        // Executable -> action first: connector allocations below read it
        for allocation in &model.allocations {
            if let Allocation::Executable { executable, action } = allocation {
                if !model.executables.contains_key(executable) {
                    problems.push(SimError::MissingAllocation(format!(
                        "executable '{}' allocated to action '{}' does not exist",
                        executable, action
                    )));
                    continue;
                }
                let action_exists = model
                    .activities
                    .values()
                    .any(|a| a.actions.iter().any(|act| act.name == *action));
                if !action_exists {
                    problems.push(SimError::MissingAllocation(format!(
                        "action '{}' targeted by executable '{}' does not exist",
                        action, executable
                    )));
                    continue;
                }
                index.action_executables.insert(action.clone(), executable.clone());
                index.referenced_executables.insert(executable.clone());
            }
        }

        for connector in model.connectors.values() {
            if let Some(transform) = &connector.transform {
                index.referenced_executables.insert(transform.clone());
            }
            index.connector_functions.insert(
                connector.name.clone(),
                ConnectorFunctions {
                    transform: connector.transform.clone(),
                    constraint: connector.constraint.clone(),
                },
            );
        }

        for allocation in &model.allocations {
            if let Allocation::Activity { activity, target } = allocation {
                let Some(resolved) = model.activities.get(activity) else {
                    problems.push(SimError::MissingAllocation(format!(
                        "activity '{}' allocated to '{}' does not exist",
                        activity, target
                    )));
                    continue;
                };
                if let Some(functions) = index.connector_functions.get_mut(target) {
                    let action = resolved.actions.first();
                    let executable = action.and_then(|a| index.action_executables.get(&a.name));
                    // Functions declared on the connector itself take precedence
                    if functions.transform.is_none() {
                        functions.transform = executable.cloned();
                    }
                    if functions.constraint.is_none() {
                        functions.constraint = action.and_then(|a| a.constraint.clone());
                    }
                    debug!(
                        "activity '{}' realised by connector '{}' as {:?}",
                        activity, target, functions
                    );
                } else if let Some(registered) = index.component_activities.get_mut(target) {
                    if !registered.contains(activity) {
                        registered.push(activity.clone());
                    }
                } else {
                    problems.push(SimError::MissingAllocation(format!(
                        "activity '{}' allocated to unknown connector or component '{}'",
                        activity, target
                    )));
                }
            }
        }

        (index, problems)
    }

    pub fn executable_for_action(&self, action: &str) -> Option<&str> {
        self.action_executables.get(action).map(String::as_str)
    }

    pub fn connector_functions(&self, connector: &str) -> Option<&ConnectorFunctions> {
        self.connector_functions.get(connector)
    }

    pub fn activities_for(&self, component: &str) -> &[String] {
        self.component_activities
            .get(component)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether some allocation or connector already drives this executable
    pub fn is_referenced(&self, executable: &str) -> bool {
        self.referenced_executables.contains(executable)
    }
}
