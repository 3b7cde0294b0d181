use std::collections::{HashMap, HashSet};

use super::connector::ConnectorQueue;
use crate::core::model::elements::Model;
use crate::core::types::PortRef;
use crate::core::values::TypeRef;

/// Directed edge between two ports, optionally mediated by a connector
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub source: PortRef,
    pub target: PortRef,
    pub connector: Option<String>,
    pub ty: TypeRef,
    /// Queue the binding's deliveries go through: the connector's, or a
    /// private one for connector-less flows
    pub channel: String,
}

impl Binding {
    fn new(source: PortRef, target: PortRef, connector: Option<String>, ty: TypeRef) -> Self {
        let channel = match &connector {
            Some(name) => name.clone(),
            None => format!("{}->{}", source, target),
        };
        Self {
            source,
            target,
            connector,
            ty,
            channel,
        }
    }
}

/// Binding index and connector queues of one loaded model.
///
/// Built once per model: bindings rooted at a port are looked up in O(1)
/// during propagation, and each connector owns exactly one queue shared by
/// all the flows it carries.
pub struct ConnectionManager {
    bindings: Vec<Binding>,
    /// Source port -> indices of bindings rooted at it
    outgoing: HashMap<PortRef, Vec<usize>>,
    queues: HashMap<String, ConnectorQueue>,
    /// Bindings the driver walks when propagating a run's flows
    schedule: Vec<usize>,
}

impl ConnectionManager {
    /// Index every connector flow, then every declared flow no connector carries
    pub fn from_model(model: &Model) -> Self {
        let mut manager = Self {
            bindings: Vec::new(),
            outgoing: HashMap::new(),
            queues: HashMap::new(),
            schedule: Vec::new(),
        };

        for connector in model.connectors.values() {
            for flow in &connector.flows {
                manager.add_binding(Binding::new(
                    flow.source.clone(),
                    flow.target.clone(),
                    Some(connector.name.clone()),
                    flow.ty.clone(),
                ));
            }
        }

        if model.flows.is_empty() {
            manager.schedule = (0..manager.bindings.len()).collect();
        } else {
            for flow in &model.flows {
                let existing = manager
                    .bindings
                    .iter()
                    .position(|b| b.source == flow.source && b.target == flow.target);
                let index = match existing {
                    Some(index) => index,
                    None => manager.add_binding(Binding::new(
                        flow.source.clone(),
                        flow.target.clone(),
                        None,
                        flow.ty.clone(),
                    )),
                };
                manager.schedule.push(index);
            }
        }

        manager
    }

    fn add_binding(&mut self, binding: Binding) -> usize {
        let index = self.bindings.len();
        self.outgoing
            .entry(binding.source.clone())
            .or_insert_with(Vec::new)
            .push(index);
        self.queues.entry(binding.channel.clone()).or_default();
        self.bindings.push(binding);
        index
    }

    /// Indices of bindings rooted at a port, in declaration order
    pub fn bindings_from(&self, port: &PortRef) -> Vec<usize> {
        self.outgoing.get(port).cloned().unwrap_or_default()
    }

    pub fn binding(&self, index: usize) -> Option<&Binding> {
        self.bindings.get(index)
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn schedule(&self) -> &[usize] {
        &self.schedule
    }

    pub fn queue_mut(&mut self, channel: &str) -> &mut ConnectorQueue {
        self.queues.entry(channel.to_string()).or_default()
    }

    /// Drop every pending delivery on every connector
    pub fn abort_all(&mut self) {
        for queue in self.queues.values_mut() {
            queue.abort();
        }
    }

    /// Get connection statistics
    pub fn stats(&self) -> ConnectionStats {
        let connectors: HashSet<&String> = self
            .bindings
            .iter()
            .filter_map(|b| b.connector.as_ref())
            .collect();
        ConnectionStats {
            bindings: self.bindings.len(),
            connectors: connectors.len(),
            direct_flows: self.bindings.iter().filter(|b| b.connector.is_none()).count(),
            scheduled: self.schedule.len(),
        }
    }
}

/// Connection statistics for debugging
#[derive(Debug, PartialEq)]
pub struct ConnectionStats {
    pub bindings: usize,
    pub connectors: usize,
    pub direct_flows: usize,
    pub scheduled: usize,
}
