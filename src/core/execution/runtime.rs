use log::{debug, warn};
use std::collections::{BTreeMap, HashSet, VecDeque};

use super::allocation::AllocationIndex;
use super::config::SimulationConfig;
use crate::core::components::reaction::{self, ReactionPlan};
use crate::core::connections::{ConnectionManager, Delivery, PortValidator};
use crate::core::constraints::{check_postcondition, check_precondition, constraint_context, validate};
use crate::core::errors::SimError;
use crate::core::interpreter::{default_arguments, invoke_executable};
use crate::core::model::elements::{Executable, Model, Protocol};
use crate::core::protocol::{ProtocolMachine, ProtocolPorts};
use crate::core::trace::{StepKind, Trace};
use crate::core::types::{Direction, PortRef};
use crate::core::values::Value;

/// Pending reaction of a component to data that landed on its ports.
///
/// Arrivals on the same component at the same depth share one reaction.
#[derive(Debug, Clone, PartialEq)]
struct Reaction {
    component: String,
    ports: Vec<String>,
    /// Hops from the delivery that started the cascade
    depth: usize,
}

/// Mutable state of one simulation run.
///
/// Owns the working copy of the model together with the connector queues,
/// the reaction work queue and the trace. Sends and receives only queue
/// reactions; `drain_reactions` runs them until the cascade settles.
pub struct Runtime {
    model: Model,
    connections: ConnectionManager,
    allocations: AllocationIndex,
    /// Allocations that could not be resolved when the model was indexed
    allocation_errors: Vec<SimError>,
    trace: Trace,
    config: SimulationConfig,
    reactions: VecDeque<Reaction>,
    /// Bindings that have carried a value during this run
    transmitted: HashSet<usize>,
    /// Cascade depth of the reaction currently executing
    depth: usize,
    halted: bool,
}

impl Runtime {
    pub fn new(model: Model, config: SimulationConfig) -> Self {
        let connections = ConnectionManager::from_model(&model);
        let (allocations, allocation_errors) = AllocationIndex::build(&model);
        debug!("runtime for '{}': {:?}", model.name, connections.stats());
        Self {
            model,
            connections,
            allocations,
            allocation_errors,
            trace: Trace::new(),
            config,
            reactions: VecDeque::new(),
            transmitted: HashSet::new(),
            depth: 0,
            halted: false,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn allocations(&self) -> &AllocationIndex {
        &self.allocations
    }

    /// Whether a fatal error stopped the current run
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Put a value on a port that may send and push it through every
    /// binding rooted there.
    ///
    /// Delivery failures are recorded in the trace and do not fail the send.
    pub fn send(&mut self, port: &PortRef, value: Value) -> Result<(), SimError> {
        let chain = self.send_chain(port, &value)?;
        self.send_along(&chain, value);
        Ok(())
    }

    /// The port followed by every composite port it is delegated outward
    /// to, each checked for sending `value`
    fn send_chain(&self, port: &PortRef, value: &Value) -> Result<Vec<PortRef>, SimError> {
        let limit = self.config.max_cascade_depth;
        let mut chain: Vec<PortRef> = Vec::new();
        let mut current = Some(port.clone());
        while let Some(port) = current {
            if chain.len() > limit {
                return Err(SimError::CascadeLimitExceeded { limit });
            }
            let resolved = PortValidator::resolve(&self.model, &port)?;
            PortValidator::check_send(resolved)?;
            PortValidator::check_payload(&self.model.symbols, resolved, value)?;
            current = self.delegating_outer(&port);
            chain.push(port);
        }
        Ok(chain)
    }

    /// Write a checked send chain, then transmit from each port in order
    fn send_along(&mut self, chain: &[PortRef], value: Value) {
        for port in chain {
            if let Some(slot) = self.model.port_mut(port) {
                slot.value = Some(value.clone());
            }
        }
        for port in chain {
            debug!("{} sends {}", port, value);
            for binding in self.connections.bindings_from(port) {
                if self.halted {
                    return;
                }
                self.transmit(binding, value.clone());
            }
        }
    }

    /// Queue a value on one binding and pump its connector
    pub fn transmit(&mut self, binding: usize, value: Value) {
        let Some(channel) = self.connections.binding(binding).map(|b| b.channel.clone()) else {
            warn!("transmit on unknown binding #{}", binding);
            return;
        };
        self.transmitted.insert(binding);
        self.connections
            .queue_mut(&channel)
            .enqueue(Delivery { binding, value });
        self.pump(&channel);
    }

    /// Deliver everything queued on a connector, in arrival order.
    ///
    /// A connector that is already delivering is left alone: the running
    /// loop picks the new value up.
    fn pump(&mut self, channel: &str) {
        if !self.connections.queue_mut(channel).begin() {
            debug!("connector '{}' busy, value queued", channel);
            return;
        }
        loop {
            let next = self.connections.queue_mut(channel).next();
            let Some(delivery) = next else {
                break;
            };
            let raw = delivery.value.clone();
            if let Err(err) = self.try_deliver(delivery) {
                self.record_failure(channel, StepKind::Log, Some(raw), err);
            }
            if self.halted {
                return;
            }
        }
        self.connections.queue_mut(channel).finish();
    }

    /// Transform, check and land one queued value
    fn try_deliver(&mut self, delivery: Delivery) -> Result<(), SimError> {
        let binding = self
            .connections
            .binding(delivery.binding)
            .cloned()
            .ok_or_else(|| SimError::UnresolvedReference(format!("binding #{}", delivery.binding)))?;
        let functions = binding
            .connector
            .as_deref()
            .and_then(|name| self.allocations.connector_functions(name))
            .cloned()
            .unwrap_or_default();

        let raw = delivery.value;
        let carried = match &functions.transform {
            Some(name) => self.run_transform(name, &raw)?,
            None => raw.clone(),
        };

        if let Some(name) = &functions.constraint {
            let constraint = self
                .model
                .constraints
                .get(name)
                .ok_or_else(|| SimError::UnresolvedReference(format!("constraint '{}'", name)))?;
            let ctx = constraint_context(constraint, &self.model.symbols, &[raw], &[carried.clone()]);
            validate(constraint, &ctx)?;
        }

        self.model.symbols.check(
            &carried,
            &binding.ty,
            &format!("flow {} -> {}", binding.source, binding.target),
        )?;
        self.receive(&binding.target, carried)
    }

    fn run_transform(&mut self, name: &str, raw: &Value) -> Result<Value, SimError> {
        let exe = self
            .model
            .executables
            .get(name)
            .ok_or_else(|| SimError::UnresolvedReference(format!("executable '{}'", name)))?;
        let args = [raw.clone()];
        let output = invoke_executable(exe, &args, &self.model.symbols)?.ok_or_else(|| {
            SimError::TypeMismatch(format!("transform '{}' returned no value", name))
        })?;
        self.trace
            .record(name, StepKind::Exec, Some(call_record(exe, &args)), Some(output.clone()));
        Ok(output)
    }

    /// Land a value on a port that may receive.
    ///
    /// Updates the port and its owner's state, forwards through composite
    /// delegations and queues a reaction of every owner. Nothing is written
    /// unless every port on the way accepts the value.
    pub fn receive(&mut self, port: &PortRef, value: Value) -> Result<(), SimError> {
        let targets = self.receive_targets(port, &value)?;
        for target in &targets {
            self.land(target, &value);
        }
        Ok(())
    }

    /// The port and the subcomponent ports it forwards to, depth first,
    /// each checked for receiving `value`
    fn receive_targets(&self, port: &PortRef, value: &Value) -> Result<Vec<PortRef>, SimError> {
        let limit = self.config.max_cascade_depth;
        let mut targets = Vec::new();
        let mut pending = vec![(port.clone(), 0usize)];
        while let Some((port, hops)) = pending.pop() {
            if hops > limit {
                return Err(SimError::CascadeLimitExceeded { limit });
            }
            let resolved = PortValidator::resolve(&self.model, &port)?;
            PortValidator::check_receive(resolved)?;
            PortValidator::check_payload(&self.model.symbols, resolved, value)?;
            if let Some(component) = self.model.components.get(port.component()) {
                pending.extend(
                    component
                        .delegations
                        .iter()
                        .rev()
                        .filter(|d| d.outer == port.port())
                        .map(|d| (d.inner.clone(), hops + 1)),
                );
            }
            targets.push(port);
        }
        Ok(targets)
    }

    fn land(&mut self, port: &PortRef, value: &Value) {
        if let Some(component) = self.model.components.get_mut(port.component()) {
            if let Some(slot) = component.port_mut(port.port()) {
                slot.value = Some(value.clone());
            }
            component.state.insert(port.port().to_string(), value.clone());
        }
        self.trace
            .record(&port.to_string(), StepKind::Port, None, Some(value.clone()));
        debug!("{} received {}", port, value);

        if !self.allocations.activities_for(port.component()).is_empty() {
            self.queue_reaction(port);
        }
    }

    fn queue_reaction(&mut self, port: &PortRef) {
        let depth = self.depth;
        let queued = self
            .reactions
            .iter_mut()
            .find(|r| r.component == port.component() && r.depth == depth);
        match queued {
            Some(reaction) => {
                if !reaction.ports.iter().any(|p| p == port.port()) {
                    reaction.ports.push(port.port().to_string());
                }
            }
            None => self.reactions.push_back(Reaction {
                component: port.component().to_string(),
                ports: vec![port.port().to_string()],
                depth,
            }),
        }
    }

    /// Outer port of the composite an inner port is delegated to, if it can send
    fn delegating_outer(&self, inner: &PortRef) -> Option<PortRef> {
        self.model.components.values().find_map(|composite| {
            composite
                .delegations
                .iter()
                .filter(|d| d.inner == *inner)
                .find(|d| composite.port(&d.outer).map_or(false, |p| p.direction.can_send()))
                .map(|d| PortRef::new(composite.name.clone(), d.outer.clone()))
        })
    }

    /// Run queued reactions until the cascade settles or the depth cap is hit
    pub fn drain_reactions(&mut self) {
        while let Some(reaction) = self.reactions.pop_front() {
            if self.halted {
                break;
            }
            if reaction.depth > self.config.max_cascade_depth {
                self.halt(SimError::CascadeLimitExceeded {
                    limit: self.config.max_cascade_depth,
                });
                break;
            }
            self.on_data_received(&reaction);
        }
    }

    /// Fire every ready activity of the component that reads one of the ports
    fn on_data_received(&mut self, pending: &Reaction) {
        let activities = self.allocations.activities_for(&pending.component).to_vec();
        let previous = self.depth;
        self.depth = pending.depth + 1;

        for activity in &activities {
            if self.halted {
                break;
            }
            match self.plan_reaction(pending, activity) {
                Ok(Some(plan)) => {
                    if let Err(err) = self.execute_activity(&plan) {
                        let input = self
                            .model
                            .executables
                            .get(&plan.executable)
                            .map(|exe| call_record(exe, &plan.args));
                        self.record_failure(&plan.executable, StepKind::Exec, input, err);
                    }
                }
                Ok(None) => debug!(
                    "{}: activity '{}' not triggered by {:?}",
                    pending.component, activity, pending.ports
                ),
                Err(err) => self.record_failure(activity, StepKind::Log, None, err),
            }
        }

        self.depth = previous;
    }

    /// Plan for the first pending port the activity reacts to
    fn plan_reaction(&self, pending: &Reaction, activity: &str) -> Result<Option<ReactionPlan>, SimError> {
        let Some(component) = self.model.components.get(&pending.component) else {
            return Ok(None);
        };
        for port in &pending.ports {
            if let Some(plan) = reaction::plan(&self.model, &self.allocations, component, activity, port)? {
                return Ok(Some(plan));
            }
        }
        Ok(None)
    }

    /// Invoke the activity's executable between its contract checks, then
    /// write the result back and send it on the output port
    fn execute_activity(&mut self, plan: &ReactionPlan) -> Result<(), SimError> {
        let exe = self.model.executables.get(&plan.executable).ok_or_else(|| {
            SimError::MissingAllocation(format!("executable '{}' does not exist", plan.executable))
        })?;
        let constraint = match &plan.constraint {
            Some(name) => Some(
                self.model
                    .constraints
                    .get(name)
                    .ok_or_else(|| SimError::UnresolvedReference(format!("constraint '{}'", name)))?,
            ),
            None => None,
        };

        if let Some(constraint) = constraint {
            let ctx = constraint_context(constraint, &self.model.symbols, &plan.args, &[]);
            check_precondition(constraint, &ctx)?;
        }
        let result = invoke_executable(exe, &plan.args, &self.model.symbols)?;
        self.trace.record(
            &plan.executable,
            StepKind::Exec,
            Some(call_record(exe, &plan.args)),
            result.clone(),
        );
        if let Some(constraint) = constraint {
            let outputs: Vec<Value> = result.iter().cloned().collect();
            let ctx = constraint_context(constraint, &self.model.symbols, &plan.args, &outputs);
            check_postcondition(constraint, &ctx)?;
        }

        let (Some(key), Some(value)) = (&plan.output_key, result) else {
            return Ok(());
        };
        let chain = match &plan.output_port {
            Some(port) => self.send_chain(port, &value)?,
            None => Vec::new(),
        };
        if let Some(component) = self.model.components.get_mut(&plan.component) {
            component.state.insert(key.clone(), value.clone());
        }
        self.send_along(&chain, value);
        Ok(())
    }

    /// Copy declared initial port values into their owners' state
    pub(crate) fn seed_initial_values(&mut self) {
        for component in self.model.components.values_mut() {
            let initial: Vec<(String, Value)> = component
                .ports
                .iter()
                .filter_map(|p| p.value.clone().map(|v| (p.name.clone(), v)))
                .collect();
            component.state.extend(initial);
        }
    }

    /// Seed one simulation input: in-ports receive it, out-ports just hold it
    pub(crate) fn seed_input(&mut self, qualified: &str, value: Value) {
        let outcome = PortRef::parse(qualified).and_then(|port| self.inject(&port, value.clone()));
        if let Err(err) = outcome {
            self.record_failure(qualified, StepKind::Log, Some(value), err);
        }
        self.drain_reactions();
    }

    fn inject(&mut self, port: &PortRef, value: Value) -> Result<(), SimError> {
        let resolved = PortValidator::resolve(&self.model, port)?;
        if resolved.direction.can_receive() {
            return self.receive(port, value);
        }
        PortValidator::check_payload(&self.model.symbols, resolved, &value)?;
        if let Some(component) = self.model.components.get_mut(port.component()) {
            if let Some(slot) = component.port_mut(port.port()) {
                slot.value = Some(value.clone());
            }
            component.state.insert(port.port().to_string(), value);
        }
        Ok(())
    }

    /// Walk the flow schedule, transmitting every source that holds a value.
    ///
    /// A binding that already carried a value earlier in the run is skipped.
    pub(crate) fn propagate_flows(&mut self) {
        for index in self.connections.schedule().to_vec() {
            if self.halted {
                break;
            }
            if self.transmitted.contains(&index) {
                debug!("binding #{} already carried its value", index);
                continue;
            }
            let value = self
                .connections
                .binding(index)
                .and_then(|binding| self.model.port(&binding.source))
                .and_then(|port| port.value.clone());
            if let Some(value) = value {
                self.transmit(index, value);
                self.drain_reactions();
            }
        }
    }

    /// Run every protocol bound to a component over that component's ports
    pub(crate) fn run_protocols(&mut self) {
        let bound: Vec<Protocol> = self
            .model
            .protocols
            .values()
            .filter(|p| p.component.is_some())
            .cloned()
            .collect();
        let symbols = self.model.symbols.clone();
        let max_iterations = self.config.protocol_max_iterations;

        for protocol in &bound {
            if self.halted {
                break;
            }
            let Some(component) = protocol.component.clone() else {
                continue;
            };
            let mut machine = ProtocolMachine::new(protocol);
            let outcome = {
                let mut ports = ComponentPorts {
                    runtime: &mut *self,
                    component,
                };
                machine.run(&mut ports, &symbols, max_iterations).map(|_| ())
            };
            for result in machine.results() {
                self.trace.record(
                    &protocol.name,
                    StepKind::Protocol,
                    Some(Value::text(format!("{} {}", result.action, result.port))),
                    Some(result.value.clone()),
                );
            }
            match outcome {
                Err(_) if self.halted => break,
                Err(err) => self.record_failure(&protocol.name, StepKind::Protocol, None, err),
                Ok(()) => {}
            }
        }
    }

    /// Invoke every executable no allocation or connector drives
    pub(crate) fn run_orphans(&mut self, supplied: &BTreeMap<String, Vec<Value>>) {
        let orphans: Vec<String> = self
            .model
            .executables
            .keys()
            .filter(|name| !self.allocations.is_referenced(name))
            .cloned()
            .collect();

        for name in orphans {
            if self.halted {
                break;
            }
            let Some(exe) = self.model.executables.get(&name) else {
                continue;
            };
            let args = supplied
                .get(&name)
                .cloned()
                .unwrap_or_else(|| default_arguments(exe, &self.model.symbols));
            let input = call_record(exe, &args);
            match invoke_executable(exe, &args, &self.model.symbols) {
                Ok(output) => {
                    self.trace.record(&name, StepKind::Exec, Some(input), output);
                }
                Err(err) => self.record_failure(&name, StepKind::Exec, Some(input), err),
            }
        }
    }

    /// Record allocations that could not be resolved
    pub(crate) fn report_allocation_errors(&mut self) {
        for err in self.allocation_errors.clone() {
            self.record_failure("allocation", StepKind::Log, None, err);
        }
    }

    /// Host entry point: send on a port that may send, otherwise receive,
    /// then let the cascade settle.
    ///
    /// Returns `false` when the value could not be injected or the cascade
    /// had to be stopped.
    pub fn send_to_port(&mut self, qualified: &str, value: Value) -> bool {
        self.halted = false;
        let outcome = PortRef::parse(qualified).and_then(|port| {
            let can_send = PortValidator::resolve(&self.model, &port)?.direction.can_send();
            if can_send {
                self.send(&port, value.clone())
            } else {
                self.receive(&port, value.clone())
            }
        });
        match outcome {
            Ok(()) => {
                self.drain_reactions();
                !self.halted
            }
            Err(err) => {
                self.record_failure(qualified, StepKind::Log, Some(value), err);
                false
            }
        }
    }

    fn record_failure(&mut self, element: &str, kind: StepKind, input: Option<Value>, err: SimError) {
        if err.is_fatal() {
            self.halt(err);
            return;
        }
        warn!("{} failed: {}", element, err);
        self.trace.record_error(element, kind, input, err);
    }

    /// Stop the run: record the error and drop all pending work
    fn halt(&mut self, err: SimError) {
        warn!("run of '{}' halted: {}", self.model.name, err);
        self.trace.record_error(&self.model.name, StepKind::Log, None, err);
        self.reactions.clear();
        self.connections.abort_all();
        self.halted = true;
    }
}

/// Argument record of a call: parameter name -> argument
fn call_record(exe: &Executable, args: &[Value]) -> Value {
    Value::record(
        exe.params
            .iter()
            .map(|p| p.name.clone())
            .zip(args.iter().cloned()),
    )
}

/// Ports of one component as seen by a protocol running inside a simulation
struct ComponentPorts<'r> {
    runtime: &'r mut Runtime,
    component: String,
}

impl ProtocolPorts for ComponentPorts<'_> {
    fn direction(&self, port: &str) -> Option<Direction> {
        self.runtime
            .model
            .components
            .get(&self.component)
            .and_then(|c| c.port(port))
            .map(|p| p.direction)
    }

    fn current(&self, port: &str) -> Option<Value> {
        self.runtime
            .model
            .components
            .get(&self.component)
            .and_then(|c| c.port(port))
            .and_then(|p| p.value.clone())
    }

    fn send(&mut self, port: &str, value: Value) -> Result<(), SimError> {
        if self.runtime.halted {
            return Err(SimError::CascadeLimitExceeded {
                limit: self.runtime.config.max_cascade_depth,
            });
        }
        let target = PortRef::new(self.component.clone(), port);
        self.runtime.send(&target, value)?;
        self.runtime.drain_reactions();
        Ok(())
    }
}
