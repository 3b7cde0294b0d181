use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::config::{ConcurrencyMode, SimulationConfig};
use super::runtime::Runtime;
use crate::core::errors::SimError;
use crate::core::model::builder::validate_model;
use crate::core::model::elements::Model;
use crate::core::trace::Trace;
use crate::core::types::PortRef;
use crate::core::values::Value;

/// Values a run is seeded with
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationInputs {
    /// Qualified `Component.port` names and the value each receives, in order
    #[serde(default)]
    pub ports: Vec<(String, Value)>,
    /// Arguments for executables run on their own
    #[serde(default)]
    pub executables: BTreeMap<String, Vec<Value>>,
}

impl SimulationInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_port(mut self, qualified: &str, value: impl Into<Value>) -> Self {
        self.ports.push((qualified.to_string(), value.into()));
        self
    }

    pub fn with_executable(mut self, name: &str, args: Vec<Value>) -> Self {
        self.executables.insert(name.to_string(), args);
        self
    }
}

/// Handle on a loaded model.
///
/// Every `run` starts from the loaded model again with a fresh trace;
/// `send_to_port` keeps working on the state the last run left behind and
/// appends to its trace.
pub struct SimulationEngine {
    model: Model,
    inputs: SimulationInputs,
    config: SimulationConfig,
    runtime: Runtime,
}

impl SimulationEngine {
    /// Validate a model and prepare it for simulation
    pub fn load(model: Model) -> Result<Self, SimError> {
        Self::load_with_config(model, SimulationConfig::default())
    }

    pub fn load_with_config(model: Model, config: SimulationConfig) -> Result<Self, SimError> {
        validate_model(&model)?;
        info!(
            "loaded model '{}': {} components, {} connectors, {} executables",
            model.name,
            model.components.len(),
            model.connectors.len(),
            model.executables.len()
        );
        let runtime = Runtime::new(model.clone(), config.clone());
        Ok(Self {
            model,
            inputs: SimulationInputs::default(),
            config,
            runtime,
        })
    }

    /// Seed values used by every subsequent run
    pub fn with_inputs(mut self, inputs: SimulationInputs) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn set_inputs(&mut self, inputs: SimulationInputs) {
        self.inputs = inputs;
    }

    /// Simulate the model once and return the trace of the run.
    ///
    /// Steps: report unresolved allocations, seed initial values and inputs,
    /// propagate the flow schedule, run component protocols, then invoke the
    /// executables nothing else drives. A fatal error skips the remaining
    /// steps.
    pub fn run(&mut self) -> Trace {
        self.runtime = Runtime::new(self.model.clone(), self.config.clone());
        let runtime = &mut self.runtime;

        runtime.report_allocation_errors();
        runtime.seed_initial_values();
        for (qualified, value) in &self.inputs.ports {
            if runtime.is_halted() {
                break;
            }
            runtime.seed_input(qualified, value.clone());
        }
        debug!("'{}': inputs seeded", self.model.name);

        if !runtime.is_halted() {
            runtime.propagate_flows();
        }
        if !runtime.is_halted() {
            runtime.run_protocols();
        }
        if !runtime.is_halted() {
            runtime.run_orphans(&self.inputs.executables);
        }

        let trace = runtime.trace();
        let failures = trace.errors().count();
        if runtime.is_halted() {
            warn!("run {} of '{}' halted after {} steps", trace.run_id(), self.model.name, trace.len());
        } else {
            info!(
                "run {} of '{}' finished: {} steps, {} failed",
                trace.run_id(),
                self.model.name,
                trace.len(),
                failures
            );
        }
        trace.clone()
    }

    /// Inject a value at a port after loading or between runs.
    ///
    /// Sends when the port may send, receives otherwise; the resulting
    /// cascade runs to completion. Returns `false` when the value could not
    /// be injected or the cascade was stopped.
    pub fn send_to_port(&mut self, qualified: &str, value: Value) -> bool {
        self.runtime.send_to_port(qualified, value)
    }

    /// Trace of the latest run, including later `send_to_port` steps
    pub fn trace(&self) -> &Trace {
        self.runtime.trace()
    }

    /// Model as the latest run left it
    pub fn model(&self) -> &Model {
        self.runtime.model()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn port_value(&self, qualified: &str) -> Option<Value> {
        let port = PortRef::parse(qualified).ok()?;
        self.runtime.model().port(&port).and_then(|p| p.value.clone())
    }

    pub fn component_state(&self, component: &str) -> Option<&BTreeMap<String, Value>> {
        self.runtime.model().components.get(component).map(|c| &c.state)
    }
}

/// Simulate independent models, one run each, in job order.
///
/// Runs share nothing, so with `ConcurrencyMode::Rayon` they are spread over
/// a thread pool. Results come back in the order the jobs were given.
pub fn run_batch(jobs: Vec<(Model, SimulationInputs)>, config: &SimulationConfig) -> Vec<Result<Trace, SimError>> {
    let run_one = |(model, inputs): (Model, SimulationInputs)| -> Result<Trace, SimError> {
        let mut engine = SimulationEngine::load_with_config(model, config.clone())?.with_inputs(inputs);
        Ok(engine.run())
    };

    match config.concurrency_mode {
        ConcurrencyMode::Sequential => jobs.into_iter().map(run_one).collect(),
        ConcurrencyMode::Rayon => {
            let Some(size) = config.thread_pool_size else {
                return jobs.into_par_iter().map(run_one).collect();
            };
            match ThreadPoolBuilder::new().num_threads(size).build() {
                Ok(pool) => pool.install(|| jobs.into_par_iter().map(run_one).collect()),
                Err(err) => {
                    warn!("thread pool of {} could not be built ({}), using the global pool", size, err);
                    jobs.into_par_iter().map(run_one).collect()
                }
            }
        }
    }
}
