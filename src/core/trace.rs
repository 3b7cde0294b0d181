use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

use crate::core::errors::SimError;
use crate::core::values::Value;

/// Kind of simulated step a trace record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// An executable ran (transform, activity body or orphan)
    Exec,
    /// A value arrived at a port
    Port,
    /// A protocol action ran
    Protocol,
    /// Anything else worth recording, typically a failure
    Log,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StepKind::Exec => "exec",
            StepKind::Port => "port",
            StepKind::Protocol => "protocol",
            StepKind::Log => "log",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub seq: u64,
    pub element: String,
    pub kind: StepKind,
    pub input: Option<Value>,
    pub output: Option<Value>,
    /// Microseconds since the run started
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SimError>,
}

impl TraceEntry {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Append-only, ordered record of every simulated step of one run
#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    run_id: Uuid,
    #[serde(skip_serializing)]
    started: Instant,
    entries: Vec<TraceEntry>,
}

impl Trace {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started: Instant::now(),
            entries: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Append a successful step and return its sequence number
    pub fn record(
        &mut self,
        element: &str,
        kind: StepKind,
        input: Option<Value>,
        output: Option<Value>,
    ) -> u64 {
        self.push(element, kind, input, output, None)
    }

    /// Append a failed step
    pub fn record_error(&mut self, element: &str, kind: StepKind, input: Option<Value>, error: SimError) -> u64 {
        self.push(element, kind, input, None, Some(error))
    }

    fn push(
        &mut self,
        element: &str,
        kind: StepKind,
        input: Option<Value>,
        output: Option<Value>,
        error: Option<SimError>,
    ) -> u64 {
        let seq = self.entries.len() as u64;
        self.entries.push(TraceEntry {
            seq,
            element: element.to_string(),
            kind,
            input,
            output,
            timestamp: self.started.elapsed().as_micros() as u64,
            error,
        });
        seq
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn of_kind(&self, kind: StepKind) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    pub fn errors(&self) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter().filter(|e| e.is_error())
    }

    /// Whether a fatal error stopped the run this trace belongs to
    pub fn halted(&self) -> bool {
        self.errors()
            .any(|e| e.error.as_ref().map_or(false, SimError::is_fatal))
    }

    /// One JSON object per line, in sequence order
    pub fn to_json_lines(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Human-readable narrative, one step per line
    pub fn narrative(&self) -> String {
        let mut out = format!("run {}\n", self.run_id);
        for entry in &self.entries {
            let input = entry.input.as_ref().map(Value::to_string).unwrap_or_default();
            let output = entry.output.as_ref().map(Value::to_string).unwrap_or_default();
            match &entry.error {
                Some(err) => out.push_str(&format!(
                    "#{:<4} [{}] {} FAILED {}\n",
                    entry.seq, entry.kind, entry.element, err
                )),
                None => out.push_str(&format!(
                    "#{:<4} [{}] {} ({}) -> {}\n",
                    entry.seq, entry.kind, entry.element, input, output
                )),
            }
        }
        out
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}
