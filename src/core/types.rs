use serde::{Deserialize, Serialize};

use crate::core::errors::SimError;

/// Component names are the keys of the model registry
pub type ComponentId = String;

/// Direction of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
    InOut,
}

impl Direction {
    /// Whether values may leave through a port of this direction
    pub fn can_send(&self) -> bool {
        matches!(self, Direction::Out | Direction::InOut)
    }

    /// Whether values may arrive through a port of this direction
    pub fn can_receive(&self) -> bool {
        matches!(self, Direction::In | Direction::InOut)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
            Direction::InOut => "inout",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle naming one port of one component, written `Component.port`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRef {
    pub(crate) component: ComponentId,
    pub(crate) port: String,
}

impl PortRef {
    /// Create a new port handle
    pub fn new(component: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            port: port.into(),
        }
    }

    /// Parse a qualified `Component.port` name.
    ///
    /// The split happens at the last dot so component names produced for
    /// nested instances (`Parent.child`) stay intact.
    pub fn parse(qualified: &str) -> Result<Self, SimError> {
        match qualified.rsplit_once('.') {
            Some((component, port)) if !component.is_empty() && !port.is_empty() => {
                Ok(Self::new(component, port))
            }
            _ => Err(SimError::UnresolvedReference(format!(
                "'{}' is not a qualified port name (expected Component.port)",
                qualified
            ))),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn port(&self) -> &str {
        &self.port
    }
}

impl std::fmt::Display for PortRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.component, self.port)
    }
}
