use crate::value::{Value, ValueType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a port carries control flow or data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    Execution,
    Data,
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortKind::Execution => write!(f, "execution"),
            PortKind::Data => write!(f, "data"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => write!(f, "input"),
            PortDirection::Output => write!(f, "output"),
        }
    }
}

/// How many connections may attach to a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capacity {
    Single,
    Multi,
}

/// Successor policy of an execution output.
///
/// Connections leaving `Exclusive` outputs compete in one weighted choice per node
/// execution. A `Broadcast` output sends a token down every one of its connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanOut {
    #[default]
    Exclusive,
    Broadcast,
}

/// The compiled description of one port on a node.
#[derive(Debug, Clone, PartialEq)]
pub struct PortSpec {
    pub name: String,
    pub kind: PortKind,
    pub direction: PortDirection,
    pub value_type: ValueType,
    pub capacity: Capacity,
    pub default: Option<Value>,
    /// Branching weight, only meaningful on execution outputs.
    pub weight: f64,
    pub fan_out: FanOut,
}

impl PortSpec {
    fn new(name: &str, kind: PortKind, direction: PortDirection, capacity: Capacity) -> Self {
        Self {
            name: name.to_string(),
            kind,
            direction,
            value_type: ValueType::Any,
            capacity,
            default: None,
            weight: 1.0,
            fan_out: FanOut::Exclusive,
        }
    }

    pub fn execution_input(name: &str) -> Self {
        Self::new(name, PortKind::Execution, PortDirection::Input, Capacity::Multi)
    }

    pub fn execution_output(name: &str) -> Self {
        Self::new(name, PortKind::Execution, PortDirection::Output, Capacity::Multi)
    }

    pub fn data_input(name: &str, value_type: ValueType) -> Self {
        Self {
            value_type,
            ..Self::new(name, PortKind::Data, PortDirection::Input, Capacity::Single)
        }
    }

    pub fn data_output(name: &str, value_type: ValueType) -> Self {
        Self {
            value_type,
            ..Self::new(name, PortKind::Data, PortDirection::Output, Capacity::Multi)
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn broadcast(mut self) -> Self {
        self.fan_out = FanOut::Broadcast;
        self
    }

    pub fn is_execution(&self) -> bool {
        self.kind == PortKind::Execution
    }

    pub fn is_data(&self) -> bool {
        self.kind == PortKind::Data
    }

    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }

    pub fn is_output(&self) -> bool {
        self.direction == PortDirection::Output
    }
}
