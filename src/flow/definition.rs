use crate::graph::{FanOut, PortDirection, PortKind};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// The complete, canonical definition of a flow, ready for compilation.
/// This is the target structure for any custom data model conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub name: String,
    pub nodes: Vec<FlowNodeDefinition>,
    pub edges: Vec<FlowEdgeDefinition>,
}

impl FlowDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_node(mut self, node: FlowNodeDefinition) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_edge(mut self, edge: FlowEdgeDefinition) -> Self {
        self.edges.push(edge);
        self
    }
}

/// Defines a single node in the flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowNodeDefinition {
    pub id: String,
    pub node_type: String,
    /// Display metadata; only used in logs and traces.
    #[serde(default)]
    pub label: Option<String>,
    /// Literal configuration read by the node type when it is instantiated.
    #[serde(default)]
    pub properties: AHashMap<String, serde_json::Value>,
    /// Extra ports (for node types that accept them) or overrides of built-in ports.
    #[serde(default)]
    pub ports: Vec<PortDefinition>,
    /// Name of the sub-flow invoked by a call node.
    #[serde(default)]
    pub subflow: Option<String>,
}

impl FlowNodeDefinition {
    pub fn new(id: &str, node_type: &str) -> Self {
        Self {
            id: id.to_string(),
            node_type: node_type.to_string(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_property(mut self, name: &str, value: serde_json::Value) -> Self {
        self.properties.insert(name.to_string(), value);
        self
    }

    pub fn with_port(mut self, port: PortDefinition) -> Self {
        self.ports.push(port);
        self
    }

    pub fn with_subflow(mut self, name: &str) -> Self {
        self.subflow = Some(name.to_string());
        self
    }
}

/// Authoring-side description of a port.
///
/// When a node type already declares a port with the same name and direction, only
/// the optional fields given here are applied on top of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortDefinition {
    pub name: String,
    pub kind: PortKind,
    pub direction: PortDirection,
    #[serde(default)]
    pub value_type: Option<String>,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub fan_out: Option<FanOut>,
}

impl PortDefinition {
    fn new(name: &str, kind: PortKind, direction: PortDirection) -> Self {
        Self {
            name: name.to_string(),
            kind,
            direction,
            value_type: None,
            default: None,
            weight: None,
            fan_out: None,
        }
    }

    pub fn execution_input(name: &str) -> Self {
        Self::new(name, PortKind::Execution, PortDirection::Input)
    }

    pub fn execution_output(name: &str) -> Self {
        Self::new(name, PortKind::Execution, PortDirection::Output)
    }

    pub fn data_input(name: &str, value_type: &str) -> Self {
        Self {
            value_type: Some(value_type.to_string()),
            ..Self::new(name, PortKind::Data, PortDirection::Input)
        }
    }

    pub fn data_output(name: &str, value_type: &str) -> Self {
        Self {
            value_type: Some(value_type.to_string()),
            ..Self::new(name, PortKind::Data, PortDirection::Output)
        }
    }

    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn broadcast(mut self) -> Self {
        self.fan_out = Some(FanOut::Broadcast);
        self
    }
}

/// Defines a connection between two nodes in the flow.
///
/// Handles are port names: `source_handle` names an output of `source`,
/// `target_handle` an input of `target`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEdgeDefinition {
    pub source: String,
    pub source_handle: String,
    pub target: String,
    pub target_handle: String,
}

impl FlowEdgeDefinition {
    pub fn new(source: &str, source_handle: &str, target: &str, target_handle: &str) -> Self {
        Self {
            source: source.to_string(),
            source_handle: source_handle.to_string(),
            target: target.to_string(),
            target_handle: target_handle.to_string(),
        }
    }
}
