use crate::error::CompileError;
use crate::flow::{FlowDefinition, FlowNodeDefinition, PortDefinition};
use crate::graph::{
    Capacity, Connection, FanOut, Graph, Node, NodeIndex, NodeRole, PortDirection, PortKind,
    PortSpec,
};
use crate::node::NodeType;
use crate::value::{Value, ValueType};
use ahash::{AHashMap, AHashSet};
use std::sync::Arc;

/// Builds one [`Graph`] from a `FlowDefinition` whose sub-flows are already compiled.
pub(super) struct GraphBuilder<'a> {
    flow: &'a FlowDefinition,
    registry: &'a AHashMap<String, Box<dyn NodeType>>,
    subgraphs: &'a AHashMap<String, Arc<Graph>>,
}

impl<'a> GraphBuilder<'a> {
    pub(super) fn new(
        flow: &'a FlowDefinition,
        registry: &'a AHashMap<String, Box<dyn NodeType>>,
        subgraphs: &'a AHashMap<String, Arc<Graph>>,
    ) -> Self {
        Self {
            flow,
            registry,
            subgraphs,
        }
    }

    pub(super) fn build(self) -> Result<Graph, CompileError> {
        let mut nodes = Vec::with_capacity(self.flow.nodes.len());
        let mut index_by_id: AHashMap<&str, NodeIndex> = AHashMap::new();

        for def in &self.flow.nodes {
            if index_by_id.insert(def.id.as_str(), nodes.len()).is_some() {
                return Err(CompileError::DuplicateNode(def.id.clone()));
            }
            nodes.push(self.build_node(def)?);
        }

        let connections = self.build_connections(&nodes, &index_by_id)?;
        Ok(Graph::new(self.flow.name.clone(), nodes, connections))
    }

    fn build_node(&self, def: &FlowNodeDefinition) -> Result<Node, CompileError> {
        let node_type =
            self.registry
                .get(&def.node_type)
                .ok_or_else(|| CompileError::InvalidNodeType {
                    node_id: def.id.clone(),
                    type_name: def.node_type.clone(),
                })?;
        let role = node_type.role();
        let mut ports = node_type.ports(def)?;

        let subgraph = match (role, &def.subflow) {
            (NodeRole::SubgraphCall, Some(name)) => {
                let graph = self.subgraphs.get(name).cloned().ok_or_else(|| {
                    CompileError::SubflowNotFound {
                        name: name.clone(),
                        node_id: def.id.clone(),
                    }
                })?;
                ports.extend(call_ports(&graph));
                Some(graph)
            }
            (NodeRole::SubgraphCall, None) => {
                return Err(invalid_property(
                    def,
                    "subflow",
                    "call nodes must name the sub-flow they invoke",
                ));
            }
            (_, Some(_)) => {
                return Err(invalid_property(
                    def,
                    "subflow",
                    "only call nodes can invoke a sub-flow",
                ));
            }
            (_, None) => None,
        };

        for declared in &def.ports {
            apply_declared_port(def, node_type.as_ref(), role, &mut ports, declared)?;
        }
        check_duplicate_ports(def, &ports)?;

        Ok(Node {
            id: def.id.clone(),
            node_type: def.node_type.clone(),
            label: def.label.clone(),
            role,
            ports,
            subgraph,
            logic: node_type.instantiate(def)?,
        })
    }

    fn build_connections(
        &self,
        nodes: &[Node],
        index_by_id: &AHashMap<&str, NodeIndex>,
    ) -> Result<Vec<Connection>, CompileError> {
        let mut connections: Vec<Connection> = Vec::with_capacity(self.flow.edges.len());

        for edge in &self.flow.edges {
            let from = *index_by_id.get(edge.source.as_str()).ok_or_else(|| {
                CompileError::NodeNotFound {
                    missing_node_id: edge.source.clone(),
                    source_node_id: edge.target.clone(),
                }
            })?;
            let to = *index_by_id.get(edge.target.as_str()).ok_or_else(|| {
                CompileError::NodeNotFound {
                    missing_node_id: edge.target.clone(),
                    source_node_id: edge.source.clone(),
                }
            })?;

            let output = nodes[from]
                .port(&edge.source_handle, PortDirection::Output)
                .ok_or_else(|| CompileError::PortNotFound {
                    node_id: edge.source.clone(),
                    port: edge.source_handle.clone(),
                    direction: PortDirection::Output.to_string(),
                })?;
            let input = nodes[to]
                .port(&edge.target_handle, PortDirection::Input)
                .ok_or_else(|| CompileError::PortNotFound {
                    node_id: edge.target.clone(),
                    port: edge.target_handle.clone(),
                    direction: PortDirection::Input.to_string(),
                })?;

            if output.kind != input.kind {
                return Err(CompileError::ConnectionError {
                    source_node_id: edge.source.clone(),
                    source_port: edge.source_handle.clone(),
                    target_node_id: edge.target.clone(),
                    target_port: edge.target_handle.clone(),
                    message: format!(
                        "{} output cannot feed a {} input",
                        output.kind, input.kind
                    ),
                });
            }
            if output.is_data() && !output.value_type.is_assignable_to(&input.value_type) {
                return Err(CompileError::TypeMismatch {
                    source_node_id: edge.source.clone(),
                    source_port: edge.source_handle.clone(),
                    target_node_id: edge.target.clone(),
                    target_port: edge.target_handle.clone(),
                    expected: input.value_type.clone(),
                    found: output.value_type.clone(),
                });
            }

            // A single-capacity port keeps only its most recent connection.
            if input.capacity == Capacity::Single {
                connections.retain(|c| {
                    let superseded = c.to == to && c.to_port == edge.target_handle;
                    if superseded {
                        tracing::warn!(
                            node = %edge.target,
                            port = %edge.target_handle,
                            previous = %nodes[c.from].id,
                            "single-capacity input reconnected, dropping previous connection"
                        );
                    }
                    !superseded
                });
            }
            if output.capacity == Capacity::Single {
                connections.retain(|c| {
                    let superseded = c.from == from && c.from_port == edge.source_handle;
                    if superseded {
                        tracing::warn!(
                            node = %edge.source,
                            port = %edge.source_handle,
                            previous = %nodes[c.to].id,
                            "single-capacity output reconnected, dropping previous connection"
                        );
                    }
                    !superseded
                });
            }

            connections.push(Connection {
                from,
                from_port: edge.source_handle.clone(),
                to,
                to_port: edge.target_handle.clone(),
            });
        }

        Ok(connections)
    }
}

/// Ports a call node exposes for its sub-graph: the entry node's outputs become the
/// call node's inputs, the exit nodes' inputs become its outputs.
fn call_ports(graph: &Graph) -> Vec<PortSpec> {
    let mut ports: Vec<PortSpec> = Vec::new();

    if let Some(entry) = graph.subgraph_entry() {
        for port in graph.node(entry).ports.iter().filter(|p| p.is_output()) {
            let capacity = if port.is_data() {
                Capacity::Single
            } else {
                Capacity::Multi
            };
            ports.push(PortSpec {
                direction: PortDirection::Input,
                capacity,
                weight: 1.0,
                fan_out: FanOut::Exclusive,
                ..port.clone()
            });
        }
    }

    for exit in graph.subgraph_exits() {
        for port in exit.ports.iter().filter(|p| p.is_input()) {
            let known = ports
                .iter()
                .any(|p| p.name == port.name && p.direction == PortDirection::Output);
            if !known {
                ports.push(PortSpec {
                    direction: PortDirection::Output,
                    capacity: Capacity::Multi,
                    ..port.clone()
                });
            }
        }
    }

    ports
}

fn apply_declared_port(
    def: &FlowNodeDefinition,
    node_type: &dyn NodeType,
    role: NodeRole,
    ports: &mut Vec<PortSpec>,
    declared: &PortDefinition,
) -> Result<(), CompileError> {
    let value_type = declared
        .value_type
        .as_deref()
        .map(|name| {
            ValueType::parse(name).ok_or_else(|| {
                invalid_property(
                    def,
                    &format!("ports.{}", declared.name),
                    &format!("unknown value type '{}'", name),
                )
            })
        })
        .transpose()?;

    let existing = ports
        .iter()
        .position(|p| p.name == declared.name && p.direction == declared.direction);

    let index = match existing {
        Some(index) => {
            let kind = ports[index].kind;
            if kind != declared.kind {
                return Err(invalid_property(
                    def,
                    &format!("ports.{}", declared.name),
                    &format!(
                        "declared as a {} port but the node type defines a {} port",
                        declared.kind, kind
                    ),
                ));
            }
            index
        }
        None if node_type.accepts_declared_ports() => {
            let allowed = match role {
                NodeRole::SubgraphEntry => declared.direction == PortDirection::Output,
                NodeRole::SubgraphExit => declared.direction == PortDirection::Input,
                _ => true,
            };
            if !allowed {
                return Err(invalid_property(
                    def,
                    &format!("ports.{}", declared.name),
                    &format!("this node type cannot declare {} ports", declared.direction),
                ));
            }
            ports.push(new_port(declared));
            ports.len() - 1
        }
        None => {
            return Err(CompileError::PortNotFound {
                node_id: def.id.clone(),
                port: declared.name.clone(),
                direction: declared.direction.to_string(),
            });
        }
    };

    let port = &mut ports[index];
    if let Some(value_type) = value_type {
        port.value_type = value_type;
    }
    if let Some(default) = &declared.default {
        port.default = Some(Value::from(default));
    }
    if let Some(weight) = declared.weight {
        port.weight = weight;
    }
    if let Some(fan_out) = declared.fan_out {
        port.fan_out = fan_out;
    }
    Ok(())
}

fn new_port(declared: &PortDefinition) -> PortSpec {
    let name = declared.name.as_str();
    match (declared.kind, declared.direction) {
        (PortKind::Execution, PortDirection::Input) => PortSpec::execution_input(name),
        (PortKind::Execution, PortDirection::Output) => PortSpec::execution_output(name),
        (PortKind::Data, PortDirection::Input) => PortSpec::data_input(name, ValueType::Any),
        (PortKind::Data, PortDirection::Output) => PortSpec::data_output(name, ValueType::Any),
    }
}

fn check_duplicate_ports(def: &FlowNodeDefinition, ports: &[PortSpec]) -> Result<(), CompileError> {
    let mut seen = AHashSet::new();
    for port in ports {
        if !seen.insert((port.name.as_str(), port.direction)) {
            return Err(CompileError::DuplicatePort {
                node_id: def.id.clone(),
                port: port.name.clone(),
                direction: port.direction.to_string(),
            });
        }
    }
    Ok(())
}

fn invalid_property(def: &FlowNodeDefinition, property: &str, message: &str) -> CompileError {
    CompileError::InvalidProperty {
        node_id: def.id.clone(),
        property: property.to_string(),
        message: message.to_string(),
    }
}
