//! The contract between the executor and node implementations.
//!
//! Every node type registers a static schema (its ports and role) and a factory for
//! its logic through [`NodeType`]. The logic itself ([`NodeLogic`]) is immutable: all
//! values it reads and writes during one execution go through the [`NodeContext`],
//! which the executor backs with the per-step data frame.

use crate::error::{CompileError, NodeError};
use crate::executor::branching;
use crate::executor::token::{ExecutionToken, TokenIds};
use crate::flow::FlowNodeDefinition;
use crate::graph::{Connection, FanOut, Node, NodeRef, NodeRole, OutputKey, PortDirection, PortSpec};
use crate::value::Value;
use ahash::AHashMap;
use rand::rngs::StdRng;
use std::any::Any;
use std::sync::Arc;

/// The opaque handle of whatever object runs the graph.
pub type HostHandle = Arc<dyn Any + Send + Sync>;

/// What a node asks the executor to do after it ran.
#[derive(Debug)]
pub enum Flow {
    /// Derive successors from every execution output.
    Continue,
    /// Derive successors from one named execution output only.
    Follow(String),
    /// Use exactly these tokens as successors.
    Tokens(Vec<ExecutionToken>),
    /// Yield nothing. The node has handed its continuation to an external scheduler
    /// which will resume it through `GraphExecutor::continue_flow`.
    Suspend,
}

/// Behavior of a node. Called for execution nodes when a token reaches them and for
/// data nodes when a downstream node pulls one of their outputs.
pub trait NodeLogic: Send + Sync {
    fn execute(&self, ctx: &mut NodeContext<'_>) -> Result<Flow, NodeError>;
}

impl<F> NodeLogic for F
where
    F: Fn(&mut NodeContext<'_>) -> Result<Flow, NodeError> + Send + Sync,
{
    fn execute(&self, ctx: &mut NodeContext<'_>) -> Result<Flow, NodeError> {
        self(ctx)
    }
}

/// Static registration of a node type: its ports, its role and how to build its logic.
pub trait NodeType: Send + Sync {
    fn type_name(&self) -> &str;

    fn role(&self) -> NodeRole {
        NodeRole::Regular
    }

    /// The ports of a node of this type. May depend on the node's properties.
    fn ports(&self, node: &FlowNodeDefinition) -> Result<Vec<PortSpec>, CompileError>;

    /// Whether the definition may add ports of its own on top of [`NodeType::ports`].
    fn accepts_declared_ports(&self) -> bool {
        false
    }

    fn instantiate(&self, node: &FlowNodeDefinition) -> Result<Arc<dyn NodeLogic>, CompileError>;
}

/// A node type assembled at runtime from a fixed port list and a shared logic value.
///
/// ```rust
/// use nagare::prelude::*;
///
/// let double = NodeSchema::from_fn("doubleNode", |ctx: &mut NodeContext<'_>| {
///     let x = ctx.input_f64("x")?;
///     ctx.set_output("y", x * 2.0);
///     Ok(Flow::Continue)
/// })
/// .port(PortSpec::data_input("x", ValueType::Float))
/// .port(PortSpec::data_output("y", ValueType::Float));
/// # let _ = double;
/// ```
pub struct NodeSchema {
    type_name: String,
    role: NodeRole,
    ports: Vec<PortSpec>,
    logic: Arc<dyn NodeLogic>,
}

impl NodeSchema {
    pub fn new(type_name: &str, logic: impl NodeLogic + 'static) -> Self {
        Self {
            type_name: type_name.to_string(),
            role: NodeRole::Regular,
            ports: Vec::new(),
            logic: Arc::new(logic),
        }
    }

    pub fn from_fn<F>(type_name: &str, logic: F) -> Self
    where
        F: Fn(&mut NodeContext<'_>) -> Result<Flow, NodeError> + Send + Sync + 'static,
    {
        Self::new(type_name, logic)
    }

    pub fn port(mut self, port: PortSpec) -> Self {
        self.ports.push(port);
        self
    }

    pub fn with_role(mut self, role: NodeRole) -> Self {
        self.role = role;
        self
    }
}

impl NodeType for NodeSchema {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn role(&self) -> NodeRole {
        self.role
    }

    fn ports(&self, _node: &FlowNodeDefinition) -> Result<Vec<PortSpec>, CompileError> {
        Ok(self.ports.clone())
    }

    fn instantiate(&self, _node: &FlowNodeDefinition) -> Result<Arc<dyn NodeLogic>, CompileError> {
        Ok(self.logic.clone())
    }
}

static NULL: Value = Value::Null;

/// Everything a node may see and touch while it executes.
pub struct NodeContext<'a> {
    node: &'a NodeRef,
    triggered: &'a str,
    inputs: AHashMap<String, Value>,
    outputs: AHashMap<String, Value>,
    token: &'a ExecutionToken,
    host: &'a HostHandle,
    ids: &'a TokenIds,
    rng: &'a mut StdRng,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(
        node: &'a NodeRef,
        triggered: &'a str,
        inputs: AHashMap<String, Value>,
        token: &'a ExecutionToken,
        host: &'a HostHandle,
        ids: &'a TokenIds,
        rng: &'a mut StdRng,
    ) -> Self {
        Self {
            node,
            triggered,
            inputs,
            outputs: AHashMap::new(),
            token,
            host,
            ids,
            rng,
        }
    }

    pub(crate) fn into_outputs(self) -> AHashMap<String, Value> {
        self.outputs
    }

    pub fn node(&self) -> &Node {
        self.node.node()
    }

    pub fn node_ref(&self) -> &NodeRef {
        self.node
    }

    pub fn node_id(&self) -> &str {
        &self.node.node().id
    }

    /// The execution input the current token arrived on; empty for entry nodes and
    /// for data nodes evaluated on demand.
    pub fn triggered_port(&self) -> &str {
        self.triggered
    }

    /// The resolved value of a data input, `Null` when nothing provided one.
    pub fn input(&self, port: &str) -> &Value {
        self.inputs.get(port).unwrap_or(&NULL)
    }

    pub fn inputs(&self) -> &AHashMap<String, Value> {
        &self.inputs
    }

    pub fn input_bool(&self, port: &str) -> Result<bool, NodeError> {
        let value = self.required(port)?;
        value
            .as_bool()
            .ok_or_else(|| Self::mismatch(port, "Bool", value))
    }

    pub fn input_f64(&self, port: &str) -> Result<f64, NodeError> {
        let value = self.required(port)?;
        value
            .as_f64()
            .ok_or_else(|| Self::mismatch(port, "Number", value))
    }

    pub fn input_str(&self, port: &str) -> Result<&str, NodeError> {
        let value = self.required(port)?;
        value
            .as_str()
            .ok_or_else(|| Self::mismatch(port, "Text", value))
    }

    pub fn input_list(&self, port: &str) -> Result<&[Value], NodeError> {
        let value = self.required(port)?;
        value
            .as_list()
            .ok_or_else(|| Self::mismatch(port, "List", value))
    }

    fn required(&self, port: &str) -> Result<&Value, NodeError> {
        match self.inputs.get(port) {
            Some(value) if !value.is_null() => Ok(value),
            _ => Err(NodeError::MissingInput(port.to_string())),
        }
    }

    fn mismatch(port: &str, expected: &str, found: &Value) -> NodeError {
        NodeError::TypeMismatch {
            port: port.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub fn set_output(&mut self, port: &str, value: impl Into<Value>) {
        self.outputs.insert(port.to_string(), value.into());
    }

    /// The token that triggered this execution (read-only).
    pub fn token(&self) -> &ExecutionToken {
        self.token
    }

    /// Downcasts the host handle given to the executor.
    pub fn host<T: Any>(&self) -> Option<&'a T> {
        let host: &'a HostHandle = self.host;
        host.downcast_ref::<T>()
    }

    /// Builds the successor tokens of one execution output, applying its fan-out the
    /// same way the executor does: a broadcast output yields one token per connection,
    /// an exclusive one a single token for a weighted pick among its connections.
    ///
    /// The tokens inherit the current strand (local store, call stack) and carry the
    /// outputs this node has set so far.
    pub fn tokens_for_port(&mut self, port: &str) -> Vec<ExecutionToken> {
        let node = self.node;
        let graph = node.graph();
        let Some(spec) = node.node().port(port, PortDirection::Output) else {
            return Vec::new();
        };

        let connections: Vec<&Connection> = graph.outgoing(node.index(), port).collect();
        let selected: Vec<&Connection> = match spec.fan_out {
            FanOut::Broadcast => connections,
            FanOut::Exclusive => {
                let weights = vec![spec.weight; connections.len()];
                branching::choose_weighted(&weights, &mut *self.rng)
                    .map(|index| connections[index])
                    .into_iter()
                    .collect()
            }
        };

        selected
            .into_iter()
            .map(|conn| {
                let mut token = self.token.successor(
                    self.ids.next(),
                    NodeRef::new(graph.clone(), conn.to),
                    &conn.to_port,
                );
                token.publish_outputs(node.key(), &self.outputs);
                token
            })
            .collect()
    }

    /// Attaches a value for one of this node's outputs to a single successor token,
    /// so consumers on that strand read it instead of the node's shared output.
    pub fn publish_on(&self, token: &mut ExecutionToken, port: &str, value: impl Into<Value>) {
        token.carry(OutputKey::new(self.node.key(), port), value.into());
    }
}
