use crate::value::ValueType;
use thiserror::Error;

/// Structural problems found while compiling a flow definition into a runnable graph.
///
/// These are always reported before execution starts; a compiled [`Graph`](crate::graph::Graph)
/// is trusted by the executor and never re-validated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error(
        "Node '{missing_node_id}' not found, which is required by a connection from node '{source_node_id}'"
    )]
    NodeNotFound {
        missing_node_id: String,
        source_node_id: String,
    },

    #[error("Node id '{0}' is used more than once")]
    DuplicateNode(String),

    #[error("Node '{node_id}' has an unregistered or invalid node type: '{type_name}'")]
    InvalidNodeType { node_id: String, type_name: String },

    #[error("Node '{node_id}' has no {direction} port named '{port}'")]
    PortNotFound {
        node_id: String,
        port: String,
        direction: String,
    },

    #[error("Node '{node_id}' declares the {direction} port '{port}' more than once")]
    DuplicatePort {
        node_id: String,
        port: String,
        direction: String,
    },

    #[error(
        "Connection '{source_node_id}.{source_port}' -> '{target_node_id}.{target_port}' is invalid: {message}"
    )]
    ConnectionError {
        source_node_id: String,
        source_port: String,
        target_node_id: String,
        target_port: String,
        message: String,
    },

    #[error(
        "Connection '{source_node_id}.{source_port}' -> '{target_node_id}.{target_port}' cannot carry {found} into a port declared as {expected}"
    )]
    TypeMismatch {
        source_node_id: String,
        source_port: String,
        target_node_id: String,
        target_port: String,
        expected: ValueType,
        found: ValueType,
    },

    #[error("Node '{node_id}' has an invalid property '{property}': {message}")]
    InvalidProperty {
        node_id: String,
        property: String,
        message: String,
    },

    #[error("Sub-flow '{name}' referenced by node '{node_id}' was not provided to the compiler")]
    SubflowNotFound { name: String, node_id: String },

    #[error("Sub-flow '{name}' calls itself through the chain: {chain}")]
    RecursiveSubflow { name: String, chain: String },

    #[error("Sub-flow '{name}' cannot be called: {reason}")]
    InvalidSubflow { name: String, reason: String },

    #[error("Data connections form a cycle through node '{node_id}'")]
    DataCycle { node_id: String },
}

/// Failures raised while a single node executes.
///
/// The executor catches these at the node boundary: the failing strand stops, every
/// other queued strand keeps running.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Required input '{0}' has no value")]
    MissingInput(String),

    #[error("Input '{port}' expected {expected}, but found value '{found}'")]
    TypeMismatch {
        port: String,
        expected: String,
        found: String,
    },

    #[error("Node '{node_id}' has no execution output named '{port}'")]
    UnknownPort { node_id: String, port: String },

    #[error("{0}")]
    Failed(String),

    #[error("Node logic panicked: {0}")]
    Panicked(String),

    #[error("Data dependency '{node_id}' failed: {source}")]
    Upstream {
        node_id: String,
        #[source]
        source: Box<NodeError>,
    },

    #[error("Data dependency on '{node_id}' re-entered itself while being evaluated")]
    DataCycle { node_id: String },
}

/// Errors that can occur when converting a custom user format into a `FlowDefinition`.
#[derive(Error, Debug, Clone)]
pub enum FlowConversionError {
    #[error("Invalid custom data: {0}")]
    ValidationError(String),

    #[error("Failed to parse flow JSON: {0}")]
    Json(String),
}

impl From<serde_json::Error> for FlowConversionError {
    fn from(e: serde_json::Error) -> Self {
        FlowConversionError::Json(e.to_string())
    }
}
