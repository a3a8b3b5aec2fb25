//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the nagare crate.
//! Import it to get the compiler, the executor and the node authoring API without
//! importing each type individually.
//!
//! # Example
//!
//! ```rust,no_run
//! use nagare::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let flow_json = std::fs::read_to_string("path/to/flow.json")?;
//! let flow: FlowDefinition = serde_json::from_str(&flow_json)?;
//!
//! let graph = Compiler::builder(flow).build().compile()?;
//! let mut executor = GraphExecutor::new(graph, std::sync::Arc::new(()));
//! executor.start();
//! # Ok(())
//! # }
//! ```

// Compilation and execution
pub use crate::compiler::{Compiler, CompilerBuilder};
pub use crate::executor::{ExecutionToken, ExecutorBuilder, ExecutorState, GraphExecutor};

// Flow definitions
pub use crate::flow::{
    FlowDefinition, FlowEdgeDefinition, FlowNodeDefinition, IntoFlow, PortDefinition,
};

// Compiled graph model
pub use crate::graph::{FanOut, Graph, NodeRef, NodeRole, PortDirection, PortKind, PortSpec};

// Node authoring
pub use crate::node::{Flow, HostHandle, NodeContext, NodeLogic, NodeSchema, NodeType};
pub use crate::value::{Value, ValueType};

// Scheduling and tracing
pub use crate::scheduler::TimerQueue;
pub use crate::trace::{ExecutionTrace, TraceFormatter};

// Error types
pub use crate::error::{CompileError, FlowConversionError, NodeError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
