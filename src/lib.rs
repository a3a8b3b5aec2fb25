//! # Nagare - Token-Driven Node Graph Execution
//!
//! **Nagare** runs visual-scripting style node graphs. A graph is made of execution
//! nodes, which are visited by tokens travelling along execution connections, and data
//! nodes, which are evaluated on demand when a connected input is read.
//!
//! ## Core Workflow
//!
//! The engine is format-agnostic. It operates on a canonical model of a "flow
//! definition":
//!
//! 1.  **Load Your Data**: Parse your editor or storage format into your own Rust structs.
//! 2.  **Convert to Nagare's Model**: Implement [`IntoFlow`](flow::IntoFlow) for those structs.
//! 3.  **Compile**: Use `Compiler::builder` with the main flow and any sub-flows it calls.
//!     Compilation validates the whole program and yields an immutable [`Graph`](graph::Graph).
//! 4.  **Execute**: Create a `GraphExecutor` for the graph and call `start`. Strands that
//!     suspend are resumed later through `continue_flow`.
//!
//! ## Quick Start
//!
//! ```rust
//! use nagare::prelude::*;
//! use serde_json::json;
//!
//! # fn main() -> Result<()> {
//! let flow = FlowDefinition::new("main")
//!     .with_node(FlowNodeDefinition::new("start", "startNode"))
//!     .with_node(FlowNodeDefinition::new("threshold", "constantNode").with_property("value", json!(25.0)))
//!     .with_node(FlowNodeDefinition::new("reading", "constantNode").with_property("value", json!(30.0)))
//!     .with_node(FlowNodeDefinition::new("hot", "gtNode"))
//!     .with_node(FlowNodeDefinition::new("check", "branchNode"))
//!     .with_node(FlowNodeDefinition::new("alarm", "logNode"))
//!     .with_edge(FlowEdgeDefinition::new("start", "out", "check", "in"))
//!     .with_edge(FlowEdgeDefinition::new("reading", "value", "hot", "a"))
//!     .with_edge(FlowEdgeDefinition::new("threshold", "value", "hot", "b"))
//!     .with_edge(FlowEdgeDefinition::new("hot", "result", "check", "condition"))
//!     .with_edge(FlowEdgeDefinition::new("check", "true", "alarm", "in"));
//!
//! let graph = Compiler::builder(flow).build().compile()?;
//!
//! let mut executor = GraphExecutor::builder(graph).record_trace(true).build();
//! executor.start();
//!
//! if let Some(trace) = executor.trace() {
//!     assert_eq!(trace.executed_nodes().collect::<Vec<_>>(), ["start", "check", "alarm"]);
//!     println!("{}", TraceFormatter::format_trace(trace));
//! }
//! # Ok(())
//! # }
//! ```

pub mod compiler;
pub mod error;
pub mod executor;
pub mod flow;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod prelude;
pub mod scheduler;
pub mod trace;
pub mod value;
