//! Built-in node types.
//!
//! Every type is registered under its type name (e.g. `"branchNode"`). Flows refer to
//! these names directly, or map their own names onto them with
//! `CompilerBuilder::with_type_mapping`.

mod data;
mod flow;
mod subgraph;

pub use data::{AddNode, ConstantNode, GtNode, LogNode};
pub use flow::{BranchNode, DelayNode, ForEachNode, StartNode};
pub use subgraph::{CallNode, EntryNode, ExitNode};

use crate::error::NodeError;
use crate::node::{Flow, NodeContext, NodeLogic, NodeType};
use ahash::AHashMap;
use std::sync::Arc;

/// Wraps a plain function as shared node logic.
fn logic(f: fn(&mut NodeContext<'_>) -> Result<Flow, NodeError>) -> Arc<dyn NodeLogic> {
    Arc::new(f)
}

/// Defines registration and lookup for all built-in node types.
macro_rules! define_node_types {
    ( $( ($struct_name:ident, $type_name:literal) ),* $(,)? ) => {
        /// Type names of every built-in node type.
        pub const BUILTIN_NODE_TYPES: &[&str] = &[ $( $type_name ),* ];

        pub(crate) fn register_default_node_types(registry: &mut AHashMap<String, Box<dyn NodeType>>) {
            $( registry.insert($type_name.to_string(), Box::new($struct_name)); )*
        }

        pub(crate) fn create_node_type_by_name(name: &str) -> Option<Box<dyn NodeType>> {
            match name {
                $( $type_name => Some(Box::new($struct_name)), )*
                _ => None,
            }
        }
    };
}

define_node_types! {
    // Control flow
    (StartNode, "startNode"),
    (BranchNode, "branchNode"),
    (ForEachNode, "forEachNode"),
    (DelayNode, "delayNode"),
    (LogNode, "logNode"),

    // Data
    (ConstantNode, "constantNode"),
    (AddNode, "addNode"),
    (GtNode, "gtNode"),

    // Sub-graphs
    (CallNode, "callNode"),
    (EntryNode, "entryNode"),
    (ExitNode, "exitNode"),
}
