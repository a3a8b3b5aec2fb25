//! Node types that make a flow callable from another flow.
//!
//! Port names line up across the call boundary: every execution output of the entry
//! node is an execution input of the call node, and every execution input of an exit
//! node is an execution output of the call node. The same holds for data ports.

use super::logic;
use crate::error::CompileError;
use crate::executor::TRIGGERED_PORT_KEY;
use crate::flow::FlowNodeDefinition;
use crate::graph::{NodeRole, PortDirection, PortSpec};
use crate::node::{Flow, NodeLogic, NodeType};
use crate::value::Value;
use std::sync::Arc;

/// Invokes the sub-flow named in the node's `subflow` field. Its ports are derived
/// from that sub-flow by the compiler.
pub struct CallNode;

impl NodeType for CallNode {
    fn type_name(&self) -> &str {
        "callNode"
    }

    fn role(&self) -> NodeRole {
        NodeRole::SubgraphCall
    }

    fn ports(&self, _node: &FlowNodeDefinition) -> Result<Vec<PortSpec>, CompileError> {
        Ok(Vec::new())
    }

    fn instantiate(&self, _node: &FlowNodeDefinition) -> Result<Arc<dyn NodeLogic>, CompileError> {
        Ok(logic(|_| Ok(Flow::Continue)))
    }
}

/// Where control lands inside a sub-flow. Declared data outputs are the sub-flow's
/// parameters.
pub struct EntryNode;

impl NodeType for EntryNode {
    fn type_name(&self) -> &str {
        "entryNode"
    }

    fn role(&self) -> NodeRole {
        NodeRole::SubgraphEntry
    }

    fn ports(&self, _node: &FlowNodeDefinition) -> Result<Vec<PortSpec>, CompileError> {
        Ok(vec![PortSpec::execution_output("in")])
    }

    fn accepts_declared_ports(&self) -> bool {
        true
    }

    fn instantiate(&self, _node: &FlowNodeDefinition) -> Result<Arc<dyn NodeLogic>, CompileError> {
        // Continue on the output named like the caller's triggered input.
        Ok(logic(|ctx| {
            let triggered = ctx
                .token()
                .get_data(TRIGGERED_PORT_KEY)
                .and_then(Value::as_str)
                .filter(|port| {
                    ctx.node()
                        .port(port, PortDirection::Output)
                        .is_some_and(|p| p.is_execution())
                })
                .map(str::to_string);
            Ok(triggered.map_or(Flow::Continue, Flow::Follow))
        }))
    }
}

/// Returns control to the call node. Declared data inputs are the sub-flow's results.
pub struct ExitNode;

impl NodeType for ExitNode {
    fn type_name(&self) -> &str {
        "exitNode"
    }

    fn role(&self) -> NodeRole {
        NodeRole::SubgraphExit
    }

    fn ports(&self, _node: &FlowNodeDefinition) -> Result<Vec<PortSpec>, CompileError> {
        Ok(vec![PortSpec::execution_input("out")])
    }

    fn accepts_declared_ports(&self) -> bool {
        true
    }

    fn instantiate(&self, _node: &FlowNodeDefinition) -> Result<Arc<dyn NodeLogic>, CompileError> {
        Ok(logic(|_| Ok(Flow::Continue)))
    }
}
