use super::logic;
use crate::error::{CompileError, NodeError};
use crate::flow::FlowNodeDefinition;
use crate::graph::PortSpec;
use crate::node::{Flow, NodeContext, NodeLogic, NodeType};
use crate::scheduler::TimerQueue;
use crate::value::{Value, ValueType};
use std::sync::Arc;

/// Entry point of a top-level graph.
pub struct StartNode;

impl NodeType for StartNode {
    fn type_name(&self) -> &str {
        "startNode"
    }

    fn ports(&self, _node: &FlowNodeDefinition) -> Result<Vec<PortSpec>, CompileError> {
        Ok(vec![PortSpec::execution_output("out")])
    }

    fn instantiate(&self, _node: &FlowNodeDefinition) -> Result<Arc<dyn NodeLogic>, CompileError> {
        Ok(logic(|_| Ok(Flow::Continue)))
    }
}

/// Routes the strand to `true` or `false` depending on its `condition` input.
pub struct BranchNode;

impl NodeType for BranchNode {
    fn type_name(&self) -> &str {
        "branchNode"
    }

    fn ports(&self, _node: &FlowNodeDefinition) -> Result<Vec<PortSpec>, CompileError> {
        Ok(vec![
            PortSpec::execution_input("in"),
            PortSpec::data_input("condition", ValueType::Bool).with_default(false),
            PortSpec::execution_output("true"),
            PortSpec::execution_output("false"),
        ])
    }

    fn instantiate(&self, _node: &FlowNodeDefinition) -> Result<Arc<dyn NodeLogic>, CompileError> {
        Ok(logic(|ctx| {
            let port = if ctx.input_bool("condition")? {
                "true"
            } else {
                "false"
            };
            Ok(Flow::Follow(port.to_string()))
        }))
    }
}

/// Emits one `body` token per element of `items`, then the `completed` tokens.
///
/// Every body token carries its own `item` and `index`, both as outputs of this node
/// and in the token's local store. Because successors are queued in order, all body
/// tokens run before the completion continues.
pub struct ForEachNode;

impl NodeType for ForEachNode {
    fn type_name(&self) -> &str {
        "forEachNode"
    }

    fn ports(&self, _node: &FlowNodeDefinition) -> Result<Vec<PortSpec>, CompileError> {
        Ok(vec![
            PortSpec::execution_input("in"),
            PortSpec::data_input("items", ValueType::List(Box::new(ValueType::Any)))
                .with_default(Value::List(Vec::new())),
            PortSpec::execution_output("body"),
            PortSpec::execution_output("completed"),
            PortSpec::data_output("item", ValueType::Any),
            PortSpec::data_output("index", ValueType::Int),
        ])
    }

    fn instantiate(&self, _node: &FlowNodeDefinition) -> Result<Arc<dyn NodeLogic>, CompileError> {
        Ok(logic(for_each))
    }
}

fn for_each(ctx: &mut NodeContext<'_>) -> Result<Flow, NodeError> {
    let items = ctx.input_list("items")?.to_vec();
    let mut tokens = Vec::new();

    for (index, item) in items.into_iter().enumerate() {
        let index = index as i64;
        for mut token in ctx.tokens_for_port("body") {
            ctx.publish_on(&mut token, "item", item.clone());
            ctx.publish_on(&mut token, "index", index);
            token.set_data("item", item.clone());
            token.set_data("index", index);
            tokens.push(token);
        }
    }
    tokens.extend(ctx.tokens_for_port("completed"));

    Ok(Flow::Tokens(tokens))
}

/// Suspends the strand for `seconds` using the host's [`TimerQueue`].
///
/// Without a timer queue on the host the strand continues on `failed` instead.
pub struct DelayNode;

impl NodeType for DelayNode {
    fn type_name(&self) -> &str {
        "delayNode"
    }

    fn ports(&self, _node: &FlowNodeDefinition) -> Result<Vec<PortSpec>, CompileError> {
        Ok(vec![
            PortSpec::execution_input("in"),
            PortSpec::data_input("seconds", ValueType::Float).with_default(0.0),
            PortSpec::execution_output("completed"),
            PortSpec::execution_output("failed"),
        ])
    }

    fn instantiate(&self, _node: &FlowNodeDefinition) -> Result<Arc<dyn NodeLogic>, CompileError> {
        Ok(logic(delay))
    }
}

fn delay(ctx: &mut NodeContext<'_>) -> Result<Flow, NodeError> {
    let seconds = ctx.input_f64("seconds")?;
    let Some(timers) = ctx.host::<TimerQueue>() else {
        tracing::warn!(
            node = %ctx.node_id(),
            "host provides no timer queue, taking the failed output"
        );
        return Ok(Flow::Follow("failed".to_string()));
    };

    for token in ctx.tokens_for_port("completed") {
        timers.schedule(seconds, token);
    }
    Ok(Flow::Suspend)
}
