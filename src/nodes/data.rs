use super::logic;
use crate::error::{CompileError, NodeError};
use crate::flow::FlowNodeDefinition;
use crate::graph::PortSpec;
use crate::node::{Flow, NodeContext, NodeLogic, NodeType};
use crate::value::{Value, ValueType};
use std::sync::Arc;

/// Outputs the literal in its `value` property.
///
/// The output type is taken from the optional `type` property, or inferred from the
/// literal.
pub struct ConstantNode;

impl ConstantNode {
    fn literal(node: &FlowNodeDefinition) -> Result<(Value, ValueType), CompileError> {
        let invalid = |property: &str, message: String| CompileError::InvalidProperty {
            node_id: node.id.clone(),
            property: property.to_string(),
            message,
        };

        let raw = node
            .properties
            .get("value")
            .ok_or_else(|| invalid("value", "a constant needs a value".to_string()))?;
        let value = Value::from(raw);

        let Some(declared) = node.properties.get("type") else {
            let value_type = value.value_type();
            return Ok((value, value_type));
        };
        let name = declared
            .as_str()
            .ok_or_else(|| invalid("type", "expected a type name".to_string()))?;
        let value_type = ValueType::parse(name)
            .ok_or_else(|| invalid("type", format!("unknown value type '{}'", name)))?;
        let value = value.coerce(&value_type).ok_or_else(|| {
            invalid("value", format!("literal cannot be used as {}", value_type))
        })?;
        Ok((value, value_type))
    }
}

impl NodeType for ConstantNode {
    fn type_name(&self) -> &str {
        "constantNode"
    }

    fn ports(&self, node: &FlowNodeDefinition) -> Result<Vec<PortSpec>, CompileError> {
        let (_, value_type) = Self::literal(node)?;
        Ok(vec![PortSpec::data_output("value", value_type)])
    }

    fn instantiate(&self, node: &FlowNodeDefinition) -> Result<Arc<dyn NodeLogic>, CompileError> {
        let (value, _) = Self::literal(node)?;
        Ok(Arc::new(ConstantLogic { value }))
    }
}

struct ConstantLogic {
    value: Value,
}

impl NodeLogic for ConstantLogic {
    fn execute(&self, ctx: &mut NodeContext<'_>) -> Result<Flow, NodeError> {
        ctx.set_output("value", self.value.clone());
        Ok(Flow::Continue)
    }
}

pub struct AddNode;

impl NodeType for AddNode {
    fn type_name(&self) -> &str {
        "addNode"
    }

    fn ports(&self, _node: &FlowNodeDefinition) -> Result<Vec<PortSpec>, CompileError> {
        Ok(vec![
            PortSpec::data_input("a", ValueType::Float).with_default(0.0),
            PortSpec::data_input("b", ValueType::Float).with_default(0.0),
            PortSpec::data_output("sum", ValueType::Float),
        ])
    }

    fn instantiate(&self, _node: &FlowNodeDefinition) -> Result<Arc<dyn NodeLogic>, CompileError> {
        Ok(logic(|ctx| {
            let sum = ctx.input_f64("a")? + ctx.input_f64("b")?;
            ctx.set_output("sum", sum);
            Ok(Flow::Continue)
        }))
    }
}

/// `a > b`
pub struct GtNode;

impl NodeType for GtNode {
    fn type_name(&self) -> &str {
        "gtNode"
    }

    fn ports(&self, _node: &FlowNodeDefinition) -> Result<Vec<PortSpec>, CompileError> {
        Ok(vec![
            PortSpec::data_input("a", ValueType::Float),
            PortSpec::data_input("b", ValueType::Float),
            PortSpec::data_output("result", ValueType::Bool),
        ])
    }

    fn instantiate(&self, _node: &FlowNodeDefinition) -> Result<Arc<dyn NodeLogic>, CompileError> {
        Ok(logic(|ctx| {
            let result = ctx.input_f64("a")? > ctx.input_f64("b")?;
            ctx.set_output("result", result);
            Ok(Flow::Continue)
        }))
    }
}

/// Writes its `message` input to the log and continues.
pub struct LogNode;

impl NodeType for LogNode {
    fn type_name(&self) -> &str {
        "logNode"
    }

    fn ports(&self, _node: &FlowNodeDefinition) -> Result<Vec<PortSpec>, CompileError> {
        Ok(vec![
            PortSpec::execution_input("in"),
            PortSpec::data_input("message", ValueType::Any),
            PortSpec::execution_output("out"),
        ])
    }

    fn instantiate(&self, _node: &FlowNodeDefinition) -> Result<Arc<dyn NodeLogic>, CompileError> {
        Ok(logic(|ctx| {
            tracing::info!(
                node = %ctx.node().display_name(),
                message = %ctx.input("message"),
                "log"
            );
            Ok(Flow::Continue)
        }))
    }
}
