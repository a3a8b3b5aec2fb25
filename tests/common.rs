//! Common test utilities for building flows and observing executions.
use nagare::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[allow(dead_code)]
pub fn node(id: &str, node_type: &str) -> FlowNodeDefinition {
    FlowNodeDefinition::new(id, node_type)
}

#[allow(dead_code)]
pub fn constant(id: &str, value: serde_json::Value) -> FlowNodeDefinition {
    FlowNodeDefinition::new(id, "constantNode").with_property("value", value)
}

#[allow(dead_code)]
pub fn edge(source: &str, source_port: &str, target: &str, target_port: &str) -> FlowEdgeDefinition {
    FlowEdgeDefinition::new(source, source_port, target, target_port)
}

/// Shared log of the record nodes that ran, in order.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

#[allow(dead_code)]
impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == entry).count()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    /// `recordNode`: logs its node id, or `id:value` when its `value` input is set.
    pub fn node_type(&self) -> Box<dyn NodeType> {
        let log = self.0.clone();
        Box::new(
            NodeSchema::from_fn("recordNode", move |ctx| {
                let entry = match ctx.input("value") {
                    Value::Null => ctx.node_id().to_string(),
                    value => format!("{}:{}", ctx.node_id(), value),
                };
                log.lock().unwrap().push(entry);
                Ok(Flow::Continue)
            })
            .port(PortSpec::execution_input("in"))
            .port(PortSpec::data_input("value", ValueType::Any))
            .port(PortSpec::execution_output("out")),
        )
    }
}

/// `countedNode`: a data node computing `y = x + 1` that counts its invocations.
#[allow(dead_code)]
pub fn counted_node_type() -> (Box<dyn NodeType>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let node_type = NodeSchema::from_fn("countedNode", move |ctx| {
        counter.fetch_add(1, Ordering::SeqCst);
        let x = ctx.input_f64("x")?;
        ctx.set_output("y", x + 1.0);
        Ok(Flow::Continue)
    })
    .port(PortSpec::data_input("x", ValueType::Float).with_default(1.0))
    .port(PortSpec::data_output("y", ValueType::Float));
    (Box::new(node_type), calls)
}

/// `pairNode`: an execution node with two numeric inputs and no behavior of its own.
#[allow(dead_code)]
pub fn pair_node_type() -> Box<dyn NodeType> {
    Box::new(
        NodeSchema::from_fn("pairNode", |_| Ok(Flow::Continue))
            .port(PortSpec::execution_input("in"))
            .port(PortSpec::data_input("x", ValueType::Float))
            .port(PortSpec::data_input("y", ValueType::Float))
            .port(PortSpec::execution_output("out")),
    )
}

/// `failNode`: always fails.
#[allow(dead_code)]
pub fn failing_node_type() -> Box<dyn NodeType> {
    Box::new(
        NodeSchema::from_fn("failNode", |_| Err(NodeError::Failed("boom".to_string())))
            .port(PortSpec::execution_input("in"))
            .port(PortSpec::execution_output("out")),
    )
}

/// `splitNode`: two exclusive outputs weighted 3:1.
#[allow(dead_code)]
pub fn split_node_type() -> Box<dyn NodeType> {
    Box::new(
        NodeSchema::from_fn("splitNode", |_| Ok(Flow::Continue))
            .port(PortSpec::execution_input("in"))
            .port(PortSpec::execution_output("heavy").with_weight(3.0))
            .port(PortSpec::execution_output("light").with_weight(1.0)),
    )
}

/// Compiles `flow` with extra node types, panicking on compile errors.
#[allow(dead_code)]
pub fn compile(flow: FlowDefinition, node_types: Vec<Box<dyn NodeType>>) -> Arc<Graph> {
    let mut builder = Compiler::builder(flow);
    for node_type in node_types {
        builder = builder.with_node_type(node_type);
    }
    builder.build().compile().expect("flow should compile")
}

/// An executor with a fixed seed and trace recording.
#[allow(dead_code)]
pub fn executor(graph: Arc<Graph>) -> GraphExecutor {
    GraphExecutor::builder(graph)
        .seed(7)
        .record_trace(true)
        .build()
}
