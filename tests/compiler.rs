//! Compilation tests: structural validation, sub-flow resolution and flow loading.
mod common;
use common::*;
use nagare::error::FlowConversionError;
use nagare::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn try_compile(flow: FlowDefinition) -> std::result::Result<Arc<Graph>, CompileError> {
    Compiler::builder(flow).build().compile()
}

fn try_compile_with(
    flow: FlowDefinition,
    subflows: Vec<FlowDefinition>,
) -> std::result::Result<Arc<Graph>, CompileError> {
    let mut builder = Compiler::builder(flow);
    for subflow in subflows {
        builder = builder.with_subflow(subflow);
    }
    builder.build().compile()
}

/// A sub-flow whose entry calls `callee`.
fn calling(name: &str, callee: &str) -> FlowDefinition {
    FlowDefinition::new(name)
        .with_node(node("entry", "entryNode"))
        .with_node(node("call", "callNode").with_subflow(callee))
        .with_node(node("exit", "exitNode"))
        .with_edge(edge("entry", "in", "call", "in"))
}

#[cfg(test)]
mod compiler_tests {
    use super::*;

    #[test]
    fn test_unknown_node_type() {
        let flow = FlowDefinition::new("main").with_node(node("x", "mysteryNode"));

        let err = try_compile(flow).unwrap_err();
        assert_eq!(
            err,
            CompileError::InvalidNodeType {
                node_id: "x".to_string(),
                type_name: "mysteryNode".to_string(),
            }
        );
    }

    #[test]
    fn test_duplicate_node_id() {
        let flow = FlowDefinition::new("main")
            .with_node(node("start", "startNode"))
            .with_node(node("start", "logNode"));

        let err = try_compile(flow).unwrap_err();
        assert_eq!(err, CompileError::DuplicateNode("start".to_string()));
    }

    #[test]
    fn test_connection_to_missing_node() {
        let flow = FlowDefinition::new("main")
            .with_node(node("start", "startNode"))
            .with_edge(edge("start", "out", "ghost", "in"));

        let err = try_compile(flow).unwrap_err();
        assert_eq!(
            err,
            CompileError::NodeNotFound {
                missing_node_id: "ghost".to_string(),
                source_node_id: "start".to_string(),
            }
        );
    }

    #[test]
    fn test_connection_to_missing_port() {
        let flow = FlowDefinition::new("main")
            .with_node(node("start", "startNode"))
            .with_node(node("log", "logNode"))
            .with_edge(edge("start", "nope", "log", "in"));

        let err = try_compile(flow).unwrap_err();
        assert_eq!(
            err,
            CompileError::PortNotFound {
                node_id: "start".to_string(),
                port: "nope".to_string(),
                direction: "output".to_string(),
            }
        );
    }

    #[test]
    fn test_execution_output_into_data_input() {
        let flow = FlowDefinition::new("main")
            .with_node(node("start", "startNode"))
            .with_node(node("log", "logNode"))
            .with_edge(edge("start", "out", "log", "message"));

        let err = try_compile(flow).unwrap_err();
        assert!(matches!(err, CompileError::ConnectionError { .. }), "{:?}", err);
        assert!(err.to_string().contains("execution output cannot feed a data input"));
    }

    #[test]
    fn test_incompatible_data_types() {
        let flow = FlowDefinition::new("main")
            .with_node(constant("text", json!("hello")))
            .with_node(node("add", "addNode"))
            .with_edge(edge("text", "value", "add", "a"));

        let err = try_compile(flow).unwrap_err();
        match err {
            CompileError::TypeMismatch {
                expected, found, ..
            } => {
                assert_eq!(expected, ValueType::Float);
                assert_eq!(found, ValueType::Text);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_integer_into_float_input_is_accepted() {
        let flow = FlowDefinition::new("main")
            .with_node(constant("two", json!(2)))
            .with_node(node("add", "addNode"))
            .with_edge(edge("two", "value", "add", "a"));

        assert!(try_compile(flow).is_ok());
    }

    #[test]
    fn test_single_capacity_input_keeps_newest_connection() {
        let flow = FlowDefinition::new("main")
            .with_node(constant("first", json!(1.0)))
            .with_node(constant("second", json!(2.0)))
            .with_node(node("add", "addNode"))
            .with_edge(edge("first", "value", "add", "a"))
            .with_edge(edge("second", "value", "add", "a"));

        let graph = try_compile(flow).unwrap();
        let add = graph.node_by_id("add").unwrap();
        let incoming: Vec<_> = graph.incoming(add, "a").collect();
        assert_eq!(incoming.len(), 1);
        assert_eq!(graph.node(incoming[0].from).id, "second");
        assert_eq!(graph.connections().len(), 1);
    }

    #[test]
    fn test_execution_inputs_accept_many_connections() {
        let flow = FlowDefinition::new("main")
            .with_node(node("a", "startNode"))
            .with_node(node("b", "startNode"))
            .with_node(node("log", "logNode"))
            .with_edge(edge("a", "out", "log", "in"))
            .with_edge(edge("b", "out", "log", "in"));

        let graph = try_compile(flow).unwrap();
        let log = graph.node_by_id("log").unwrap();
        assert_eq!(graph.incoming(log, "in").count(), 2);
        assert_eq!(graph.entry_nodes().len(), 2);
    }

    #[test]
    fn test_data_cycle_is_rejected() {
        let flow = FlowDefinition::new("main")
            .with_node(node("left", "addNode"))
            .with_node(node("right", "addNode"))
            .with_edge(edge("left", "sum", "right", "a"))
            .with_edge(edge("right", "sum", "left", "a"));

        let err = try_compile(flow).unwrap_err();
        assert!(matches!(err, CompileError::DataCycle { .. }), "{:?}", err);
    }

    #[test]
    fn test_loop_through_execution_node_is_allowed() {
        let flow = FlowDefinition::new("main")
            .with_node(node("start", "startNode"))
            .with_node(node("loop", "forEachNode"))
            .with_node(node("log", "logNode"))
            .with_edge(edge("start", "out", "loop", "in"))
            .with_edge(edge("loop", "body", "log", "in"))
            .with_edge(edge("loop", "item", "log", "message"))
            .with_edge(edge("log", "out", "loop", "in"));

        assert!(try_compile(flow).is_ok());
    }

    #[test]
    fn test_recursive_subflow_reports_the_chain() {
        let main = FlowDefinition::new("main")
            .with_node(node("start", "startNode"))
            .with_node(node("call", "callNode").with_subflow("a"))
            .with_edge(edge("start", "out", "call", "in"));

        let err = try_compile_with(main, vec![calling("a", "b"), calling("b", "a")]).unwrap_err();
        assert_eq!(
            err,
            CompileError::RecursiveSubflow {
                name: "a".to_string(),
                chain: "a -> b -> a".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_subflow() {
        let main = FlowDefinition::new("main")
            .with_node(node("call", "callNode").with_subflow("missing"));

        let err = try_compile(main).unwrap_err();
        assert_eq!(
            err,
            CompileError::SubflowNotFound {
                name: "missing".to_string(),
                node_id: "call".to_string(),
            }
        );
    }

    #[test]
    fn test_subflow_without_entry_node() {
        let main = FlowDefinition::new("main")
            .with_node(node("call", "callNode").with_subflow("empty"));
        let empty = FlowDefinition::new("empty").with_node(node("start", "startNode"));

        let err = try_compile_with(main, vec![empty]).unwrap_err();
        assert_eq!(
            err,
            CompileError::InvalidSubflow {
                name: "empty".to_string(),
                reason: "it has no entry node".to_string(),
            }
        );
    }

    #[test]
    fn test_subflow_with_two_entry_nodes() {
        let main = FlowDefinition::new("main")
            .with_node(node("call", "callNode").with_subflow("twice"));
        let twice = FlowDefinition::new("twice")
            .with_node(node("one", "entryNode"))
            .with_node(node("two", "entryNode"));

        let err = try_compile_with(main, vec![twice]).unwrap_err();
        assert!(err.to_string().contains("it has 2 entry nodes"), "{}", err);
    }

    #[test]
    fn test_call_node_requires_subflow() {
        let flow = FlowDefinition::new("main").with_node(node("call", "callNode"));

        match try_compile(flow).unwrap_err() {
            CompileError::InvalidProperty {
                node_id, property, ..
            } => {
                assert_eq!(node_id, "call");
                assert_eq!(property, "subflow");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_only_call_nodes_name_a_subflow() {
        let flow = FlowDefinition::new("main")
            .with_node(node("start", "startNode").with_subflow("noop"));
        let noop = FlowDefinition::new("noop")
            .with_node(node("entry", "entryNode"))
            .with_node(node("exit", "exitNode"))
            .with_edge(edge("entry", "in", "exit", "out"));

        let err = try_compile_with(flow, vec![noop]).unwrap_err();
        assert!(
            matches!(err, CompileError::InvalidProperty { ref property, .. } if property == "subflow"),
            "{:?}",
            err
        );
    }

    #[test]
    fn test_constant_requires_value() {
        let flow = FlowDefinition::new("main").with_node(node("c", "constantNode"));

        let err = try_compile(flow).unwrap_err();
        assert!(
            matches!(err, CompileError::InvalidProperty { ref property, .. } if property == "value"),
            "{:?}",
            err
        );
    }

    #[test]
    fn test_constant_with_declared_type() {
        let flow = FlowDefinition::new("main").with_node(
            constant("c", json!(3)).with_property("type", json!("float")),
        );

        let graph = try_compile(flow).unwrap();
        let c = graph.node(graph.node_by_id("c").unwrap());
        let port = c.port("value", PortDirection::Output).unwrap();
        assert_eq!(port.value_type, ValueType::Float);
    }

    #[test]
    fn test_declared_port_on_fixed_node_type() {
        let flow = FlowDefinition::new("main").with_node(
            node("start", "startNode").with_port(PortDefinition::execution_output("extra")),
        );

        let err = try_compile(flow).unwrap_err();
        assert_eq!(
            err,
            CompileError::PortNotFound {
                node_id: "start".to_string(),
                port: "extra".to_string(),
                direction: "output".to_string(),
            }
        );
    }

    #[test]
    fn test_declared_port_cannot_change_kind() {
        let flow = FlowDefinition::new("main").with_node(
            node("start", "startNode").with_port(PortDefinition::data_output("out", "int")),
        );

        let err = try_compile(flow).unwrap_err();
        assert!(matches!(err, CompileError::InvalidProperty { .. }), "{:?}", err);
    }

    #[test]
    fn test_entry_node_cannot_declare_inputs() {
        let main = FlowDefinition::new("main")
            .with_node(node("call", "callNode").with_subflow("sub"));
        let sub = FlowDefinition::new("sub").with_node(
            node("entry", "entryNode").with_port(PortDefinition::data_input("x", "float")),
        );

        let err = try_compile_with(main, vec![sub]).unwrap_err();
        assert!(matches!(err, CompileError::InvalidProperty { .. }), "{:?}", err);
    }

    #[test]
    fn test_declared_port_with_unknown_type() {
        let main = FlowDefinition::new("main")
            .with_node(node("call", "callNode").with_subflow("sub"));
        let sub = FlowDefinition::new("sub").with_node(
            node("entry", "entryNode").with_port(PortDefinition::data_output("x", "vector3")),
        );

        let err = try_compile_with(main, vec![sub]).unwrap_err();
        assert!(err.to_string().contains("vector3"), "{}", err);
    }

    #[test]
    fn test_duplicate_ports_on_custom_node_type() {
        let dup = NodeSchema::from_fn("dupNode", |_| Ok(Flow::Continue))
            .port(PortSpec::execution_output("out"))
            .port(PortSpec::execution_output("out"));
        let flow = FlowDefinition::new("main").with_node(node("d", "dupNode"));

        let err = Compiler::builder(flow)
            .with_node_type(Box::new(dup))
            .build()
            .compile()
            .unwrap_err();
        assert!(matches!(err, CompileError::DuplicatePort { .. }), "{:?}", err);
    }

    #[test]
    fn test_type_mapping_to_builtin() {
        let flow = FlowDefinition::new("main")
            .with_node(node("begin", "onBegin"))
            .with_node(node("say", "print"))
            .with_edge(edge("begin", "out", "say", "in"));

        let graph = Compiler::builder(flow)
            .with_type_mapping("onBegin", "startNode")
            .with_type_mapping("print", "logNode")
            .build()
            .compile()
            .unwrap();

        let begin = graph.node_by_id("begin").unwrap();
        assert_eq!(graph.entry_nodes(), vec![begin]);
        assert_eq!(graph.node(begin).node_type, "onBegin");
    }

    #[test]
    fn test_type_mapping_to_unknown_builtin_is_ignored() {
        let flow = FlowDefinition::new("main").with_node(node("x", "custom"));

        let err = Compiler::builder(flow)
            .with_type_mapping("custom", "noSuchNode")
            .build()
            .compile()
            .unwrap_err();
        assert!(matches!(err, CompileError::InvalidNodeType { .. }));
    }

    #[test]
    fn test_flow_definition_from_json() {
        let json_flow = r#"
        {
            "name": "main",
            "nodes": [
                {
                    "id": "start",
                    "node_type": "startNode",
                    "ports": [
                        { "name": "out", "kind": "execution", "direction": "output", "fan_out": "broadcast" }
                    ]
                },
                { "id": "msg", "node_type": "constantNode", "properties": { "value": "hello" } },
                { "id": "log", "node_type": "logNode", "label": "Say hello" }
            ],
            "edges": [
                { "source": "start", "source_handle": "out", "target": "log", "target_handle": "in" },
                { "source": "msg", "source_handle": "value", "target": "log", "target_handle": "message" }
            ]
        }
        "#;

        let flow: FlowDefinition = serde_json::from_str(json_flow).unwrap();
        let graph = try_compile(flow).unwrap();

        let start = graph.node(graph.node_by_id("start").unwrap());
        let out = start.port("out", PortDirection::Output).unwrap();
        assert_eq!(out.fan_out, FanOut::Broadcast);
        let log = graph.node(graph.node_by_id("log").unwrap());
        assert_eq!(log.display_name(), "Say hello");
        assert_eq!(graph.connections().len(), 2);
    }

    #[test]
    fn test_custom_format_through_into_flow() {
        struct Step {
            id: &'static str,
            kind: &'static str,
        }
        struct Script {
            steps: Vec<Step>,
        }

        impl IntoFlow for Script {
            fn into_flow(self) -> std::result::Result<FlowDefinition, FlowConversionError> {
                if self.steps.is_empty() {
                    return Err(FlowConversionError::ValidationError(
                        "script has no steps".to_string(),
                    ));
                }
                let mut flow = FlowDefinition::new("script");
                for step in &self.steps {
                    flow.nodes.push(FlowNodeDefinition::new(step.id, step.kind));
                }
                for pair in self.steps.windows(2) {
                    flow.edges
                        .push(FlowEdgeDefinition::new(pair[0].id, "out", pair[1].id, "in"));
                }
                Ok(flow)
            }
        }

        let recorder = Recorder::new();
        let script = Script {
            steps: vec![
                Step { id: "start", kind: "startNode" },
                Step { id: "one", kind: "recordNode" },
                Step { id: "two", kind: "recordNode" },
            ],
        };
        let graph = compile(script.into_flow().unwrap(), vec![recorder.node_type()]);
        let mut executor = executor(graph);
        executor.start();
        assert_eq!(recorder.entries(), ["one", "two"]);

        let empty = Script { steps: Vec::new() };
        assert!(matches!(
            empty.into_flow(),
            Err(FlowConversionError::ValidationError(_))
        ));
    }
}
