//! Turns a [`FlowDefinition`] (plus the sub-flows it calls) into an immutable [`Graph`].
//!
//! All structural checks happen here: unknown node types, dangling connections,
//! port kind and type compatibility, capacity, sub-flow shape, recursive sub-flow
//! calls and data cycles. The executor trusts whatever this module produces.

use crate::error::CompileError;
use crate::flow::FlowDefinition;
use crate::graph::Graph;
use crate::node::NodeType;
use crate::nodes::{create_node_type_by_name, register_default_node_types};
use ahash::AHashMap;
use itertools::Itertools;
use std::sync::Arc;

mod builder;
mod validation;

use builder::GraphBuilder;

pub struct Compiler {
    flow: FlowDefinition,
    subflows: AHashMap<String, FlowDefinition>,
    registry: AHashMap<String, Box<dyn NodeType>>,
    compiled: AHashMap<String, Arc<Graph>>,
    visiting: Vec<String>,
}

pub struct CompilerBuilder {
    flow: FlowDefinition,
    subflows: AHashMap<String, FlowDefinition>,
    registry: AHashMap<String, Box<dyn NodeType>>,
}

impl CompilerBuilder {
    pub fn new(flow: FlowDefinition) -> Self {
        let mut registry: AHashMap<String, Box<dyn NodeType>> = AHashMap::new();
        register_default_node_types(&mut registry);
        Self {
            flow,
            subflows: AHashMap::new(),
            registry,
        }
    }

    /// Makes a flow callable from call nodes under its `name`.
    pub fn with_subflow(mut self, flow: FlowDefinition) -> Self {
        self.subflows.insert(flow.name.clone(), flow);
        self
    }

    /// Lets nodes of type `user_type_name` be built as the built-in `nagare_type_name`.
    pub fn with_type_mapping(mut self, user_type_name: &str, nagare_type_name: &str) -> Self {
        if let Some(node_type) = create_node_type_by_name(nagare_type_name) {
            self.registry.insert(user_type_name.to_string(), node_type);
        } else {
            tracing::warn!(
                user_type = user_type_name,
                builtin = nagare_type_name,
                "ignoring type mapping to an unknown built-in node type"
            );
        }
        self
    }

    pub fn with_node_type(mut self, node_type: Box<dyn NodeType>) -> Self {
        self.registry
            .insert(node_type.type_name().to_string(), node_type);
        self
    }

    pub fn build(self) -> Compiler {
        Compiler {
            flow: self.flow,
            subflows: self.subflows,
            registry: self.registry,
            compiled: AHashMap::new(),
            visiting: Vec::new(),
        }
    }
}

impl Compiler {
    pub fn builder(flow: FlowDefinition) -> CompilerBuilder {
        CompilerBuilder::new(flow)
    }

    pub fn compile(mut self) -> Result<Arc<Graph>, CompileError> {
        let flow = std::mem::take(&mut self.flow);
        self.compile_flow(&flow)
    }

    fn compile_flow(&mut self, flow: &FlowDefinition) -> Result<Arc<Graph>, CompileError> {
        self.visiting.push(flow.name.clone());

        let mut subgraphs: AHashMap<String, Arc<Graph>> = AHashMap::new();
        for node in &flow.nodes {
            let Some(name) = &node.subflow else {
                continue;
            };
            if !subgraphs.contains_key(name) {
                let graph = self.resolve_subflow(name, &node.id)?;
                subgraphs.insert(name.clone(), graph);
            }
        }

        let graph = GraphBuilder::new(flow, &self.registry, &subgraphs).build()?;
        validation::check_data_cycles(&graph)?;
        tracing::debug!(
            flow = %flow.name,
            nodes = graph.nodes().len(),
            connections = graph.connections().len(),
            "compiled flow"
        );

        self.visiting.pop();
        Ok(Arc::new(graph))
    }

    /// Compiles a sub-flow once, however many call nodes reference it.
    fn resolve_subflow(&mut self, name: &str, node_id: &str) -> Result<Arc<Graph>, CompileError> {
        if let Some(graph) = self.compiled.get(name) {
            return Ok(graph.clone());
        }

        if let Some(start) = self.visiting.iter().position(|n| n == name) {
            let chain = self.visiting[start..]
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(name))
                .join(" -> ");
            return Err(CompileError::RecursiveSubflow {
                name: name.to_string(),
                chain,
            });
        }

        let flow = self
            .subflows
            .get(name)
            .cloned()
            .ok_or_else(|| CompileError::SubflowNotFound {
                name: name.to_string(),
                node_id: node_id.to_string(),
            })?;

        let graph = self.compile_flow(&flow)?;
        validation::check_subflow_shape(name, &graph)?;
        self.compiled.insert(name.to_string(), graph.clone());
        Ok(graph)
    }
}
