//! The graph interpreter.
//!
//! A [`GraphExecutor`] owns a FIFO queue of [`ExecutionToken`]s. Draining the queue is a
//! sequence of steps: dequeue one token, clear the per-step data frame, execute the
//! token's target node and append whatever successor tokens it produced at the tail.
//! Data nodes are never queued; they are evaluated on demand when a consumer pulls
//! one of their outputs and memoized for the rest of the step. A pull from an execution
//! node reads the value it left on the strand, or evaluates the node the same way when
//! it has not run there.

pub(crate) mod branching;
mod frame;
pub(crate) mod token;

pub use token::{CallFrame, ExecutionToken, TRIGGERED_PORT_KEY, TokenId};

use crate::error::NodeError;
use crate::graph::{FanOut, Graph, Node, NodeRef, NodeRole, OutputKey, PortDirection};
use crate::node::{Flow, HostHandle, NodeContext};
use crate::trace::{ExecutionTrace, TraceEvent, TraceRecord};
use crate::value::{Value, ValueType};
use ahash::AHashMap;
use frame::DataFrame;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use token::TokenIds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    /// Nothing is being drained. Suspended strands live outside the executor.
    Idle,
    Running,
}

/// Runs a compiled [`Graph`].
pub struct GraphExecutor {
    graph: Arc<Graph>,
    host: HostHandle,
    queue: VecDeque<ExecutionToken>,
    frame: DataFrame,
    state: ExecutorState,
    rng: StdRng,
    ids: TokenIds,
    step: u64,
    step_limit: Option<u64>,
    trace: Option<ExecutionTrace>,
}

impl GraphExecutor {
    /// Creates an executor for `graph`. `host` is handed to every node that asks for it.
    pub fn new(graph: Arc<Graph>, host: HostHandle) -> Self {
        Self {
            graph,
            host,
            queue: VecDeque::new(),
            frame: DataFrame::default(),
            state: ExecutorState::Idle,
            rng: StdRng::from_os_rng(),
            ids: TokenIds::default(),
            step: 0,
            step_limit: None,
            trace: None,
        }
    }

    pub fn builder(graph: Arc<Graph>) -> ExecutorBuilder {
        ExecutorBuilder::new(graph)
    }

    /// Discards queued tokens, enqueues one token per entry node and drains the queue.
    pub fn start(&mut self) {
        self.queue.clear();
        let entries = self.graph.entry_nodes();
        tracing::debug!(
            graph = %self.graph.name(),
            entries = entries.len(),
            "starting graph"
        );
        for index in entries {
            let target = NodeRef::new(self.graph.clone(), index);
            self.queue
                .push_back(ExecutionToken::root(self.ids.next(), target));
        }
        self.process_queue();
    }

    /// Puts a previously suspended token back on the queue and drains it.
    pub fn continue_flow(&mut self, token: ExecutionToken) {
        tracing::debug!(token = %token.id(), target = %token.target(), "resuming token");
        self.queue.push_back(token);
        if self.state == ExecutorState::Idle {
            self.process_queue();
        }
    }

    fn process_queue(&mut self) {
        self.state = ExecutorState::Running;
        let mut processed = 0u64;
        while let Some(token) = self.queue.pop_front() {
            if self.step_limit.is_some_and(|limit| processed >= limit) {
                tracing::warn!(
                    graph = %self.graph.name(),
                    pending = self.queue.len() + 1,
                    "step limit reached, leaving remaining tokens queued"
                );
                self.queue.push_front(token);
                break;
            }
            processed += 1;
            self.step += 1;
            self.frame.reset();

            let mut step = Step {
                number: self.step,
                host: &self.host,
                ids: &self.ids,
                frame: &mut self.frame,
                rng: &mut self.rng,
                trace: self.trace.as_mut(),
            };
            let successors = step.execute_node(token);
            self.queue.extend(successors);
        }
        self.state = ExecutorState::Idle;
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Tokens still waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Total number of steps processed so far.
    pub fn steps(&self) -> u64 {
        self.step
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn host(&self) -> &HostHandle {
        &self.host
    }

    /// The recorded trace, if the executor was built with tracing enabled.
    pub fn trace(&self) -> Option<&ExecutionTrace> {
        self.trace.as_ref()
    }
}

/// Configures a [`GraphExecutor`].
pub struct ExecutorBuilder {
    graph: Arc<Graph>,
    host: HostHandle,
    seed: Option<u64>,
    record_trace: bool,
    step_limit: Option<u64>,
}

impl ExecutorBuilder {
    pub fn new(graph: Arc<Graph>) -> Self {
        Self {
            graph,
            host: Arc::new(()),
            seed: None,
            record_trace: false,
            step_limit: None,
        }
    }

    /// Sets the host object nodes can reach through `NodeContext::host`.
    pub fn host<T: Any + Send + Sync>(mut self, host: Arc<T>) -> Self {
        self.host = host;
        self
    }

    pub fn host_handle(mut self, host: HostHandle) -> Self {
        self.host = host;
        self
    }

    /// Makes weighted branching reproducible.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn record_trace(mut self, enabled: bool) -> Self {
        self.record_trace = enabled;
        self
    }

    /// Caps the number of steps one drain may process. Tokens beyond the cap stay queued
    /// and are picked up by the next `continue_flow`.
    pub fn step_limit(mut self, limit: u64) -> Self {
        self.step_limit = Some(limit);
        self
    }

    pub fn build(self) -> GraphExecutor {
        let mut executor = GraphExecutor::new(self.graph, self.host);
        if let Some(seed) = self.seed {
            executor.rng = StdRng::seed_from_u64(seed);
        }
        executor.step_limit = self.step_limit;
        if self.record_trace {
            executor.trace = Some(ExecutionTrace::new());
        }
        executor
    }
}

/// Borrowed executor state for the duration of one step.
struct Step<'a> {
    number: u64,
    host: &'a HostHandle,
    ids: &'a TokenIds,
    frame: &'a mut DataFrame,
    rng: &'a mut StdRng,
    trace: Option<&'a mut ExecutionTrace>,
}

impl Step<'_> {
    /// Runs the token's target node. Failures end the strand and never escape.
    fn execute_node(&mut self, token: ExecutionToken) -> Vec<ExecutionToken> {
        let node = token.target().clone();
        let result = match node.node().role {
            NodeRole::SubgraphCall => self.enter_subgraph(&node, &token),
            NodeRole::SubgraphExit => self.exit_subgraph(&node, &token),
            NodeRole::Regular | NodeRole::SubgraphEntry => self.run_regular(&node, &token),
        };

        match result {
            Ok(successors) => successors,
            Err(error) => {
                tracing::error!(
                    node = %node.node().id,
                    graph = %node.graph().name(),
                    token = %token.id(),
                    error = %error,
                    "node execution failed"
                );
                self.record(&node, &token, TraceEvent::Failed(error.to_string()));
                Vec::new()
            }
        }
    }

    fn enter_subgraph(
        &mut self,
        node: &NodeRef,
        token: &ExecutionToken,
    ) -> Result<Vec<ExecutionToken>, NodeError> {
        let spec = node.node();
        let nested = spec.subgraph.clone().ok_or_else(|| {
            NodeError::Failed(format!("call node '{}' has no sub-graph", spec.id))
        })?;
        let entry = nested.subgraph_entry().ok_or_else(|| {
            NodeError::Failed(format!("sub-graph '{}' has no entry node", nested.name()))
        })?;

        let arguments = self.resolve_inputs(node, token)?;
        let entered = token.enter(
            self.ids.next(),
            NodeRef::new(nested.clone(), entry),
            node.clone(),
            arguments,
        );
        tracing::debug!(
            node = %spec.id,
            subgraph = %nested.name(),
            depth = entered.call_depth(),
            "entering sub-graph"
        );
        self.record(
            node,
            token,
            TraceEvent::EnteredSubgraph {
                graph: nested.name().to_string(),
            },
        );
        Ok(vec![entered])
    }

    fn exit_subgraph(
        &mut self,
        node: &NodeRef,
        token: &ExecutionToken,
    ) -> Result<Vec<ExecutionToken>, NodeError> {
        let results = self.resolve_inputs(node, token)?;
        let Some(returned) = token.leave(self.ids.next(), &results) else {
            tracing::debug!(
                node = %node.node().id,
                token = %token.id(),
                "exit reached with an empty call stack, discarding token"
            );
            self.record(node, token, TraceEvent::Discarded);
            return Ok(Vec::new());
        };

        let caller = returned.target().clone();
        let successors = self.next_tokens(&caller, &returned, Some(token.entry_port()));
        if successors.is_empty() {
            tracing::debug!(
                caller = %caller,
                port = %token.entry_port(),
                "caller has no connection for the returning port"
            );
        }
        self.record(
            node,
            token,
            TraceEvent::ExitedSubgraph {
                successors: successors.len(),
            },
        );
        Ok(successors)
    }

    fn run_regular(
        &mut self,
        node: &NodeRef,
        token: &ExecutionToken,
    ) -> Result<Vec<ExecutionToken>, NodeError> {
        let inputs = self.resolve_inputs(node, token)?;
        let (flow, outputs) = self.invoke(node, token.entry_port(), inputs, token)?;
        self.frame.store(node.key(), &outputs);

        let successors = match flow {
            Flow::Continue => {
                let mut base = token.clone();
                base.publish_outputs(node.key(), &outputs);
                self.next_tokens(node, &base, None)
            }
            Flow::Follow(port) => {
                let is_execution_output = node
                    .node()
                    .port(&port, PortDirection::Output)
                    .is_some_and(|p| p.is_execution());
                if !is_execution_output {
                    return Err(NodeError::UnknownPort {
                        node_id: node.node().id.clone(),
                        port,
                    });
                }
                let mut base = token.clone();
                base.publish_outputs(node.key(), &outputs);
                self.next_tokens(node, &base, Some(port.as_str()))
            }
            Flow::Tokens(mut tokens) => {
                for successor in &mut tokens {
                    successor.merge_outputs(node.key(), &outputs);
                }
                tokens
            }
            Flow::Suspend => {
                tracing::debug!(
                    node = %node.node().id,
                    token = %token.id(),
                    "node suspended its strand"
                );
                self.record(node, token, TraceEvent::Suspended);
                return Ok(Vec::new());
            }
        };

        self.record(
            node,
            token,
            TraceEvent::Executed {
                successors: successors.len(),
            },
        );
        Ok(successors)
    }

    /// Successor tokens for the execution outputs of `node` (or just `only`).
    ///
    /// All connections of exclusive ports compete for a single weighted pick; every
    /// connection of a broadcast port gets its own token.
    fn next_tokens(
        &mut self,
        node: &NodeRef,
        base: &ExecutionToken,
        only: Option<&str>,
    ) -> Vec<ExecutionToken> {
        let graph = node.graph();
        let mut exclusive = Vec::new();
        let mut broadcast = Vec::new();

        for port in node
            .node()
            .execution_outputs()
            .filter(|p| only.is_none_or(|name| p.name == name))
        {
            for conn in graph.outgoing(node.index(), &port.name) {
                match port.fan_out {
                    FanOut::Exclusive => exclusive.push((conn, port.weight)),
                    FanOut::Broadcast => broadcast.push(conn),
                }
            }
        }

        let weights: Vec<f64> = exclusive.iter().map(|(_, weight)| *weight).collect();
        let chosen = branching::choose_weighted(&weights, &mut *self.rng).map(|i| exclusive[i].0);
        if let Some(conn) = chosen.filter(|_| exclusive.len() > 1) {
            tracing::debug!(
                node = %node.node().id,
                candidates = exclusive.len(),
                port = %conn.from_port,
                step = self.number,
                "weighted branch selected"
            );
        }

        chosen
            .into_iter()
            .chain(broadcast)
            .map(|conn| {
                base.successor(
                    self.ids.next(),
                    NodeRef::new(graph.clone(), conn.to),
                    &conn.to_port,
                )
            })
            .collect()
    }

    /// Resolves every data input of `node`: port defaults first, then values from the
    /// token's local store matching a port name, then values pulled over connections.
    fn resolve_inputs(
        &mut self,
        node: &NodeRef,
        token: &ExecutionToken,
    ) -> Result<AHashMap<String, Value>, NodeError> {
        let mut inputs = AHashMap::new();
        for port in node.node().data_inputs() {
            if let Some(default) = &port.default {
                inputs.insert(port.name.clone(), default.clone());
            }
            if let Some(value) = token.get_data(&port.name) {
                inputs.insert(port.name.clone(), fit(value.clone(), &port.value_type));
            }
        }
        inputs.extend(self.pull_data_for_node(node, token)?);
        Ok(inputs)
    }

    /// Pulls a value over the connection of every connected data input.
    fn pull_data_for_node(
        &mut self,
        node: &NodeRef,
        token: &ExecutionToken,
    ) -> Result<Vec<(String, Value)>, NodeError> {
        let graph = node.graph();
        let mut pulled = Vec::new();
        for port in node.node().data_inputs() {
            let Some(conn) = graph.incoming(node.index(), &port.name).next() else {
                continue;
            };
            let source = NodeRef::new(graph.clone(), conn.from);
            let value = self.get_output_value(&source, &conn.from_port, token)?;
            pulled.push((port.name.clone(), fit(value, &port.value_type)));
        }
        Ok(pulled)
    }

    fn get_output_value(
        &mut self,
        source: &NodeRef,
        port: &str,
        token: &ExecutionToken,
    ) -> Result<Value, NodeError> {
        let key = OutputKey::new(source.key(), port);
        if let Some(value) = self.frame.get(&key) {
            return Ok(value.clone());
        }

        let spec = source.node();
        if spec.role == NodeRole::SubgraphEntry && source.same_graph(token.target()) {
            return Ok(token
                .get_data(port)
                .cloned()
                .unwrap_or_else(|| output_default(spec, port)));
        }

        if let Some(value) = token.carried_output(&key) {
            return Ok(value.clone());
        }

        if self.frame.is_evaluated(source.key()) {
            return Ok(output_default(spec, port));
        }

        if !self.frame.begin(source.key()) {
            return Err(NodeError::DataCycle {
                node_id: spec.id.clone(),
            });
        }
        if !spec.is_data_node() {
            tracing::debug!(
                node = %spec.id,
                port,
                token = %token.id(),
                "execution node has not run on this strand, evaluating it for its outputs"
            );
        }
        match self.evaluate_on_demand(source, token) {
            Ok(outputs) => {
                self.frame.finish(source.key(), &outputs);
                tracing::trace!(node = %spec.id, step = self.number, "evaluated node on demand");
                self.record(source, token, TraceEvent::Evaluated);
                Ok(outputs
                    .get(port)
                    .cloned()
                    .unwrap_or_else(|| output_default(spec, port)))
            }
            Err(error) => {
                self.frame.abort(source.key());
                Err(NodeError::Upstream {
                    node_id: spec.id.clone(),
                    source: Box::new(error),
                })
            }
        }
    }

    /// Runs `source` with a throwaway token only to read its outputs. The returned
    /// flow is dropped, so an execution node evaluated this way yields no successors.
    fn evaluate_on_demand(
        &mut self,
        source: &NodeRef,
        token: &ExecutionToken,
    ) -> Result<AHashMap<String, Value>, NodeError> {
        let scratch = token.throwaway(source.clone());
        let inputs = self.resolve_inputs(source, &scratch)?;
        let (_, outputs) = self.invoke(source, "", inputs, &scratch)?;
        Ok(outputs)
    }

    fn invoke(
        &mut self,
        node: &NodeRef,
        triggered: &str,
        inputs: AHashMap<String, Value>,
        token: &ExecutionToken,
    ) -> Result<(Flow, AHashMap<String, Value>), NodeError> {
        let logic = Arc::clone(&node.node().logic);
        let mut ctx = NodeContext::new(
            node,
            triggered,
            inputs,
            token,
            self.host,
            self.ids,
            &mut *self.rng,
        );
        let flow = panic::catch_unwind(AssertUnwindSafe(|| logic.execute(&mut ctx)))
            .map_err(|payload| NodeError::Panicked(panic_message(payload.as_ref())))??;
        Ok((flow, ctx.into_outputs()))
    }

    fn record(&mut self, node: &NodeRef, token: &ExecutionToken, event: TraceEvent) {
        if let Some(trace) = self.trace.as_deref_mut() {
            let spec = node.node();
            trace.push(TraceRecord {
                step: self.number,
                token: token.id(),
                graph: node.graph().name().to_string(),
                node_id: spec.id.clone(),
                node_type: spec.node_type.clone(),
                event,
            });
        }
    }
}

fn fit(value: Value, target: &ValueType) -> Value {
    match value.clone().coerce(target) {
        Some(coerced) => coerced,
        None => value,
    }
}

fn output_default(node: &Node, port: &str) -> Value {
    node.port(port, PortDirection::Output)
        .and_then(|p| p.default.clone())
        .unwrap_or_default()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "node panicked".to_string()
    }
}
