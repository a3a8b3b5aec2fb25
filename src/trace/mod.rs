//! A record of what an executor did, step by step.

mod formatter;

pub use formatter::TraceFormatter;

use crate::executor::TokenId;

/// What happened to a node while a token was being processed.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    /// An execution node ran and produced this many successor tokens.
    Executed { successors: usize },
    /// A node was evaluated on demand for a downstream pull.
    Evaluated,
    /// The node handed its continuation to an external scheduler.
    Suspended,
    /// The node failed; its strand ended here.
    Failed(String),
    /// A call node pushed a frame and moved into the named graph.
    EnteredSubgraph { graph: String },
    /// An exit node popped a frame and returned to the caller.
    ExitedSubgraph { successors: usize },
    /// An exit node was reached with an empty call stack.
    Discarded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceRecord {
    pub step: u64,
    pub token: TokenId,
    pub graph: String,
    pub node_id: String,
    pub node_type: String,
    pub event: TraceEvent,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionTrace {
    records: Vec<TraceRecord>,
}

impl ExecutionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: TraceRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Ids of the nodes that ran (not nodes evaluated on demand), in order.
    pub fn executed_nodes(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .filter(|r| {
                matches!(
                    r.event,
                    TraceEvent::Executed { .. }
                        | TraceEvent::Suspended
                        | TraceEvent::EnteredSubgraph { .. }
                        | TraceEvent::ExitedSubgraph { .. }
                )
            })
            .map(|r| r.node_id.as_str())
    }

    /// How many times the node with this id was evaluated as a data node.
    pub fn evaluations_of(&self, node_id: &str) -> usize {
        self.records
            .iter()
            .filter(|r| r.node_id == node_id && r.event == TraceEvent::Evaluated)
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TraceRecord> {
        self.records
            .iter()
            .filter(|r| matches!(r.event, TraceEvent::Failed(_)))
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
