use crate::graph::{NodeKey, OutputKey};
use crate::value::Value;
use ahash::{AHashMap, AHashSet};

/// Output values produced during one dequeue/process cycle.
///
/// The frame is the only place node outputs live while a step runs. It is cleared at
/// the start of every step, which bounds memoization of data nodes to that step.
#[derive(Debug, Default)]
pub(crate) struct DataFrame {
    values: AHashMap<OutputKey, Value>,
    evaluated: AHashSet<NodeKey>,
    in_progress: AHashSet<NodeKey>,
}

impl DataFrame {
    pub(crate) fn reset(&mut self) {
        self.values.clear();
        self.evaluated.clear();
        self.in_progress.clear();
    }

    pub(crate) fn get(&self, key: &OutputKey) -> Option<&Value> {
        self.values.get(key)
    }

    pub(crate) fn is_evaluated(&self, node: NodeKey) -> bool {
        self.evaluated.contains(&node)
    }

    /// Marks a data node as being evaluated. Returns `false` if it already is, which
    /// means the pull re-entered the node through a data cycle.
    pub(crate) fn begin(&mut self, node: NodeKey) -> bool {
        self.in_progress.insert(node)
    }

    /// Abandons an evaluation that failed, so the error is not mistaken for a cycle.
    pub(crate) fn abort(&mut self, node: NodeKey) {
        self.in_progress.remove(&node);
    }

    pub(crate) fn finish(&mut self, node: NodeKey, outputs: &AHashMap<String, Value>) {
        self.in_progress.remove(&node);
        self.store(node, outputs);
    }

    pub(crate) fn store(&mut self, node: NodeKey, outputs: &AHashMap<String, Value>) {
        self.evaluated.insert(node);
        self.values.extend(
            outputs
                .iter()
                .map(|(port, value)| (OutputKey::new(node, port), value.clone())),
        );
    }
}
