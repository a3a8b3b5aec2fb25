use crate::graph::{NodeKey, NodeRef, OutputKey};
use crate::value::Value;
use ahash::AHashMap;
use std::cell::Cell;
use std::fmt;

/// Key under which a sub-graph entry token stores the name of the port that
/// triggered the call.
pub const TRIGGERED_PORT_KEY: &str = "__triggered_port";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(u64);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Monotonic token id source owned by one executor.
#[derive(Debug, Default)]
pub(crate) struct TokenIds(Cell<u64>);

impl TokenIds {
    pub(crate) fn next(&self) -> TokenId {
        let id = self.0.get() + 1;
        self.0.set(id);
        TokenId(id)
    }
}

/// The caller side of an active sub-graph call.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub caller: NodeRef,
    saved_data: AHashMap<String, Value>,
    saved_outputs: AHashMap<OutputKey, Value>,
}

/// A unit of control flow: where the strand goes next, plus the strand's own state.
#[derive(Debug, Clone)]
pub struct ExecutionToken {
    id: TokenId,
    target: NodeRef,
    entry_port: String,
    data: AHashMap<String, Value>,
    carried: AHashMap<OutputKey, Value>,
    call_stack: Vec<CallFrame>,
}

impl ExecutionToken {
    pub(crate) fn root(id: TokenId, target: NodeRef) -> Self {
        Self {
            id,
            target,
            entry_port: String::new(),
            data: AHashMap::new(),
            carried: AHashMap::new(),
            call_stack: Vec::new(),
        }
    }

    /// A new token on the same strand, aimed at `target` through `entry_port`.
    pub(crate) fn successor(&self, id: TokenId, target: NodeRef, entry_port: &str) -> Self {
        Self {
            id,
            target,
            entry_port: entry_port.to_string(),
            data: self.data.clone(),
            carried: self.carried.clone(),
            call_stack: self.call_stack.clone(),
        }
    }

    /// A throwaway token used to evaluate a node on demand for this strand.
    pub(crate) fn throwaway(&self, target: NodeRef) -> Self {
        Self {
            target,
            entry_port: String::new(),
            ..self.clone()
        }
    }

    /// The first token inside a called sub-graph.
    pub(crate) fn enter(
        &self,
        id: TokenId,
        entry: NodeRef,
        caller: NodeRef,
        arguments: AHashMap<String, Value>,
    ) -> Self {
        let mut call_stack = self.call_stack.clone();
        call_stack.push(CallFrame {
            caller,
            saved_data: self.data.clone(),
            saved_outputs: self.carried.clone(),
        });

        let mut data = arguments;
        data.insert(
            TRIGGERED_PORT_KEY.to_string(),
            Value::Text(self.entry_port.clone()),
        );

        Self {
            id,
            target: entry,
            entry_port: String::new(),
            data,
            carried: AHashMap::new(),
            call_stack,
        }
    }

    /// Pops the innermost call frame and rebuilds the caller's strand, with the
    /// sub-graph results published as the caller's outputs. The caller's local store is
    /// restored as it was. `None` when the stack is empty, i.e. control leaves the
    /// top-level graph.
    pub(crate) fn leave(&self, id: TokenId, results: &AHashMap<String, Value>) -> Option<Self> {
        let mut call_stack = self.call_stack.clone();
        let frame = call_stack.pop()?;

        let mut carried = frame.saved_outputs;
        let caller_key = frame.caller.key();
        carried.retain(|key, _| key.node != caller_key);
        carried.extend(
            results
                .iter()
                .map(|(port, value)| (OutputKey::new(caller_key, port), value.clone())),
        );

        Some(Self {
            id,
            target: frame.caller,
            entry_port: self.entry_port.clone(),
            data: frame.saved_data,
            carried,
            call_stack,
        })
    }

    pub fn id(&self) -> TokenId {
        self.id
    }

    pub fn target(&self) -> &NodeRef {
        &self.target
    }

    /// The execution input this token arrives on.
    pub fn entry_port(&self) -> &str {
        &self.entry_port
    }

    pub fn set_data(&mut self, key: &str, value: impl Into<Value>) {
        self.data.insert(key.to_string(), value.into());
    }

    pub fn get_data(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn data(&self) -> &AHashMap<String, Value> {
        &self.data
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    pub fn call_stack(&self) -> &[CallFrame] {
        &self.call_stack
    }

    pub(crate) fn carried_output(&self, key: &OutputKey) -> Option<&Value> {
        self.carried.get(key)
    }

    pub(crate) fn carry(&mut self, key: OutputKey, value: Value) {
        self.carried.insert(key, value);
    }

    /// Publishes a node's outputs on this strand, replacing whatever an earlier
    /// execution of the same node left behind.
    pub(crate) fn publish_outputs(&mut self, node: NodeKey, outputs: &AHashMap<String, Value>) {
        self.carried.retain(|key, _| key.node != node);
        self.carried.extend(
            outputs
                .iter()
                .map(|(port, value)| (OutputKey::new(node, port), value.clone())),
        );
    }

    /// Like [`publish_outputs`](Self::publish_outputs) but keeps values already attached
    /// to this particular token.
    pub(crate) fn merge_outputs(&mut self, node: NodeKey, outputs: &AHashMap<String, Value>) {
        for (port, value) in outputs {
            self.carried
                .entry(OutputKey::new(node, port))
                .or_insert_with(|| value.clone());
        }
    }
}
