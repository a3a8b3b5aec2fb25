use crate::error::CompileError;
use crate::graph::{Graph, NodeIndex, NodeRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Active,
    Done,
}

/// Rejects cycles among pure data nodes.
///
/// Data nodes are evaluated by pulling their inputs recursively, so a cycle would never
/// terminate. Connections that pass through an execution node are fine: those outputs
/// are read from the strand, never recomputed on pull.
pub(super) fn check_data_cycles(graph: &Graph) -> Result<(), CompileError> {
    let mut marks = vec![Mark::Unvisited; graph.nodes().len()];
    for (index, node) in graph.nodes().iter().enumerate() {
        if node.is_data_node() {
            visit(graph, index, &mut marks)?;
        }
    }
    Ok(())
}

fn visit(graph: &Graph, index: NodeIndex, marks: &mut [Mark]) -> Result<(), CompileError> {
    match marks[index] {
        Mark::Done => return Ok(()),
        Mark::Active => {
            return Err(CompileError::DataCycle {
                node_id: graph.node(index).id.clone(),
            });
        }
        Mark::Unvisited => {}
    }

    marks[index] = Mark::Active;
    for port in graph.node(index).data_inputs() {
        for conn in graph.incoming(index, &port.name) {
            if graph.node(conn.from).is_data_node() {
                visit(graph, conn.from, marks)?;
            }
        }
    }
    marks[index] = Mark::Done;
    Ok(())
}

/// A callable sub-flow needs exactly one entry node with at least one execution output.
pub(super) fn check_subflow_shape(name: &str, graph: &Graph) -> Result<(), CompileError> {
    let invalid = |reason: String| CompileError::InvalidSubflow {
        name: name.to_string(),
        reason,
    };

    let entries: Vec<_> = graph
        .nodes()
        .iter()
        .filter(|node| node.role == NodeRole::SubgraphEntry)
        .collect();

    match entries.as_slice() {
        [] => Err(invalid("it has no entry node".to_string())),
        [entry] if entry.execution_outputs().next().is_none() => Err(invalid(format!(
            "its entry node '{}' has no execution output",
            entry.id
        ))),
        [_] => {
            if graph.subgraph_exits().next().is_none() {
                tracing::warn!(subflow = name, "sub-flow has no exit node and never returns");
            }
            Ok(())
        }
        many => Err(invalid(format!("it has {} entry nodes", many.len()))),
    }
}
