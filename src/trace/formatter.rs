use super::{ExecutionTrace, TraceEvent, TraceRecord};
use itertools::Itertools;

/// Formats execution traces into human-readable strings
pub struct TraceFormatter;

impl TraceFormatter {
    /// One line per record, grouped visually by step.
    pub fn format_trace(trace: &ExecutionTrace) -> String {
        let steps = trace.records().iter().chunk_by(|record| record.step);
        steps
            .into_iter()
            .map(|(step, records)| {
                let body = records.map(|r| format!("  {}", Self::format_record(r))).join("\n");
                format!("step {}:\n{}", step, body)
            })
            .join("\n")
    }

    /// Format a single record, e.g. `t3 main/branch (branchNode) executed -> 1 token`.
    pub fn format_record(record: &TraceRecord) -> String {
        format!(
            "{} {}/{} ({}) {}",
            record.token,
            record.graph,
            record.node_id,
            record.node_type,
            Self::format_event(&record.event)
        )
    }

    fn format_event(event: &TraceEvent) -> String {
        match event {
            TraceEvent::Executed { successors } => {
                format!("executed -> {}", Self::plural(*successors, "token"))
            }
            TraceEvent::Evaluated => "evaluated".to_string(),
            TraceEvent::Suspended => "suspended".to_string(),
            TraceEvent::Failed(reason) => format!("failed: {}", reason),
            TraceEvent::EnteredSubgraph { graph } => format!("called '{}'", graph),
            TraceEvent::ExitedSubgraph { successors } => {
                format!("returned -> {}", Self::plural(*successors, "token"))
            }
            TraceEvent::Discarded => "exit outside of a call, token discarded".to_string(),
        }
    }

    fn plural(count: usize, noun: &str) -> String {
        if count == 1 {
            format!("{} {}", count, noun)
        } else {
            format!("{} {}s", count, noun)
        }
    }
}
