use clap::Parser;
use nagare::prelude::*;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// --- JSON Deserialization Structs (Editor Format Specific) ---
// These structs match the node editor's `graph.json` export and are only used here for conversion.

#[derive(Deserialize)]
struct RawGraph {
    #[serde(default)]
    name: Option<String>,
    nodes: Vec<RawNode>,
    edges: Vec<RawEdge>,
}

#[derive(Deserialize)]
struct RawNode {
    id: String,
    data: RawNodeData,
}

#[derive(Deserialize)]
struct RawNodeData {
    #[serde(alias = "nodeType")]
    node_type: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    properties: ahash::AHashMap<String, serde_json::Value>,
    #[serde(default)]
    ports: Vec<PortDefinition>,
    #[serde(default)]
    subflow: Option<String>,
}

#[derive(Deserialize)]
struct RawEdge {
    source: String,
    #[serde(alias = "sourceHandle")]
    source_handle: String,
    target: String,
    #[serde(alias = "targetHandle")]
    target_handle: String,
}

/// A `RawGraph` together with the name it falls back to when the file has none.
struct NamedRawGraph {
    fallback_name: String,
    graph: RawGraph,
}

// --- Converter Implementation ---

impl IntoFlow for NamedRawGraph {
    fn into_flow(self) -> std::result::Result<FlowDefinition, FlowConversionError> {
        let name = self.graph.name.unwrap_or(self.fallback_name);
        if name.is_empty() {
            return Err(FlowConversionError::ValidationError(
                "graph has no name".to_string(),
            ));
        }

        let nodes = self
            .graph
            .nodes
            .into_iter()
            .map(|raw| FlowNodeDefinition {
                id: raw.id,
                node_type: raw.data.node_type,
                label: raw.data.label,
                properties: raw.data.properties,
                ports: raw.data.ports,
                subflow: raw.data.subflow,
            })
            .collect();

        let edges = self
            .graph
            .edges
            .into_iter()
            .map(|raw| FlowEdgeDefinition {
                source: raw.source,
                source_handle: raw.source_handle,
                target: raw.target,
                target_handle: raw.target_handle,
            })
            .collect();

        Ok(FlowDefinition { name, nodes, edges })
    }
}

/// Compiles and runs a node graph, printing its execution trace
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the main graph JSON file
    graph_path: String,

    /// Graphs callable from call nodes, by name (repeatable)
    #[arg(short, long = "subflow")]
    subflows: Vec<String>,

    /// Files are already in nagare's canonical FlowDefinition format
    #[arg(long)]
    canonical: bool,

    /// Seed for weighted branching
    #[arg(long)]
    seed: Option<u64>,

    /// Maximum number of steps per drain of the queue
    #[arg(long)]
    step_limit: Option<u64>,

    /// Do not resume strands suspended on timers
    #[arg(long)]
    no_resume: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "nagare=info")]
    log: String,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    run(cli);
}

fn run(cli: Cli) {
    let total_start = Instant::now();

    // --- 1. Loading and Conversion ---
    let load_start = Instant::now();
    let flow = load_flow(&cli.graph_path, cli.canonical);
    let subflows: Vec<FlowDefinition> = cli
        .subflows
        .iter()
        .map(|path| load_flow(path, cli.canonical))
        .collect();
    let load_duration = load_start.elapsed();

    // --- 2. Compilation ---
    println!("\nCompiling graph '{}'...", flow.name);
    let compile_start = Instant::now();
    let mut builder = Compiler::builder(flow);
    for subflow in subflows {
        println!("  + sub-flow '{}'", subflow.name);
        builder = builder.with_subflow(subflow);
    }
    let graph = builder
        .build()
        .compile()
        .unwrap_or_else(|e| exit_with_error(&format!("Compilation failed: {}", e)));
    let compile_duration = compile_start.elapsed();
    println!(
        "Compilation Successful! {} nodes, {} connections, {} entry node(s) in {:?}",
        graph.nodes().len(),
        graph.connections().len(),
        graph.entry_nodes().len(),
        compile_duration
    );

    // --- 3. Execution ---
    let timers = Arc::new(TimerQueue::new());
    let mut executor_builder = GraphExecutor::builder(graph)
        .host(timers.clone())
        .record_trace(true);
    if let Some(seed) = cli.seed {
        executor_builder = executor_builder.seed(seed);
    }
    if let Some(limit) = cli.step_limit {
        executor_builder = executor_builder.step_limit(limit);
    }
    let mut executor = executor_builder.build();

    println!("\nRunning...");
    let run_start = Instant::now();
    executor.start();
    let resumed = if cli.no_resume {
        0
    } else {
        timers.run_until_idle(&mut executor)
    };
    let run_duration = run_start.elapsed();

    // --- 4. Results and Summary ---
    let trace = executor
        .trace()
        .unwrap_or_else(|| exit_with_error("Executor did not record a trace"));
    println!("\n--- Execution Trace ---");
    println!("{}", TraceFormatter::format_trace(trace));

    let failures: Vec<_> = trace.failures().collect();
    if !failures.is_empty() {
        println!("\n--- Failed Strands ---");
        for record in &failures {
            println!("  {}", TraceFormatter::format_record(record));
        }
    }

    println!("\n--- Run Summary ---");
    println!("Steps:                {}", executor.steps());
    println!("Resumed from timers:  {}", resumed);
    println!("Still suspended:      {}", timers.pending_count());
    println!("Still queued:         {}", executor.pending());
    println!("Failed strands:       {}", failures.len());

    let total_duration = total_start.elapsed();
    println!("\n--- Performance Summary ---");
    println!("File Loading:         {:?}", load_duration);
    println!("Compilation:          {:?}", compile_duration);
    println!("Execution:            {:?}", run_duration);
    println!("-----------------------------");
    println!("Total:                {:?}", total_duration);
    println!();
}

fn load_flow(path: &str, canonical: bool) -> FlowDefinition {
    let json = fs::read_to_string(path).unwrap_or_else(|e| {
        exit_with_error(&format!("Failed to read graph file '{}': {}", path, e))
    });

    if canonical {
        return serde_json::from_str(&json).unwrap_or_else(|e| {
            exit_with_error(&format!("Failed to parse flow JSON '{}': {}", path, e))
        });
    }

    let graph: RawGraph = serde_json::from_str(&json).unwrap_or_else(|e| {
        exit_with_error(&format!("Failed to parse graph JSON '{}': {}", path, e))
    });
    let fallback_name = Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    NamedRawGraph {
        fallback_name,
        graph,
    }
    .into_flow()
    .unwrap_or_else(|e| exit_with_error(&format!("Failed to convert '{}' to a flow: {}", path, e)))
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
