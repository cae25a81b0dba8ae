use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use trellis_engine::{
    EngineOptions, LogEntry, LogKind, NodeConfig, RunRecord, RunResult, RunStatus, SharedLogObserver,
    WorkflowEngine, WorkflowGraph,
};
use trellis_llm::{LlmAdapter, MockLlm, OpenAiAdapter};

#[derive(Parser, Debug)]
#[command(name = "trellis-cli")]
#[command(about = "In-process CLI host for the Trellis workflow engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    #[arg(long)]
    graph_file: Option<PathBuf>,
    #[arg(long)]
    graph_json: Option<String>,
    #[arg(long)]
    run_id: Option<String>,
    /// Directory for persisted run records; no record is written without it.
    #[arg(long)]
    runs_dir: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = AdapterMode::Mock)]
    adapter: AdapterMode,
    #[arg(long, value_enum, default_value_t = ApproverMode::Auto)]
    approver: ApproverMode,
    /// Queued approval answers, consumed in order (with `--approver queue`).
    #[arg(long = "answer")]
    answers: Vec<String>,
    #[arg(long, action = ArgAction::SetTrue)]
    quiet: bool,
    #[arg(long, action = ArgAction::SetTrue)]
    log_json: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AdapterMode {
    Mock,
    Openai,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ApproverMode {
    Auto,
    Console,
    Queue,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => run_command(args).await,
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

async fn run_command(args: RunArgs) -> Result<ExitCode, String> {
    let source = load_graph_source(args.graph_file.as_deref(), args.graph_json.as_deref())?;
    let graph: WorkflowGraph =
        serde_json::from_str(&source).map_err(|error| format!("invalid graph JSON: {error}"))?;

    let llm = build_adapter(args.adapter)?;
    let mut engine = WorkflowEngine::new(
        graph,
        EngineOptions {
            run_id: args.run_id,
            llm: Some(llm),
            log_observer: log_printer(args.quiet, args.log_json),
            ..EngineOptions::default()
        },
    );

    let mut approver = build_approver(args.approver, args.answers);
    let mut result = engine.run().await;
    persist_record(&engine, args.runs_dir.as_deref()).await?;

    while result.status == RunStatus::Paused {
        let message = gate_message(&engine, result.current_node_id.as_deref());
        let answer = approver.answer(&message)?;
        result = engine.resume(answer).await;
        persist_record(&engine, args.runs_dir.as_deref()).await?;
    }

    print_run_summary(&result);
    Ok(exit_code_for_status(result.status))
}

fn load_graph_source(
    graph_file: Option<&Path>,
    graph_json: Option<&str>,
) -> Result<String, String> {
    match (graph_file, graph_json) {
        (Some(_), Some(_)) => Err("provide only one of --graph-file or --graph-json".to_string()),
        (None, None) => Err("one of --graph-file or --graph-json is required".to_string()),
        (Some(path), None) => std::fs::read_to_string(path)
            .map_err(|e| format!("failed reading graph file '{}': {e}", path.display())),
        (None, Some(source)) => Ok(source.to_string()),
    }
}

fn build_adapter(mode: AdapterMode) -> Result<Arc<dyn LlmAdapter>, String> {
    match mode {
        AdapterMode::Mock => Ok(Arc::new(MockLlm)),
        AdapterMode::Openai => {
            let _ = dotenvy::from_filename(".env.local");
            let _ = dotenvy::from_filename(".env");
            let adapter = OpenAiAdapter::from_env().map_err(|error| error.to_string())?;
            Ok(Arc::new(adapter))
        }
    }
}

enum Approver {
    AutoApprove,
    Console,
    Queue(VecDeque<String>),
}

impl Approver {
    fn answer(&mut self, message: &str) -> Result<Value, String> {
        match self {
            Self::AutoApprove => Ok(json!({ "decision": "approve" })),
            Self::Console => {
                println!("approval requested: {message}");
                print!("answer (empty approves, \"reject\" rejects): ");
                std::io::stdout()
                    .flush()
                    .map_err(|error| error.to_string())?;
                let mut line = String::new();
                std::io::stdin()
                    .read_line(&mut line)
                    .map_err(|error| error.to_string())?;
                Ok(parse_answer(&line))
            }
            Self::Queue(answers) => Ok(answers
                .pop_front()
                .map(|raw| parse_answer(&raw))
                .unwrap_or_else(|| json!({ "decision": "approve" }))),
        }
    }
}

fn build_approver(mode: ApproverMode, answers: Vec<String>) -> Approver {
    match mode {
        ApproverMode::Auto => {
            if is_interactive_terminal() {
                Approver::Console
            } else {
                Approver::AutoApprove
            }
        }
        ApproverMode::Console => Approver::Console,
        ApproverMode::Queue => Approver::Queue(answers.into()),
    }
}

/// Structured answers pass through as JSON; everything else resumes as a
/// plain string, where a "reject" substring rejects. An empty answer
/// approves.
fn parse_answer(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return json!({ "decision": "approve" });
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

fn gate_message(engine: &WorkflowEngine, node_id: Option<&str>) -> String {
    node_id
        .and_then(|id| engine.graph().node(id))
        .and_then(|node| match &node.config {
            NodeConfig::Approval { message } if !message.is_empty() => Some(message.clone()),
            _ => None,
        })
        .unwrap_or_else(|| "Waiting for user approval".to_string())
}

async fn persist_record(engine: &WorkflowEngine, runs_dir: Option<&Path>) -> Result<(), String> {
    if let Some(dir) = runs_dir {
        RunRecord::from_engine(engine)
            .save(dir)
            .await
            .map_err(|error| format!("failed writing run record: {error}"))?;
    }
    Ok(())
}

fn log_printer(quiet: bool, log_json: bool) -> Option<SharedLogObserver> {
    if quiet {
        return None;
    }
    let observer: SharedLogObserver = Arc::new(move |entry: &LogEntry| {
        if log_json {
            match serde_json::to_string(entry) {
                Ok(line) => println!("{line}"),
                Err(_) => print_entry_text(entry),
            }
        } else {
            print_entry_text(entry);
        }
    });
    Some(observer)
}

fn print_entry_text(entry: &LogEntry) {
    println!(
        "[{}] {} {}: {}",
        entry.timestamp,
        entry.node_id,
        kind_label(entry.kind),
        entry.content
    );
}

fn kind_label(kind: LogKind) -> &'static str {
    match kind {
        LogKind::StepStart => "step_start",
        LogKind::WaitInput => "wait_input",
        LogKind::InputReceived => "input_received",
        LogKind::LogicCheck => "logic_check",
        LogKind::StartPrompt => "start_prompt",
        LogKind::LlmResponse => "llm_response",
        LogKind::LlmError => "llm_error",
        LogKind::Warn => "warn",
        LogKind::Error => "error",
    }
}

fn print_run_summary(result: &RunResult) {
    println!("run_id: {}", result.run_id);
    println!("status: {}", result.status.as_str());
    println!("log_entries: {}", result.logs.len());
    if let Some(Value::String(output)) = result.state.get("last_output") {
        println!("last_output: {output}");
    }
}

fn exit_code_for_status(status: RunStatus) -> ExitCode {
    match status {
        RunStatus::Completed => ExitCode::SUCCESS,
        _ => ExitCode::from(2),
    }
}

fn is_interactive_terminal() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}
