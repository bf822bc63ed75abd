use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use sweep_runner::command::render_command_line;
use sweep_runner::config::CONFIG_TEMPLATE;
use sweep_runner::summary::{read_table, summarize, ColumnStats};
use sweep_runner::{ConfigId, ConfigOverrides, Metric, SweepConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sweep", version, about = "Batched solver experiment runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MetricArg {
    #[value(name = "time")]
    Time,
    #[value(name = "cost")]
    Cost,
}

impl From<MetricArg> for Metric {
    fn from(value: MetricArg) -> Self {
        match value {
            MetricArg::Time => Metric::Time,
            MetricArg::Cost => Metric::Cost,
        }
    }
}

#[derive(Args, Debug)]
struct SweepArgs {
    /// YAML sweep definition; built-in defaults apply without it.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long)]
    executable: Option<PathBuf>,
    #[arg(long)]
    time_limit: Option<u64>,
    #[arg(long)]
    instances: Option<usize>,
    #[arg(long)]
    nnodes: Option<usize>,
    #[arg(long)]
    parallel_tasks: Option<usize>,
    #[arg(long, value_enum)]
    metric: Option<MetricArg>,
    /// Comma separated, e.g. `--configs 2,3,tabu`.
    #[arg(long, value_delimiter = ',')]
    configs: Option<Vec<String>>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every (instance, configuration) task and write the result table.
    Run {
        #[command(flatten)]
        sweep: SweepArgs,
        #[arg(long)]
        json: bool,
    },
    /// Print the task grid and solver commands without running anything.
    Describe {
        #[command(flatten)]
        sweep: SweepArgs,
        #[arg(long)]
        json: bool,
    },
    /// Per-configuration statistics of a written result table.
    Summarize {
        table: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Write a sweep definition template.
    Init {
        #[arg(long, default_value = "sweep.yaml")]
        path: PathBuf,
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let json_name = json_command(&cli.command);
    match run_command(cli.command) {
        Ok(Some(payload)) => {
            println!("{}", payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => match json_name {
            Some(name) => {
                println!("{}", failure_payload(name, &err));
                std::process::exit(1);
            }
            None => Err(err),
        },
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_command(command: Commands) -> Result<Option<Value>> {
    match command {
        Commands::Run { sweep, json } => {
            let config = resolve_config(sweep)?;
            let result = sweep_runner::run_sweep(&config)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "run",
                    "output": result.output.display().to_string(),
                    "metric": result.metric.as_str(),
                    "tasks": result.task_count,
                    "blocks": result.block_count,
                    "started_at": result.started_at.to_rfc3339(),
                    "elapsed_seconds": result.elapsed_seconds,
                })));
            }
            println!("output: {}", result.output.display());
            println!("metric: {}", result.metric);
            println!("tasks: {}", result.task_count);
            println!("blocks: {}", result.block_count);
            println!("elapsed_seconds: {:.3}", result.elapsed_seconds);
        }
        Commands::Describe { sweep, json } => {
            let config = resolve_config(sweep)?;
            let plan = sweep_runner::describe_sweep(&config)?;
            if json {
                let tasks: Vec<Value> = plan
                    .tasks
                    .iter()
                    .map(|t| {
                        json!({
                            "instance": t.task.instance,
                            "config": t.task.config.to_string(),
                            "seed": t.task.seed(),
                            "block": t.block,
                            "command": t.command,
                        })
                    })
                    .collect();
                return Ok(Some(json!({
                    "ok": true,
                    "command": "describe",
                    "instances": plan.instances,
                    "configs": plan.configs.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
                    "parallel_tasks": plan.parallel_tasks,
                    "blocks": plan.block_count,
                    "output": plan.output.display().to_string(),
                    "metric": plan.metric.as_str(),
                    "tasks": tasks,
                })));
            }
            println!("instances: {}", plan.instances);
            println!(
                "configs: {}",
                plan.configs
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            );
            println!("tasks: {}", plan.tasks.len());
            println!("parallel_tasks: {}", plan.parallel_tasks);
            println!("blocks: {}", plan.block_count);
            println!("output: {}", plan.output.display());
            println!("metric: {}", plan.metric);
            for t in &plan.tasks {
                println!("[block {}] {}", t.block + 1, render_command_line(&t.command));
            }
        }
        Commands::Summarize { table, json } => {
            let matrix = read_table(&table)?;
            let stats = summarize(&matrix);
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "summarize",
                    "table": table.display().to_string(),
                    "instances": matrix.rows.len(),
                    "columns": stats,
                })));
            }
            println!("table: {}", table.display());
            println!("instances: {}", matrix.rows.len());
            for column in &stats {
                print_column(column);
            }
        }
        Commands::Init { path, force } => {
            write_template(&path, force)?;
            println!("wrote: {}", path.display());
            println!("next: sweep describe --config {}", path.display());
        }
    }
    Ok(None)
}

fn resolve_config(args: SweepArgs) -> Result<SweepConfig> {
    let mut config = match &args.config {
        Some(path) => sweep_runner::load_config(path)?,
        None => SweepConfig::default(),
    };
    config.apply_overrides(ConfigOverrides {
        output: args.output,
        executable: args.executable,
        time_limit: args.time_limit,
        instances: args.instances,
        nnodes: args.nnodes,
        parallel_tasks: args.parallel_tasks,
        metric: args.metric.map(Into::into),
        configs: args
            .configs
            .map(|raw| raw.iter().map(|c| ConfigId::parse_token(c)).collect()),
    });
    Ok(config)
}

fn write_template(path: &Path, force: bool) -> Result<()> {
    if !force && path.exists() {
        return Err(anyhow::anyhow!(
            "sweep definition already exists (use --force): {}",
            path.display()
        ));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, CONFIG_TEMPLATE)?;
    Ok(())
}

fn print_column(column: &ColumnStats) {
    let fmt = |v: Option<f64>| v.map(|x| format!("{}", x)).unwrap_or_else(|| "-".to_string());
    println!(
        "config {}: samples={} unsolved={} mean={} min={} max={}",
        column.config,
        column.samples,
        column.unsolved,
        fmt(column.mean),
        fmt(column.min),
        fmt(column.max)
    );
}

/// The `--json` counterpart of an error exit: the command that failed, the
/// full context chain as one message, and each cause on its own.
fn failure_payload(command: &str, err: &anyhow::Error) -> Value {
    json!({
        "ok": false,
        "command": command,
        "error": {
            "code": "command_failed",
            "message": format!("{:#}", err),
            "causes": err.chain().skip(1).map(|c| c.to_string()).collect::<Vec<_>>(),
        }
    })
}

/// Name of the subcommand when it asked for JSON output.
fn json_command(command: &Commands) -> Option<&'static str> {
    match command {
        Commands::Run { json: true, .. } => Some("run"),
        Commands::Describe { json: true, .. } => Some("describe"),
        Commands::Summarize { json: true, .. } => Some("summarize"),
        _ => None,
    }
}
