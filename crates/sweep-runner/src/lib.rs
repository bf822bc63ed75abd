pub mod command;
pub mod config;
pub mod grid;
pub mod parse;
pub mod scheduler;
pub mod summary;
pub mod table;

#[cfg(test)]
pub(crate) mod test_support;

pub use command::{build_command, Settings};
pub use config::{load_config, ConfigOverrides, SweepConfig};
pub use grid::{build_tasks, ConfigId, Task};
pub use parse::{parse_result, ProcessResult};
pub use scheduler::{Launcher, ProcessLauncher, Scheduler};
pub use table::{Aggregator, Metric};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use grid::block_count;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

pub struct SweepResult {
    pub output: PathBuf,
    pub metric: Metric,
    pub task_count: usize,
    pub block_count: usize,
    pub table: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
}

#[derive(Debug, Clone)]
pub struct PlannedTask {
    pub task: Task,
    pub block: usize,
    pub command: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SweepPlan {
    pub instances: usize,
    pub configs: Vec<ConfigId>,
    pub parallel_tasks: usize,
    pub block_count: usize,
    pub output: PathBuf,
    pub metric: Metric,
    pub tasks: Vec<PlannedTask>,
}

/// Resolves the grid and every solver command without launching anything.
pub fn describe_sweep(config: &SweepConfig) -> Result<SweepPlan> {
    config.validate()?;
    let settings = config.settings();
    let tasks = build_tasks(config.instances, &config.configs);
    let planned = tasks
        .into_iter()
        .enumerate()
        .map(|(i, task)| PlannedTask {
            command: build_command(&task, &settings),
            block: i / config.parallel_tasks,
            task,
        })
        .collect::<Vec<_>>();
    Ok(SweepPlan {
        instances: config.instances,
        configs: config.configs.clone(),
        parallel_tasks: config.parallel_tasks,
        block_count: block_count(planned.len(), config.parallel_tasks),
        output: config.output.clone(),
        metric: config.metric,
        tasks: planned,
    })
}

pub fn run_sweep(config: &SweepConfig) -> Result<SweepResult> {
    run_sweep_with(config, ProcessLauncher)
}

/// Runs the whole grid through `launcher` and writes the table to
/// `config.output`. Nothing is written unless every task produced a result.
pub fn run_sweep_with<L: Launcher>(config: &SweepConfig, launcher: L) -> Result<SweepResult> {
    config.validate()?;
    let started_at = Utc::now();
    let clock = Instant::now();
    let settings = config.settings();
    let tasks = build_tasks(config.instances, &config.configs);
    info!(
        tasks = tasks.len(),
        instances = config.instances,
        configs = config.configs.len(),
        parallel_tasks = config.parallel_tasks,
        executable = %config.executable.display(),
        "starting sweep"
    );

    let scheduler = Scheduler::new(launcher, config.parallel_tasks)?;
    let mut aggregator = Aggregator::new(config.instances, config.configs.clone());
    let blocks = scheduler.run(&tasks, &settings, |report| {
        let merged = aggregator
            .absorb_block(report.outcomes)
            .with_context(|| format!("block {}/{} failed", report.index + 1, report.total))?;
        info!(
            block = report.index + 1,
            blocks = report.total,
            merged,
            "block drained"
        );
        anyhow::Ok(())
    })?;

    let table = aggregator.render(config.metric)?;
    table::write_table_atomic(&config.output, &table)
        .with_context(|| format!("failed to write result table {}", config.output.display()))?;
    let elapsed_seconds = clock.elapsed().as_secs_f64();
    info!(
        output = %config.output.display(),
        metric = %config.metric,
        elapsed_seconds,
        "sweep complete"
    );

    Ok(SweepResult {
        output: config.output.clone(),
        metric: config.metric,
        task_count: tasks.len(),
        block_count: blocks,
        table,
        started_at,
        elapsed_seconds,
    })
}
