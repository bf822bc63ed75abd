use crate::command::{build_command, Settings};
use crate::grid::{partition_blocks, Task};
use crate::parse::{parse_result, ParseError, ProcessResult};
use std::io;
use std::process::{Child, Command, Stdio};
use std::thread;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("not launched after an earlier launch failure in the same block")]
    NotLaunched,
    #[error("failed to collect solver output: {0}")]
    Collect(#[source] io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("concurrency cap must be at least 1")]
    ZeroCapacity,
}

/// Exit status and drained stdout of one finished process.
#[derive(Debug, Clone)]
pub struct Finished {
    /// `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
}

/// Starts solver processes and collects them once they exit.
///
/// `launch` must not block on the process; `finish` blocks until the process
/// has exited and its stdout has been read to the end. `finish` runs on a
/// dedicated thread per process, so handles must be `Send`.
pub trait Launcher: Sync {
    type Handle: Send;

    fn launch(&self, command: &[String]) -> io::Result<Self::Handle>;

    fn finish(&self, handle: Self::Handle) -> io::Result<Finished>;
}

/// Runs solver commands as child processes with stdout piped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    type Handle = Child;

    fn launch(&self, command: &[String]) -> io::Result<Child> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
    }

    fn finish(&self, child: Child) -> io::Result<Finished> {
        let output = child.wait_with_output()?;
        Ok(Finished {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        })
    }
}

/// Result of one task, success or failure, kept alongside its identity.
#[derive(Debug)]
pub struct TaskOutcome {
    pub task: Task,
    pub result: Result<ProcessResult, TaskError>,
}

/// A fully drained block handed to the caller.
#[derive(Debug)]
pub struct BlockReport {
    /// Zero-based.
    pub index: usize,
    pub total: usize,
    pub outcomes: Vec<TaskOutcome>,
}

/// Gang-barrier scheduler: every block of `cap` tasks is launched together
/// and fully drained before the next block starts.
pub struct Scheduler<L> {
    launcher: L,
    cap: usize,
}

impl<L: Launcher> Scheduler<L> {
    pub fn new(launcher: L, cap: usize) -> Result<Self, SchedulerError> {
        if cap == 0 {
            return Err(SchedulerError::ZeroCapacity);
        }
        Ok(Self { launcher, cap })
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Executes `tasks` block by block, handing each drained block to
    /// `on_block`. Stops at the first error `on_block` returns; blocks after
    /// it are never launched. Returns the number of blocks executed.
    pub fn run<F, E>(&self, tasks: &[Task], settings: &Settings, mut on_block: F) -> Result<usize, E>
    where
        F: FnMut(BlockReport) -> Result<(), E>,
    {
        let blocks = partition_blocks(tasks, self.cap);
        let total = blocks.len();
        for (index, block) in blocks.into_iter().enumerate() {
            info!(block = index + 1, blocks = total, tasks = block.len(), "running block");
            let outcomes = self.run_block(block, settings);
            on_block(BlockReport {
                index,
                total,
                outcomes,
            })?;
        }
        Ok(total)
    }

    /// Launches every task of `block`, then waits for all of them. The first
    /// launch failure stops further launches; tasks after it are reported as
    /// `NotLaunched` and only the processes already running are collected.
    pub fn run_block(&self, block: &[Task], settings: &Settings) -> Vec<TaskOutcome> {
        let mut launched: Vec<Result<L::Handle, TaskError>> = Vec::with_capacity(block.len());
        for task in block {
            let command = build_command(task, settings);
            debug!(instance = task.instance, config = %task.config, "launching solver");
            match self.launcher.launch(&command) {
                Ok(handle) => launched.push(Ok(handle)),
                Err(source) => {
                    warn!(
                        instance = task.instance,
                        config = %task.config,
                        error = %source,
                        "solver launch failed, skipping rest of block"
                    );
                    launched.push(Err(TaskError::Launch {
                        program: command[0].clone(),
                        source,
                    }));
                    break;
                }
            }
        }
        while launched.len() < block.len() {
            launched.push(Err(TaskError::NotLaunched));
        }

        let launcher = &self.launcher;
        let finished: Vec<Result<Finished, TaskError>> = thread::scope(|scope| {
            let joins: Vec<_> = launched
                .into_iter()
                .map(|handle| {
                    scope.spawn(move || {
                        let handle = handle?;
                        launcher.finish(handle).map_err(TaskError::Collect)
                    })
                })
                .collect();
            joins
                .into_iter()
                .map(|join| {
                    join.join().unwrap_or_else(|_| {
                        Err(TaskError::Collect(io::Error::other(
                            "output collector thread panicked",
                        )))
                    })
                })
                .collect()
        });

        block
            .iter()
            .zip(finished)
            .map(|(task, finished)| {
                let result = finished.and_then(|out| {
                    match out.status {
                        Some(0) => {}
                        Some(code) => warn!(
                            instance = task.instance,
                            config = %task.config,
                            status = code,
                            "solver exited with non-zero status"
                        ),
                        None => warn!(
                            instance = task.instance,
                            config = %task.config,
                            "solver terminated by signal"
                        ),
                    }
                    parse_result(&out.stdout).map_err(TaskError::from)
                });
                TaskOutcome {
                    task: task.clone(),
                    result,
                }
            })
            .collect()
    }
}
