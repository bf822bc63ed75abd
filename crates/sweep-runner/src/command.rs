use crate::grid::Task;
use std::path::PathBuf;

pub const DEFAULT_PARSE_FRIENDLY_FLAG: &str = "--parsefriendly";

/// Harness-wide values threaded into every solver command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub executable: PathBuf,
    pub parse_friendly_flag: String,
    /// Seconds; advisory, enforced by the solver itself.
    pub time_limit: u64,
    pub node_count: usize,
    pub extra_args: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("./main"),
            parse_friendly_flag: DEFAULT_PARSE_FRIENDLY_FLAG.to_string(),
            time_limit: 30,
            node_count: 50,
            extra_args: Vec::new(),
        }
    }
}

/// `executable flag -r -t <limit> --config <id> --seed <seed> --nnodes <n> [extra..]`
pub fn build_command(task: &Task, settings: &Settings) -> Vec<String> {
    let mut command = vec![
        settings.executable.to_string_lossy().to_string(),
        settings.parse_friendly_flag.clone(),
        "-r".to_string(),
        "-t".to_string(),
        settings.time_limit.to_string(),
        "--config".to_string(),
        task.config.to_string(),
        "--seed".to_string(),
        task.seed().to_string(),
        "--nnodes".to_string(),
        settings.node_count.to_string(),
    ];
    command.extend(settings.extra_args.iter().cloned());
    command
}

/// Renders a solver command as one line that can be pasted into a shell to
/// rerun that task by hand. Arguments outside a conservative safe set are
/// single-quoted.
pub fn render_command_line(command: &[String]) -> String {
    let mut line = String::new();
    for (i, arg) in command.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        push_shell_word(&mut line, arg);
    }
    line
}

fn push_shell_word(line: &mut String, arg: &str) {
    let bare = !arg.is_empty()
        && arg.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | ',' | '+')
        });
    if bare {
        line.push_str(arg);
        return;
    }
    line.push('\'');
    for c in arg.chars() {
        if c == '\'' {
            line.push_str("'\\''");
        } else {
            line.push(c);
        }
    }
    line.push('\'');
}
