use crate::command::{Settings, DEFAULT_PARSE_FRIENDLY_FLAG};
use crate::grid::ConfigId;
use crate::table::Metric;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Everything one sweep needs; every field has a default so a config file
/// only has to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    pub output: PathBuf,
    pub executable: PathBuf,
    pub parse_friendly_flag: String,
    pub time_limit: u64,
    pub instances: usize,
    pub nnodes: usize,
    pub parallel_tasks: usize,
    pub metric: Metric,
    pub configs: Vec<ConfigId>,
    pub extra_args: Vec<String>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("out.txt"),
            executable: PathBuf::from("./main"),
            parse_friendly_flag: DEFAULT_PARSE_FRIENDLY_FLAG.to_string(),
            time_limit: 30,
            instances: 5,
            nnodes: 50,
            parallel_tasks: 1,
            metric: Metric::Cost,
            configs: vec![ConfigId::Index(2), ConfigId::Index(3)],
            extra_args: Vec::new(),
        }
    }
}

/// Command-line values that win over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub output: Option<PathBuf>,
    pub executable: Option<PathBuf>,
    pub time_limit: Option<u64>,
    pub instances: Option<usize>,
    pub nnodes: Option<usize>,
    pub parallel_tasks: Option<usize>,
    pub metric: Option<Metric>,
    pub configs: Option<Vec<ConfigId>>,
}

impl SweepConfig {
    pub fn settings(&self) -> Settings {
        Settings {
            executable: self.executable.clone(),
            parse_friendly_flag: self.parse_friendly_flag.clone(),
            time_limit: self.time_limit,
            node_count: self.nnodes,
            extra_args: self.extra_args.clone(),
        }
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(v) = overrides.output {
            self.output = v;
        }
        if let Some(v) = overrides.executable {
            self.executable = v;
        }
        if let Some(v) = overrides.time_limit {
            self.time_limit = v;
        }
        if let Some(v) = overrides.instances {
            self.instances = v;
        }
        if let Some(v) = overrides.nnodes {
            self.nnodes = v;
        }
        if let Some(v) = overrides.parallel_tasks {
            self.parallel_tasks = v;
        }
        if let Some(v) = overrides.metric {
            self.metric = v;
        }
        if let Some(v) = overrides.configs {
            self.configs = v;
        }
    }

    /// Reports every problem at once rather than the first one found.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.parallel_tasks == 0 {
            problems.push("parallel_tasks must be at least 1".to_string());
        }
        if self.executable.as_os_str().is_empty() {
            problems.push("executable must not be empty".to_string());
        }
        if self.output.as_os_str().is_empty() {
            problems.push("output must not be empty".to_string());
        }
        // identity is the label the solver and the table see, not the variant
        let mut seen = HashSet::new();
        for config in &self.configs {
            let label = config.to_string();
            if let Some(problem) = config.label_problem() {
                problems.push(format!("configuration `{}` {}", label.escape_debug(), problem));
            } else if !seen.insert(label.clone()) {
                problems.push(format!("configuration `{}` is listed more than once", label));
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(anyhow!(
                "invalid sweep configuration:\n{}",
                problems
                    .iter()
                    .map(|p| format!("  - {}", p))
                    .collect::<Vec<_>>()
                    .join("\n")
            ))
        }
    }
}

pub fn load_config(path: &Path) -> Result<SweepConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read sweep config {}", path.display()))?;
    parse_config(&raw).with_context(|| format!("failed to parse sweep config {}", path.display()))
}

pub fn parse_config(raw: &str) -> Result<SweepConfig> {
    if raw.trim().is_empty() {
        return Ok(SweepConfig::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

pub const CONFIG_TEMPLATE: &str = "\
# Sweep definition. Every key is optional; the values below are the defaults.
output: out.txt                 # result table, written once every task succeeded
executable: ./main              # solver binary
parse_friendly_flag: --parsefriendly
time_limit: 30                  # seconds, forwarded as -t; the solver enforces it
instances: 5                    # instance i runs with --seed i*100
nnodes: 50
parallel_tasks: 1               # processes launched together per block
metric: cost                    # time | cost
configs: [2, 3]                 # integers or tags, column order of the table
extra_args: []                  # appended to every solver command
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_to_defaults() {
        let parsed = parse_config(CONFIG_TEMPLATE).expect("template");
        assert_eq!(parsed, SweepConfig::default());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed = parse_config("parallel_tasks: 4\nconfigs: [0, tabu, 7]\nmetric: time\n")
            .expect("partial");
        assert_eq!(parsed.parallel_tasks, 4);
        assert_eq!(parsed.metric, Metric::Time);
        assert_eq!(
            parsed.configs,
            vec![
                ConfigId::Index(0),
                ConfigId::Tag("tabu".to_string()),
                ConfigId::Index(7)
            ]
        );
        assert_eq!(parsed.time_limit, 30);
        assert_eq!(parsed.executable, PathBuf::from("./main"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_config("paralel_tasks: 2\n").is_err());
        assert!(parse_config("metric: quality\n").is_err());
    }

    #[test]
    fn overrides_win_over_file_values() {
        let mut config = parse_config("instances: 3\nnnodes: 100\n").expect("config");
        config.apply_overrides(ConfigOverrides {
            instances: Some(8),
            metric: Some(Metric::Time),
            ..ConfigOverrides::default()
        });
        assert_eq!(config.instances, 8);
        assert_eq!(config.nnodes, 100);
        assert_eq!(config.metric, Metric::Time);
    }

    #[test]
    fn validate_reports_all_problems() {
        let config = SweepConfig {
            parallel_tasks: 0,
            configs: vec![ConfigId::Index(1), ConfigId::Index(1)],
            ..SweepConfig::default()
        };
        let msg = config.validate().expect_err("invalid").to_string();
        assert!(msg.contains("parallel_tasks"), "{}", msg);
        assert!(msg.contains("`1` is listed more than once"), "{}", msg);
        SweepConfig::default().validate().expect("defaults are valid");
    }

    #[test]
    fn validate_rejects_labels_that_break_the_table() {
        for bad in ["a,b", "", "two words", "tab\tbed", "line\nbreak"] {
            let config = SweepConfig {
                configs: vec![ConfigId::Index(2), ConfigId::Tag(bad.to_string())],
                ..SweepConfig::default()
            };
            let msg = config.validate().expect_err("bad label").to_string();
            assert!(msg.contains("configuration"), "{:?}: {}", bad, msg);
        }
    }

    #[test]
    fn validate_compares_labels_not_variants() {
        let config = parse_config("configs: [3, \"3\"]\n").expect("config");
        assert_eq!(
            config.configs,
            vec![ConfigId::Index(3), ConfigId::Tag("3".to_string())]
        );
        let msg = config.validate().expect_err("duplicate label").to_string();
        assert!(msg.contains("`3` is listed more than once"), "{}", msg);
    }

    #[test]
    fn settings_mirror_config() {
        let config = SweepConfig {
            nnodes: 2000,
            extra_args: vec!["-p".to_string()],
            ..SweepConfig::default()
        };
        let settings = config.settings();
        assert_eq!(settings.node_count, 2000);
        assert_eq!(settings.parse_friendly_flag, "--parsefriendly");
        assert_eq!(settings.extra_args, vec!["-p".to_string()]);
    }
}
