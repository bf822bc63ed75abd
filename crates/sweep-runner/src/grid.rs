use serde::{Deserialize, Serialize};
use std::fmt;

/// Seed multiplier applied to the instance index.
pub const SEED_STRIDE: u64 = 100;

/// Identifier of a solver configuration, passed verbatim as `--config <id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigId {
    Index(i64),
    Tag(String),
}

impl ConfigId {
    /// Integers become `Index`, anything else a `Tag`.
    pub fn parse_token(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.parse::<i64>() {
            Ok(v) => ConfigId::Index(v),
            Err(_) => ConfigId::Tag(raw.to_string()),
        }
    }

    /// Why this id cannot be used as an unquoted table column and solver
    /// argument, if it cannot.
    pub fn label_problem(&self) -> Option<&'static str> {
        match self {
            ConfigId::Index(_) => None,
            ConfigId::Tag(tag) if tag.is_empty() => Some("is empty"),
            ConfigId::Tag(tag) if tag.contains(',') => Some("contains a comma"),
            ConfigId::Tag(tag) if tag.chars().any(char::is_whitespace) => {
                Some("contains whitespace")
            }
            ConfigId::Tag(_) => None,
        }
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigId::Index(v) => write!(f, "{}", v),
            ConfigId::Tag(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ConfigId {
    fn from(value: i64) -> Self {
        ConfigId::Index(value)
    }
}

impl From<&str> for ConfigId {
    fn from(value: &str) -> Self {
        ConfigId::Tag(value.to_string())
    }
}

/// One solver invocation: a problem instance paired with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Task {
    pub instance: usize,
    pub config: ConfigId,
}

impl Task {
    pub fn new(instance: usize, config: ConfigId) -> Self {
        Self { instance, config }
    }

    pub fn seed(&self) -> u64 {
        self.instance as u64 * SEED_STRIDE
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.instance, self.config)
    }
}

/// Expands `instances × configs` into tasks, instance-major and in the
/// declared configuration order.
pub fn build_tasks(instances: usize, configs: &[ConfigId]) -> Vec<Task> {
    let mut tasks = Vec::with_capacity(instances * configs.len());
    for instance in 0..instances {
        for config in configs {
            tasks.push(Task::new(instance, config.clone()));
        }
    }
    tasks
}

/// Contiguous blocks of at most `cap` tasks. A zero cap is treated as one;
/// callers validate the cap before scheduling.
pub fn partition_blocks(tasks: &[Task], cap: usize) -> Vec<&[Task]> {
    debug_assert!(cap > 0, "block capacity must be positive");
    tasks.chunks(cap.max(1)).collect()
}

pub fn block_count(task_count: usize, cap: usize) -> usize {
    task_count.div_ceil(cap.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ids(raw: &[i64]) -> Vec<ConfigId> {
        raw.iter().copied().map(ConfigId::from).collect()
    }

    #[test]
    fn build_tasks_is_instance_major_in_declared_order() {
        let configs = ids(&[3, 1, 2]);
        let tasks = build_tasks(2, &configs);
        let order: Vec<(usize, String)> = tasks
            .iter()
            .map(|t| (t.instance, t.config.to_string()))
            .collect();
        assert_eq!(
            order,
            vec![
                (0, "3".to_string()),
                (0, "1".to_string()),
                (0, "2".to_string()),
                (1, "3".to_string()),
                (1, "1".to_string()),
                (1, "2".to_string()),
            ]
        );
    }

    #[test]
    fn build_tasks_covers_every_pair_exactly_once() {
        for instances in 0..5 {
            for k in 0..4 {
                let configs: Vec<ConfigId> = (0..k as i64).map(ConfigId::from).collect();
                let tasks = build_tasks(instances, &configs);
                assert_eq!(tasks.len(), instances * k);
                let unique: HashSet<&Task> = tasks.iter().collect();
                assert_eq!(unique.len(), tasks.len());
            }
        }
    }

    #[test]
    fn empty_inputs_yield_no_tasks() {
        assert!(build_tasks(0, &ids(&[1, 2])).is_empty());
        assert!(build_tasks(4, &[]).is_empty());
    }

    #[test]
    fn seed_is_instance_times_hundred() {
        assert_eq!(Task::new(0, 2.into()).seed(), 0);
        assert_eq!(Task::new(7, "tabu".into()).seed(), 700);
    }

    #[test]
    fn partition_five_tasks_with_cap_two() {
        let tasks = build_tasks(5, &ids(&[0]));
        let blocks = partition_blocks(&tasks, 2);
        let sizes: Vec<usize> = blocks.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(block_count(tasks.len(), 2), 3);
        let flattened: Vec<Task> = blocks.concat();
        assert_eq!(flattened, tasks);
    }

    #[test]
    fn label_problem_flags_separators_and_blanks() {
        assert_eq!(ConfigId::Index(-4).label_problem(), None);
        assert_eq!(ConfigId::Tag("tabu_20".into()).label_problem(), None);
        assert_eq!(ConfigId::Tag(String::new()).label_problem(), Some("is empty"));
        assert_eq!(ConfigId::Tag("a,b".into()).label_problem(), Some("contains a comma"));
        assert_eq!(
            ConfigId::Tag("a\nb".into()).label_problem(),
            Some("contains whitespace")
        );
    }

    #[test]
    fn parse_token_distinguishes_integers_and_tags() {
        assert_eq!(ConfigId::parse_token("12"), ConfigId::Index(12));
        assert_eq!(ConfigId::parse_token(" vns "), ConfigId::Tag("vns".to_string()));
        assert_eq!(ConfigId::parse_token("-1").to_string(), "-1");
    }
}
