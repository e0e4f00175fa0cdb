//! Execution environments: how much parallelism is available and where.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use camp_core::{CampError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::codes;

/// Source of environment variables.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The current process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for BTreeMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Environment configuration as read from YAML.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Overrides the detected parallelism.
    pub max_parallel: Option<usize>,
    /// Node list for `hpc.adhoc`, one host per line.
    pub nodefile: Option<PathBuf>,
    /// Concurrent runs per node for `hpc.adhoc`.
    pub jobs_per_node: Option<usize>,
}

/// A compute environment the executor runs in.
pub trait ExecEnv: Send + Sync {
    fn name(&self) -> &str;

    /// Cores available to concurrently executing runs; multi-threaded
    /// platforms divide this by their per-run threads.
    fn max_parallel(&self) -> usize;

    /// Extra arguments for the executor (remote login lists).
    fn executor_args(&self) -> Vec<String> {
        Vec::new()
    }

    /// Executables needed on `PATH`.
    fn required_executables(&self) -> Vec<String> {
        vec!["parallel".into()]
    }

    /// Environment variables that must be set.
    fn required_vars(&self) -> &'static [&'static str] {
        &[]
    }
}

fn missing_var(env: &str, key: &str) -> CampError {
    CampError::Exec(
        ErrorInfo::new(codes::PREFLIGHT, "required environment variable is not set")
            .with_context("env", env)
            .with_context("variable", key),
    )
}

fn bad_var(env: &str, key: &str, value: &str) -> CampError {
    CampError::Exec(
        ErrorInfo::new(codes::PREFLIGHT, "environment variable has an unexpected format")
            .with_context("env", env)
            .with_context("variable", key)
            .with_context("value", value),
    )
}

fn leading_count(value: &str) -> Option<usize> {
    let digits: String = value.trim().chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok().filter(|n| *n > 0)
}

/// Expands a compact SLURM host list such as `node[01-03,07],gpu1`.
pub fn expand_hostlist(list: &str) -> Vec<String> {
    let mut hosts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut items = Vec::new();
    for (idx, c) in list.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(&list[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    items.push(&list[start..]);

    for item in items.into_iter().map(str::trim).filter(|s| !s.is_empty()) {
        let Some((prefix, rest)) = item.split_once('[') else {
            hosts.push(item.to_string());
            continue;
        };
        let ranges = rest.trim_end_matches(']');
        for range in ranges.split(',') {
            match range.split_once('-') {
                Some((lo, hi)) => {
                    let width = lo.len();
                    if let (Ok(lo), Ok(hi)) = (lo.parse::<usize>(), hi.parse::<usize>()) {
                        hosts.extend((lo..=hi).map(|n| format!("{prefix}{n:0width$}")));
                    }
                }
                None => hosts.push(format!("{prefix}{range}")),
            }
        }
    }
    hosts
}

/// The machine camp runs on.
#[derive(Debug, Clone)]
pub struct LocalEnv {
    cores: usize,
}

impl LocalEnv {
    pub fn new(config: &EnvConfig) -> Self {
        let detected = std::thread::available_parallelism().map_or(1, |n| n.get());
        Self {
            cores: config.max_parallel.unwrap_or(detected).max(1),
        }
    }
}

impl ExecEnv for LocalEnv {
    fn name(&self) -> &str {
        "local"
    }

    fn max_parallel(&self) -> usize {
        self.cores
    }
}

/// A SLURM allocation.
#[derive(Debug, Clone)]
pub struct SlurmEnv {
    tasks_per_node: usize,
    cpus_per_task: usize,
    nodes: Vec<String>,
}

impl SlurmEnv {
    const VARS: [&'static str; 3] = [
        "SLURM_CPUS_PER_TASK",
        "SLURM_TASKS_PER_NODE",
        "SLURM_JOB_NODELIST",
    ];

    pub fn detect(source: &dyn EnvSource) -> Result<Self, CampError> {
        let get = |key: &str| source.var(key).ok_or_else(|| missing_var("hpc.slurm", key));
        let cpus = get("SLURM_CPUS_PER_TASK")?;
        let tasks = get("SLURM_TASKS_PER_NODE")?;
        let nodelist = get("SLURM_JOB_NODELIST")?;
        Ok(Self {
            cpus_per_task: leading_count(&cpus)
                .ok_or_else(|| bad_var("hpc.slurm", "SLURM_CPUS_PER_TASK", &cpus))?,
            // `2(x3)` means two tasks on each of three nodes
            tasks_per_node: leading_count(&tasks)
                .ok_or_else(|| bad_var("hpc.slurm", "SLURM_TASKS_PER_NODE", &tasks))?,
            nodes: expand_hostlist(&nodelist),
        })
    }

    fn cores_per_node(&self) -> usize {
        self.tasks_per_node * self.cpus_per_task
    }
}

impl ExecEnv for SlurmEnv {
    fn name(&self) -> &str {
        "hpc.slurm"
    }

    fn max_parallel(&self) -> usize {
        (self.cores_per_node() * self.nodes.len().max(1)).max(1)
    }

    fn executor_args(&self) -> Vec<String> {
        if self.nodes.len() > 1 {
            let logins = self
                .nodes
                .iter()
                .map(|node| format!("{}/{}", self.cores_per_node(), node))
                .collect::<Vec<_>>()
                .join(",");
            vec!["--sshlogin".into(), logins]
        } else {
            Vec::new()
        }
    }

    fn required_executables(&self) -> Vec<String> {
        if self.nodes.len() > 1 {
            vec!["parallel".into(), "ssh".into()]
        } else {
            vec!["parallel".into()]
        }
    }

    fn required_vars(&self) -> &'static [&'static str] {
        &Self::VARS
    }
}

/// A PBS/Torque allocation.
#[derive(Debug, Clone)]
pub struct PbsEnv {
    ppn: usize,
    nodefile: PathBuf,
    nodes: usize,
}

impl PbsEnv {
    const VARS: [&'static str; 2] = ["PBS_NUM_PPN", "PBS_NODEFILE"];

    pub fn detect(source: &dyn EnvSource) -> Result<Self, CampError> {
        let ppn_raw = source.var("PBS_NUM_PPN").ok_or_else(|| missing_var("hpc.pbs", "PBS_NUM_PPN"))?;
        let nodefile = source
            .var("PBS_NODEFILE")
            .map(PathBuf::from)
            .ok_or_else(|| missing_var("hpc.pbs", "PBS_NODEFILE"))?;
        Ok(Self {
            ppn: leading_count(&ppn_raw).ok_or_else(|| bad_var("hpc.pbs", "PBS_NUM_PPN", &ppn_raw))?,
            nodes: count_hosts(&nodefile)?,
            nodefile,
        })
    }
}

fn count_hosts(nodefile: &Path) -> Result<usize, CampError> {
    let text = fs::read_to_string(nodefile).map_err(|err| {
        CampError::Exec(
            ErrorInfo::new(codes::PREFLIGHT, err.to_string())
                .with_context("nodefile", nodefile.display().to_string()),
        )
    })?;
    let mut hosts: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    hosts.sort_unstable();
    hosts.dedup();
    Ok(hosts.len().max(1))
}

impl ExecEnv for PbsEnv {
    fn name(&self) -> &str {
        "hpc.pbs"
    }

    fn max_parallel(&self) -> usize {
        (self.ppn * self.nodes).max(1)
    }

    fn executor_args(&self) -> Vec<String> {
        vec!["--sshloginfile".into(), self.nodefile.display().to_string()]
    }

    fn required_executables(&self) -> Vec<String> {
        vec!["parallel".into(), "ssh".into()]
    }

    fn required_vars(&self) -> &'static [&'static str] {
        &Self::VARS
    }
}

/// A hand-made cluster described by a nodefile.
#[derive(Debug, Clone)]
pub struct AdhocEnv {
    nodefile: PathBuf,
    nodes: usize,
    jobs_per_node: usize,
}

impl AdhocEnv {
    pub fn new(config: &EnvConfig) -> Result<Self, CampError> {
        let nodefile = config.nodefile.clone().ok_or_else(|| {
            CampError::Exec(
                ErrorInfo::new(codes::PREFLIGHT, "hpc.adhoc needs a nodefile")
                    .with_hint("set env.nodefile in the configuration"),
            )
        })?;
        Ok(Self {
            nodes: count_hosts(&nodefile)?,
            nodefile,
            jobs_per_node: config.jobs_per_node.unwrap_or(1).max(1),
        })
    }
}

impl ExecEnv for AdhocEnv {
    fn name(&self) -> &str {
        "hpc.adhoc"
    }

    fn max_parallel(&self) -> usize {
        self.nodes * self.jobs_per_node
    }

    fn executor_args(&self) -> Vec<String> {
        vec!["--sshloginfile".into(), self.nodefile.display().to_string()]
    }

    fn required_executables(&self) -> Vec<String> {
        vec!["parallel".into(), "ssh".into()]
    }
}

fn local(config: &EnvConfig, _: &dyn EnvSource) -> Result<Box<dyn ExecEnv>, CampError> {
    Ok(Box::new(LocalEnv::new(config)))
}

fn slurm(_: &EnvConfig, source: &dyn EnvSource) -> Result<Box<dyn ExecEnv>, CampError> {
    Ok(Box::new(SlurmEnv::detect(source)?))
}

fn pbs(_: &EnvConfig, source: &dyn EnvSource) -> Result<Box<dyn ExecEnv>, CampError> {
    Ok(Box::new(PbsEnv::detect(source)?))
}

fn adhoc(config: &EnvConfig, _: &dyn EnvSource) -> Result<Box<dyn ExecEnv>, CampError> {
    Ok(Box::new(AdhocEnv::new(config)?))
}

type EnvFactory = fn(&EnvConfig, &dyn EnvSource) -> Result<Box<dyn ExecEnv>, CampError>;

/// Maps configured environment names to implementations.
#[derive(Clone)]
pub struct ExecEnvRegistry {
    factories: BTreeMap<String, EnvFactory>,
}

impl ExecEnvRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// `local`, `hpc.slurm`, `hpc.pbs` and `hpc.adhoc`.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("local", local);
        registry.register("hpc.slurm", slurm);
        registry.register("hpc.pbs", pbs);
        registry.register("hpc.adhoc", adhoc);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, factory: EnvFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Instantiates `name`; scheduler environments read their allocation
    /// from `source` and fail with a pre-flight error when it is absent.
    pub fn create(
        &self,
        name: &str,
        config: &EnvConfig,
        source: &dyn EnvSource,
    ) -> Result<Box<dyn ExecEnv>, CampError> {
        let factory = self.factories.get(name).ok_or_else(|| {
            CampError::Exec(
                ErrorInfo::new(codes::UNKNOWN_ENV, "execution environment is not registered")
                    .with_context("env", name)
                    .with_context("known", self.names().join(",")),
            )
        })?;
        factory(config, source)
    }
}

impl Default for ExecEnvRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn hostlists_expand() {
        assert_eq!(
            expand_hostlist("node[01-03,07],gpu1"),
            vec!["node01", "node02", "node03", "node07", "gpu1"]
        );
        assert_eq!(expand_hostlist("single"), vec!["single"]);
    }

    #[test]
    fn slurm_parallelism_spans_nodes() {
        let source = vars(&[
            ("SLURM_CPUS_PER_TASK", "4"),
            ("SLURM_TASKS_PER_NODE", "2(x3)"),
            ("SLURM_JOB_NODELIST", "n[1-3]"),
        ]);
        let env = ExecEnvRegistry::builtin()
            .create("hpc.slurm", &EnvConfig::default(), &source)
            .expect("slurm");
        assert_eq!(env.max_parallel(), 24);
        assert_eq!(env.executor_args(), vec!["--sshlogin", "8/n1,8/n2,8/n3"]);
        assert_eq!(env.required_executables(), vec!["parallel", "ssh"]);
    }

    #[test]
    fn single_node_slurm_stays_local() {
        let source = vars(&[
            ("SLURM_CPUS_PER_TASK", "2"),
            ("SLURM_TASKS_PER_NODE", "3"),
            ("SLURM_JOB_NODELIST", "n7"),
        ]);
        let env = SlurmEnv::detect(&source).expect("slurm");
        assert_eq!(env.max_parallel(), 6);
        assert!(env.executor_args().is_empty());
        assert_eq!(env.required_executables(), vec!["parallel"]);
    }

    #[test]
    fn slurm_without_allocation_fails_preflight() {
        let err = SlurmEnv::detect(&vars(&[("SLURM_CPUS_PER_TASK", "4")])).expect_err("missing");
        assert_eq!(err.code(), codes::PREFLIGHT);
        assert_eq!(
            err.info().context.get("variable").map(String::as_str),
            Some("SLURM_TASKS_PER_NODE")
        );
    }

    #[test]
    fn pbs_reads_nodefile() {
        let temp = tempfile::tempdir().expect("tmp dir");
        let nodefile = temp.path().join("nodes");
        fs::write(&nodefile, "a\na\nb\n").expect("write nodefile");
        let source = vars(&[
            ("PBS_NUM_PPN", "8"),
            ("PBS_NODEFILE", nodefile.to_str().expect("utf8")),
        ]);
        let env = PbsEnv::detect(&source).expect("pbs");
        assert_eq!(env.max_parallel(), 16);
    }

    #[test]
    fn local_honours_override() {
        let env = LocalEnv::new(&EnvConfig {
            max_parallel: Some(3),
            ..EnvConfig::default()
        });
        assert_eq!(env.max_parallel(), 3);
        assert!(ExecEnvRegistry::builtin()
            .create("cloud", &EnvConfig::default(), &vars(&[]))
            .is_err());
    }
}
