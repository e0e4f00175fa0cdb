use std::path::{Path, PathBuf};

use camp_collate::CollateConfig;
use camp_core::serde::read_structured;
use camp_core::{CampError, ErrorInfo, SeedPolicy};
use camp_criteria::CriteriaRegistry;
use camp_exec::{EnvConfig, ExecOptions, ExecutorConfig, PlatformSpec};
use camp_exp::RunSpecialization;
use camp_patch::PatchSet;
use serde::{Deserialize, Serialize};

use crate::codes;

/// Platform selection plus its settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Registry name: `sim`, `sim.threaded` or `robot`.
    pub name: String,
    #[serde(flatten)]
    pub spec: PlatformSpec,
    /// Changes every experiment on this platform needs.
    #[serde(default)]
    pub changes: PatchSet,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            name: "sim".into(),
            spec: PlatformSpec::default(),
            changes: PatchSet::new(),
        }
    }
}

/// Environment selection plus its settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecEnvConfig {
    /// Registry name: `local`, `hpc.slurm`, `hpc.pbs` or `hpc.adhoc`.
    pub name: String,
    #[serde(flatten)]
    pub settings: EnvConfig,
}

impl Default for ExecEnvConfig {
    fn default() -> Self {
        Self {
            name: "local".into(),
            settings: EnvConfig::default(),
        }
    }
}

/// Seeding of experimental runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub master: u64,
    /// Draw fresh seeds on every generation.
    pub random: bool,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            master: 0,
            random: false,
        }
    }
}

impl SeedConfig {
    pub fn policy(&self) -> SeedPolicy {
        if self.random {
            SeedPolicy::Random
        } else {
            SeedPolicy::Reproducible {
                master_seed: self.master,
            }
        }
    }
}

/// Batches and metrics for the compare stage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Other batch roots compared against this batch.
    pub batches: Vec<PathBuf>,
    /// Metrics to compare; all shared metrics when empty.
    pub metrics: Vec<String>,
    /// Output directory; defaults to `<output_root>/<project>/comparison`.
    pub output: Option<PathBuf>,
}

fn default_runs() -> usize {
    1
}

fn default_output_root() -> PathBuf {
    PathBuf::from("campaigns")
}

/// Full pipeline configuration, one YAML file.
///
/// Loaded once, overrides applied, then only ever read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub project: String,
    /// Template document (YAML or JSON).
    pub template: PathBuf,
    pub controller: String,
    pub scenario: String,
    /// One or two criteria expressions.
    pub criteria: Vec<String>,
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    #[serde(default = "default_runs")]
    pub n_runs: usize,
    #[serde(default)]
    pub seed: SeedConfig,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default)]
    pub specialization: RunSpecialization,
    #[serde(default)]
    pub project_changes: PatchSet,
    /// Criteria added to (or replacing) the built-in registry.
    #[serde(default)]
    pub criteria_defs: CriteriaRegistry,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub env: ExecEnvConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub exec: ExecOptions,
    #[serde(default)]
    pub collate: CollateConfig,
    #[serde(default)]
    pub compare: CompareConfig,
    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Command-line adjustments applied before the configuration is frozen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub n_runs: Option<usize>,
    pub output_root: Option<PathBuf>,
    pub overwrite: bool,
    pub resume: bool,
    pub dry_run: bool,
    pub strict: bool,
}

impl PipelineConfig {
    /// Reads `path` and applies `overrides`.
    pub fn load(path: &Path, overrides: &ConfigOverrides) -> Result<Self, CampError> {
        let mut config: PipelineConfig = read_structured(path)?;
        config.base_dir = path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        config.apply(overrides)?;
        config.validate()?;
        Ok(config)
    }

    /// Command-line paths are relative to the working directory, not the
    /// configuration file.
    fn apply(&mut self, overrides: &ConfigOverrides) -> Result<(), CampError> {
        if let Some(n_runs) = overrides.n_runs {
            self.n_runs = n_runs;
        }
        if let Some(root) = &overrides.output_root {
            self.output_root = if root.is_absolute() {
                root.clone()
            } else {
                let cwd = std::env::current_dir()
                    .map_err(|err| CampError::io("io.current_dir", root, err))?;
                cwd.join(root)
            };
        }
        self.overwrite |= overrides.overwrite;
        self.exec.resume |= overrides.resume;
        self.exec.dry_run |= overrides.dry_run;
        self.collate.strict |= overrides.strict;
        Ok(())
    }

    /// Checks what can be checked without touching the filesystem.
    pub fn validate(&self) -> Result<(), CampError> {
        let invalid = |field: &str, message: &str| {
            Err(CampError::Config(
                ErrorInfo::new(codes::INVALID_CONFIG, message).with_context("field", field),
            ))
        };
        if self.project.trim().is_empty() {
            return invalid("project", "project name is empty");
        }
        if self.criteria.is_empty() || self.criteria.len() > 2 {
            return invalid("criteria", "give one or two criteria expressions");
        }
        if self.n_runs == 0 {
            return invalid("n_runs", "at least one run per experiment is required");
        }
        Ok(())
    }

    /// Resolves `path` against the configuration directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn template_path(&self) -> PathBuf {
        self.resolve(&self.template)
    }

    pub fn template_stem(&self) -> String {
        self.template
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "template".into())
    }

    pub fn output_root(&self) -> PathBuf {
        self.resolve(&self.output_root)
    }

    /// Built-in criteria merged with the configured ones.
    pub fn criteria_registry(&self) -> CriteriaRegistry {
        let mut registry = CriteriaRegistry::builtin();
        registry.merge(&self.criteria_defs);
        registry
    }

    pub fn compare_output(&self) -> PathBuf {
        match &self.compare.output {
            Some(path) => self.resolve(path),
            None => self.output_root().join(&self.project).join("comparison"),
        }
    }
}
