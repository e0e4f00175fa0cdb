use std::path::PathBuf;

use camp_core::serde::{read_json, write_json};
use camp_core::{CampError, ErrorInfo, SeedPolicy};
use camp_criteria::{BatchCriteria, CellIndex, ParamTuple};
use camp_patch::{Change, Document, PatchSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codes;
use crate::definition::{ChangeLayer, ExperimentDefinition};
use crate::identity::{BatchManifest, ManifestEntry};
use crate::layout::{run_id, BatchLayout};

/// An attribute of a single template element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrTarget {
    /// Locator of the element.
    pub path: String,
    /// Attribute name.
    pub attribute: String,
}

impl AttrTarget {
    pub fn new(path: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            attribute: attribute.into(),
        }
    }

    fn set(&self, value: impl Into<String>) -> Change {
        Change::attribute(self.path.clone(), self.attribute.clone(), value)
    }
}

/// Where per-run values are written into the run document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunSpecialization {
    /// Receives the run seed.
    #[serde(default)]
    pub seed: Option<AttrTarget>,
    /// Receives the run output directory.
    #[serde(default)]
    pub output: Option<AttrTarget>,
}

/// One replicate of an experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentalRun {
    /// Zero-based run number.
    pub number: usize,
    /// Directory name, `run_<k>`.
    pub id: String,
    pub seed: u32,
    /// Rendered input document of the run.
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    /// Run-layer changes (seed, output path).
    pub changes: PatchSet,
}

/// One cell of the batch with its runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub name: String,
    /// Position in expansion order.
    pub ordinal: usize,
    pub index: CellIndex,
    pub params: ParamTuple,
    /// Definition before run specialization.
    pub definition: ExperimentDefinition,
    pub runs: Vec<ExperimentalRun>,
}

impl Experiment {
    /// Full definition of `run`, including the run layer.
    pub fn run_definition(&self, run: &ExperimentalRun) -> ExperimentDefinition {
        self.definition.specialize(&run.changes)
    }

    /// Persists the experiment to `inputs/definition.json`.
    pub fn store(&self, layout: &BatchLayout) -> Result<(), CampError> {
        write_json(&layout.definition_path(&self.name), self)
    }

    /// Reads a persisted experiment.
    pub fn load(layout: &BatchLayout, name: &str) -> Result<Self, CampError> {
        read_json(&layout.definition_path(name))
    }

    /// Applies every layer of `run` to `template`.
    pub fn render_run(
        &self,
        template: &Document,
        run: &ExperimentalRun,
    ) -> Result<Document, CampError> {
        self.run_definition(run).apply(template).map_err(|err| match err {
            CampError::Patch(info) => CampError::Patch(
                info.with_context("experiment", self.name.clone())
                    .with_context("run", run.id.clone()),
            ),
            other => other,
        })
    }

    fn manifest_entry(&self) -> ManifestEntry {
        ManifestEntry {
            name: self.name.clone(),
            index: self.index,
            params: self.params.clone(),
        }
    }
}

/// Ordered experiments of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchExperiment {
    pub layout: BatchLayout,
    pub param_names: Vec<String>,
    pub shape: Vec<usize>,
    pub experiments: Vec<Experiment>,
}

impl BatchExperiment {
    pub fn cardinality(&self) -> usize {
        self.experiments.len()
    }

    /// Runs per experiment.
    pub fn n_runs(&self) -> usize {
        self.experiments.first().map_or(0, |exp| exp.runs.len())
    }

    /// Manifest entries in expansion order.
    pub fn manifest_entries(&self) -> Vec<ManifestEntry> {
        self.experiments.iter().map(Experiment::manifest_entry).collect()
    }

    /// Reloads a generated batch from its manifest and persisted definitions.
    pub fn load(layout: &BatchLayout, manifest: &BatchManifest) -> Result<Self, CampError> {
        let experiments = manifest
            .experiments
            .iter()
            .map(|entry| Experiment::load(layout, &entry.name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            layout: layout.clone(),
            param_names: manifest.param_names.clone(),
            shape: manifest.shape.clone(),
            experiments,
        })
    }
}

/// Turns expanded criteria into experiment definitions for one template.
#[derive(Debug, Clone)]
pub struct ExperimentBuilder {
    template_stem: String,
    platform: PatchSet,
    project: PatchSet,
    n_runs: usize,
    seeds: SeedPolicy,
    specialization: RunSpecialization,
}

impl ExperimentBuilder {
    /// Builder for the template named `template_stem` with one run per experiment.
    pub fn new(template_stem: impl Into<String>) -> Self {
        Self {
            template_stem: template_stem.into(),
            platform: PatchSet::new(),
            project: PatchSet::new(),
            n_runs: 1,
            seeds: SeedPolicy::Reproducible { master_seed: 0 },
            specialization: RunSpecialization::default(),
        }
    }

    pub fn platform_changes(mut self, changes: PatchSet) -> Self {
        self.platform = changes;
        self
    }

    pub fn project_changes(mut self, changes: PatchSet) -> Self {
        self.project = changes;
        self
    }

    pub fn runs(mut self, n_runs: usize) -> Self {
        self.n_runs = n_runs;
        self
    }

    pub fn seed_policy(mut self, seeds: SeedPolicy) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn specialization(mut self, specialization: RunSpecialization) -> Self {
        self.specialization = specialization;
        self
    }

    /// Builds one experiment per criteria cell, in expansion order.
    ///
    /// Nothing is written; see [`Experiment::render_run`] for the
    /// per-run documents.
    pub fn build(
        &self,
        criteria: &BatchCriteria,
        layout: &BatchLayout,
    ) -> Result<BatchExperiment, CampError> {
        if self.n_runs == 0 {
            return Err(CampError::Experiment(
                ErrorInfo::new(codes::NO_RUNS, "experiments need at least one run")
                    .with_context("n_runs", "0"),
            ));
        }
        let common = ExperimentDefinition::new()
            .with_layer(ChangeLayer::Platform, &self.platform)
            .with_layer(ChangeLayer::Project, &self.project);

        let experiments = criteria
            .cells()
            .into_iter()
            .map(|cell| {
                let definition = common.clone().with_layer(ChangeLayer::Criteria, &cell.changes);
                let runs = self
                    .seeds
                    .seeds_for(cell.ordinal, self.n_runs)
                    .into_iter()
                    .enumerate()
                    .map(|(number, seed)| self.make_run(layout, &cell.name, number, seed))
                    .collect();
                debug!(experiment = %cell.name, changes = definition.len(), "built experiment");
                Experiment {
                    name: cell.name,
                    ordinal: cell.ordinal,
                    index: cell.index,
                    params: cell.params,
                    definition,
                    runs,
                }
            })
            .collect();

        Ok(BatchExperiment {
            layout: layout.clone(),
            param_names: criteria.param_names(),
            shape: criteria.dimensions().iter().map(|dim| dim.cardinality()).collect(),
            experiments,
        })
    }

    fn make_run(&self, layout: &BatchLayout, exp: &str, number: usize, seed: u32) -> ExperimentalRun {
        let output_dir = layout.run_output_dir(exp, number);
        let mut changes = PatchSet::new();
        if let Some(target) = &self.specialization.seed {
            changes.push(target.set(seed.to_string()));
        }
        if let Some(target) = &self.specialization.output {
            changes.push(target.set(output_dir.display().to_string()));
        }
        ExperimentalRun {
            number,
            id: run_id(number),
            seed,
            input_path: layout
                .run_input_dir(exp, number)
                .join(format!("{}.xml", self.template_stem)),
            output_dir,
            changes,
        }
    }
}
