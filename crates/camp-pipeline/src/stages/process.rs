//! Stage 3: collate run outputs.

use camp_collate::{CollationEngine, CollationReport};
use camp_core::CampError;
use camp_exp::{BatchExperiment, BatchLayout, BatchManifest};

use crate::artifacts::malformed;
use crate::config::PipelineConfig;
use crate::stage::Stage;

pub fn run(
    config: &PipelineConfig,
    layout: &BatchLayout,
    manifest: &BatchManifest,
) -> Result<CollationReport, CampError> {
    let batch = BatchExperiment::load(layout, manifest)
        .map_err(|err| malformed(Stage::Process, layout.batch_root(), err))?;
    CollationEngine::new(config.collate.clone()).process(&batch, manifest)
}
