//! Stage entry preconditions.

use std::path::Path;

use camp_collate::COLLATION_FILE;
use camp_core::{CampError, ErrorInfo};
use camp_exp::{BatchLayout, BatchManifest};

use crate::codes;
use crate::stage::Stage;

/// Name of the deliverables manifest.
pub const DELIVERABLES_MANIFEST: &str = "manifest.json";

fn missing(stage: Stage, path: &Path) -> CampError {
    let producer = stage.producer().map_or("none", Stage::name);
    CampError::Stage(
        ErrorInfo::new(codes::MISSING_ARTIFACT, "required artifact is missing")
            .with_context("stage", stage.name())
            .with_context("artifact", path.display().to_string())
            .with_context("producer", producer)
            .with_hint(format!("run the {producer} stage first")),
    )
}

/// Fails with `stage.missing_artifact` unless `path` exists.
pub fn require(stage: Stage, path: &Path) -> Result<(), CampError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(missing(stage, path))
    }
}

/// Loads `batch.json`, reporting absence against `stage`.
pub fn require_manifest(stage: Stage, layout: &BatchLayout) -> Result<BatchManifest, CampError> {
    require(stage, &layout.manifest_path())?;
    BatchManifest::load(layout).map_err(|err| malformed(stage, &layout.manifest_path(), err))
}

/// Wraps a parse failure of a present artifact.
pub fn malformed(stage: Stage, path: &Path, err: CampError) -> CampError {
    CampError::Stage(
        ErrorInfo::new(codes::MALFORMED_ARTIFACT, err.info().message.clone())
            .with_context("stage", stage.name())
            .with_context("artifact", path.display().to_string()),
    )
}

/// Checks every artifact `stage` consumes from its producer.
pub fn check_preconditions(stage: Stage, layout: &BatchLayout) -> Result<(), CampError> {
    match stage {
        Stage::Generate => Ok(()),
        Stage::Execute => {
            let manifest = require_manifest(stage, layout)?;
            for entry in &manifest.experiments {
                require(stage, &layout.definition_path(&entry.name))?;
                require(stage, &layout.commands_path(&entry.name))?;
            }
            Ok(())
        }
        Stage::Process => {
            let manifest = require_manifest(stage, layout)?;
            for entry in &manifest.experiments {
                require(stage, &layout.exec_status_path(&entry.name))?;
            }
            Ok(())
        }
        Stage::Deliver => require(stage, &layout.collated_dir().join(COLLATION_FILE)),
        Stage::Compare => require(stage, &layout.deliverables_dir().join(DELIVERABLES_MANIFEST)),
    }
}
