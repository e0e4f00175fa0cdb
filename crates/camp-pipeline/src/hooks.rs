use camp_core::CampError;
use camp_exp::BatchLayout;

use crate::config::PipelineConfig;
use crate::stage::Stage;

/// What a hook can see.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub stage: Stage,
    pub config: &'a PipelineConfig,
    pub layout: &'a BatchLayout,
}

/// Deployment-specific actions around each stage. Every method defaults to
/// doing nothing; an error aborts the pipeline before (or after) the stage.
pub trait StageHooks {
    fn pre_stage(&self, _ctx: &StageContext<'_>) -> Result<(), CampError> {
        Ok(())
    }

    fn post_stage(&self, _ctx: &StageContext<'_>) -> Result<(), CampError> {
        Ok(())
    }
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl StageHooks for NoHooks {}
