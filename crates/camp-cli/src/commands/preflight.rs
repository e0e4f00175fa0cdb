use std::error::Error;
use std::path::PathBuf;

use camp_exec::{preflight, ExecEnvRegistry, PlatformRegistry, ProcessEnv};
use camp_pipeline::{ConfigOverrides, PipelineConfig};
use clap::Args;

#[derive(Args, Debug)]
pub struct PreflightArgs {
    /// Campaign configuration (YAML or JSON).
    #[arg(long)]
    pub config: PathBuf,
}

pub fn run(args: &PreflightArgs) -> Result<(), Box<dyn Error>> {
    let config = PipelineConfig::load(&args.config, &ConfigOverrides::default())?;
    let platform = PlatformRegistry::builtin().create(&config.platform.name, config.platform.spec.clone())?;
    let env = ExecEnvRegistry::builtin().create(&config.env.name, &config.env.settings, &ProcessEnv)?;
    let report = preflight(platform.as_ref(), env.as_ref(), &config.executor, &ProcessEnv)?;
    println!(
        "platform {} on {}: {} parallel slots",
        platform.name(),
        env.name(),
        report.max_parallel
    );
    for (name, path) in &report.executables {
        println!("  {name:<16} {}", path.display());
    }
    Ok(())
}
