use std::fs;
use std::path::Path;

use camp_collate::{
    codes, CollateConfig, CollationEngine, CollationReport, GapReason, Reduce, StatsMode,
    SummarySpec, Table,
};
use camp_criteria::{CriteriaExpander, CriteriaRegistry};
use camp_exp::{
    write_manifest, BatchCoordinates, BatchExperiment, BatchIdentity, BatchLayout, BatchManifest,
    ExperimentBuilder,
};

const CRITERIA: [&str; 2] = ["population_size.Log2", "noise.C2"];

fn generate(root: &Path) -> (BatchExperiment, BatchManifest) {
    let criteria = CriteriaExpander::new(CriteriaRegistry::builtin())
        .expand_batch(&CRITERIA)
        .expect("expand");
    let layout = BatchLayout::new(&BatchCoordinates {
        root: root.to_path_buf(),
        project: "p".into(),
        template_stem: "t".into(),
        controller: "c".into(),
        scenario: "s".into(),
        criteria: CRITERIA.iter().map(|s| s.to_string()).collect(),
        category: criteria.category(),
    });
    let batch = ExperimentBuilder::new("t")
        .runs(3)
        .build(&criteria, &layout)
        .expect("build");
    let manifest = write_manifest(
        &layout,
        BatchIdentity {
            project: "p".into(),
            template: "t.yaml".into(),
            controller: "c".into(),
            scenario: "s".into(),
            criteria: CRITERIA.iter().map(|s| s.to_string()).collect(),
            platform: "sim".into(),
            n_runs: 3,
            master_seed: Some(1),
        },
        batch.param_names.clone(),
        batch.shape.clone(),
        batch.manifest_entries(),
    )
    .expect("manifest");

    for exp in &batch.experiments {
        for run in &exp.runs {
            fs::create_dir_all(&run.output_dir).expect("mkdir");
            let base = exp.ordinal * 10 + run.number;
            let body: String = std::iter::once("t,collected\n".to_string())
                .chain((0..3).map(|t| format!("{t},{}\n", base + t)))
                .collect();
            fs::write(run.output_dir.join("metrics.csv"), body).expect("write run");
        }
    }
    fs::remove_file(batch.layout.run_output_dir("c1-exp0+c2-exp0", 2).join("metrics.csv"))
        .expect("drop one run");
    (batch, manifest)
}

fn config(strict: bool) -> CollateConfig {
    CollateConfig {
        stems: vec!["metrics".into()],
        mode: StatsMode::Conf95,
        summaries: vec![
            SummarySpec {
                name: None,
                stem: "metrics".into(),
                column: "collected".into(),
                reduce: Reduce::Last,
            },
            SummarySpec {
                name: Some("collected_series".into()),
                stem: "metrics".into(),
                column: "collected".into(),
                reduce: Reduce::Series,
            },
        ],
        strict,
        threads: 2,
    }
}

#[test]
fn one_missing_run_is_a_gap_not_a_failure() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let (batch, manifest) = generate(temp.path());
    let report = CollationEngine::new(config(false))
        .process(&batch, &manifest)
        .expect("collate");

    assert_eq!(report.gaps.len(), 1);
    assert_eq!(report.gaps[0].experiment, "c1-exp0+c2-exp0");
    assert_eq!(report.gaps[0].run.as_deref(), Some("run_2"));
    assert_eq!(report.gaps[0].reason, GapReason::Missing);

    let stats_dir = batch.layout.exp_statistics_dir("c1-exp0+c2-exp0");
    let mean = Table::read_csv(&stats_dir.join("metrics.mean.csv")).expect("mean");
    assert_eq!(mean.column("collected"), Some(vec![0.5, 1.5, 2.5]));
    assert!(stats_dir.join("metrics.ci95_hi.csv").is_file());
    assert!(!stats_dir.join("metrics.median.csv").exists());
    let gaps = fs::read_to_string(stats_dir.join("gaps.json")).expect("gaps");
    assert!(gaps.contains("run_2"));

    let summary = fs::read_to_string(batch.layout.collated_dir().join("summary.csv")).expect("summary");
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines[0], "exp,population_size,noise_level,metrics.collected");
    assert_eq!(lines[1], "c1-exp0+c2-exp0,1,0,2.5");
    assert_eq!(lines[2], "c1-exp0+c2-exp1,1,0.2,13");
    assert_eq!(lines.len(), 5);

    let matrix = fs::read_to_string(batch.layout.collated_dir().join("metrics.collected.matrix.csv"))
        .expect("matrix");
    assert_eq!(
        matrix.lines().collect::<Vec<_>>(),
        vec!["population_size\\noise_level,0,0.2", "1,2.5,13", "2,23,33"]
    );

    let series = Table::read_csv(&batch.layout.collated_dir().join("collected_series.series.csv"))
        .expect("series");
    assert_eq!(series.columns.len(), 4);
    assert_eq!(series.column("c1-exp1+c2-exp1"), Some(vec![31.0, 32.0, 33.0]));

    let reread = CollationReport::load(&batch.layout).expect("report");
    assert_eq!(reread.metrics, vec!["metrics.collected", "collected_series"]);
    assert_eq!(reread.files.len(), 3);
}

#[test]
fn strict_mode_promotes_gaps() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let (batch, manifest) = generate(temp.path());
    let err = CollationEngine::new(config(true))
        .process(&batch, &manifest)
        .expect_err("strict");
    assert_eq!(err.code(), codes::GAP);
    assert_eq!(err.info().context.get("count").map(String::as_str), Some("1"));
}

#[test]
fn missing_column_becomes_empty_cell() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let (batch, manifest) = generate(temp.path());
    let mut cfg = config(false);
    cfg.summaries = vec![SummarySpec {
        name: Some("speed".into()),
        stem: "metrics".into(),
        column: "speed".into(),
        reduce: Reduce::Mean,
    }];
    let report = CollationEngine::new(cfg).process(&batch, &manifest).expect("collate");
    assert_eq!(report.gaps.len(), 5);
    let summary = fs::read_to_string(batch.layout.collated_dir().join("summary.csv")).expect("summary");
    assert_eq!(summary.lines().nth(1), Some("c1-exp0+c2-exp0,1,0,"));
}
