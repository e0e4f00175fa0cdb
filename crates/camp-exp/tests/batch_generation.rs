use std::path::Path;

use camp_core::provenance::SCHEMA_MISMATCH;
use camp_core::{SchemaVersion, SeedPolicy};
use camp_criteria::{CriteriaExpander, CriteriaRegistry};
use camp_exp::{
    claim_batch, codes, write_manifest, AttrTarget, BatchCoordinates, BatchExperiment,
    BatchIdentity, BatchLayout, BatchManifest, ChangeLayer, Experiment, ExperimentBuilder,
    RunSpecialization,
};
use camp_patch::{Change, Document, Element};

fn template() -> Document {
    Document::new(
        Element::new("config")
            .with_child(Element::new("framework").with_child(Element::new("experiment")))
            .with_child(
                Element::new("arena").with_child(
                    Element::new("distribute").with_child(Element::new("entity").with_attr("quantity", "1")),
                ),
            )
            .with_child(Element::new("noise").with_attr("level", "0")),
    )
}

fn layout(root: &Path, criteria: &[&str]) -> BatchLayout {
    BatchLayout::new(&BatchCoordinates {
        root: root.to_path_buf(),
        project: "swarm".into(),
        template_stem: "foraging".into(),
        controller: "crw".into(),
        scenario: "SS.16x16".into(),
        criteria: criteria.iter().map(|s| s.to_string()).collect(),
        category: "population_size+noise".into(),
    })
}

fn identity(criteria: &[&str]) -> BatchIdentity {
    BatchIdentity {
        project: "swarm".into(),
        template: "foraging.yaml".into(),
        controller: "crw".into(),
        scenario: "SS.16x16".into(),
        criteria: criteria.iter().map(|s| s.to_string()).collect(),
        platform: "sim".into(),
        n_runs: 3,
        master_seed: Some(11),
    }
}

fn builder() -> ExperimentBuilder {
    ExperimentBuilder::new("foraging")
        .platform_changes(
            [Change::add(".", "visualization", [("enabled", "false")])]
                .into_iter()
                .collect(),
        )
        .project_changes(
            [Change::attribute(".//visualization", "enabled", "true")]
                .into_iter()
                .collect(),
        )
        .runs(3)
        .seed_policy(SeedPolicy::Reproducible { master_seed: 11 })
        .specialization(RunSpecialization {
            seed: Some(AttrTarget::new(".//framework/experiment", "random_seed")),
            output: Some(AttrTarget::new(".", "output_dir")),
        })
}

const CRITERIA: [&str; 2] = ["population_size.Linear100.C4", "noise.C3"];

#[test]
fn builds_layered_definitions_for_every_cell() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let layout = layout(temp.path(), &CRITERIA);
    let criteria = CriteriaExpander::new(CriteriaRegistry::builtin())
        .expand_batch(&CRITERIA)
        .expect("expand");
    let batch = builder().build(&criteria, &layout).expect("build");

    assert_eq!(batch.cardinality(), 12);
    assert_eq!(batch.n_runs(), 3);
    assert_eq!(batch.shape, vec![4, 3]);

    let exp = &batch.experiments[4];
    assert_eq!(exp.name, "c1-exp1+c2-exp1");
    assert_eq!(exp.definition.layer(ChangeLayer::Platform).len(), 1);
    assert_eq!(exp.definition.layer(ChangeLayer::Criteria).len(), 2);
    assert_eq!(exp.definition.layer(ChangeLayer::Run).len(), 0);

    let run = &exp.runs[2];
    assert_eq!(run.id, "run_2");
    assert_eq!(run.output_dir, layout.run_output_dir(&exp.name, 2));
    let doc = exp.render_run(&template(), run).expect("render");
    let entity = doc.select(".//entity").expect("select")[0];
    assert_eq!(entity.attr("quantity"), Some("50"));
    assert_eq!(doc.select(".//noise").expect("select")[0].attr("level"), Some("0.1"));
    assert_eq!(
        doc.select(".//visualization").expect("select")[0].attr("enabled"),
        Some("true")
    );
    let seed = run.seed.to_string();
    assert_eq!(
        doc.select(".//experiment").expect("select")[0].attr("random_seed"),
        Some(seed.as_str())
    );
}

#[test]
fn reproducible_seeds_survive_rebuild() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let layout = layout(temp.path(), &CRITERIA);
    let criteria = CriteriaExpander::new(CriteriaRegistry::builtin())
        .expand_batch(&CRITERIA)
        .expect("expand");
    let first = builder().build(&criteria, &layout).expect("build");
    let second = builder().build(&criteria, &layout).expect("build");
    assert_eq!(first, second);
    let seeds: Vec<u32> = first.experiments[0].runs.iter().map(|r| r.seed).collect();
    assert_eq!(seeds.len(), 3);
    assert_ne!(seeds, first.experiments[1].runs.iter().map(|r| r.seed).collect::<Vec<_>>());
}

#[test]
fn persisted_batch_reloads_identically() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let layout = layout(temp.path(), &CRITERIA);
    let criteria = CriteriaExpander::new(CriteriaRegistry::builtin())
        .expand_batch(&CRITERIA)
        .expect("expand");
    let batch = builder().build(&criteria, &layout).expect("build");
    for exp in &batch.experiments {
        exp.store(&layout).expect("store");
    }
    let manifest = write_manifest(
        &layout,
        identity(&CRITERIA),
        batch.param_names.clone(),
        batch.shape.clone(),
        batch.manifest_entries(),
    )
    .expect("manifest");
    assert!(manifest.is_bivariate());

    let reread = BatchManifest::load(&layout).expect("load manifest");
    assert_eq!(reread, manifest);
    let reloaded = BatchExperiment::load(&layout, &reread).expect("reload");
    assert_eq!(reloaded, batch);
    let single = Experiment::load(&layout, "c1-exp3+c2-exp2").expect("load exp");
    assert_eq!(single.ordinal, 11);
}

#[test]
fn manifests_from_a_newer_schema_are_refused() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let layout = layout(temp.path(), &CRITERIA);
    let mut manifest =
        write_manifest(&layout, identity(&CRITERIA), vec![], vec![12], vec![]).expect("manifest");
    manifest.provenance.schema_version = SchemaVersion::new(2, 0);
    manifest.store(&layout).expect("store");

    let err = BatchManifest::load(&layout).expect_err("newer schema");
    assert_eq!(err.code(), SCHEMA_MISMATCH);
    assert_eq!(err.info().context.get("found").map(String::as_str), Some("2.0"));
}

#[test]
fn regeneration_is_guarded_by_identity() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let layout = layout(temp.path(), &CRITERIA);
    let id = identity(&CRITERIA);
    claim_batch(&layout, &id, false).expect("fresh root");
    write_manifest(&layout, id.clone(), vec![], vec![12], vec![]).expect("manifest");

    let exists = claim_batch(&layout, &id, false).expect_err("exists");
    assert_eq!(exists.code(), codes::BATCH_EXISTS);
    claim_batch(&layout, &id, true).expect("overwrite allowed");

    let mut other = id.clone();
    other.n_runs = 5;
    for overwrite in [false, true] {
        let err = claim_batch(&layout, &other, overwrite).expect_err("mismatch");
        assert_eq!(err.code(), codes::IDENTITY_MISMATCH);
    }
}

#[test]
fn zero_runs_are_rejected() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let criteria = CriteriaExpander::new(CriteriaRegistry::builtin())
        .expand_batch(&["population_size.Log8"])
        .expect("expand");
    let err = ExperimentBuilder::new("foraging")
        .runs(0)
        .build(&criteria, &layout(temp.path(), &["population_size.Log8"]))
        .expect_err("no runs");
    assert_eq!(err.code(), codes::NO_RUNS);
}
