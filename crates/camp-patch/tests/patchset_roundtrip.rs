use camp_patch::{Change, Document, Element, PatchSet};
use proptest::prelude::*;

fn template() -> Document {
    Document::new(
        Element::new("argos-configuration")
            .with_child(
                Element::new("framework")
                    .with_child(Element::new("experiment").with_attr("length", "0"))
                    .with_child(Element::new("system").with_attr("threads", "0")),
            )
            .with_child(
                Element::new("arena").with_attr("size", "10, 10, 1").with_child(
                    Element::new("distribute")
                        .with_child(Element::new("entity").with_attr("quantity", "1")),
                ),
            )
            .with_child(Element::new("visualization")),
    )
}

fn sample_set() -> PatchSet {
    [
        Change::attribute(".//experiment", "length", "1000"),
        Change::attribute(".//entity", "quantity", "16"),
        Change::add(".//arena", "light", [("id", "l0"), ("intensity", "3.0")]),
        Change::remove(".", "visualization"),
    ]
    .into_iter()
    .collect()
}

#[test]
fn json_roundtrip_is_lossless() {
    let set = sample_set();
    let bytes = set.to_json_bytes().expect("encode");
    let decoded = PatchSet::from_json_bytes(&bytes).expect("decode");
    assert_eq!(set, decoded);
    assert_eq!(bytes, decoded.to_json_bytes().expect("re-encode"));
}

#[test]
fn yaml_roundtrip_is_lossless() {
    let set = sample_set();
    let text = set.to_yaml().expect("encode");
    assert_eq!(set, PatchSet::from_yaml(&text).expect("decode"));
}

#[test]
fn decoded_set_patches_identically() {
    let set = sample_set();
    let decoded = PatchSet::from_json_bytes(&set.to_json_bytes().expect("encode")).expect("decode");
    assert_eq!(
        set.apply(&template()).expect("apply"),
        decoded.apply(&template()).expect("apply decoded")
    );
}

#[test]
fn attribute_changes_are_idempotent() {
    let set: PatchSet = [
        Change::attribute(".//experiment", "length", "1000"),
        Change::attribute(".//system", "threads", "4"),
    ]
    .into_iter()
    .collect();
    let once = set.apply(&template()).expect("once");
    let twice = set.apply(&once).expect("twice");
    assert_eq!(once, twice);
}

#[test]
fn element_add_is_not_idempotent() {
    let set: PatchSet = [Change::add(".//arena", "light", [("id", "l0")])]
        .into_iter()
        .collect();
    let once = set.apply(&template()).expect("once");
    let twice = set.apply(&once).expect("twice");
    assert_eq!(once.select(".//light").expect("select").len(), 1);
    assert_eq!(twice.select(".//light").expect("select").len(), 2);
    assert_ne!(once, twice);
}

#[test]
fn documents_roundtrip_through_yaml() {
    let doc = sample_set().apply(&template()).expect("apply");
    let yaml = serde_yaml::to_string(&doc).expect("encode");
    let decoded: Document = serde_yaml::from_str(&yaml).expect("decode");
    assert_eq!(doc, decoded);
}

#[test]
fn documents_load_from_disk() {
    let dir = tempfile::tempdir().expect("tmp");
    let path = dir.path().join("template.yaml");
    std::fs::write(&path, serde_yaml::to_string(&template()).expect("yaml")).expect("write");
    assert_eq!(Document::load(&path).expect("load"), template());
}

fn arb_change() -> impl Strategy<Value = Change> {
    let name = "[a-z]{1,8}";
    prop_oneof![
        (name, name, "[ -~]{0,12}")
            .prop_map(|(p, a, v)| Change::attribute(format!(".//{p}"), a, v)),
        (name, name, proptest::collection::vec((name, "[a-z0-9]{0,6}"), 0..3))
            .prop_map(|(p, t, attrs)| Change::add(format!("./{p}"), t, attrs)),
        (name, name).prop_map(|(p, t)| Change::remove(format!(".//{p}[1]"), t)),
    ]
}

proptest! {
    #[test]
    fn arbitrary_sets_roundtrip(changes in proptest::collection::vec(arb_change(), 0..12)) {
        let set: PatchSet = changes.into_iter().collect();
        let json = set.to_json_bytes().expect("json");
        prop_assert_eq!(&set, &PatchSet::from_json_bytes(&json).expect("decode json"));
        let yaml = set.to_yaml().expect("yaml");
        prop_assert_eq!(&set, &PatchSet::from_yaml(&yaml).expect("decode yaml"));
    }
}
