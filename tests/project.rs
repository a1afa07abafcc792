use std::fs;
use std::path::Path;

use cardfile::{
    CardStore, CardValue, FileKind, JsonlStore, MemoryStore, Project, Settings, TargetId,
    TranscodeWarning,
};
use pretty_assertions::assert_eq;

const PRJ: &str = "\
GSSHAPROJECT
WMS 10.1 64-bit
PROJECT_PATH \"/home/user/model\"
# run settings

TOT_TIME 120
MAP_FREQ 30
GMT -7
ELEVATION \"/home/user/model/model.ele\"
MAPPING_TABLE \"model.cmt\"
CHANNEL_INPUT \"model.cif\"
REPLACE_PARAMS \"model.ipr\"
REPLACE_VALS \"model.rpv\"
MANNING_N [ROUGH]
PRECIP_FILE \"storm.gag\"
";

const CMT: &str = "\
GSSHA_INDEX_MAP_TABLES
INDEX_MAP \"model_lu.idx\" \"LandUse\"
ROUGHNESS \"LandUse\"
NUM_IDS 2
MAX_NUMBER_CELLS 150
OVERLAND_ROUGH [SLOPE]
";

const CIF: &str = "\
GSSHA_CHAN
ALPHA 3.000000
LINKS 1
MAXNODES 3
LINK 1
NODES 3
MANNINGS_N [ROUGH]
";

const IPR: &str = "2\n[ROUGH] %.4f\n[SLOPE] %f\n";
const RPV: &str = "0.05 0.001\n0.07 0.002\n";

fn fixture(dir: &Path) {
    fs::write(dir.join("model.prj"), PRJ).unwrap();
    fs::write(dir.join("model.cmt"), CMT).unwrap();
    fs::write(dir.join("model.cif"), CIF).unwrap();
    fs::write(dir.join("model.ipr"), IPR).unwrap();
    fs::write(dir.join("model.rpv"), RPV).unwrap();
    fs::write(dir.join("model.ele"), "ncols 1\n").unwrap();
    fs::write(dir.join("model_lu.idx"), "ncols 1\n").unwrap();
}

fn read_fixture(dir: &Path) -> Project {
    fixture(dir);
    Project::read(dir, "model.prj", Settings::default())
        .unwrap()
        .value
}

#[test]
fn read_collects_sub_files_and_targets() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let parsed = Project::read(dir.path(), "model.prj", Settings::default()).unwrap();
    assert_eq!(
        parsed.warnings,
        vec![TranscodeWarning::MissingReferencedFile {
            card: "PRECIP_FILE".to_string(),
            path: dir.path().join("storm.gag"),
        }]
    );
    let project = parsed.value;
    assert_eq!(project.name, "model");
    assert_eq!(project.files.len(), 2);
    assert_eq!(project.files[0].kind, FileKind::MappingTable);
    assert_eq!(project.files[1].kind, FileKind::StreamNetwork);

    let targets = project.targets.as_ref().unwrap();
    assert_eq!(targets.len(), 2);
    assert_eq!(
        targets.by_id(TargetId(1)).unwrap().default.as_deref(),
        Some("0.05")
    );
    assert_eq!(
        project.project.card("MANNING_N").unwrap().value,
        Some(CardValue::Reference(TargetId(1)))
    );
    let cmt = project.file("model.cmt").unwrap();
    assert_eq!(
        cmt.card("OVERLAND_ROUGH").unwrap().value,
        Some(CardValue::Reference(TargetId(2)))
    );
    assert!(!cmt.card("NUM_IDS").unwrap().is_reference());
    let cif = project.file("model.cif").unwrap();
    assert!(cif.card("MANNINGS_N").unwrap().is_reference());
    assert!(!cif.card("LINK").unwrap().is_reference());
}

#[test]
fn write_renames_prefixed_files() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let project = read_fixture(src.path());
    let warnings = project.write(out.path(), Some("run2")).unwrap();
    assert!(matches!(
        warnings.as_slice(),
        [TranscodeWarning::MissingReferencedFile { card, .. }] if card == "PRECIP_FILE"
    ));

    let prj = fs::read_to_string(out.path().join("run2.prj")).unwrap();
    assert_eq!(
        prj,
        "\
GSSHAPROJECT
WMS 10.1 64-bit
PROJECT_PATH \"\"
# run settings

TOT_TIME 120
MAP_FREQ 30
GMT -7
ELEVATION \"run2.ele\"
MAPPING_TABLE \"run2.cmt\"
CHANNEL_INPUT \"run2.cif\"
REPLACE_PARAMS \"run2.ipr\"
REPLACE_VALS \"run2.rpv\"
MANNING_N [ROUGH]
PRECIP_FILE \"storm.gag\"
"
    );
    let cmt = fs::read_to_string(out.path().join("run2.cmt")).unwrap();
    assert_eq!(cmt, CMT.replace("model_lu.idx", "run2_lu.idx"));
    assert_eq!(fs::read_to_string(out.path().join("run2.cif")).unwrap(), CIF);
    assert_eq!(fs::read_to_string(out.path().join("run2.ipr")).unwrap(), IPR);
    assert_eq!(fs::read_to_string(out.path().join("run2.rpv")).unwrap(), RPV);
    assert!(out.path().join("run2.ele").exists());
    assert!(out.path().join("run2_lu.idx").exists());
    assert!(!out.path().join("storm.gag").exists());
}

#[test]
fn write_without_rename_keeps_names() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let project = read_fixture(src.path());
    project.write(out.path(), None).unwrap();
    assert_eq!(fs::read_to_string(out.path().join("model.cmt")).unwrap(), CMT);
    assert!(out.path().join("model.ele").exists());
}

#[test]
fn memory_store_round_trip_preserves_output() {
    let src = tempfile::tempdir().unwrap();
    let direct = tempfile::tempdir().unwrap();
    let via_store = tempfile::tempdir().unwrap();
    let project = read_fixture(src.path());
    project.write(direct.path(), Some("run2")).unwrap();

    let mut store = MemoryStore::new();
    let ids = project.save(&mut store).unwrap();
    assert_eq!(ids.len(), 3);
    assert_eq!(store.files_of_kind(FileKind::Project).len(), 1);
    let project_id = store.files_of_kind(FileKind::Project)[0].id;
    let manning = store
        .cards_for(project_id)
        .unwrap()
        .into_iter()
        .find(|row| row.name == "MANNING_N")
        .unwrap();
    assert_eq!(manning.value.as_deref(), Some("-1"));

    let loaded = Project::load(&store, Settings::default()).unwrap();
    loaded.write(via_store.path(), Some("run2")).unwrap();
    for name in ["run2.prj", "run2.cmt", "run2.cif", "run2.ipr", "run2.rpv"] {
        assert_eq!(
            fs::read_to_string(via_store.path().join(name)).unwrap(),
            fs::read_to_string(direct.path().join(name)).unwrap(),
            "{name}"
        );
    }
}

#[test]
fn saving_again_replaces_previous_project() {
    let src = tempfile::tempdir().unwrap();
    let project = read_fixture(src.path());
    let mut store = MemoryStore::new();
    project.save(&mut store).unwrap();
    project.save(&mut store).unwrap();
    assert_eq!(store.files().len(), 3);
}

#[test]
fn jsonl_store_survives_reopen() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let project = read_fixture(src.path());
    let path = src.path().join("model.jsonl");
    let mut store = JsonlStore::open(&path).unwrap();
    project.save(&mut store).unwrap();

    let reopened = JsonlStore::load(&path).unwrap();
    assert_eq!(reopened.meta().project.as_ref().unwrap().name, "model");
    let loaded = Project::load(&reopened, Settings::default()).unwrap();
    assert_eq!(loaded.targets, project.targets);
    assert_eq!(loaded.project, project.project);
    loaded.write(out.path(), None).unwrap();
    assert_eq!(fs::read_to_string(out.path().join("model.cif")).unwrap(), CIF);
}

#[test]
fn missing_replacement_files_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("model.prj"),
        "REPLACE_PARAMS \"model.ipr\"\nMANNING_N [ROUGH]\n",
    )
    .unwrap();
    let parsed = Project::read(dir.path(), "model.prj", Settings::default()).unwrap();
    assert!(parsed.value.targets.is_none());
    assert!(matches!(
        parsed.warnings.as_slice(),
        [TranscodeWarning::MissingReferencedFile { card, .. }] if card == "REPLACE_PARAMS"
    ));
    assert_eq!(
        parsed.value.project.card("MANNING_N").unwrap().value,
        Some(CardValue::literal("[ROUGH]"))
    );
}
