use camino::Utf8PathBuf;

use pff_dataset_manager::domain::{ArtifactRef, GameId};
use pff_dataset_manager::layout::{ArtifactState, Layout};

fn game(id: &str) -> GameId {
    id.parse().unwrap()
}

#[test]
fn conventional_paths_are_exact() {
    let layout = Layout::new(Utf8PathBuf::from("./data"));
    assert_eq!(
        layout.tracking_path(&game("2282")).as_str(),
        "./data/tracking/2282.jsonl.bz2"
    );
    assert_eq!(
        layout.metadata_path(&game("2282")).as_str(),
        "./data/metadata/2282.json"
    );
    assert_eq!(
        layout.roster_path(&game("2282")).as_str(),
        "./data/rosters/2282.json"
    );
    assert_eq!(layout.events_path().as_str(), "./data/events.json");
}

#[test]
fn atomic_write_creates_directories() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();
    let layout = Layout::new(root);

    let roster = ArtifactRef::Roster(game("10517"));
    let path = layout
        .write_artifact_atomic(&roster, b"{\"players\": []}")
        .unwrap();

    assert!(path.exists());
    assert!(path.as_str().ends_with("rosters/10517.json"));
    assert!(layout.inspect(&roster).unwrap().is_sound());
}

#[test]
fn persist_moves_staged_file_into_place() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();
    let layout = Layout::new(root);

    let staged = temp.path().join("staged.jsonl.bz2");
    std::fs::write(&staged, b"BZh91AY&SYstream").unwrap();

    let tracking = ArtifactRef::Tracking(game("10517"));
    let path = layout.persist_file_atomic(&tracking, &staged).unwrap();
    assert!(path.exists());
    assert!(layout.inspect(&tracking).unwrap().is_sound());
}

#[test]
fn inspect_distinguishes_missing_empty_and_corrupt() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();
    let layout = Layout::new(root);
    let events = ArtifactRef::Events;

    assert_eq!(layout.inspect(&events).unwrap(), ArtifactState::Missing);

    layout.write_artifact_atomic(&events, b"").unwrap();
    assert_eq!(layout.inspect(&events).unwrap(), ArtifactState::Empty);

    layout.write_artifact_atomic(&events, b"{ broken").unwrap();
    assert!(matches!(
        layout.inspect(&events).unwrap(),
        ArtifactState::Corrupt(_)
    ));

    layout.write_artifact_atomic(&events, b"{\"events\": []}").unwrap();
    assert_eq!(layout.inspect(&events).unwrap(), ArtifactState::Sound(14));
}
