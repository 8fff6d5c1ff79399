use assert_matches::assert_matches;

use pff_dataset_manager::domain::{ArtifactKind, ArtifactRef, GameId};
use pff_dataset_manager::error::FetchError;

#[test]
fn game_ids_are_opaque_alphanumerics() {
    let id: GameId = "10517".parse().unwrap();
    assert_eq!(id.as_str(), "10517");

    let id: GameId = "2282".parse().unwrap();
    assert_eq!(id.to_string(), "2282");

    assert_matches!(
        "game/10517".parse::<GameId>().unwrap_err(),
        FetchError::InvalidGameId(_)
    );
}

#[test]
fn artifact_identity_is_directory_plus_filename() {
    let game: GameId = "10517".parse().unwrap();
    let metadata = ArtifactRef::Metadata(game.clone());
    let roster = ArtifactRef::Roster(game.clone());

    // Same filename, different kind: directory is the disambiguator.
    assert_eq!(metadata.local_name(), "10517.json");
    assert_eq!(roster.local_name(), "10517.json");
    assert_ne!(metadata, roster);
}

#[test]
fn per_game_kinds_exclude_events() {
    assert_eq!(ArtifactKind::PER_GAME.len(), 3);
    assert!(ArtifactKind::PER_GAME.iter().all(|kind| kind.is_per_game()));
    assert!(!ArtifactKind::Events.is_per_game());
}

#[test]
fn display_names_artifact_and_game() {
    let game: GameId = "101".parse().unwrap();
    let label = ArtifactRef::Tracking(game).to_string();
    assert!(label.contains("tracking"));
    assert!(label.contains("101"));
    assert_eq!(ArtifactRef::Events.to_string(), "shared events artifact");
}
