use std::fs;

use pff_dataset_manager::config::{Config, ConfigLoader, DEFAULT_BASE_URL, Source};
use pff_dataset_manager::error::FetchError;

use assert_matches::assert_matches;

#[test]
fn defaults_cover_a_no_argument_run() {
    let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
    assert_eq!(resolved.data_root.as_str(), "data");
    assert_eq!(resolved.games.len(), 1);
    assert_eq!(resolved.games[0].as_str(), "10517");
    assert!(resolved.refetch_corrupt);
    assert_eq!(
        resolved.source,
        Source::Files {
            base_url: DEFAULT_BASE_URL.to_string()
        }
    );
}

#[test]
fn config_file_round_trip() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("pff-dm.json");
    fs::write(
        &path,
        r#"{
  "schema_version": 1,
  "data_root": "fixtures",
  "games": ["101", "2282"],
  "source": { "type": "archive", "url": "https://example.com/wc2022.zip" },
  "refetch_corrupt": false
}"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(path.to_str()).unwrap();
    assert_eq!(resolved.data_root.as_str(), "fixtures");
    assert_eq!(resolved.games.len(), 2);
    assert_eq!(resolved.games[1].as_str(), "2282");
    assert!(!resolved.refetch_corrupt);
    assert_eq!(
        resolved.source,
        Source::Archive {
            url: "https://example.com/wc2022.zip".to_string()
        }
    );
}

#[test]
fn explicit_missing_config_is_an_error() {
    let err = ConfigLoader::resolve(Some("/nonexistent/pff-dm.json")).unwrap_err();
    assert_matches!(err, FetchError::ConfigRead(_));
}

#[test]
fn malformed_config_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("pff-dm.json");
    fs::write(&path, "{ not json").unwrap();

    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, FetchError::ConfigParse(_));
}

#[test]
fn source_variant_must_be_tagged() {
    let err = serde_json::from_str::<Source>(r#"{"base_url": "https://example.com/"}"#);
    assert!(err.is_err());
}
