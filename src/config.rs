use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::{ArtifactRef, GameId};
use crate::error::FetchError;

pub const DEFAULT_CONFIG_FILE: &str = "pff-dm.json";
pub const DEFAULT_DATA_ROOT: &str = "data";
pub const DEFAULT_GAMES: &[&str] = &["10517"];

/// The kloppy test fixtures mirror the vendor's sample files and are the
/// stock source for the sample dataset.
pub const DEFAULT_BASE_URL: &str =
    "https://raw.githubusercontent.com/PySport/kloppy/master/kloppy/tests/files/";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub data_root: Option<String>,
    #[serde(default)]
    pub games: Vec<String>,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub refetch_corrupt: Option<bool>,
}

/// Remote source for the sample dataset, resolved once at configuration
/// time: either one HTTP GET per artifact or a single zip archive holding
/// all of them under their remote names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Source {
    Files { base_url: String },
    Archive { url: String },
}

impl Source {
    /// Download URL for one artifact. Archive sources resolve to the
    /// archive URL itself; the entry name is looked up after extraction.
    pub fn artifact_url(&self, artifact: &ArtifactRef) -> String {
        match self {
            Source::Files { base_url } => {
                format!("{}/{}", base_url.trim_end_matches('/'), artifact.remote_name())
            }
            Source::Archive { url } => url.clone(),
        }
    }

    pub fn location(&self) -> &str {
        match self {
            Source::Files { base_url } => base_url,
            Source::Archive { url } => url,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub data_root: Utf8PathBuf,
    pub games: Vec<GameId>,
    pub source: Source,
    pub refetch_corrupt: bool,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `pff-dm.json` (or an explicit path) and resolve it against the
    /// built-in defaults. A missing default config file is not an error:
    /// the tool is expected to run with no arguments and no config at all.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, FetchError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| FetchError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| FetchError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, FetchError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let data_root = Utf8PathBuf::from(
            config
                .data_root
                .unwrap_or_else(|| DEFAULT_DATA_ROOT.to_string()),
        );

        let games = if config.games.is_empty() {
            DEFAULT_GAMES
                .iter()
                .map(|id| id.parse())
                .collect::<Result<Vec<GameId>, FetchError>>()?
        } else {
            config
                .games
                .into_iter()
                .map(|id| id.parse())
                .collect::<Result<Vec<GameId>, FetchError>>()?
        };

        let source = config.source.unwrap_or_else(|| Source::Files {
            base_url: DEFAULT_BASE_URL.to_string(),
        });

        Ok(ResolvedConfig {
            schema_version,
            data_root,
            games,
            source,
            refetch_corrupt: config.refetch_corrupt.unwrap_or(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.data_root, Utf8PathBuf::from("data"));
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
    fn parse_tagged_source_variants() {
        let files: Source = serde_json::from_str(
            r#"{"type": "files", "base_url": "https://example.com/fixtures/"}"#,
        )
        .unwrap();
        assert_eq!(
            files,
            Source::Files {
                base_url: "https://example.com/fixtures/".to_string()
            }
        );

        let archive: Source =
            serde_json::from_str(r#"{"type": "archive", "url": "https://example.com/sample.zip"}"#)
                .unwrap();
        assert_eq!(
            archive,
            Source::Archive {
                url: "https://example.com/sample.zip".to_string()
            }
        );
    }

    #[test]
    fn artifact_url_joins_base() {
        let game: GameId = "10517".parse().unwrap();
        let source = Source::Files {
            base_url: "https://example.com/fixtures".to_string(),
        };
        assert_eq!(
            source.artifact_url(&ArtifactRef::Tracking(game)),
            "https://example.com/fixtures/pff_10517.jsonl.bz2"
        );
    }

    #[test]
    fn invalid_game_id_in_config() {
        let config = Config {
            games: vec!["10 517".to_string()],
            ..Config::default()
        };
        assert!(ConfigLoader::resolve_config(config).is_err());
    }
}
