use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{ArtifactRef, GameId};
use crate::error::FetchError;

pub const MANIFEST_NAME: &str = ".pff-dm-manifest.json";

/// Condition of one expected file on disk. `Empty` and `Corrupt` are kept
/// apart from `Missing` because the refetch policy decides whether they are
/// treated as absent or left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactState {
    Missing,
    Empty,
    Corrupt(String),
    Sound(u64),
}

impl ArtifactState {
    pub fn is_sound(&self) -> bool {
        matches!(self, ArtifactState::Sound(_))
    }
}

/// The conventional on-disk layout rooted at `data_root`:
///
/// ```text
/// <data_root>/
///   tracking/{game_id}.jsonl.bz2
///   metadata/{game_id}.json
///   rosters/{game_id}.json
///   events.json
/// ```
#[derive(Debug, Clone)]
pub struct Layout {
    root: Utf8PathBuf,
}

impl Layout {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn artifact_path(&self, artifact: &ArtifactRef) -> Utf8PathBuf {
        match artifact {
            ArtifactRef::Tracking(_) => self.root.join("tracking").join(artifact.local_name()),
            ArtifactRef::Metadata(_) => self.root.join("metadata").join(artifact.local_name()),
            ArtifactRef::Roster(_) => self.root.join("rosters").join(artifact.local_name()),
            ArtifactRef::Events => self.root.join(artifact.local_name()),
        }
    }

    pub fn tracking_path(&self, game: &GameId) -> Utf8PathBuf {
        self.artifact_path(&ArtifactRef::Tracking(game.clone()))
    }

    pub fn metadata_path(&self, game: &GameId) -> Utf8PathBuf {
        self.artifact_path(&ArtifactRef::Metadata(game.clone()))
    }

    pub fn roster_path(&self, game: &GameId) -> Utf8PathBuf {
        self.artifact_path(&ArtifactRef::Roster(game.clone()))
    }

    pub fn events_path(&self) -> Utf8PathBuf {
        self.artifact_path(&ArtifactRef::Events)
    }

    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.root.join(MANIFEST_NAME)
    }

    pub fn ensure_root(&self) -> Result<(), FetchError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| FetchError::Filesystem(err.to_string()))
    }

    pub fn exists(&self) -> bool {
        self.root.as_std_path().exists()
    }

    /// Examine the file behind `artifact` without interpreting its content
    /// beyond a shallow soundness check: tracking files must carry the bzip2
    /// magic, JSON artifacts must parse.
    pub fn inspect(&self, artifact: &ArtifactRef) -> Result<ArtifactState, FetchError> {
        let path = self.artifact_path(artifact);
        let metadata = match fs::metadata(path.as_std_path()) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ArtifactState::Missing);
            }
            Err(err) => return Err(FetchError::Filesystem(err.to_string())),
        };
        if metadata.len() == 0 {
            return Ok(ArtifactState::Empty);
        }

        let content =
            fs::read(path.as_std_path()).map_err(|err| FetchError::Filesystem(err.to_string()))?;
        Ok(match soundness_of(artifact, &content) {
            Ok(()) => ArtifactState::Sound(metadata.len()),
            Err(reason) => ArtifactState::Corrupt(reason),
        })
    }

    /// Write `content` to the conventional path for `artifact` via a
    /// temporary sibling file and a rename, creating directories as needed.
    pub fn write_artifact_atomic(
        &self,
        artifact: &ArtifactRef,
        content: &[u8],
    ) -> Result<Utf8PathBuf, FetchError> {
        let path = self.artifact_path(artifact);
        let parent = path
            .parent()
            .ok_or_else(|| FetchError::Filesystem("invalid artifact path".to_string()))?;
        fs::create_dir_all(parent.as_std_path()).map_err(|err| write_error(artifact, &path, err))?;

        let mut temp = tempfile::Builder::new()
            .prefix(".pff-dm-part")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| write_error(artifact, &path, err))?;
        std::io::Write::write_all(&mut temp, content)
            .map_err(|err| write_error(artifact, &path, err))?;
        temp.persist(path.as_std_path())
            .map_err(|err| write_error(artifact, &path, err.error))?;
        Ok(path)
    }

    /// Move a fully-downloaded file into its conventional place. The copy
    /// goes through a temporary sibling so a crash never leaves a partial
    /// artifact at the final path.
    pub fn persist_file_atomic(
        &self,
        artifact: &ArtifactRef,
        source: &std::path::Path,
    ) -> Result<Utf8PathBuf, FetchError> {
        let path = self.artifact_path(artifact);
        let parent = path
            .parent()
            .ok_or_else(|| FetchError::Filesystem("invalid artifact path".to_string()))?;
        fs::create_dir_all(parent.as_std_path()).map_err(|err| write_error(artifact, &path, err))?;

        let temp = tempfile::Builder::new()
            .prefix(".pff-dm-part")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| write_error(artifact, &path, err))?;
        fs::copy(source, temp.path()).map_err(|err| write_error(artifact, &path, err))?;
        if path.as_std_path().exists() {
            fs::remove_file(path.as_std_path()).map_err(|err| write_error(artifact, &path, err))?;
        }
        temp.persist(path.as_std_path())
            .map_err(|err| write_error(artifact, &path, err.error))?;
        Ok(path)
    }

    pub fn write_manifest(&self, content: &[u8]) -> Result<(), FetchError> {
        self.ensure_root()?;
        let path = self.manifest_path();
        let tmp_path = path.with_extension("json.tmp");
        fs::write(tmp_path.as_std_path(), content)
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| FetchError::Filesystem(err.to_string()))
    }

    pub fn clear(&self) -> Result<(), FetchError> {
        if self.root.as_std_path().exists() {
            fs::remove_dir_all(self.root.as_std_path())
                .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }
}

fn write_error(artifact: &ArtifactRef, path: &Utf8Path, err: std::io::Error) -> FetchError {
    FetchError::ArtifactWrite {
        artifact: artifact.to_string(),
        path: path.to_string(),
        message: err.to_string(),
    }
}

/// Soundness check for a file that has not been placed in the layout yet,
/// e.g. a freshly downloaded temp file or an extracted archive entry.
pub fn verify_file(artifact: &ArtifactRef, path: &std::path::Path) -> Result<(), FetchError> {
    let content = fs::read(path).map_err(|err| FetchError::Filesystem(err.to_string()))?;
    verify_content(artifact, &content)
}

pub fn verify_content(artifact: &ArtifactRef, content: &[u8]) -> Result<(), FetchError> {
    if content.is_empty() {
        return Err(FetchError::CorruptArtifact {
            artifact: artifact.to_string(),
            reason: "zero-byte file".to_string(),
        });
    }
    soundness_of(artifact, content).map_err(|reason| FetchError::CorruptArtifact {
        artifact: artifact.to_string(),
        reason,
    })
}

fn soundness_of(artifact: &ArtifactRef, content: &[u8]) -> Result<(), String> {
    match artifact {
        ArtifactRef::Tracking(_) => {
            if content.starts_with(b"BZh") {
                Ok(())
            } else {
                Err("missing bzip2 magic".to_string())
            }
        }
        ArtifactRef::Metadata(_) | ArtifactRef::Roster(_) | ArtifactRef::Events => {
            serde_json::from_slice::<serde::de::IgnoredAny>(content)
                .map(|_| ())
                .map_err(|err| format!("invalid JSON: {err}"))
        }
    }
}
