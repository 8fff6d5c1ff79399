use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum FetchError {
    #[error("invalid game id: {0}")]
    InvalidGameId(String),

    #[error("game not in configured set: {0}")]
    UnknownGame(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("sample source unreachable: {0}")]
    Transport(String),

    #[error("sample source returned status {status} for {artifact}: {message}")]
    Status {
        status: u16,
        artifact: String,
        message: String,
    },

    #[error("failed to write {artifact} at {path}: {message}")]
    ArtifactWrite {
        artifact: String,
        path: String,
        message: String,
    },

    #[error("corrupt {artifact}: {reason}")]
    CorruptArtifact { artifact: String, reason: String },

    #[error("archive is missing entry {entry} for {artifact}")]
    MissingEntry { entry: String, artifact: String },

    #[error("invalid archive: {0}")]
    Archive(String),

    #[error("dataset incomplete: {failed} artifact(s) failed, first: {first}")]
    Incomplete { failed: usize, first: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
