use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Vendor-assigned match identifier. Opaque, but restricted to ASCII
/// alphanumerics so it can appear verbatim in file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameId(String);

impl GameId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GameId {
    type Err = FetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_string();
        let is_valid =
            !normalized.is_empty() && normalized.chars().all(|ch| ch.is_ascii_alphanumeric());
        if !is_valid {
            return Err(FetchError::InvalidGameId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Tracking,
    Metadata,
    Roster,
    Events,
}

impl ArtifactKind {
    /// The per-game kinds, in the order they are materialized.
    pub const PER_GAME: [ArtifactKind; 3] = [
        ArtifactKind::Tracking,
        ArtifactKind::Metadata,
        ArtifactKind::Roster,
    ];

    pub fn is_per_game(self) -> bool {
        !matches!(self, ArtifactKind::Events)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Tracking => write!(f, "tracking"),
            ArtifactKind::Metadata => write!(f, "metadata"),
            ArtifactKind::Roster => write!(f, "roster"),
            ArtifactKind::Events => write!(f, "events"),
        }
    }
}

/// One concrete expected file. Identity is the (directory, filename) pair:
/// metadata and roster files share the `{game_id}.json` filename and are
/// disambiguated by directory alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactRef {
    Tracking(GameId),
    Metadata(GameId),
    Roster(GameId),
    Events,
}

impl ArtifactRef {
    pub fn per_game(kind: ArtifactKind, game: GameId) -> Result<Self, FetchError> {
        match kind {
            ArtifactKind::Tracking => Ok(ArtifactRef::Tracking(game)),
            ArtifactKind::Metadata => Ok(ArtifactRef::Metadata(game)),
            ArtifactKind::Roster => Ok(ArtifactRef::Roster(game)),
            ArtifactKind::Events => Err(FetchError::Filesystem(
                "events artifact is shared, not per-game".to_string(),
            )),
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        match self {
            ArtifactRef::Tracking(_) => ArtifactKind::Tracking,
            ArtifactRef::Metadata(_) => ArtifactKind::Metadata,
            ArtifactRef::Roster(_) => ArtifactKind::Roster,
            ArtifactRef::Events => ArtifactKind::Events,
        }
    }

    pub fn game(&self) -> Option<&GameId> {
        match self {
            ArtifactRef::Tracking(game)
            | ArtifactRef::Metadata(game)
            | ArtifactRef::Roster(game) => Some(game),
            ArtifactRef::Events => None,
        }
    }

    /// Filename under the conventional local layout.
    pub fn local_name(&self) -> String {
        match self {
            ArtifactRef::Tracking(game) => format!("{game}.jsonl.bz2"),
            ArtifactRef::Metadata(game) | ArtifactRef::Roster(game) => format!("{game}.json"),
            ArtifactRef::Events => "events.json".to_string(),
        }
    }

    /// Filename under the vendor fixture convention on the remote side.
    pub fn remote_name(&self) -> String {
        match self {
            ArtifactRef::Tracking(game) => format!("pff_{game}.jsonl.bz2"),
            ArtifactRef::Metadata(game) => format!("pff_metadata_{game}.json"),
            ArtifactRef::Roster(game) => format!("pff_rosters_{game}.json"),
            ArtifactRef::Events => "events.json".to_string(),
        }
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.game() {
            Some(game) => write!(f, "{} artifact for game {game}", self.kind()),
            None => write!(f, "shared events artifact"),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_game_id_valid() {
        let id: GameId = " 10517 ".parse().unwrap();
        assert_eq!(id.as_str(), "10517");
    }

    #[test]
    fn parse_game_id_invalid() {
        let err = "10/517".parse::<GameId>().unwrap_err();
        assert_matches!(err, FetchError::InvalidGameId(_));
        let err = "".parse::<GameId>().unwrap_err();
        assert_matches!(err, FetchError::InvalidGameId(_));
    }

    #[test]
    fn artifact_names() {
        let game: GameId = "10517".parse().unwrap();
        let tracking = ArtifactRef::Tracking(game.clone());
        assert_eq!(tracking.local_name(), "10517.jsonl.bz2");
        assert_eq!(tracking.remote_name(), "pff_10517.jsonl.bz2");

        let metadata = ArtifactRef::Metadata(game.clone());
        let roster = ArtifactRef::Roster(game);
        assert_eq!(metadata.local_name(), roster.local_name());
        assert_ne!(metadata.remote_name(), roster.remote_name());

        assert_eq!(ArtifactRef::Events.local_name(), "events.json");
        assert_eq!(ArtifactRef::Events.remote_name(), "events.json");
    }

    #[test]
    fn per_game_rejects_events() {
        let game: GameId = "10517".parse().unwrap();
        let err = ArtifactRef::per_game(ArtifactKind::Events, game).unwrap_err();
        assert_matches!(err, FetchError::Filesystem(_));
    }
}
