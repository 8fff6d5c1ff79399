use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tempfile::TempDir;

use crate::archive;
use crate::config::{ResolvedConfig, Source};
use crate::domain::{ArtifactKind, ArtifactRef, GameId};
use crate::error::FetchError;
use crate::layout::{ArtifactState, Layout, verify_file};
use crate::remote::SampleDataClient;

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub force: bool,
    pub dry_run: bool,
    /// Restrict the run to one artifact kind, e.g. refresh only metadata.
    pub only: Option<ArtifactKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub items: Vec<FetchItemResult>,
    pub warnings: Vec<String>,
    pub fetched: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchItemResult {
    pub kind: String,
    pub game: Option<String>,
    pub action: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub data_root: String,
    pub games: Vec<GameStatus>,
    pub events_present: bool,
    pub complete: bool,
    pub total_bytes: u64,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameStatus {
    pub game: String,
    pub tracking: bool,
    pub metadata: bool,
    pub roster: bool,
    pub complete: bool,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameInfo {
    pub game: String,
    pub artifacts: Vec<ArtifactInfo>,
    pub complete: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactInfo {
    pub kind: String,
    pub path: String,
    pub present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearReport {
    pub cleared: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum ProgressSinkKind {
    Fetch,
    Status,
    Info,
    Clear,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Ensures the configured games' artifacts are present under the
/// conventional layout, fetching only what is missing.
pub struct Materializer<C: SampleDataClient> {
    layout: Layout,
    client: C,
    config: ResolvedConfig,
}

impl<C: SampleDataClient> Materializer<C> {
    pub fn new(config: ResolvedConfig, client: C) -> Self {
        let layout = Layout::new(config.data_root.clone());
        Self {
            layout,
            client,
            config,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// The materializer's single substantial operation. Present artifacts
    /// are skipped without touching the network; missing ones are fetched,
    /// verified, and placed atomically. A transport-level failure aborts
    /// the run; a per-artifact failure is recorded and the remaining
    /// artifacts still get their chance.
    pub fn ensure_dataset_available(
        &self,
        options: FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchReport, FetchError> {
        let expected = self.expected_artifacts(options.only);
        sink.event(ProgressEvent {
            message: format!(
                "phase=Resolve; {} games, {} expected artifacts",
                self.config.games.len(),
                expected.len()
            ),
            elapsed: None,
        });

        let mut warnings = self.partial_game_warnings()?;
        for warning in &warnings {
            sink.event(ProgressEvent {
                message: format!("warn {warning}"),
                elapsed: None,
            });
        }

        let temp_dir = if options.dry_run {
            None
        } else {
            self.layout.ensure_root()?;
            Some(
                tempfile::Builder::new()
                    .prefix("pff-dm-fetch")
                    .tempdir_in(self.layout.root().as_std_path())
                    .map_err(|err| FetchError::Filesystem(err.to_string()))?,
            )
        };

        // Archive sources are fetched at most once per run, and only once
        // some artifact actually needs it.
        let mut archive_path: Option<PathBuf> = None;

        let mut items = Vec::new();
        let mut fetched = 0usize;
        let mut failures: Vec<String> = Vec::new();

        for artifact in &expected {
            let state = self.layout.inspect(artifact)?;
            let action = match (&state, options.force) {
                (ArtifactState::Sound(_), false) => {
                    sink.event(ProgressEvent {
                        message: format!("phase=Store; {artifact} already present"),
                        elapsed: None,
                    });
                    items.push(self.item(artifact, "present", None));
                    continue;
                }
                (ArtifactState::Missing, _) => "fetched",
                (_, true) => "refetched",
                (ArtifactState::Empty | ArtifactState::Corrupt(_), false) => {
                    if !self.config.refetch_corrupt {
                        let reason = match &state {
                            ArtifactState::Empty => "zero-byte file".to_string(),
                            ArtifactState::Corrupt(reason) => reason.clone(),
                            _ => unreachable!(),
                        };
                        let warning =
                            format!("{artifact} is unsound ({reason}) and refetch_corrupt is off");
                        tracing::warn!("{warning}");
                        sink.event(ProgressEvent {
                            message: format!("warn {warning}"),
                            elapsed: None,
                        });
                        warnings.push(warning.clone());
                        failures.push(artifact.to_string());
                        items.push(self.item(artifact, "kept-corrupt", Some(reason)));
                        continue;
                    }
                    "refetched"
                }
            };

            // No temp dir means dry-run: report the plan and move on.
            let Some(temp_dir) = temp_dir.as_ref() else {
                items.push(self.item(artifact, "download", None));
                continue;
            };

            match self.fetch_one(artifact, temp_dir, &mut archive_path, sink) {
                Ok(()) => {
                    fetched += 1;
                    items.push(self.item(artifact, action, None));
                }
                Err(err @ FetchError::Transport(_)) => {
                    // Source unreachable: nothing else can succeed either.
                    return Err(err);
                }
                Err(err) => {
                    tracing::warn!("fetch failed for {artifact}: {err}");
                    sink.event(ProgressEvent {
                        message: format!("warn fetch failed for {artifact}: {err}"),
                        elapsed: None,
                    });
                    failures.push(artifact.to_string());
                    items.push(self.item(artifact, "failed", Some(err.to_string())));
                }
            }
        }

        if fetched > 0 && !options.dry_run {
            self.write_manifest(&items, sink)?;
        }

        if let Some(first) = failures.first() {
            return Err(FetchError::Incomplete {
                failed: failures.len(),
                first: first.clone(),
            });
        }

        sink.event(ProgressEvent {
            message: format!(
                "phase=Store; dataset complete ({} present, {} fetched)",
                items.len() - fetched,
                fetched
            ),
            elapsed: None,
        });

        Ok(FetchReport {
            items,
            warnings,
            fetched,
        })
    }

    pub fn status(&self, sink: &dyn ProgressSink) -> Result<StatusReport, FetchError> {
        sink.event(ProgressEvent {
            message: "phase=Resolve; scanning data root".to_string(),
            elapsed: None,
        });

        let events_state = self.layout.inspect(&ArtifactRef::Events)?;
        let events_present = events_state.is_sound();
        let mut total_bytes = match events_state {
            ArtifactState::Sound(bytes) => bytes,
            _ => 0,
        };

        let mut games = Vec::new();
        let mut warnings = Vec::new();
        for game in &self.config.games {
            let mut present = [false; 3];
            let mut bytes = 0u64;
            for (slot, kind) in ArtifactKind::PER_GAME.iter().enumerate() {
                let artifact = ArtifactRef::per_game(*kind, game.clone())?;
                if let ArtifactState::Sound(size) = self.layout.inspect(&artifact)? {
                    present[slot] = true;
                    bytes += size;
                }
            }
            let complete = present.iter().all(|ok| *ok) && events_present;
            let any = present.iter().any(|ok| *ok) || events_present;
            if any && !complete {
                warnings.push(format!("partial dataset for game {game}"));
            }
            total_bytes += bytes;
            games.push(GameStatus {
                game: game.to_string(),
                tracking: present[0],
                metadata: present[1],
                roster: present[2],
                complete,
                bytes,
            });
        }

        let complete = events_present && games.iter().all(|status| status.complete);
        Ok(StatusReport {
            data_root: self.layout.root().to_string(),
            games,
            events_present,
            complete,
            total_bytes,
            warnings,
        })
    }

    pub fn info(&self, game: GameId, sink: &dyn ProgressSink) -> Result<GameInfo, FetchError> {
        sink.event(ProgressEvent {
            message: format!("phase=Resolve; looking up game {game}"),
            elapsed: None,
        });

        let mut artifacts = Vec::new();
        let mut any_present = false;
        let mut all_present = true;
        for kind in ArtifactKind::PER_GAME {
            let artifact = ArtifactRef::per_game(kind, game.clone())?;
            let state = self.layout.inspect(&artifact)?;
            let bytes = match state {
                ArtifactState::Sound(size) => Some(size),
                _ => None,
            };
            any_present |= bytes.is_some();
            all_present &= bytes.is_some();
            artifacts.push(ArtifactInfo {
                kind: kind.to_string(),
                path: self.layout.artifact_path(&artifact).to_string(),
                present: bytes.is_some(),
                bytes,
            });
        }
        let events_state = self.layout.inspect(&ArtifactRef::Events)?;
        let events_bytes = match events_state {
            ArtifactState::Sound(size) => Some(size),
            _ => None,
        };
        any_present |= events_bytes.is_some();
        all_present &= events_bytes.is_some();
        artifacts.push(ArtifactInfo {
            kind: ArtifactKind::Events.to_string(),
            path: self.layout.events_path().to_string(),
            present: events_bytes.is_some(),
            bytes: events_bytes,
        });

        if !self.config.games.contains(&game) && !any_present {
            return Err(FetchError::UnknownGame(game.to_string()));
        }

        Ok(GameInfo {
            game: game.to_string(),
            artifacts,
            complete: all_present,
        })
    }

    pub fn clear(&self, sink: &dyn ProgressSink) -> Result<ClearReport, FetchError> {
        sink.event(ProgressEvent {
            message: "phase=Store; clearing data root".to_string(),
            elapsed: None,
        });
        self.layout.clear()?;
        Ok(ClearReport { cleared: true })
    }

    /// Every file the run is responsible for: three per-game artifacts per
    /// configured game, plus the shared events file once. An `only` filter
    /// narrows the list to a single kind.
    fn expected_artifacts(&self, only: Option<ArtifactKind>) -> Vec<ArtifactRef> {
        let mut expected = Vec::with_capacity(self.config.games.len() * 3 + 1);
        for game in &self.config.games {
            for kind in ArtifactKind::PER_GAME {
                if only.is_some_and(|filter| filter != kind) {
                    continue;
                }
                // Kinds in PER_GAME are never Events, so this cannot fail.
                if let Ok(artifact) = ArtifactRef::per_game(kind, game.clone()) {
                    expected.push(artifact);
                }
            }
        }
        if only.is_none() || only == Some(ArtifactKind::Events) {
            expected.push(ArtifactRef::Events);
        }
        expected
    }

    fn fetch_one(
        &self,
        artifact: &ArtifactRef,
        temp_dir: &TempDir,
        archive_path: &mut Option<PathBuf>,
        sink: &dyn ProgressSink,
    ) -> Result<(), FetchError> {
        let staging = temp_dir.path().join(format!(
            "{}-{}",
            artifact.kind(),
            artifact.local_name()
        ));

        match &self.config.source {
            Source::Files { .. } => {
                let url = self.config.source.artifact_url(artifact);
                sink.event(ProgressEvent {
                    message: format!("phase=Fetch; {artifact}"),
                    elapsed: None,
                });
                sink.event(ProgressEvent {
                    message: "source.request".to_string(),
                    elapsed: None,
                });
                let start = std::time::Instant::now();
                self.client.download_artifact(artifact, &url, &staging)?;
                sink.event(ProgressEvent {
                    message: format!("source.response latency_ms={}", start.elapsed().as_millis()),
                    elapsed: None,
                });
            }
            Source::Archive { url } => {
                let archive = match archive_path {
                    Some(path) => path.clone(),
                    None => {
                        sink.event(ProgressEvent {
                            message: "phase=Fetch; sample archive".to_string(),
                            elapsed: None,
                        });
                        sink.event(ProgressEvent {
                            message: "source.request".to_string(),
                            elapsed: None,
                        });
                        let path = temp_dir.path().join("sample.zip");
                        let start = std::time::Instant::now();
                        self.client.download_archive(url, &path)?;
                        sink.event(ProgressEvent {
                            message: format!(
                                "source.response latency_ms={}",
                                start.elapsed().as_millis()
                            ),
                            elapsed: None,
                        });
                        archive::validate_zip(&path)?;
                        *archive_path = Some(path.clone());
                        path
                    }
                };
                let entry = artifact.remote_name();
                if !archive::extract_entry(&archive, &entry, &staging)? {
                    return Err(FetchError::MissingEntry {
                        entry,
                        artifact: artifact.to_string(),
                    });
                }
            }
        }

        sink.event(ProgressEvent {
            message: format!("phase=Verify; {artifact}"),
            elapsed: None,
        });
        verify_file(artifact, &staging)?;

        sink.event(ProgressEvent {
            message: format!("phase=Store; {artifact}"),
            elapsed: None,
        });
        let path = self.layout.persist_file_atomic(artifact, &staging)?;
        tracing::debug!("stored {artifact} at {path}");
        Ok(())
    }

    /// Games with some but not all artifacts on disk, usually left behind
    /// by an aborted earlier run. The run repairs them; the warning makes
    /// the prior state visible.
    fn partial_game_warnings(&self) -> Result<Vec<String>, FetchError> {
        let mut warnings = Vec::new();
        for game in &self.config.games {
            let mut present = Vec::new();
            let mut missing = Vec::new();
            for kind in ArtifactKind::PER_GAME {
                let artifact = ArtifactRef::per_game(kind, game.clone())?;
                if self.layout.inspect(&artifact)?.is_sound() {
                    present.push(kind.to_string());
                } else {
                    missing.push(kind.to_string());
                }
            }
            if !present.is_empty() && !missing.is_empty() {
                warnings.push(format!(
                    "partial dataset for game {game}: missing {}",
                    missing.join(", ")
                ));
            }
        }
        Ok(warnings)
    }

    fn write_manifest(
        &self,
        items: &[FetchItemResult],
        sink: &dyn ProgressSink,
    ) -> Result<(), FetchError> {
        let manifest = Manifest {
            tool: format!("pff-dm/{}", env!("CARGO_PKG_VERSION")),
            source: self.config.source.location().to_string(),
            fetched_at: iso_timestamp(),
            items: items.to_vec(),
        };
        let content = serde_json::to_vec_pretty(&manifest)
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        sink.event(ProgressEvent {
            message: "phase=Store; writing manifest".to_string(),
            elapsed: None,
        });
        self.layout.write_manifest(&content)
    }

    fn item(&self, artifact: &ArtifactRef, action: &str, error: Option<String>) -> FetchItemResult {
        FetchItemResult {
            kind: artifact.kind().to_string(),
            game: artifact.game().map(|game| game.to_string()),
            action: action.to_string(),
            path: self.layout.artifact_path(artifact).to_string(),
            error,
        }
    }
}

#[derive(Debug, Serialize)]
struct Manifest {
    tool: String,
    source: String,
    fetched_at: String,
    items: Vec<FetchItemResult>,
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use camino::Utf8PathBuf;

    use super::*;
    use crate::config::ConfigLoader;
    use crate::output::JsonOutput;

    struct MockClient {
        calls: Mutex<Vec<String>>,
    }

    impl MockClient {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl SampleDataClient for MockClient {
        fn download_artifact(
            &self,
            artifact: &ArtifactRef,
            url: &str,
            destination: &Path,
        ) -> Result<(), FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            let body: &[u8] = match artifact.kind() {
                ArtifactKind::Tracking => b"BZh91AY&SYfake",
                _ => b"{\"mock\": true}",
            };
            std::fs::write(destination, body)
                .map_err(|err| FetchError::Filesystem(err.to_string()))
        }

        fn download_archive(&self, _url: &str, _destination: &Path) -> Result<(), FetchError> {
            Err(FetchError::Transport("no archive in this mock".to_string()))
        }
    }

    fn materializer(root: Utf8PathBuf) -> Materializer<MockClient> {
        let mut config = ConfigLoader::resolve_config(crate::config::Config::default()).unwrap();
        config.data_root = root;
        Materializer::new(config, MockClient::new())
    }

    #[test]
    fn fetches_all_four_artifacts() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();
        let app = materializer(root);

        let report = app
            .ensure_dataset_available(
                FetchOptions {
                    force: false,
                    dry_run: false,
                    only: None,
                },
                &JsonOutput,
            )
            .unwrap();

        assert_eq!(report.fetched, 4);
        assert!(app.layout().tracking_path(&"10517".parse().unwrap()).exists());
        assert!(app.layout().events_path().exists());
        assert_eq!(app.client.calls.lock().unwrap().len(), 4);
    }

    #[test]
    fn second_run_touches_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();
        let app = materializer(root);
        let options = FetchOptions {
            force: false,
            dry_run: false,
            only: None,
        };

        app.ensure_dataset_available(options.clone(), &JsonOutput)
            .unwrap();
        let report = app
            .ensure_dataset_available(options, &JsonOutput)
            .unwrap();

        assert_eq!(report.fetched, 0);
        assert!(report.items.iter().all(|item| item.action == "present"));
        assert_eq!(app.client.calls.lock().unwrap().len(), 4);
    }

    #[test]
    fn dry_run_plans_without_writing() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().join("data")).unwrap();
        let app = materializer(root.clone());

        let report = app
            .ensure_dataset_available(
                FetchOptions {
                    force: false,
                    dry_run: true,
                    only: None,
                },
                &JsonOutput,
            )
            .unwrap();

        assert_eq!(report.fetched, 0);
        assert!(report.items.iter().all(|item| item.action == "download"));
        assert!(!root.exists());
        assert!(app.client.calls.lock().unwrap().is_empty());
    }
}
