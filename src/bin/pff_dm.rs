use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use pff_dataset_manager::app::{
    FetchOptions, FetchReport, Materializer, ProgressSinkKind, StatusReport,
};
use pff_dataset_manager::config::{ConfigLoader, ResolvedConfig};
use pff_dataset_manager::domain::{ArtifactKind, GameId};
use pff_dataset_manager::error::FetchError;
use pff_dataset_manager::output::{JsonOutput, OutputMode};
use pff_dataset_manager::remote::{HttpSampleDataClient, SampleDataClient};
use pff_dataset_manager::tui::Tui;

#[derive(Parser)]
#[command(name = "pff-dm")]
#[command(about = "Materialize the PFF FC World Cup 2022 sample tracking dataset locally")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Ensure every configured game's artifacts are present (default)")]
    Fetch(FetchArgs),
    #[command(about = "Show per-game availability of the local dataset")]
    Status(CommonArgs),
    #[command(about = "Show conventional paths and presence for one game")]
    Info(InfoArgs),
    #[command(about = "Remove the data root")]
    Clear(CommonArgs),
}

#[derive(Args, Clone, Default)]
struct FetchArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    root: Option<String>,

    #[arg(long = "game")]
    games: Vec<String>,

    #[arg(long)]
    only: Option<ArtifactKind>,

    #[arg(long)]
    force: bool,

    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Clone, Default)]
struct CommonArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    root: Option<String>,
}

#[derive(Args)]
struct InfoArgs {
    game: String,

    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    root: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(fetch) = report.downcast_ref::<FetchError>() {
            return ExitCode::from(map_exit_code(fetch));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &FetchError) -> u8 {
    match error {
        FetchError::Transport(_)
        | FetchError::Status { .. }
        | FetchError::Incomplete { .. } => 3,
        FetchError::UnknownGame(_)
        | FetchError::InvalidGameId(_)
        | FetchError::ConfigRead(_)
        | FetchError::ConfigParse(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    // A bare `pff-dm` materializes the default sample dataset.
    let command = cli.command.unwrap_or(Commands::Fetch(FetchArgs::default()));
    match command {
        Commands::Fetch(args) => run_fetch(args, output_mode),
        Commands::Status(args) => run_status(args, output_mode),
        Commands::Info(args) => run_info(args, output_mode),
        Commands::Clear(args) => run_clear(args, output_mode),
    }
}

fn resolve(
    config: Option<&str>,
    root: Option<&str>,
    games: &[String],
) -> miette::Result<ResolvedConfig> {
    let mut resolved = ConfigLoader::resolve(config).into_diagnostic()?;
    if let Some(root) = root {
        resolved.data_root = root.into();
    }
    if !games.is_empty() {
        resolved.games = games
            .iter()
            .map(|id| id.parse::<GameId>())
            .collect::<Result<Vec<_>, _>>()
            .into_diagnostic()?;
    }
    Ok(resolved)
}

/// Stand-in for commands that never touch the network.
struct NopClient;

impl SampleDataClient for NopClient {
    fn download_artifact(
        &self,
        _artifact: &pff_dataset_manager::domain::ArtifactRef,
        _url: &str,
        _destination: &std::path::Path,
    ) -> Result<(), FetchError> {
        Err(FetchError::Transport(
            "sample data client not configured".to_string(),
        ))
    }

    fn download_archive(
        &self,
        _url: &str,
        _destination: &std::path::Path,
    ) -> Result<(), FetchError> {
        Err(FetchError::Transport(
            "sample data client not configured".to_string(),
        ))
    }
}

fn run_fetch(args: FetchArgs, output_mode: OutputMode) -> miette::Result<()> {
    let resolved = resolve(args.config.as_deref(), args.root.as_deref(), &args.games)?;
    let client = HttpSampleDataClient::new().into_diagnostic()?;
    let app = Materializer::new(resolved, client);
    let options = FetchOptions {
        force: args.force,
        dry_run: args.dry_run,
        only: args.only,
    };

    match output_mode {
        OutputMode::NonInteractive => {
            let result = app
                .ensure_dataset_available(options, &JsonOutput)
                .into_diagnostic()?;
            JsonOutput::print_fetch(&result).into_diagnostic()?;
            Ok(())
        }
        OutputMode::Interactive => {
            let (root, source, games) = {
                let config = app.config();
                (
                    config.data_root.to_string(),
                    config.source.location().to_string(),
                    config.games.len(),
                )
            };
            let mut tui = Tui::new(ProgressSinkKind::Fetch, &root, &source, games);
            let result = tui.run(move |sink| app.ensure_dataset_available(options, sink))?;
            print_fetch_summary(&result);
            Ok(())
        }
    }
}

fn run_status(args: CommonArgs, output_mode: OutputMode) -> miette::Result<()> {
    let resolved = resolve(args.config.as_deref(), args.root.as_deref(), &[])?;
    let app = Materializer::new(resolved, NopClient);

    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.status(&JsonOutput).into_diagnostic()?;
            JsonOutput::print_status(&result).into_diagnostic()?;
            Ok(())
        }
        OutputMode::Interactive => {
            let result = app.status(&JsonOutput).into_diagnostic()?;
            print_status_summary(&result);
            Ok(())
        }
    }
}

fn run_info(args: InfoArgs, output_mode: OutputMode) -> miette::Result<()> {
    let resolved = resolve(args.config.as_deref(), args.root.as_deref(), &[])?;
    let app = Materializer::new(resolved, NopClient);
    let game = args.game.parse::<GameId>().into_diagnostic()?;

    let result = app.info(game, &JsonOutput).into_diagnostic()?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_info(&result).into_diagnostic(),
        OutputMode::Interactive => {
            println!("game {}", result.game);
            for artifact in &result.artifacts {
                let mark = if artifact.present { "present" } else { "missing" };
                println!("  {:<9} {:<8} {}", artifact.kind, mark, artifact.path);
            }
            println!(
                "  complete: {}",
                if result.complete { "yes" } else { "no" }
            );
            Ok(())
        }
    }
}

fn run_clear(args: CommonArgs, output_mode: OutputMode) -> miette::Result<()> {
    let resolved = resolve(args.config.as_deref(), args.root.as_deref(), &[])?;
    let app = Materializer::new(resolved, NopClient);

    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.clear(&JsonOutput).into_diagnostic()?;
            JsonOutput::print_clear(&result).into_diagnostic()?;
            Ok(())
        }
        OutputMode::Interactive => {
            let root = app.config().data_root.to_string();
            let mut tui = Tui::new(ProgressSinkKind::Clear, &root, "", 0);
            let confirmed = tui.confirm_clear(&root)?;
            if !confirmed {
                return Ok(());
            }
            let _result = app.clear(&JsonOutput).into_diagnostic()?;
            println!("cleared {root}");
            Ok(())
        }
    }
}

fn print_fetch_summary(result: &FetchReport) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}📦 PFF-DM summary{reset}");
    println!("{green}✅ Fetched artifacts: {}{reset}", result.fetched);
    println!("{yellow}⚠️ Warnings: {}{reset}", result.warnings.len());

    for item in &result.items {
        let (icon, color) = match item.action.as_str() {
            "present" => ("♻️", green),
            "fetched" | "refetched" | "download" => ("⬇️", cyan),
            _ => ("•", yellow),
        };
        let game = item.game.as_deref().unwrap_or("shared");
        println!("{color}{icon} {} {} ({}){reset}", item.kind, game, item.action);
        println!("{color}   📁 {}{reset}", item.path);
    }
    for warning in &result.warnings {
        println!("{yellow}⚠️ {warning}{reset}");
    }
}

fn print_status_summary(result: &StatusReport) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}📦 dataset at {}{reset}", result.data_root);
    for game in &result.games {
        let (icon, color) = if game.complete {
            ("✅", green)
        } else {
            ("⚠️", yellow)
        };
        println!(
            "{color}{icon} game {}: tracking={} metadata={} roster={} ({} bytes){reset}",
            game.game, game.tracking, game.metadata, game.roster, game.bytes
        );
    }
    let events = if result.events_present { "present" } else { "missing" };
    println!("   events.json: {events}");
    println!(
        "   overall: {} ({} bytes)",
        if result.complete { "complete" } else { "incomplete" },
        result.total_bytes
    );
    for warning in &result.warnings {
        println!("{yellow}⚠️ {warning}{reset}");
    }
}
