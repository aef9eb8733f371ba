use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pathwise::{RouteManifest, Settings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pathwise")]
#[command(about = "Route manifest tooling for pathwise applications", long_about = None)]
struct Cli {
    /// Settings file; defaults apply when the default file is absent.
    #[arg(short, long, default_value = "pathwise.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Route manifest commands
    #[command(subcommand)]
    Routes(RoutesCommand),
}

#[derive(Subcommand)]
enum RoutesCommand {
    /// Compile the controller tree and write the manifest
    Build,
    /// Print the route table in resolution order
    List {
        /// Read the written manifest instead of scanning the tree
        #[arg(long)]
        manifest: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pathwise=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), pathwise::Error> {
    let settings = load_settings(&cli.config)?;
    match cli.command {
        Commands::Routes(RoutesCommand::Build) => {
            let manifest = RouteManifest::compile(&settings.controllers);
            manifest.write(&settings.manifest.path)?;
            println!("{} routes written to {}", manifest.len(), settings.manifest.path.display());
        }
        Commands::Routes(RoutesCommand::List { manifest }) => {
            let table = if manifest {
                RouteManifest::load(&settings.manifest.path)?
            } else {
                RouteManifest::compile(&settings.controllers)
            };
            for entry in table.entries() {
                let methods: Vec<&str> = entry.methods.iter().map(|m| m.as_str()).collect();
                println!("{:<24} {:<32} {}", methods.join(","), entry.path, entry.controller);
            }
        }
    }
    Ok(())
}

fn load_settings(path: &Path) -> Result<Settings, pathwise::Error> {
    if path.exists() {
        return Ok(Settings::load(path)?);
    }
    Ok(Settings::default().with_env_overrides()?)
}
