//! Point d'entrée CLI pour basins-provision

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::{CommonArgs, Commands};

/// Télécharger, extraire et reprojeter les bassins versants du Groenland
#[derive(Parser)]
#[command(name = "basins-provision")]
#[command(author, version)]
#[command(about = "Download, extract and reproject the Greenland drainage basins shapefile")]
#[command(long_about = "Provisions basins/ with the Greenland drainage basins shapefile and its EPSG:3413 reprojection.\n\nWithout a subcommand every step runs: fetch, extract, relocate, reproject. Steps already done are skipped.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(flatten)]
    common: CommonArgs,

    /// Write the run report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Sous-commande (défaut: provisionnement complet)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    let settings = cli::resolve_settings(&cli.common)?;

    match cli.command {
        Some(Commands::Fetch) => {
            info!(url = %settings.dataset.url, "Fetch only");
            cli::cmd_fetch(settings).await?;
        }
        Some(Commands::Extract) => {
            info!(archive = %settings.archive_path().display(), "Extract only");
            cli::cmd_extract(settings)?;
        }
        Some(Commands::Reproject) => {
            info!(epsg = settings.target_epsg, "Reproject only");
            cli::cmd_reproject(settings)?;
        }
        Some(Commands::Info) => {
            cli::cmd_info(&settings);
        }
        None => {
            // Commande par défaut: toutes les étapes
            info!(dataset = %settings.dataset.name, "Provisioning");
            cli::cmd_provision(settings, cli.report.as_deref()).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
