//! Définition et implémentation des commandes CLI
//!
//! Sans sous-commande, toutes les étapes s'enchaînent. Les sous-commandes
//! permettent de rejouer une étape isolée :
//! - `fetch`: téléchargement conditionnel de l'archive
//! - `extract`: extraction et rangement dans le répertoire cible
//! - `reproject`: reprojection du jeu déjà rangé
//! - `info`: configuration résolue et outils détectés

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::warn;

use basins_provision::config::{self, Config, Overrides, Settings};
use basins_provision::convert::{self, srs};
use basins_provision::fetch::FetchOutcome;
use basins_provision::Provisioner;

#[derive(Subcommand)]
pub enum Commands {
    /// Download the archive unless it is already present
    Fetch,

    /// Extract the archive and move the dataset files into the target directory
    Extract,

    /// Reproject the shapefile already in the target directory
    Reproject,

    /// Show the resolved configuration and detected GDAL tools
    Info,
}

/// Options communes à toutes les commandes (toutes facultatives)
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Config preset name (greenland-basins) or path to a JSON config
    #[arg(long, global = true, default_value = config::DEFAULT_PRESET)]
    pub config: String,

    /// Override the archive URL (défaut : env BASINS_URL / preset)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Directory where the archive is downloaded and extracted (défaut : env BASINS_WORK_DIR / .)
    #[arg(long, global = true)]
    pub work_dir: Option<PathBuf>,

    /// Target directory, relative to the work directory (défaut : env BASINS_DIR / basins)
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    /// Target EPSG code for the reprojection (défaut : env BASINS_TARGET_EPSG / 3413)
    #[arg(long, global = true)]
    pub epsg: Option<u32>,

    /// HTTP timeout in seconds (défaut : env BASINS_HTTP_TIMEOUT / 300)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Expected BLAKE3 checksum of the archive, hex (défaut : env BASINS_CHECKSUM)
    #[arg(long, global = true)]
    pub checksum: Option<String>,
}

impl CommonArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            url: self.url.clone(),
            work_dir: self.work_dir.clone(),
            target_dir: self.dir.clone(),
            target_epsg: self.epsg,
            timeout_secs: self.timeout,
            checksum: self.checksum.clone(),
            ogr2ogr: None,
            gdalsrsinfo: None,
        }
    }
}

/// Résout la configuration : preset ou fichier, puis env, puis CLI
pub fn resolve_settings(args: &CommonArgs) -> Result<Settings> {
    resolve_with_env(args, Overrides::from_env())
}

fn resolve_with_env(args: &CommonArgs, env: Overrides) -> Result<Settings> {
    let config = Config::from_spec(&args.config)
        .with_context(|| format!("Cannot load config '{}'", args.config))?;
    Settings::resolve(config, args.overrides().or(env))
}

/// Exécute le provisionnement complet
pub async fn cmd_provision(settings: Settings, report_path: Option<&Path>) -> Result<()> {
    println!("=== Provision {} ===", settings.dataset.name);
    println!("URL: {}", settings.dataset.url);
    println!("Archive: {}", settings.archive_path().display());
    println!("Target: {}", settings.target_dir.display());
    println!("Target EPSG: {}", settings.target_epsg);
    println!("HTTP timeout: {}s", settings.http.timeout.as_secs());

    let provisioner = Provisioner::new(settings)?;
    let mut report = provisioner.new_report();

    let result = provisioner.run(&mut report).await;

    report.display();

    if let Some(path) = report_path {
        report
            .save_to_file(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("Report saved to {}", path.display());
    }

    result.context("Provisioning failed")?;
    println!("{}", report.summary());

    Ok(())
}

/// Exécute la commande fetch
pub async fn cmd_fetch(settings: Settings) -> Result<()> {
    let provisioner = Provisioner::new(settings)?;

    match provisioner.fetch().await? {
        FetchOutcome::AlreadyPresent => println!(
            "Archive already present: {}",
            provisioner.settings().archive_path().display()
        ),
        FetchOutcome::Downloaded { bytes } => println!(
            "Downloaded {} bytes to {}",
            bytes,
            provisioner.settings().archive_path().display()
        ),
    }

    let hash = provisioner.verify_archive()?;
    println!("BLAKE3: {}", hash);

    Ok(())
}

/// Exécute la commande extract (extraction + rangement)
pub fn cmd_extract(settings: Settings) -> Result<()> {
    let provisioner = Provisioner::new(settings)?;

    provisioner.ensure_directory()?;
    provisioner.verify_archive()?;
    let extracted = provisioner.extract()?;
    let relocated = provisioner.relocate()?;

    println!(
        "Extract complete: {} extracted, {} up to date; {} moved, {} already in {}",
        extracted.extracted.len(),
        extracted.skipped.len(),
        relocated.moved.len(),
        relocated.already_present.len(),
        provisioner.settings().target_dir.display()
    );

    Ok(())
}

/// Exécute la commande reproject
pub fn cmd_reproject(settings: Settings) -> Result<()> {
    let provisioner = Provisioner::new(settings)?;
    let outcome = provisioner.reproject()?;

    match outcome.detected_epsg {
        Some(epsg) => println!(
            "Reprojection complete: {} ({} files, EPSG:{})",
            outcome.output.display(),
            outcome.produced.len(),
            epsg
        ),
        None => {
            warn!("Output spatial reference was not verified");
            println!(
                "Reprojection complete: {} ({} files)",
                outcome.output.display(),
                outcome.produced.len()
            );
        }
    }

    Ok(())
}

/// Affiche la configuration résolue
pub fn cmd_info(settings: &Settings) {
    let dataset = &settings.dataset;

    println!("Dataset: {}", dataset.name);
    println!("URL: {}", dataset.url);
    println!("Archive: {}", settings.archive_path().display());
    println!(
        "Checksum: {}",
        dataset.checksum.as_deref().unwrap_or("(none)")
    );
    println!("Work dir: {}", settings.work_dir.display());
    println!("Target: {}", settings.target_dir.display());
    println!("Files:");
    for name in dataset.file_names() {
        println!("  {}", name);
    }
    println!(
        "Reprojected: {}.shp (EPSG:{})",
        dataset.reprojected_base(settings.target_epsg),
        settings.target_epsg
    );

    let ogr2ogr = convert::tool_version(&settings.tools.ogr2ogr)
        .map(|v| format!("GDAL {}", v))
        .unwrap_or_else(|| "not found".to_string());
    println!("ogr2ogr ({}): {}", settings.tools.ogr2ogr, ogr2ogr);
    println!(
        "SRS check: {}",
        if srs::in_process_available() {
            "PROJ (in-process)".to_string()
        } else {
            format!("{} -o epsg", settings.tools.gdalsrsinfo)
        }
    );
}
