//! Séquence de provisionnement : répertoire → téléchargement → extraction →
//! déplacement → reprojection
//!
//! Les étapes s'exécutent strictement dans l'ordre, sans relance. La première
//! erreur interrompt la séquence ; les fichiers déjà déplacés le restent.

use std::time::Instant;

use reqwest::Client;
use shapeset::{archive, checksum, fs, ExtractSummary, RelocateSummary};
use tracing::{error, info};

use crate::config::Settings;
use crate::convert::{self, ConversionOutcome};
use crate::error::ProvisionError;
use crate::fetch::{self, FetchOutcome};
use crate::report::{ProvisionReport, Step};

/// Exécute les étapes du provisionnement pour un jeu de données
pub struct Provisioner {
    settings: Settings,
    client: Client,
}

impl Provisioner {
    /// Crée un provisioner (construit le client HTTP)
    pub fn new(settings: Settings) -> Result<Self, ProvisionError> {
        let client = fetch::build_client(&settings.http)?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Rapport vide pour ce jeu de données
    pub fn new_report(&self) -> ProvisionReport {
        ProvisionReport::new(
            &self.settings.dataset.name,
            &self.settings.target_dir,
            self.settings.target_epsg,
        )
    }

    /// Exécute toutes les étapes et renseigne `report`
    ///
    /// Si le répertoire cible contient déjà le jeu complet, le téléchargement
    /// et l'extraction sont ignorés.
    pub async fn run(&self, report: &mut ProvisionReport) -> Result<(), ProvisionError> {
        let start = Instant::now();
        let result = self.run_steps(report).await;
        report.set_duration(start.elapsed());
        result
    }

    async fn run_steps(&self, report: &mut ProvisionReport) -> Result<(), ProvisionError> {
        let settings = &self.settings;
        let complete = settings.dataset.is_complete_in(&settings.target_dir);

        // Créé avant le téléchargement : sur hôte injoignable il reste vide
        let t = Instant::now();
        track(report, Step::EnsureDirectory, t, self.ensure_directory())?;
        report.record_done(Step::EnsureDirectory, t.elapsed(), None);

        if complete {
            info!(
                dir = %settings.target_dir.display(),
                "Dataset already complete in target directory, skipping download and extraction"
            );
            report.record_skipped(Step::Fetch, "dataset already in target directory");
            report.record_skipped(Step::Extract, "dataset already in target directory");
        } else {
            let t = Instant::now();
            match track(report, Step::Fetch, t, self.fetch().await)? {
                FetchOutcome::AlreadyPresent => {
                    report.record_skipped(Step::Fetch, "archive already present")
                }
                FetchOutcome::Downloaded { bytes } => {
                    report.record_done(Step::Fetch, t.elapsed(), Some(format!("{} bytes", bytes)))
                }
            }

            let t = Instant::now();
            let hash = track(report, Step::Verify, t, self.verify_archive())?;
            let detail = if settings.dataset.checksum.is_some() {
                "checksum matches"
            } else {
                "no checksum configured"
            };
            report.archive_blake3 = Some(hash);
            report.record_done(Step::Verify, t.elapsed(), Some(detail.to_string()));

            let t = Instant::now();
            let summary = track(report, Step::Extract, t, self.extract())?;
            if summary.extracted.is_empty() {
                report.record_skipped(Step::Extract, "all entries up to date");
            } else {
                report.record_done(
                    Step::Extract,
                    t.elapsed(),
                    Some(format!(
                        "{} extracted, {} up to date",
                        summary.extracted.len(),
                        summary.skipped.len()
                    )),
                );
            }
        }

        let t = Instant::now();
        let summary = track(report, Step::Relocate, t, self.relocate())?;
        report.relocated = settings.dataset.file_names();
        report.record_done(
            Step::Relocate,
            t.elapsed(),
            Some(format!(
                "{} moved, {} already present",
                summary.moved.len(),
                summary.already_present.len()
            )),
        );

        let t = Instant::now();
        let outcome = track(report, Step::Reproject, t, self.reproject())?;
        report.produced = outcome
            .produced
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        report.output_epsg = outcome.detected_epsg;
        report.record_done(
            Step::Reproject,
            t.elapsed(),
            Some(outcome.output.display().to_string()),
        );

        Ok(())
    }

    /// Crée le répertoire cible
    pub fn ensure_directory(&self) -> Result<(), ProvisionError> {
        fs::ensure_directory(&self.settings.target_dir)?;
        Ok(())
    }

    /// Télécharge l'archive si elle est absente du répertoire de travail
    pub async fn fetch(&self) -> Result<FetchOutcome, ProvisionError> {
        fetch::fetch_if_absent(
            &self.client,
            &self.settings.dataset.url,
            &self.settings.archive_path(),
        )
        .await
    }

    /// Calcule l'empreinte de l'archive et la compare à celle configurée
    pub fn verify_archive(&self) -> Result<String, ProvisionError> {
        let path = self.settings.archive_path();
        let hash = checksum::verify(&path, self.settings.dataset.checksum.as_deref())?;
        info!(archive = %path.display(), blake3 = %hash, "Archive checksum");
        Ok(hash)
    }

    /// Extrait l'archive dans le répertoire de travail (update-if-newer)
    pub fn extract(&self) -> Result<ExtractSummary, ProvisionError> {
        let path = self.settings.archive_path();
        let summary = archive::extract(&path, &self.settings.work_dir)?;
        info!(
            archive = %path.display(),
            extracted = summary.extracted.len(),
            up_to_date = summary.skipped.len(),
            bytes = summary.bytes_written,
            "Archive extracted"
        );
        Ok(summary)
    }

    /// Déplace le jeu de fichiers vers le répertoire cible
    pub fn relocate(&self) -> Result<RelocateSummary, ProvisionError> {
        let dataset = &self.settings.dataset;
        let files = dataset.files_in(&self.settings.work_dir);
        let summary = fs::relocate_files(&files, &self.settings.target_dir)?;
        info!(
            dir = %self.settings.target_dir.display(),
            moved = summary.moved.len(),
            already_present = summary.already_present.len(),
            "Files relocated"
        );
        Ok(summary)
    }

    /// Produit la variante reprojetée à côté de l'original
    pub fn reproject(&self) -> Result<ConversionOutcome, ProvisionError> {
        let settings = &self.settings;
        let input = settings.dataset.shapefile_in(&settings.target_dir);
        let output = settings
            .dataset
            .reprojected_shapefile_in(&settings.target_dir, settings.target_epsg);

        Ok(convert::reproject(
            &settings.tools,
            &input,
            &output,
            settings.target_epsg,
        )?)
    }
}

/// Consigne l'échec d'une étape dans le rapport avant de le propager
fn track<T>(
    report: &mut ProvisionReport,
    step: Step,
    started: Instant,
    result: Result<T, ProvisionError>,
) -> Result<T, ProvisionError> {
    if let Err(ref e) = result {
        error!(step = step.label(), error = %e, "Step failed");
        report.record_failure(step, started.elapsed(), &e.to_string());
    }
    result
}
