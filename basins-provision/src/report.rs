//! Rapport d'exécution du provisionnement
//!
//! Une entrée par étape (effectuée, ignorée ou en échec) et l'inventaire des
//! fichiers produits, affichable en console ou sauvegardable en JSON.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

/// Étapes du provisionnement, dans l'ordre d'exécution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    EnsureDirectory,
    Fetch,
    Verify,
    Extract,
    Relocate,
    Reproject,
}

impl Step {
    pub fn label(self) -> &'static str {
        match self {
            Step::EnsureDirectory => "ensure-directory",
            Step::Fetch => "fetch",
            Step::Verify => "verify",
            Step::Extract => "extract",
            Step::Relocate => "relocate",
            Step::Reproject => "reproject",
        }
    }
}

/// Statut d'une étape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Étape exécutée
    Done,
    /// Étape sans travail à faire (déjà à jour)
    Skipped,
    /// Étape en échec : les suivantes n'ont pas été exécutées
    Failed,
}

/// Statut global
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStatus {
    /// Toutes les étapes ont réussi
    Success,
    /// Une étape a échoué
    Failed,
}

/// Entrée du rapport pour une étape
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: Step,
    pub status: StepStatus,
    pub duration_secs: f64,
    /// Détail libre (octets téléchargés, nombre d'entrées, message d'erreur)
    pub detail: Option<String>,
}

/// Rapport complet d'une exécution
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    /// Nom du jeu de données
    pub dataset: String,
    /// Répertoire cible
    pub target_dir: String,
    /// Code EPSG demandé
    pub target_epsg: u32,
    /// Statut global
    pub status: ProvisionStatus,
    /// Durée totale
    pub duration_secs: f64,

    /// Étapes exécutées, dans l'ordre
    pub steps: Vec<StepReport>,

    /// Empreinte BLAKE3 de l'archive
    pub archive_blake3: Option<String>,
    /// Fichiers du jeu original présents dans le répertoire cible
    pub relocated: Vec<String>,
    /// Fichiers produits par la reprojection
    pub produced: Vec<String>,
    /// Code EPSG constaté sur la sortie
    pub output_epsg: Option<u32>,
}

impl ProvisionReport {
    /// Crée un rapport vide
    pub fn new(dataset: &str, target_dir: &Path, target_epsg: u32) -> Self {
        Self {
            dataset: dataset.to_string(),
            target_dir: target_dir.display().to_string(),
            target_epsg,
            status: ProvisionStatus::Success,
            duration_secs: 0.0,
            steps: Vec::new(),
            archive_blake3: None,
            relocated: Vec::new(),
            produced: Vec::new(),
            output_epsg: None,
        }
    }

    /// Enregistre une étape effectuée
    pub fn record_done(&mut self, step: Step, duration: Duration, detail: Option<String>) {
        self.push(step, StepStatus::Done, duration, detail);
    }

    /// Enregistre une étape ignorée
    pub fn record_skipped(&mut self, step: Step, reason: &str) {
        self.push(step, StepStatus::Skipped, Duration::ZERO, Some(reason.to_string()));
    }

    /// Enregistre une étape en échec
    pub fn record_failure(&mut self, step: Step, duration: Duration, message: &str) {
        self.push(step, StepStatus::Failed, duration, Some(message.to_string()));
        self.status = ProvisionStatus::Failed;
    }

    fn push(&mut self, step: Step, status: StepStatus, duration: Duration, detail: Option<String>) {
        self.steps.push(StepReport {
            step,
            status,
            duration_secs: duration.as_secs_f64(),
            detail,
        });
    }

    /// Définit la durée totale
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Statut d'une étape, si elle a été exécutée
    pub fn step_status(&self, step: Step) -> Option<StepStatus> {
        self.steps.iter().find(|s| s.step == step).map(|s| s.status)
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("PROVISION REPORT - {}", self.dataset);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);
        println!("Target: {} (EPSG:{})", self.target_dir, self.target_epsg);

        println!("\n--- STEPS ---");
        for s in &self.steps {
            match &s.detail {
                Some(detail) => println!(
                    "  {:<18} {:?} ({:.2}s) {}",
                    s.step.label(),
                    s.status,
                    s.duration_secs,
                    detail
                ),
                None => println!(
                    "  {:<18} {:?} ({:.2}s)",
                    s.step.label(),
                    s.status,
                    s.duration_secs
                ),
            }
        }

        if let Some(ref hash) = self.archive_blake3 {
            println!("\nArchive BLAKE3: {}", hash);
        }

        if !self.relocated.is_empty() {
            println!("\n--- ORIGINAL ({}) ---", self.relocated.len());
            for f in &self.relocated {
                println!("  {}", f);
            }
        }

        if !self.produced.is_empty() {
            let epsg = self
                .output_epsg
                .map(|e| format!("EPSG:{}", e))
                .unwrap_or_else(|| "unverified".to_string());
            println!("\n--- REPROJECTED ({}, {}) ---", self.produced.len(), epsg);
            for f in &self.produced {
                println!("  {}", f);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        let done = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Done)
            .count();
        let skipped = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Skipped)
            .count();
        format!(
            "{}: {:?}, {} steps done, {} skipped, {} original files, {} reprojected files",
            self.dataset,
            self.status,
            done,
            skipped,
            self.relocated.len(),
            self.produced.len()
        )
    }
}
