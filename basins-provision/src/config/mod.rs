//! Configuration du provisionnement
//!
//! Trois couches, de la plus faible à la plus forte : preset JSON (embarqué
//! ou fichier), variables d'environnement (`.env` compris), options CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use shapeset::Dataset;

use crate::convert::ToolSettings;
use crate::fetch::HttpSettings;

/// Preset par défaut
pub const DEFAULT_PRESET: &str = "greenland-basins";

/// Configuration principale
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub dataset: DatasetConfig,

    #[serde(default)]
    pub target: TargetConfig,
}

/// Description du jeu de données distant
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetConfig {
    /// Nom court du jeu
    pub name: String,

    /// URL de l'archive zip
    pub url: String,

    /// Nom local de l'archive (défaut : dernier segment de l'URL)
    #[serde(default)]
    pub archive: Option<String>,

    /// Nom de base commun des fichiers
    pub base_name: String,

    /// Extensions à déplacer ensemble
    pub extensions: Vec<String>,

    /// Empreinte BLAKE3 attendue de l'archive
    #[serde(default)]
    pub checksum: Option<String>,
}

/// Destination et système de référence cible
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// Répertoire cible, relatif au répertoire de travail
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Code EPSG de la reprojection
    #[serde(default = "default_epsg")]
    pub epsg: u32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            epsg: default_epsg(),
        }
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from("basins")
}

fn default_epsg() -> u32 {
    3413
}

impl Config {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse config JSON")
    }

    /// Charge une configuration depuis un preset embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "greenland-basins" => {
                Self::load_embedded(include_str!("presets/greenland_basins.json"))
            }
            _ => anyhow::bail!("Unknown preset: {}. Use: greenland-basins", preset),
        }
    }

    /// Preset si le nom est connu, fichier JSON sinon
    pub fn from_spec(spec: &str) -> Result<Self> {
        let path = Path::new(spec);
        if spec.ends_with(".json") || path.is_file() {
            Self::load(path)
        } else {
            Self::from_preset(spec)
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse embedded config")
    }
}

/// Surcharges issues de l'environnement ou de la ligne de commande
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub work_dir: Option<PathBuf>,
    pub target_dir: Option<PathBuf>,
    pub target_epsg: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub checksum: Option<String>,
    pub ogr2ogr: Option<String>,
    pub gdalsrsinfo: Option<String>,
}

impl Overrides {
    /// Charge les surcharges depuis les variables d'environnement
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("BASINS_URL").ok(),
            work_dir: std::env::var("BASINS_WORK_DIR").ok().map(PathBuf::from),
            target_dir: std::env::var("BASINS_DIR").ok().map(PathBuf::from),
            target_epsg: std::env::var("BASINS_TARGET_EPSG")
                .ok()
                .and_then(|s| s.parse().ok()),
            timeout_secs: std::env::var("BASINS_HTTP_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok()),
            checksum: std::env::var("BASINS_CHECKSUM").ok(),
            ogr2ogr: std::env::var("OGR2OGR").ok(),
            gdalsrsinfo: std::env::var("GDALSRSINFO").ok(),
        }
    }

    /// Complète `self` avec `fallback` ; les valeurs de `self` l'emportent
    pub fn or(self, fallback: Overrides) -> Overrides {
        Overrides {
            url: self.url.or(fallback.url),
            work_dir: self.work_dir.or(fallback.work_dir),
            target_dir: self.target_dir.or(fallback.target_dir),
            target_epsg: self.target_epsg.or(fallback.target_epsg),
            timeout_secs: self.timeout_secs.or(fallback.timeout_secs),
            checksum: self.checksum.or(fallback.checksum),
            ogr2ogr: self.ogr2ogr.or(fallback.ogr2ogr),
            gdalsrsinfo: self.gdalsrsinfo.or(fallback.gdalsrsinfo),
        }
    }
}

/// Paramètres résolus d'une exécution
#[derive(Debug, Clone)]
pub struct Settings {
    pub dataset: Dataset,
    /// Répertoire où l'archive est téléchargée et extraite
    pub work_dir: PathBuf,
    /// Répertoire recevant le jeu original et sa variante reprojetée
    pub target_dir: PathBuf,
    pub target_epsg: u32,
    pub http: HttpSettings,
    pub tools: ToolSettings,
}

impl Settings {
    /// Fusionne la configuration et les surcharges
    pub fn resolve(config: Config, overrides: Overrides) -> Result<Self> {
        let url = overrides.url.unwrap_or(config.dataset.url);
        let parsed = Url::parse(&url).context(format!("Invalid dataset URL: {}", url))?;

        let archive = match config.dataset.archive {
            Some(name) => name,
            None => archive_name_from_url(&parsed)
                .unwrap_or_else(|| format!("{}.zip", config.dataset.base_name)),
        };

        if config.dataset.extensions.is_empty() {
            anyhow::bail!("Dataset {} declares no file extensions", config.dataset.name);
        }

        let target_epsg = overrides.target_epsg.unwrap_or(config.target.epsg);
        if target_epsg == 0 {
            anyhow::bail!("Target EPSG code must be positive");
        }

        let work_dir = overrides.work_dir.unwrap_or_else(|| PathBuf::from("."));
        let target_dir = work_dir.join(overrides.target_dir.unwrap_or(config.target.dir));

        let mut http = HttpSettings::default();
        if let Some(secs) = overrides.timeout_secs {
            http.timeout = Duration::from_secs(secs);
        }

        let mut tools = ToolSettings::default();
        if let Some(program) = overrides.ogr2ogr {
            tools.ogr2ogr = program;
        }
        if let Some(program) = overrides.gdalsrsinfo {
            tools.gdalsrsinfo = program;
        }

        Ok(Self {
            dataset: Dataset {
                name: config.dataset.name,
                url,
                archive,
                base_name: config.dataset.base_name,
                extensions: config.dataset.extensions,
                checksum: overrides.checksum.or(config.dataset.checksum),
            },
            work_dir,
            target_dir,
            target_epsg,
            http,
            tools,
        })
    }

    /// Chemin local de l'archive
    pub fn archive_path(&self) -> PathBuf {
        self.work_dir.join(&self.dataset.archive)
    }
}

/// Dernier segment non vide du chemin de l'URL
fn archive_name_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(|s| s.to_string())
}
