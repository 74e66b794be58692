//! Types de données pour le crate shapeset

use std::path::{Path, PathBuf};

/// Extensions d'un jeu de shapefiles complet (avec les fichiers de style QGIS)
pub const SHAPEFILE_EXTENSIONS: [&str; 7] = ["cpg", "dbf", "prj", "qml", "qpj", "shp", "shx"];

/// Jeu de données distant : une archive zip contenant des fichiers
/// partageant un même nom de base
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    /// Nom court du jeu (ex: "greenland-basins")
    pub name: String,

    /// URL de l'archive distante
    pub url: String,

    /// Nom local de l'archive (ex: "Greenland_Basins_PS_v1.4.2.zip")
    pub archive: String,

    /// Nom de base commun à tous les fichiers
    pub base_name: String,

    /// Extensions à déplacer ensemble (sans le point)
    pub extensions: Vec<String>,

    /// Empreinte BLAKE3 attendue de l'archive (hex)
    pub checksum: Option<String>,
}

impl Dataset {
    /// Noms des fichiers du jeu, dans l'ordre de déclaration des extensions
    pub fn file_names(&self) -> Vec<String> {
        self.extensions
            .iter()
            .map(|ext| format!("{}.{}", self.base_name, ext))
            .collect()
    }

    /// Chemins des fichiers du jeu dans `dir`
    pub fn files_in(&self, dir: &Path) -> Vec<PathBuf> {
        self.file_names().into_iter().map(|f| dir.join(f)).collect()
    }

    /// Vrai si tous les fichiers du jeu sont présents dans `dir`
    pub fn is_complete_in(&self, dir: &Path) -> bool {
        self.files_in(dir).iter().all(|p| p.is_file())
    }

    /// Chemin du fichier `.shp` dans `dir`
    pub fn shapefile_in(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.shp", self.base_name))
    }

    /// Nom de base de la variante reprojetée (ex: "..._epsg3413")
    pub fn reprojected_base(&self, epsg: u32) -> String {
        format!("{}_epsg{}", self.base_name, epsg)
    }

    /// Chemin du `.shp` reprojeté dans `dir`
    pub fn reprojected_shapefile_in(&self, dir: &Path, epsg: u32) -> PathBuf {
        dir.join(format!("{}.shp", self.reprojected_base(epsg)))
    }
}

/// Bilan d'une extraction
#[derive(Debug, Default, Clone)]
pub struct ExtractSummary {
    /// Fichiers écrits (chemins relatifs à l'archive)
    pub extracted: Vec<PathBuf>,

    /// Fichiers ignorés car la copie sur disque est au moins aussi récente
    pub skipped: Vec<PathBuf>,

    /// Octets écrits
    pub bytes_written: u64,
}

impl ExtractSummary {
    pub fn entry_count(&self) -> usize {
        self.extracted.len() + self.skipped.len()
    }
}

/// Bilan d'un déplacement de fichiers
#[derive(Debug, Default, Clone)]
pub struct RelocateSummary {
    /// Fichiers déplacés vers la destination
    pub moved: Vec<PathBuf>,

    /// Fichiers absents de la source mais déjà présents dans la destination
    pub already_present: Vec<PathBuf>,
}

impl RelocateSummary {
    pub fn total(&self) -> usize {
        self.moved.len() + self.already_present.len()
    }
}
