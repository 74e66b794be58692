//! Taxonomie des erreurs de provisionnement
//!
//! Quatre familles : disque, réseau, archive, conversion. Aucune n'est
//! récupérée localement ; la première erreur interrompt la séquence.

use std::path::PathBuf;

use shapeset::ShapesetError;
use thiserror::Error;

/// Erreur d'une étape du provisionnement
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Création de répertoire, écriture ou déplacement de fichier
    #[error("Filesystem error: {0}")]
    Filesystem(#[source] ShapesetError),

    /// Téléchargement de l'archive
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Archive corrompue, format non supporté ou empreinte invalide
    #[error("Archive error: {0}")]
    Archive(#[source] ShapesetError),

    /// Reprojection via l'outil externe
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),
}

impl From<ShapesetError> for ProvisionError {
    fn from(err: ShapesetError) -> Self {
        if err.is_archive_fault() {
            Self::Archive(err)
        } else {
            Self::Filesystem(err)
        }
    }
}

impl ProvisionError {
    /// Crée une erreur disque avec le chemin concerné
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem(ShapesetError::filesystem(path.into(), source))
    }
}

/// Erreurs réseau
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Impossible de construire le client HTTP
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Hôte injoignable, timeout ou transfert interrompu
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Réponse HTTP non 2xx
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Erreurs de reprojection
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Le shapefile source n'a pas de système de référence (.prj absent ou vide)
    #[error("{0} has no spatial reference (missing or empty .prj)")]
    MissingSourceReference(PathBuf),

    /// Outil introuvable ou non exécutable
    #[error("Cannot run {tool}: {source}")]
    ToolUnavailable {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// L'outil a terminé avec un code non nul
    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// Fichier de sortie attendu absent
    #[error("Conversion did not produce {0}")]
    MissingOutput(PathBuf),

    /// Le système de référence de la sortie ne correspond pas à la cible
    #[error("Output {path} is not in EPSG:{expected} (found {found})")]
    SrsMismatch {
        path: PathBuf,
        expected: u32,
        found: String,
    },

    /// Code EPSG cible invalide
    #[error("Invalid target EPSG code: {0}")]
    InvalidTarget(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapeset_error_classification() {
        let archive: ProvisionError = ShapesetError::invalid_archive("a.zip", "truncated").into();
        assert!(matches!(archive, ProvisionError::Archive(_)));

        let missing: ProvisionError = ShapesetError::MissingFile(PathBuf::from("a.shp")).into();
        assert!(matches!(missing, ProvisionError::Filesystem(_)));
    }

    #[test]
    fn test_messages_carry_context() {
        let err = ProvisionError::from(NetworkError::Status {
            url: "https://example.org/a.zip".into(),
            status: 404,
        });
        let msg = err.to_string();
        assert!(msg.starts_with("Network error"));
        assert!(msg.contains("404"));

        let err = ProvisionError::from(ConversionError::ToolFailed {
            tool: "ogr2ogr".into(),
            status: "exit status: 1".into(),
            stderr: "ERROR 1: Unable to open datasource".into(),
        });
        assert!(err.to_string().contains("Unable to open datasource"));
    }
}
