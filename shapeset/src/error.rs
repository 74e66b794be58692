//! Types d'erreurs pour le crate shapeset

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Erreurs pouvant survenir lors de la manipulation d'un jeu de shapefiles
#[derive(Debug, Error)]
pub enum ShapesetError {
    /// Erreur d'I/O sur un chemin précis
    #[error("I/O error on {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Fichier attendu absent
    #[error("Missing file: {0}")]
    MissingFile(PathBuf),

    /// Archive corrompue ou format non supporté
    #[error("Invalid archive {path}: {reason}")]
    InvalidArchive { path: PathBuf, reason: String },

    /// Entrée dont le chemin sort du répertoire de destination
    #[error("Unsafe entry path in {archive}: {entry}")]
    UnsafeEntry { archive: PathBuf, entry: String },

    /// Empreinte de l'archive différente de celle attendue
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

impl ShapesetError {
    /// Crée une erreur d'I/O avec le chemin concerné
    pub fn filesystem(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Crée une erreur d'archive invalide
    pub fn invalid_archive(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::InvalidArchive {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Vrai si l'erreur vient du contenu de l'archive plutôt que du disque
    pub fn is_archive_fault(&self) -> bool {
        matches!(
            self,
            Self::InvalidArchive { .. } | Self::UnsafeEntry { .. } | Self::ChecksumMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ShapesetError>;
