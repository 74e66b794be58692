//! Opérations disque : création du répertoire cible et déplacement des fichiers

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, ShapesetError};
use crate::types::RelocateSummary;

/// Crée `path` (et ses parents) s'il n'existe pas
///
/// Idempotent : un répertoire déjà présent n'est pas une erreur.
pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| ShapesetError::filesystem(path, e))?;
    if !path.is_dir() {
        return Err(ShapesetError::filesystem(
            path,
            std::io::Error::new(std::io::ErrorKind::AlreadyExists, "exists but is not a directory"),
        ));
    }
    Ok(())
}

/// Déplace chaque fichier de `files` dans `destination`, sous le même nom
///
/// Un fichier absent de la source mais déjà présent dans la destination est
/// considéré comme déplacé (relance). Pas de rollback : en cas d'échec, les
/// fichiers déjà déplacés le restent.
pub fn relocate_files(files: &[PathBuf], destination: &Path) -> Result<RelocateSummary> {
    let mut summary = RelocateSummary::default();

    for source in files {
        let file_name = source
            .file_name()
            .ok_or_else(|| ShapesetError::MissingFile(source.clone()))?;
        let target = destination.join(file_name);

        if source.is_file() {
            move_file(source, &target)?;
            debug!(from = %source.display(), to = %target.display(), "Moved");
            summary.moved.push(target);
        } else if target.is_file() {
            debug!(file = %target.display(), "Already in place");
            summary.already_present.push(target);
        } else {
            return Err(ShapesetError::MissingFile(source.clone()));
        }
    }

    Ok(summary)
}

/// Renomme `source` en `target`, avec copie + suppression si le renommage
/// échoue (volumes différents)
fn move_file(source: &Path, target: &Path) -> Result<()> {
    if source == target {
        return Ok(());
    }

    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            warn!(
                from = %source.display(),
                error = %rename_err,
                "Rename failed, falling back to copy"
            );
            fs::copy(source, target).map_err(|e| ShapesetError::filesystem(target, e))?;
            fs::remove_file(source).map_err(|e| ShapesetError::filesystem(source, e))?;
            Ok(())
        }
    }
}
