//! Extraction des archives zip avec sémantique « update-if-newer »
//!
//! Une entrée n'est écrite que si aucune copie n'existe sur disque ou si la
//! copie existante est plus ancienne que l'entrée. Les fichiers extraits
//! reçoivent la date de modification de l'entrée, si bien qu'une seconde
//! extraction de la même archive n'écrit rien.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::NaiveDateTime;
use tracing::{debug, trace};
use zip::ZipArchive;

use crate::error::{Result, ShapesetError};
use crate::types::ExtractSummary;

/// Extrait une archive zip dans `destination`
///
/// # Arguments
///
/// * `archive_path` - Chemin vers l'archive .zip
/// * `destination` - Répertoire cible (créé si absent)
///
/// # Errors
///
/// `ShapesetError::InvalidArchive` si l'archive est illisible ou corrompue,
/// `ShapesetError::UnsafeEntry` si une entrée sort de `destination`,
/// `ShapesetError::Filesystem` en cas d'échec d'écriture.
pub fn extract(archive_path: &Path, destination: &Path) -> Result<ExtractSummary> {
    let file = File::open(archive_path).map_err(|e| ShapesetError::filesystem(archive_path, e))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| ShapesetError::invalid_archive(archive_path, e.to_string()))?;

    fs::create_dir_all(destination).map_err(|e| ShapesetError::filesystem(destination, e))?;

    let mut summary = ExtractSummary::default();

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| ShapesetError::invalid_archive(archive_path, e.to_string()))?;

        let relative: PathBuf = match entry.enclosed_name() {
            Some(p) => p.to_path_buf(),
            None => {
                return Err(ShapesetError::UnsafeEntry {
                    archive: archive_path.to_path_buf(),
                    entry: entry.name().to_string(),
                })
            }
        };
        let target = destination.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| ShapesetError::filesystem(&target, e))?;
            continue;
        }

        let entry_time = entry.last_modified().and_then(zip_time_to_system);

        if is_up_to_date(&target, entry_time) {
            trace!(entry = %relative.display(), "On-disk copy is up to date, skipping");
            summary.skipped.push(relative);
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| ShapesetError::filesystem(parent, e))?;
        }

        let written = match write_entry(&mut entry, &target, entry_time, archive_path) {
            Ok(n) => n,
            Err(e) => {
                // Ne pas laisser un fichier tronqué qui passerait pour à jour
                let _ = fs::remove_file(&target);
                return Err(e);
            }
        };

        debug!(entry = %relative.display(), bytes = written, "Extracted");
        summary.bytes_written += written;
        summary.extracted.push(relative);
    }

    Ok(summary)
}

/// Copie le contenu d'une entrée vers `target`
///
/// Les erreurs de lecture sont imputées à l'archive, les erreurs d'écriture au disque.
fn write_entry<R: Read>(
    entry: &mut R,
    target: &Path,
    entry_time: Option<SystemTime>,
    archive_path: &Path,
) -> Result<u64> {
    let mut out = File::create(target).map_err(|e| ShapesetError::filesystem(target, e))?;
    let mut buffer = [0u8; 65536]; // 64KB buffer
    let mut total = 0u64;

    loop {
        let n = entry
            .read(&mut buffer)
            .map_err(|e| ShapesetError::invalid_archive(archive_path, e.to_string()))?;
        if n == 0 {
            break;
        }
        out.write_all(&buffer[..n])
            .map_err(|e| ShapesetError::filesystem(target, e))?;
        total += n as u64;
    }

    out.flush().map_err(|e| ShapesetError::filesystem(target, e))?;

    if let Some(time) = entry_time {
        out.set_modified(time)
            .map_err(|e| ShapesetError::filesystem(target, e))?;
    }

    Ok(total)
}

/// Vrai si `target` existe et n'est pas plus ancien que l'entrée
fn is_up_to_date(target: &Path, entry_time: Option<SystemTime>) -> bool {
    let Ok(meta) = fs::metadata(target) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    match (meta.modified().ok(), entry_time) {
        (Some(on_disk), Some(entry)) => on_disk >= entry,
        // Sans horodatage exploitable on réécrit
        _ => false,
    }
}

/// Convertit un horodatage DOS de l'archive en `SystemTime`
///
/// Les dates zip n'ont pas de fuseau : elles sont interprétées en UTC.
fn zip_time_to_system(dt: zip::DateTime) -> Option<SystemTime> {
    let naive = NaiveDateTime::try_from(dt).ok()?;
    Some(SystemTime::from(naive.and_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::{Duration, UNIX_EPOCH};
    use zip::write::SimpleFileOptions;
    use zip::CompressionMethod;

    fn build_zip(path: &Path, files: &[(&str, &[u8])], time: zip::DateTime) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default().last_modified_time(time);
        for (name, content) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    fn dos_time() -> zip::DateTime {
        zip::DateTime::from_date_and_time(2019, 6, 15, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_zip_time_conversion() {
        let time = zip_time_to_system(dos_time()).unwrap();
        let secs = time.duration_since(UNIX_EPOCH).unwrap().as_secs();
        // 2019-06-15T12:30:00Z
        assert_eq!(secs, 1_560_601_800);
    }

    #[test]
    fn test_extract_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract(Path::new("nonexistent.zip"), dir.path());
        assert!(matches!(result, Err(ShapesetError::Filesystem { .. })));
    }

    #[test]
    fn test_extract_not_a_zip() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"this is not a zip archive").unwrap();

        let err = extract(&archive, &dir.path().join("out")).unwrap_err();
        assert!(err.is_archive_fault(), "unexpected error: {err}");
    }

    #[test]
    fn test_extract_then_skip_on_rerun() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("data.zip");
        build_zip(&archive, &[("a.shp", b"shape"), ("a.dbf", b"table")], dos_time());
        let out = dir.path().join("out");

        let first = extract(&archive, &out).unwrap();
        assert_eq!(first.extracted.len(), 2);
        assert!(first.skipped.is_empty());
        assert_eq!(first.bytes_written, 10);
        assert_eq!(fs::read(out.join("a.shp")).unwrap(), b"shape");

        let second = extract(&archive, &out).unwrap();
        assert!(second.extracted.is_empty());
        assert_eq!(second.skipped.len(), 2);
        assert_eq!(second.entry_count(), 2);
    }

    #[test]
    fn test_older_copy_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("data.zip");
        build_zip(&archive, &[("a.prj", b"PROJCS[...]")], dos_time());
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();

        let stale = File::create(out.join("a.prj")).unwrap();
        stale
            .set_modified(UNIX_EPOCH + Duration::from_secs(1_000_000_000))
            .unwrap();
        drop(stale);

        let summary = extract(&archive, &out).unwrap();
        assert_eq!(summary.extracted, vec![PathBuf::from("a.prj")]);
        assert_eq!(fs::read(out.join("a.prj")).unwrap(), b"PROJCS[...]");
    }

    #[test]
    fn test_newer_copy_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("data.zip");
        build_zip(&archive, &[("a.qml", b"<qgis/>")], dos_time());
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("a.qml"), b"local edit").unwrap();

        let summary = extract(&archive, &out).unwrap();
        assert_eq!(summary.skipped, vec![PathBuf::from("a.qml")]);
        assert_eq!(fs::read(out.join("a.qml")).unwrap(), b"local edit");
    }

    #[test]
    fn test_nested_entries() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("nested.zip");

        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            let options = SimpleFileOptions::default().last_modified_time(dos_time());
            writer.add_directory("sub/", options).unwrap();
            writer.start_file("sub/b.shx", options).unwrap();
            writer.write_all(b"index").unwrap();
            writer.finish().unwrap();
        }
        fs::write(&archive, buf.into_inner()).unwrap();

        let out = dir.path().join("out");
        let summary = extract(&archive, &out).unwrap();
        assert_eq!(summary.extracted, vec![PathBuf::from("sub/b.shx")]);
        assert!(out.join("sub").is_dir());
    }

    #[test]
    fn test_entry_escaping_destination_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("evil.zip");
        build_zip(&archive, &[("../evil.txt", b"outside")], dos_time());
        let out = dir.path().join("out");

        let err = extract(&archive, &out).unwrap_err();
        assert!(matches!(err, ShapesetError::UnsafeEntry { ref entry, .. } if entry == "../evil.txt"));
        assert!(err.is_archive_fault());
        assert!(!dir.path().join("evil.txt").exists());
    }

    #[test]
    fn test_corrupt_entry_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("corrupt.zip");
        let payload: &[u8] = b"attribute table payload";

        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Stored)
                .last_modified_time(dos_time());
            writer.start_file("a.dbf", options).unwrap();
            writer.write_all(payload).unwrap();
            writer.finish().unwrap();
        }
        let mut bytes = buf.into_inner();

        // Stockée sans compression : les données figurent telles quelles
        let at = bytes
            .windows(payload.len())
            .position(|w| w == payload)
            .unwrap();
        bytes[at] ^= 0xFF;
        fs::write(&archive, bytes).unwrap();

        let out = dir.path().join("out");
        let err = extract(&archive, &out).unwrap_err();
        assert!(matches!(err, ShapesetError::InvalidArchive { .. }), "unexpected error: {err}");
        assert!(!out.join("a.dbf").exists());
    }
}
