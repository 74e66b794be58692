//! Empreinte BLAKE3 des archives téléchargées

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Result, ShapesetError};

/// Calcule le checksum blake3 d'un fichier (hex minuscule)
pub fn file_blake3(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| ShapesetError::filesystem(path, e))?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 65536]; // 64KB buffer

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| ShapesetError::filesystem(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Calcule l'empreinte et la compare à `expected` si fourni
///
/// Retourne l'empreinte calculée.
pub fn verify(path: &Path, expected: Option<&str>) -> Result<String> {
    let actual = file_blake3(path)?;

    if let Some(expected) = expected {
        if !expected.trim().eq_ignore_ascii_case(&actual) {
            return Err(ShapesetError::ChecksumMismatch {
                path: path.to_path_buf(),
                expected: expected.trim().to_lowercase(),
                actual,
            });
        }
    }

    Ok(actual)
}
