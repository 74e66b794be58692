//! Reprojection des shapefiles via `ogr2ogr`
//!
//! La transformation géométrique est déléguée à GDAL. Ce module prépare
//! l'appel, contrôle le système de référence source et vérifie la sortie.

pub mod srs;

use std::path::{Path, PathBuf};
use std::process::Command;

use regex::Regex;
use tracing::{debug, info};

use crate::error::ConversionError;

/// Exécutables GDAL utilisés
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub ogr2ogr: String,
    pub gdalsrsinfo: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ogr2ogr: "ogr2ogr".into(),
            gdalsrsinfo: "gdalsrsinfo".into(),
        }
    }
}

/// Résultat d'une reprojection
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    /// Chemin du `.shp` produit
    pub output: PathBuf,
    /// Fichiers produits (même nom de base que `output`)
    pub produced: Vec<PathBuf>,
    /// Code EPSG constaté sur la sortie, si l'identification a abouti
    pub detected_epsg: Option<u32>,
}

/// Extensions obligatoires d'un shapefile produit
const REQUIRED_OUTPUTS: [&str; 2] = ["shp", "shx"];

/// Reprojette `input` vers `output` dans le système EPSG:`target_epsg`
///
/// Équivaut à `ogr2ogr -overwrite -t_srs EPSG:<code> <output> <input>`.
/// L'entrée n'est jamais modifiée ; une sortie existante est remplacée.
///
/// # Errors
///
/// - `MissingSourceReference` si l'entrée n'a pas de `.prj` exploitable
/// - `ToolUnavailable` si `ogr2ogr` ne peut pas être lancé
/// - `ToolFailed` si `ogr2ogr` termine en erreur (stderr inclus)
/// - `MissingOutput` / `SrsMismatch` si la sortie n'est pas conforme
pub fn reproject(
    tools: &ToolSettings,
    input: &Path,
    output: &Path,
    target_epsg: u32,
) -> Result<ConversionOutcome, ConversionError> {
    if target_epsg == 0 {
        return Err(ConversionError::InvalidTarget(target_epsg));
    }

    check_source_reference(input)?;

    let target = format!("EPSG:{}", target_epsg);
    info!(
        input = %input.display(),
        output = %output.display(),
        target = %target,
        "Reprojecting"
    );

    let result = Command::new(&tools.ogr2ogr)
        .arg("-overwrite")
        .arg("-t_srs")
        .arg(&target)
        .arg(output)
        .arg(input)
        .output()
        .map_err(|source| ConversionError::ToolUnavailable {
            tool: tools.ogr2ogr.clone(),
            source,
        })?;

    if !result.status.success() {
        return Err(ConversionError::ToolFailed {
            tool: tools.ogr2ogr.clone(),
            status: result.status.to_string(),
            stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
        });
    }

    let stderr = String::from_utf8_lossy(&result.stderr);
    if !stderr.trim().is_empty() {
        // ogr2ogr signale les avertissements sur stderr même en cas de succès
        debug!(tool = %tools.ogr2ogr, stderr = %stderr.trim(), "Tool warnings");
    }

    for ext in REQUIRED_OUTPUTS {
        let path = output.with_extension(ext);
        if !path.is_file() {
            return Err(ConversionError::MissingOutput(path));
        }
    }

    let detected_epsg = srs::verify_output(tools, output, target_epsg)?;
    let produced = sibling_files(output);

    info!(
        output = %output.display(),
        files = produced.len(),
        epsg = ?detected_epsg,
        "Reprojection complete"
    );

    Ok(ConversionOutcome {
        output: output.to_path_buf(),
        produced,
        detected_epsg,
    })
}

/// L'entrée doit porter un système de référence (`.prj` non vide)
fn check_source_reference(input: &Path) -> Result<(), ConversionError> {
    let prj = input.with_extension("prj");
    match std::fs::read_to_string(&prj) {
        Ok(wkt) if !wkt.trim().is_empty() => Ok(()),
        _ => Err(ConversionError::MissingSourceReference(input.to_path_buf())),
    }
}

/// Fichiers du répertoire de `shapefile` partageant son nom de base, triés
fn sibling_files(shapefile: &Path) -> Vec<PathBuf> {
    let Some(stem) = shapefile.file_stem() else {
        return Vec::new();
    };
    let dir = match shapefile.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && p.file_stem() == Some(stem))
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}

/// Version de GDAL rapportée par `<program> --version` (ex: "3.8.4")
pub fn tool_version(program: &str) -> Option<String> {
    let output = Command::new(program).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    parse_gdal_version(&String::from_utf8_lossy(&output.stdout))
}

fn parse_gdal_version(text: &str) -> Option<String> {
    let re = Regex::new(r"GDAL\s+(\d+\.\d+(?:\.\d+)?(?:[A-Za-z0-9\-]*)?)").ok()?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gdal_version() {
        assert_eq!(
            parse_gdal_version("GDAL 3.8.4, released 2024/02/08\n"),
            Some("3.8.4".to_string())
        );
        assert_eq!(
            parse_gdal_version("GDAL 3.10.0dev-abc, released 2024/10/01"),
            Some("3.10.0dev-abc".to_string())
        );
        assert_eq!(parse_gdal_version("ogr2ogr: command not found"), None);
    }

    #[test]
    fn test_missing_prj_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("Greenland_Basins_PS_v1.4.2.shp");
        std::fs::write(&input, b"shape").unwrap();

        let err = reproject(
            &ToolSettings::default(),
            &input,
            &dir.path().join("out.shp"),
            3413,
        )
        .unwrap_err();
        assert!(matches!(err, ConversionError::MissingSourceReference(_)));

        std::fs::write(dir.path().join("Greenland_Basins_PS_v1.4.2.prj"), b"  \n").unwrap();
        let err = check_source_reference(&input).unwrap_err();
        assert!(matches!(err, ConversionError::MissingSourceReference(_)));
    }

    #[test]
    fn test_unavailable_tool() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.shp");
        std::fs::write(&input, b"shape").unwrap();
        std::fs::write(dir.path().join("a.prj"), b"PROJCS[\"x\"]").unwrap();

        let tools = ToolSettings {
            ogr2ogr: dir.path().join("no-such-ogr2ogr").display().to_string(),
            ..Default::default()
        };
        let err = reproject(&tools, &input, &dir.path().join("b.shp"), 3413).unwrap_err();
        assert!(matches!(err, ConversionError::ToolUnavailable { .. }));
    }

    #[test]
    fn test_invalid_target() {
        let err = reproject(
            &ToolSettings::default(),
            Path::new("a.shp"),
            Path::new("b.shp"),
            0,
        )
        .unwrap_err();
        assert!(matches!(err, ConversionError::InvalidTarget(0)));
    }

    #[test]
    fn test_sibling_files_handles_dotted_base_names() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "Greenland_Basins_PS_v1.4.2_epsg3413.shp",
            "Greenland_Basins_PS_v1.4.2_epsg3413.shx",
            "Greenland_Basins_PS_v1.4.2.shp",
        ] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let files = sibling_files(&dir.path().join("Greenland_Basins_PS_v1.4.2_epsg3413.shp"));
        assert_eq!(files.len(), 2);
    }

    #[cfg(unix)]
    mod with_fake_gdal {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, name: &str, body: &str) -> String {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.display().to_string()
        }

        /// ogr2ogr factice : crée les fichiers de sortie ($4) dans le système demandé ($3)
        const FAKE_OGR2OGR: &str = r#"base="${4%.shp}"
for ext in shp shx dbf cpg; do printf 'x' > "$base.$ext"; done
printf '%s' "$3" > "$base.prj""#;

        fn input(dir: &Path) -> PathBuf {
            let input = dir.join("Greenland_Basins_PS_v1.4.2.shp");
            std::fs::write(&input, b"shape").unwrap();
            std::fs::write(dir.join("Greenland_Basins_PS_v1.4.2.prj"), b"PROJCS[\"PS\"]").unwrap();
            input
        }

        #[test]
        fn test_reproject_with_fake_tools() {
            let dir = tempfile::tempdir().unwrap();
            let input = input(dir.path());
            let output = dir.path().join("Greenland_Basins_PS_v1.4.2_epsg3413.shp");
            let tools = ToolSettings {
                ogr2ogr: script(dir.path(), "ogr2ogr", FAKE_OGR2OGR),
                gdalsrsinfo: script(dir.path(), "gdalsrsinfo", "echo EPSG:3413"),
            };

            let outcome = reproject(&tools, &input, &output, 3413).unwrap();

            assert_eq!(outcome.produced.len(), 5);
            assert!(output.with_extension("shx").is_file());
            assert_eq!(outcome.detected_epsg, Some(3413));
            // L'original est intact
            assert_eq!(std::fs::read(&input).unwrap(), b"shape");
        }

        #[test]
        fn test_tool_failure_carries_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let input = input(dir.path());
            let tools = ToolSettings {
                ogr2ogr: script(
                    dir.path(),
                    "ogr2ogr",
                    "echo 'ERROR 1: Failed to process SRS definition' >&2; exit 1",
                ),
                ..Default::default()
            };

            let err = reproject(&tools, &input, &dir.path().join("out.shp"), 3413).unwrap_err();
            match err {
                ConversionError::ToolFailed { stderr, .. } => {
                    assert!(stderr.contains("Failed to process SRS definition"))
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[test]
        fn test_missing_shx_is_detected() {
            let dir = tempfile::tempdir().unwrap();
            let input = input(dir.path());
            let tools = ToolSettings {
                ogr2ogr: script(dir.path(), "ogr2ogr", r#"printf 'x' > "$4""#),
                ..Default::default()
            };

            let err = reproject(&tools, &input, &dir.path().join("out.shp"), 3413).unwrap_err();
            assert!(matches!(err, ConversionError::MissingOutput(ref p) if p.ends_with("out.shx")));
        }

        #[test]
        fn test_srs_mismatch() {
            let dir = tempfile::tempdir().unwrap();
            let input = input(dir.path());
            let tools = ToolSettings {
                ogr2ogr: script(
                    dir.path(),
                    "ogr2ogr",
                    r#"base="${4%.shp}"
for ext in shp shx; do printf 'x' > "$base.$ext"; done
printf 'EPSG:4326' > "$base.prj""#,
                ),
                gdalsrsinfo: script(dir.path(), "gdalsrsinfo", "echo EPSG:4326"),
            };

            let err = reproject(&tools, &input, &dir.path().join("out.shp"), 3413).unwrap_err();
            assert!(matches!(
                err,
                ConversionError::SrsMismatch { expected: 3413, .. }
            ));
        }

        #[test]
        fn test_tool_version() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(
                dir.path(),
                "ogr2ogr",
                "echo 'GDAL 3.8.4, released 2024/02/08'",
            );
            assert_eq!(tool_version(&program), Some("3.8.4".to_string()));
        }
    }
}
