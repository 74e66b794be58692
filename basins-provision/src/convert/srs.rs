//! Vérification du système de référence d'un shapefile produit
//!
//! Avec le feature `reproject`, la comparaison se fait en mémoire avec PROJ à
//! partir du `.prj`. Sans, on interroge `gdalsrsinfo -o epsg`.

use std::path::Path;

use regex::Regex;

use crate::convert::ToolSettings;
use crate::error::ConversionError;

/// Vérifie si la vérification en mémoire (PROJ) est disponible
pub fn in_process_available() -> bool {
    cfg!(feature = "reproject")
}

/// Extrait le code de la sortie de `gdalsrsinfo -o epsg` (ex: "EPSG:3413")
///
/// GDAL renvoie `EPSG:-1` quand le système n'est pas identifiable.
pub fn parse_epsg(text: &str) -> Option<i64> {
    let re = Regex::new(r"EPSG:(-?\d+)").ok()?;
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

#[cfg(not(feature = "reproject"))]
use tracing::warn;

/// Vérifie que `shapefile` est dans EPSG:`target`
///
/// Retourne le code constaté, ou `None` si `gdalsrsinfo` est indisponible ou
/// ne sait pas identifier le système (un avertissement est émis).
#[cfg(not(feature = "reproject"))]
pub fn verify_output(
    tools: &ToolSettings,
    shapefile: &Path,
    target: u32,
) -> Result<Option<u32>, ConversionError> {
    let output = match std::process::Command::new(&tools.gdalsrsinfo)
        .arg("-o")
        .arg("epsg")
        .arg(shapefile)
        .output()
    {
        Ok(o) => o,
        Err(e) => {
            warn!(tool = %tools.gdalsrsinfo, error = %e, "Cannot verify output spatial reference");
            return Ok(None);
        }
    };

    if !output.status.success() {
        warn!(
            tool = %tools.gdalsrsinfo,
            status = %output.status,
            "Spatial reference inspection failed"
        );
        return Ok(None);
    }

    match parse_epsg(&String::from_utf8_lossy(&output.stdout)) {
        Some(code) if code == target as i64 => Ok(Some(target)),
        Some(code) if code > 0 => Err(ConversionError::SrsMismatch {
            path: shapefile.to_path_buf(),
            expected: target,
            found: format!("EPSG:{}", code),
        }),
        _ => {
            warn!(path = %shapefile.display(), "Output spatial reference could not be identified");
            Ok(None)
        }
    }
}

#[cfg(feature = "reproject")]
use proj::Proj;

/// Points de contrôle : un couple lon/lat et un couple métrique polaire
#[cfg(feature = "reproject")]
const PROBES: [(f64, f64); 2] = [(-45.0, 70.0), (100_000.0, -2_000_000.0)];

#[cfg(feature = "reproject")]
const TOLERANCE: f64 = 1e-3;

/// Vérifie que `shapefile` est dans EPSG:`target` en comparant son `.prj`
/// avec la définition EPSG via PROJ
#[cfg(feature = "reproject")]
pub fn verify_output(
    _tools: &ToolSettings,
    shapefile: &Path,
    target: u32,
) -> Result<Option<u32>, ConversionError> {
    let prj = shapefile.with_extension("prj");
    let wkt = std::fs::read_to_string(&prj).map_err(|_| ConversionError::MissingOutput(prj))?;

    let mismatch = |found: String| ConversionError::SrsMismatch {
        path: shapefile.to_path_buf(),
        expected: target,
        found,
    };

    match crs_equivalent(wkt.trim(), target) {
        Ok(true) => Ok(Some(target)),
        Ok(false) => Err(mismatch("a different CRS".into())),
        Err(e) => Err(mismatch(format!("unreadable CRS ({})", e))),
    }
}

/// Vrai si `definition` (WKT, PROJ string ou "EPSG:x") équivaut à EPSG:`epsg`
///
/// Deux systèmes sont équivalents si la transformation de l'un vers l'autre
/// laisse les points de contrôle inchangés.
#[cfg(feature = "reproject")]
pub fn crs_equivalent(definition: &str, epsg: u32) -> Result<bool, proj::ProjCreateError> {
    let target = format!("EPSG:{}", epsg);
    let proj = Proj::new_known_crs(definition, &target, None)?;

    let mut checked = 0;
    for (x, y) in PROBES {
        let converted: Result<(f64, f64), _> = proj.convert((x, y));
        if let Ok((tx, ty)) = converted {
            if !tx.is_finite() || !ty.is_finite() {
                continue;
            }
            checked += 1;
            if (tx - x).abs() > TOLERANCE || (ty - y).abs() > TOLERANCE {
                return Ok(false);
            }
        }
    }

    Ok(checked > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_epsg() {
        assert_eq!(parse_epsg("EPSG:3413\n"), Some(3413));
        assert_eq!(parse_epsg("\nEPSG:-1\n"), Some(-1));
        assert_eq!(parse_epsg("Confidence 70%\nEPSG:4326"), Some(4326));
        assert_eq!(parse_epsg("ERROR 1: ERROR - failed to load SRS"), None);
    }

    #[test]
    fn test_availability_matches_feature() {
        assert_eq!(in_process_available(), cfg!(feature = "reproject"));
    }

    #[cfg(not(feature = "reproject"))]
    #[test]
    fn test_missing_inspector_is_not_fatal() {
        let tools = ToolSettings {
            gdalsrsinfo: "/nonexistent/gdalsrsinfo".into(),
            ..Default::default()
        };
        let result = verify_output(&tools, Path::new("out.shp"), 3413).unwrap();
        assert_eq!(result, None);
    }

    #[cfg(feature = "reproject")]
    #[test]
    fn test_crs_equivalent() {
        assert!(crs_equivalent("EPSG:3413", 3413).unwrap());
        assert!(!crs_equivalent("EPSG:4326", 3413).unwrap());
        assert!(crs_equivalent("EPSG:4326", 4326).unwrap());
    }

    #[cfg(feature = "reproject")]
    #[test]
    fn test_garbage_definition() {
        assert!(crs_equivalent("not a crs", 3413).is_err());
    }
}
