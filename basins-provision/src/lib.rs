//! # basins-provision
//!
//! Provisionnement du shapefile des bassins versants du Groenland :
//! téléchargement, extraction, rangement et reprojection en EPSG:3413.
//!
//! ## Features
//!
//! - Téléchargement conditionnel (rien n'est émis si l'archive est présente)
//! - Extraction « update-if-newer » et déplacement groupé dans `basins/`
//! - Reprojection via `ogr2ogr` avec vérification du système de la sortie
//! - Rapport d'exécution JSON
//!
//! ## Usage CLI
//!
//! ```bash
//! # Tout le provisionnement, sans argument
//! basins-provision
//!
//! # Une étape isolée
//! basins-provision fetch
//! basins-provision extract
//! basins-provision reproject --epsg 3413
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod fetch;
pub mod provisioner;
pub mod report;

pub use config::{Config, Overrides, Settings};
pub use error::{ConversionError, NetworkError, ProvisionError};
pub use provisioner::Provisioner;
pub use report::{ProvisionReport, ProvisionStatus, Step, StepStatus};
