//! # shapeset
//!
//! Manipulation d'un jeu de shapefiles distribué sous forme d'archive zip.
//!
//! ## Features
//!
//! - Modèle `Dataset` : un nom de base et un ensemble fixe d'extensions
//! - Extraction zip « update-if-newer » (relance sans écriture)
//! - Déplacement groupé des fichiers, sans rollback
//! - Empreinte BLAKE3 de l'archive
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shapeset::{archive, fs};
//! use std::path::Path;
//!
//! let summary = archive::extract(Path::new("data.zip"), Path::new("."))?;
//! println!("{} extraits, {} à jour", summary.extracted.len(), summary.skipped.len());
//!
//! fs::ensure_directory(Path::new("basins"))?;
//! fs::relocate_files(&dataset.files_in(Path::new(".")), Path::new("basins"))?;
//! ```

pub mod archive;
pub mod checksum;
pub mod error;
pub mod fs;
pub mod types;

pub use error::ShapesetError;
pub use types::{Dataset, ExtractSummary, RelocateSummary, SHAPEFILE_EXTENSIONS};
