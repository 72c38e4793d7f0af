//! Normalize stage configuration shared by the engine and the CLI.

use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Row file formats the downstream loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderFileFormat {
    Jsonl,
    Parquet,
}

impl LoaderFileFormat {
    pub fn file_extension(&self) -> &'static str {
        match self {
            LoaderFileFormat::Jsonl => "jsonl",
            LoaderFileFormat::Parquet => "parquet",
        }
    }

    pub fn all() -> Vec<LoaderFileFormat> {
        vec![LoaderFileFormat::Jsonl, LoaderFileFormat::Parquet]
    }
}

impl std::fmt::Display for LoaderFileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_extension())
    }
}

#[derive(Debug, Error)]
#[error("unknown loader file format: {0}")]
pub struct UnknownFileFormat(String);

impl FromStr for LoaderFileFormat {
    type Err = UnknownFileFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jsonl" => Ok(LoaderFileFormat::Jsonl),
            "parquet" => Ok(LoaderFileFormat::Parquet),
            other => Err(UnknownFileFormat(other.to_string())),
        }
    }
}

/// Facts about the downstream loader that influence output selection.
#[derive(Debug, Clone)]
pub struct DestinationCapabilities {
    pub preferred_loader_file_format: LoaderFileFormat,
    pub supported_loader_file_formats: Vec<LoaderFileFormat>,
}

impl Default for DestinationCapabilities {
    fn default() -> Self {
        Self {
            preferred_loader_file_format: LoaderFileFormat::Jsonl,
            supported_loader_file_formats: LoaderFileFormat::all(),
        }
    }
}

/// Canonical configuration for one normalize runner.
#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    /// Input volume holding extracted-items files.
    pub normalize_volume: PathBuf,
    /// Output volume holding load packages (`new/` and `loaded/`).
    pub load_volume: PathBuf,
    /// Volume holding persisted schemas.
    pub schema_volume: PathBuf,
    pub destination_capabilities: DestinationCapabilities,
    pub worker_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parse_and_extension() {
        assert_eq!("jsonl".parse::<LoaderFileFormat>().unwrap(), LoaderFileFormat::Jsonl);
        assert_eq!("parquet".parse::<LoaderFileFormat>().unwrap(), LoaderFileFormat::Parquet);
        assert!("csv".parse::<LoaderFileFormat>().is_err());
        assert_eq!(LoaderFileFormat::Parquet.file_extension(), "parquet");
    }
}
