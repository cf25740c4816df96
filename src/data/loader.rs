//! CSV Data Loader Module
//! Handles CSV file loading, the chronic dataset download and CSV snapshots using Polars.

use log::{debug, info};
use polars::prelude::*;
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Rows scanned for schema inference. The survey files mix numeric and
/// free-text values in the same columns far into the file.
const INFER_SCHEMA_ROWS: usize = 10_000;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },
    #[error("Failed to parse downloaded CSV from {url}: {source}")]
    ParseDownload {
        url: String,
        #[source]
        source: PolarsError,
    },
    #[error("Failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Download of {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write CSV {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },
}

/// Handles CSV loading for the three sources with Polars.
pub struct DataLoader;

impl DataLoader {
    /// Load a local CSV file.
    pub fn load_csv(path: &Path) -> Result<DataFrame, LoaderError> {
        info!("Loading {} into DataFrame", path.display());
        let csv_err = |source| LoaderError::Csv {
            path: path.to_path_buf(),
            source,
        };

        // Use lazy evaluation for memory efficiency, then collect
        let df = LazyCsvReader::new(path)
            .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
            .with_ignore_errors(true)
            .finish()
            .map_err(csv_err)?
            .collect()
            .map_err(csv_err)?;

        info!(
            "Loaded {} rows x {} columns from {}",
            df.height(),
            df.width(),
            path.display()
        );
        Ok(df)
    }

    /// Download a CSV over HTTP and parse it in memory.
    pub fn fetch_csv(url: &str) -> Result<DataFrame, LoaderError> {
        info!("Downloading {url}");
        let response = reqwest::blocking::get(url).map_err(|source| LoaderError::Download {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoaderError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().map_err(|source| LoaderError::Download {
            url: url.to_string(),
            source,
        })?;
        debug!("Downloaded {} bytes from {url}", body.len());

        Self::parse_csv_bytes(body.to_vec()).map_err(|source| LoaderError::ParseDownload {
            url: url.to_string(),
            source,
        })
    }

    /// Parse CSV content already held in memory.
    pub fn parse_csv_bytes(bytes: Vec<u8>) -> PolarsResult<DataFrame> {
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
            .with_ignore_errors(true)
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
    }

    /// Write a DataFrame as CSV with a header row. Nulls become empty fields.
    pub fn write_csv(df: &DataFrame, path: &Path) -> Result<(), LoaderError> {
        let mut file = File::create(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut df = df.clone();
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)
            .map_err(|source| LoaderError::Write {
                path: path.to_path_buf(),
                source,
            })?;

        info!("Wrote {} rows to {}", df.height(), path.display());
        Ok(())
    }
}
