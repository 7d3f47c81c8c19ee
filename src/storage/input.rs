use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

use crate::cli::config::InputSettings;

/// Problems with the identifier list. Any of these aborts the run.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("input file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("column '{}' not found in {}", .column, .path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("failed to read {}: {}", .path.display(), .reason)]
    Read { path: PathBuf, reason: String },

    #[error("no identifiers in {}", .0.display())]
    Empty(PathBuf),
}

/// Source of the identifiers to harvest
pub trait IdentifierSource {
    /// Identifiers in input order, blanks skipped and duplicates removed
    fn load_identifiers(&self) -> Result<Vec<String>, InputError>;
}

/// Reads identifiers from a CSV file column, or from a `.txt` file holding one
/// identifier per line
pub struct FileIdentifierSource {
    path: PathBuf,
    column: String,
}

impl FileIdentifierSource {
    pub fn new(path: impl Into<PathBuf>, settings: &InputSettings) -> Self {
        Self {
            path: path.into(),
            column: settings.identifier_column.clone(),
        }
    }

    fn is_plain_list(&self) -> bool {
        self.path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("txt"))
            .unwrap_or(false)
    }

    fn read_error(&self, reason: impl ToString) -> InputError {
        InputError::Read {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    fn read_lines(&self) -> Result<Vec<String>, InputError> {
        let contents = fs::read_to_string(&self.path).map_err(|e| self.read_error(e))?;
        Ok(contents.lines().map(str::to_string).collect())
    }

    fn read_column(&self) -> Result<Vec<String>, InputError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| self.read_error(e))?;

        let headers = reader.headers().map_err(|e| self.read_error(e))?.clone();
        let wanted = self.column.to_lowercase();
        let index = headers
            .iter()
            .position(|h| h.trim().trim_start_matches('\u{feff}').to_lowercase() == wanted)
            .ok_or_else(|| InputError::MissingColumn {
                path: self.path.clone(),
                column: self.column.clone(),
            })?;

        let mut values = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|e| self.read_error(e))?;
            values.push(row.get(index).unwrap_or_default().to_string());
        }

        Ok(values)
    }
}

impl IdentifierSource for FileIdentifierSource {
    fn load_identifiers(&self) -> Result<Vec<String>, InputError> {
        if !self.path.is_file() {
            return Err(InputError::NotFound(self.path.clone()));
        }

        let raw = if self.is_plain_list() {
            self.read_lines()?
        } else {
            self.read_column()?
        };

        let identifiers = clean_identifiers(raw);
        if identifiers.is_empty() {
            return Err(InputError::Empty(self.path.clone()));
        }

        info!("Loaded {} identifiers from {}", identifiers.len(), self.path.display());
        Ok(identifiers)
    }
}

/// Trim, skip blanks and keep the first occurrence of each identifier
fn clean_identifiers(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut identifiers = Vec::with_capacity(raw.len());

    for value in raw {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if !seen.insert(value.to_string()) {
            debug!("Skipping duplicate identifier {}", value);
            continue;
        }
        identifiers.push(value.to_string());
    }

    identifiers
}
