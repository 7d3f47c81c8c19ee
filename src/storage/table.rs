use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cli::config::{OutputFormat, OutputSettings};
use crate::crawler::record::Record;
use crate::extract::schema;

/// Writes the final result table
pub trait TableWriter {
    /// Write every record and return the path of the artifact
    fn write_table(&self, records: &[Record]) -> Result<PathBuf>;
}

/// Writes `<prefix>_<YYYY-MM-DD_HH-MM>.<ext>` into the configured directory
pub struct FileTableWriter {
    settings: OutputSettings,
    stamp: DateTime<Local>,
}

impl FileTableWriter {
    pub fn new(settings: OutputSettings) -> Self {
        Self {
            settings,
            stamp: Local::now(),
        }
    }

    /// Fix the run timestamp used in the file name
    pub fn with_stamp(mut self, stamp: DateTime<Local>) -> Self {
        self.stamp = stamp;
        self
    }

    pub fn output_path(&self) -> PathBuf {
        let name = format!(
            "{}_{}.{}",
            self.settings.file_prefix,
            self.stamp.format("%Y-%m-%d_%H-%M"),
            self.settings.format.extension()
        );
        self.settings.directory.join(name)
    }

    fn write_csv(path: &Path, records: &[Record]) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .context(format!("Failed to create {}", path.display()))?;

        writer.write_record(schema::columns())?;
        for record in records {
            writer.write_record(record.row())?;
        }
        writer.flush()?;

        Ok(())
    }

    fn write_json(path: &Path, records: &[Record]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        fs::write(path, json).context(format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

impl TableWriter for FileTableWriter {
    fn write_table(&self, records: &[Record]) -> Result<PathBuf> {
        let path = self.output_path();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .context(format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        match self.settings.format {
            OutputFormat::Csv => Self::write_csv(&path, records)?,
            OutputFormat::Json => Self::write_json(&path, records)?,
        }

        info!("Wrote {} rows to {}", records.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::record::build_record;
    use crate::extract::fixtures::PRODUCT_PAGE;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn settings(dir: &Path, format: OutputFormat) -> OutputSettings {
        OutputSettings {
            directory: dir.join("out"),
            file_prefix: "wildberries_data".to_string(),
            format,
        }
    }

    fn records() -> Vec<Record> {
        vec![
            build_record("1", "https://example.test/1", Some(PRODUCT_PAGE)),
            build_record("2", "https://example.test/2", None),
        ]
    }

    #[test]
    fn test_file_name_carries_run_stamp() {
        let stamp = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        let writer = FileTableWriter::new(settings(Path::new("/tmp"), OutputFormat::Csv)).with_stamp(stamp);

        assert_eq!(
            writer.output_path(),
            PathBuf::from("/tmp/out/wildberries_data_2024-03-09_14-05.csv")
        );
    }

    #[test]
    fn test_csv_columns_follow_schema() {
        let dir = TempDir::new().unwrap();
        let writer = FileTableWriter::new(settings(dir.path(), OutputFormat::Csv));

        let path = writer.write_table(&records()).unwrap();
        assert!(path.exists());

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
        assert_eq!(headers, schema::columns());

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "1");
        assert_eq!(&rows[0][2], "Куртка демисезонная стеганая");
        assert_eq!(&rows[1][2], "no data");
    }

    #[test]
    fn test_json_output() {
        let dir = TempDir::new().unwrap();
        let writer = FileTableWriter::new(settings(dir.path(), OutputFormat::Json));

        let path = writer.write_table(&records()).unwrap();
        assert_eq!(path.extension().unwrap(), "json");

        let parsed: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let rows = parsed.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["article"], "2");
        assert_eq!(rows[1]["promotions"], "no promotions");
    }

    #[test]
    fn test_empty_run_still_writes_header() {
        let dir = TempDir::new().unwrap();
        let writer = FileTableWriter::new(settings(dir.path(), OutputFormat::Csv));

        let path = writer.write_table(&[]).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.starts_with("article,url,name"));
    }
}
