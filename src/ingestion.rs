//! Загрузка исходного архива с данными

use std::fs;
use std::path::Path;

use crate::config::ArtifactLayout;
use crate::error::{PipelineError, Result};
use crate::table::Table;

/// Итог загрузки: откуда взят CSV и его размер
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSummary {
    pub source: String,
    pub rows: usize,
    pub columns: usize,
}

pub trait DataIngestor {
    fn ingest(&self, archive: &Path, layout: &ArtifactLayout) -> Result<IngestSummary>;
}

/// Выбор загрузчика по расширению файла
pub fn ingestor_for(path: &Path) -> Result<Box<dyn DataIngestor>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("zip") => Ok(Box::new(ZipIngestor)),
        _ => Err(PipelineError::UnsupportedFormat(path.to_path_buf())),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZipIngestor;

impl ZipIngestor {
    /// CSV-файлы архива, включая вложенные каталоги; служебные записи macOS пропускаются
    fn csv_entries(archive: &zip::ZipArchive<fs::File>) -> Vec<String> {
        let mut entries: Vec<String> = archive
            .file_names()
            .filter(|name| !name.ends_with('/') && !name.starts_with("__MACOSX/"))
            .filter(|name| name.to_ascii_lowercase().ends_with(".csv"))
            .map(str::to_string)
            .collect();
        entries.sort();
        entries
    }
}

impl DataIngestor for ZipIngestor {
    fn ingest(&self, archive_path: &Path, layout: &ArtifactLayout) -> Result<IngestSummary> {
        let file = fs::File::open(archive_path)?;
        let mut archive = zip::ZipArchive::new(file)?;

        let extracted = layout.extracted_dir();
        if extracted.exists() {
            fs::remove_dir_all(&extracted)?;
        }
        fs::create_dir_all(&extracted)?;
        archive.extract(&extracted)?;

        let mut candidates = Self::csv_entries(&archive);
        let source = match candidates.len() {
            0 => return Err(PipelineError::NoDataFileFound(archive_path.to_path_buf())),
            1 => candidates.remove(0),
            _ => {
                return Err(PipelineError::AmbiguousDataFile {
                    archive: archive_path.to_path_buf(),
                    candidates,
                })
            }
        };

        let table = Table::read_csv(extracted.join(&source))?;
        table.write_csv(layout.raw_csv())?;

        tracing::info!(
            "Ingested {} from {}: {} rows x {} columns",
            source,
            archive_path.display(),
            table.height(),
            table.width()
        );

        Ok(IngestSummary {
            source,
            rows: table.height(),
            columns: table.width(),
        })
    }
}
