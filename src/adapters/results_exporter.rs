use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use chrono::{DateTime, Local};
use rust_xlsxwriter::Workbook;
use serde::Serialize;
use serde_json::Value;

use crate::errors::ExportError;
use crate::filter::{CriteriaSummary, FilterCriteria, Item};
use crate::logger::Logger;

const FILE_STEM: &str = "auction_results";
const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone, PartialEq)]
pub struct ExportResult {
    pub filename: PathBuf,
    pub record_count: usize,
    pub file_size: u64,
}

#[derive(Serialize)]
struct ResultsDocument<'a> {
    timestamp: String,
    filter_criteria: CriteriaSummary,
    total_items: usize,
    items: &'a [Item],
}

/// Writes filtered result sets into the results directory.
pub struct ResultsExporter {
    logger: Logger,
    results_dir: PathBuf,
}

impl ResultsExporter {
    pub fn new(logger: Logger, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            logger,
            results_dir: results_dir.into(),
        }
    }

    fn target(&self, run_time: DateTime<Local>, extension: &str) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.results_dir)?;
        Ok(self.results_dir.join(format!(
            "{}_{}.{}",
            FILE_STEM,
            run_time.format(FILE_TIMESTAMP_FORMAT),
            extension
        )))
    }

    pub fn export_json(
        &self,
        items: &[Item],
        criteria: &FilterCriteria,
        run_time: DateTime<Local>,
    ) -> Result<ExportResult, ExportError> {
        if items.is_empty() {
            return Err(ExportError::Empty);
        }
        let path = self.target(run_time, "json")?;
        self.logger
            .info(&format!("Creating JSON file: {}", path.display()));

        let document = ResultsDocument {
            timestamp: run_time.to_rfc3339(),
            filter_criteria: criteria.summary(),
            total_items: items.len(),
            items,
        };
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, &document)?;
        writer.flush()?;

        self.finish(path, items.len())
    }

    /// One row per item. Columns are every key seen, in order of first appearance.
    pub fn export_xlsx(
        &self,
        items: &[Item],
        run_time: DateTime<Local>,
    ) -> Result<ExportResult, ExportError> {
        if items.is_empty() {
            return Err(ExportError::Empty);
        }
        let path = self.target(run_time, "xlsx")?;
        self.logger
            .info(&format!("Creating Excel file: {}", path.display()));

        let headers = column_headers(items);
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        for (col, header) in headers.iter().enumerate() {
            worksheet.write_string(0, col as u16, *header)?;
        }

        for (row_idx, item) in items.iter().enumerate() {
            let row = (row_idx + 1) as u32;
            for (col, header) in headers.iter().enumerate() {
                let col = col as u16;
                match item.get(*header) {
                    None | Some(Value::Null) => {}
                    Some(Value::String(s)) => {
                        worksheet.write_string(row, col, s)?;
                    }
                    Some(Value::Bool(b)) => {
                        worksheet.write_boolean(row, col, *b)?;
                    }
                    Some(Value::Number(n)) => match n.as_f64() {
                        Some(f) => {
                            worksheet.write_number(row, col, f)?;
                        }
                        None => {
                            worksheet.write_string(row, col, n.to_string())?;
                        }
                    },
                    Some(nested) => {
                        worksheet.write_string(row, col, nested.to_string())?;
                    }
                }
            }
        }

        workbook.save(&path)?;
        self.finish(path, items.len())
    }

    fn finish(&self, path: PathBuf, record_count: usize) -> Result<ExportResult, ExportError> {
        let file_size = fs::metadata(&path)?.len();
        self.logger
            .info(&format!("Results saved to: {}", path.display()));
        Ok(ExportResult {
            filename: path,
            record_count,
            file_size,
        })
    }
}

fn column_headers(items: &[Item]) -> Vec<&str> {
    let mut headers: Vec<&str> = Vec::new();
    for key in items.iter().flat_map(|item| item.keys()) {
        if !headers.contains(&key.as_str()) {
            headers.push(key);
        }
    }
    headers
}
