//! Numeric CSV tables.

use std::fs;
use std::path::Path;

use camp_core::{CampError, ErrorInfo};
use csv::{ReaderBuilder, WriterBuilder};

use crate::codes;

fn wrap_csv(code: &str, path: &Path, err: csv::Error) -> CampError {
    CampError::Collate(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// A header row plus rows of numbers; `NaN` marks an empty cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of column `name`, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }

    /// Reads a table whose cells are all numeric. Empty cells read as `NaN`.
    pub fn read_csv(path: &Path) -> Result<Self, CampError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|err| wrap_csv(codes::MALFORMED, path, err))?;
        let columns: Vec<String> = reader
            .headers()
            .map_err(|err| wrap_csv(codes::MALFORMED, path, err))?
            .iter()
            .map(str::to_string)
            .collect();
        if columns.is_empty() || columns.iter().all(String::is_empty) {
            return Err(CampError::Collate(
                ErrorInfo::new(codes::MALFORMED, "table has no header")
                    .with_context("path", path.display().to_string()),
            ));
        }
        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|err| wrap_csv(codes::MALFORMED, path, err))?;
            let row = record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        Ok(f64::NAN)
                    } else {
                        cell.parse::<f64>().map_err(|_| {
                            CampError::Collate(
                                ErrorInfo::new(codes::MALFORMED, "non-numeric cell")
                                    .with_context("path", path.display().to_string())
                                    .with_context("row", line.to_string())
                                    .with_context("cell", cell),
                            )
                        })
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }

    /// Writes the table, creating parent directories.
    pub fn write_csv(&self, path: &Path) -> Result<(), CampError> {
        write_rows(
            path,
            &self.columns,
            self.rows.iter().map(|row| row.iter().map(|v| format_cell(*v)).collect()),
        )
    }
}

/// Reads a header and string rows without interpreting cells.
pub fn read_rows(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), CampError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|err| wrap_csv(codes::MALFORMED, path, err))?;
    let header = reader
        .headers()
        .map_err(|err| wrap_csv(codes::MALFORMED, path, err))?
        .iter()
        .map(str::to_string)
        .collect();
    let rows = reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(|err| wrap_csv(codes::MALFORMED, path, err))
        })
        .collect::<Result<Vec<Vec<String>>, _>>()?;
    Ok((header, rows))
}

/// Formats a number for output; `NaN` becomes an empty cell.
pub fn format_cell(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

/// Writes string rows under `header`.
pub fn write_rows<I>(path: &Path, header: &[String], rows: I) -> Result<(), CampError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| CampError::io("io.create_dir", parent, err))?;
    }
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|err| wrap_csv(codes::WRITE, path, err))?;
    writer
        .write_record(header)
        .map_err(|err| wrap_csv(codes::WRITE, path, err))?;
    for row in rows {
        writer
            .write_record(&row)
            .map_err(|err| wrap_csv(codes::WRITE, path, err))?;
    }
    writer
        .flush()
        .map_err(|err| CampError::io("io.write", path, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cells_round_trip_as_nan() {
        let temp = tempfile::tempdir().expect("tmp dir");
        let path = temp.path().join("t.csv");
        fs::write(&path, "a, b\n1,\n2.5,4\n").expect("write");
        let table = Table::read_csv(&path).expect("read");
        assert_eq!(table.columns, vec!["a", "b"]);
        assert!(table.rows[0][1].is_nan());
        assert_eq!(table.column("a"), Some(vec![1.0, 2.5]));

        let out = temp.path().join("nested/o.csv");
        table.write_csv(&out).expect("write");
        assert_eq!(fs::read_to_string(&out).expect("read"), "a,b\n1,\n2.5,4\n");
    }

    #[test]
    fn text_cells_are_malformed() {
        let temp = tempfile::tempdir().expect("tmp dir");
        let path = temp.path().join("t.csv");
        fs::write(&path, "a\nfoo\n").expect("write");
        assert_eq!(Table::read_csv(&path).expect_err("bad").code(), codes::MALFORMED);
    }
}
