//! CSV writers for reduced, profile and averaged tables.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use super::loaders::DataTable;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// A column does not have one value per index row.
    #[error("column '{column}' has {values_len} values, index has {index_len} rows")]
    LengthMismatch {
        column: String,
        values_len: usize,
        index_len: usize,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
pub(crate) fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Format a value for CSV output; NaN becomes an empty cell.
///
/// Uses the shortest representation that parses back to the same value.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        format!("{}", value)
    }
}

/// Write a data table to CSV.
///
/// The header is the index name followed by the column names in order. The
/// index is written verbatim and numeric cells at full precision. Existing
/// files are overwritten.
///
/// # Errors
///
/// Returns an error if a column length differs from the index length, or if
/// the file cannot be created or written.
///
/// # Example
///
/// ```no_run
/// use fire_reduction::core::loaders::DataTable;
/// use fire_reduction::core::writers::write_table_csv;
/// use std::path::Path;
///
/// let table = DataTable::new("TimeStamp(s)");
/// write_table_csv(Path::new("Test_1_Reduced.csv"), &table).unwrap();
/// ```
pub fn write_table_csv(path: &Path, table: &DataTable) -> Result<()> {
    for column in &table.columns {
        if column.values.len() != table.len() {
            return Err(WriteError::LengthMismatch {
                column: column.name.clone(),
                values_len: column.values.len(),
                index_len: table.len(),
            });
        }
    }

    ensure_parent_dirs(path)?;

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut csv_writer = csv::Writer::from_writer(BufWriter::new(file));

    let path_str = path.display().to_string();

    let header = std::iter::once(table.index_name.as_str()).chain(table.column_names());
    csv_writer
        .write_record(header)
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    let mut row = Vec::with_capacity(table.columns.len() + 1);
    for (i, index) in table.index.iter().enumerate() {
        row.clear();
        row.push(index.clone());
        row.extend(table.columns.iter().map(|c| format_value(c.values[i])));

        csv_writer.write_record(&row).map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}
