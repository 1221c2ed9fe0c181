//! CSV loading and writing.
//!
//! Format: a comma-separated header of column names, then integer rows.
//! Values parse as signed 64-bit and saturate to signed 32-bit; whitespace
//! around fields is trimmed; no quoting. Directory loading treats every
//! `*.csv` filename stem as the table name.

use crate::entry::Entry;
use crate::error::ObliviousJoinError;
use crate::table::{Schema, Table};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Load one CSV file as a table named after the file stem.
pub fn load_csv(path: &Path) -> Result<Table, ObliviousJoinError> {
    let display = path.display().to_string();
    let content =
        fs::read_to_string(path).map_err(|e| ObliviousJoinError::io(display.clone(), e))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut lines = content.lines().enumerate();
    let (_, header) = lines.next().ok_or_else(|| ObliviousJoinError::CsvFormat {
        path: display.clone(),
        message: "empty file (missing header)".into(),
    })?;
    let columns: Vec<String> = header.split(',').map(|c| c.trim().to_string()).collect();
    if columns.iter().any(String::is_empty) {
        return Err(ObliviousJoinError::CsvFormat {
            path: display.clone(),
            message: "blank column name in header".into(),
        });
    }
    let schema = Schema::new(columns)?;
    let width = schema.len();

    let mut table = Table::new(name, schema);
    for (line_no, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let mut values = [0i32; crate::entry::MAX_ATTRIBUTES];
        let mut count = 0;
        for field in line.split(',') {
            if count >= width {
                count += 1;
                break;
            }
            let parsed: i64 = field.trim().parse().map_err(|_| ObliviousJoinError::CsvFormat {
                path: display.clone(),
                message: format!("line {}: non-integer field '{}'", line_no + 1, field.trim()),
            })?;
            values[count] = parsed.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
            count += 1;
        }
        if count != width {
            return Err(ObliviousJoinError::CsvFormat {
                path: display.clone(),
                message: format!(
                    "line {}: expected {width} fields, got {count}",
                    line_no + 1
                ),
            });
        }
        table.push(Entry::from_attributes(&values[..width]));
    }
    Ok(table)
}

/// Load every `*.csv` in a directory, keyed by table name.
pub fn load_dir(dir: &Path) -> Result<HashMap<String, Table>, ObliviousJoinError> {
    let display = dir.display().to_string();
    let mut tables = HashMap::new();
    let entries =
        fs::read_dir(dir).map_err(|e| ObliviousJoinError::io(display.clone(), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ObliviousJoinError::io(display.clone(), e))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let table = load_csv(&path)?;
        info!(table = table.name(), rows = table.len(), "loaded");
        tables.insert(table.name().to_string(), table);
    }
    if tables.is_empty() {
        return Err(ObliviousJoinError::CsvFormat {
            path: display,
            message: "no *.csv files found in input directory".into(),
        });
    }
    Ok(tables)
}

/// Write a table as CSV: header line, then one integer row per tuple.
pub fn save_csv(table: &Table, path: &Path) -> Result<(), ObliviousJoinError> {
    let display = path.display().to_string();
    let mut file =
        fs::File::create(path).map_err(|e| ObliviousJoinError::io(display.clone(), e))?;
    let io_err = |e| ObliviousJoinError::io(display.clone(), e);

    let width = table.schema().len();
    writeln!(file, "{}", table.schema().columns().join(",")).map_err(io_err)?;
    for row in table.rows() {
        let fields: Vec<String> = row.attributes[..width]
            .iter()
            .map(|v| v.to_string())
            .collect();
        writeln!(file, "{}", fields.join(",")).map_err(io_err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("oblijoin_io_tests");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_basic_csv() {
        let path = write_temp("orders.csv", "id,amount\n1,100\n2, -5 \n");
        let table = load_csv(&path).unwrap();
        assert_eq!(table.name(), "orders");
        assert_eq!(table.schema().columns(), &["id", "amount"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.attribute(1, "amount").unwrap(), -5);
    }

    #[test]
    fn test_load_saturates_to_i32() {
        let path = write_temp("big.csv", "v\n99999999999\n-99999999999\n");
        let table = load_csv(&path).unwrap();
        assert_eq!(table.attribute(0, "v").unwrap(), i32::MAX);
        assert_eq!(table.attribute(1, "v").unwrap(), i32::MIN);
    }

    #[test]
    fn test_load_rejects_bad_fields() {
        let path = write_temp("bad.csv", "v\nabc\n");
        assert!(matches!(
            load_csv(&path),
            Err(ObliviousJoinError::CsvFormat { .. })
        ));

        let path = write_temp("short.csv", "a,b\n1\n");
        assert!(load_csv(&path).is_err());

        let path = write_temp("empty.csv", "");
        assert!(load_csv(&path).is_err());
    }

    #[test]
    fn test_roundtrip() {
        let path = write_temp("rt.csv", "x,y\n1,2\n3,4\n");
        let table = load_csv(&path).unwrap();
        let out = write_temp("rt_out.csv", "");
        save_csv(&table, &out).unwrap();
        let again = load_csv(&out).unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(again.attribute(1, "y").unwrap(), 4);
    }

    #[test]
    fn test_skips_blank_lines() {
        let path = write_temp("blank.csv", "v\n1\n\n2\n");
        assert_eq!(load_csv(&path).unwrap().len(), 2);
    }
}
