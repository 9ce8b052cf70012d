use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, trace};

use crate::domain::TCError;

/// The parsed csv content: a fixed header schema and row-major string data.
///
/// Every row has exactly `schema.len()` cells. The originally parsed rows
/// are kept around so the grid can be reset after editing.
pub struct Table {
    path: PathBuf,
    name: String,
    schema: Vec<String>,
    rows: Vec<Vec<String>>,
    original: Vec<Vec<String>>,
}

impl Table {
    pub fn load(path: PathBuf) -> Result<Self, TCError> {
        Self::check_file(&path)?;

        let start_time = Instant::now();
        let frame = LazyCsvReader::new(PlPath::Local(path.as_path().into()))
            .with_has_header(true)
            .finish()?;
        let df = frame.collect()?;

        let schema: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.as_str().to_string())
            .collect();

        // Materialize every column as strings in parallel, then turn the
        // columnar result into the row-major layout the grid edits.
        let c_: Result<Vec<Vec<String>>, PolarsError> = schema
            .par_iter()
            .map(|name| Self::load_column(&df, name))
            .collect();
        let columns = c_?;

        let nrows = df.height();
        let rows: Vec<Vec<String>> = (0..nrows)
            .map(|ridx| columns.iter().map(|c| c[ridx].clone()).collect())
            .collect();

        info!(
            "Loaded {} rows x {} columns in {}ms",
            nrows,
            schema.len(),
            start_time.elapsed().as_millis()
        );

        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();

        Ok(Table {
            path,
            name,
            schema,
            original: rows.clone(),
            rows,
        })
    }

    /// Build a table directly from parts, mainly for tests.
    pub fn from_parts(name: &str, schema: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Table {
            path: PathBuf::new(),
            name: name.to_string(),
            schema,
            original: rows.clone(),
            rows,
        }
    }

    fn check_file(path: &Path) -> Result<(), TCError> {
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => TCError::FileNotFound,
            ErrorKind::PermissionDenied => TCError::PermissionDenied,
            _ => TCError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(TCError::LoadingFailed("Not a file!".into()));
        }
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(()),
            _ => Err(TCError::UnknownFileType),
        }
    }

    fn load_column(df: &DataFrame, col_name: &str) -> Result<Vec<String>, PolarsError> {
        let col = df.column(col_name)?.cast(&DataType::String)?;
        let series = col.str()?;
        // Null cells become empty strings: editable in the grid and
        // excluded from the frequency counts.
        Ok(series
            .into_iter()
            .map(|value| value.map(str::to_string).unwrap_or_default())
            .collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name the export prompt gets prefilled with.
    pub fn export_name(&self) -> String {
        self.name.clone()
    }

    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn ncols(&self) -> usize {
        self.schema.len()
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn cell(&self, ridx: usize, cidx: usize) -> &str {
        self.rows
            .get(ridx)
            .and_then(|r| r.get(cidx))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn set_cell(&mut self, ridx: usize, cidx: usize, value: String) {
        if let Some(row) = self.rows.get_mut(ridx)
            && let Some(cell) = row.get_mut(cidx)
        {
            trace!("Set cell {}:{} to \"{}\"", ridx, cidx, value);
            *cell = value;
        }
    }

    /// Insert an empty row at the top of the grid.
    pub fn add_row(&mut self) {
        self.rows.insert(0, vec![String::new(); self.schema.len()]);
    }

    pub fn delete_row(&mut self, ridx: usize) {
        if ridx < self.rows.len() {
            self.rows.remove(ridx);
        }
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Restore the rows to the originally parsed data.
    pub fn reset(&mut self) {
        self.rows = self.original.clone();
    }

    /// Write the current grid state (not the original data) as csv.
    pub fn export(&self, path: &Path) -> Result<(), TCError> {
        let columns: Vec<Column> = self
            .schema
            .iter()
            .enumerate()
            .map(|(cidx, name)| {
                let values: Vec<String> = self
                    .rows
                    .iter()
                    .map(|row| row.get(cidx).cloned().unwrap_or_default())
                    .collect();
                Column::new(name.as_str().into(), values)
            })
            .collect();
        let mut df = DataFrame::new(columns)
            .map_err(|e| TCError::ExportFailed(format!("{e}")))?;

        let mut file = fs::File::create(path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)?;
        debug!("Exported {} rows to {:?}", self.rows.len(), path);
        Ok(())
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.chars().any(|c| c == '"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace("\"", "\"\"");
        }
        if needs_wrapping || needs_escaping {
            out = format!("\"{out}\"");
        }
        out
    }

    /// One row as a csv line, for the clipboard.
    pub fn row_as_csv(&self, ridx: usize) -> String {
        self.rows
            .get(ridx)
            .map(|row| {
                row.iter()
                    .map(|c| Self::wrap_cell_content(c))
                    .collect::<Vec<String>>()
                    .join(",")
            })
            .unwrap_or_default()
    }

    /// Reorder rows by one column. Numeric-looking values sort numerically
    /// and come before the ones that do not parse.
    pub fn sort_by_column(&mut self, cidx: usize, ascending: bool) {
        if cidx >= self.schema.len() {
            return;
        }
        self.rows.sort_by(|ra, rb| {
            let a = ra.get(cidx).map(String::as_str).unwrap_or("");
            let b = rb.get(cidx).map(String::as_str).unwrap_or("");
            let a_val: Result<f64, _> = a.parse();
            let b_val: Result<f64, _> = b.parse();
            let ord = match (a_val, b_val) {
                (Ok(a_float), Ok(b_float)) => a_float
                    .partial_cmp(&b_float)
                    .unwrap_or(std::cmp::Ordering::Equal),
                (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                (Err(_), Err(_)) => a.cmp(b),
            };
            if ascending { ord } else { ord.reverse() }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_table() -> Table {
        let schema = vec!["name".to_string(), "color".to_string()];
        let rows = vec![
            vec!["ada".to_string(), "red".to_string()],
            vec!["bob".to_string(), "blue".to_string()],
            vec!["eve".to_string(), "red".to_string()],
        ];
        Table::from_parts("small.csv", schema, rows)
    }

    #[test]
    fn add_row_inserts_empty_row_at_top() {
        let mut table = small_table();
        table.add_row();
        assert_eq!(table.nrows(), 4);
        assert_eq!(table.cell(0, 0), "");
        assert_eq!(table.cell(0, 1), "");
        assert_eq!(table.cell(1, 0), "ada");
    }

    #[test]
    fn edit_then_reset_restores_original() {
        let mut table = small_table();
        table.set_cell(0, 1, "green".to_string());
        table.add_row();
        table.delete_row(2);
        table.clear();
        assert_eq!(table.nrows(), 0);

        table.reset();
        assert_eq!(table.nrows(), 3);
        assert_eq!(table.cell(0, 1), "red");
        assert_eq!(table.rows(), small_table().rows());
    }

    #[test]
    fn delete_row_out_of_bounds_is_a_noop() {
        let mut table = small_table();
        table.delete_row(17);
        assert_eq!(table.nrows(), 3);
    }

    #[test]
    fn row_as_csv_quotes_when_needed() {
        let schema = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let rows = vec![vec![
            "plain".to_string(),
            "has, comma".to_string(),
            "has \"quote\"".to_string(),
        ]];
        let table = Table::from_parts("q.csv", schema, rows);
        assert_eq!(
            table.row_as_csv(0),
            "plain,\"has, comma\",\"has \"\"quote\"\"\""
        );
    }

    #[test]
    fn sort_by_column_numeric_and_string() {
        let schema = vec!["n".to_string()];
        let rows = vec![
            vec!["10".to_string()],
            vec!["2".to_string()],
            vec!["x".to_string()],
            vec!["1".to_string()],
        ];
        let mut table = Table::from_parts("s.csv", schema, rows);
        table.sort_by_column(0, true);
        let got: Vec<&str> = (0..4).map(|r| table.cell(r, 0)).collect();
        assert_eq!(got, vec!["1", "2", "10", "x"]);

        table.sort_by_column(0, false);
        let got: Vec<&str> = (0..4).map(|r| table.cell(r, 0)).collect();
        assert_eq!(got, vec!["x", "10", "2", "1"]);
    }

    #[test]
    fn load_fixture_and_export_round_trip() -> Result<(), TCError> {
        let table = Table::load("tests/fixtures/testdata_01.csv".into())?;
        assert_eq!(table.schema(), &["name", "color", "count"]);
        assert_eq!(table.nrows(), 4);
        assert_eq!(table.cell(0, 1), "red");
        // The empty cell parses as an empty string
        assert_eq!(table.cell(3, 1), "");

        let dir = tempfile::tempdir()?;
        let out = dir.path().join("export.csv");
        table.export(&out)?;

        let reloaded = Table::load(out)?;
        assert_eq!(reloaded.schema(), table.schema());
        assert_eq!(reloaded.rows(), table.rows());
        Ok(())
    }

    #[test]
    fn load_rejects_missing_and_unknown_files() {
        assert!(matches!(
            Table::load("tests/fixtures/no_such_file.csv".into()),
            Err(TCError::FileNotFound)
        ));
        assert!(matches!(
            Table::load("Cargo.toml".into()),
            Err(TCError::UnknownFileType)
        ));
    }
}
