// ============================================================
// Layer 6 — Prediction Result Table
// ============================================================
// A small column-oriented table written as CSV. The readable
// columns (image_name, question, answer, prediction) are moved
// to the front; every other column keeps its relative order.

use anyhow::{ensure, Context, Result};
use std::{borrow::Cow, fs, io::Write, path::Path};

pub const PREFERRED_COLUMNS: [&str; 4] = ["image_name", "question", "answer", "prediction"];

#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    columns: Vec<String>,
    rows:    Vec<Vec<String>>,
}

impl ResultTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn push_row(&mut self, row: Vec<String>) -> Result<()> {
        ensure!(
            row.len() == self.columns.len(),
            "row has {} cells but the table has {} columns",
            row.len(),
            self.columns.len()
        );
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of one column, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let ix = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| r[ix].as_str()).collect())
    }

    /// Stable reorder: preferred columns first, the rest after
    pub fn with_preferred_order(self) -> Self {
        let is_preferred = |c: &String| PREFERRED_COLUMNS.contains(&c.as_str());
        let order: Vec<usize> = (0..self.columns.len())
            .filter(|&i| is_preferred(&self.columns[i]))
            .chain((0..self.columns.len()).filter(|&i| !is_preferred(&self.columns[i])))
            .collect();

        let pick = |row: &Vec<String>| order.iter().map(|&i| row[i].clone()).collect::<Vec<_>>();
        Self {
            columns: pick(&self.columns),
            rows:    self.rows.iter().map(pick).collect(),
        }
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        let mut f = fs::File::create(path)
            .with_context(|| format!("Cannot create '{}'", path.display()))?;

        writeln!(f, "{}", csv_line(&self.columns))?;
        for row in &self.rows {
            writeln!(f, "{}", csv_line(row))?;
        }
        tracing::info!("Wrote {} predictions to '{}'", self.rows.len(), path.display());
        Ok(())
    }
}

fn csv_line(cells: &[String]) -> String {
    cells.iter().map(|c| escape(c)).collect::<Vec<_>>().join(",")
}

fn escape(cell: &str) -> Cow<'_, str> {
    if cell.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", cell.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(cell)
    }
}
