// ============================================================
// Layer 4 — QA File Loader
// ============================================================
// Reads VQA-Med question/answer files. Each line is
// tab-separated:
//
//   <id> \t <image> \t <question> \t <answer>
//
// Test files omit the answer column. Image ids are normalised
// to `<id>.jpg` and resolved against the split's image folder.
//
// Test and validation folders routinely hold only part of the
// images their QA files reference, so records whose image is
// not on disk are filtered out (with a warning) rather than
// treated as errors.

use anyhow::{bail, Context, Result};
use std::{
    collections::{BTreeSet, HashSet},
    fs,
    path::{Path, PathBuf},
};

use crate::domain::record::{Record, Split};
use crate::domain::traits::RecordSource;

pub struct QaFileLoader {
    path:       PathBuf,
    images_dir: PathBuf,
    split:      Split,
}

impl QaFileLoader {
    pub fn new(path: impl Into<PathBuf>, images_dir: impl Into<PathBuf>, split: Split) -> Self {
        Self {
            path:       path.into(),
            images_dir: images_dir.into(),
            split,
        }
    }

    fn parse_line(&self, line: &str, line_no: usize) -> Result<Option<Record>> {
        if line.trim().is_empty() {
            return Ok(None);
        }
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        if fields.len() < 3 {
            bail!(
                "line {} of '{}' has {} fields, expected id, image, question[, answer]",
                line_no,
                self.path.display(),
                fields.len()
            );
        }
        // optional header row
        if line_no == 1 && matches!(fields[1].to_ascii_lowercase().as_str(), "image" | "image_name") {
            return Ok(None);
        }

        let image_name = ensure_jpg(fields[1]);
        let answer = fields
            .get(3)
            .filter(|a| !a.is_empty())
            .map(|a| a.to_string());
        let path = self.images_dir.join(&image_name);

        Ok(Some(Record::new(image_name, fields[2], answer, path, self.split)))
    }
}

impl RecordSource for QaFileLoader {
    fn load_all(&self) -> Result<Vec<Record>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read QA file '{}'", self.path.display()))?;

        let mut records = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if let Some(r) = self.parse_line(line, i + 1)? {
                records.push(r);
            }
        }

        tracing::info!(
            "Loaded {} {} records from '{}'",
            records.len(),
            self.split,
            self.path.display()
        );
        Ok(records)
    }
}

/// `name` with a `.jpg` suffix, added only if missing (any case)
pub fn ensure_jpg(name: &str) -> String {
    if name.to_ascii_lowercase().ends_with(".jpg") {
        name.to_string()
    } else {
        format!("{name}.jpg")
    }
}

/// Keep only records whose image file is listed in its folder.
/// Returns the kept records and how many were dropped.
pub fn filter_existing(records: Vec<Record>) -> (Vec<Record>, usize) {
    let dirs: BTreeSet<PathBuf> = records
        .iter()
        .map(|r| r.path.parent().map(Path::to_path_buf).unwrap_or_default())
        .collect();

    let mut existing: HashSet<PathBuf> = HashSet::new();
    for dir in &dirs {
        let listing = if dir.as_os_str().is_empty() { Path::new(".") } else { dir.as_path() };
        match fs::read_dir(listing) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    if let Some(name) = entry.path().file_name() {
                        existing.insert(dir.join(name));
                    }
                }
            }
            Err(e) => tracing::warn!("Cannot list image folder '{}': {}", dir.display(), e),
        }
    }

    let total = records.len();
    let kept: Vec<Record> = records.into_iter().filter(|r| existing.contains(&r.path)).collect();
    let dropped = total - kept.len();
    if dropped > 0 {
        tracing::warn!("Dropped {} of {} records whose image file is missing", dropped, total);
    }
    (kept, dropped)
}
