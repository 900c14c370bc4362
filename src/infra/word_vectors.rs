// ============================================================
// Layer 6 — Pretrained Word Vectors
// ============================================================
// Loads a GloVe-style text table:
//
//   the 0.418 0.24968 -0.41242 ...
//   of  0.70853 0.57088 -0.4716 ...
//
// The embedding dimension is read from the first line and every
// other line must agree. Words are lower-cased on load (the
// tokenizer lower-cases too) and the first occurrence wins.

use anyhow::{bail, Context, Result};
use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

pub struct WordVectors {
    dim:   usize,
    words: Vec<String>,
    index: HashMap<String, usize>,
    /// Row-major, words.len() × dim
    data:  Vec<f32>,
}

impl WordVectors {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Cannot open word vectors '{}'", path.display()))?;

        let mut entries = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("Cannot read '{}'", path.display()))?;
            let mut parts = line.split_whitespace();
            let Some(word) = parts.next() else { continue };

            let values = parts
                .map(str::parse::<f32>)
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| {
                    format!("Bad vector for '{word}' on line {} of '{}'", line_no + 1, path.display())
                })?;
            entries.push((word.to_string(), values));
        }

        let vectors = Self::from_entries(entries)?;
        tracing::info!(
            "Loaded {} word vectors of dimension {} from '{}'",
            vectors.len(),
            vectors.dim(),
            path.display()
        );
        Ok(vectors)
    }

    pub fn from_entries(entries: Vec<(String, Vec<f32>)>) -> Result<Self> {
        let Some(dim) = entries.first().map(|(_, v)| v.len()) else {
            bail!("word vector table is empty");
        };
        if dim == 0 {
            bail!("word vectors have zero dimensions");
        }

        let mut words = Vec::with_capacity(entries.len());
        let mut index = HashMap::with_capacity(entries.len());
        let mut data  = Vec::with_capacity(entries.len() * dim);

        for (word, values) in entries {
            if values.len() != dim {
                bail!("vector for '{word}' has {} values, expected {dim}", values.len());
            }
            let word = word.to_lowercase();
            if index.contains_key(&word) {
                continue;
            }
            index.insert(word.clone(), words.len());
            words.push(word);
            data.extend_from_slice(&values);
        }

        Ok(Self { dim, words, index, data })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Words in row order
    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn row(&self, row: usize) -> Option<&[f32]> {
        self.data.get(row * self.dim..(row + 1) * self.dim)
    }

    pub fn get(&self, word: &str) -> Option<&[f32]> {
        self.index.get(word).and_then(|&r| self.row(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loads_glove_text() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "CT 1.0 2.0 3.0").unwrap();
        writeln!(f, "scan 0.5 0.5 0.5").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "ct 9.0 9.0 9.0").unwrap();

        let v = WordVectors::load(f.path()).unwrap();
        assert_eq!(v.dim(), 3);
        assert_eq!(v.len(), 2);
        // first occurrence of the lower-cased word wins
        assert_eq!(v.get("ct").unwrap(), &[1.0, 2.0, 3.0]);
        assert!(v.get("mri").is_none());
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let entries = vec![
            ("a".to_string(), vec![1.0, 2.0]),
            ("b".to_string(), vec![1.0]),
        ];
        assert!(WordVectors::from_entries(entries).is_err());
    }
}
