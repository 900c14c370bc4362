// ============================================================
// Layer 3 — Record Domain Type
// ============================================================
// One question / answer / image triple.
//
// A Record starts life as a raw row from a QA file and is
// progressively enriched by the data layer:
//   1. cleaned question/answer text
//   2. boolean indicator flags found by keyword search
//   3. a single consolidated imaging-device tag
//
// Test rows have no answer, so `answer` is optional.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, path::PathBuf, str::FromStr};

use crate::domain::device_tag::DeviceTag;

/// Dataset split a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Validation,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train      => "train",
            Split::Validation => "validation",
            Split::Test       => "test",
        }
    }

    /// Only labelled splits may feed the vocabulary
    pub fn is_labelled(&self) -> bool {
        matches!(self, Split::Train | Split::Validation)
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "train"                 => Ok(Split::Train),
            "validation" | "valid"  => Ok(Split::Validation),
            "test"                  => Ok(Split::Test),
            other => Err(anyhow::anyhow!(
                "unknown split '{other}' (expected train, validation or test)"
            )),
        }
    }
}

/// A single question-answer-image triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Image file name, always ending in `.jpg` after pre-processing
    pub image_name: String,

    pub question: String,

    /// Ground truth answer; absent for unlabelled test rows
    pub answer: Option<String>,

    /// Full path of the image file on disk
    pub path: PathBuf,

    pub split: Split,

    /// Keyword indicator columns, e.g. `"ct" -> true`
    pub indicators: BTreeMap<String, bool>,

    /// Consolidated imaging device, set once per image
    pub device: Option<DeviceTag>,
}

impl Record {
    pub fn new(
        image_name: impl Into<String>,
        question:   impl Into<String>,
        answer:     Option<String>,
        path:       impl Into<PathBuf>,
        split:      Split,
    ) -> Self {
        Self {
            image_name: image_name.into(),
            question:   question.into(),
            answer,
            path:       path.into(),
            split,
            indicators: BTreeMap::new(),
            device:     None,
        }
    }

    /// Builder-style helper used when flags are already known
    pub fn with_flag(mut self, name: impl Into<String>, value: bool) -> Self {
        self.indicators.insert(name.into(), value);
        self
    }

    /// Value of an indicator flag; missing flags read as false
    pub fn flag(&self, name: &str) -> bool {
        self.indicators.get(name).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_parses_aliases() {
        assert_eq!("Train".parse::<Split>().unwrap(), Split::Train);
        assert_eq!("valid".parse::<Split>().unwrap(), Split::Validation);
        assert!("holdout".parse::<Split>().is_err());
    }

    #[test]
    fn test_missing_flag_is_false() {
        let r = Record::new("a.jpg", "q", None, "img/a.jpg", Split::Test)
            .with_flag("ct", true);
        assert!(r.flag("ct"));
        assert!(!r.flag("mri"));
    }
}
