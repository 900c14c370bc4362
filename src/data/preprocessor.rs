// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Cleans question and answer text before enrichment and
// feature extraction.
//
// Cleaning steps (applied in order):
//   1. Map tabs, non-breaking/zero-width spaces, BOMs and other
//      control characters to plain spaces
//   2. Collapse runs of spaces and trim
//   3. Apply each configured find-and-replace rule in order
//      (case-insensitive regex), trimming after every rule
//
// Rules are compiled once when the Preprocessor is built; a bad
// pattern fails construction, not the middle of a batch.

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

use crate::application::config::FindReplace;
use crate::domain::record::Record;

pub struct Preprocessor {
    rules: Vec<(Regex, String)>,
}

impl Preprocessor {
    pub fn new(rules: &[FindReplace]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|r| {
                let re = RegexBuilder::new(&r.pattern)
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("Invalid find-and-replace pattern '{}'", r.pattern))?;
                Ok((re, r.replacement.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Clean one string
    pub fn clean(&self, text: &str) -> String {
        let normalised: String = text
            .chars()
            .map(|c| match c {
                '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_control() => ' ',
                c => c,
            })
            .collect();

        let mut out = normalised.split_whitespace().collect::<Vec<_>>().join(" ");

        for (re, replacement) in &self.rules {
            out = re.replace_all(&out, replacement.as_str()).trim().to_string();
        }
        out
    }

    /// Clean question and answer of every record in place
    pub fn clean_records(&self, records: &mut [Record]) {
        for r in records.iter_mut() {
            r.question = self.clean(&r.question);
            if let Some(answer) = r.answer.as_mut() {
                *answer = self.clean(answer);
            }
        }
        tracing::debug!("Cleaned {} records with {} rules", records.len(), self.rules.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::Split;

    fn rule(p: &str, r: &str) -> FindReplace {
        FindReplace { pattern: p.into(), replacement: r.into() }
    }

    #[test]
    fn test_collapses_whitespace_and_controls() {
        let p = Preprocessor::new(&[]).unwrap();
        assert_eq!(p.clean("  is\tthe\u{00A0}ct \x01 normal  "), "is the ct normal");
        assert_eq!(p.clean(""), "");
    }

    #[test]
    fn test_rules_are_case_insensitive_and_ordered() {
        let p = Preprocessor::new(&[
            rule(r"\bComputed Tomography\b", "ct"),
            rule(r"\bct\b", "CT"),
        ])
        .unwrap();
        assert_eq!(p.clean("computed tomography of chest"), "CT of chest");
    }

    #[test]
    fn test_bad_pattern_fails_construction() {
        assert!(Preprocessor::new(&[rule("(unclosed", "x")]).is_err());
    }

    #[test]
    fn test_cleans_answers_but_keeps_missing_ones() {
        let p = Preprocessor::new(&[]).unwrap();
        let mut records = vec![
            Record::new("a.jpg", " q  one ", Some(" ct  scan ".into()), "a.jpg", Split::Train),
            Record::new("b.jpg", "q", None, "b.jpg", Split::Test),
        ];
        p.clean_records(&mut records);
        assert_eq!(records[0].question, "q one");
        assert_eq!(records[0].answer.as_deref(), Some("ct scan"));
        assert_eq!(records[1].answer, None);
    }
}
