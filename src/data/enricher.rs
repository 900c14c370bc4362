// ============================================================
// Layer 4 — Keyword Enricher
// ============================================================
// Adds one boolean indicator column per keyword: true when the
// word appears as a whole word (case-insensitive) in the
// question or the answer.
//
// A keyword that matches no record at all is reported and no
// column is added for it, mirroring how sparse keywords are
// useless as features.

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

use crate::domain::record::Record;

pub struct KeywordEnricher {
    keywords: Vec<(String, Regex)>,
}

impl KeywordEnricher {
    pub fn new<I, S>(words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = words
            .into_iter()
            .map(|w| {
                let w = w.as_ref().to_string();
                let re = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(&w)))
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("Cannot build keyword matcher for '{w}'"))?;
                Ok((w, re))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { keywords })
    }

    /// Whole-word, case-insensitive search
    pub fn has_word(re: &Regex, text: &str) -> bool {
        re.is_match(text)
    }

    /// Add indicator flags to every record; returns the keywords that got a column
    pub fn enrich(&self, records: &mut [Record]) -> Vec<String> {
        let mut added = Vec::new();

        for (word, re) in &self.keywords {
            let hits: Vec<bool> = records
                .iter()
                .map(|r| {
                    Self::has_word(re, &r.question)
                        || r.answer.as_deref().is_some_and(|a| Self::has_word(re, a))
                })
                .collect();

            if hits.iter().any(|&h| h) {
                for (r, hit) in records.iter_mut().zip(hits) {
                    r.indicators.insert(word.clone(), hit);
                }
                added.push(word.clone());
            } else {
                tracing::warn!("found no matching for '{}'", word);
            }
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::Split;

    fn rec(q: &str, a: Option<&str>) -> Record {
        Record::new("x.jpg", q, a.map(str::to_string), "x.jpg", Split::Train)
    }

    #[test]
    fn test_whole_word_in_question_or_answer() {
        let mut records = vec![
            rec("is this a CT image", None),
            rec("what modality", Some("mri of brain")),
            rec("any acute finding", Some("no")),
        ];
        let e = KeywordEnricher::new(["ct", "mri"]).unwrap();
        let added = e.enrich(&mut records);

        assert_eq!(added, vec!["ct", "mri"]);
        assert!(records[0].flag("ct"));
        // "acute" contains "ct" but not as a whole word
        assert!(!records[2].flag("ct"));
        assert!(records[1].flag("mri"));
        assert!(!records[0].flag("mri"));
    }

    #[test]
    fn test_unmatched_keyword_adds_no_column() {
        let mut records = vec![rec("is this a ct", None)];
        let e = KeywordEnricher::new(["pelvis"]).unwrap();
        assert!(e.enrich(&mut records).is_empty());
        assert!(!records[0].indicators.contains_key("pelvis"));
    }
}
