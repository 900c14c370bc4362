// ============================================================
// Layer 3 — Imaging Device Tags and Consolidation
// ============================================================
// Questions about the same image are tagged independently, so
// one image can collect contradictory device flags across its
// questions. Consolidation reduces them to one label per image:
//
//   row flags  →  row tag  →  tag set per image  →  one tag
//
// `unknown` is weak (no information) and merges into a single
// explicit category. Two explicit categories, or an explicit
// `both`, cannot be reconciled and collapse to `unknown`.
//
// The resolution step is a lookup over every possible tag set
// (4 tags → 16 bitmasks), so the rule set is exhaustively
// testable rather than buried in nested conditionals.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::domain::errors::IntegrityError;
use crate::domain::record::Record;

/// Indicator flag names that drive the row tag
pub const CT_FLAG:  &str = "ct";
pub const MRI_FLAG: &str = "mri";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceTag {
    Ct,
    Mri,
    Both,
    Unknown,
}

impl DeviceTag {
    pub const ALL: [DeviceTag; 4] = [DeviceTag::Ct, DeviceTag::Mri, DeviceTag::Both, DeviceTag::Unknown];

    /// Row-level precedence table over the two device flags
    pub fn from_flags(ct: bool, mri: bool) -> Self {
        match (ct, mri) {
            (true,  true)  => DeviceTag::Both,
            (true,  false) => DeviceTag::Ct,
            (false, true)  => DeviceTag::Mri,
            (false, false) => DeviceTag::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceTag::Ct      => "ct",
            DeviceTag::Mri     => "mri",
            DeviceTag::Both    => "both",
            DeviceTag::Unknown => "unknown",
        }
    }

    fn bit(self) -> u8 {
        match self {
            DeviceTag::Ct      => 0b0001,
            DeviceTag::Mri     => 0b0010,
            DeviceTag::Both    => 0b0100,
            DeviceTag::Unknown => 0b1000,
        }
    }
}

impl fmt::Display for DeviceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceTag {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceTag::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown imaging device tag '{s}'"))
    }
}

// ─── TagSet ───────────────────────────────────────────────────────────────────
/// Set of distinct tags observed for one image, stored as a bitmask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TagSet(u8);

use DeviceTag::{Ct, Mri, Unknown};

// Index = bitmask (ct=1, mri=2, both=4, unknown=8).
// None marks the empty set, which is never a valid outcome.
const RESOLUTION: [Option<DeviceTag>; 16] = [
    /* {}                    */ None,
    /* {ct}                  */ Some(Ct),
    /* {mri}                 */ Some(Mri),
    /* {ct,mri}              */ Some(Unknown),
    /* {both}                */ Some(Unknown),
    /* {ct,both}             */ Some(Unknown),
    /* {mri,both}            */ Some(Unknown),
    /* {ct,mri,both}         */ Some(Unknown),
    /* {unknown}             */ Some(Unknown),
    /* {ct,unknown}          */ Some(Ct),
    /* {mri,unknown}         */ Some(Mri),
    /* {ct,mri,unknown}      */ Some(Unknown),
    /* {both,unknown}        */ Some(Unknown),
    /* {ct,both,unknown}     */ Some(Unknown),
    /* {mri,both,unknown}    */ Some(Unknown),
    /* {ct,mri,both,unknown} */ Some(Unknown),
];

impl TagSet {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, tag: DeviceTag) {
        self.0 |= tag.bit();
    }

    pub fn contains(&self, tag: DeviceTag) -> bool {
        self.0 & tag.bit() != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn tags(&self) -> Vec<DeviceTag> {
        DeviceTag::ALL.into_iter().filter(|t| self.contains(*t)).collect()
    }

    /// Resolved tag for this set; None when the set cannot be resolved
    pub fn resolve(&self) -> Option<DeviceTag> {
        RESOLUTION[self.0 as usize]
    }
}

impl FromIterator<DeviceTag> for TagSet {
    fn from_iter<I: IntoIterator<Item = DeviceTag>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

// ─── Consolidation ────────────────────────────────────────────────────────────

/// Row-level tag derived from a record's own device flags
pub fn row_tag(record: &Record) -> DeviceTag {
    DeviceTag::from_flags(record.flag(CT_FLAG), record.flag(MRI_FLAG))
}

/// Collect the distinct row tags observed for each image
pub fn group_by_image(records: &[Record]) -> BTreeMap<String, TagSet> {
    let mut groups: BTreeMap<String, TagSet> = BTreeMap::new();
    for r in records {
        groups.entry(r.image_name.clone()).or_default().insert(row_tag(r));
    }
    groups
}

/// Resolve every image's tag set to exactly one tag.
///
/// Fails with every unresolved image counted and up to five
/// named, so the gap in the rules can be diagnosed.
pub fn resolve_groups(
    groups: &BTreeMap<String, TagSet>,
) -> Result<BTreeMap<String, DeviceTag>, IntegrityError> {
    let mut resolved = BTreeMap::new();
    let mut failures = Vec::new();

    for (image, set) in groups {
        match set.resolve() {
            Some(tag) => {
                resolved.insert(image.clone(), tag);
            }
            None => failures.push(format!("{image}: {:?}", set.tags())),
        }
    }

    if !failures.is_empty() {
        return Err(IntegrityError::UnresolvedTags {
            count:    failures.len(),
            examples: failures.into_iter().take(5).collect(),
        });
    }
    Ok(resolved)
}

/// Consolidated tag per distinct image name
pub fn consolidate(records: &[Record]) -> Result<BTreeMap<String, DeviceTag>, IntegrityError> {
    resolve_groups(&group_by_image(records))
}

/// Stamp every record with its image's consolidated tag and drop the
/// raw device flags, which are superseded by the tag.
pub fn apply_consolidation(
    records: &mut [Record],
) -> Result<BTreeMap<String, DeviceTag>, IntegrityError> {
    let by_image = consolidate(records)?;

    for r in records.iter_mut() {
        r.device = by_image.get(&r.image_name).copied();
        r.indicators.remove(CT_FLAG);
        r.indicators.remove(MRI_FLAG);
    }

    tracing::debug!("Consolidated imaging devices for {} images", by_image.len());
    Ok(by_image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::Split;

    fn rec(image: &str, ct: bool, mri: bool) -> Record {
        Record::new(image, "q", Some("a".into()), format!("img/{image}"), Split::Train)
            .with_flag(CT_FLAG, ct)
            .with_flag(MRI_FLAG, mri)
    }

    // Straightforward restatement of the conflict rules, used to
    // cross-check the lookup table over every possible set.
    fn resolve_by_rules(set: &TagSet) -> Option<DeviceTag> {
        if set.is_empty() {
            return None;
        }
        let ct  = set.contains(DeviceTag::Ct);
        let mri = set.contains(DeviceTag::Mri);
        if set.contains(DeviceTag::Both) || (ct && mri) {
            Some(DeviceTag::Unknown)
        } else if set.contains(DeviceTag::Unknown) && (ct || mri) {
            Some(if ct { DeviceTag::Ct } else { DeviceTag::Mri })
        } else if set.len() == 1 {
            set.tags().first().copied()
        } else {
            None
        }
    }

    #[test]
    fn test_table_matches_rules_for_every_set() {
        for mask in 0u8..16 {
            let set = TagSet(mask);
            assert_eq!(set.resolve(), resolve_by_rules(&set), "mask {mask:04b}");
        }
    }

    #[test]
    fn test_row_precedence() {
        assert_eq!(DeviceTag::from_flags(true, true),   DeviceTag::Both);
        assert_eq!(DeviceTag::from_flags(true, false),  DeviceTag::Ct);
        assert_eq!(DeviceTag::from_flags(false, true),  DeviceTag::Mri);
        assert_eq!(DeviceTag::from_flags(false, false), DeviceTag::Unknown);
    }

    #[test]
    fn test_conflict_examples() {
        let cases = [
            (vec![DeviceTag::Ct, DeviceTag::Unknown], DeviceTag::Ct),
            (vec![DeviceTag::Ct, DeviceTag::Mri],     DeviceTag::Unknown),
            (vec![DeviceTag::Both],                   DeviceTag::Unknown),
            (vec![DeviceTag::Mri, DeviceTag::Unknown], DeviceTag::Mri),
        ];
        for (tags, expected) in cases {
            let set: TagSet = tags.iter().copied().collect();
            assert_eq!(set.resolve(), Some(expected), "{tags:?}");
        }
    }

    #[test]
    fn test_end_to_end_scenario() {
        let mut a_ct = rec("a.jpg", true, false);
        a_ct.question = "is ct present".into();
        a_ct.answer   = Some("ct scan".into());
        let mut a_other = rec("a.jpg", false, false);
        a_other.question = "any finding".into();
        a_other.answer   = Some("normal".into());
        let mut records = vec![a_ct, a_other];

        let row_tags: Vec<_> = records.iter().map(row_tag).collect();
        assert_eq!(row_tags, vec![DeviceTag::Ct, DeviceTag::Unknown]);

        let tags = apply_consolidation(&mut records).unwrap();
        assert_eq!(tags["a.jpg"], DeviceTag::Ct);
        assert!(records.iter().all(|r| r.device == Some(DeviceTag::Ct)));
        assert!(records.iter().all(|r| !r.indicators.contains_key(CT_FLAG)));
    }

    #[test]
    fn test_every_image_resolves_to_one_tag() {
        let records = vec![
            rec("a.jpg", true,  false),
            rec("a.jpg", false, true),
            rec("b.jpg", true,  true),
            rec("c.jpg", false, false),
            rec("d.jpg", false, true),
            rec("d.jpg", false, false),
        ];
        let groups = group_by_image(&records);
        let tags   = resolve_groups(&groups).unwrap();
        assert_eq!(tags.len(), groups.len());
        assert_eq!(tags["a.jpg"], DeviceTag::Unknown);
        assert_eq!(tags["b.jpg"], DeviceTag::Unknown);
        assert_eq!(tags["c.jpg"], DeviceTag::Unknown);
        assert_eq!(tags["d.jpg"], DeviceTag::Mri);
    }

    #[test]
    fn test_empty_set_is_integrity_failure() {
        let mut groups = BTreeMap::new();
        groups.insert("ghost.jpg".to_string(), TagSet::new());
        let err = resolve_groups(&groups).unwrap_err();
        assert!(matches!(err, IntegrityError::UnresolvedTags { count: 1, .. }));
    }
}
