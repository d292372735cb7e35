//! Versioned conduct and achievement bit specifications.
//!
//! RULE: The registry is built once from static configuration and never
//! mutated afterwards. Uniqueness is enforced at construction:
//!   - (variant, version, source_field, bit_index) per spec kind
//!   - (variant, version, name) per spec kind

use crate::error::{ScoreError, ScoreResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// The bitfield-bearing xlog fields a spec can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceField {
    Conduct,
    Achieve,
    TnntAchieve0,
    TnntAchieve1,
    TnntAchieve2,
    TnntAchieve3,
}

impl SourceField {
    pub const ALL: [SourceField; 6] = [
        SourceField::Conduct,
        SourceField::Achieve,
        SourceField::TnntAchieve0,
        SourceField::TnntAchieve1,
        SourceField::TnntAchieve2,
        SourceField::TnntAchieve3,
    ];

    pub fn xlog_key(self) -> &'static str {
        match self {
            SourceField::Conduct      => "conduct",
            SourceField::Achieve      => "achieve",
            SourceField::TnntAchieve0 => "tnntachieve0",
            SourceField::TnntAchieve1 => "tnntachieve1",
            SourceField::TnntAchieve2 => "tnntachieve2",
            SourceField::TnntAchieve3 => "tnntachieve3",
        }
    }

    pub fn from_xlog_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.xlog_key() == key)
    }
}

/// A game ruleset: the variant name and its version string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ruleset {
    pub variant: String,
    pub version: String,
}

impl Ruleset {
    pub fn new(variant: impl Into<String>, version: impl Into<String>) -> Self {
        Self { variant: variant.into(), version: version.into() }
    }
}

impl std::fmt::Display for Ruleset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.variant, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConductSpec {
    pub variant:      String,
    pub version:      String,
    pub source_field: SourceField,
    pub bit_index:    u8,
    pub short_name:   String,
    pub description:  String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementSpec {
    pub variant:      String,
    pub version:      String,
    pub source_field: SourceField,
    pub bit_index:    u8,
    pub title:        String,
    pub description:  String,
}

/// Common view over both spec kinds, used by the bitfield decoder.
pub trait BitSpec {
    fn ruleset(&self) -> Ruleset;
    fn source_field(&self) -> SourceField;
    fn bit_index(&self) -> u8;
    fn name(&self) -> &str;
}

impl BitSpec for ConductSpec {
    fn ruleset(&self) -> Ruleset { Ruleset::new(&self.variant, &self.version) }
    fn source_field(&self) -> SourceField { self.source_field }
    fn bit_index(&self) -> u8 { self.bit_index }
    fn name(&self) -> &str { &self.short_name }
}

impl BitSpec for AchievementSpec {
    fn ruleset(&self) -> Ruleset { Ruleset::new(&self.variant, &self.version) }
    fn source_field(&self) -> SourceField { self.source_field }
    fn bit_index(&self) -> u8 { self.bit_index }
    fn name(&self) -> &str { &self.title }
}

#[derive(Debug, Clone, Default)]
pub struct RulesetSpecs {
    pub conducts:     Vec<ConductSpec>,
    pub achievements: Vec<AchievementSpec>,
}

#[derive(Debug, Clone, Default)]
pub struct SpecRegistry {
    rulesets: BTreeMap<Ruleset, RulesetSpecs>,
}

impl SpecRegistry {
    pub fn new(
        conducts:     Vec<ConductSpec>,
        achievements: Vec<AchievementSpec>,
    ) -> ScoreResult<Self> {
        check_unique("conduct", &conducts)?;
        check_unique("achievement", &achievements)?;

        let mut rulesets: BTreeMap<Ruleset, RulesetSpecs> = BTreeMap::new();
        for spec in conducts {
            rulesets.entry(spec.ruleset()).or_default().conducts.push(spec);
        }
        for spec in achievements {
            rulesets.entry(spec.ruleset()).or_default().achievements.push(spec);
        }
        Ok(Self { rulesets })
    }

    /// Specs registered for a ruleset, or `None` if it is unknown.
    pub fn for_ruleset(&self, ruleset: &Ruleset) -> Option<&RulesetSpecs> {
        self.rulesets.get(ruleset)
    }

    pub fn rulesets(&self) -> impl Iterator<Item = &Ruleset> {
        self.rulesets.keys()
    }

    pub fn conducts(&self) -> impl Iterator<Item = &ConductSpec> {
        self.rulesets.values().flat_map(|r| r.conducts.iter())
    }

    pub fn achievements(&self) -> impl Iterator<Item = &AchievementSpec> {
        self.rulesets.values().flat_map(|r| r.achievements.iter())
    }

    pub fn has_conduct(&self, short_name: &str) -> bool {
        self.conducts().any(|c| c.short_name == short_name)
    }
}

fn check_unique<S: BitSpec>(kind: &str, specs: &[S]) -> ScoreResult<()> {
    let mut bits = HashSet::new();
    let mut names = HashSet::new();
    for spec in specs {
        let ruleset = spec.ruleset();
        let field = spec.source_field().xlog_key();
        if !bits.insert((ruleset.clone(), spec.source_field(), spec.bit_index())) {
            return Err(ScoreError::DuplicateSpec {
                key: format!("{kind} {ruleset} {field} bit {}", spec.bit_index()),
            });
        }
        if !names.insert((ruleset.clone(), spec.name().to_string())) {
            return Err(ScoreError::DuplicateSpec {
                key: format!("{kind} {ruleset} name '{}'", spec.name()),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conduct(bit: u8, name: &str) -> ConductSpec {
        ConductSpec {
            variant:      "tnnt".into(),
            version:      "3.6.6".into(),
            source_field: SourceField::Conduct,
            bit_index:    bit,
            short_name:   name.into(),
            description:  name.into(),
        }
    }

    #[test]
    fn duplicate_bit_is_rejected() {
        let err = SpecRegistry::new(vec![conduct(3, "heya"), conduct(3, "other")], vec![])
            .unwrap_err();
        assert!(matches!(err, ScoreError::DuplicateSpec { .. }), "got {err}");
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let err = SpecRegistry::new(vec![conduct(0, "heya"), conduct(3, "heya")], vec![])
            .unwrap_err();
        assert!(matches!(err, ScoreError::DuplicateSpec { .. }), "got {err}");
    }

    #[test]
    fn same_bit_in_another_version_is_allowed() {
        let mut newer = conduct(3, "heya");
        newer.version = "3.7.0".into();
        let registry = SpecRegistry::new(vec![conduct(3, "heya"), newer], vec![]).unwrap();
        assert_eq!(registry.rulesets().count(), 2);
        assert!(registry.has_conduct("heya"));
    }

    #[test]
    fn source_field_keys_round_trip() {
        for field in SourceField::ALL {
            assert_eq!(SourceField::from_xlog_key(field.xlog_key()), Some(field));
        }
        assert_eq!(SourceField::from_xlog_key("flags"), None);
    }
}
