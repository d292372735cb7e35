//! Resolves which registered conduct/achievement bits a record has set.
//!
//! Decoding is total: a missing source field simply cannot match, and an
//! unknown (variant, version) yields empty sets with `ruleset_known = false`.

use crate::{
    record::XlogRecord,
    spec_registry::{AchievementSpec, BitSpec, ConductSpec, Ruleset, SpecRegistry},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedSpecs {
    pub conducts:      Vec<ConductSpec>,
    pub achievements:  Vec<AchievementSpec>,
    pub ruleset_known: bool,
}

impl DecodedSpecs {
    pub fn conduct_names(&self) -> impl Iterator<Item = &str> {
        self.conducts.iter().map(|c| c.short_name.as_str())
    }

    pub fn achievement_names(&self) -> impl Iterator<Item = &str> {
        self.achievements.iter().map(|a| a.title.as_str())
    }
}

pub struct BitfieldDecoder<'a> {
    registry: &'a SpecRegistry,
}

impl<'a> BitfieldDecoder<'a> {
    pub fn new(registry: &'a SpecRegistry) -> Self {
        Self { registry }
    }

    pub fn decode(&self, record: &XlogRecord, ruleset: &Ruleset) -> DecodedSpecs {
        let Some(specs) = self.registry.for_ruleset(ruleset) else {
            return DecodedSpecs::default();
        };
        DecodedSpecs {
            conducts:      matching(record, &specs.conducts),
            achievements:  matching(record, &specs.achievements),
            ruleset_known: true,
        }
    }
}

fn matching<S: BitSpec + Clone>(record: &XlogRecord, specs: &[S]) -> Vec<S> {
    specs
        .iter()
        .filter(|spec| is_set(record.bitfield(spec.source_field()), spec.bit_index()))
        .cloned()
        .collect()
}

fn is_set(raw: Option<u64>, bit: u8) -> bool {
    match (raw, 1u64.checked_shl(u32::from(bit))) {
        (Some(value), Some(mask)) => value & mask != 0,
        _ => false,
    }
}
