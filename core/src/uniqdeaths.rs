//! Unique deaths: distinct death strings after normalization and rejection.

use crate::{config::DeathRules, game::Game};
use regex::Regex;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct UniqueDeathCompiler {
    normalizations: Vec<(Regex, String)>,
    rejections:     Vec<Regex>,
}

impl UniqueDeathCompiler {
    pub fn new(rules: &DeathRules) -> Result<Self, regex::Error> {
        let normalizations = rules
            .normalizations
            .iter()
            .map(|n| Ok((Regex::new(&n.pattern)?, n.replacement.clone())))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        let rejections = rules
            .rejections
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { normalizations, rejections })
    }

    pub fn normalize(&self, death: &str) -> String {
        self.normalizations
            .iter()
            .fold(death.to_string(), |acc, (re, rep)| {
                re.replace_all(&acc, rep.as_str()).into_owned()
            })
    }

    pub fn is_rejected(&self, death: &str) -> bool {
        self.rejections.iter().any(|re| re.is_match(death))
    }

    /// Rejection is checked on both the raw and the normalized string.
    pub fn compile<'a, I>(&self, games: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a Game>,
    {
        let raw: BTreeSet<&str> = games.into_iter().map(|g| g.death.as_str()).collect();
        raw.into_iter()
            .filter(|d| !self.is_rejected(d))
            .map(|d| self.normalize(d))
            .filter(|d| !self.is_rejected(d))
            .collect()
    }
}
