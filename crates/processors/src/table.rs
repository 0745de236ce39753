//! Matching tables
//!
//! An ordered list of glob patterns, each mapped to a target name. Lookups
//! return the target of the first pattern matching the key.

use config_loader::PropertyReader;
use contracts::ContractError;
use glob::Pattern;
use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Clone)]
struct MatchingEntry {
    pattern: Pattern,
    target: String,
}

#[derive(Debug, Clone, Default)]
pub struct MatchingTable {
    entries: Vec<MatchingEntry>,
}

impl MatchingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `pattern -> target`; an entry with the same pattern is retargeted
    pub fn add(&mut self, pattern: &str, target: &str) -> Result<(), glob::PatternError> {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.pattern.as_str() == pattern)
        {
            entry.target = target.to_string();
            return Ok(());
        }
        self.entries.push(MatchingEntry {
            pattern: Pattern::new(pattern)?,
            target: target.to_string(),
        });
        Ok(())
    }

    /// Target of the first entry whose pattern matches `key`
    pub fn find(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.pattern.matches(key))
            .map(|e| e.target.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse the JSON array held by property `key`
    ///
    /// Each element is an object with a non-empty string `input` (the
    /// pattern) and a non-empty string under `target_member`.
    pub fn from_property(
        properties: &PropertyReader<'_>,
        key: &str,
        target_member: &str,
    ) -> Result<Self, ContractError> {
        let raw: Vec<JsonValue> = properties.required_json(key)?;
        let mut table = Self::new();
        for element in &raw {
            let entry = element.as_object().ok_or_else(|| {
                ContractError::config_property(key, "table entries must be JSON objects")
            })?;
            let pattern = entry_string(entry, key, "input")?;
            let target = entry_string(entry, key, target_member)?;
            table.add(pattern, target).map_err(|e| {
                ContractError::config_property(key, format!("bad pattern '{pattern}': {e}"))
            })?;
        }
        Ok(table)
    }
}

fn entry_string<'a>(
    entry: &'a Map<String, JsonValue>,
    key: &str,
    member: &str,
) -> Result<&'a str, ContractError> {
    match entry.get(member) {
        Some(JsonValue::String(s)) if !s.is_empty() => Ok(s),
        Some(JsonValue::String(_)) => Err(ContractError::config_property(
            key,
            format!("value must be non-empty: {member}"),
        )),
        Some(_) => Err(ContractError::config_property(
            key,
            format!("value must be a string: {member}"),
        )),
        None => Err(ContractError::config_property(
            key,
            format!("a table entry is missing a required member: {member}"),
        )),
    }
}
