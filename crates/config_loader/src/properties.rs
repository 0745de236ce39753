//! Typed access to processor properties
//!
//! Factories receive [`Properties`] as plain strings. `PropertyReader` turns
//! lookups and conversions into `ContractError::ConfigProperty` errors that
//! name the offending key.

use std::str::FromStr;

use contracts::{ContractError, Properties};
use serde::de::DeserializeOwned;

/// Read-only view over a property map
#[derive(Debug, Clone, Copy)]
pub struct PropertyReader<'a> {
    properties: &'a Properties,
}

impl<'a> PropertyReader<'a> {
    pub fn new(properties: &'a Properties) -> Self {
        Self { properties }
    }

    /// Value of `key`, failing when absent
    pub fn required(&self, key: &str) -> Result<&'a str, ContractError> {
        self.optional(key)
            .ok_or_else(|| ContractError::config_property(key, "required property not found"))
    }

    pub fn optional(&self, key: &str) -> Option<&'a str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Required value converted with `FromStr`
    pub fn parse<T>(&self, key: &str) -> Result<T, ContractError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.required(key)?;
        raw.trim()
            .parse()
            .map_err(|e| ContractError::config_property(key, format!("cannot parse '{raw}': {e}")))
    }

    /// Optional value converted with `FromStr`, `default` when absent
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ContractError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(_) => self.parse(key),
            None => Ok(default),
        }
    }

    /// Required value holding a JSON document
    pub fn required_json<T: DeserializeOwned>(&self, key: &str) -> Result<T, ContractError> {
        let raw = self.required(key)?;
        serde_json::from_str(raw)
            .map_err(|e| ContractError::config_property(key, format!("invalid JSON: {e}")))
    }

    /// Optional value holding a JSON document
    pub fn optional_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ContractError> {
        match self.optional(key) {
            Some(_) => self.required_json(key).map(Some),
            None => Ok(None),
        }
    }
}
