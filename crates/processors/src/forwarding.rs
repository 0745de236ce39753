//! Forwarding engines
//!
//! Take every sample from every input and write it to the output selected by
//! a forwarding key. The key is either the input's name or the value of a
//! configured member of the sample. `forwarding_table` maps key patterns to
//! output names; `input_members` maps input name patterns to member names.
//!
//! A sample that cannot be forwarded is logged and skipped.

use config_loader::PropertyReader;
use contracts::{
    lookup_path, parse_member_path, CallbackResult, ContractError, DataMap, Input, Processor,
    Properties, Route,
};
use tracing::{debug, error, instrument};

use crate::table::MatchingTable;

pub const FORWARDING_TABLE: &str = "forwarding_table";
pub const INPUT_MEMBERS: &str = "input_members";

pub const BY_INPUT_NAME: &str = "fwd_by_input_name";
pub const BY_INPUT_VALUE: &str = "fwd_by_input_value";

#[derive(Debug)]
enum ForwardingKey {
    InputName,
    /// Input name pattern -> member holding the key
    InputValue(MatchingTable),
}

#[derive(Debug)]
pub struct ForwardingEngine {
    outputs: MatchingTable,
    key: ForwardingKey,
}

impl ForwardingEngine {
    /// Route samples by the name of the input they arrived on
    pub fn by_input_name(properties: &Properties) -> Result<Self, ContractError> {
        let reader = PropertyReader::new(properties);
        Ok(Self {
            outputs: MatchingTable::from_property(&reader, FORWARDING_TABLE, "output")?,
            key: ForwardingKey::InputName,
        })
    }

    /// Route samples by the value of a member chosen per input
    pub fn by_input_value(properties: &Properties) -> Result<Self, ContractError> {
        let reader = PropertyReader::new(properties);
        Ok(Self {
            outputs: MatchingTable::from_property(&reader, FORWARDING_TABLE, "output")?,
            key: ForwardingKey::InputValue(MatchingTable::from_property(
                &reader,
                INPUT_MEMBERS,
                "member",
            )?),
        })
    }

    fn forwarding_key(&self, input: &dyn Input, data: &DataMap) -> Result<String, ContractError> {
        let members = match &self.key {
            ForwardingKey::InputName => return Ok(input.name().to_string()),
            ForwardingKey::InputValue(members) => members,
        };
        let member = members.find(input.name()).ok_or_else(|| {
            ContractError::processor(format!("no input member entry for '{}'", input.name()))
        })?;
        let path = parse_member_path(member)
            .ok_or_else(|| ContractError::processor(format!("invalid member path '{member}'")))?;
        match lookup_path(data, &path) {
            Some(value) if value.is_scalar() => Ok(value.to_string()),
            Some(value) => Err(ContractError::processor(format!(
                "member '{member}' holds a {}, not a scalar",
                value.kind_name()
            ))),
            None => Err(ContractError::processor(format!(
                "input member not found in sample: {member}"
            ))),
        }
    }

    fn forward(&self, route: &dyn Route, input: &dyn Input, data: &DataMap) -> CallbackResult {
        let key = self.forwarding_key(input, data)?;
        let output_name = self
            .outputs
            .find(&key)
            .ok_or_else(|| ContractError::processor(format!("no entry found for key: {key}")))?;
        debug!(input = %input.name(), %key, output = %output_name, "Forwarding sample");
        route
            .require_output(output_name)?
            .write(data.clone().into())
    }
}

impl Processor for ForwardingEngine {
    #[instrument(name = "forwarding_data_available", skip_all, fields(route = %route.name()))]
    fn on_data_available(&mut self, route: &dyn Route) -> CallbackResult {
        for input in route.inputs() {
            let samples = match input.take_all() {
                Ok(samples) => samples,
                Err(e) => {
                    error!(input = %input.name(), error = %e, "Take failed");
                    continue;
                }
            };
            let valid = samples
                .iter()
                .filter(|s| s.valid_data())
                .filter_map(|s| s.data.as_ref());
            for data in valid {
                if let Err(e) = self.forward(route, input, data) {
                    error!(input = %input.name(), error = %e, "Sample not forwarded");
                }
            }
        }
        Ok(())
    }
}

pub fn create_by_input_name(
    _route: &dyn Route,
    properties: &Properties,
) -> Result<Box<dyn Processor>, ContractError> {
    Ok(Box::new(ForwardingEngine::by_input_name(properties)?))
}

pub fn create_by_input_value(
    _route: &dyn Route,
    properties: &Properties,
) -> Result<Box<dyn Processor>, ContractError> {
    Ok(Box::new(ForwardingEngine::by_input_value(properties)?))
}
