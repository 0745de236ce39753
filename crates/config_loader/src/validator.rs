//! Blueprint validation
//!
//! Rules:
//! - route names unique, processor names non-empty
//! - input names and output names unique within a route
//! - stream and type names non-empty
//! - periodic_period_ms > 0 and history_depth > 0 when set
//! - type names unique, member names unique within a type
//! - port type names declared when any types are declared
//! - sink names non-empty

use std::collections::HashSet;

use contracts::{ContractError, PortConfig, RouteConfig, RoutingBlueprint};

/// Validate a RoutingBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &RoutingBlueprint) -> Result<(), ContractError> {
    validate_engine(blueprint)?;
    validate_types(blueprint)?;
    validate_route_names(blueprint)?;
    for route in &blueprint.routes {
        validate_route(blueprint, route)?;
    }
    validate_sinks(blueprint)?;
    Ok(())
}

fn validate_engine(blueprint: &RoutingBlueprint) -> Result<(), ContractError> {
    if blueprint.engine.default_history_depth == 0 {
        return Err(ContractError::config_validation(
            "engine.default_history_depth",
            "default_history_depth must be > 0",
        ));
    }
    if blueprint.engine.route_queue_capacity == 0 {
        return Err(ContractError::config_validation(
            "engine.route_queue_capacity",
            "route_queue_capacity must be > 0",
        ));
    }
    Ok(())
}

/// Type names unique, member names unique per type
fn validate_types(blueprint: &RoutingBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for ty in &blueprint.types {
        if ty.name.is_empty() {
            return Err(ContractError::config_validation(
                "types[].name",
                "type name cannot be empty",
            ));
        }
        if !seen.insert(ty.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("types[name={}]", ty.name),
                "duplicate type name",
            ));
        }
        let mut members = HashSet::new();
        for member in &ty.members {
            if !members.insert(member.name.as_str()) {
                return Err(ContractError::config_validation(
                    format!("types[{}].members[name={}]", ty.name, member.name),
                    "duplicate member name",
                ));
            }
        }
    }
    Ok(())
}

fn validate_route_names(blueprint: &RoutingBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for route in &blueprint.routes {
        if route.name.is_empty() {
            return Err(ContractError::config_validation(
                "routes[].name",
                "route name cannot be empty",
            ));
        }
        if !seen.insert(route.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("routes[name={}]", route.name),
                "duplicate route name",
            ));
        }
    }
    Ok(())
}

fn validate_route(blueprint: &RoutingBlueprint, route: &RouteConfig) -> Result<(), ContractError> {
    if route.processor.is_empty() {
        return Err(ContractError::config_validation(
            format!("routes[{}].processor", route.name),
            "processor name cannot be empty",
        ));
    }
    if route.periodic_period_ms == Some(0) {
        return Err(ContractError::config_validation(
            format!("routes[{}].periodic_period_ms", route.name),
            "periodic_period_ms must be > 0",
        ));
    }
    validate_ports(blueprint, route, "inputs", &route.inputs)?;
    validate_ports(blueprint, route, "outputs", &route.outputs)?;
    Ok(())
}

fn validate_ports(
    blueprint: &RoutingBlueprint,
    route: &RouteConfig,
    direction: &str,
    ports: &[PortConfig],
) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for port in ports {
        let field = format!("routes[{}].{}[name={}]", route.name, direction, port.name);
        if port.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("routes[{}].{}[].name", route.name, direction),
                "port name cannot be empty",
            ));
        }
        if !seen.insert(port.name.as_str()) {
            return Err(ContractError::config_validation(field, "duplicate port name"));
        }
        if port.stream_name.is_empty() {
            return Err(ContractError::config_validation(
                field,
                "stream_name cannot be empty",
            ));
        }
        if port.type_name.is_empty() {
            return Err(ContractError::config_validation(
                field,
                "type_name cannot be empty",
            ));
        }
        if port.history_depth == Some(0) {
            return Err(ContractError::config_validation(
                field,
                "history_depth must be > 0",
            ));
        }
        if !blueprint.types.is_empty() && !blueprint.types.iter().any(|t| t.name == port.type_name)
        {
            return Err(ContractError::config_validation(
                field,
                format!("type '{}' is not declared", port.type_name),
            ));
        }
    }
    Ok(())
}

fn validate_sinks(blueprint: &RoutingBlueprint) -> Result<(), ContractError> {
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{}].queue_capacity", sink.name),
                "queue_capacity must be > 0",
            ));
        }
    }
    Ok(())
}
