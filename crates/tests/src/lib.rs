//! # Integration Tests
//!
//! End-to-end and conformance tests.
//!
//! Covers:
//! - Route lifecycle conformance, checked from inside every callback
//! - Read/take/selector semantics as seen by a Processor
//! - Built-in processors driven from blueprints

#[cfg(test)]
mod conformance;
#[cfg(test)]
mod harness;
#[cfg(test)]
mod scenarios;

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
        let _ = contracts::Selector::all();
    }
}
