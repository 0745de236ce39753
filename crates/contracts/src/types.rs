//! Type schemas for stream data
//!
//! The engine's type registry describes each registered type: its members,
//! their kinds and which of them form the instance key.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{DataMap, Value};

/// Member kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Char8,
    String,
    Enum,
    Sequence,
    Struct,
}

impl TypeKind {
    /// Whether a value is acceptable for a member of this kind
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeKind::Boolean, Value::Bool(_)) => true,
            (
                TypeKind::Int8
                | TypeKind::Int16
                | TypeKind::Int32
                | TypeKind::Int64
                | TypeKind::Uint8
                | TypeKind::Uint16
                | TypeKind::Uint32
                | TypeKind::Uint64
                | TypeKind::Enum,
                Value::Int(_) | Value::UInt(_),
            ) => true,
            (TypeKind::Float32 | TypeKind::Float64, Value::Float(_) | Value::Int(_)) => true,
            (TypeKind::Char8 | TypeKind::String, Value::String(_)) => true,
            (TypeKind::Sequence, Value::Sequence(_)) => true,
            (TypeKind::Struct, Value::Struct(_)) => true,
            _ => false,
        }
    }
}

/// One member of a structured type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDescriptor {
    pub name: String,
    pub kind: TypeKind,
    /// Part of the instance key
    #[serde(default)]
    pub key: bool,
}

/// Structured type description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructType {
    /// Registered type name
    pub name: String,
    pub members: Vec<MemberDescriptor>,
}

impl StructType {
    pub fn member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Key members in declaration order
    pub fn key_members(&self) -> impl Iterator<Item = &MemberDescriptor> {
        self.members.iter().filter(|m| m.key)
    }

    pub fn is_keyed(&self) -> bool {
        self.members.iter().any(|m| m.key)
    }

    /// Check a data map against this type
    ///
    /// Every present member must be declared and of an acceptable kind.
    /// Absent members are allowed (they take their default on the wire).
    pub fn check(&self, data: &DataMap) -> Result<(), String> {
        for (name, value) in data {
            let member = self
                .member(name)
                .ok_or_else(|| format!("member '{name}' not declared in type '{}'", self.name))?;
            if !member.kind.accepts(value) {
                return Err(format!(
                    "member '{name}' expects {:?}, got {}",
                    member.kind,
                    value.kind_name()
                ));
            }
        }
        Ok(())
    }

    /// Project a data map onto the key members
    pub fn key_of(&self, data: &DataMap) -> DataMap {
        self.key_members()
            .filter_map(|m| data.get(&m.name).map(|v| (m.name.clone(), v.clone())))
            .collect()
    }
}

/// Registry of types known to the engine, keyed by type name
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, StructType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a type
    pub fn register(&mut self, ty: StructType) {
        self.types.insert(ty.name.clone(), ty);
    }

    pub fn get(&self, name: &str) -> Option<&StructType> {
        self.types.get(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl FromIterator<StructType> for TypeRegistry {
    fn from_iter<I: IntoIterator<Item = StructType>>(iter: I) -> Self {
        let mut registry = Self::new();
        for ty in iter {
            registry.register(ty);
        }
        registry
    }
}
