//! Instance and writer identity
//!
//! Handles are derived from the canonical JSON of the key members, so the
//! same key maps to the same handle on every stream of the process.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use contracts::{DataMap, InstanceHandle, StructType};

/// Handle of the instance a data map belongs to
///
/// Without a registered type (or with a keyless one) every sample of a stream
/// belongs to the same instance.
pub fn instance_handle_for(ty: Option<&StructType>, data: &DataMap) -> InstanceHandle {
    let key = match ty {
        Some(ty) => ty.key_of(data),
        None => DataMap::new(),
    };
    key_handle(&key)
}

/// Handle for an explicit key projection
pub fn key_handle(key: &DataMap) -> InstanceHandle {
    // DataMap is ordered, so its JSON form is canonical
    let canonical = serde_json::to_string(key).unwrap_or_default();
    digest(b"instance", canonical.as_bytes())
}

/// Publication handle of a named writer (`route/output`)
pub fn writer_handle(writer: &str) -> InstanceHandle {
    digest(b"writer", writer.as_bytes())
}

fn digest(domain: &[u8], bytes: &[u8]) -> InstanceHandle {
    let mut value = [0u8; 16];
    for (seed, chunk) in value.chunks_mut(8).enumerate() {
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        domain.hash(&mut hasher);
        bytes.hash(&mut hasher);
        chunk.copy_from_slice(&hasher.finish().to_be_bytes());
    }
    InstanceHandle::new(value)
}
