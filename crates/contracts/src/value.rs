//! Value - dynamic sample payload
//!
//! Sample data is a map from member name to [`Value`]. Values are a tagged
//! union of scalars, sequences and nested maps; the shape of a given stream's
//! data is described separately by its [`StructType`](crate::StructType).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Member name -> value
pub type DataMap = BTreeMap<String, Value>;

/// Dynamic member value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// Signed integers of any width, and enums
    Int(i64),
    /// Unsigned integers that do not fit `i64`
    UInt(u64),
    /// float32 / float64
    Float(f64),
    /// string / wstring / char
    String(String),
    /// Arrays and sequences
    Sequence(Vec<Value>),
    /// Nested structures
    Struct(DataMap),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Numeric view of any integer or float member
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&DataMap> {
        match self {
            Value::Struct(map) => Some(map),
            _ => None,
        }
    }

    /// Whether this is a scalar (not a sequence or struct)
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Sequence(_) | Value::Struct(_))
    }

    /// Name of the variant, for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Struct(_) => "struct",
        }
    }
}

/// Scalars render the way a forwarding key expects them: booleans as `1`/`0`,
/// numbers in decimal, strings verbatim. Composite values render as JSON-ish text.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", u8::from(*b)),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:.6}"),
            Value::String(s) => f.write_str(s),
            Value::Sequence(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Struct(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(i64::from(v))
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(signed) => Value::Int(signed),
            Err(_) => Value::UInt(v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Sequence(v)
    }
}

impl From<DataMap> for Value {
    fn from(v: DataMap) -> Self {
        Value::Struct(v)
    }
}

/// One step of a member path such as `position.coords[2]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Member(String),
    Index(usize),
}

/// Parse a dotted member path with optional `[n]` indices
///
/// Returns `None` for an empty path, an empty member name or a malformed index.
pub fn parse_member_path(path: &str) -> Option<Vec<PathSegment>> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let (name, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if name.is_empty() {
            return None;
        }
        segments.push(PathSegment::Member(name.to_string()));
        while !rest.is_empty() {
            let close = rest.find(']')?;
            if !rest.starts_with('[') {
                return None;
            }
            let index = rest[1..close].trim().parse().ok()?;
            segments.push(PathSegment::Index(index));
            rest = &rest[close + 1..];
        }
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments)
    }
}

/// Resolve a member path against a data map
pub fn lookup_path<'a>(data: &'a DataMap, path: &[PathSegment]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = match first {
        PathSegment::Member(name) => data.get(name)?,
        PathSegment::Index(_) => return None,
    };
    for segment in rest {
        current = match (segment, current) {
            (PathSegment::Member(name), Value::Struct(map)) => map.get(name)?,
            (PathSegment::Index(i), Value::Sequence(items)) => items.get(*i)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Build a [`DataMap`] from `key => value` pairs
///
/// ```
/// use contracts::{data_map, Value};
///
/// let data = data_map! { "x" => 1, "color" => "BLUE" };
/// assert_eq!(data.get("x"), Some(&Value::Int(1)));
/// ```
#[macro_export]
macro_rules! data_map {
    () => { $crate::DataMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::DataMap::new();
        $(map.insert(($key).to_string(), $crate::Value::from($value));)+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_json_shapes() {
        let json = r#"{"color":"RED","x":10,"ratio":0.5,"tags":[1,2],"inner":{"ok":true}}"#;
        let data: DataMap = serde_json::from_str(json).unwrap();
        assert_eq!(data["color"], Value::String("RED".into()));
        assert_eq!(data["x"], Value::Int(10));
        assert_eq!(data["ratio"], Value::Float(0.5));
        assert_eq!(data["tags"].as_sequence().unwrap().len(), 2);
        assert_eq!(data["inner"].as_struct().unwrap()["ok"], Value::Bool(true));
    }

    #[test]
    fn test_display_forwarding_key_format() {
        assert_eq!(Value::Bool(true).to_string(), "1");
        assert_eq!(Value::Int(-4).to_string(), "-4");
        assert_eq!(Value::Float(1.5).to_string(), "1.500000");
        assert_eq!(Value::from("abc").to_string(), "abc");
    }

    #[test]
    fn test_member_path_lookup() {
        let data = data_map! {
            "pos" => data_map! { "coords" => vec![Value::Int(1), Value::Int(7)] },
        };
        let path = parse_member_path("pos.coords[1]").unwrap();
        assert_eq!(lookup_path(&data, &path), Some(&Value::Int(7)));

        let missing = parse_member_path("pos.coords[5]").unwrap();
        assert_eq!(lookup_path(&data, &missing), None);
    }

    #[test]
    fn test_malformed_paths() {
        assert!(parse_member_path("").is_none());
        assert!(parse_member_path("a..b").is_none());
        assert!(parse_member_path("a[x]").is_none());
        assert!(parse_member_path("a[1").is_none());
    }

    #[test]
    fn test_large_unsigned_stays_unsigned() {
        assert_eq!(Value::from(u64::MAX), Value::UInt(u64::MAX));
        assert_eq!(Value::from(5u64), Value::Int(5));
    }
}
