//! Attribute values and their stored type tags

use serde::ser::Error as _;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{StoreError, StoreResult};

/// Discriminator stored in the `Type` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    String,
    Int,
    Double,
    Boolean,
    Long,
    Float,
    StringArray,
    StringList,
}

impl TypeTag {
    pub const ALL: [TypeTag; 8] = [
        TypeTag::String,
        TypeTag::Int,
        TypeTag::Double,
        TypeTag::Boolean,
        TypeTag::Long,
        TypeTag::Float,
        TypeTag::StringArray,
        TypeTag::StringList,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::String => "string",
            TypeTag::Int => "int",
            TypeTag::Double => "double",
            TypeTag::Boolean => "boolean",
            TypeTag::Long => "long",
            TypeTag::Float => "float",
            TypeTag::StringArray => "string_array",
            TypeTag::StringList => "string_list",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TypeTag {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| StoreError::TypeMismatch {
                expected: "a known type tag".to_string(),
                found: s.to_string(),
            })
    }
}

/// A typed attribute value
///
/// Strings are stored verbatim; every other variant is stored as JSON text.
/// `StringArray` and `StringList` share an encoding but carry distinct tags,
/// so one is never read back as the other.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Int(i32),
    Double(f64),
    Boolean(bool),
    Long(i64),
    Float(f32),
    StringArray(Vec<String>),
    StringList(Vec<String>),
}

impl AttributeValue {
    pub fn tag(&self) -> TypeTag {
        match self {
            AttributeValue::String(_) => TypeTag::String,
            AttributeValue::Int(_) => TypeTag::Int,
            AttributeValue::Double(_) => TypeTag::Double,
            AttributeValue::Boolean(_) => TypeTag::Boolean,
            AttributeValue::Long(_) => TypeTag::Long,
            AttributeValue::Float(_) => TypeTag::Float,
            AttributeValue::StringArray(_) => TypeTag::StringArray,
            AttributeValue::StringList(_) => TypeTag::StringList,
        }
    }

    /// Text written to the `Value` column
    ///
    /// NaN and infinite floats are rejected; JSON has no spelling for them.
    pub fn encode(&self) -> StoreResult<String> {
        let finite = match self {
            AttributeValue::Double(v) => v.is_finite(),
            AttributeValue::Float(v) => v.is_finite(),
            _ => true,
        };
        if !finite {
            return Err(StoreError::SerializationFailure(serde_json::Error::custom(
                format!("{} value is not a finite number", self.tag()),
            )));
        }

        let text = match self {
            AttributeValue::String(v) => v.clone(),
            AttributeValue::Int(v) => serde_json::to_string(v)?,
            AttributeValue::Double(v) => serde_json::to_string(v)?,
            AttributeValue::Boolean(v) => serde_json::to_string(v)?,
            AttributeValue::Long(v) => serde_json::to_string(v)?,
            AttributeValue::Float(v) => serde_json::to_string(v)?,
            AttributeValue::StringArray(v) | AttributeValue::StringList(v) => {
                serde_json::to_string(v)?
            }
        };
        Ok(text)
    }

    /// Inverse of [`encode`](Self::encode) for a given tag
    pub fn decode(tag: TypeTag, text: &str) -> StoreResult<Self> {
        let value = match tag {
            TypeTag::String => AttributeValue::String(text.to_string()),
            TypeTag::Int => AttributeValue::Int(serde_json::from_str(text)?),
            TypeTag::Double => AttributeValue::Double(serde_json::from_str(text)?),
            TypeTag::Boolean => AttributeValue::Boolean(serde_json::from_str(text)?),
            TypeTag::Long => AttributeValue::Long(serde_json::from_str(text)?),
            TypeTag::Float => AttributeValue::Float(serde_json::from_str(text)?),
            TypeTag::StringArray => AttributeValue::StringArray(serde_json::from_str(text)?),
            TypeTag::StringList => AttributeValue::StringList(serde_json::from_str(text)?),
        };
        Ok(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Double(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Boolean(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Long(v)
    }
}

impl From<f32> for AttributeValue {
    fn from(v: f32) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(v: Vec<String>) -> Self {
        AttributeValue::StringList(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_names() {
        for tag in TypeTag::ALL {
            assert_eq!(tag.as_str().parse::<TypeTag>().unwrap(), tag);
        }
        assert!("decimal".parse::<TypeTag>().is_err());
        assert_eq!(TypeTag::StringArray.to_string(), "string_array");
    }

    #[test]
    fn test_strings_pass_through() {
        let value = AttributeValue::from("{\"not\": \"json-encoded\"}");
        assert_eq!(value.encode().unwrap(), "{\"not\": \"json-encoded\"}");
    }

    #[test]
    fn test_json_encoding() {
        assert_eq!(AttributeValue::Int(42).encode().unwrap(), "42");
        assert_eq!(AttributeValue::Boolean(true).encode().unwrap(), "true");
        assert_eq!(AttributeValue::Double(2.5).encode().unwrap(), "2.5");
        assert_eq!(
            AttributeValue::StringArray(vec!["a".to_string(), "b".to_string()])
                .encode()
                .unwrap(),
            "[\"a\",\"b\"]"
        );
    }

    #[test]
    fn test_non_finite_rejected() {
        for value in [
            AttributeValue::Double(f64::NAN),
            AttributeValue::Double(f64::INFINITY),
            AttributeValue::Float(f32::NEG_INFINITY),
        ] {
            assert!(matches!(
                value.encode(),
                Err(StoreError::SerializationFailure(_))
            ));
        }
        assert_eq!(AttributeValue::Float(-0.5).encode().unwrap(), "-0.5");
    }

    #[test]
    fn test_decode_malformed() {
        assert!(AttributeValue::decode(TypeTag::Int, "forty-two").is_err());
        assert!(AttributeValue::decode(TypeTag::StringList, "[1,").is_err());
        assert!(AttributeValue::decode(TypeTag::Int, "3000000000").is_err());
    }
}
