//! Opaque pagination cursor.
//!
//! Wire form: a msgpack map `{"ID": <int>}`, base64 (standard alphabet) and,
//! on the GraphQL transport, quoted as a JSON string.

use std::io::Write;

use async_graphql::{InputValueError, InputValueResult, Scalar, ScalarType, Value};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use super::error::EntError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cursor {
    pub id: i64,
}

#[derive(Serialize, Deserialize)]
struct CursorRepr {
    #[serde(rename = "ID")]
    id: i64,
}

impl Cursor {
    pub fn new(id: i64) -> Self {
        Self { id }
    }

    /// Unquoted base64 form.
    pub fn encode(&self) -> String {
        let bytes = rmp_serde::to_vec_named(&CursorRepr { id: self.id })
            .expect("cursor payload is always encodable");
        STANDARD.encode(bytes)
    }

    pub fn decode(s: &str) -> Result<Self, EntError> {
        let bytes = STANDARD
            .decode(s)
            .map_err(|e| EntError::CursorDecode(e.to_string()))?;
        let repr: CursorRepr =
            rmp_serde::from_slice(&bytes).map_err(|e| EntError::CursorDecode(e.to_string()))?;
        Ok(Self { id: repr.id })
    }

    /// Write the quoted transport form.
    pub fn marshal_gql<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(b"\"")?;
        w.write_all(self.encode().as_bytes())?;
        w.write_all(b"\"")
    }

    /// Parse the transport form. Only strings are accepted.
    pub fn unmarshal_gql(v: &serde_json::Value) -> Result<Self, EntError> {
        match v {
            serde_json::Value::String(s) => Self::decode(s),
            other => Err(EntError::CursorType(json_type_name(other).to_string())),
        }
    }
}

fn json_type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[Scalar(name = "Cursor")]
impl ScalarType for Cursor {
    fn parse(value: Value) -> InputValueResult<Self> {
        match &value {
            Value::String(s) => {
                Cursor::decode(s).map_err(|e| InputValueError::custom(e.to_string()))
            }
            _ => Err(InputValueError::expected_type(value)),
        }
    }

    fn to_value(&self) -> Value {
        Value::String(self.encode())
    }
}
