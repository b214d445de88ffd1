use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use thiserror::Error;

/// Wire type of a schema field, as tagged by the capture backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
}

impl FieldType {
    pub const ALL: [FieldType; 11] = [
        FieldType::Bool,
        FieldType::Int8,
        FieldType::UInt8,
        FieldType::Int16,
        FieldType::UInt16,
        FieldType::Int32,
        FieldType::UInt32,
        FieldType::Int64,
        FieldType::UInt64,
        FieldType::Float,
        FieldType::Double,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Bool => "BOOL",
            FieldType::Int8 => "INT8",
            FieldType::UInt8 => "UINT8",
            FieldType::Int16 => "INT16",
            FieldType::UInt16 => "UINT16",
            FieldType::Int32 => "INT32",
            FieldType::UInt32 => "UINT32",
            FieldType::Int64 => "INT64",
            FieldType::UInt64 => "UINT64",
            FieldType::Float => "FLOAT",
            FieldType::Double => "DOUBLE",
        }
    }

    /// Packed size on the wire. Booleans travel as 32-bit words.
    pub fn byte_width(self) -> usize {
        match self {
            FieldType::Int8 | FieldType::UInt8 => 1,
            FieldType::Int16 | FieldType::UInt16 => 2,
            FieldType::Bool | FieldType::Int32 | FieldType::UInt32 | FieldType::Float => 4,
            FieldType::Int64 | FieldType::UInt64 | FieldType::Double => 8,
        }
    }

    pub fn is_integer(self) -> bool {
        self.signed_bounds().is_some() || self.unsigned_max().is_some()
    }

    pub fn is_float(self) -> bool {
        matches!(self, FieldType::Float | FieldType::Double)
    }

    fn signed_bounds(self) -> Option<(i64, i64)> {
        match self {
            FieldType::Int8 => Some((i8::MIN as i64, i8::MAX as i64)),
            FieldType::Int16 => Some((i16::MIN as i64, i16::MAX as i64)),
            FieldType::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
            FieldType::Int64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    fn unsigned_max(self) -> Option<u64> {
        match self {
            FieldType::UInt8 => Some(u8::MAX as u64),
            FieldType::UInt16 => Some(u16::MAX as u64),
            FieldType::UInt32 => Some(u32::MAX as u64),
            FieldType::UInt64 => Some(u64::MAX),
            _ => None,
        }
    }

    /// Value used for a freshly built message.
    pub fn default_value(self) -> Value {
        match self {
            FieldType::Bool => Value::Bool(false),
            FieldType::Float | FieldType::Double => Value::Float(0.0),
            t if t.unsigned_max().is_some() => Value::UInt(0),
            _ => Value::Int(0),
        }
    }

    /// Input granularity for editors.
    pub fn step(self) -> f64 {
        if self.is_float() { 0.000_000_01 } else { 1.0 }
    }

    /// Decodes a backend JSON value into this type. Booleans are accepted as
    /// JSON booleans or as integers, since the backend packs them as words.
    pub fn decode(self, raw: &Json) -> Option<Value> {
        match self {
            FieldType::Bool => raw
                .as_bool()
                .or_else(|| raw.as_u64().map(|v| v != 0))
                .or_else(|| raw.as_i64().map(|v| v != 0))
                .map(Value::Bool),
            FieldType::Float | FieldType::Double => raw.as_f64().map(Value::Float),
            t => {
                if let Some((min, max)) = t.signed_bounds() {
                    raw.as_i64()
                        .filter(|v| (min..=max).contains(v))
                        .map(Value::Int)
                } else {
                    let max = t.unsigned_max()?;
                    raw.as_u64().filter(|v| *v <= max).map(Value::UInt)
                }
            }
        }
    }

    /// Parses operator-entered text into this type.
    pub fn parse(self, text: &str) -> Result<Value, ParseValueError> {
        let trimmed = text.trim();
        let invalid = || ParseValueError::Invalid {
            field_type: self,
            input: trimmed.to_string(),
        };
        match self {
            FieldType::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
                "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            FieldType::Float | FieldType::Double => {
                let value = trimmed.parse::<f64>().map_err(|_| invalid())?;
                if !value.is_finite() {
                    return Err(ParseValueError::NotFinite {
                        field_type: self,
                        input: trimmed.to_string(),
                    });
                }
                Ok(Value::Float(value))
            }
            t => {
                if let Some((min, max)) = t.signed_bounds() {
                    let value = trimmed.parse::<i64>().map_err(|_| invalid())?;
                    if !(min..=max).contains(&value) {
                        return Err(ParseValueError::OutOfRange {
                            field_type: t,
                            input: trimmed.to_string(),
                        });
                    }
                    Ok(Value::Int(value))
                } else {
                    let max = t.unsigned_max().unwrap_or(u64::MAX);
                    let value = trimmed.parse::<u64>().map_err(|_| invalid())?;
                    if value > max {
                        return Err(ParseValueError::OutOfRange {
                            field_type: t,
                            input: trimmed.to_string(),
                        });
                    }
                    Ok(Value::UInt(value))
                }
            }
        }
    }

    /// Cell text for a value of this type. Single precision floats are
    /// printed at f32 precision so `0.1f32` does not show its f64 expansion.
    pub fn format(self, value: &Value) -> String {
        match (self, value) {
            (FieldType::Float, Value::Float(v)) => (*v as f32).to_string(),
            _ => value.to_string(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseValueError {
    #[error("'{input}' is not a valid {field_type}")]
    Invalid { field_type: FieldType, input: String },
    #[error("'{input}' is out of range for {field_type}")]
    OutOfRange { field_type: FieldType, input: String },
    #[error("'{input}' cannot be sent as {field_type}: JSON has no NaN or infinity")]
    NotFinite { field_type: FieldType, input: String },
}

/// A decoded cell value.
#[derive(Debug, Clone, Copy)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            // Bitwise so an unchanged NaN payload is not reported as a change.
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Value {
    /// False only for NaN and infinite floats.
    pub fn is_finite(&self) -> bool {
        match *self {
            Value::Float(v) => v.is_finite(),
            _ => true,
        }
    }

    /// JSON form of the value. JSON cannot carry NaN or infinity, so a
    /// non-finite float becomes `null`; `FieldType::parse` refuses to produce
    /// one and decoded rows never hold one.
    pub fn to_json(&self) -> Json {
        match *self {
            Value::Bool(v) => Json::Bool(v),
            Value::Int(v) => Json::from(v),
            Value::UInt(v) => Json::from(v),
            Value::Float(v) => serde_json::Number::from_f64(v)
                .map(Json::Number)
                .unwrap_or(Json::Null),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
        }
    }
}

/// One column of a service schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// A sniffed service as listed by the backend. Extra backend fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub host: String,
    pub port: u16,
}

/// `[id, [values...]]` exactly as returned by the messages endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage(pub u64, pub Vec<Json>);

impl RawMessage {
    pub fn id(&self) -> u64 {
        self.0
    }

    pub fn values(&self) -> &[Json] {
        &self.1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStatus {
    pub status: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectRequest {
    pub service: String,
    pub message: Vec<Json>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("message has {found} values, schema expects {expected}")]
    Arity { expected: usize, found: usize },
    #[error("column {column} ({field_type}) cannot hold {value}")]
    Value {
        column: usize,
        field_type: FieldType,
        value: Json,
    },
}

/// A message decoded against its service schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: u64,
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(id: u64, values: Vec<Value>) -> Self {
        Self { id, values }
    }

    pub fn decode(raw: &RawMessage, schema: &[Field]) -> Result<Self, DecodeError> {
        let values = raw.values();
        if values.len() != schema.len() {
            return Err(DecodeError::Arity {
                expected: schema.len(),
                found: values.len(),
            });
        }
        let decoded = schema
            .iter()
            .zip(values)
            .enumerate()
            .map(|(column, (field, value))| {
                field
                    .field_type
                    .decode(value)
                    .ok_or_else(|| DecodeError::Value {
                        column,
                        field_type: field.field_type,
                        value: value.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            id: raw.id(),
            values: decoded,
        })
    }
}
