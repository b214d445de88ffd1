use serde_json::Value as Json;
use sniffer_sdk::{Field, FieldType, ParseValueError, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InjectError {
    #[error("no field named '{0}'")]
    UnknownField(String),
    #[error("field '{field}': {source}")]
    Parse {
        field: String,
        #[source]
        source: ParseValueError,
    },
    #[error("prefill has {found} values, schema expects {expected}")]
    Arity { expected: usize, found: usize },
    #[error("prefill value {value} does not fit field '{field}' ({field_type})")]
    Value {
        field: String,
        field_type: FieldType,
        value: Json,
    },
    #[error("expected name=value, got '{0}'")]
    Assignment(String),
    #[error("field '{0}' holds a value JSON cannot carry")]
    NotFinite(String),
}

/// Submission state shown next to the form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InjectStatus {
    #[default]
    Idle,
    Sending,
    Sent,
    Failed,
}

impl InjectStatus {
    pub fn label(self) -> &'static str {
        match self {
            InjectStatus::Idle => "",
            InjectStatus::Sending => "Sending...",
            InjectStatus::Sent => "Sent!",
            InjectStatus::Failed => "Error!!!",
        }
    }

    pub fn is_busy(self) -> bool {
        self == InjectStatus::Sending
    }
}

/// A message being composed for injection, one typed value per schema field.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectDraft {
    schema: Vec<Field>,
    values: Vec<Value>,
}

impl InjectDraft {
    pub fn from_schema(schema: Vec<Field>) -> Self {
        let values = schema.iter().map(|f| f.field_type.default_value()).collect();
        Self { schema, values }
    }

    /// Builds a draft from prefill values. A leading id column, as produced by
    /// the web viewer's row links, is dropped.
    pub fn from_prefill(schema: Vec<Field>, mut raw: Vec<Json>) -> Result<Self, InjectError> {
        if raw.len() == schema.len() + 1 {
            raw.remove(0);
        }
        if raw.len() != schema.len() {
            return Err(InjectError::Arity {
                expected: schema.len(),
                found: raw.len(),
            });
        }
        let values = schema
            .iter()
            .zip(&raw)
            .map(|(field, value)| {
                field
                    .field_type
                    .decode(value)
                    .ok_or_else(|| InjectError::Value {
                        field: field.name.clone(),
                        field_type: field.field_type,
                        value: value.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { schema, values })
    }

    /// Builds a draft from a decoded table row.
    pub fn from_row_values(schema: Vec<Field>, values: Vec<Value>) -> Result<Self, InjectError> {
        if values.len() != schema.len() {
            return Err(InjectError::Arity {
                expected: schema.len(),
                found: values.len(),
            });
        }
        if let Some((field, _)) = schema.iter().zip(&values).find(|(_, v)| !v.is_finite()) {
            return Err(InjectError::NotFinite(field.name.clone()));
        }
        Ok(Self { schema, values })
    }

    pub fn schema(&self) -> &[Field] {
        &self.schema
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.position(name).map(|idx| &self.values[idx])
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.schema.iter().position(|f| f.name == name)
    }

    pub fn set(&mut self, name: &str, text: &str) -> Result<(), InjectError> {
        let idx = self
            .position(name)
            .ok_or_else(|| InjectError::UnknownField(name.to_string()))?;
        let value = self.schema[idx]
            .field_type
            .parse(text)
            .map_err(|source| InjectError::Parse {
                field: name.to_string(),
                source,
            })?;
        self.values[idx] = value;
        Ok(())
    }

    /// Applies a `name=value` assignment.
    pub fn apply(&mut self, assignment: &str) -> Result<(), InjectError> {
        let (name, text) = parse_assignment(assignment)?;
        self.set(name, text)
    }

    pub fn to_message(&self) -> Vec<Json> {
        self.values.iter().map(Value::to_json).collect()
    }

    /// `(label, value, step)` per field, for display.
    pub fn lines(&self) -> impl Iterator<Item = (String, String, f64)> + '_ {
        self.schema.iter().zip(&self.values).map(|(field, value)| {
            (
                format!("{} ({})", field.name, field.field_type.as_str().to_lowercase()),
                field.field_type.format(value),
                field.field_type.step(),
            )
        })
    }
}

pub fn parse_assignment(text: &str) -> Result<(&str, &str), InjectError> {
    text.split_once('=')
        .map(|(name, value)| (name.trim(), value))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| InjectError::Assignment(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Vec<Field> {
        vec![
            Field::new("on", FieldType::Bool),
            Field::new("level", FieldType::Int8),
            Field::new("gain", FieldType::Double),
        ]
    }

    #[test]
    fn defaults_come_from_schema() {
        let draft = InjectDraft::from_schema(schema());
        assert_eq!(draft.to_message(), vec![json!(false), json!(0), json!(0.0)]);
    }

    #[test]
    fn prefill_accepts_values_with_or_without_id() {
        let plain = InjectDraft::from_prefill(schema(), vec![json!(1), json!(-4), json!(2.5)]).unwrap();
        assert_eq!(plain.get("on"), Some(&Value::Bool(true)));
        let with_id =
            InjectDraft::from_prefill(schema(), vec![json!(9), json!(true), json!(-4), json!(2.5)])
                .unwrap();
        assert_eq!(plain, with_id);

        let err = InjectDraft::from_prefill(schema(), vec![json!(true)]).unwrap_err();
        assert_eq!(err, InjectError::Arity { expected: 3, found: 1 });
    }

    #[test]
    fn set_parses_per_field_type() {
        let mut draft = InjectDraft::from_schema(schema());
        draft.apply("level=-12").unwrap();
        draft.set("gain", "0.125").unwrap();
        draft.set("on", "true").unwrap();
        assert_eq!(draft.to_message(), vec![json!(true), json!(-12), json!(0.125)]);
    }

    #[test]
    fn set_rejects_out_of_range_and_unknown() {
        let mut draft = InjectDraft::from_schema(schema());
        assert!(matches!(
            draft.set("level", "200"),
            Err(InjectError::Parse {
                source: ParseValueError::OutOfRange { .. },
                ..
            })
        ));
        assert_eq!(
            draft.set("nope", "1"),
            Err(InjectError::UnknownField("nope".into()))
        );
        assert!(matches!(draft.apply("level"), Err(InjectError::Assignment(_))));
        assert_eq!(draft.get("level"), Some(&Value::Int(0)));
    }

    #[test]
    fn row_values_become_the_draft() {
        let values = vec![Value::Bool(true), Value::Int(-3), Value::Float(1.5)];
        let draft = InjectDraft::from_row_values(schema(), values).unwrap();
        assert_eq!(draft.to_message(), vec![json!(true), json!(-3), json!(1.5)]);

        let err = InjectDraft::from_row_values(schema(), vec![Value::Bool(true)]).unwrap_err();
        assert_eq!(err, InjectError::Arity { expected: 3, found: 1 });

        let nan = vec![Value::Bool(true), Value::Int(0), Value::Float(f64::NAN)];
        assert_eq!(
            InjectDraft::from_row_values(schema(), nan),
            Err(InjectError::NotFinite("gain".into()))
        );
    }

    #[test]
    fn status_labels() {
        assert_eq!(InjectStatus::Sending.label(), "Sending...");
        assert_eq!(InjectStatus::Sent.label(), "Sent!");
        assert_eq!(InjectStatus::Failed.label(), "Error!!!");
        assert!(InjectStatus::Sending.is_busy());
    }

    #[test]
    fn lines_show_type_and_step() {
        let draft = InjectDraft::from_schema(schema());
        let lines: Vec<_> = draft.lines().collect();
        assert_eq!(lines[1].0, "level (int8)");
        assert_eq!(lines[1].2, 1.0);
        assert_eq!(lines[2].2, 0.000_000_01);
    }
}
