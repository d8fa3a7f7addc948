//! Raw rows as returned by the change source.
//!
//! The extraction queries join several tables with `LEFT JOIN`, so a
//! row is a loosely shaped bag of named fields where any field may be
//! `NULL`. [`Row`] keeps the fields ordered as the source produced
//! them and offers typed accessors that distinguish "field absent
//! from the row" from "field present but NULL".

use chrono::NaiveDateTime;

use crate::error::RowError;

/// A single value inside a [`Row`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// SQL `NULL`.
    Null,
    /// Text, uuids included.
    Text(String),
    /// Floating point, used for ratings.
    Float(f64),
    /// Timestamp without time zone.
    Timestamp(NaiveDateTime),
}

impl FieldValue {
    /// Returns true for SQL `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl<T> From<Option<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => FieldValue::Null,
        }
    }
}

/// An ordered record of named fields from the relational store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    fields: Vec<(String, FieldValue)>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append, mainly for tests and adapters.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.push(name, value);
        self
    }

    /// Append a field, keeping source order.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Look up a field by name. First match wins if the source ever
    /// returns duplicate column names.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Number of fields in the row.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the row carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn require(&self, name: &str) -> Result<&FieldValue, RowError> {
        self.get(name)
            .ok_or_else(|| RowError::MissingField(name.to_string()))
    }

    /// Text field that must be present and non-null.
    pub fn get_str(&self, name: &str) -> Result<&str, RowError> {
        match self.require(name)? {
            FieldValue::Text(value) => Ok(value),
            FieldValue::Null => Err(RowError::NullField(name.to_string())),
            _ => Err(RowError::WrongType {
                field: name.to_string(),
                expected: "string",
            }),
        }
    }

    /// Text field that must be present but may be `NULL`.
    pub fn get_opt_str(&self, name: &str) -> Result<Option<&str>, RowError> {
        match self.require(name)? {
            FieldValue::Text(value) => Ok(Some(value)),
            FieldValue::Null => Ok(None),
            _ => Err(RowError::WrongType {
                field: name.to_string(),
                expected: "string",
            }),
        }
    }

    /// Float field that must be present but may be `NULL`.
    pub fn get_opt_f64(&self, name: &str) -> Result<Option<f64>, RowError> {
        match self.require(name)? {
            FieldValue::Float(value) => Ok(Some(*value)),
            FieldValue::Null => Ok(None),
            _ => Err(RowError::WrongType {
                field: name.to_string(),
                expected: "float",
            }),
        }
    }

    /// Timestamp field that must be present and non-null.
    pub fn get_timestamp(&self, name: &str) -> Result<NaiveDateTime, RowError> {
        match self.require(name)? {
            FieldValue::Timestamp(value) => Ok(*value),
            FieldValue::Null => Err(RowError::NullField(name.to_string())),
            _ => Err(RowError::WrongType {
                field: name.to_string(),
                expected: "timestamp",
            }),
        }
    }
}

impl FromIterator<(String, FieldValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Row {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn sample_row() -> Row {
        let modified = NaiveDate::from_ymd_opt(2024, 5, 4)
            .unwrap()
            .and_hms_micro_opt(12, 30, 0, 250)
            .unwrap();
        Row::new()
            .with("fw_id", "f1")
            .with("title", "Solaris")
            .with("description", FieldValue::Null)
            .with("rating", 7.9)
            .with("modified", modified)
    }

    #[test]
    fn test_get_preserves_first_match() {
        let row = Row::new().with("id", "a").with("id", "b");
        assert_eq!(row.get("id"), Some(&FieldValue::Text("a".to_string())));
    }

    #[test]
    fn test_get_str_returns_text() {
        let row = sample_row();
        assert_eq!(row.get_str("title").unwrap(), "Solaris");
    }

    #[test]
    fn test_get_str_rejects_null() {
        let row = sample_row();
        assert_eq!(
            row.get_str("description"),
            Err(RowError::NullField("description".to_string()))
        );
    }

    #[test]
    fn test_missing_field_is_not_null_field() {
        let row = sample_row();
        assert_eq!(
            row.get_opt_str("no_such_field"),
            Err(RowError::MissingField("no_such_field".to_string()))
        );
        assert_eq!(row.get_opt_str("description").unwrap(), None);
    }

    #[test]
    fn test_get_opt_f64_handles_null_and_value() {
        let row = sample_row();
        assert_eq!(row.get_opt_f64("rating").unwrap(), Some(7.9));
        let row = Row::new().with("rating", FieldValue::Null);
        assert_eq!(row.get_opt_f64("rating").unwrap(), None);
    }

    #[test]
    fn test_wrong_type_is_reported() {
        let row = sample_row();
        assert_eq!(
            row.get_timestamp("title"),
            Err(RowError::WrongType {
                field: "title".to_string(),
                expected: "timestamp",
            })
        );
    }

    #[test]
    fn test_option_converts_to_null() {
        let row = Row::new().with("description", None::<String>);
        assert!(row.get("description").unwrap().is_null());
    }
}
