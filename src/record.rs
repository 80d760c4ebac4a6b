use chrono::{NaiveDateTime, Timelike};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::sync::Arc;

/// A single cell value as read from the backing store
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    /// Date-formatted workbook cell
    DateTime(NaiveDateTime),
    Empty,
}

impl Value {
    /// Build a value from raw cell text; the empty string becomes `Empty`
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            Value::Empty
        } else {
            Value::Text(text)
        }
    }

    /// True for `Empty` and for text that is blank after trimming.
    ///
    /// Blank text is kept verbatim for export but never counts as a present field.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Text(s) => s.trim().is_empty(),
            Value::Number(_) | Value::DateTime(_) => false,
        }
    }

    /// Display form of the value, or `None` when blank
    pub fn present(&self) -> Option<String> {
        if self.is_blank() {
            None
        } else {
            Some(self.to_string())
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            // Whole numbers print without a trailing ".0"
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{:.0}", n),
            Value::Number(n) => write!(f, "{}", n),
            Value::DateTime(dt) if dt.num_seconds_from_midnight() == 0 => {
                write!(f, "{}", dt.format("%Y-%m-%d"))
            }
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Empty => Ok(()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Text(s) => serializer.serialize_str(s),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::DateTime(_) => serializer.collect_str(self),
            Value::Empty => serializer.serialize_none(),
        }
    }
}

/// One row of a table: values positioned by the shared table header
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    header: Arc<[String]>,
    values: Vec<Value>,
}

impl Record {
    /// Create a record, padding with `Empty` (or truncating) to the header width
    pub fn new(header: Arc<[String]>, mut values: Vec<Value>) -> Self {
        values.resize(header.len(), Value::Empty);
        Record { header, values }
    }

    /// Build a standalone record from `(field, value)` pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let (header, values): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Record::new(header.into(), values)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.header
            .iter()
            .position(|name| name == field)
            .map(|idx| &self.values[idx])
    }

    /// Value of the first column
    pub fn first(&self) -> Option<&Value> {
        self.values.first()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.header
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in self.fields() {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::from_text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::from_text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Empty, Into::into)
    }
}
