use std::fmt::{self, Display};
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

/// Text layout of timestamp values in both backends (`2024-01-31 17:05:09`).
pub const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// A scalar attribute value.
///
/// The engine is schemaless at this level: columns carry whatever scalar the
/// caller supplied or the backend returned. The key-value backend stores only
/// text, so every variant has a stored-text rendition ([`Value::to_stored`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    Timestamp(OffsetDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Current time as a timestamp value, used for the audit columns.
    pub fn now() -> Self {
        Value::Timestamp(OffsetDateTime::now_utc())
    }

    /// The text form written to the key-value backend.
    ///
    /// Nulls become the empty string (the store has no null), integers and
    /// floats use their shortest decimal form, timestamps use
    /// [`TIMESTAMP_FORMAT`].
    pub fn to_stored(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(v) => if *v { "1" } else { "0" }.into(),
            Value::Integer(v) => itoa::Buffer::new().format(*v).into(),
            Value::Float(v) => ryu::Buffer::new().format(*v).into(),
            Value::Text(v) => v.clone(),
            Value::Blob(v) => String::from_utf8_lossy(v).into_owned(),
            Value::Timestamp(v) => v
                .format(TIMESTAMP_FORMAT)
                .unwrap_or_else(|_| v.to_string()),
        }
    }

    /// Integer view: native integers directly, text parsed as decimal.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Text(v) => atoi::atoi(v.as_bytes()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(v) => (*v).into(),
            Value::Integer(v) => (*v).into(),
            Value::Float(v) => (*v).into(),
            Value::Text(v) => v.clone().into(),
            Value::Blob(v) => String::from_utf8_lossy(v).into_owned().into(),
            Value::Timestamp(..) => self.to_stored().into(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            other => write!(f, "{}", other.to_stored()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl From<OffsetDateTime> for Value {
    fn from(value: OffsetDateTime) -> Self {
        Value::Timestamp(value)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
