//! Dynamic database values
//!
//! [`DatabaseValue`] is the tagged union every backend produces on read and
//! consumes on bind. Text and blob payloads are borrowed: on the bind side from
//! the session arena, on the read side from the driver's row buffer until the
//! statement copies them into the arena with [`DatabaseValue::clone_to_arena`].

use super::arena::Arena;

/// Database value that can hold different types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DatabaseValue<'a> {
    /// Null value
    Null,
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point
    Real(f64),
    /// UTF-8 text
    Text(&'a str),
    /// Binary data
    Blob(&'a [u8]),
}

impl<'a> DatabaseValue<'a> {
    /// Get the value as an i64
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            DatabaseValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as an f64 (integers widen)
    pub fn as_real(&self) -> Option<f64> {
        match self {
            DatabaseValue::Real(v) => Some(*v),
            DatabaseValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get the value as text
    pub fn as_text(&self) -> Option<&'a str> {
        match self {
            DatabaseValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as bytes (text exposes its UTF-8 bytes)
    pub fn as_blob(&self) -> Option<&'a [u8]> {
        match self {
            DatabaseValue::Blob(b) => Some(b),
            DatabaseValue::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            DatabaseValue::Null => "null",
            DatabaseValue::Integer(_) => "integer",
            DatabaseValue::Real(_) => "real",
            DatabaseValue::Text(_) => "text",
            DatabaseValue::Blob(_) => "blob",
        }
    }

    /// Copy this value into the arena, detaching it from the driver's buffers
    pub fn clone_to_arena<'b>(&self, arena: &'b Arena) -> DatabaseValue<'b> {
        match self {
            DatabaseValue::Null => DatabaseValue::Null,
            DatabaseValue::Integer(v) => DatabaseValue::Integer(*v),
            DatabaseValue::Real(v) => DatabaseValue::Real(*v),
            DatabaseValue::Text(s) => DatabaseValue::Text(arena.alloc_str(s)),
            DatabaseValue::Blob(b) => DatabaseValue::Blob(arena.alloc_bytes(b)),
        }
    }
}

impl std::fmt::Display for DatabaseValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseValue::Null => write!(f, "NULL"),
            DatabaseValue::Integer(v) => write!(f, "{}", v),
            DatabaseValue::Real(v) => write!(f, "{}", v),
            DatabaseValue::Text(s) => write!(f, "'{}'", s),
            DatabaseValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for DatabaseValue<'_> {
    fn from(v: i64) -> Self {
        DatabaseValue::Integer(v)
    }
}

impl From<f64> for DatabaseValue<'_> {
    fn from(v: f64) -> Self {
        DatabaseValue::Real(v)
    }
}

impl<'a> From<&'a str> for DatabaseValue<'a> {
    fn from(v: &'a str) -> Self {
        DatabaseValue::Text(v)
    }
}

impl<'a> From<&'a [u8]> for DatabaseValue<'a> {
    fn from(v: &'a [u8]) -> Self {
        DatabaseValue::Blob(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        let val = DatabaseValue::Integer(42);
        assert_eq!(val.as_integer(), Some(42));
        assert_eq!(val.as_real(), Some(42.0));
        assert_eq!(val.as_text(), None);

        let val = DatabaseValue::Text("hello");
        assert_eq!(val.as_text(), Some("hello"));
        assert_eq!(val.as_blob(), Some("hello".as_bytes()));
        assert_eq!(val.as_integer(), None);

        assert!(DatabaseValue::Null.is_null());
        assert!(!DatabaseValue::Real(1.5).is_null());
    }

    #[test]
    fn test_value_type_name() {
        assert_eq!(DatabaseValue::Null.type_name(), "null");
        assert_eq!(DatabaseValue::Integer(1).type_name(), "integer");
        assert_eq!(DatabaseValue::Real(1.0).type_name(), "real");
        assert_eq!(DatabaseValue::Text("x").type_name(), "text");
        assert_eq!(DatabaseValue::Blob(&[0]).type_name(), "blob");
    }

    #[test]
    fn test_clone_to_arena_detaches() {
        let arena = Arena::new();
        let copied = {
            let buffer = String::from("driver buffer");
            let value = DatabaseValue::Text(&buffer);
            value.clone_to_arena(&arena)
        };
        assert_eq!(copied, DatabaseValue::Text("driver buffer"));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(DatabaseValue::Null.to_string(), "NULL");
        assert_eq!(DatabaseValue::Text("Bob").to_string(), "'Bob'");
        assert_eq!(DatabaseValue::Blob(&[1, 2]).to_string(), "<2 bytes>");
    }
}
