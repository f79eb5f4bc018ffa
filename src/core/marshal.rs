//! Host/database value marshaling
//!
//! [`ToSql`] turns a host value into a [`DatabaseValue`] whose text and blob
//! payloads live in the session [`Arena`]; [`FromSql`] performs the inverse and
//! rejects values whose kind does not fit the host type. NULL decodes only into
//! `Option<_>`.
//!
//! [`Assignable`] is the compile-time compatibility rule used by partial
//! payloads (see [`partial!`](crate::partial)):
//!
//! - identical types are assignable;
//! - string-like types (`String`, `&str`, `Box<str>`, `Cow<str>`) are mutually assignable;
//! - integers are assignable to `f32` and `f64`;
//! - any assignable `A` is assignable to `Option<B>`, and `Option<A>` to `Option<B>`;
//! - [`Null`] is assignable to every `Option<_>`.

use super::arena::Arena;
use super::error::{DatabaseError, Result};
use super::value::DatabaseValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::borrow::Cow;

/// Text layout used for `NaiveDateTime` columns (SQLite `datetime()` compatible)
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Convert a host value into a dynamic database value
pub trait ToSql {
    /// Marshal `self`, copying any owned bytes into `arena`
    fn to_sql<'a>(&self, arena: &'a Arena) -> Result<DatabaseValue<'a>>;
}

/// Decode a dynamic database value into a host value
pub trait FromSql<'a>: Sized {
    /// Decode `value`, failing when its kind does not fit `Self`
    fn from_sql(value: DatabaseValue<'a>) -> Result<Self>;
}

/// Marker for "always NULL" payload fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Null;

/// Aggregate value stored as serialized JSON text
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    /// Unwrap the inner value
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::ops::Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

fn unexpected<T>(expected: &'static str, value: &DatabaseValue<'_>) -> Result<T> {
    match value {
        DatabaseValue::Null => Err(DatabaseError::UnexpectedNull { expected }),
        other => Err(DatabaseError::decode(expected, other.type_name())),
    }
}

// ----------------------------------------------------------------------------
// ToSql
// ----------------------------------------------------------------------------

impl<T: ToSql + ?Sized> ToSql for &T {
    fn to_sql<'a>(&self, arena: &'a Arena) -> Result<DatabaseValue<'a>> {
        (**self).to_sql(arena)
    }
}

impl<T: ToSql> ToSql for Option<T> {
    fn to_sql<'a>(&self, arena: &'a Arena) -> Result<DatabaseValue<'a>> {
        match self {
            Some(value) => value.to_sql(arena),
            None => Ok(DatabaseValue::Null),
        }
    }
}

impl ToSql for Null {
    fn to_sql<'a>(&self, _arena: &'a Arena) -> Result<DatabaseValue<'a>> {
        Ok(DatabaseValue::Null)
    }
}

impl ToSql for DatabaseValue<'_> {
    fn to_sql<'a>(&self, arena: &'a Arena) -> Result<DatabaseValue<'a>> {
        Ok(self.clone_to_arena(arena))
    }
}

impl ToSql for bool {
    fn to_sql<'a>(&self, _arena: &'a Arena) -> Result<DatabaseValue<'a>> {
        Ok(DatabaseValue::Integer(i64::from(*self)))
    }
}

macro_rules! integer_to_sql {
    ($($ty:ty),*) => {$(
        impl ToSql for $ty {
            fn to_sql<'a>(&self, _arena: &'a Arena) -> Result<DatabaseValue<'a>> {
                Ok(DatabaseValue::Integer(i64::from(*self)))
            }
        }
    )*};
}

integer_to_sql!(i8, i16, i32, i64, u8, u16, u32);

impl ToSql for u64 {
    fn to_sql<'a>(&self, _arena: &'a Arena) -> Result<DatabaseValue<'a>> {
        i64::try_from(*self)
            .map(DatabaseValue::Integer)
            .map_err(|_| DatabaseError::out_of_range(self, "i64"))
    }
}

impl ToSql for usize {
    fn to_sql<'a>(&self, _arena: &'a Arena) -> Result<DatabaseValue<'a>> {
        i64::try_from(*self)
            .map(DatabaseValue::Integer)
            .map_err(|_| DatabaseError::out_of_range(self, "i64"))
    }
}

impl ToSql for f32 {
    fn to_sql<'a>(&self, _arena: &'a Arena) -> Result<DatabaseValue<'a>> {
        Ok(DatabaseValue::Real(f64::from(*self)))
    }
}

impl ToSql for f64 {
    fn to_sql<'a>(&self, _arena: &'a Arena) -> Result<DatabaseValue<'a>> {
        Ok(DatabaseValue::Real(*self))
    }
}

impl ToSql for str {
    fn to_sql<'a>(&self, arena: &'a Arena) -> Result<DatabaseValue<'a>> {
        Ok(DatabaseValue::Text(arena.alloc_str(self)))
    }
}

impl ToSql for String {
    fn to_sql<'a>(&self, arena: &'a Arena) -> Result<DatabaseValue<'a>> {
        self.as_str().to_sql(arena)
    }
}

impl ToSql for Box<str> {
    fn to_sql<'a>(&self, arena: &'a Arena) -> Result<DatabaseValue<'a>> {
        (**self).to_sql(arena)
    }
}

impl ToSql for Cow<'_, str> {
    fn to_sql<'a>(&self, arena: &'a Arena) -> Result<DatabaseValue<'a>> {
        self.as_ref().to_sql(arena)
    }
}

impl ToSql for [u8] {
    fn to_sql<'a>(&self, arena: &'a Arena) -> Result<DatabaseValue<'a>> {
        Ok(DatabaseValue::Blob(arena.alloc_bytes(self)))
    }
}

impl ToSql for Vec<u8> {
    fn to_sql<'a>(&self, arena: &'a Arena) -> Result<DatabaseValue<'a>> {
        self.as_slice().to_sql(arena)
    }
}

impl<T: Serialize> ToSql for Json<T> {
    fn to_sql<'a>(&self, arena: &'a Arena) -> Result<DatabaseValue<'a>> {
        let text = serde_json::to_string(&self.0)?;
        Ok(DatabaseValue::Text(arena.alloc_string(text)))
    }
}

impl ToSql for serde_json::Value {
    fn to_sql<'a>(&self, arena: &'a Arena) -> Result<DatabaseValue<'a>> {
        let text = serde_json::to_string(self)?;
        Ok(DatabaseValue::Text(arena.alloc_string(text)))
    }
}

impl ToSql for NaiveDate {
    fn to_sql<'a>(&self, arena: &'a Arena) -> Result<DatabaseValue<'a>> {
        let text = self.format(DATE_FORMAT).to_string();
        Ok(DatabaseValue::Text(arena.alloc_string(text)))
    }
}

impl ToSql for NaiveDateTime {
    fn to_sql<'a>(&self, arena: &'a Arena) -> Result<DatabaseValue<'a>> {
        let text = self.format(DATETIME_FORMAT).to_string();
        Ok(DatabaseValue::Text(arena.alloc_string(text)))
    }
}

impl ToSql for DateTime<Utc> {
    fn to_sql<'a>(&self, arena: &'a Arena) -> Result<DatabaseValue<'a>> {
        Ok(DatabaseValue::Text(arena.alloc_string(self.to_rfc3339())))
    }
}

// ----------------------------------------------------------------------------
// FromSql
// ----------------------------------------------------------------------------

impl<'a, T: FromSql<'a>> FromSql<'a> for Option<T> {
    fn from_sql(value: DatabaseValue<'a>) -> Result<Self> {
        match value {
            DatabaseValue::Null => Ok(None),
            other => T::from_sql(other).map(Some),
        }
    }
}

impl<'a> FromSql<'a> for DatabaseValue<'a> {
    fn from_sql(value: DatabaseValue<'a>) -> Result<Self> {
        Ok(value)
    }
}

impl<'a> FromSql<'a> for i64 {
    fn from_sql(value: DatabaseValue<'a>) -> Result<Self> {
        match value {
            DatabaseValue::Integer(v) => Ok(v),
            other => unexpected("i64", &other),
        }
    }
}

macro_rules! integer_from_sql {
    ($($ty:ty),*) => {$(
        impl<'a> FromSql<'a> for $ty {
            fn from_sql(value: DatabaseValue<'a>) -> Result<Self> {
                match value {
                    DatabaseValue::Integer(v) => <$ty>::try_from(v)
                        .map_err(|_| DatabaseError::out_of_range(v, stringify!($ty))),
                    other => unexpected(stringify!($ty), &other),
                }
            }
        }
    )*};
}

integer_from_sql!(i8, i16, i32, u8, u16, u32, u64, usize);

impl<'a> FromSql<'a> for bool {
    fn from_sql(value: DatabaseValue<'a>) -> Result<Self> {
        match value {
            DatabaseValue::Integer(v) => Ok(v != 0),
            other => unexpected("bool", &other),
        }
    }
}

impl<'a> FromSql<'a> for f64 {
    fn from_sql(value: DatabaseValue<'a>) -> Result<Self> {
        match value {
            DatabaseValue::Real(v) => Ok(v),
            DatabaseValue::Integer(v) => Ok(v as f64),
            other => unexpected("f64", &other),
        }
    }
}

impl<'a> FromSql<'a> for f32 {
    fn from_sql(value: DatabaseValue<'a>) -> Result<Self> {
        match value {
            DatabaseValue::Real(v) => Ok(v as f32),
            DatabaseValue::Integer(v) => Ok(v as f32),
            other => unexpected("f32", &other),
        }
    }
}

impl<'a> FromSql<'a> for &'a str {
    fn from_sql(value: DatabaseValue<'a>) -> Result<Self> {
        match value {
            DatabaseValue::Text(s) => Ok(s),
            other => unexpected("text", &other),
        }
    }
}

impl<'a> FromSql<'a> for String {
    fn from_sql(value: DatabaseValue<'a>) -> Result<Self> {
        <&str>::from_sql(value).map(str::to_owned)
    }
}

impl<'a> FromSql<'a> for Box<str> {
    fn from_sql(value: DatabaseValue<'a>) -> Result<Self> {
        <&str>::from_sql(value).map(Box::from)
    }
}

impl<'a> FromSql<'a> for Cow<'a, str> {
    fn from_sql(value: DatabaseValue<'a>) -> Result<Self> {
        <&str>::from_sql(value).map(Cow::Borrowed)
    }
}

impl<'a> FromSql<'a> for &'a [u8] {
    fn from_sql(value: DatabaseValue<'a>) -> Result<Self> {
        match value {
            DatabaseValue::Blob(b) => Ok(b),
            DatabaseValue::Text(s) => Ok(s.as_bytes()),
            other => unexpected("blob", &other),
        }
    }
}

impl<'a> FromSql<'a> for Vec<u8> {
    fn from_sql(value: DatabaseValue<'a>) -> Result<Self> {
        <&[u8]>::from_sql(value).map(<[u8]>::to_vec)
    }
}

impl<'a, T: DeserializeOwned> FromSql<'a> for Json<T> {
    fn from_sql(value: DatabaseValue<'a>) -> Result<Self> {
        match value {
            DatabaseValue::Text(s) => Ok(Json(serde_json::from_str(s)?)),
            DatabaseValue::Blob(b) => Ok(Json(serde_json::from_slice(b)?)),
            other => unexpected("json", &other),
        }
    }
}

impl<'a> FromSql<'a> for serde_json::Value {
    fn from_sql(value: DatabaseValue<'a>) -> Result<Self> {
        Json::<serde_json::Value>::from_sql(value).map(Json::into_inner)
    }
}

impl<'a> FromSql<'a> for NaiveDate {
    fn from_sql(value: DatabaseValue<'a>) -> Result<Self> {
        let text = <&str>::from_sql(value)?;
        NaiveDate::parse_from_str(text, DATE_FORMAT)
            .map_err(|_| DatabaseError::decode("date", format!("text '{}'", text)))
    }
}

impl<'a> FromSql<'a> for NaiveDateTime {
    fn from_sql(value: DatabaseValue<'a>) -> Result<Self> {
        let text = <&str>::from_sql(value)?;
        NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
            .map_err(|_| DatabaseError::decode("datetime", format!("text '{}'", text)))
    }
}

impl<'a> FromSql<'a> for DateTime<Utc> {
    fn from_sql(value: DatabaseValue<'a>) -> Result<Self> {
        let text = <&str>::from_sql(value)?;
        DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| DatabaseError::decode("timestamp", format!("text '{}'", text)))
    }
}

// ----------------------------------------------------------------------------
// Assignability
// ----------------------------------------------------------------------------

/// `Self` may be written into a column whose record field has type `Target`
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not assignable to a column of type `{Target}`",
    label = "found `{Self}`, expected a value assignable to `{Target}`",
    note = "assignable: identical types, string-like types to each other, integers into floats, `T` into `Option<T>`, `Null` into any `Option<_>`"
)]
pub trait Assignable<Target: ?Sized> {}

// Optional columns are handled once here so that downstream types only ever
// implement `Assignable` with themselves as `Self`.
impl<T> Assignable<Option<T>> for Null {}
impl<A: Assignable<B>, B> Assignable<Option<B>> for Option<A> {}

macro_rules! assignable_scalar {
    ($($ty:ty),* $(,)?) => {$(
        impl Assignable<$ty> for $ty {}
        impl Assignable<Option<$ty>> for $ty {}
    )*};
}

assignable_scalar!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    usize,
    f32,
    f64,
    Vec<u8>,
    NaiveDate,
    NaiveDateTime,
    DateTime<Utc>,
    serde_json::Value,
);

macro_rules! assignable_numeric {
    ($($src:ty => $($dst:ty),+;)*) => {$($(
        impl Assignable<$dst> for $src {}
        impl Assignable<Option<$dst>> for $src {}
    )+)*};
}

// Integers may be written into REAL columns
assignable_numeric! {
    i8 => f32, f64;
    i16 => f32, f64;
    i32 => f32, f64;
    i64 => f32, f64;
    u8 => f32, f64;
    u16 => f32, f64;
    u32 => f32, f64;
    u64 => f32, f64;
    usize => f32, f64;
}

macro_rules! assignable_string_like {
    ($(<$($lt:lifetime),*> $src:ty => $dst:ty;)*) => {$(
        impl<$($lt),*> Assignable<$dst> for $src {}
        impl<$($lt),*> Assignable<Option<$dst>> for $src {}
    )*};
}

assignable_string_like! {
    <> String => String;
    <'b> String => &'b str;
    <> String => Box<str>;
    <'b> String => Cow<'b, str>;
    <'a> &'a str => String;
    <'a, 'b> &'a str => &'b str;
    <'a> &'a str => Box<str>;
    <'a, 'b> &'a str => Cow<'b, str>;
    <> Box<str> => String;
    <'b> Box<str> => &'b str;
    <> Box<str> => Box<str>;
    <'b> Box<str> => Cow<'b, str>;
    <'a> Cow<'a, str> => String;
    <'a, 'b> Cow<'a, str> => &'b str;
    <'a> Cow<'a, str> => Box<str>;
    <'a, 'b> Cow<'a, str> => Cow<'b, str>;
}

impl<'a, 'b> Assignable<&'b [u8]> for &'a [u8] {}
impl<'a, 'b> Assignable<Option<&'b [u8]>> for &'a [u8] {}

impl<T> Assignable<Json<T>> for Json<T> {}
impl<T> Assignable<Option<Json<T>>> for Json<T> {}

/// Declare a field-less enum stored by its zero-based ordinal
///
/// Only unit variants without explicit discriminants are accepted, so the
/// ordinals are always dense. Enums that need any other mapping implement
/// [`ToSql`], [`FromSql`] and [`Assignable`] by hand.
///
/// ```
/// rust_record_store::sql_enum! {
///     #[derive(Debug, Clone, Copy, PartialEq)]
///     pub enum Role { Admin, Member, Guest }
/// }
///
/// assert_eq!(Role::Guest.ordinal(), 2);
/// ```
///
/// ```compile_fail
/// rust_record_store::sql_enum! {
///     pub enum Sparse { Low = 1, High = 10 }
/// }
/// ```
#[macro_export]
macro_rules! sql_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Zero-based position of this variant
            pub fn ordinal(&self) -> i64 {
                match self {
                    $($name::$variant => $name::$variant as i64),+
                }
            }
        }

        impl $crate::ToSql for $name {
            fn to_sql<'__a>(
                &self,
                _arena: &'__a $crate::Arena,
            ) -> $crate::Result<$crate::DatabaseValue<'__a>> {
                Ok($crate::DatabaseValue::Integer(self.ordinal()))
            }
        }

        impl<'__a> $crate::FromSql<'__a> for $name {
            fn from_sql(value: $crate::DatabaseValue<'__a>) -> $crate::Result<Self> {
                let ordinal = <i64 as $crate::FromSql>::from_sql(value)?;
                $(
                    if ordinal == $name::$variant as i64 {
                        return Ok($name::$variant);
                    }
                )+
                Err($crate::DatabaseError::out_of_range(ordinal, stringify!($name)))
            }
        }

        impl $crate::Assignable<$name> for $name {}
        impl $crate::Assignable<::core::option::Option<$name>> for $name {}
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn roundtrip<T>(value: T) -> T
    where
        T: ToSql + for<'a> FromSql<'a>,
    {
        let arena = Arena::new();
        let dynamic = value.to_sql(&arena).unwrap();
        T::from_sql(dynamic).unwrap()
    }

    #[test]
    fn test_scalar_roundtrips() {
        assert_eq!(roundtrip(42i64), 42);
        assert_eq!(roundtrip(-7i32), -7);
        assert_eq!(roundtrip(3.5f64), 3.5);
        assert!(roundtrip(true));
        assert_eq!(roundtrip(String::from("Alice")), "Alice");
        assert_eq!(roundtrip(vec![0u8, 159, 255]), vec![0u8, 159, 255]);
        assert_eq!(roundtrip(Option::<i64>::None), None);
        assert_eq!(roundtrip(Some(9i64)), Some(9));
    }

    #[test]
    fn test_text_is_copied_into_arena() {
        let arena = Arena::new();
        let value = {
            let owned = String::from("transient");
            owned.to_sql(&arena).unwrap()
        };
        assert_eq!(value, DatabaseValue::Text("transient"));
        let borrowed: &str = FromSql::from_sql(value).unwrap();
        assert_eq!(borrowed, "transient");
    }

    #[test]
    fn test_decode_mismatch() {
        let err = i64::from_sql(DatabaseValue::Text("1")).unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Decode {
                expected: "i64",
                ..
            }
        ));

        let err = String::from_sql(DatabaseValue::Integer(1)).unwrap_err();
        assert!(matches!(err, DatabaseError::Decode { .. }));

        let err = f64::from_sql(DatabaseValue::Blob(&[1])).unwrap_err();
        assert!(matches!(err, DatabaseError::Decode { .. }));
    }

    #[test]
    fn test_null_only_into_option() {
        let err = i64::from_sql(DatabaseValue::Null).unwrap_err();
        assert!(matches!(err, DatabaseError::UnexpectedNull { expected: "i64" }));

        let value: Option<String> = FromSql::from_sql(DatabaseValue::Null).unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_integer_range_checks() {
        let err = u8::from_sql(DatabaseValue::Integer(300)).unwrap_err();
        assert!(matches!(err, DatabaseError::OutOfRange { target: "u8", .. }));

        let arena = Arena::new();
        assert!(u64::MAX.to_sql(&arena).is_err());
        assert_eq!(
            (i64::MAX as u64).to_sql(&arena).unwrap(),
            DatabaseValue::Integer(i64::MAX)
        );
    }

    #[test]
    fn test_real_accepts_integer() {
        assert_eq!(f64::from_sql(DatabaseValue::Integer(2)).unwrap(), 2.0);
        assert!(i64::from_sql(DatabaseValue::Real(2.0)).is_err());
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Settings {
        theme: String,
        tags: Vec<String>,
    }

    #[test]
    fn test_json_marshaled_as_text() {
        let arena = Arena::new();
        let settings = Json(Settings {
            theme: "dark".to_string(),
            tags: vec!["a".to_string(), "b".to_string()],
        });
        let value = settings.to_sql(&arena).unwrap();
        assert_eq!(
            value,
            DatabaseValue::Text(r#"{"theme":"dark","tags":["a","b"]}"#)
        );
        let decoded: Json<Settings> = FromSql::from_sql(value).unwrap();
        assert_eq!(decoded, settings);

        let err = Json::<Settings>::from_sql(DatabaseValue::Text("not json")).unwrap_err();
        assert!(matches!(err, DatabaseError::Json(_)));
    }

    #[test]
    fn test_chrono_as_text() {
        let arena = Arena::new();
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(date.to_sql(&arena).unwrap(), DatabaseValue::Text("2024-02-29"));
        assert_eq!(roundtrip(date), date);

        let stamp = date.and_hms_opt(13, 45, 7).unwrap();
        assert_eq!(
            stamp.to_sql(&arena).unwrap(),
            DatabaseValue::Text("2024-02-29 13:45:07")
        );
        assert_eq!(roundtrip(stamp), stamp);
    }

    crate::sql_enum! {
        #[derive(Debug, Clone, Copy, PartialEq)]
        enum Level { Low, Mid, High }
    }

    #[test]
    fn test_dense_enum_by_ordinal() {
        let arena = Arena::new();
        assert_eq!(Level::High.to_sql(&arena).unwrap(), DatabaseValue::Integer(2));
        assert_eq!(Level::from_sql(DatabaseValue::Integer(1)).unwrap(), Level::Mid);
        assert!(matches!(
            Level::from_sql(DatabaseValue::Integer(3)),
            Err(DatabaseError::OutOfRange { .. })
        ));
    }

    fn assert_assignable<S: Assignable<T>, T>() {}

    #[test]
    fn test_assignability_rule() {
        assert_assignable::<i64, i64>();
        assert_assignable::<i64, Option<i64>>();
        assert_assignable::<Null, Option<String>>();
        assert_assignable::<&'static str, String>();
        assert_assignable::<String, &'static str>();
        assert_assignable::<&'static str, Option<String>>();
        assert_assignable::<Option<Box<str>>, Option<Cow<'static, str>>>();
        assert_assignable::<Json<Settings>, Option<Json<Settings>>>();
        assert_assignable::<Level, Option<Level>>();
        assert_assignable::<i64, f64>();
        assert_assignable::<u8, Option<f32>>();
        assert_assignable::<Option<i32>, Option<f64>>();
        assert_assignable::<Option<Level>, Option<Level>>();
        assert_assignable::<Null, Option<Level>>();
        assert_assignable::<Option<&'static str>, Option<String>>();
        assert_assignable::<Option<&'static [u8]>, Option<&'static [u8]>>();
    }
}
