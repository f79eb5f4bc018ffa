//! Compile-time record reflection
//!
//! A record type describes a table row: its column names (in declaration
//! order), the table name and the primary key column. The [`record!`] macro
//! derives all of it from a struct definition at compile time; nothing about a
//! record is discovered at run time.
//!
//! Partial payloads ([`partial!`]) describe a subset of a record's columns and
//! are used for INSERT and UPDATE. Every payload field must name a field of the
//! target record, and its type must be [`Assignable`](super::marshal::Assignable)
//! to the record field's type; both are checked when the payload is declared.
//!
//! ```
//! use rust_record_store::{partial, record, Columns, Table};
//!
//! record! {
//!     pub struct Person as "people" {
//!         pub id: i64,
//!         pub name: String,
//!         pub age: Option<i64>,
//!     }
//! }
//!
//! partial! {
//!     pub struct NewPerson<'a> for Person {
//!         pub name: &'a str,
//!         pub age: i64,
//!     }
//! }
//!
//! assert_eq!(Person::TABLE, "people");
//! assert_eq!(Person::COLUMN_LIST, "id, name, age");
//! assert_eq!(NewPerson::PLACEHOLDERS, "?, ?");
//! assert_eq!(NewPerson::SETTERS, "name = ?, age = ?");
//! ```
//!
//! A payload field the record does not have is rejected:
//!
//! ```compile_fail
//! use rust_record_store::{partial, record};
//!
//! record! { pub struct Person { pub id: i64, pub name: String } }
//!
//! partial! { pub struct Bad for Person { pub nickname: String } }
//! ```
//!
//! So is a field whose type is not assignable:
//!
//! ```compile_fail
//! use rust_record_store::{partial, record};
//!
//! record! { pub struct Person { pub id: i64, pub name: String } }
//!
//! partial! { pub struct Bad for Person { pub name: i64 } }
//! ```
//!
//! A record without its primary key field does not compile either:
//!
//! ```compile_fail
//! use rust_record_store::record;
//!
//! record! { pub struct Tag { pub label: String } }
//! ```

use super::arena::Arena;
use super::error::{DatabaseError, Result};
use super::marshal::FromSql;
use super::value::DatabaseValue;

/// Upper bound on the number of columns a record may declare
pub const MAX_COLUMNS: usize = 64;

const PLACEHOLDER_POOL: &str = "?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, \
?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, \
?, ?, ?, ?, ?, ?, ?, ?, ?";

/// Comma-separated list of `count` placeholders, built at compile time
pub const fn placeholders(count: usize) -> &'static str {
    if count == 0 {
        return "";
    }
    if count > MAX_COLUMNS {
        panic!("record declares more than 64 columns");
    }
    let (head, _) = PLACEHOLDER_POOL.as_bytes().split_at(count * 3 - 2);
    match std::str::from_utf8(head) {
        Ok(list) => list,
        Err(_) => panic!("placeholder pool is not ASCII"),
    }
}

/// Drop the leading `", "` from a list produced by `concat!`
#[doc(hidden)]
pub const fn strip_separator(list: &'static str) -> &'static str {
    let bytes = list.as_bytes();
    if bytes.len() < 2 {
        return "";
    }
    let (_, rest) = bytes.split_at(2);
    match std::str::from_utf8(rest) {
        Ok(list) => list,
        Err(_) => panic!("column list is not valid UTF-8"),
    }
}

/// Compile-time check used by [`partial!`]
#[doc(hidden)]
pub fn assert_assignable<S, T>(_payload: &S, _record: &T)
where
    S: super::marshal::Assignable<T> + ?Sized,
    T: ?Sized,
{
}

/// Ordered column metadata of a record or payload
pub trait Columns {
    /// Column names in declaration order
    const COLUMNS: &'static [&'static str];
    /// `"a, b, c"`
    const COLUMN_LIST: &'static str;
    /// `"a = ?, b = ?, c = ?"`
    const SETTERS: &'static str;
    /// `"?, ?, ?"`
    const PLACEHOLDERS: &'static str = placeholders(Self::COLUMNS.len());

    /// Marshal every field, in column order
    fn to_values<'a>(&self, arena: &'a Arena) -> Result<Vec<DatabaseValue<'a>>>;

    /// Whether `column` is one of this type's columns
    fn has_column(column: &str) -> bool {
        Self::COLUMNS.contains(&column)
    }
}

/// A record type mapped to one table
pub trait Table: Columns {
    /// Table name
    const TABLE: &'static str;
    /// Primary key column, always one of [`Columns::COLUMNS`]
    const PRIMARY_KEY: &'static str;

    /// Fail with `UnknownColumn` unless `column` belongs to this table
    fn check_column(column: &str) -> Result<()> {
        if Self::has_column(column) {
            Ok(())
        } else {
            Err(DatabaseError::unknown_column(Self::TABLE, column))
        }
    }
}

/// Payload whose columns are a subset of `T`'s
pub trait Partial<T: Table + ?Sized>: Columns {}

/// Decode a result row into a host value
pub trait FromRow<'a>: Sized {
    /// Build `Self` from the row's columns
    fn from_row(row: &Row<'a>) -> Result<Self>;
}

/// One result row, its text and blob payloads owned by the session arena
#[derive(Debug, Clone, PartialEq)]
pub struct Row<'a> {
    values: Vec<DatabaseValue<'a>>,
}

impl<'a> Row<'a> {
    /// Wrap already arena-backed values
    pub fn new(values: Vec<DatabaseValue<'a>>) -> Self {
        Self { values }
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value at `index`
    pub fn value(&self, index: usize) -> Result<DatabaseValue<'a>> {
        self.values
            .get(index)
            .copied()
            .ok_or(DatabaseError::ColumnOutOfRange {
                index,
                count: self.values.len(),
            })
    }

    /// Decode the column at `index`
    pub fn get<T: FromSql<'a>>(&self, index: usize) -> Result<T> {
        T::from_sql(self.value(index)?)
    }

    /// All values in column order
    pub fn values(&self) -> &[DatabaseValue<'a>] {
        &self.values
    }

    /// Sequential reader over the row's columns
    pub fn cursor(&self) -> RowCursor<'_, 'a> {
        RowCursor {
            row: self,
            position: 0,
        }
    }
}

/// Reads columns left to right, as record decoding does
pub struct RowCursor<'r, 'a> {
    row: &'r Row<'a>,
    position: usize,
}

impl<'a> RowCursor<'_, 'a> {
    /// Decode the next column
    pub fn next_column<T: FromSql<'a>>(&mut self) -> Result<T> {
        let value = self.row.get(self.position)?;
        self.position += 1;
        Ok(value)
    }
}

impl<'a> FromRow<'a> for Row<'a> {
    fn from_row(row: &Row<'a>) -> Result<Self> {
        Ok(row.clone())
    }
}

macro_rules! tuple_from_row {
    ($($name:ident),+) => {
        impl<'a, $($name: FromSql<'a>),+> FromRow<'a> for ($($name,)+) {
            fn from_row(row: &Row<'a>) -> Result<Self> {
                let mut columns = row.cursor();
                Ok(($(columns.next_column::<$name>()?,)+))
            }
        }
    };
}

tuple_from_row!(A);
tuple_from_row!(A, B);
tuple_from_row!(A, B, C);
tuple_from_row!(A, B, C, D);
tuple_from_row!(A, B, C, D, E);
tuple_from_row!(A, B, C, D, E, F);
tuple_from_row!(A, B, C, D, E, F, G);
tuple_from_row!(A, B, C, D, E, F, G, H);

#[doc(hidden)]
#[macro_export]
macro_rules! __first_of {
    ($first:expr $(, $rest:expr)* $(,)?) => {
        $first
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __key_field {
    ($record:ident;) => {
        &$record.id
    };
    ($record:ident; $key:ident) => {
        &$record.$key
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __columns_impl {
    ($name:ident $(<$lt:lifetime>)? { $($field:ident),* }) => {
        impl $(<$lt>)? $crate::Columns for $name $(<$lt>)? {
            const COLUMNS: &'static [&'static str] = &[$(stringify!($field)),*];
            const COLUMN_LIST: &'static str =
                $crate::core::reflect::strip_separator(concat!($(", ", stringify!($field)),*));
            const SETTERS: &'static str = $crate::core::reflect::strip_separator(concat!(
                $(", ", stringify!($field), " = ?"),*
            ));

            fn to_values<'__arena>(
                &self,
                arena: &'__arena $crate::Arena,
            ) -> $crate::Result<Vec<$crate::DatabaseValue<'__arena>>> {
                Ok(vec![$($crate::ToSql::to_sql(&self.$field, arena)?),*])
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __from_row_impl {
    ($name:ident <$lt:lifetime> { $($field:ident),* }) => {
        impl<$lt> $crate::FromRow<$lt> for $name<$lt> {
            fn from_row(row: &$crate::Row<$lt>) -> $crate::Result<Self> {
                #[allow(unused_mut, unused_variables)]
                let mut columns = row.cursor();
                Ok(Self { $($field: columns.next_column()?),* })
            }
        }
    };
    ($name:ident { $($field:ident),* }) => {
        impl<'__row> $crate::FromRow<'__row> for $name {
            fn from_row(row: &$crate::Row<'__row>) -> $crate::Result<Self> {
                #[allow(unused_mut, unused_variables)]
                let mut columns = row.cursor();
                Ok(Self { $($field: columns.next_column()?),* })
            }
        }
    };
}

/// Declare a record type
///
/// ```text
/// record! {
///     #[derive(Debug)]
///     pub struct Person<'a> as "people" key id {
///         pub id: i64,
///         pub name: &'a str,
///     }
/// }
/// ```
///
/// The table name defaults to the struct name and the primary key to `id`.
/// Fields decode in declaration order, so `SELECT {COLUMN_LIST}` always lines
/// up with the struct.
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident $(<$lt:lifetime>)? $(as $table:literal)? $(key $key:ident)? {
            $($(#[$fmeta:meta])* $fvis:vis $field:ident : $ty:ty),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name $(<$lt>)? {
            $($(#[$fmeta])* $fvis $field: $ty),*
        }

        $crate::__columns_impl!($name $(<$lt>)? { $($field),* });
        $crate::__from_row_impl!($name $(<$lt>)? { $($field),* });

        impl $(<$lt>)? $crate::Table for $name $(<$lt>)? {
            const TABLE: &'static str = $crate::__first_of!($($table,)? stringify!($name));
            const PRIMARY_KEY: &'static str = $crate::__first_of!($(stringify!($key),)? "id");
        }

        impl $(<$lt>)? $crate::Partial<$name $(<$lt>)?> for $name $(<$lt>)? {}

        const _: () = {
            #[allow(dead_code)]
            fn primary_key_is_a_field $(<$lt>)? (record: &$name $(<$lt>)?) {
                let _ = $crate::__key_field!(record; $($key)?);
            }
        };
    };
}

/// Declare a partial payload for a record type
///
/// Every field must exist on the target record with an assignable type. The
/// payload's columns are used verbatim for INSERT column lists and UPDATE
/// setters, so fields left out keep their database defaults.
#[macro_export]
macro_rules! partial {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident $(<$lt:lifetime>)? for $target:ty {
            $($(#[$fmeta:meta])* $fvis:vis $field:ident : $ty:ty),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name $(<$lt>)? {
            $($(#[$fmeta])* $fvis $field: $ty),*
        }

        $crate::__columns_impl!($name $(<$lt>)? { $($field),* });
        $crate::__from_row_impl!($name $(<$lt>)? { $($field),* });

        impl $(<$lt>)? $crate::Partial<$target> for $name $(<$lt>)? {}

        const _: () = {
            #[allow(dead_code)]
            fn fields_are_assignable $(<$lt>)? (record: &$target, payload: &$name $(<$lt>)?) {
                $($crate::core::reflect::assert_assignable(&payload.$field, &record.$field);)*
            }
        };
    };
}

/// Compile-checked column name of a record field
///
/// ```
/// use rust_record_store::{col, record};
///
/// record! { pub struct Person { pub id: i64, pub name: String } }
///
/// assert_eq!(col!(Person, name), "name");
/// ```
///
/// ```compile_fail
/// use rust_record_store::{col, record};
///
/// record! { pub struct Person { pub id: i64, pub name: String } }
///
/// let _ = col!(Person, nickname);
/// ```
#[macro_export]
macro_rules! col {
    ($table:ty, $field:ident) => {{
        #[allow(dead_code)]
        fn column_exists(record: &$table) {
            let _ = &record.$field;
        }
        stringify!($field)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::record! {
        #[derive(Debug, PartialEq)]
        struct Person<'a> as "people" {
            id: i64,
            name: &'a str,
            age: Option<i64>,
        }
    }

    crate::record! {
        struct Account key number {
            number: i64,
            owner: String,
        }
    }

    crate::partial! {
        struct Rename<'a> for Person<'a> {
            name: &'a str,
        }
    }

    crate::partial! {
        struct Birthday for Person<'_> {
            age: Option<i64>,
            name: String,
        }
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(0), "");
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
        assert_eq!(placeholders(MAX_COLUMNS).matches('?').count(), MAX_COLUMNS);
    }

    #[test]
    fn test_record_metadata() {
        assert_eq!(Person::TABLE, "people");
        assert_eq!(Person::PRIMARY_KEY, "id");
        assert_eq!(Person::COLUMNS, &["id", "name", "age"]);
        assert_eq!(Person::COLUMN_LIST, "id, name, age");
        assert_eq!(Person::PLACEHOLDERS, "?, ?, ?");
        assert_eq!(Person::SETTERS, "id = ?, name = ?, age = ?");

        assert_eq!(Account::TABLE, "Account");
        assert_eq!(Account::PRIMARY_KEY, "number");
    }

    #[test]
    fn test_partial_metadata() {
        assert_eq!(Rename::COLUMN_LIST, "name");
        assert_eq!(Rename::SETTERS, "name = ?");
        assert_eq!(Birthday::COLUMNS, &["age", "name"]);
        assert_eq!(Birthday::PLACEHOLDERS, "?, ?");
    }

    #[test]
    fn test_column_checks() {
        assert!(Person::check_column("name").is_ok());
        let err = Person::check_column("nickname").unwrap_err();
        assert_eq!(err.to_string(), "Unknown column `nickname` on table `people`");
        assert_eq!(crate::col!(Person, age), "age");
    }

    #[test]
    fn test_to_values_in_column_order() {
        let arena = Arena::new();
        let payload = Birthday {
            age: None,
            name: "Carol".to_string(),
        };
        let values = payload.to_values(&arena).unwrap();
        assert_eq!(values, vec![DatabaseValue::Null, DatabaseValue::Text("Carol")]);
    }

    #[test]
    fn test_record_from_row() {
        let row = Row::new(vec![
            DatabaseValue::Integer(1),
            DatabaseValue::Text("Alice"),
            DatabaseValue::Null,
        ]);
        let person = Person::from_row(&row).unwrap();
        assert_eq!(
            person,
            Person {
                id: 1,
                name: "Alice",
                age: None
            }
        );

        let (id, name): (i64, String) = FromRow::from_row(&row).unwrap();
        assert_eq!((id, name.as_str()), (1, "Alice"));
    }

    #[test]
    fn test_short_row_is_schema_error() {
        let row = Row::new(vec![DatabaseValue::Integer(1)]);
        let err = Person::from_row(&row).unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::ColumnOutOfRange { index: 1, count: 1 }
        ));
    }

    #[test]
    fn test_null_into_required_field() {
        let row = Row::new(vec![
            DatabaseValue::Integer(1),
            DatabaseValue::Null,
            DatabaseValue::Null,
        ]);
        assert!(matches!(
            Person::from_row(&row),
            Err(DatabaseError::UnexpectedNull { .. })
        ));
    }
}
