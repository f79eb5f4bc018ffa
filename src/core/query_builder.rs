//! Type-safe SQL query builder
//!
//! [`Query`] is a fluent, immutable builder bound to a session. Every
//! accumulation method returns a new builder, so a partially built query can be
//! reused as the base for several others. SQL is rendered only when a terminal
//! operation runs, using the record type's compile-time column metadata.
//! Filter values are always bound as parameters, never interpolated into the
//! SQL text.

use super::arena::Arena;
use super::connection::Connection;
use super::error::{DatabaseError, Result};
use super::marshal::{FromSql, ToSql};
use super::reflect::{Columns, FromRow, Partial, Table};
use super::statement::Statement;
use super::value::DatabaseValue;
use std::fmt::Write as _;
use std::marker::PhantomData;
use std::rc::Rc;
use tracing::debug;

/// SQL comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Equal to (=)
    Eq,
    /// Not equal to (!=)
    Ne,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Le,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Ge,
    /// LIKE pattern matching
    Like,
    /// IS NULL
    IsNull,
    /// IS NOT NULL
    IsNotNull,
}

impl Operator {
    fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }

    /// Whether the operator compares against a bound value
    pub fn takes_value(&self) -> bool {
        !matches!(self, Operator::IsNull | Operator::IsNotNull)
    }
}

/// ORDER BY direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    /// Ascending order
    Asc,
    /// Descending order
    Desc,
}

impl OrderDirection {
    fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Logic {
    And,
    Or,
}

/// WHERE clause condition
#[derive(Clone)]
struct Condition<'s> {
    column: &'static str,
    operator: Operator,
    value: Option<Rc<dyn ToSql + 's>>,
}

/// Query over table `T`, decoding rows as `R`
pub struct Query<'s, T, R = T> {
    connection: &'s Connection,
    arena: &'s Arena,
    conditions: Vec<Condition<'s>>,
    logic: Logic,
    order_by: Vec<(&'static str, OrderDirection)>,
    limit: Option<u64>,
    offset: Option<u64>,
    marker: PhantomData<fn() -> (T, R)>,
}

impl<T, R> Clone for Query<'_, T, R> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection,
            arena: self.arena,
            conditions: self.conditions.clone(),
            logic: self.logic,
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            marker: PhantomData,
        }
    }
}

impl<T, R> std::fmt::Debug for Query<'_, T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let conditions: Vec<_> = self
            .conditions
            .iter()
            .map(|c| (c.column, c.operator))
            .collect();
        f.debug_struct("Query")
            .field("conditions", &conditions)
            .field("logic", &self.logic)
            .field("order_by", &self.order_by)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<'s, T: Table> Query<'s, T> {
    pub(crate) fn new(connection: &'s Connection, arena: &'s Arena) -> Self {
        Self {
            connection,
            arena,
            conditions: Vec::new(),
            logic: Logic::And,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            marker: PhantomData,
        }
    }
}

impl<'s, T: Table, R> Query<'s, T, R> {
    fn with(&self, update: impl FnOnce(&mut Self)) -> Self {
        let mut next = self.clone();
        update(&mut next);
        next
    }

    fn push_condition(
        &self,
        column: &'static str,
        operator: Operator,
        value: Option<Rc<dyn ToSql + 's>>,
    ) -> Self {
        self.with(|query| {
            query.conditions.push(Condition {
                column,
                operator,
                value,
            })
        })
    }

    /// Add a WHERE condition
    ///
    /// For [`Operator::IsNull`] and [`Operator::IsNotNull`] the value is
    /// ignored.
    #[must_use]
    pub fn filter<V: ToSql + 's>(&self, column: &'static str, operator: Operator, value: V) -> Self {
        if operator.takes_value() {
            self.push_condition(column, operator, Some(Rc::new(value)))
        } else {
            self.push_condition(column, operator, None)
        }
    }

    /// Add a WHERE column = value condition
    #[must_use]
    pub fn where_eq<V: ToSql + 's>(&self, column: &'static str, value: V) -> Self {
        self.filter(column, Operator::Eq, value)
    }

    /// Add a WHERE column != value condition
    #[must_use]
    pub fn where_ne<V: ToSql + 's>(&self, column: &'static str, value: V) -> Self {
        self.filter(column, Operator::Ne, value)
    }

    /// Add a WHERE column < value condition
    #[must_use]
    pub fn where_lt<V: ToSql + 's>(&self, column: &'static str, value: V) -> Self {
        self.filter(column, Operator::Lt, value)
    }

    /// Add a WHERE column <= value condition
    #[must_use]
    pub fn where_le<V: ToSql + 's>(&self, column: &'static str, value: V) -> Self {
        self.filter(column, Operator::Le, value)
    }

    /// Add a WHERE column > value condition
    #[must_use]
    pub fn where_gt<V: ToSql + 's>(&self, column: &'static str, value: V) -> Self {
        self.filter(column, Operator::Gt, value)
    }

    /// Add a WHERE column >= value condition
    #[must_use]
    pub fn where_ge<V: ToSql + 's>(&self, column: &'static str, value: V) -> Self {
        self.filter(column, Operator::Ge, value)
    }

    /// Add a WHERE column LIKE pattern condition
    #[must_use]
    pub fn where_like<V: ToSql + 's>(&self, column: &'static str, pattern: V) -> Self {
        self.filter(column, Operator::Like, pattern)
    }

    /// Add a WHERE column IS NULL condition
    #[must_use]
    pub fn where_null(&self, column: &'static str) -> Self {
        self.push_condition(column, Operator::IsNull, None)
    }

    /// Add a WHERE column IS NOT NULL condition
    #[must_use]
    pub fn where_not_null(&self, column: &'static str) -> Self {
        self.push_condition(column, Operator::IsNotNull, None)
    }

    /// Use OR logic for WHERE conditions instead of AND
    #[must_use]
    pub fn or_where(&self) -> Self {
        self.with(|query| query.logic = Logic::Or)
    }

    /// Add ORDER BY clause
    #[must_use]
    pub fn order_by(&self, column: &'static str, direction: OrderDirection) -> Self {
        self.with(|query| query.order_by.push((column, direction)))
    }

    /// Add ORDER BY ASC
    #[must_use]
    pub fn order_by_asc(&self, column: &'static str) -> Self {
        self.order_by(column, OrderDirection::Asc)
    }

    /// Add ORDER BY DESC
    #[must_use]
    pub fn order_by_desc(&self, column: &'static str) -> Self {
        self.order_by(column, OrderDirection::Desc)
    }

    /// Add LIMIT clause
    #[must_use]
    pub fn limit(&self, limit: u64) -> Self {
        self.with(|query| query.limit = Some(limit))
    }

    /// Add OFFSET clause
    #[must_use]
    pub fn offset(&self, offset: u64) -> Self {
        self.with(|query| query.offset = Some(offset))
    }

    /// Project rows onto another column set of the same table
    #[must_use]
    pub fn select<P: Partial<T>>(&self) -> Query<'s, T, P> {
        Query {
            connection: self.connection,
            arena: self.arena,
            conditions: self.conditions.clone(),
            logic: self.logic,
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            marker: PhantomData,
        }
    }

    fn render_where(&self, sql: &mut String) -> Result<()> {
        let separator = match self.logic {
            Logic::And => " AND ",
            Logic::Or => " OR ",
        };
        for (i, condition) in self.conditions.iter().enumerate() {
            T::check_column(condition.column)?;
            sql.push_str(if i == 0 { " WHERE " } else { separator });
            sql.push_str(condition.column);
            sql.push(' ');
            sql.push_str(condition.operator.as_sql());
            if condition.value.is_some() {
                sql.push_str(" ?");
            }
        }
        Ok(())
    }

    fn render_order(&self, sql: &mut String) -> Result<()> {
        for (i, (column, direction)) in self.order_by.iter().enumerate() {
            T::check_column(column)?;
            sql.push_str(if i == 0 { " ORDER BY " } else { ", " });
            sql.push_str(column);
            sql.push(' ');
            sql.push_str(direction.as_sql());
        }
        Ok(())
    }

    fn render_window(&self, sql: &mut String) {
        // SQLite needs a LIMIT before OFFSET; -1 means unbounded
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => {
                let _ = write!(sql, " LIMIT {} OFFSET {}", limit, offset);
            }
            (Some(limit), None) => {
                let _ = write!(sql, " LIMIT {}", limit);
            }
            (None, Some(offset)) => {
                let _ = write!(sql, " LIMIT -1 OFFSET {}", offset);
            }
            (None, None) => {}
        }
    }

    fn check_aggregate_column(column: &str) -> Result<()> {
        if column == "*" {
            Ok(())
        } else {
            T::check_column(column)
        }
    }

    /// Prepare `sql`, binding `leading` first and the filter values after it
    fn prepare(&self, sql: &str, leading: &[DatabaseValue<'_>]) -> Result<Statement<'s>> {
        debug!(sql, table = T::TABLE, "query");
        let mut statement = self.connection.prepare(sql)?;
        for (index, value) in leading.iter().enumerate() {
            statement.bind(index, *value)?;
        }
        let filter_values = self.conditions.iter().filter_map(|c| c.value.as_ref());
        for (offset, value) in filter_values.enumerate() {
            statement.bind_value(leading.len() + offset, &**value, self.arena)?;
        }
        Ok(statement)
    }

    fn aggregate<V: FromSql<'s>>(&self, function: &str, column: &str) -> Result<Option<V>> {
        Self::check_aggregate_column(column)?;
        let mut sql = format!("SELECT {}({}) FROM {}", function, column, T::TABLE);
        self.render_where(&mut sql)?;
        let mut statement = self.prepare(&sql, &[])?;
        match statement.next_row(self.arena)? {
            Some(row) => row.get(0),
            None => Ok(None),
        }
    }

    /// Number of rows with a non-NULL `column` (`"*"` counts every row)
    pub fn count(self, column: &str) -> Result<u64> {
        let count: Option<i64> = self.aggregate("COUNT", column)?;
        let count = count.unwrap_or(0);
        u64::try_from(count).map_err(|_| DatabaseError::out_of_range(count, "u64"))
    }

    /// Smallest value of `column`, or `None` when no row matches
    pub fn min<V: FromSql<'s>>(self, column: &str) -> Result<Option<V>> {
        self.aggregate("MIN", column)
    }

    /// Largest value of `column`, or `None` when no row matches
    pub fn max<V: FromSql<'s>>(self, column: &str) -> Result<Option<V>> {
        self.aggregate("MAX", column)
    }

    /// Whether any row matches the filters
    pub fn exists(self) -> Result<bool> {
        let mut sql = format!("SELECT 1 FROM {}", T::TABLE);
        self.render_where(&mut sql)?;
        sql.push_str(" LIMIT 1");
        let mut statement = self.prepare(&sql, &[])?;
        Ok(statement.next_row(self.arena)?.is_some())
    }

    /// Insert `data` and return the generated row id
    ///
    /// Filters, ordering and limits do not apply to inserts.
    pub fn insert<D: Partial<T>>(self, data: &D) -> Result<i64> {
        let sql = if D::COLUMNS.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", T::TABLE)
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                T::TABLE,
                D::COLUMN_LIST,
                D::PLACEHOLDERS
            )
        };
        let values = data.to_values(self.arena)?;
        self.prepare(&sql, &values)?.exec()?;
        let id = self.connection.last_insert_rowid();
        debug!(table = T::TABLE, id, "inserted");
        Ok(id)
    }

    /// Set `data`'s columns on every matching row, returning rows affected
    pub fn update<D: Partial<T>>(self, data: &D) -> Result<u64> {
        if D::COLUMNS.is_empty() {
            return Ok(0);
        }
        let mut sql = format!("UPDATE {} SET {}", T::TABLE, D::SETTERS);
        self.render_where(&mut sql)?;
        let values = data.to_values(self.arena)?;
        self.prepare(&sql, &values)?.exec()?;
        let rows = self.connection.rows_affected();
        debug!(table = T::TABLE, rows, "updated");
        Ok(rows)
    }

    /// Delete every matching row, returning rows affected
    pub fn delete(self) -> Result<u64> {
        let mut sql = format!("DELETE FROM {}", T::TABLE);
        self.render_where(&mut sql)?;
        self.prepare(&sql, &[])?.exec()?;
        let rows = self.connection.rows_affected();
        debug!(table = T::TABLE, rows, "deleted");
        Ok(rows)
    }
}

impl<'s, T: Table, R: Columns> Query<'s, T, R> {
    /// Render the SELECT this query would run, without running it
    pub fn to_sql(&self) -> Result<String> {
        let mut sql = format!("SELECT {} FROM {}", R::COLUMN_LIST, T::TABLE);
        self.render_where(&mut sql)?;
        self.render_order(&mut sql)?;
        self.render_window(&mut sql);
        Ok(sql)
    }
}

impl<'s, T: Table, R: Columns + FromRow<'s>> Query<'s, T, R> {
    /// Every matching row, in the requested order
    pub fn find_all(self) -> Result<Vec<R>> {
        let sql = self.to_sql()?;
        self.prepare(&sql, &[])?.collect(self.arena)
    }

    /// The first matching row
    pub fn first(self) -> Result<Option<R>> {
        let query = self.limit(1);
        let sql = query.to_sql()?;
        query.prepare(&sql, &[])?.next(query.arena)
    }

    /// The row whose primary key equals `id`
    pub fn find(self, id: impl ToSql + 's) -> Result<Option<R>> {
        self.where_eq(T::PRIMARY_KEY, id).first()
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::backends::{SqliteDriver, SqliteOptions};
    use crate::Session;

    crate::record! {
        #[derive(Debug, PartialEq)]
        struct User as "users" {
            id: i64,
            name: String,
            status: String,
            age: i64,
            deleted_at: Option<String>,
        }
    }

    crate::partial! {
        #[derive(Debug, PartialEq)]
        struct UserName for User {
            id: i64,
            name: String,
        }
    }

    fn session() -> Session<'static> {
        Session::open::<SqliteDriver>(&SqliteOptions::memory()).unwrap()
    }

    #[test]
    fn test_select_basic() {
        let session = session();
        let query = session.query::<User>().to_sql().unwrap();
        assert_eq!(
            query,
            "SELECT id, name, status, age, deleted_at FROM users"
        );
    }

    #[test]
    fn test_select_projection() {
        let session = session();
        let query = session.query::<User>().select::<UserName>().to_sql().unwrap();
        assert_eq!(query, "SELECT id, name FROM users");
    }

    #[test]
    fn test_select_where() {
        let session = session();
        let query = session
            .query::<User>()
            .select::<UserName>()
            .where_eq("id", 42)
            .where_eq("status", "active")
            .to_sql()
            .unwrap();
        assert_eq!(
            query,
            "SELECT id, name FROM users WHERE id = ? AND status = ?"
        );
    }

    #[test]
    fn test_select_order_limit() {
        let session = session();
        let query = session
            .query::<User>()
            .select::<UserName>()
            .order_by_desc("age")
            .limit(10)
            .to_sql()
            .unwrap();
        assert_eq!(query, "SELECT id, name FROM users ORDER BY age DESC LIMIT 10");

        let query = session
            .query::<User>()
            .select::<UserName>()
            .offset(5)
            .to_sql()
            .unwrap();
        assert_eq!(query, "SELECT id, name FROM users LIMIT -1 OFFSET 5");
    }

    #[test]
    fn test_select_where_null_and_or() {
        let session = session();
        let query = session
            .query::<User>()
            .select::<UserName>()
            .where_null("deleted_at")
            .where_gt("age", 65)
            .or_where()
            .to_sql()
            .unwrap();
        assert_eq!(
            query,
            "SELECT id, name FROM users WHERE deleted_at IS NULL OR age > ?"
        );
    }

    #[test]
    fn test_select_complex() {
        let session = session();
        let query = session
            .query::<User>()
            .where_eq("status", "active")
            .where_gt("age", 18)
            .order_by_asc("name")
            .limit(100)
            .offset(20)
            .to_sql()
            .unwrap();

        assert!(query.contains("FROM users"));
        assert!(query.contains("status = ?") && query.contains("age > ?"));
        assert!(query.contains("ORDER BY name ASC"));
        assert!(query.contains("LIMIT 100 OFFSET 20"));
    }

    #[test]
    fn test_values_never_interpolated() {
        let session = session();
        let hostile = "x'; DROP TABLE users; --";
        let query = session
            .query::<User>()
            .where_eq("name", hostile)
            .to_sql()
            .unwrap();
        assert!(!query.contains(hostile));
        assert!(query.ends_with("WHERE name = ?"));
    }

    #[test]
    fn test_builder_is_immutable() {
        let session = session();
        let base = session.query::<User>().where_eq("status", "active");
        let adults = base.where_ge("age", 18);
        let named = base.where_like("name", "A%");

        assert_eq!(
            base.to_sql().unwrap(),
            "SELECT id, name, status, age, deleted_at FROM users WHERE status = ?"
        );
        assert!(adults.to_sql().unwrap().ends_with("status = ? AND age >= ?"));
        assert!(named.to_sql().unwrap().ends_with("status = ? AND name LIKE ?"));
    }

    #[test]
    fn test_unknown_column() {
        let session = session();
        let err = session
            .query::<User>()
            .where_eq("nickname", "al")
            .to_sql()
            .unwrap_err();
        assert!(matches!(err, DatabaseError::UnknownColumn { .. }));

        let err = session
            .query::<User>()
            .order_by_asc("nickname")
            .to_sql()
            .unwrap_err();
        assert!(matches!(err, DatabaseError::UnknownColumn { .. }));

        let err = session.query::<User>().count("nickname").unwrap_err();
        assert!(matches!(err, DatabaseError::UnknownColumn { .. }));
    }
}
