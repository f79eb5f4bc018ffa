//! Prepared statements and parameter lists

use super::arena::Arena;
use super::backend::{RawStatement, Step};
use super::error::{DatabaseError, Result};
use super::marshal::ToSql;
use super::reflect::{FromRow, Row};
use super::value::DatabaseValue;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ready,
    Stepping,
    Done,
}

/// A prepared statement borrowed from its connection
///
/// Every placeholder must be bound before the first step. Rows are copied into
/// the caller's arena as they are read, so decoded values stay valid after the
/// statement moves on or is dropped. Dropping a statement finalizes it.
pub struct Statement<'c> {
    raw: Option<Box<dyn RawStatement + 'c>>,
    bound: Vec<bool>,
    state: State,
}

impl<'c> Statement<'c> {
    pub(crate) fn new(raw: Box<dyn RawStatement + 'c>) -> Self {
        let bound = vec![false; raw.parameter_count()];
        Self {
            raw: Some(raw),
            bound,
            state: State::Ready,
        }
    }

    fn raw(&self) -> Result<&(dyn RawStatement + 'c)> {
        self.raw.as_deref().ok_or(DatabaseError::StatementFinalized)
    }

    fn raw_mut(&mut self) -> Result<&mut (dyn RawStatement + 'c)> {
        self.raw.as_deref_mut().ok_or(DatabaseError::StatementFinalized)
    }

    /// Number of placeholders
    pub fn parameter_count(&self) -> usize {
        self.bound.len()
    }

    /// Number of result columns
    pub fn column_count(&self) -> usize {
        self.raw.as_deref().map_or(0, |raw| raw.column_count())
    }

    /// Bind a dynamic value to the zero-based placeholder `index`
    pub fn bind(&mut self, index: usize, value: DatabaseValue<'_>) -> Result<()> {
        let count = self.bound.len();
        if index >= count {
            return Err(DatabaseError::BindIndexOutOfRange { index, count });
        }
        self.raw_mut()?.bind(index, value)?;
        self.bound[index] = true;
        Ok(())
    }

    /// Marshal `value` through `arena` and bind it
    pub fn bind_value<T: ToSql + ?Sized>(
        &mut self,
        index: usize,
        value: &T,
        arena: &Arena,
    ) -> Result<()> {
        let value = value.to_sql(arena)?;
        self.bind(index, value)
    }

    /// Bind a whole parameter list starting at placeholder 0
    pub fn bind_all<P: Params>(&mut self, params: P, arena: &Arena) -> Result<()> {
        params.bind_to(self, arena)
    }

    fn check_bound(&self) -> Result<()> {
        match self.bound.iter().position(|bound| !bound) {
            Some(index) => Err(DatabaseError::UnboundParameter { index }),
            None => Ok(()),
        }
    }

    fn step(&mut self) -> Result<Step> {
        match self.state {
            State::Done => return Ok(Step::Done),
            State::Ready => self.check_bound()?,
            State::Stepping => {}
        }
        let step = self.raw_mut()?.step()?;
        self.state = match step {
            Step::Row => State::Stepping,
            Step::Done => State::Done,
        };
        Ok(step)
    }

    /// Run the statement to completion, discarding any rows
    pub fn exec(&mut self) -> Result<()> {
        while self.step()? == Step::Row {}
        Ok(())
    }

    /// Read the next row, copied into `arena`
    ///
    /// Returns `Ok(None)` once the statement is done, and keeps doing so on
    /// every later call.
    pub fn next_row<'a>(&mut self, arena: &'a Arena) -> Result<Option<Row<'a>>> {
        match self.step()? {
            Step::Done => Ok(None),
            Step::Row => {
                let raw = self.raw()?;
                let values = (0..raw.column_count())
                    .map(|index| raw.column_value(index).map(|v| v.clone_to_arena(arena)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Some(Row::new(values)))
            }
        }
    }

    /// Read and decode the next row
    pub fn next<'a, R: FromRow<'a>>(&mut self, arena: &'a Arena) -> Result<Option<R>> {
        match self.next_row(arena)? {
            Some(row) => R::from_row(&row).map(Some),
            None => Ok(None),
        }
    }

    /// Collect and decode every remaining row
    pub fn collect<'a, R: FromRow<'a>>(&mut self, arena: &'a Arena) -> Result<Vec<R>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next(arena)? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Rewind for another execution with the current bindings
    pub fn reset(&mut self) -> Result<()> {
        self.raw_mut()?.reset()?;
        self.state = State::Ready;
        Ok(())
    }

    /// Finalize now and report driver errors
    pub fn finalize(mut self) -> Result<()> {
        match self.raw.take() {
            Some(raw) => raw.finalize(),
            None => Ok(()),
        }
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            if let Err(e) = raw.finalize() {
                warn!(error = %e, "failed to finalize statement");
            }
        }
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("parameters", &self.bound.len())
            .field("state", &self.state)
            .finish()
    }
}

/// A list of values bound to placeholders 0, 1, 2, ...
pub trait Params {
    /// Bind every value to `statement`
    fn bind_to(&self, statement: &mut Statement<'_>, arena: &Arena) -> Result<()>;
}

impl Params for () {
    fn bind_to(&self, _statement: &mut Statement<'_>, _arena: &Arena) -> Result<()> {
        Ok(())
    }
}

impl Params for &[&dyn ToSql] {
    fn bind_to(&self, statement: &mut Statement<'_>, arena: &Arena) -> Result<()> {
        for (index, value) in self.iter().enumerate() {
            statement.bind_value(index, *value, arena)?;
        }
        Ok(())
    }
}

impl<const N: usize> Params for [&dyn ToSql; N] {
    fn bind_to(&self, statement: &mut Statement<'_>, arena: &Arena) -> Result<()> {
        self.as_slice().bind_to(statement, arena)
    }
}

impl Params for &[DatabaseValue<'_>] {
    fn bind_to(&self, statement: &mut Statement<'_>, _arena: &Arena) -> Result<()> {
        for (index, value) in self.iter().enumerate() {
            statement.bind(index, *value)?;
        }
        Ok(())
    }
}

impl Params for Vec<DatabaseValue<'_>> {
    fn bind_to(&self, statement: &mut Statement<'_>, arena: &Arena) -> Result<()> {
        self.as_slice().bind_to(statement, arena)
    }
}

macro_rules! tuple_params {
    ($($name:ident: $index:tt),+) => {
        impl<$($name: ToSql),+> Params for ($($name,)+) {
            fn bind_to(&self, statement: &mut Statement<'_>, arena: &Arena) -> Result<()> {
                $(statement.bind_value($index, &self.$index, arena)?;)+
                Ok(())
            }
        }
    };
}

tuple_params!(A: 0);
tuple_params!(A: 0, B: 1);
tuple_params!(A: 0, B: 1, C: 2);
tuple_params!(A: 0, B: 1, C: 2, D: 3);
tuple_params!(A: 0, B: 1, C: 2, D: 3, E: 4);
tuple_params!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
tuple_params!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
tuple_params!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);

/// Build a heterogeneous parameter list
///
/// ```
/// use rust_record_store::{params, Params};
///
/// let name = String::from("Alice");
/// let params = params![name, 30];
/// # fn takes<P: Params>(_: P) {}
/// # takes(params);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        &[] as &[&dyn $crate::ToSql]
    };
    ($($param:expr),+ $(,)?) => {
        &[$(&$param as &dyn $crate::ToSql),+] as &[&dyn $crate::ToSql]
    };
}
