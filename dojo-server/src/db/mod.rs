pub mod schema;
pub mod connection;
pub mod repositories;

pub use connection::{Database, DbConnection, DbPool};

use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

/// Read a TEXT column holding a UUID
pub(crate) fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a nullable TEXT column holding a UUID
pub(crate) fn opt_uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        Uuid::parse_str(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Read a TEXT column holding one of the `dojo_types` enum codes
pub(crate) fn code_column<T>(
    row: &Row<'_>,
    idx: usize,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown code '{}'", raw).into(),
        )
    })
}

/// Nullable variant of [`code_column`]
pub(crate) fn opt_code_column<T>(
    row: &Row<'_>,
    idx: usize,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(s) => parse(&s).map(Some).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                Type::Text,
                format!("unknown code '{}'", s).into(),
            )
        }),
        None => Ok(None),
    }
}

/// True when any cause in the chain is a SQLite failure with one of `codes`
fn has_constraint_code(err: &anyhow::Error, codes: &[std::os::raw::c_int]) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(e, _)) if codes.contains(&e.extended_code)
        )
    })
}

/// True when the error is a UNIQUE constraint violation
pub(crate) fn is_unique_violation(err: &anyhow::Error) -> bool {
    has_constraint_code(
        err,
        &[
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY,
        ],
    )
}

/// True when a row is still referenced (or references a missing row)
pub(crate) fn is_foreign_key_violation(err: &anyhow::Error) -> bool {
    has_constraint_code(err, &[rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY])
}
