use activity_core_db::executor::{QueryError, SqlRow};
use heapless::String as HeaplessString;
use std::str::FromStr;

/// A trait for converting a decoded result row into a model.
pub trait TryFromRow: Sized {
    /// Performs the conversion.
    fn try_from_row(row: &SqlRow) -> Result<Self, QueryError>;
}

/// Retrieves a required `HeaplessString` from a row.
pub fn get_heapless_string<const N: usize>(
    row: &SqlRow,
    col_name: &str,
) -> Result<HeaplessString<N>, QueryError> {
    let s = row.try_text(col_name)?;
    HeaplessString::from_str(&s)
        .map_err(|_| format!("Value for column '{col_name}' is too long (max {N} chars)").into())
}

/// Retrieves an optional `HeaplessString` from a row.
pub fn get_optional_heapless_string<const N: usize>(
    row: &SqlRow,
    col_name: &str,
) -> Result<Option<HeaplessString<N>>, QueryError> {
    row.try_opt_text(col_name)?
        .map(|val| HeaplessString::from_str(&val))
        .transpose()
        .map_err(|_| format!("Value for column '{col_name}' is too long (max {N} chars)").into())
}
