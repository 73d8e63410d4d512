//! Column decoding shared by the entity modules. Identifiers and prices are
//! stored as text, so every read goes through these parsers.

use std::str::FromStr;

use rusqlite::types::ValueRef;
use rusqlite::Row;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::error::{column_name, conversion_failure};

pub(crate) fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|err| conversion_failure(row, idx, &raw, err))
}

pub(crate) fn optional_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| Uuid::parse_str(&raw).map_err(|err| conversion_failure(row, idx, &raw, err)))
        .transpose()
}

/// Prices are written as decimal strings. A number or NULL in the column was
/// not written by this crate and is rejected rather than guessed at.
pub(crate) fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    match row.get_ref(idx)? {
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            Decimal::from_str(text.trim()).map_err(|err| conversion_failure(row, idx, &text, err))
        }
        other => Err(rusqlite::Error::InvalidColumnType(
            idx,
            column_name(row, idx),
            other.data_type(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use rusqlite::types::Type;
    use rusqlite::Connection;

    use super::*;
    use crate::db::StoreError;

    fn price_of(sql: &str) -> rusqlite::Result<Decimal> {
        let conn = Connection::open_in_memory().unwrap();
        conn.query_row(sql, [], |row| decimal_at(row, 0))
    }

    #[test]
    fn decimal_text_keeps_every_digit() {
        assert_eq!(price_of("SELECT '19.99'").unwrap(), Decimal::new(1999, 2));
        assert_eq!(price_of("SELECT '0.10'").unwrap().to_string(), "0.10");
    }

    #[test]
    fn numeric_and_null_prices_are_corrupt() {
        assert_matches!(
            price_of("SELECT 9.99 AS Price").map_err(StoreError::from),
            Err(StoreError::Corrupt { column, value }) if column == "Price" && value == "<Real>"
        );
        assert_matches!(
            price_of("SELECT 3 AS Price"),
            Err(rusqlite::Error::InvalidColumnType(0, _, Type::Integer))
        );
        assert_matches!(
            price_of("SELECT NULL AS Price"),
            Err(rusqlite::Error::InvalidColumnType(0, _, Type::Null))
        );
    }

    #[test]
    fn garbage_price_names_the_column_and_value() {
        let err = price_of("SELECT 'twelve' AS Price").unwrap_err();
        assert_matches!(err, rusqlite::Error::FromSqlConversionFailure(0, Type::Text, _));
        assert_matches!(
            StoreError::from(err),
            StoreError::Corrupt { column, value } if column == "Price" && value == "twelve"
        );
    }

    #[test]
    fn bad_identifier_is_corrupt() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn
            .query_row("SELECT 'not-a-uuid' AS ItemId", [], |row| uuid_at(row, 0))
            .unwrap_err();
        assert_matches!(
            StoreError::from(err),
            StoreError::Corrupt { column, value } if column == "ItemId" && value == "not-a-uuid"
        );
    }

    #[test]
    fn optional_uuid_handles_null() {
        let conn = Connection::open_in_memory().unwrap();
        let value = conn
            .query_row("SELECT NULL", [], |row| optional_uuid_at(row, 0))
            .unwrap();
        assert_eq!(value, None);
    }
}
