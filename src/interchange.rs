//! Flat-file interchange for items. The header is
//! `ItemId,ItemName,CategoryId,Quantity,Price,MinStock,MaxStock`; absent stock
//! thresholds are empty fields. The `csv` crate quotes names containing
//! delimiters, quotes or newlines, so every row survives a round trip.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::db::{
    fetch_category, fetch_item, fetch_items, in_transaction, insert_item, update_item, StoreError,
};
use crate::models::{InventoryItem, ValidationError};

#[derive(Debug, Error)]
pub enum InterchangeError {
    #[error("Could not access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Line {line}: invalid {field} '{value}'.")]
    InvalidField {
        line: u64,
        field: &'static str,
        value: String,
    },
    #[error("Line {line}: {source}")]
    InvalidItem {
        line: u64,
        #[source]
        source: ValidationError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One CSV row. Identifiers and prices travel as text so that nothing is
/// rounded on the way through.
#[derive(Debug, Serialize, Deserialize)]
struct ItemRecord {
    #[serde(rename = "ItemId")]
    item_id: String,
    #[serde(rename = "ItemName")]
    item_name: String,
    #[serde(rename = "CategoryId")]
    category_id: String,
    #[serde(rename = "Quantity")]
    quantity: u32,
    #[serde(rename = "Price")]
    price: String,
    #[serde(rename = "MinStock")]
    min_stock: Option<u32>,
    #[serde(rename = "MaxStock")]
    max_stock: Option<u32>,
}

impl From<&InventoryItem> for ItemRecord {
    fn from(item: &InventoryItem) -> Self {
        Self {
            item_id: item.id().to_string(),
            item_name: item.name.clone(),
            category_id: item.category_id.to_string(),
            quantity: item.quantity,
            price: item.price.to_string(),
            min_stock: item.min_stock,
            max_stock: item.max_stock,
        }
    }
}

impl ItemRecord {
    fn into_item(self, line: u64) -> Result<InventoryItem, InterchangeError> {
        let invalid = |field: &'static str, value: &str| InterchangeError::InvalidField {
            line,
            field,
            value: value.to_string(),
        };
        let id =
            Uuid::parse_str(self.item_id.trim()).map_err(|_| invalid("ItemId", &self.item_id))?;
        let category_id = Uuid::parse_str(self.category_id.trim())
            .map_err(|_| invalid("CategoryId", &self.category_id))?;
        let price =
            Decimal::from_str(self.price.trim()).map_err(|_| invalid("Price", &self.price))?;

        let item = InventoryItem::with_id(
            id,
            self.item_name,
            category_id,
            self.quantity,
            price,
            self.min_stock,
            self.max_stock,
        );
        item.validate()
            .map_err(|source| InterchangeError::InvalidItem { line, source })?;
        Ok(item)
    }
}

/// Write `items` with a header row.
pub fn write_items<W: Write>(writer: W, items: &[InventoryItem]) -> Result<(), InterchangeError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for item in items {
        csv_writer.serialize(ItemRecord::from(item))?;
    }
    if items.is_empty() {
        // serialize() emits the header lazily, so an empty export needs it spelled out.
        csv_writer.write_record([
            "ItemId",
            "ItemName",
            "CategoryId",
            "Quantity",
            "Price",
            "MinStock",
            "MaxStock",
        ])?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Parse every row, rebuilding items around their stored identifiers. Errors
/// name the offending line (the header is line 1).
pub fn read_items<R: Read>(reader: R) -> Result<Vec<InventoryItem>, InterchangeError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let mut items = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |position| position.line());
        let row: ItemRecord = record.deserialize(Some(&headers))?;
        items.push(row.into_item(line)?);
    }
    Ok(items)
}

/// Export every stored item to `path`. Returns how many rows were written.
pub fn export_items(conn: &Connection, path: &Path) -> Result<usize, InterchangeError> {
    let items = fetch_items(conn)?;
    let file = File::create(path).map_err(|source| InterchangeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_items(file, &items)?;
    info!(path = %path.display(), count = items.len(), "exported items");
    Ok(items.len())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
}

/// Import items from `path`, inserting new identifiers and overwriting known
/// ones. The whole file is applied in one transaction: a row that references a
/// missing category aborts the import and leaves the store untouched.
pub fn import_items(conn: &Connection, path: &Path) -> Result<ImportSummary, InterchangeError> {
    let file = File::open(path).map_err(|source| InterchangeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let items = read_items(file)?;

    let summary = in_transaction(conn, |conn| {
        let mut summary = ImportSummary::default();
        for item in &items {
            if fetch_category(conn, item.category_id)?.is_none() {
                return Err(StoreError::missing("Category", item.category_id));
            }
            if fetch_item(conn, item.id())?.is_some() {
                update_item(conn, item)?;
                summary.updated += 1;
            } else {
                insert_item(conn, item)?;
                summary.inserted += 1;
            }
        }
        Ok(summary)
    })?;

    info!(
        path = %path.display(),
        inserted = summary.inserted,
        updated = summary.updated,
        "imported items"
    );
    Ok(summary)
}
