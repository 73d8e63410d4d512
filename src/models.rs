//! Domain records that mirror the SQLite schema and get passed throughout the
//! TUI. They stay light-weight data holders: persistence lives in `db`, and
//! presentation lives in `ui`.
//!
//! Identifiers are assigned once. `new` generates a fresh UUID and the
//! crate-visible `with_id` constructors rebuild an entity around an id that was
//! read back from storage or an import file. Nothing else can change an id.

use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Boundary validation failures. Forms and the CSV importer run these checks
/// first; the repository repeats them on every write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} name is required.")]
    EmptyName(&'static str),
    #[error("{0} name cannot start or end with whitespace.")]
    UntrimmedName(&'static str),
    #[error("Price cannot be negative (got {0}).")]
    NegativePrice(Decimal),
    #[error("Minimum stock ({min}) cannot be greater than maximum stock ({max}).")]
    StockBoundsInverted { min: u32, max: u32 },
}

/// Check the min/max pair on its own so forms can validate before they build an
/// item.
pub fn check_stock_bounds(min: Option<u32>, max: Option<u32>) -> Result<(), ValidationError> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => {
            Err(ValidationError::StockBoundsInverted { min, max })
        }
        _ => Ok(()),
    }
}

/// Names are looked up trimmed, so a stored name must already be trimmed and
/// non-blank or no lookup could ever find it.
fn check_name(entity: &'static str, name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        Err(ValidationError::EmptyName(entity))
    } else if name.trim() != name {
        Err(ValidationError::UntrimmedName(entity))
    } else {
        Ok(())
    }
}

/// Trim a contact detail, treating blank input as absent.
fn contact(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A trackable inventory unit.
pub struct InventoryItem {
    /// Set at construction; see [`InventoryItem::id`].
    id: Uuid,
    pub name: String,
    /// Required reference into `Categories`.
    pub category_id: Uuid,
    pub quantity: u32,
    /// Stored as a decimal string so cents survive the round trip.
    pub price: Decimal,
    /// `None` means "not set", which is different from an explicit zero.
    pub min_stock: Option<u32>,
    pub max_stock: Option<u32>,
}

/// Where the current quantity sits relative to the configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockStatus {
    Below,
    Within,
    Above,
}

impl InventoryItem {
    /// Build a brand new item with a freshly generated identifier.
    pub fn new(
        name: impl Into<String>,
        category_id: Uuid,
        quantity: u32,
        price: Decimal,
        min_stock: Option<u32>,
        max_stock: Option<u32>,
    ) -> Self {
        Self::with_id(
            Uuid::new_v4(),
            name,
            category_id,
            quantity,
            price,
            min_stock,
            max_stock,
        )
    }

    /// Rebuild an item around an identifier that already exists in storage or
    /// in an import file. This is the only way to pick the id explicitly.
    pub(crate) fn with_id(
        id: Uuid,
        name: impl Into<String>,
        category_id: Uuid,
        quantity: u32,
        price: Decimal,
        min_stock: Option<u32>,
        max_stock: Option<u32>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            category_id,
            quantity,
            price,
            min_stock,
            max_stock,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Enforce the entry-boundary invariants: a non-blank name, a non-negative
    /// price, and `min_stock <= max_stock` when both are present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName("Item"));
        }
        if self.price < Decimal::ZERO {
            return Err(ValidationError::NegativePrice(self.price));
        }
        check_stock_bounds(self.min_stock, self.max_stock)
    }

    pub fn stock_status(&self) -> StockStatus {
        match (self.min_stock, self.max_stock) {
            (Some(min), _) if self.quantity < min => StockStatus::Below,
            (_, Some(max)) if self.quantity > max => StockStatus::Above,
            _ => StockStatus::Within,
        }
    }
}

/// Render an optional threshold the way every view shows it.
pub fn stock_display(value: Option<u32>) -> String {
    value.map_or_else(|| "Not Set".to_string(), |v| v.to_string())
}

impl fmt::Display for InventoryItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID: {}, Name: {}, Category: {}, Quantity: {}, Price: ${:.2}, MinStock: {}, MaxStock: {}",
            self.id,
            self.name,
            self.category_id,
            self.quantity,
            self.price,
            stock_display(self.min_stock),
            stock_display(self.max_stock),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Named grouping for items. Categories form a tree through `parent_id`.
pub struct Category {
    id: Uuid,
    /// Unique across all categories.
    pub name: String,
    /// `None` for root categories.
    pub parent_id: Option<Uuid>,
}

impl Category {
    /// The name is trimmed here; stored rows are rebuilt untouched by
    /// `with_id`.
    pub fn new(name: impl Into<String>, parent_id: Option<Uuid>) -> Self {
        let name: String = name.into();
        Self::with_id(Uuid::new_v4(), name.trim(), parent_id)
    }

    pub(crate) fn with_id(id: Uuid, name: impl Into<String>, parent_id: Option<Uuid>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_name("Category", &self.name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// External vendor. Contact fields are free text. `new` trims them and turns
/// blank input into `None`; the repository stores whatever the record holds.
pub struct Supplier {
    id: Uuid,
    pub name: String,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl Supplier {
    pub fn new(
        name: impl Into<String>,
        website: Option<String>,
        phone: Option<String>,
        email: Option<String>,
    ) -> Self {
        let name: String = name.into();
        Self::with_id(
            Uuid::new_v4(),
            name.trim(),
            contact(website),
            contact(phone),
            contact(email),
        )
    }

    pub(crate) fn with_id(
        id: Uuid,
        name: impl Into<String>,
        website: Option<String>,
        phone: Option<String>,
        email: Option<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            website,
            phone,
            email,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_name("Supplier", &self.name)
    }

    /// Compose a `Name (contact)` string that omits the parenthetical when no
    /// contact detail is known. Lists and pickers rely on it.
    pub fn display_name(&self) -> String {
        let contact = [&self.website, &self.email, &self.phone]
            .into_iter()
            .flatten()
            .map(|value| value.trim())
            .find(|value| !value.is_empty());
        match contact {
            Some(contact) => format!("{} ({contact})", self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for Supplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn price(raw: &str) -> Decimal {
        Decimal::from_str(raw).unwrap()
    }

    #[test]
    fn new_items_get_distinct_ids() {
        let category = Uuid::new_v4();
        let a = InventoryItem::new("Hammer", category, 1, price("1.00"), None, None);
        let b = InventoryItem::new("Hammer", category, 1, price("1.00"), None, None);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn with_id_keeps_the_supplied_identifier() {
        let id = Uuid::new_v4();
        let item = InventoryItem::with_id(id, "Saw", Uuid::new_v4(), 0, Decimal::ZERO, None, None);
        assert_eq!(item.id(), id);
    }

    #[test]
    fn validate_rejects_inverted_stock_bounds() {
        let item = InventoryItem::new("Nails", Uuid::new_v4(), 5, price("0.10"), Some(10), Some(2));
        assert_eq!(
            item.validate(),
            Err(ValidationError::StockBoundsInverted { min: 10, max: 2 })
        );
    }

    #[test]
    fn validate_rejects_blank_names_and_negative_prices() {
        let mut item = InventoryItem::new("  ", Uuid::new_v4(), 5, price("1"), None, None);
        assert_eq!(item.validate(), Err(ValidationError::EmptyName("Item")));

        item.name = "Glue".into();
        item.price = price("-0.01");
        assert_eq!(item.validate(), Err(ValidationError::NegativePrice(price("-0.01"))));
    }

    #[test]
    fn equal_bounds_are_allowed() {
        assert_eq!(check_stock_bounds(Some(3), Some(3)), Ok(()));
        assert_eq!(check_stock_bounds(None, Some(0)), Ok(()));
    }

    #[test]
    fn stock_status_tracks_thresholds() {
        let mut item = InventoryItem::new("Tape", Uuid::new_v4(), 1, price("2.50"), Some(2), Some(4));
        assert_eq!(item.stock_status(), StockStatus::Below);
        item.quantity = 3;
        assert_eq!(item.stock_status(), StockStatus::Within);
        item.quantity = 9;
        assert_eq!(item.stock_status(), StockStatus::Above);
        item.min_stock = None;
        item.max_stock = None;
        assert_eq!(item.stock_status(), StockStatus::Within);
    }

    #[test]
    fn display_reports_missing_stock_as_not_set() {
        let item = InventoryItem::new("Hammer", Uuid::new_v4(), 10, price("9.99"), None, Some(20));
        let text = item.to_string();
        assert!(text.contains("Price: $9.99"));
        assert!(text.contains("MinStock: Not Set"));
        assert!(text.contains("MaxStock: 20"));
    }

    #[test]
    fn supplier_display_name_prefers_first_contact() {
        let supplier = Supplier::new(
            "Acme",
            None,
            Some("555-0100".into()),
            Some("sales@acme.test".into()),
        );
        assert_eq!(supplier.display_name(), "Acme (sales@acme.test)");
        let bare = Supplier::new("Bolt Co", Some("   ".into()), None, None);
        assert_eq!(bare.display_name(), "Bolt Co");
    }

    #[test]
    fn constructors_trim_names_and_contacts() {
        let tools = Category::new("  Tools ", None);
        assert_eq!(tools.name, "Tools");

        let acme = Supplier::new(
            " Acme ",
            Some(" acme.test ".into()),
            Some("".into()),
            Some("\t".into()),
        );
        assert_eq!(acme.name, "Acme");
        assert_eq!(acme.website.as_deref(), Some("acme.test"));
        assert_eq!((acme.phone, acme.email), (None, None));
    }

    #[test]
    fn names_must_be_present_and_trimmed() {
        let mut tools = Category::new("Tools", None);
        assert_eq!(tools.validate(), Ok(()));
        tools.name = " Tools".into();
        assert_eq!(tools.validate(), Err(ValidationError::UntrimmedName("Category")));
        tools.name = "   ".into();
        assert_eq!(tools.validate(), Err(ValidationError::EmptyName("Category")));

        let mut acme = Supplier::new("Acme", None, None, None);
        acme.name.clear();
        assert_eq!(acme.validate(), Err(ValidationError::EmptyName("Supplier")));
    }
}
