use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use crossterm::event::KeyCode;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{check_stock_bounds, Category, InventoryItem, Supplier};

/// Outcome of routing a key press through a form.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum FormKey {
    Submit,
    Cancel,
    Handled,
}

/// Editing surface shared by the modal forms.
pub(crate) trait FormInput {
    fn next_field(&mut self);
    fn previous_field(&mut self);
    /// Append a character to the active field. Returns `false` when the field
    /// rejects it.
    fn push_char(&mut self, ch: char) -> bool;
    fn backspace(&mut self);
    fn clear_error(&mut self);
}

/// Apply the common form keys: Tab and the arrows move between fields, Enter
/// submits, Esc cancels, anything printable goes to the active field.
pub(crate) fn route_key<F: FormInput>(form: &mut F, code: KeyCode) -> FormKey {
    match code {
        KeyCode::Esc => return FormKey::Cancel,
        KeyCode::Enter => return FormKey::Submit,
        KeyCode::Tab | KeyCode::Down => form.next_field(),
        KeyCode::BackTab | KeyCode::Up => form.previous_field(),
        KeyCode::Backspace => {
            form.backspace();
            form.clear_error();
        }
        KeyCode::Char(ch) => {
            if form.push_char(ch) {
                form.clear_error();
            }
        }
        _ => {}
    }
    FormKey::Handled
}

/// Render one `Label: value` row, highlighting the focused field and showing a
/// placeholder for empty ones.
fn form_line(label: &str, value: &str, active: bool, required: bool) -> Line<'static> {
    let display = match (value.is_empty(), required) {
        (true, true) => "<required>".to_string(),
        (true, false) => "<optional>".to_string(),
        (false, _) => value.to_string(),
    };

    let style = if active {
        Style::default().fg(Color::Yellow)
    } else if value.is_empty() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };

    Line::from(vec![
        Span::raw(format!("{label}: ")),
        Span::styled(display, style),
    ])
}

/// Which characters a field accepts while typing. Final validation happens in
/// `parse_inputs`; this only keeps obviously wrong keys out.
#[derive(Copy, Clone, PartialEq, Eq)]
enum Accepts {
    Text,
    Digits,
    Money,
}

impl Accepts {
    fn allows(self, ch: char) -> bool {
        match self {
            Accepts::Text => !ch.is_control(),
            Accepts::Digits => ch.is_ascii_digit(),
            Accepts::Money => ch.is_ascii_digit() || ch == '.' || ch == '$',
        }
    }
}

fn parse_count(raw: &str, label: &str) -> Result<u32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(anyhow!("{label} is required."));
    }
    raw.parse::<u32>()
        .with_context(|| format!("{label} must be a whole number of zero or more."))
}

fn parse_optional_count(raw: &str, label: &str) -> Result<Option<u32>> {
    if raw.trim().is_empty() {
        Ok(None)
    } else {
        parse_count(raw, label).map(Some)
    }
}

fn parse_price(raw: &str) -> Result<Decimal> {
    let raw = raw.trim();
    let raw = raw.strip_prefix('$').unwrap_or(raw).trim();
    if raw.is_empty() {
        return Err(anyhow!("Price is required."));
    }
    let price = Decimal::from_str(raw).context("Price must be a number such as 4.99.")?;
    if price < Decimal::ZERO {
        return Err(anyhow!("Price cannot be negative."));
    }
    Ok(price)
}

fn optional_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Fields available within the item form, in tab order.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub(crate) enum ItemField {
    #[default]
    Name,
    Category,
    Parent,
    Quantity,
    Price,
    MinStock,
    MaxStock,
}

impl ItemField {
    pub(crate) const ALL: [ItemField; 7] = [
        ItemField::Name,
        ItemField::Category,
        ItemField::Parent,
        ItemField::Quantity,
        ItemField::Price,
        ItemField::MinStock,
        ItemField::MaxStock,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            ItemField::Name => "Name",
            ItemField::Category => "Category",
            ItemField::Parent => "Parent category",
            ItemField::Quantity => "Quantity",
            ItemField::Price => "Price",
            ItemField::MinStock => "Minimum stock",
            ItemField::MaxStock => "Maximum stock",
        }
    }

    fn accepts(self) -> Accepts {
        match self {
            ItemField::Name | ItemField::Category | ItemField::Parent => Accepts::Text,
            ItemField::Quantity | ItemField::MinStock | ItemField::MaxStock => Accepts::Digits,
            ItemField::Price => Accepts::Money,
        }
    }

    fn required(self) -> bool {
        matches!(
            self,
            ItemField::Name | ItemField::Category | ItemField::Quantity | ItemField::Price
        )
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|field| *field == self).unwrap_or(0)
    }
}

/// Typed values pulled out of a valid item form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ItemInput {
    pub(crate) name: String,
    pub(crate) category: String,
    /// Filled in when the user wants the category created under a parent.
    pub(crate) parent: Option<String>,
    pub(crate) quantity: u32,
    pub(crate) price: Decimal,
    pub(crate) min_stock: Option<u32>,
    pub(crate) max_stock: Option<u32>,
}

impl ItemInput {
    /// Apply the input to an existing item, keeping its identifier.
    pub(crate) fn apply_to(&self, item: &mut InventoryItem, category_id: Uuid) {
        item.name = self.name.clone();
        item.category_id = category_id;
        item.quantity = self.quantity;
        item.price = self.price;
        item.min_stock = self.min_stock;
        item.max_stock = self.max_stock;
    }

    pub(crate) fn into_item(self, category_id: Uuid) -> InventoryItem {
        InventoryItem::new(
            self.name,
            category_id,
            self.quantity,
            self.price,
            self.min_stock,
            self.max_stock,
        )
    }
}

/// Internal representation of the add/edit item form.
#[derive(Default, Clone)]
pub(crate) struct ItemForm {
    pub(crate) name: String,
    pub(crate) category: String,
    pub(crate) parent: String,
    pub(crate) quantity: String,
    pub(crate) price: String,
    pub(crate) min_stock: String,
    pub(crate) max_stock: String,
    pub(crate) active: ItemField,
    pub(crate) error: Option<String>,
}

impl ItemForm {
    /// Populate the form from an existing item when editing.
    pub(crate) fn from_item(item: &InventoryItem, category_name: &str) -> Self {
        Self {
            name: item.name.clone(),
            category: category_name.to_string(),
            parent: String::new(),
            quantity: item.quantity.to_string(),
            price: item.price.to_string(),
            min_stock: item.min_stock.map(|v| v.to_string()).unwrap_or_default(),
            max_stock: item.max_stock.map(|v| v.to_string()).unwrap_or_default(),
            active: ItemField::Name,
            error: None,
        }
    }

    pub(crate) fn value(&self, field: ItemField) -> &str {
        match field {
            ItemField::Name => &self.name,
            ItemField::Category => &self.category,
            ItemField::Parent => &self.parent,
            ItemField::Quantity => &self.quantity,
            ItemField::Price => &self.price,
            ItemField::MinStock => &self.min_stock,
            ItemField::MaxStock => &self.max_stock,
        }
    }

    fn value_mut(&mut self, field: ItemField) -> &mut String {
        match field {
            ItemField::Name => &mut self.name,
            ItemField::Category => &mut self.category,
            ItemField::Parent => &mut self.parent,
            ItemField::Quantity => &mut self.quantity,
            ItemField::Price => &mut self.price,
            ItemField::MinStock => &mut self.min_stock,
            ItemField::MaxStock => &mut self.max_stock,
        }
    }

    /// Validate the inputs and return typed values ready for persistence.
    pub(crate) fn parse_inputs(&self) -> Result<ItemInput> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(anyhow!("Item name is required."));
        }
        let category = self.category.trim();
        if category.is_empty() {
            return Err(anyhow!("Category is required."));
        }
        let quantity = parse_count(&self.quantity, "Quantity")?;
        let price = parse_price(&self.price)?;
        let min_stock = parse_optional_count(&self.min_stock, "Minimum stock")?;
        let max_stock = parse_optional_count(&self.max_stock, "Maximum stock")?;
        check_stock_bounds(min_stock, max_stock)?;

        Ok(ItemInput {
            name: name.to_string(),
            category: category.to_string(),
            parent: optional_text(&self.parent),
            quantity,
            price,
            min_stock,
            max_stock,
        })
    }

    pub(crate) fn build_line(&self, field: ItemField) -> Line<'static> {
        form_line(
            field.label(),
            self.value(field),
            self.active == field,
            field.required(),
        )
    }

    /// Row and column of the text cursor relative to the form's inner area.
    pub(crate) fn cursor(&self) -> (u16, u16) {
        let field = self.active;
        let column = field.label().len() + 2 + self.value(field).chars().count();
        (column as u16, field.index() as u16)
    }
}

impl FormInput for ItemForm {
    fn next_field(&mut self) {
        let index = (self.active.index() + 1) % ItemField::ALL.len();
        self.active = ItemField::ALL[index];
    }

    fn previous_field(&mut self) {
        let len = ItemField::ALL.len();
        let index = (self.active.index() + len - 1) % len;
        self.active = ItemField::ALL[index];
    }

    fn push_char(&mut self, ch: char) -> bool {
        let field = self.active;
        if field.accepts().allows(ch) {
            self.value_mut(field).push(ch);
            true
        } else {
            false
        }
    }

    fn backspace(&mut self) {
        let field = self.active;
        self.value_mut(field).pop();
    }

    fn clear_error(&mut self) {
        self.error = None;
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub(crate) enum CategoryField {
    #[default]
    Name,
    Parent,
}

/// Add/edit form for a category: a name plus the parent's name.
#[derive(Default, Clone)]
pub(crate) struct CategoryForm {
    pub(crate) name: String,
    pub(crate) parent: String,
    pub(crate) active: CategoryField,
    pub(crate) error: Option<String>,
}

impl CategoryForm {
    pub(crate) fn from_category(category: &Category, parent_name: Option<&str>) -> Self {
        Self {
            name: category.name.clone(),
            parent: parent_name.unwrap_or_default().to_string(),
            active: CategoryField::Name,
            error: None,
        }
    }

    fn toggle_field(&mut self) {
        self.active = match self.active {
            CategoryField::Name => CategoryField::Parent,
            CategoryField::Parent => CategoryField::Name,
        };
    }

    /// Returns the trimmed name and the optional parent name.
    pub(crate) fn parse_inputs(&self) -> Result<(String, Option<String>)> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(anyhow!("Category name is required."));
        }
        Ok((name.to_string(), optional_text(&self.parent)))
    }

    pub(crate) fn lines(&self) -> Vec<Line<'static>> {
        vec![
            form_line("Name", &self.name, self.active == CategoryField::Name, true),
            form_line(
                "Parent category",
                &self.parent,
                self.active == CategoryField::Parent,
                false,
            ),
        ]
    }

    pub(crate) fn cursor(&self) -> (u16, u16) {
        match self.active {
            CategoryField::Name => (("Name".len() + 2 + self.name.chars().count()) as u16, 0),
            CategoryField::Parent => (
                ("Parent category".len() + 2 + self.parent.chars().count()) as u16,
                1,
            ),
        }
    }
}

impl FormInput for CategoryForm {
    fn next_field(&mut self) {
        self.toggle_field();
    }

    fn previous_field(&mut self) {
        self.toggle_field();
    }

    fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        match self.active {
            CategoryField::Name => self.name.push(ch),
            CategoryField::Parent => self.parent.push(ch),
        }
        true
    }

    fn backspace(&mut self) {
        match self.active {
            CategoryField::Name => self.name.pop(),
            CategoryField::Parent => self.parent.pop(),
        };
    }

    fn clear_error(&mut self) {
        self.error = None;
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub(crate) enum SupplierField {
    #[default]
    Name,
    Website,
    Phone,
    Email,
}

impl SupplierField {
    const ALL: [SupplierField; 4] = [
        SupplierField::Name,
        SupplierField::Website,
        SupplierField::Phone,
        SupplierField::Email,
    ];

    fn label(self) -> &'static str {
        match self {
            SupplierField::Name => "Name",
            SupplierField::Website => "Website",
            SupplierField::Phone => "Phone",
            SupplierField::Email => "Email",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|field| *field == self).unwrap_or(0)
    }
}

/// Add/edit form for suppliers. Contact fields are optional free text.
#[derive(Default, Clone)]
pub(crate) struct SupplierForm {
    pub(crate) name: String,
    pub(crate) website: String,
    pub(crate) phone: String,
    pub(crate) email: String,
    pub(crate) active: SupplierField,
    pub(crate) error: Option<String>,
}

/// Typed values pulled out of a valid supplier form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SupplierInput {
    pub(crate) name: String,
    pub(crate) website: Option<String>,
    pub(crate) phone: Option<String>,
    pub(crate) email: Option<String>,
}

impl SupplierForm {
    pub(crate) fn from_supplier(supplier: &Supplier) -> Self {
        Self {
            name: supplier.name.clone(),
            website: supplier.website.clone().unwrap_or_default(),
            phone: supplier.phone.clone().unwrap_or_default(),
            email: supplier.email.clone().unwrap_or_default(),
            active: SupplierField::Name,
            error: None,
        }
    }

    fn value(&self, field: SupplierField) -> &str {
        match field {
            SupplierField::Name => &self.name,
            SupplierField::Website => &self.website,
            SupplierField::Phone => &self.phone,
            SupplierField::Email => &self.email,
        }
    }

    fn value_mut(&mut self, field: SupplierField) -> &mut String {
        match field {
            SupplierField::Name => &mut self.name,
            SupplierField::Website => &mut self.website,
            SupplierField::Phone => &mut self.phone,
            SupplierField::Email => &mut self.email,
        }
    }

    pub(crate) fn parse_inputs(&self) -> Result<SupplierInput> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(anyhow!("Supplier name is required."));
        }
        let email = optional_text(&self.email);
        if let Some(email) = &email {
            if !email.contains('@') {
                return Err(anyhow!("Email '{email}' is missing an '@'."));
            }
        }
        Ok(SupplierInput {
            name: name.to_string(),
            website: optional_text(&self.website),
            phone: optional_text(&self.phone),
            email,
        })
    }

    pub(crate) fn lines(&self) -> Vec<Line<'static>> {
        SupplierField::ALL
            .iter()
            .map(|field| {
                form_line(
                    field.label(),
                    self.value(*field),
                    self.active == *field,
                    *field == SupplierField::Name,
                )
            })
            .collect()
    }

    pub(crate) fn cursor(&self) -> (u16, u16) {
        let field = self.active;
        let column = field.label().len() + 2 + self.value(field).chars().count();
        (column as u16, field.index() as u16)
    }
}

impl FormInput for SupplierForm {
    fn next_field(&mut self) {
        let index = (self.active.index() + 1) % SupplierField::ALL.len();
        self.active = SupplierField::ALL[index];
    }

    fn previous_field(&mut self) {
        let len = SupplierField::ALL.len();
        self.active = SupplierField::ALL[(self.active.index() + len - 1) % len];
    }

    fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        let field = self.active;
        self.value_mut(field).push(ch);
        true
    }

    fn backspace(&mut self) {
        let field = self.active;
        self.value_mut(field).pop();
    }

    fn clear_error(&mut self) {
        self.error = None;
    }
}

/// Direction of a CSV transfer.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum Transfer {
    Export,
    Import,
}

impl Transfer {
    pub(crate) fn title(self) -> &'static str {
        match self {
            Transfer::Export => "Export Items to CSV",
            Transfer::Import => "Import Items from CSV",
        }
    }
}

/// Single-line prompt for the CSV file location.
#[derive(Clone)]
pub(crate) struct PathForm {
    pub(crate) transfer: Transfer,
    pub(crate) path: String,
    pub(crate) error: Option<String>,
}

impl PathForm {
    pub(crate) const DEFAULT_PATH: &'static str = "inventory.csv";

    pub(crate) fn new(transfer: Transfer) -> Self {
        Self {
            transfer,
            path: Self::DEFAULT_PATH.to_string(),
            error: None,
        }
    }

    pub(crate) fn parse_inputs(&self) -> Result<std::path::PathBuf> {
        let path = self.path.trim();
        if path.is_empty() {
            return Err(anyhow!("A file path is required."));
        }
        Ok(std::path::PathBuf::from(path))
    }

    pub(crate) fn line(&self) -> Line<'static> {
        form_line("Path", &self.path, true, true)
    }

    pub(crate) fn cursor(&self) -> (u16, u16) {
        (("Path".len() + 2 + self.path.chars().count()) as u16, 0)
    }
}

impl FormInput for PathForm {
    fn next_field(&mut self) {}

    fn previous_field(&mut self) {}

    fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        self.path.push(ch);
        true
    }

    fn backspace(&mut self) {
        self.path.pop();
    }

    fn clear_error(&mut self) {
        self.error = None;
    }
}

/// Which record a delete confirmation refers to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum DeleteTarget {
    Item(Uuid),
    Category(Uuid),
    Supplier(Uuid),
}

/// Pending delete awaiting a yes/no answer.
#[derive(Clone)]
pub(crate) struct ConfirmDelete {
    pub(crate) target: DeleteTarget,
    pub(crate) label: String,
}

impl ConfirmDelete {
    pub(crate) fn item(item: &InventoryItem) -> Self {
        Self {
            target: DeleteTarget::Item(item.id()),
            label: item.name.clone(),
        }
    }

    pub(crate) fn category(category: &Category) -> Self {
        Self {
            target: DeleteTarget::Category(category.id()),
            label: category.name.clone(),
        }
    }

    pub(crate) fn supplier(supplier: &Supplier) -> Self {
        Self {
            target: DeleteTarget::Supplier(supplier.id()),
            label: supplier.name.clone(),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self.target {
            DeleteTarget::Item(_) => "item",
            DeleteTarget::Category(_) => "category",
            DeleteTarget::Supplier(_) => "supplier",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_form() -> ItemForm {
        ItemForm {
            name: " Hammer ".into(),
            category: "Tools".into(),
            quantity: "10".into(),
            price: "$9.99".into(),
            min_stock: "2".into(),
            max_stock: "20".into(),
            ..ItemForm::default()
        }
    }

    #[test]
    fn item_form_parses_typed_values() {
        let input = filled_form().parse_inputs().unwrap();
        assert_eq!(input.name, "Hammer");
        assert_eq!(input.quantity, 10);
        assert_eq!(input.price, Decimal::new(999, 2));
        assert_eq!(input.min_stock, Some(2));
        assert_eq!(input.parent, None);
    }

    #[test]
    fn blank_stock_fields_mean_not_set() {
        let mut form = filled_form();
        form.min_stock.clear();
        form.max_stock = "  ".into();
        let input = form.parse_inputs().unwrap();
        assert_eq!((input.min_stock, input.max_stock), (None, None));
    }

    #[test]
    fn inverted_bounds_keep_the_form_open() {
        let mut form = filled_form();
        form.min_stock = "30".into();
        let err = form.parse_inputs().unwrap_err();
        assert!(err.to_string().contains("cannot be greater"));
    }

    #[test]
    fn malformed_numbers_are_reported_per_field() {
        let mut form = filled_form();
        form.price = "9.9.9".into();
        assert_eq!(
            form.parse_inputs().unwrap_err().to_string(),
            "Price must be a number such as 4.99."
        );

        let mut form = filled_form();
        form.quantity = "99999999999".into();
        assert_eq!(
            form.parse_inputs().unwrap_err().to_string(),
            "Quantity must be a whole number of zero or more."
        );
    }

    #[test]
    fn numeric_fields_ignore_letters() {
        let mut form = ItemForm::default();
        form.active = ItemField::Quantity;
        assert!(!form.push_char('x'));
        assert!(form.push_char('7'));
        assert_eq!(form.quantity, "7");
    }

    #[test]
    fn tab_order_wraps_around() {
        let mut form = ItemForm::default();
        form.previous_field();
        assert_eq!(form.active, ItemField::MaxStock);
        form.next_field();
        assert_eq!(form.active, ItemField::Name);
    }

    #[test]
    fn edit_form_shows_unset_stock_as_empty() {
        let item = InventoryItem::new("Rope", Uuid::new_v4(), 3, Decimal::new(450, 2), None, Some(9));
        let form = ItemForm::from_item(&item, "Outdoor");
        assert_eq!(form.min_stock, "");
        assert_eq!(form.max_stock, "9");
        assert_eq!(form.price, "4.50");
        assert_eq!(form.category, "Outdoor");
    }

    #[test]
    fn supplier_form_requires_a_plausible_email() {
        let form = SupplierForm {
            name: "Acme".into(),
            email: "sales.acme.test".into(),
            ..SupplierForm::default()
        };
        assert!(form.parse_inputs().is_err());

        let form = SupplierForm {
            name: "Acme".into(),
            website: "  ".into(),
            ..SupplierForm::default()
        };
        let input = form.parse_inputs().unwrap();
        assert_eq!(input.website, None);
    }

    #[test]
    fn route_key_edits_then_submits() {
        let mut form = CategoryForm::default();
        form.error = Some("stale".into());
        for ch in "Saws".chars() {
            assert_eq!(route_key(&mut form, KeyCode::Char(ch)), FormKey::Handled);
        }
        assert_eq!(form.error, None);
        route_key(&mut form, KeyCode::Tab);
        route_key(&mut form, KeyCode::Char('T'));
        route_key(&mut form, KeyCode::Backspace);
        assert_eq!((form.name.as_str(), form.parent.as_str()), ("Saws", ""));
        assert_eq!(route_key(&mut form, KeyCode::Enter), FormKey::Submit);
        assert_eq!(route_key(&mut form, KeyCode::Esc), FormKey::Cancel);
    }

    #[test]
    fn category_form_treats_blank_parent_as_root() {
        let form = CategoryForm {
            name: "Saws".into(),
            parent: " ".into(),
            ..CategoryForm::default()
        };
        assert_eq!(form.parse_inputs().unwrap(), ("Saws".to_string(), None));
    }
}
