use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use rusqlite::Connection;
use uuid::Uuid;

use crate::catalog::category_tree;
use crate::db::{
    category_path, fetch_categories, fetch_category, fetch_items, fetch_items_by_supplier,
    fetch_items_in_category, fetch_suppliers, fetch_suppliers_for_item,
};
use crate::models::{Category, InventoryItem, StockStatus, Supplier};

use super::helpers::step_selection;

/// Full path ("Tools / Saws") for every category, keyed by id. Items only
/// carry the id, so list views resolve names through this.
pub(crate) fn load_category_paths(conn: &Connection) -> Result<HashMap<Uuid, String>> {
    let categories = fetch_categories(conn).context("Failed to load categories.")?;
    let mut paths = HashMap::with_capacity(categories.len());
    for category in &categories {
        let path = category_path(conn, category.id())?.unwrap_or_else(|| category.name.clone());
        paths.insert(category.id(), path);
    }
    Ok(paths)
}

/// Which slice of the inventory the item list shows.
#[derive(Clone)]
pub(crate) enum ItemScope {
    All,
    Category(Category),
}

/// State behind the main item table.
pub(crate) struct ItemScreen {
    pub(crate) scope: ItemScope,
    pub(crate) items: Vec<InventoryItem>,
    pub(crate) filtered_items: Vec<InventoryItem>,
    pub(crate) filter: Option<String>,
    pub(crate) show_only_low_stock: bool,
    pub(crate) selected: usize,
    pub(crate) category_paths: HashMap<Uuid, String>,
    /// Supplier names for the highlighted item, refreshed on selection change.
    pub(crate) selected_suppliers: Vec<String>,
}

impl ItemScreen {
    pub(crate) fn load(conn: &Connection, scope: ItemScope) -> Result<Self> {
        let mut screen = Self {
            scope,
            items: Vec::new(),
            filtered_items: Vec::new(),
            filter: None,
            show_only_low_stock: false,
            selected: 0,
            category_paths: HashMap::new(),
            selected_suppliers: Vec::new(),
        };
        screen.reload(conn, None)?;
        Ok(screen)
    }

    /// Re-read items for the current scope, keeping the cursor on `focus` when
    /// it is still visible.
    pub(crate) fn reload(&mut self, conn: &Connection, focus: Option<Uuid>) -> Result<()> {
        self.items = match &self.scope {
            ItemScope::All => fetch_items(conn),
            ItemScope::Category(category) => fetch_items_in_category(conn, category.id()),
        }
        .context("Failed to load items.")?;
        self.category_paths = load_category_paths(conn)?;
        self.apply_filter();

        if let Some(id) = focus {
            if let Some(index) = self.filtered_items.iter().position(|item| item.id() == id) {
                self.selected = index;
            }
        }
        self.refresh_details(conn)
    }

    pub(crate) fn refresh_details(&mut self, conn: &Connection) -> Result<()> {
        self.selected_suppliers = match self.current_item() {
            Some(item) => fetch_suppliers_for_item(conn, item.id())?
                .into_iter()
                .map(|supplier| supplier.name)
                .collect(),
            None => Vec::new(),
        };
        Ok(())
    }

    pub(crate) fn title(&self) -> String {
        match &self.scope {
            ItemScope::All => "Inventory".to_string(),
            ItemScope::Category(category) => {
                let path = self
                    .category_paths
                    .get(&category.id())
                    .map(String::as_str)
                    .unwrap_or(category.name.as_str());
                format!("Inventory • {path}")
            }
        }
    }

    pub(crate) fn category_label(&self, item: &InventoryItem) -> String {
        self.category_paths
            .get(&item.category_id)
            .cloned()
            .unwrap_or_else(|| item.category_id.to_string())
    }

    pub(crate) fn apply_filter(&mut self) {
        let query = self
            .filter
            .as_ref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());

        self.filtered_items = self
            .items
            .iter()
            .filter(|item| match &query {
                Some(q) => {
                    item.name.to_lowercase().contains(q)
                        || self
                            .category_paths
                            .get(&item.category_id)
                            .is_some_and(|path| path.to_lowercase().contains(q))
                }
                None => true,
            })
            .filter(|item| !self.show_only_low_stock || item.stock_status() == StockStatus::Below)
            .cloned()
            .collect();

        self.selected = step_selection(self.selected, self.filtered_items.len(), 0);
    }

    pub(crate) fn set_filter(&mut self, filter: Option<String>) {
        self.filter = filter;
        self.apply_filter();
    }

    pub(crate) fn toggle_low_stock(&mut self) -> bool {
        self.show_only_low_stock = !self.show_only_low_stock;
        self.apply_filter();
        self.show_only_low_stock
    }

    pub(crate) fn current_item(&self) -> Option<&InventoryItem> {
        self.filtered_items.get(self.selected)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = step_selection(self.selected, self.filtered_items.len(), offset);
    }
}

/// One line of the category tree.
pub(crate) struct CategoryRow {
    pub(crate) depth: usize,
    pub(crate) category: Category,
    pub(crate) item_count: usize,
}

/// Category hierarchy rendered as an indented list.
pub(crate) struct CategoryScreen {
    pub(crate) rows: Vec<CategoryRow>,
    pub(crate) selected: usize,
}

impl CategoryScreen {
    pub(crate) fn load(conn: &Connection, focus: Option<Uuid>) -> Result<Self> {
        let mut screen = Self {
            rows: Vec::new(),
            selected: 0,
        };
        screen.reload(conn, focus)?;
        Ok(screen)
    }

    pub(crate) fn reload(&mut self, conn: &Connection, focus: Option<Uuid>) -> Result<()> {
        let categories = fetch_categories(conn).context("Failed to load categories.")?;
        let mut counts: HashMap<Uuid, usize> = HashMap::new();
        for item in fetch_items(conn)? {
            *counts.entry(item.category_id).or_default() += 1;
        }

        self.rows = category_tree(&categories)
            .into_iter()
            .map(|(depth, category)| CategoryRow {
                depth,
                item_count: counts.get(&category.id()).copied().unwrap_or(0),
                category: category.clone(),
            })
            .collect();

        if let Some(id) = focus {
            if let Some(index) = self.rows.iter().position(|row| row.category.id() == id) {
                self.selected = index;
            }
        }
        self.selected = step_selection(self.selected, self.rows.len(), 0);
        Ok(())
    }

    pub(crate) fn current_category(&self) -> Option<&Category> {
        self.rows.get(self.selected).map(|row| &row.category)
    }

    /// Name of `category`'s parent as shown in the tree, if it has one.
    pub(crate) fn parent_name(&self, category: &Category) -> Option<String> {
        let parent_id = category.parent_id?;
        self.rows
            .iter()
            .find(|row| row.category.id() == parent_id)
            .map(|row| row.category.name.clone())
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = step_selection(self.selected, self.rows.len(), offset);
    }
}

/// Supplier directory.
pub(crate) struct SupplierScreen {
    pub(crate) suppliers: Vec<Supplier>,
    pub(crate) selected: usize,
}

impl SupplierScreen {
    pub(crate) fn load(conn: &Connection, focus: Option<Uuid>) -> Result<Self> {
        let mut screen = Self {
            suppliers: Vec::new(),
            selected: 0,
        };
        screen.reload(conn, focus)?;
        Ok(screen)
    }

    pub(crate) fn reload(&mut self, conn: &Connection, focus: Option<Uuid>) -> Result<()> {
        self.suppliers = fetch_suppliers(conn).context("Failed to load suppliers.")?;
        if let Some(id) = focus {
            if let Some(index) = self.suppliers.iter().position(|s| s.id() == id) {
                self.selected = index;
            }
        }
        self.selected = step_selection(self.selected, self.suppliers.len(), 0);
        Ok(())
    }

    pub(crate) fn current_supplier(&self) -> Option<&Supplier> {
        self.suppliers.get(self.selected)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = step_selection(self.selected, self.suppliers.len(), offset);
    }
}

/// Items stocked by a single supplier.
pub(crate) struct SupplierItemsScreen {
    pub(crate) supplier: Supplier,
    pub(crate) items: Vec<InventoryItem>,
    pub(crate) category_paths: HashMap<Uuid, String>,
    pub(crate) selected: usize,
}

impl SupplierItemsScreen {
    pub(crate) fn load(conn: &Connection, supplier: Supplier) -> Result<Self> {
        let mut screen = Self {
            supplier,
            items: Vec::new(),
            category_paths: HashMap::new(),
            selected: 0,
        };
        screen.reload(conn)?;
        Ok(screen)
    }

    pub(crate) fn reload(&mut self, conn: &Connection) -> Result<()> {
        self.items = fetch_items_by_supplier(conn, self.supplier.id())
            .context("Failed to load the supplier's items.")?;
        self.category_paths = load_category_paths(conn)?;
        self.selected = step_selection(self.selected, self.items.len(), 0);
        Ok(())
    }

    pub(crate) fn current_item(&self) -> Option<&InventoryItem> {
        self.items.get(self.selected)
    }

    pub(crate) fn category_label(&self, item: &InventoryItem) -> String {
        self.category_paths
            .get(&item.category_id)
            .cloned()
            .unwrap_or_else(|| item.category_id.to_string())
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = step_selection(self.selected, self.items.len(), offset);
    }
}

/// Entries shown in the supplier picker.
#[derive(Clone)]
pub(crate) enum PickerEntry {
    CreateNew,
    Existing(Supplier),
}

/// Palette for linking suppliers to one item. Enter toggles the link on the
/// highlighted supplier right away.
pub(crate) struct SupplierPicker {
    pub(crate) item: InventoryItem,
    pub(crate) entries: Vec<PickerEntry>,
    pub(crate) linked: HashSet<Uuid>,
    pub(crate) selected: usize,
}

impl SupplierPicker {
    pub(crate) fn load(conn: &Connection, item: InventoryItem) -> Result<Self> {
        let mut picker = Self {
            item,
            entries: Vec::new(),
            linked: HashSet::new(),
            selected: 0,
        };
        picker.reload(conn)?;
        Ok(picker)
    }

    pub(crate) fn reload(&mut self, conn: &Connection) -> Result<()> {
        let mut entries = vec![PickerEntry::CreateNew];
        entries.extend(
            fetch_suppliers(conn)?
                .into_iter()
                .map(PickerEntry::Existing),
        );
        self.entries = entries;
        self.linked = fetch_suppliers_for_item(conn, self.item.id())?
            .iter()
            .map(Supplier::id)
            .collect();
        self.selected = step_selection(self.selected, self.entries.len(), 0);
        Ok(())
    }

    /// Move the cursor onto `supplier`, used after creating one from here.
    pub(crate) fn focus(&mut self, supplier: Uuid) {
        if let Some(index) = self.entries.iter().position(
            |entry| matches!(entry, PickerEntry::Existing(s) if s.id() == supplier),
        ) {
            self.selected = index;
        }
    }

    pub(crate) fn current_entry(&self) -> Option<&PickerEntry> {
        self.entries.get(self.selected)
    }

    pub(crate) fn is_linked(&self, supplier: &Supplier) -> bool {
        self.linked.contains(&supplier.id())
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = step_selection(self.selected, self.entries.len(), offset);
    }
}

/// Reload the category behind an `ItemScope` in case it was renamed.
pub(crate) fn refresh_scope(conn: &Connection, scope: &ItemScope) -> Result<ItemScope> {
    Ok(match scope {
        ItemScope::All => ItemScope::All,
        ItemScope::Category(category) => match fetch_category(conn, category.id())? {
            Some(category) => ItemScope::Category(category),
            None => ItemScope::All,
        },
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::db::{
        associate_item_with_supplier, insert_category, insert_item, insert_supplier, open_in_memory,
    };

    fn seeded() -> (Connection, Category, InventoryItem) {
        let conn = open_in_memory().unwrap();
        let tools = Category::new("Tools", None);
        insert_category(&conn, &tools).unwrap();
        let saws = Category::new("Saws", Some(tools.id()));
        insert_category(&conn, &saws).unwrap();
        let hammer = InventoryItem::new("Hammer", tools.id(), 1, Decimal::new(999, 2), Some(5), None);
        let saw = InventoryItem::new("Hand Saw", saws.id(), 8, Decimal::new(1500, 2), Some(2), Some(10));
        insert_item(&conn, &hammer).unwrap();
        insert_item(&conn, &saw).unwrap();
        (conn, saws, hammer)
    }

    #[test]
    fn search_matches_name_or_category_path() {
        let (conn, _, _) = seeded();
        let mut screen = ItemScreen::load(&conn, ItemScope::All).unwrap();
        assert_eq!(screen.filtered_items.len(), 2);

        screen.set_filter(Some("saws".into()));
        assert_eq!(screen.filtered_items.len(), 1);
        assert_eq!(screen.filtered_items[0].name, "Hand Saw");

        screen.set_filter(Some("HAM".into()));
        assert_eq!(screen.filtered_items[0].name, "Hammer");
    }

    #[test]
    fn low_stock_toggle_keeps_only_items_below_minimum() {
        let (conn, _, hammer) = seeded();
        let mut screen = ItemScreen::load(&conn, ItemScope::All).unwrap();
        assert!(screen.toggle_low_stock());
        assert_eq!(screen.filtered_items.len(), 1);
        assert_eq!(screen.current_item().map(InventoryItem::id), Some(hammer.id()));
    }

    #[test]
    fn category_scope_and_paths() {
        let (conn, saws, _) = seeded();
        let screen = ItemScreen::load(&conn, ItemScope::Category(saws)).unwrap();
        assert_eq!(screen.items.len(), 1);
        assert_eq!(screen.title(), "Inventory • Tools / Saws");
        assert_eq!(screen.category_label(&screen.items[0]), "Tools / Saws");
    }

    #[test]
    fn details_follow_the_selection() {
        let (conn, _, hammer) = seeded();
        let acme = Supplier::new("Acme", None, None, None);
        insert_supplier(&conn, &acme).unwrap();
        associate_item_with_supplier(&conn, hammer.id(), acme.id()).unwrap();

        let mut screen = ItemScreen::load(&conn, ItemScope::All).unwrap();
        assert_eq!(screen.selected_suppliers, vec!["Acme".to_string()]);
        screen.move_selection(1);
        screen.refresh_details(&conn).unwrap();
        assert!(screen.selected_suppliers.is_empty());
    }

    #[test]
    fn category_screen_counts_items_per_node() {
        let (conn, saws, _) = seeded();
        let screen = CategoryScreen::load(&conn, None).unwrap();
        let summary: Vec<(usize, &str, usize)> = screen
            .rows
            .iter()
            .map(|row| (row.depth, row.category.name.as_str(), row.item_count))
            .collect();
        assert_eq!(summary, vec![(0, "Tools", 1), (1, "Saws", 1)]);
        assert_eq!(screen.parent_name(&saws).as_deref(), Some("Tools"));
    }

    #[test]
    fn picker_marks_linked_suppliers() {
        let (conn, _, hammer) = seeded();
        let acme = Supplier::new("Acme", None, None, None);
        let bolt = Supplier::new("Bolt Co", None, None, None);
        insert_supplier(&conn, &acme).unwrap();
        insert_supplier(&conn, &bolt).unwrap();
        associate_item_with_supplier(&conn, hammer.id(), bolt.id()).unwrap();

        let mut picker = SupplierPicker::load(&conn, hammer).unwrap();
        assert_eq!(picker.entries.len(), 3);
        assert!(picker.is_linked(&bolt));
        assert!(!picker.is_linked(&acme));

        picker.focus(bolt.id());
        assert_eq!(picker.selected, 2);
    }
}
