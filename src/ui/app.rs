use std::mem;

use anyhow::{anyhow, Result};
use crossterm::event::KeyCode;
use open::that as open_link;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table, TableState,
    Wrap,
};
use ratatui::Frame;
use rusqlite::Connection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::get_or_create_category;
use crate::db::{
    associate_item_with_supplier, delete_category, delete_item, delete_supplier,
    dissociate_item_from_supplier, fetch_category, fetch_category_by_name, in_transaction,
    insert_item, insert_supplier, update_category, update_item, update_supplier,
    StoreError,
};
use crate::interchange::{export_items, import_items};
use crate::models::{stock_display, Category, InventoryItem, Supplier};

use super::forms::{
    route_key, CategoryForm, ConfirmDelete, DeleteTarget, FormKey, ItemField, ItemForm,
    PathForm, SupplierForm, Transfer,
};
use super::helpers::{
    centered_rect, count_label, format_price, nav_offset, stock_badge, stock_range,
    surface_error, website_url,
};
use super::screens::{
    refresh_scope, CategoryScreen, ItemScope, ItemScreen, PickerEntry, SupplierItemsScreen,
    SupplierPicker, SupplierScreen,
};

/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Rows under the item table for the highlighted item's details.
const DETAIL_HEIGHT: u16 = 5;

const ITEM_COLUMNS: [Constraint; 6] = [
    Constraint::Percentage(30),
    Constraint::Percentage(28),
    Constraint::Length(6),
    Constraint::Length(11),
    Constraint::Length(10),
    Constraint::Length(5),
];

/// High-level navigation states. Each variant owns the data it renders.
enum Screen {
    Items(ItemScreen),
    Categories(CategoryScreen),
    Suppliers(SupplierScreen),
    SupplierItems(SupplierItemsScreen),
}

/// Fine-grained modes scoped to the current screen.
enum Mode {
    Normal,
    AddingItem(ItemForm),
    EditingItem {
        item: InventoryItem,
        form: ItemForm,
    },
    AddingCategory(CategoryForm),
    EditingCategory {
        category: Category,
        form: CategoryForm,
    },
    /// `picker` is set when the supplier is created from the link palette, so
    /// the new supplier gets linked and the palette comes back.
    AddingSupplier {
        picker: Option<SupplierPicker>,
        form: SupplierForm,
    },
    EditingSupplier {
        supplier: Supplier,
        form: SupplierForm,
    },
    ConfirmDelete(ConfirmDelete),
    PickingSupplier(SupplierPicker),
    EnteringPath(PathForm),
    Searching(String),
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

fn highlight_style() -> Style {
    Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD)
}

/// Central application state shared across the TUI.
pub struct App {
    conn: Connection,
    screen: Screen,
    mode: Mode,
    status: Option<StatusMessage>,
}

impl App {
    pub fn new(conn: Connection) -> Result<Self> {
        let items = ItemScreen::load(&conn, ItemScope::All)?;
        Ok(Self {
            conn,
            screen: Screen::Items(items),
            mode: Mode::Normal,
            status: None,
        })
    }

    /// Route one key press. Returns `true` when the user asked to quit. Errors
    /// from the store never escape; they land in the footer.
    pub fn handle_key(&mut self, code: KeyCode) -> bool {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        let next = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit),
            Mode::AddingItem(form) => self.handle_item_form(code, None, form),
            Mode::EditingItem { item, form } => self.handle_item_form(code, Some(item), form),
            Mode::AddingCategory(form) => self.handle_category_form(code, None, form),
            Mode::EditingCategory { category, form } => {
                self.handle_category_form(code, Some(category), form)
            }
            Mode::AddingSupplier { picker, form } => self.handle_new_supplier(code, picker, form),
            Mode::EditingSupplier { supplier, form } => {
                self.handle_edit_supplier(code, supplier, form)
            }
            Mode::ConfirmDelete(confirm) => self.handle_confirm_delete(code, confirm),
            Mode::PickingSupplier(picker) => self.handle_picker(code, picker),
            Mode::EnteringPath(form) => self.handle_path(code, form),
            Mode::Searching(query) => self.handle_search(code, query),
        };

        self.mode = match next {
            Ok(mode) => mode,
            Err(err) => {
                warn!(error = %err, "action failed");
                self.set_status(surface_error(&err), StatusKind::Error);
                Mode::Normal
            }
        };
        exit
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        if code == KeyCode::Char('q') {
            *exit = true;
            return Ok(Mode::Normal);
        }
        match self.screen {
            Screen::Items(_) => self.handle_items_key(code),
            Screen::Categories(_) => self.handle_categories_key(code),
            Screen::Suppliers(_) => self.handle_suppliers_key(code),
            Screen::SupplierItems(_) => self.handle_supplier_items_key(code),
        }
    }

    fn handle_items_key(&mut self, code: KeyCode) -> Result<Mode> {
        let Screen::Items(items) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        if let Some(offset) = nav_offset(code) {
            items.move_selection(offset);
            items.refresh_details(&self.conn)?;
            return Ok(Mode::Normal);
        }

        match code {
            KeyCode::Esc => {
                if items.filter.is_some() || items.show_only_low_stock {
                    items.show_only_low_stock = false;
                    items.set_filter(None);
                    items.refresh_details(&self.conn)?;
                } else if matches!(items.scope, ItemScope::Category(_)) {
                    self.open_items(ItemScope::All)?;
                }
            }
            KeyCode::Char('+') => {
                let mut form = ItemForm::default();
                if let ItemScope::Category(category) = &items.scope {
                    form.category = category.name.clone();
                }
                self.clear_status();
                return Ok(Mode::AddingItem(form));
            }
            KeyCode::Char('e') | KeyCode::Char('E') | KeyCode::Enter => {
                if let Some(item) = items.current_item().cloned() {
                    let category = fetch_category(&self.conn, item.category_id)?
                        .map(|category| category.name)
                        .unwrap_or_default();
                    self.clear_status();
                    return Ok(Mode::EditingItem {
                        form: ItemForm::from_item(&item, &category),
                        item,
                    });
                }
                self.set_status("No item selected to edit.", StatusKind::Error);
            }
            KeyCode::Char('-') | KeyCode::Delete => {
                if let Some(item) = items.current_item() {
                    let confirm = ConfirmDelete::item(item);
                    self.clear_status();
                    return Ok(Mode::ConfirmDelete(confirm));
                }
                self.set_status("No item selected to delete.", StatusKind::Error);
            }
            KeyCode::Char('f') | KeyCode::Char('/') => {
                return Ok(Mode::Searching(items.filter.clone().unwrap_or_default()));
            }
            KeyCode::Char('l') | KeyCode::Char('L') => {
                let message = if items.toggle_low_stock() {
                    "Showing items below their minimum stock."
                } else {
                    "Showing all items."
                };
                items.refresh_details(&self.conn)?;
                self.set_status(message, StatusKind::Info);
            }
            KeyCode::Char('u') | KeyCode::Char('U') => {
                if let Some(item) = items.current_item().cloned() {
                    let picker = SupplierPicker::load(&self.conn, item)?;
                    self.clear_status();
                    return Ok(Mode::PickingSupplier(picker));
                }
                self.set_status("No item selected.", StatusKind::Error);
            }
            KeyCode::Char('c') | KeyCode::Char('C') => {
                self.clear_status();
                self.open_categories(None)?;
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                self.clear_status();
                self.open_suppliers(None)?;
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_categories_key(&mut self, code: KeyCode) -> Result<Mode> {
        let Screen::Categories(tree) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        if let Some(offset) = nav_offset(code) {
            tree.move_selection(offset);
            return Ok(Mode::Normal);
        }

        match code {
            KeyCode::Esc | KeyCode::Char('i') | KeyCode::Char('I') => {
                self.clear_status();
                self.open_items(ItemScope::All)?;
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                self.clear_status();
                self.open_suppliers(None)?;
            }
            KeyCode::Char('+') => {
                self.clear_status();
                return Ok(Mode::AddingCategory(CategoryForm::default()));
            }
            KeyCode::Char('e') | KeyCode::Char('E') => {
                if let Some(category) = tree.current_category().cloned() {
                    let form = CategoryForm::from_category(
                        &category,
                        tree.parent_name(&category).as_deref(),
                    );
                    self.clear_status();
                    return Ok(Mode::EditingCategory { category, form });
                }
                self.set_status("No category selected to edit.", StatusKind::Error);
            }
            KeyCode::Char('-') | KeyCode::Delete => {
                if let Some(category) = tree.current_category() {
                    let confirm = ConfirmDelete::category(category);
                    self.clear_status();
                    return Ok(Mode::ConfirmDelete(confirm));
                }
                self.set_status("No category selected to delete.", StatusKind::Error);
            }
            KeyCode::Enter => {
                if let Some(category) = tree.current_category().cloned() {
                    self.clear_status();
                    self.open_items(ItemScope::Category(category))?;
                }
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_suppliers_key(&mut self, code: KeyCode) -> Result<Mode> {
        let Screen::Suppliers(directory) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        if let Some(offset) = nav_offset(code) {
            directory.move_selection(offset);
            return Ok(Mode::Normal);
        }

        match code {
            KeyCode::Esc | KeyCode::Char('i') | KeyCode::Char('I') => {
                self.clear_status();
                self.open_items(ItemScope::All)?;
            }
            KeyCode::Char('c') | KeyCode::Char('C') => {
                self.clear_status();
                self.open_categories(None)?;
            }
            KeyCode::Char('+') => {
                self.clear_status();
                return Ok(Mode::AddingSupplier {
                    picker: None,
                    form: SupplierForm::default(),
                });
            }
            KeyCode::Char('e') | KeyCode::Char('E') => {
                if let Some(supplier) = directory.current_supplier().cloned() {
                    self.clear_status();
                    return Ok(Mode::EditingSupplier {
                        form: SupplierForm::from_supplier(&supplier),
                        supplier,
                    });
                }
                self.set_status("No supplier selected to edit.", StatusKind::Error);
            }
            KeyCode::Char('-') | KeyCode::Delete => {
                if let Some(supplier) = directory.current_supplier() {
                    let confirm = ConfirmDelete::supplier(supplier);
                    self.clear_status();
                    return Ok(Mode::ConfirmDelete(confirm));
                }
                self.set_status("No supplier selected to delete.", StatusKind::Error);
            }
            KeyCode::Enter => {
                if let Some(supplier) = directory.current_supplier().cloned() {
                    self.clear_status();
                    let screen = SupplierItemsScreen::load(&self.conn, supplier)?;
                    self.screen = Screen::SupplierItems(screen);
                }
            }
            KeyCode::Char('o') | KeyCode::Char('O') => {
                if let Some(supplier) = directory.current_supplier().cloned() {
                    self.open_website(&supplier);
                }
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_supplier_items_key(&mut self, code: KeyCode) -> Result<Mode> {
        let Screen::SupplierItems(stocked) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        if let Some(offset) = nav_offset(code) {
            stocked.move_selection(offset);
            return Ok(Mode::Normal);
        }

        match code {
            KeyCode::Esc => {
                let focus = stocked.supplier.id();
                self.clear_status();
                self.open_suppliers(Some(focus))?;
            }
            KeyCode::Char('-') | KeyCode::Delete => {
                let Some(item) = stocked.current_item().cloned() else {
                    self.set_status("No item selected to unlink.", StatusKind::Error);
                    return Ok(Mode::Normal);
                };
                let supplier = stocked.supplier.clone();
                dissociate_item_from_supplier(&self.conn, item.id(), supplier.id())?;
                stocked.reload(&self.conn)?;
                info!(item = %item.name, supplier = %supplier.name, "unlinked item from supplier");
                self.set_status(
                    format!("Unlinked {} from {}.", item.name, supplier.name),
                    StatusKind::Info,
                );
            }
            KeyCode::Char('o') | KeyCode::Char('O') => {
                let supplier = stocked.supplier.clone();
                self.open_website(&supplier);
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_item_form(
        &mut self,
        code: KeyCode,
        editing: Option<InventoryItem>,
        mut form: ItemForm,
    ) -> Result<Mode> {
        match route_key(&mut form, code) {
            FormKey::Cancel => {
                let message = if editing.is_some() {
                    "Edit cancelled."
                } else {
                    "Add item cancelled."
                };
                self.set_status(message, StatusKind::Info);
                return Ok(Mode::Normal);
            }
            FormKey::Submit => {
                let result = self.save_item(editing.as_ref(), &form);
                if self.settle(result, &mut form.error).is_some() {
                    return Ok(Mode::Normal);
                }
            }
            FormKey::Handled => {}
        }

        Ok(match editing {
            Some(item) => Mode::EditingItem { item, form },
            None => Mode::AddingItem(form),
        })
    }

    fn handle_category_form(
        &mut self,
        code: KeyCode,
        editing: Option<Category>,
        mut form: CategoryForm,
    ) -> Result<Mode> {
        match route_key(&mut form, code) {
            FormKey::Cancel => {
                self.set_status("Category unchanged.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            FormKey::Submit => {
                let result = match &editing {
                    Some(category) => self.save_existing_category(category, &form),
                    None => self.save_new_category(&form),
                };
                if self.settle(result, &mut form.error).is_some() {
                    return Ok(Mode::Normal);
                }
            }
            FormKey::Handled => {}
        }

        Ok(match editing {
            Some(category) => Mode::EditingCategory { category, form },
            None => Mode::AddingCategory(form),
        })
    }

    fn handle_new_supplier(
        &mut self,
        code: KeyCode,
        picker: Option<SupplierPicker>,
        mut form: SupplierForm,
    ) -> Result<Mode> {
        match route_key(&mut form, code) {
            FormKey::Cancel => {
                self.set_status("Add supplier cancelled.", StatusKind::Info);
                return Ok(picker.map_or(Mode::Normal, Mode::PickingSupplier));
            }
            FormKey::Submit => {
                let result = self.save_new_supplier(&form);
                if let Some(supplier) = self.settle(result, &mut form.error) {
                    let Some(mut picker) = picker else {
                        return Ok(Mode::Normal);
                    };
                    associate_item_with_supplier(&self.conn, picker.item.id(), supplier.id())?;
                    picker.reload(&self.conn)?;
                    picker.focus(supplier.id());
                    self.set_status(
                        format!("Added {} and linked {}.", supplier.name, picker.item.name),
                        StatusKind::Info,
                    );
                    return Ok(Mode::PickingSupplier(picker));
                }
            }
            FormKey::Handled => {}
        }
        Ok(Mode::AddingSupplier { picker, form })
    }

    fn handle_edit_supplier(
        &mut self,
        code: KeyCode,
        supplier: Supplier,
        mut form: SupplierForm,
    ) -> Result<Mode> {
        match route_key(&mut form, code) {
            FormKey::Cancel => {
                self.set_status("Edit cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            FormKey::Submit => {
                let result = self.save_existing_supplier(&supplier, &form);
                if self.settle(result, &mut form.error).is_some() {
                    return Ok(Mode::Normal);
                }
            }
            FormKey::Handled => {}
        }
        Ok(Mode::EditingSupplier { supplier, form })
    }

    fn handle_confirm_delete(&mut self, code: KeyCode, confirm: ConfirmDelete) -> Result<Mode> {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                self.perform_delete(&confirm)?;
                Ok(Mode::Normal)
            }
            _ => Ok(Mode::ConfirmDelete(confirm)),
        }
    }

    fn handle_picker(&mut self, code: KeyCode, mut picker: SupplierPicker) -> Result<Mode> {
        if let Some(offset) = nav_offset(code) {
            picker.move_selection(offset);
            return Ok(Mode::PickingSupplier(picker));
        }

        match code {
            KeyCode::Esc => {
                self.reload_screen(Some(picker.item.id()))?;
                return Ok(Mode::Normal);
            }
            KeyCode::Enter | KeyCode::Char(' ') => match picker.current_entry().cloned() {
                Some(PickerEntry::CreateNew) => {
                    return Ok(Mode::AddingSupplier {
                        picker: Some(picker),
                        form: SupplierForm::default(),
                    });
                }
                Some(PickerEntry::Existing(supplier)) => {
                    let item = &picker.item;
                    let message = if picker.is_linked(&supplier) {
                        dissociate_item_from_supplier(&self.conn, item.id(), supplier.id())?;
                        format!("Unlinked {} from {}.", item.name, supplier.name)
                    } else {
                        associate_item_with_supplier(&self.conn, item.id(), supplier.id())?;
                        format!("Linked {} to {}.", item.name, supplier.name)
                    };
                    picker.reload(&self.conn)?;
                    self.set_status(message, StatusKind::Info);
                }
                None => {}
            },
            _ => {}
        }
        Ok(Mode::PickingSupplier(picker))
    }

    fn handle_path(&mut self, code: KeyCode, mut form: PathForm) -> Result<Mode> {
        match route_key(&mut form, code) {
            FormKey::Cancel => {
                self.set_status("Transfer cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            FormKey::Submit => {
                let result = self.run_transfer(&form);
                if self.settle(result, &mut form.error).is_some() {
                    return Ok(Mode::Normal);
                }
            }
            FormKey::Handled => {}
        }
        Ok(Mode::EnteringPath(form))
    }

    fn handle_search(&mut self, code: KeyCode, mut query: String) -> Result<Mode> {
        let Screen::Items(items) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        if let Some(offset) = nav_offset(code) {
            items.move_selection(offset);
            items.refresh_details(&self.conn)?;
            return Ok(Mode::Searching(query));
        }

        match code {
            KeyCode::Esc => {
                items.set_filter(None);
                items.refresh_details(&self.conn)?;
                return Ok(Mode::Normal);
            }
            KeyCode::Enter => return Ok(Mode::Normal),
            KeyCode::Backspace => {
                query.pop();
            }
            KeyCode::Char(ch) => query.push(ch),
            _ => return Ok(Mode::Searching(query)),
        }

        items.set_filter(Some(query.clone()));
        items.refresh_details(&self.conn)?;
        Ok(Mode::Searching(query))
    }

    /// Ctrl+E: prompt for a CSV file to export into.
    pub(crate) fn handle_ctrl_e(&mut self) {
        if matches!(self.mode, Mode::Normal) {
            self.clear_status();
            self.mode = Mode::EnteringPath(PathForm::new(Transfer::Export));
        }
    }

    /// Ctrl+L: prompt for a CSV file to load.
    pub(crate) fn handle_ctrl_l(&mut self) {
        if matches!(self.mode, Mode::Normal) {
            self.clear_status();
            self.mode = Mode::EnteringPath(PathForm::new(Transfer::Import));
        }
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let footer_height = FOOTER_HEIGHT.min(area.height);

        let (content_area, footer_area) = if area.height > footer_height {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(footer_height)])
                .split(area);
            (chunks[0], chunks[1])
        } else {
            (area, area)
        };

        match &self.screen {
            Screen::Items(items) => self.draw_items(frame, content_area, items),
            Screen::Categories(tree) => self.draw_categories(frame, content_area, tree),
            Screen::Suppliers(directory) => self.draw_suppliers(frame, content_area, directory),
            Screen::SupplierItems(stocked) => {
                self.draw_supplier_items(frame, content_area, stocked)
            }
        }

        if area.height >= footer_height {
            self.draw_footer(frame, footer_area);
        }

        match &self.mode {
            Mode::AddingItem(form) => self.draw_item_form(frame, area, "Add Item", form),
            Mode::EditingItem { form, .. } => self.draw_item_form(frame, area, "Edit Item", form),
            Mode::AddingCategory(form) => self.draw_form(
                frame,
                centered_rect(60, 35, area),
                "Add Category",
                form.lines(),
                form.cursor(),
                form.error.as_deref(),
            ),
            Mode::EditingCategory { form, .. } => self.draw_form(
                frame,
                centered_rect(60, 35, area),
                "Edit Category",
                form.lines(),
                form.cursor(),
                form.error.as_deref(),
            ),
            Mode::AddingSupplier { form, .. } => self.draw_form(
                frame,
                centered_rect(70, 45, area),
                "Add Supplier",
                form.lines(),
                form.cursor(),
                form.error.as_deref(),
            ),
            Mode::EditingSupplier { form, .. } => self.draw_form(
                frame,
                centered_rect(70, 45, area),
                "Edit Supplier",
                form.lines(),
                form.cursor(),
                form.error.as_deref(),
            ),
            Mode::ConfirmDelete(confirm) => self.draw_confirm_delete(frame, area, confirm),
            Mode::PickingSupplier(picker) => self.draw_picker(frame, area, picker),
            Mode::EnteringPath(form) => self.draw_form(
                frame,
                centered_rect(70, 30, area),
                form.transfer.title(),
                vec![form.line()],
                form.cursor(),
                form.error.as_deref(),
            ),
            Mode::Searching(query) => self.draw_search_bar(frame, area, query),
            Mode::Normal => {}
        }
    }

    fn draw_items(&self, frame: &mut Frame, area: Rect, items: &ItemScreen) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(DETAIL_HEIGHT)])
            .split(area);

        let mut title = items.title();
        if items.show_only_low_stock {
            title.push_str(" • low stock only");
        }
        if let Some(filter) = items.filter.as_deref().filter(|f| !f.trim().is_empty()) {
            title.push_str(&format!(" • matching \"{}\"", filter.trim()));
        }
        let block = Block::default().title(title).borders(Borders::ALL);

        if items.filtered_items.is_empty() {
            let text = if items.items.is_empty() {
                "No items yet. Press '+' to add one."
            } else {
                "No items match the current filters."
            };
            let message = Paragraph::new(text)
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(message, chunks[0]);
        } else {
            let header = Row::new(["Name", "Category", "Qty", "Price", "Min..Max", "Stock"])
                .style(Style::default().add_modifier(Modifier::BOLD));
            let rows = items.filtered_items.iter().map(|item| {
                let (badge, badge_style) = stock_badge(item);
                Row::new(vec![
                    Cell::from(item.name.clone()),
                    Cell::from(items.category_label(item)),
                    Cell::from(item.quantity.to_string()),
                    Cell::from(format_price(&item.price)),
                    Cell::from(stock_range(item)),
                    Cell::from(Span::styled(badge, badge_style)),
                ])
            });
            let table = Table::new(rows, ITEM_COLUMNS)
                .header(header)
                .block(block)
                .row_highlight_style(highlight_style())
                .highlight_symbol("▶ ");

            let mut state = TableState::default();
            state.select(Some(items.selected));
            frame.render_stateful_widget(table, chunks[0], &mut state);
        }

        self.draw_item_details(frame, chunks[1], items);
    }

    fn draw_item_details(&self, frame: &mut Frame, area: Rect, items: &ItemScreen) {
        let block = Block::default().title("Details").borders(Borders::ALL);
        let lines = match items.current_item() {
            Some(item) => {
                let suppliers = if items.selected_suppliers.is_empty() {
                    "none linked".to_string()
                } else {
                    items.selected_suppliers.join(", ")
                };
                vec![
                    Line::from(format!("ID: {}", item.id())),
                    Line::from(format!(
                        "Min stock: {}   Max stock: {}",
                        stock_display(item.min_stock),
                        stock_display(item.max_stock)
                    )),
                    Line::from(format!("Suppliers: {suppliers}")),
                ]
            }
            None => vec![Line::from("Nothing selected.")],
        };
        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn draw_categories(&self, frame: &mut Frame, area: Rect, tree: &CategoryScreen) {
        let block = Block::default().title("Categories").borders(Borders::ALL);
        if tree.rows.is_empty() {
            let message = Paragraph::new("No categories yet. Press '+' to add one.")
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(message, area);
            return;
        }

        let entries: Vec<ListItem> = tree
            .rows
            .iter()
            .map(|row| {
                let indent = "  ".repeat(row.depth);
                let branch = if row.depth > 0 { "└ " } else { "" };
                ListItem::new(Line::from(vec![
                    Span::raw(format!("{indent}{branch}{}", row.category.name)),
                    Span::styled(
                        format!("  ({})", count_label(row.item_count, "item")),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]))
            })
            .collect();

        let list = List::new(entries)
            .block(block)
            .highlight_style(highlight_style())
            .highlight_symbol("▶ ");
        let mut state = ListState::default();
        state.select(Some(tree.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_suppliers(&self, frame: &mut Frame, area: Rect, directory: &SupplierScreen) {
        let block = Block::default().title("Suppliers").borders(Borders::ALL);
        if directory.suppliers.is_empty() {
            let message = Paragraph::new("No suppliers yet. Press '+' to add one.")
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(message, area);
            return;
        }

        let header = Row::new(["Name", "Website", "Phone", "Email"])
            .style(Style::default().add_modifier(Modifier::BOLD));
        let rows = directory.suppliers.iter().map(|supplier| {
            Row::new(vec![
                supplier.name.clone(),
                supplier.website.clone().unwrap_or_default(),
                supplier.phone.clone().unwrap_or_default(),
                supplier.email.clone().unwrap_or_default(),
            ])
        });
        let table = Table::new(
            rows,
            [
                Constraint::Percentage(25),
                Constraint::Percentage(35),
                Constraint::Percentage(15),
                Constraint::Percentage(25),
            ],
        )
        .header(header)
        .block(block)
        .row_highlight_style(highlight_style())
        .highlight_symbol("▶ ");

        let mut state = TableState::default();
        state.select(Some(directory.selected));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_supplier_items(&self, frame: &mut Frame, area: Rect, stocked: &SupplierItemsScreen) {
        let title = format!("Items from {}", stocked.supplier.display_name());
        let block = Block::default().title(title).borders(Borders::ALL);
        if stocked.items.is_empty() {
            let message = Paragraph::new("No items are linked to this supplier.")
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(message, area);
            return;
        }

        let header = Row::new(["Name", "Category", "Qty", "Price"])
            .style(Style::default().add_modifier(Modifier::BOLD));
        let rows = stocked.items.iter().map(|item| {
            Row::new(vec![
                item.name.clone(),
                stocked.category_label(item),
                item.quantity.to_string(),
                format_price(&item.price),
            ])
        });
        let table = Table::new(
            rows,
            [
                Constraint::Percentage(40),
                Constraint::Percentage(40),
                Constraint::Length(6),
                Constraint::Length(11),
            ],
        )
        .header(header)
        .block(block)
        .row_highlight_style(highlight_style())
        .highlight_symbol("▶ ");

        let mut state = TableState::default();
        state.select(Some(stocked.selected));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let instructions = self.footer_instructions();

        let paragraph = Paragraph::new(vec![status_line, instructions]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let hints: &[(&str, &str)] = match (&self.screen, &self.mode) {
            (_, Mode::PickingSupplier(_)) => &[
                ("[↑↓]", "Navigate"),
                ("[Enter]", "Link/Unlink"),
                ("[Esc]", "Done"),
            ],
            (_, Mode::Searching(_)) => &[
                ("[type]", "Filter"),
                ("[↑↓]", "Navigate"),
                ("[Enter]", "Keep filter"),
                ("[Esc]", "Clear"),
            ],
            (_, Mode::ConfirmDelete(_)) => &[("[Y]", "Delete"), ("[N/Esc]", "Cancel")],
            (_, Mode::EnteringPath(_)) => &[("[Enter]", "Run"), ("[Esc]", "Cancel")],
            (
                _,
                Mode::AddingItem(_)
                | Mode::EditingItem { .. }
                | Mode::AddingCategory(_)
                | Mode::EditingCategory { .. }
                | Mode::AddingSupplier { .. }
                | Mode::EditingSupplier { .. },
            ) => &[
                ("[Tab]", "Next field"),
                ("[Enter]", "Save"),
                ("[Esc]", "Cancel"),
            ],
            (Screen::Items(_), Mode::Normal) => &[
                ("[+]", "Add"),
                ("[e]", "Edit"),
                ("[-]", "Delete"),
                ("[u]", "Suppliers"),
                ("[f]", "Search"),
                ("[l]", "Low stock"),
                ("[c]", "Categories"),
                ("[s]", "Supplier list"),
                ("[^E/^L]", "Export/Import"),
                ("[q]", "Quit"),
            ],
            (Screen::Categories(_), Mode::Normal) => &[
                ("[+]", "Add"),
                ("[e]", "Edit"),
                ("[-]", "Delete"),
                ("[Enter]", "Items"),
                ("[s]", "Suppliers"),
                ("[Esc]", "Back"),
                ("[q]", "Quit"),
            ],
            (Screen::Suppliers(_), Mode::Normal) => &[
                ("[+]", "Add"),
                ("[e]", "Edit"),
                ("[-]", "Delete"),
                ("[Enter]", "Items"),
                ("[o]", "Website"),
                ("[c]", "Categories"),
                ("[Esc]", "Back"),
                ("[q]", "Quit"),
            ],
            (Screen::SupplierItems(_), Mode::Normal) => &[
                ("[↑↓]", "Navigate"),
                ("[-]", "Unlink"),
                ("[o]", "Website"),
                ("[Esc]", "Back"),
                ("[q]", "Quit"),
            ],
        };

        let mut spans = Vec::with_capacity(hints.len() * 2);
        for (key, label) in hints {
            spans.push(Span::styled(key.to_string(), key_style));
            spans.push(Span::raw(format!(" {label}   ")));
        }
        Line::from(spans)
    }

    fn draw_search_bar(&self, frame: &mut Frame, area: Rect, query: &str) {
        let height = 3u16.min(area.height);
        let popup_area = Rect {
            x: area.x,
            y: area.y,
            width: area.width,
            height,
        };
        frame.render_widget(Clear, popup_area);

        let block = Block::default().borders(Borders::ALL).title("Search");
        let paragraph = Paragraph::new(Span::raw(format!("Search: {query}")))
            .block(block.clone())
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, popup_area);

        let inner = block.inner(popup_area);
        let cursor_x = inner.x + "Search: ".len() as u16 + query.chars().count() as u16;
        frame.set_cursor_position((cursor_x, inner.y));
    }

    fn draw_item_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &ItemForm) {
        let mut lines: Vec<Line<'static>> = ItemField::ALL
            .iter()
            .map(|field| form.build_line(*field))
            .collect();
        lines.push(Line::from(Span::styled(
            "Parent category is only used when the category is new.",
            Style::default().fg(Color::DarkGray),
        )));
        self.draw_form(
            frame,
            centered_rect(70, 60, area),
            title,
            lines,
            form.cursor(),
            form.error.as_deref(),
        );
    }

    /// Shared popup for every form: field lines, then the error or a key hint,
    /// with the terminal cursor parked on the active field.
    fn draw_form(
        &self,
        frame: &mut Frame,
        popup_area: Rect,
        title: &str,
        mut lines: Vec<Line<'static>>,
        cursor: (u16, u16),
        error: Option<&str>,
    ) {
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title.to_string()).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        lines.push(Line::from(""));
        match error {
            Some(error) => lines.push(Line::from(Span::styled(
                error.to_string(),
                Style::default().fg(Color::Red),
            ))),
            None => lines.push(Line::from(Span::styled(
                "Enter to save • Tab to switch • Esc to cancel",
                Style::default().fg(Color::Gray),
            ))),
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        let (column, row) = cursor;
        frame.set_cursor_position((inner.x + column, inner.y + row));
    }

    fn draw_confirm_delete(&self, frame: &mut Frame, area: Rect, confirm: &ConfirmDelete) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Confirm Deletion")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let note = match confirm.target {
            DeleteTarget::Item(_) => "Its supplier links are removed as well.",
            DeleteTarget::Category(_) => {
                "Only categories without items or subcategories can be deleted."
            }
            DeleteTarget::Supplier(_) => "Items stay; only their links to this supplier go.",
        };

        let lines = vec![
            Line::from(format!("Delete {} '{}'?", confirm.kind(), confirm.label)),
            Line::from(note),
            Line::from(""),
            Line::from(Span::styled(
                "Press Y to confirm or N / Esc to cancel.",
                Style::default().fg(Color::Gray),
            )),
        ];

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn draw_picker(&self, frame: &mut Frame, area: Rect, picker: &SupplierPicker) {
        let popup_area = centered_rect(70, 50, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(format!("Suppliers for {}", picker.item.name))
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let entries: Vec<ListItem> = picker
            .entries
            .iter()
            .map(|entry| match entry {
                PickerEntry::CreateNew => ListItem::new("Create a new supplier"),
                PickerEntry::Existing(supplier) => {
                    let checkbox = if picker.is_linked(supplier) {
                        "[x]"
                    } else {
                        "[ ]"
                    };
                    ListItem::new(format!("{checkbox} {}", supplier.display_name()))
                }
            })
            .collect();

        let list = List::new(entries)
            .block(Block::default().borders(Borders::NONE))
            .highlight_style(Style::default().fg(Color::Yellow))
            .highlight_symbol("▶ ");

        let mut list_state = ListState::default();
        list_state.select(Some(picker.selected));
        frame.render_stateful_widget(list, inner, &mut list_state);
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    /// Turn a save result into "close the form" (`Some`) or an error shown both
    /// inside the form and in the footer (`None`).
    fn settle<T>(&mut self, result: Result<T>, error: &mut Option<String>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                let message = surface_error(&err);
                *error = Some(message.clone());
                self.set_status(message, StatusKind::Error);
                None
            }
        }
    }

    /// Resolve the category (creating it on demand) and write the item in one
    /// transaction, so a rejected item never leaves a stray category behind.
    fn save_item(&mut self, editing: Option<&InventoryItem>, form: &ItemForm) -> Result<()> {
        let input = form.parse_inputs()?;
        let item = in_transaction(&self.conn, |conn| {
            let category =
                get_or_create_category(conn, &input.category, input.parent.as_deref())?;
            match editing {
                Some(existing) => {
                    let mut item = existing.clone();
                    input.apply_to(&mut item, category.id());
                    item.validate()?;
                    if !update_item(conn, &item)? {
                        return Err(StoreError::missing("Item", item.id()));
                    }
                    Ok(item)
                }
                None => {
                    let item = input.clone().into_item(category.id());
                    item.validate()?;
                    insert_item(conn, &item)?;
                    Ok(item)
                }
            }
        })?;

        info!(item = %item.name, item_id = %item.id(), "saved item");
        self.reload_screen(Some(item.id()))?;
        self.set_status(format!("Saved {}.", item.name), StatusKind::Info);
        Ok(())
    }

    fn save_new_category(&mut self, form: &CategoryForm) -> Result<()> {
        let (name, parent) = form.parse_inputs()?;
        let category = in_transaction(&self.conn, |conn| {
            if fetch_category_by_name(conn, &name)?.is_some() {
                return Err(StoreError::duplicate("Category", &name));
            }
            get_or_create_category(conn, &name, parent.as_deref())
        })?;

        self.reload_screen(Some(category.id()))?;
        self.set_status(format!("Added category {}.", category.name), StatusKind::Info);
        Ok(())
    }

    /// Rename or move a category. Unlike item entry, the parent has to exist
    /// already.
    fn save_existing_category(&mut self, category: &Category, form: &CategoryForm) -> Result<()> {
        let (name, parent) = form.parse_inputs()?;
        let parent_id = match parent {
            Some(parent) => Some(
                fetch_category_by_name(&self.conn, &parent)?
                    .ok_or_else(|| anyhow!("Parent category '{parent}' does not exist."))?
                    .id(),
            ),
            None => None,
        };

        let mut updated = category.clone();
        updated.name = name;
        updated.parent_id = parent_id;
        if !update_category(&self.conn, &updated)? {
            return Err(anyhow!("Category '{}' no longer exists.", category.name));
        }

        self.reload_screen(Some(updated.id()))?;
        self.set_status(format!("Updated category {}.", updated.name), StatusKind::Info);
        Ok(())
    }

    fn save_new_supplier(&mut self, form: &SupplierForm) -> Result<Supplier> {
        let input = form.parse_inputs()?;
        let supplier = Supplier::new(input.name, input.website, input.phone, input.email);
        insert_supplier(&self.conn, &supplier)?;
        self.reload_screen(Some(supplier.id()))?;
        self.set_status(format!("Added supplier {}.", supplier.name), StatusKind::Info);
        Ok(supplier)
    }

    fn save_existing_supplier(&mut self, supplier: &Supplier, form: &SupplierForm) -> Result<()> {
        let input = form.parse_inputs()?;
        let mut updated = supplier.clone();
        updated.name = input.name;
        updated.website = input.website;
        updated.phone = input.phone;
        updated.email = input.email;
        if !update_supplier(&self.conn, &updated)? {
            return Err(anyhow!("Supplier '{}' no longer exists.", supplier.name));
        }

        self.reload_screen(Some(updated.id()))?;
        self.set_status(format!("Updated supplier {}.", updated.name), StatusKind::Info);
        Ok(())
    }

    fn perform_delete(&mut self, confirm: &ConfirmDelete) -> Result<()> {
        let deleted = match confirm.target {
            DeleteTarget::Item(id) => delete_item(&self.conn, id)?,
            DeleteTarget::Category(id) => delete_category(&self.conn, id)?,
            DeleteTarget::Supplier(id) => delete_supplier(&self.conn, id)?,
        };
        self.reload_screen(None)?;

        if deleted {
            self.set_status(
                format!("Deleted {} {}.", confirm.kind(), confirm.label),
                StatusKind::Info,
            );
        } else {
            self.set_status(
                format!("{} was already gone.", confirm.label),
                StatusKind::Error,
            );
        }
        Ok(())
    }

    fn run_transfer(&mut self, form: &PathForm) -> Result<()> {
        let path = form.parse_inputs()?;
        match form.transfer {
            Transfer::Export => {
                let count = export_items(&self.conn, &path)?;
                self.set_status(
                    format!("Exported {} to {}.", count_label(count, "item"), path.display()),
                    StatusKind::Info,
                );
            }
            Transfer::Import => {
                let summary = import_items(&self.conn, &path)?;
                self.reload_screen(None)?;
                self.set_status(
                    format!(
                        "Imported {} new and {} updated from {}.",
                        count_label(summary.inserted, "item"),
                        count_label(summary.updated, "item"),
                        path.display()
                    ),
                    StatusKind::Info,
                );
            }
        }
        Ok(())
    }

    fn open_website(&mut self, supplier: &Supplier) {
        let Some(website) = supplier
            .website
            .as_deref()
            .map(str::trim)
            .filter(|website| !website.is_empty())
        else {
            self.set_status(
                format!("{} does not have a website.", supplier.name),
                StatusKind::Error,
            );
            return;
        };

        let url = website_url(website);
        match open_link(&url) {
            Ok(()) => self.set_status(format!("Opened {url}."), StatusKind::Info),
            Err(err) => {
                self.set_status(format!("Failed to open {url}: {err}"), StatusKind::Error)
            }
        }
    }

    fn open_items(&mut self, scope: ItemScope) -> Result<()> {
        self.screen = Screen::Items(ItemScreen::load(&self.conn, scope)?);
        Ok(())
    }

    fn open_categories(&mut self, focus: Option<Uuid>) -> Result<()> {
        self.screen = Screen::Categories(CategoryScreen::load(&self.conn, focus)?);
        Ok(())
    }

    fn open_suppliers(&mut self, focus: Option<Uuid>) -> Result<()> {
        self.screen = Screen::Suppliers(SupplierScreen::load(&self.conn, focus)?);
        Ok(())
    }

    /// Refresh whatever the current screen shows after a write, moving the
    /// cursor onto `focus` when it names a visible row.
    fn reload_screen(&mut self, focus: Option<Uuid>) -> Result<()> {
        match &mut self.screen {
            Screen::Items(items) => {
                items.scope = refresh_scope(&self.conn, &items.scope)?;
                items.reload(&self.conn, focus)
            }
            Screen::Categories(tree) => tree.reload(&self.conn, focus),
            Screen::Suppliers(directory) => directory.reload(&self.conn, focus),
            Screen::SupplierItems(stocked) => stocked.reload(&self.conn),
        }
    }
}
