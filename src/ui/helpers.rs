use anyhow::Error;
use crossterm::event::KeyCode;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use rust_decimal::Decimal;

use crate::models::{stock_display, InventoryItem, StockStatus};

/// Produce a rectangle centered within `area` that spans the requested percent
/// of the width and height. Used for modal dialogs.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(area);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(horizontal[1]);

    vertical[1]
}

/// Collapse an error into the single line shown in the footer. The outermost
/// message already names the failing field or record.
pub(crate) fn surface_error(err: &Error) -> String {
    let text = err.to_string();
    text.lines().next().unwrap_or_default().trim().to_string()
}

/// Rows skipped by PageUp/PageDown.
const PAGE: isize = 5;

/// Cursor movement for the list navigation keys. Home and End saturate to the
/// ends of the list.
pub(crate) fn nav_offset(code: KeyCode) -> Option<isize> {
    match code {
        KeyCode::Up => Some(-1),
        KeyCode::Down => Some(1),
        KeyCode::PageUp => Some(-PAGE),
        KeyCode::PageDown => Some(PAGE),
        KeyCode::Home => Some(isize::MIN),
        KeyCode::End => Some(isize::MAX),
        _ => None,
    }
}

/// Clamp `selected + offset` into `0..len`. Empty lists always sit at zero.
pub(crate) fn step_selection(selected: usize, len: usize, offset: isize) -> usize {
    if len == 0 {
        return 0;
    }
    let target = (selected as isize).saturating_add(offset);
    target.clamp(0, len as isize - 1) as usize
}

/// "1 item", "3 items".
pub(crate) fn count_label(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Browsers need a scheme; supplier websites are often typed without one.
pub(crate) fn website_url(website: &str) -> String {
    let website = website.trim();
    if website.contains("://") {
        website.to_string()
    } else {
        format!("https://{website}")
    }
}

pub(crate) fn format_price(price: &Decimal) -> String {
    format!("${price:.2}")
}

/// Short label and colour for the stock column.
pub(crate) fn stock_badge(item: &InventoryItem) -> (&'static str, Style) {
    if item.min_stock.is_none() && item.max_stock.is_none() {
        return ("", Style::default());
    }
    match item.stock_status() {
        StockStatus::Below => ("LOW", Style::default().fg(Color::Red)),
        StockStatus::Above => ("OVER", Style::default().fg(Color::Yellow)),
        StockStatus::Within => ("OK", Style::default().fg(Color::Green)),
    }
}

/// `min..max` summary for the table, using the model's "Not Set" wording only
/// when neither bound exists.
pub(crate) fn stock_range(item: &InventoryItem) -> String {
    match (item.min_stock, item.max_stock) {
        (None, None) => stock_display(None),
        (min, max) => format!(
            "{}..{}",
            min.map(|v| v.to_string()).unwrap_or_default(),
            max.map(|v| v.to_string()).unwrap_or_default()
        ),
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{anyhow, Context};
    use uuid::Uuid;

    use super::*;

    #[test]
    fn selection_is_clamped() {
        assert_eq!(step_selection(0, 0, 5), 0);
        assert_eq!(step_selection(2, 5, -10), 0);
        assert_eq!(step_selection(2, 5, 10), 4);
        assert_eq!(step_selection(2, 5, 1), 3);
        assert_eq!(step_selection(2, 5, isize::MAX), 4);
        assert_eq!(step_selection(2, 5, isize::MIN), 0);
    }

    #[test]
    fn labels_and_urls() {
        assert_eq!(count_label(1, "item"), "1 item");
        assert_eq!(count_label(0, "item"), "0 items");
        assert_eq!(website_url(" acme.test "), "https://acme.test");
        assert_eq!(website_url("http://acme.test"), "http://acme.test");
    }

    #[test]
    fn surfaced_error_is_the_outer_message_on_one_line() {
        let err = Err::<(), _>(anyhow!("disk full\nmore detail"))
            .context("Failed to save item.")
            .unwrap_err();
        assert_eq!(surface_error(&err), "Failed to save item.");

        let err = anyhow!("first line\nsecond line");
        assert_eq!(surface_error(&err), "first line");
    }

    #[test]
    fn prices_always_show_cents() {
        assert_eq!(format_price(&Decimal::new(5, 0)), "$5.00");
        assert_eq!(format_price(&Decimal::new(999, 2)), "$9.99");
    }

    #[test]
    fn stock_summary_distinguishes_unset_from_zero() {
        let mut item = InventoryItem::new("Rope", Uuid::new_v4(), 1, Decimal::ONE, None, None);
        assert_eq!(stock_range(&item), "Not Set");
        assert_eq!(stock_badge(&item).0, "");

        item.min_stock = Some(0);
        assert_eq!(stock_range(&item), "0..");
        assert_eq!(stock_badge(&item).0, "OK");

        item.min_stock = Some(5);
        assert_eq!(stock_badge(&item).0, "LOW");
    }
}
