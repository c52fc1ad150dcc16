//! Plain-text rendering for tables, event cards and notices.

use client_core::{
    render::{empty_bucket_message, event_card, group_by_category},
    tabs::FilterChoice,
    Notice, NoticeLevel, Notifier, Table,
};
use shared::domain::{Category, Entity};

/// Prints notices as they arrive. Errors go to stderr.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => println!("{}", notice.message),
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
        }
    }
}

/// Current page of `table` with aligned columns and a footer.
pub fn table_text(table: &Table) -> String {
    let mut out = String::new();
    if let Some(caption) = table.caption() {
        out.push_str(caption);
        out.push('\n');
    }

    let columns = table.columns();
    let rows = table.visible_rows();
    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in &rows {
        for (index, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(index) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    out.push_str(&format_row(columns, &widths));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("-+-"));
    out.push('\n');

    if rows.is_empty() {
        out.push_str("No data available in table\n");
    }
    for row in rows {
        out.push_str(&format_row(row, &widths));
        out.push('\n');
    }

    out.push_str(&table.info());
    if table.page_count() > 1 {
        out.push_str(&format!(
            " | page {} of {}",
            table.page() + 1,
            table.page_count()
        ));
    }
    out
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    widths
        .iter()
        .enumerate()
        .map(|(index, width)| {
            let cell = cells.get(index).map(String::as_str).unwrap_or("");
            let pad = width.saturating_sub(cell.chars().count());
            format!("{cell}{}", " ".repeat(pad))
        })
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

/// Events grouped into the three category sections.
pub fn cards_text(events: &[Entity]) -> String {
    let buckets = group_by_category(events);
    let mut sections = Vec::new();
    for category in Category::ALL {
        let mut section = vec![format!("== {} ==", category.label())];
        let bucket = buckets.bucket(*category);
        if bucket.is_empty() {
            section.push(empty_bucket_message(*category));
        }
        for event in bucket {
            section.extend(event_card(event));
        }
        sections.push(section.join("\n"));
    }
    sections.join("\n\n")
}

pub fn choices_text(choices: &[FilterChoice]) -> String {
    if choices.is_empty() {
        return "No dropdown filters on this tab.".to_string();
    }
    choices
        .iter()
        .map(|choice| {
            let options = if choice.options.is_empty() {
                "(none loaded)".to_string()
            } else {
                choice
                    .options
                    .iter()
                    .map(|(value, label)| {
                        if value == label {
                            value.clone()
                        } else {
                            format!("{value}={label}")
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            format!("{}: {options}", choice.key)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
