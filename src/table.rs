use std::{borrow::Cow, fmt::Write as _};

use crate::mapping::Header;

const MAX_SAMPLE_WIDTH: usize = 32;

#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| display_width(h)).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(display_width(&flatten(cell)));
            }
        }

        let mut output = String::new();
        let _ = writeln!(output, "{}", format_row(&self.headers, &widths));
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat((*w).max(3))).collect();
        let rule_widths: Vec<usize> = widths.iter().map(|w| (*w).max(3)).collect();
        let _ = writeln!(output, "{}", format_row(&rule, &rule_widths));
        for row in &self.rows {
            let _ = writeln!(output, "{}", format_row(row, &widths));
        }
        output
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }
}

pub fn mapping_table(header: &Header, first_row: Option<&[Option<String>]>) -> Table {
    let mut table = Table::new(["#", "Column", "Kind", "Source", "Property", "Sample"]);
    for mapping in header.mappings() {
        let sample = first_row
            .and_then(|row| row.get(mapping.index()))
            .and_then(|cell| cell.as_deref())
            .map(|value| truncate(value, MAX_SAMPLE_WIDTH))
            .unwrap_or_default();
        let property = if mapping.kind().is_property() {
            match mapping.tree() {
                Some(tree) => format!("{} ({tree})", mapping.property_name()),
                None => mapping.property_name().to_string(),
            }
        } else {
            String::new()
        };
        table.push_row(vec![
            (mapping.index() + 1).to_string(),
            mapping.name().to_string(),
            mapping.kind().describe().to_string(),
            mapping.source().to_string(),
            property,
            sample,
        ]);
    }
    table
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = flatten(value);
            let padding = width.saturating_sub(display_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

fn truncate(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let mut shortened: String = value.chars().take(limit.saturating_sub(3)).collect();
    shortened.push_str("...");
    shortened
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // ANSI escape, runs to the terminating 'm'
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn flatten(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
