use std::borrow::Cow;
use std::fmt::Write as _;

use crate::value::{Datum, RowValues};

pub const NULL_DISPLAY: &str = "NULL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// Renders scanned rows, right-aligning columns whose values are all numeric.
pub fn render_rows(headers: &[String], rows: &[RowValues]) -> String {
    let aligns = (0..headers.len())
        .map(|idx| {
            let mut values = rows.iter().filter_map(|row| row.get(idx).and_then(Option::as_ref));
            let mut any = false;
            let numeric = values.all(|datum: &Datum| {
                any = true;
                datum.is_numeric()
            });
            if any && numeric { Align::Right } else { Align::Left }
        })
        .collect::<Vec<_>>();
    let cells = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Some(datum) => datum.as_display(),
                    None => NULL_DISPLAY.to_string(),
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    render_table(headers, &cells, &aligns)
}

pub fn render_table(headers: &[String], rows: &[Vec<String>], aligns: &[Align]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();

    let header_line = format_row(headers, &widths, &[]);
    let _ = writeln!(output, "{header_line}");

    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let separator_line = format_row(&separator_cells, &separator_widths, &[]);
    let _ = writeln!(output, "{separator_line}");

    for row in rows {
        let row_line = format_row(row, &widths, aligns);
        let _ = writeln!(output, "{row_line}");
    }

    output
}

pub fn print_rows(headers: &[String], rows: &[RowValues]) {
    let rendered = render_rows(headers, rows);
    print!("{rendered}");
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    let rendered = render_table(headers, rows, &[]);
    print!("{rendered}");
}

fn format_row(values: &[String], widths: &[usize], aligns: &[Align]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        if idx >= widths.len() {
            break;
        }
        let sanitized = sanitize_cell(value);
        let display = display_width(sanitized.as_ref());
        let padding = widths
            .get(idx)
            .copied()
            .unwrap_or_default()
            .saturating_sub(display);
        let cell = match aligns.get(idx).copied().unwrap_or(Align::Left) {
            Align::Left => format!("{sanitized}{}", " ".repeat(padding)),
            Align::Right => format!("{}{sanitized}", " ".repeat(padding)),
        };
        cells.push(cell);
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
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

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_columns_are_right_aligned_and_nulls_marked() {
        let headers = vec!["id".to_string(), "name".to_string()];
        let rows = vec![
            vec![Some(Datum::Int32(7)), Some(Datum::Text(b"ann".to_vec()))],
            vec![Some(Datum::Int32(1234)), None],
        ];
        let rendered = render_rows(&headers, &rows);
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines[0], "id    name");
        assert_eq!(lines[1], "----  ----");
        assert_eq!(lines[2], "   7  ann");
        assert_eq!(lines[3], "1234  NULL");
    }

    #[test]
    fn control_characters_are_flattened() {
        let headers = vec!["note".to_string()];
        let rendered = render_table(&headers, &[vec!["a\tb\nc".to_string()]], &[]);
        assert!(rendered.contains("a b c"));
    }
}
