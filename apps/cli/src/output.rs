//! Plain-text rendering for dashboards and tables.

/// Widest a table cell is allowed to get before it is cut.
const MAX_CELL: usize = 40;

/// Print `label: value` dashboard lines, aligned.
pub(crate) fn print_entries(entries: &[(&str, String)]) {
    let width = entries.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
    for (label, value) in entries {
        println!("  {label:<width$}  {value}");
    }
}

/// Print an aligned table with a header rule.
pub(crate) fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

pub(crate) fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|r| r.iter().map(|c| clip(c)).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |values: &[String]| -> String {
        let mut out = String::new();
        for (i, w) in widths.iter().enumerate() {
            let value = values.get(i).map(String::as_str).unwrap_or("");
            let pad = w.saturating_sub(value.chars().count());
            out.push_str(value);
            out.push_str(&" ".repeat(pad));
            if i + 1 < widths.len() {
                out.push_str("  ");
            }
        }
        out.trim_end().to_string()
    };

    let mut out = String::new();
    out.push_str(&line(headers));
    out.push('\n');
    out.push_str(&widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "));
    out.push('\n');
    for row in &cells {
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}

fn clip(s: &str) -> String {
    let flat = s.replace(['\n', '\r'], " ");
    if flat.chars().count() <= MAX_CELL {
        return flat;
    }
    let mut out: String = flat.chars().take(MAX_CELL - 1).collect();
    out.push('…');
    out
}
