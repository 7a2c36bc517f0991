//! Plain column tables for variables and diff reports

use colored::{ColoredString, Colorize};

use crate::tracker::{DiffReport, DiffStatus, VariableRow};

/// Keep a cell on one line: newlines become a return symbol, other control
/// characters are escaped
fn flatten(cell: &str) -> String {
    let mut out = String::with_capacity(cell.len());
    for c in cell.chars() {
        match c {
            '\n' => out.push('⏎'),
            c if c.is_control() => out.extend(c.escape_debug()),
            c => out.push(c),
        }
    }
    out
}

/// Lay out rows under a header, padding each column to its widest cell.
///
/// `paint` styles the padded first cell of each body row, so escape codes
/// never count towards column widths.
fn table<P>(header: &[&str], rows: &[Vec<String>], paint: P) -> String
where
    P: Fn(usize, String) -> String,
{
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|cell| flatten(cell)).collect())
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let pad = |i: usize, cell: &str| {
        let fill = widths[i].saturating_sub(cell.chars().count());
        format!("{}{}", cell, " ".repeat(fill))
    };

    let mut out = String::new();
    let heading = header
        .iter()
        .enumerate()
        .map(|(i, h)| pad(i, h))
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(&heading.trim_end().bold().to_string());
    out.push('\n');

    for (n, row) in rows.iter().enumerate() {
        let line = row
            .iter()
            .enumerate()
            .map(|(i, cell)| match i {
                0 => paint(n, pad(i, cell)),
                _ => pad(i, cell),
            })
            .collect::<Vec<_>>()
            .join("  ");
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Table of current variables across scopes
pub fn variables_table(rows: &[VariableRow]) -> String {
    if rows.is_empty() {
        return "No variables\n".to_string();
    }
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|r| vec![r.key.clone(), r.value.clone(), r.scope.clone()])
        .collect();
    table(&["Name", "Value", "Scope"], &cells, |_, cell| cell)
}

fn status_label(status: DiffStatus, cell: &str) -> ColoredString {
    match status {
        DiffStatus::Added => cell.green(),
        DiffStatus::Updated => cell.yellow(),
        DiffStatus::Deleted => cell.red(),
    }
}

/// Table of changes from one or more diff reports
///
/// Updated fields show the new value followed by the old one in brackets.
pub fn status_table(reports: &[DiffReport]) -> String {
    let mut cells = Vec::new();
    let mut statuses = Vec::new();

    for record in reports.iter().flat_map(|r| r.records.iter()) {
        let key = match &record.previous_key {
            Some(old) => format!("{} [{}]", record.key, old),
            None => record.key.clone(),
        };
        let value = match &record.previous_value {
            Some(old) => format!("{} [{}]", record.value, old),
            None => record.value.clone(),
        };
        statuses.push(record.status);
        cells.push(vec![record.status.to_string(), key, value, record.scope.clone()]);
    }

    if cells.is_empty() {
        return "No changes\n".to_string();
    }

    table(&["Status", "Name", "Value", "Scope"], &cells, |n, cell| {
        status_label(statuses[n], &cell).to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{DiffRecord, DiffStatus};

    #[test]
    fn test_variables_table_columns_align() {
        let rows = vec![
            VariableRow {
                key: "token".to_string(),
                value: "abc".to_string(),
                scope: "Environment".to_string(),
            },
            VariableRow {
                key: "base_url".to_string(),
                value: "https://x".to_string(),
                scope: "Collection".to_string(),
            },
        ];
        let text = variables_table(&rows);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("token     abc"));
        assert!(lines[2].starts_with("base_url  https://x"));
    }

    #[test]
    fn test_status_table_shows_previous_values() {
        let report = DiffReport {
            scope: "Environment".to_string(),
            records: vec![DiffRecord {
                status: DiffStatus::Updated,
                key: "auth".to_string(),
                value: "xyz".to_string(),
                scope: "Environment".to_string(),
                previous_key: Some("token".to_string()),
                previous_value: Some("abc".to_string()),
            }],
            updated: true,
            ..DiffReport::default()
        };
        let text = status_table(&[report]);
        assert!(text.contains("auth [token]"));
        assert!(text.contains("xyz [abc]"));
        assert!(text.contains("updated"));
    }

    fn added(key: &str, value: &str) -> DiffRecord {
        DiffRecord {
            status: DiffStatus::Added,
            key: key.to_string(),
            value: value.to_string(),
            scope: "Environment".to_string(),
            previous_key: None,
            previous_value: None,
        }
    }

    #[test]
    fn test_multiline_values_stay_on_one_row() {
        let mut deleted = added("token", "abc");
        deleted.status = DiffStatus::Deleted;
        let report = DiffReport {
            scope: "Environment".to_string(),
            records: vec![added("body", "{\n  \"id\": 1\n}"), deleted],
            ..DiffReport::default()
        };

        let text = status_table(&[report]);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("body"));
        assert!(lines[1].contains('⏎'));
        assert!(lines[2].contains("token"));
        assert!(lines[2].contains("deleted"));
    }

    #[test]
    fn test_non_ascii_values_align() {
        let report = DiffReport {
            scope: "Environment".to_string(),
            records: vec![added("price", "1\n€€€€"), added("other", "x")],
            ..DiffReport::default()
        };

        let text = status_table(&[report]);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("1⏎€€€€"));
        assert!(lines[2].contains("other"));

        let rows = vec![
            VariableRow {
                key: "währung".to_string(),
                value: "€".to_string(),
                scope: "Global".to_string(),
            },
            VariableRow {
                key: "tab".to_string(),
                value: "a\tb".to_string(),
                scope: "Global".to_string(),
            },
        ];
        let text = variables_table(&rows);
        let lines: Vec<_> = text.lines().collect();
        assert!(lines[1].starts_with("währung  €"));
        assert!(lines[2].starts_with("tab      a\\tb"));
    }

    #[test]
    fn test_flatten_control_characters() {
        assert_eq!(flatten("a\nb"), "a⏎b");
        assert_eq!(flatten("a\r\tb"), "a\\r\\tb");
        assert_eq!(flatten("plain €"), "plain €");
    }

    #[test]
    fn test_empty_tables() {
        assert_eq!(variables_table(&[]), "No variables\n");
        assert_eq!(status_table(&[DiffReport::default()]), "No changes\n");
    }
}
