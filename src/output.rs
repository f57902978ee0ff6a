//! Plain-text rendering of results and CSV export.

use std::io::Write;
use std::path::Path;

use crate::db::{QueryResult, Schema, Value};
use crate::error::{AskSqlError, Result};

/// Maximum width for any column.
const MAX_COLUMN_WIDTH: usize = 40;

/// Minimum width for any column.
const MIN_COLUMN_WIDTH: usize = 4;

fn width(s: &str) -> usize {
    s.chars().count()
}

/// Truncates a string to `max_width` characters, adding an ellipsis if needed.
fn truncate(s: &str, max_width: usize) -> String {
    if width(s) <= max_width {
        s.to_string()
    } else if max_width <= 3 {
        s.chars().take(max_width).collect()
    } else {
        let head: String = s.chars().take(max_width - 3).collect();
        format!("{head}...")
    }
}

/// Single-line form of a cell.
fn cell_text(value: &Value) -> String {
    value.to_display_string().replace(['\n', '\r'], " ")
}

fn column_widths(result: &QueryResult) -> Vec<usize> {
    let mut widths: Vec<usize> = result
        .columns
        .iter()
        .map(|col| width(&col.name).max(MIN_COLUMN_WIDTH))
        .collect();

    for row in &result.rows {
        for (w, value) in widths.iter_mut().zip(row) {
            *w = (*w).max(width(&cell_text(value)));
        }
    }

    widths.into_iter().map(|w| w.min(MAX_COLUMN_WIDTH)).collect()
}

fn border(widths: &[usize], left: char, mid: char, right: char) -> String {
    let inner: Vec<String> = widths.iter().map(|&w| "─".repeat(w + 2)).collect();
    format!("{left}{}{right}", inner.join(&mid.to_string()))
}

fn row_line(cells: impl Iterator<Item = String>, widths: &[usize]) -> String {
    let mut line = String::from("│");
    for (cell, &w) in cells.zip(widths) {
        let text = truncate(&cell, w);
        line.push_str(&format!(" {text:w$} │"));
    }
    line
}

/// Renders a result as a boxed text table with a row-count footer.
pub fn render_table(result: &QueryResult) -> String {
    if result.columns.is_empty() {
        return "(empty result)\n".to_string();
    }

    let widths = column_widths(result);
    let mut out = String::new();

    out.push_str(&border(&widths, '┌', '┬', '┐'));
    out.push('\n');
    out.push_str(&row_line(result.columns.iter().map(|c| c.name.clone()), &widths));
    out.push('\n');
    out.push_str(&border(&widths, '├', '┼', '┤'));
    out.push('\n');
    for row in &result.rows {
        out.push_str(&row_line(row.iter().map(cell_text), &widths));
        out.push('\n');
    }
    out.push_str(&border(&widths, '└', '┴', '┘'));
    out.push('\n');

    out.push_str(&format!(
        "{} row{} returned ({}ms)\n",
        result.row_count,
        if result.row_count == 1 { "" } else { "s" },
        result.execution_time.as_millis()
    ));
    if let Some(warning) = result.truncation_warning() {
        out.push_str(&warning);
        out.push('\n');
    }

    out
}

/// Renders the schema as tables with their columns indented below.
pub fn render_schema(schema: &Schema) -> String {
    schema.format_for_display()
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => csv_field(&other.to_display_string()),
    }
}

/// Serializes a result as CSV with a header row. NULL becomes an empty field.
pub fn to_csv(result: &QueryResult) -> String {
    let mut out = String::new();

    let header: Vec<String> = result.columns.iter().map(|c| csv_field(&c.name)).collect();
    out.push_str(&header.join(","));
    out.push('\n');

    for row in &result.rows {
        let fields: Vec<String> = row.iter().map(csv_value).collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }

    out
}

/// Writes a result as a UTF-8 CSV file.
pub fn write_csv(result: &QueryResult, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path).map_err(|e| {
        AskSqlError::persistence(format!("Failed to create {}: {e}", path.display()))
    })?;
    file.write_all(to_csv(result).as_bytes()).map_err(|e| {
        AskSqlError::persistence(format!("Failed to write {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ColumnInfo;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn sample() -> QueryResult {
        QueryResult::with_data(
            vec![ColumnInfo::new("id", "int4"), ColumnInfo::new("name", "text")],
            vec![
                vec![Value::Int(1), Value::String("Ada".to_string())],
                vec![Value::Int(2), Value::Null],
            ],
        )
        .with_execution_time(Duration::from_millis(12))
    }

    #[test]
    fn test_render_table() {
        let expected = "\
┌──────┬──────┐
│ id   │ name │
├──────┼──────┤
│ 1    │ Ada  │
│ 2    │ NULL │
└──────┴──────┘
2 rows returned (12ms)
";
        assert_eq!(render_table(&sample()), expected);
    }

    #[test]
    fn test_render_empty_columns() {
        assert_eq!(render_table(&QueryResult::new()), "(empty result)\n");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("ääääääää", 6), "äää...");
        assert_eq!(truncate("abc", 6), "abc");
    }

    #[test]
    fn test_csv_header_and_null() {
        assert_eq!(to_csv(&sample()), "id,name\n1,Ada\n2,\n");
    }

    #[test]
    fn test_csv_quoting() {
        let result = QueryResult::with_data(
            vec![ColumnInfo::new("note", "text")],
            vec![
                vec![Value::String("a,b".to_string())],
                vec![Value::String("say \"hi\"".to_string())],
                vec![Value::String("two\nlines".to_string())],
            ],
        );
        assert_eq!(
            to_csv(&result),
            "note\n\"a,b\"\n\"say \"\"hi\"\"\"\n\"two\nlines\"\n"
        );
    }

    #[test]
    fn test_csv_header_only_for_empty_result() {
        let result = QueryResult::with_data(vec![ColumnInfo::new("id", "int4")], vec![]);
        assert_eq!(to_csv(&result), "id\n");
    }

    #[test]
    fn test_write_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_csv(&sample(), &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "id,name\n1,Ada\n2,\n");
    }
}
