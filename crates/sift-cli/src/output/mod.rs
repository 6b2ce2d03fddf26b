use serde::Serialize;
use serde_json::Value;

use crate::cli::OutputFormat;

pub mod table;

/// Render a serializable response to a string in the requested format.
pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Table => render_table(value),
        OutputFormat::Raw => Ok(serde_json::to_string(value)?),
    }
}

/// Print a serializable response in the requested format.
pub fn output<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<()> {
    let rendered = render(value, format)?;
    println!("{rendered}");
    Ok(())
}

fn render_table<T: Serialize>(value: &T) -> anyhow::Result<String> {
    let max_width = table::terminal_width();
    let rendered = match serde_json::to_value(value)? {
        Value::Array(rows) => render_rows(&rows, max_width),
        Value::Object(map) => {
            let rows: Vec<Vec<String>> = map
                .into_iter()
                .map(|(key, value)| vec![key, cell(&value)])
                .collect();
            table::render(&["key", "value"], &rows, max_width)
        }
        scalar => table::render(&["value"], &[vec![cell(&scalar)]], max_width),
    };
    Ok(rendered)
}

/// One row per object, one column per key seen in any of them.
fn render_rows(rows: &[Value], max_width: Option<usize>) -> String {
    if rows.is_empty() {
        return String::from("(no rows)");
    }
    let mut headers: Vec<&str> = Vec::new();
    for key in rows.iter().filter_map(Value::as_object).flat_map(|map| map.keys()) {
        if !headers.contains(&key.as_str()) {
            headers.push(key);
        }
    }
    if headers.is_empty() {
        let cells: Vec<Vec<String>> = rows.iter().map(|row| vec![cell(row)]).collect();
        return table::render(&["value"], &cells, max_width);
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|header| row.get(*header).map_or_else(|| String::from("-"), cell))
                .collect()
        })
        .collect();
    table::render(&headers, &cells, max_width)
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::from("-"),
        Value::String(text) => text.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        nested => serde_json::to_string(nested).unwrap_or_else(|_| String::from("<invalid-json>")),
    }
}
