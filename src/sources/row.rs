//! Parsing of delimited sample rows

/// Result of reading one text row
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Row {
    Value(f64),
    Blank,
    Invalid(String),
}

/// Extract `column` from a comma, semicolon or whitespace separated row.
pub(crate) fn parse_row(line: &str, column: usize) -> Row {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Row::Blank;
    }

    let field = line
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|f| !f.is_empty())
        .nth(column);

    match field {
        Some(field) => match field.trim_matches('"').parse::<f64>() {
            Ok(value) => Row::Value(value),
            Err(_) => Row::Invalid(format!("not a number: {:?}", field)),
        },
        None => Row::Invalid(format!("no column {} in {:?}", column, line)),
    }
}
