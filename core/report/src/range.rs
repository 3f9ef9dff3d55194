//! A1-notation range helpers.

use stocksheet_common::{Error, Result};

/// Build the A1 range covering `rows` x `columns` cells from the top-left
/// corner of a tab, e.g. `Daily!A1:I9`.
pub fn a1_range(title: &str, rows: i64, columns: i64) -> Result<String> {
    if rows < 1 || columns < 1 {
        return Err(Error::InvalidInput(format!(
            "A range needs at least one row and one column, got {}x{}",
            rows, columns
        )));
    }

    Ok(format!(
        "{}!A1:{}{}",
        quote_title(title),
        column_letter(columns),
        rows
    ))
}

/// Quote a tab title for A1 notation when it carries anything beyond
/// alphanumerics and underscores.
fn quote_title(title: &str) -> String {
    let simple = !title.is_empty()
        && title
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');

    if simple {
        title.to_string()
    } else {
        format!("'{}'", title.replace('\'', "''"))
    }
}

/// Alphabetic column label: 1 -> A, 26 -> Z, 27 -> AA.
fn column_letter(mut column: i64) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        letters.push(b'A' + ((column - 1) % 26) as u8);
        column = (column - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).expect("column letters are ASCII")
}
