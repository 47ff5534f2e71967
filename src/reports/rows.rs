use anyhow::Context;
use csv::{ReaderBuilder, Writer};
use serde::{Deserialize, Serialize};

/// One line of an exported or imported file. Every field is kept as text so
/// that each row can be validated and reported on individually.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct CsvRow {
    pub date: String,
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub category: String,
    pub kind: String,
    pub amount: String,
    #[serde(default)]
    pub description: String,
}

/// Write rows with a header line.
pub fn write_rows(rows: &[CsvRow]) -> anyhow::Result<String> {
    let mut writer = Writer::from_writer(Vec::new());

    // An empty export still gets a header.
    if rows.is_empty() {
        writer.write_record(["date", "account", "category", "kind", "amount", "description"])?;
    }
    for row in rows {
        writer.serialize(row)?;
    }

    let bytes = writer
        .into_inner()
        .context("Failed to flush CSV writer.")?;

    String::from_utf8(bytes).context("CSV output was not UTF-8.")
}

/// Parse every row of `body`, pairing each with its line number. Rows that
/// cannot be read carry the reason instead.
pub fn parse_rows(body: &str) -> Vec<(usize, Result<CsvRow, String>)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    reader
        .deserialize::<CsvRow>()
        .enumerate()
        .map(|(index, result)| {
            let line = result
                .as_ref()
                .err()
                .and_then(|error| error.position())
                .map(|position| position.line() as usize)
                .unwrap_or(index + 2);

            (line, result.map_err(|error| error.to_string()))
        })
        .collect()
}
