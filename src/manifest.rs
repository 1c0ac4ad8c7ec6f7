// bonjourctl - bulk Bonjour forwarding for Meraki wireless networks
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use std::{fs, io::Read, path::Path};
use thiserror::Error;
use tracing::info;

pub const NETWORK_NAME: &str = "Network Name";
pub const SSID_NAME: &str = "SSID Name";
pub const DESCRIPTION: &str = "Description";
pub const VLAN: &str = "VLAN";
pub const SERVICES: &str = "Services";

pub const REQUIRED_COLUMNS: [&str; 5] = [NETWORK_NAME, SSID_NAME, DESCRIPTION, VLAN, SERVICES];

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest is missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("reading manifest: {0}")]
    Io(#[from] std::io::Error),
}

/// One manifest record, columns kept in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    pub line: u64,
    columns: Vec<(String, String)>,
}

impl CsvRow {
    pub fn new(line: u64, columns: Vec<(String, String)>) -> Self {
        Self { line, columns }
    }

    /// Value of `column`, or an empty string when the record is short.
    pub fn get(&self, column: &str) -> &str {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
            .unwrap_or("")
    }

    /// (column, value) pairs in header order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

pub fn read_path(path: &Path) -> Result<Vec<CsvRow>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let rows = parse(text.as_bytes()).with_context(|| format!("parsing {}", path.display()))?;
    info!(rows = rows.len(), file = %path.display(), "read manifest");
    Ok(rows)
}

/// Spaces right after a delimiter or at the start of a line are skipped, so a
/// quoted field may follow `, `. Nothing else is trimmed.
pub fn parse<R: Read>(mut reader: R) -> Result<Vec<CsvRow>, ManifestError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(&text);
    let text = skip_initial_space(text);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !headers.iter().any(|h| h == *required))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ManifestError::MissingColumns(missing));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let columns = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), record.get(idx).unwrap_or("").to_string()))
            .collect();
        rows.push(CsvRow::new(line, columns));
    }
    Ok(rows)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Start,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Drop the spaces that open each field. Delimiters and newlines inside quotes
/// are left alone, and line numbering is unchanged.
fn skip_initial_space(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut state = Field::Start;
    for c in text.chars() {
        state = match (state, c) {
            (Field::Start, ' ') => continue,
            (Field::Start, '"') => Field::Quoted,
            (Field::Quoted, '"') => Field::QuoteInQuoted,
            (Field::Quoted, _) => Field::Quoted,
            (Field::QuoteInQuoted, '"') => Field::Quoted,
            (_, ',' | '\n') => Field::Start,
            _ => Field::Unquoted,
        };
        out.push(c);
    }
    out
}
