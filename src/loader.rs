// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use crate::error::{LoadError, LoadResult, SourceReport};
use crate::table::{ColumnBuilder, Table};
use itertools::Itertools;
use std::collections::HashMap;
use std::path::Path;

/// One delimited-text blob as received from the shell, with a name used in
/// error reporting.
#[derive(Debug, Clone)]
pub struct RawSource {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl RawSource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// The combined table plus the per-source reports for blobs that were
/// skipped. The shell shows both.
#[derive(Debug)]
pub struct LoadOutcome {
    pub table: Table,
    pub skipped: Vec<SourceReport>,
}

#[derive(Debug)]
struct ParsedSource {
    headers: Vec<String>,
    cells: HashMap<String, Vec<Option<String>>>,
    row_count: usize,
}

/// Parses each source independently and concatenates the survivors by
/// column name. A blob that fails to parse is skipped and reported, not
/// fatal to the batch. An empty input slice is the valid "no data yet"
/// state and yields `Ok(None)`.
pub fn load_sources(sources: &[RawSource]) -> LoadResult<Option<LoadOutcome>> {
    if sources.is_empty() {
        return Ok(None);
    }
    let mut parsed = Vec::new();
    let mut skipped = Vec::new();
    for source in sources {
        match parse_source(source) {
            Ok(table) => parsed.push(table),
            Err(err) => {
                tracing::warn!(source = %source.name, error = %err, "skipping source");
                skipped.push(SourceReport {
                    name: source.name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    if parsed.is_empty() {
        return Err(LoadError::NoValidSources { reports: skipped });
    }
    let table = concat_sources(&parsed)?;
    Ok(Some(LoadOutcome { table, skipped }))
}

/// Disk-reading convenience over `load_sources`; an unreadable path is
/// skipped and reported like a malformed blob.
pub fn load_paths<P: AsRef<Path>>(paths: &[P]) -> LoadResult<Option<LoadOutcome>> {
    if paths.is_empty() {
        return Ok(None);
    }
    let mut sources = Vec::new();
    let mut unreadable = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        match std::fs::read(path) {
            Ok(bytes) => sources.push(RawSource { name, bytes }),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unreadable file");
                unreadable.push(SourceReport {
                    name,
                    reason: err.to_string(),
                });
            }
        }
    }
    if sources.is_empty() {
        return Err(LoadError::NoValidSources {
            reports: unreadable,
        });
    }
    match load_sources(&sources) {
        Ok(Some(mut outcome)) => {
            outcome.skipped.extend(unreadable);
            Ok(Some(outcome))
        }
        Ok(None) => Ok(None),
        Err(LoadError::NoValidSources { mut reports }) => {
            reports.extend(unreadable);
            Err(LoadError::NoValidSources { reports })
        }
        Err(err) => Err(err),
    }
}

fn parse_source(source: &RawSource) -> LoadResult<ParsedSource> {
    let text = std::str::from_utf8(&source.bytes).map_err(|_| LoadError::Decode {
        name: source.name.clone(),
    })?;
    let malformed = |reason: String| LoadError::Malformed {
        name: source.name.clone(),
        reason,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| malformed(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.is_empty() {
        return Err(malformed("no header row".to_string()));
    }
    if headers.iter().unique().count() != headers.len() {
        return Err(malformed("duplicate column names in header".to_string()));
    }
    let mut builders: HashMap<String, ColumnBuilder> = headers
        .iter()
        .map(|h| (h.clone(), ColumnBuilder::new()))
        .collect();
    let mut row_count = 0usize;
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| malformed(format!("row {}: {}", row_idx + 1, e)))?;
        if record.len() > headers.len() {
            return Err(malformed(format!(
                "row {}: expected {} fields, got {}",
                row_idx + 1,
                headers.len(),
                record.len()
            )));
        }
        for (i, header) in headers.iter().enumerate() {
            let value = record.get(i).map(|f| f.to_string());
            if let Some(builder) = builders.get_mut(header) {
                builder.push(value);
            }
        }
        row_count += 1;
    }
    let cells = headers
        .iter()
        .map(|h| {
            let builder = builders.remove(h).unwrap_or_default();
            (h.clone(), builder.into_values())
        })
        .collect();
    Ok(ParsedSource {
        headers,
        cells,
        row_count,
    })
}

/// Union of columns in first-seen order; columns absent from a source are
/// padded with missing cells for that source's rows. Type inference runs
/// once over each combined column.
fn concat_sources(sources: &[ParsedSource]) -> LoadResult<Table> {
    let union: Vec<String> = sources
        .iter()
        .flat_map(|s| s.headers.iter().cloned())
        .unique()
        .collect();
    if union.is_empty() {
        return Err(LoadError::Concat {
            reason: "no columns found in any source".to_string(),
        });
    }
    let mut table = Table::new("combined");
    for name in &union {
        let mut builder = ColumnBuilder::new();
        for source in sources {
            match source.cells.get(name) {
                Some(values) => {
                    for value in values {
                        builder.push(value.clone());
                    }
                }
                None => builder.pad_to(builder.len() + source.row_count),
            }
        }
        table
            .add_column(name.clone(), builder.build())
            .map_err(|e| LoadError::Concat {
                reason: e.to_string(),
            })?;
    }
    Ok(table)
}
