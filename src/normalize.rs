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

use crate::error::TableResult;
use crate::table::{Column, Table};
use chrono::{NaiveDate, NaiveDateTime};

/// Accepted timestamp layouts, tried in order.
pub const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%SZ",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%Y%m%d",
];

/// Column-name fragments that mark a column as a date candidate.
const DATE_TOKENS: &[&str] = &["date", "time", "day", "month", "year", "timestamp"];

pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date.and_hms_opt(0, 0, 0)?);
        }
    }
    None
}

fn has_date_token(name: &str) -> bool {
    let lower = name.to_lowercase();
    DATE_TOKENS.iter().any(|token| lower.contains(token))
}

/// Best-effort type coercion for tables built from free-form edits, where
/// every column starts as Text.
///
/// Date-named columns are tried as dates first; everything still textual
/// afterwards gets a numeric attempt. Each attempt coerces only when every
/// non-missing cell parses, and silently keeps the original column
/// otherwise (coerce-or-keep, never an error). A column that coerced to
/// dates is excluded from the numeric pass, so date parsing takes
/// precedence over numeric parsing for date-named columns.
pub fn normalize_edited(table: &Table) -> TableResult<Table> {
    let mut result = table.clone();
    for name in table.column_names() {
        let column = table.column(name)?;
        if !matches!(column, Column::Text(_)) {
            continue;
        }
        if has_date_token(name) {
            if let Some(dates) = try_date_coercion(column) {
                result = result.with_column(name, dates)?;
                continue;
            }
        }
        if let Some(numeric) = try_numeric_coercion(column) {
            result = result.with_column(name, numeric)?;
        }
    }
    Ok(result)
}

/// `Some` only when every non-missing cell parses and at least one cell is
/// non-missing.
fn try_date_coercion(column: &Column) -> Option<Column> {
    let cells = text_cells(column)?;
    let mut parsed = Vec::with_capacity(cells.len());
    let mut any = false;
    for cell in cells {
        match cell {
            None => parsed.push(None),
            Some(value) => {
                parsed.push(Some(parse_datetime(&value)?));
                any = true;
            }
        }
    }
    any.then_some(Column::Date(parsed))
}

fn try_numeric_coercion(column: &Column) -> Option<Column> {
    let cells = text_cells(column)?;
    let non_missing: Vec<String> = cells.iter().flatten().cloned().collect();
    if non_missing.is_empty() {
        return None;
    }
    if non_missing.iter().all(|s| s.trim().parse::<i64>().is_ok()) {
        return Some(Column::Integer(
            cells
                .iter()
                .map(|opt| opt.as_ref().and_then(|s| s.trim().parse::<i64>().ok()))
                .collect(),
        ));
    }
    if non_missing.iter().all(|s| s.trim().parse::<f64>().is_ok()) {
        return Some(Column::Float(
            cells
                .iter()
                .map(|opt| opt.as_ref().and_then(|s| s.trim().parse::<f64>().ok()))
                .collect(),
        ));
    }
    None
}

fn text_cells(column: &Column) -> Option<Vec<Option<String>>> {
    match column {
        Column::Text(data) => Some(
            data.iter()
                .map(|opt| opt.as_ref().map(|s| s.to_string()))
                .collect(),
        ),
        _ => None,
    }
}
