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

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Semantic column type as exposed to the UI shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Text,
    Integer,
    Float,
    Date,
    Category,
}

/// Typed column storage. Every variant holds one `Option` cell per row;
/// a missing value is `None` in every representation.
#[derive(Debug, Clone)]
pub enum Column {
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<Arc<str>>>),
    Date(Vec<Option<NaiveDateTime>>),
    Category(Vec<Option<Arc<str>>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Integer(data) => data.len(),
            Column::Float(data) => data.len(),
            Column::Text(data) => data.len(),
            Column::Date(data) => data.len(),
            Column::Category(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Column::Integer(_) => DataType::Integer,
            Column::Float(_) => DataType::Float,
            Column::Text(_) => DataType::Text,
            Column::Date(_) => DataType::Date,
            Column::Category(_) => DataType::Category,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Integer(_) | Column::Float(_))
    }

    pub fn null_count(&self) -> usize {
        match self {
            Column::Integer(data) => data.iter().filter(|v| v.is_none()).count(),
            Column::Float(data) => data.iter().filter(|v| v.is_none()).count(),
            Column::Text(data) => data.iter().filter(|v| v.is_none()).count(),
            Column::Date(data) => data.iter().filter(|v| v.is_none()).count(),
            Column::Category(data) => data.iter().filter(|v| v.is_none()).count(),
        }
    }

    /// Display value for a cell, `None` when the cell is missing or the
    /// index is out of range.
    pub fn get_text(&self, index: usize) -> Option<String> {
        match self {
            Column::Integer(data) => data.get(index)?.map(|v| v.to_string()),
            Column::Float(data) => data.get(index)?.map(|v| v.to_string()),
            Column::Text(data) => data.get(index)?.as_ref().map(|s| s.to_string()),
            Column::Date(data) => data.get(index)?.map(format_datetime),
            Column::Category(data) => data.get(index)?.as_ref().map(|s| s.to_string()),
        }
    }

    /// Numeric view of a cell. Text is never implicitly parsed here; only
    /// genuinely numeric columns yield values.
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        match self {
            Column::Integer(data) => data.get(index)?.map(|v| v as f64),
            Column::Float(data) => *data.get(index)?,
            _ => None,
        }
    }

    pub fn get_date(&self, index: usize) -> Option<NaiveDateTime> {
        match self {
            Column::Date(data) => *data.get(index)?,
            _ => None,
        }
    }

    /// All non-missing numeric values, in row order.
    pub fn numeric_values(&self) -> Vec<f64> {
        (0..self.len()).filter_map(|i| self.get_f64(i)).collect()
    }

    pub fn text_from(values: Vec<Option<String>>) -> Self {
        Column::Text(
            values
                .into_iter()
                .map(|opt| opt.map(|s| Arc::from(s.as_str())))
                .collect(),
        )
    }
}

fn format_datetime(dt: NaiveDateTime) -> String {
    if dt.num_seconds_from_midnight() == 0 {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Accumulates raw string cells and builds a loosely typed column, the way
/// a CSV parse leaves data: all-integer parses to Integer, otherwise
/// all-float to Float, otherwise Text. Dates are not inferred here; that is
/// the normalizer's job for edited tables.
#[derive(Debug, Default)]
pub struct ColumnBuilder {
    values: Vec<Option<String>>,
}

impl ColumnBuilder {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: Option<String>) {
        let value = value.filter(|s| !s.trim().is_empty());
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Pads the column with missing cells up to `target_len`.
    pub fn pad_to(&mut self, target_len: usize) {
        while self.values.len() < target_len {
            self.values.push(None);
        }
    }

    /// Raw cells accumulated so far, blanks already normalised to missing.
    pub fn into_values(self) -> Vec<Option<String>> {
        self.values
    }

    pub fn build(self) -> Column {
        let non_missing: Vec<&str> = self.values.iter().flatten().map(|s| s.trim()).collect();
        if !non_missing.is_empty() && non_missing.iter().all(|s| s.parse::<i64>().is_ok()) {
            return Column::Integer(
                self.values
                    .iter()
                    .map(|opt| opt.as_ref().and_then(|s| s.trim().parse::<i64>().ok()))
                    .collect(),
            );
        }
        if !non_missing.is_empty() && non_missing.iter().all(|s| s.parse::<f64>().is_ok()) {
            return Column::Float(
                self.values
                    .iter()
                    .map(|opt| opt.as_ref().and_then(|s| s.trim().parse::<f64>().ok()))
                    .collect(),
            );
        }
        Column::text_from(self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn built(cells: &[&str]) -> Column {
        let mut builder = ColumnBuilder::new();
        for cell in cells {
            builder.push(Some(cell.to_string()));
        }
        builder.build()
    }

    #[test]
    fn infers_integer_column() {
        let col = built(&["1", "2", "3"]);
        assert_eq!(col.data_type(), DataType::Integer);
        assert_eq!(col.get_f64(1), Some(2.0));
    }

    #[test]
    fn infers_float_when_any_cell_fractional() {
        let col = built(&["1", "2.5", "3"]);
        assert_eq!(col.data_type(), DataType::Float);
    }

    #[test]
    fn falls_back_to_text() {
        let col = built(&["1", "two", "3"]);
        assert_eq!(col.data_type(), DataType::Text);
        assert_eq!(col.get_f64(0), None);
    }

    #[test]
    fn empty_cells_become_missing() {
        let mut builder = ColumnBuilder::new();
        builder.push(Some("1".to_string()));
        builder.push(Some("  ".to_string()));
        builder.push(None);
        let col = builder.build();
        assert_eq!(col.data_type(), DataType::Integer);
        assert_eq!(col.null_count(), 2);
    }

    #[test]
    fn category_cells_read_as_text_only() {
        let col = Column::Category(vec![Some(Arc::from("north")), None]);
        assert_eq!(col.data_type(), DataType::Category);
        assert_eq!(col.get_text(0).as_deref(), Some("north"));
        assert_eq!(col.get_f64(0), None);
        assert_eq!(col.null_count(), 1);
    }

    #[test]
    fn get_date_only_answers_on_date_columns() {
        let date = chrono::NaiveDate::from_ymd_opt(2023, 5, 1).unwrap();
        let dt = date.and_hms_opt(8, 0, 0).unwrap();
        let col = Column::Date(vec![Some(dt)]);
        assert_eq!(col.get_date(0), Some(dt));
        let col = Column::Integer(vec![Some(20230501)]);
        assert_eq!(col.get_date(0), None);
    }

    #[test]
    fn date_display_omits_midnight_time() {
        let date = chrono::NaiveDate::from_ymd_opt(2023, 5, 1).unwrap();
        let col = Column::Date(vec![
            Some(date.and_hms_opt(0, 0, 0).unwrap()),
            Some(date.and_hms_opt(13, 30, 0).unwrap()),
        ]);
        assert_eq!(col.get_text(0).as_deref(), Some("2023-05-01"));
        assert_eq!(col.get_text(1).as_deref(), Some("2023-05-01 13:30:00"));
    }
}
