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

use crate::error::{TableError, TableResult};
use crate::table::column::{Column, DataType};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct TableMetadata {
    pub name: String,
    pub row_count: usize,
    pub column_count: usize,
    pub created_at: DateTime<Utc>,
    pub source: Option<String>,
}

/// Per-column summary handed to the shell for the post-load preview.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: DataType,
    pub null_count: usize,
}

/// In-memory rectangular dataset: named, ordered, equal-length columns.
/// Tables are never mutated in place once handed out; operations build and
/// return new ones (`add_column`/`with_column` during construction only).
#[derive(Debug, Clone)]
pub struct Table {
    columns: HashMap<String, Arc<Column>>,
    column_order: Vec<String>,
    pub metadata: TableMetadata,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            columns: HashMap::new(),
            column_order: Vec::new(),
            metadata: TableMetadata {
                name: name.into(),
                row_count: 0,
                column_count: 0,
                created_at: Utc::now(),
                source: None,
            },
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.metadata.source = Some(source.into());
        self
    }

    pub fn add_column(&mut self, name: impl Into<String>, column: Column) -> TableResult<()> {
        let name = name.into();
        if self.columns.contains_key(&name) {
            return Err(TableError::DuplicateColumn(name));
        }
        if !self.column_order.is_empty() && column.len() != self.metadata.row_count {
            return Err(TableError::LengthMismatch {
                expected: self.metadata.row_count,
                got: column.len(),
            });
        }
        self.metadata.row_count = column.len();
        self.column_order.push(name.clone());
        self.columns.insert(name, Arc::new(column));
        self.metadata.column_count = self.columns.len();
        Ok(())
    }

    /// Copy-on-write column replacement: returns a new table with `name`
    /// swapped, preserving order and every other column untouched.
    pub fn with_column(&self, name: &str, column: Column) -> TableResult<Table> {
        if !self.columns.contains_key(name) {
            return Err(TableError::ColumnNotFound(name.to_string()));
        }
        if column.len() != self.metadata.row_count {
            return Err(TableError::LengthMismatch {
                expected: self.metadata.row_count,
                got: column.len(),
            });
        }
        let mut next = self.clone();
        next.columns.insert(name.to_string(), Arc::new(column));
        Ok(next)
    }

    pub fn row_count(&self) -> usize {
        self.metadata.row_count
    }

    pub fn column_count(&self) -> usize {
        self.metadata.column_count
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_order
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name).map(|arc| arc.as_ref())
    }

    /// Like `get_column`, but failing the operation when the reference does
    /// not resolve.
    pub fn column(&self, name: &str) -> TableResult<&Column> {
        self.get_column(name)
            .ok_or_else(|| TableError::ColumnNotFound(name.to_string()))
    }

    pub fn numeric_columns(&self) -> Vec<String> {
        self.column_order
            .iter()
            .filter(|name| self.columns[*name].is_numeric())
            .cloned()
            .collect()
    }

    pub fn schema(&self) -> Vec<ColumnInfo> {
        self.column_order
            .iter()
            .map(|name| {
                let column = &self.columns[name];
                ColumnInfo {
                    name: name.clone(),
                    data_type: column.data_type(),
                    null_count: column.null_count(),
                }
            })
            .collect()
    }

    /// First `limit` rows as a new table, for previews.
    pub fn head(&self, limit: usize) -> Table {
        let take = limit.min(self.row_count());
        let columns = self
            .column_order
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    Arc::new(truncate_column(&self.columns[name], take)),
                )
            })
            .collect();
        Table {
            columns,
            column_order: self.column_order.clone(),
            metadata: TableMetadata {
                name: format!("{}_head", self.metadata.name),
                row_count: take,
                column_count: self.column_order.len(),
                created_at: Utc::now(),
                source: self.metadata.source.clone(),
            },
        }
    }

    /// One row of display values, in column order.
    pub fn row_text(&self, index: usize) -> Vec<Option<String>> {
        self.column_order
            .iter()
            .map(|name| self.columns[name].get_text(index))
            .collect()
    }
}

fn truncate_column(column: &Column, take: usize) -> Column {
    match column {
        Column::Integer(data) => Column::Integer(data.iter().take(take).copied().collect()),
        Column::Float(data) => Column::Float(data.iter().take(take).copied().collect()),
        Column::Text(data) => Column::Text(data.iter().take(take).cloned().collect()),
        Column::Date(data) => Column::Date(data.iter().take(take).copied().collect()),
        Column::Category(data) => Column::Category(data.iter().take(take).cloned().collect()),
    }
}
