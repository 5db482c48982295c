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

use serde::Serialize;
use thiserror::Error;

/// Why an individual source blob was skipped during loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub name: String,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("load error: {0}")]
    Load(#[from] LoadError),
    #[error("table error: {0}")]
    Table(#[from] TableError),
    #[error("aggregation error: {0}")]
    Aggregate(#[from] AggregateError),
    #[error("chart error: {0}")]
    Chart(#[from] ChartError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("source '{name}' is not valid UTF-8")]
    Decode { name: String },
    #[error("source '{name}' could not be parsed: {reason}")]
    Malformed { name: String, reason: String },
    #[error("no source parsed successfully ({} skipped)", .reports.len())]
    NoValidSources { reports: Vec<SourceReport> },
    #[error("sources could not be combined: {reason}")]
    Concat { reason: String },
}

#[derive(Error, Debug)]
pub enum TableError {
    #[error("column '{0}' not found")]
    ColumnNotFound(String),
    #[error("column length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),
    #[error("row index {index} out of range ({rows} rows)")]
    RowOutOfRange { index: usize, rows: usize },
    #[error("no table loaded")]
    NoTable,
}

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("no columns selected")]
    EmptySelection,
    #[error("at least {needed} numeric columns required, got {got}")]
    NotEnoughColumns { needed: usize, got: usize },
    #[error("no numeric columns available")]
    NoNumericColumns,
    #[error("column '{column}' is not numeric ({found:?})")]
    NotNumeric {
        column: String,
        found: crate::table::DataType,
    },
    #[error("column '{column}' could not be interpreted as timestamps")]
    TimeCoercionFailed { column: String },
    #[error(transparent)]
    Table(#[from] TableError),
}

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("no column selected for the {axis} axis")]
    MissingAxis { axis: &'static str },
    #[error("at least one Y column is required")]
    EmptyYSelection,
    #[error("no numeric columns available for a correlation heatmap")]
    NoNumericColumns,
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
pub type LoadResult<T> = std::result::Result<T, LoadError>;
pub type TableResult<T> = std::result::Result<T, TableError>;
pub type AggregateResult<T> = std::result::Result<T, AggregateError>;
pub type ChartResult<T> = std::result::Result<T, ChartError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Warning,
    Error,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
        }
    }
}

impl PipelineError {
    /// Validation failures abort the operation but are presented as
    /// warnings; parse and computation failures are errors proper.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PipelineError::Table(TableError::NoTable) => ErrorSeverity::Warning,
            PipelineError::Aggregate(
                AggregateError::EmptySelection
                | AggregateError::NotEnoughColumns { .. }
                | AggregateError::NoNumericColumns,
            ) => ErrorSeverity::Warning,
            PipelineError::Chart(
                ChartError::MissingAxis { .. }
                | ChartError::EmptyYSelection
                | ChartError::NoNumericColumns,
            ) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Load(LoadError::NoValidSources { reports }) => format!(
                "None of the uploaded files could be read. Check that each file \
                 is well-formed delimited text encoded as UTF-8. ({} skipped)",
                reports.len()
            ),
            PipelineError::Table(TableError::NoTable) => {
                "Load or edit a table before running an operation.".to_string()
            }
            PipelineError::Aggregate(AggregateError::EmptySelection) => {
                "Select at least one column first.".to_string()
            }
            PipelineError::Aggregate(AggregateError::TimeCoercionFailed { column }) => format!(
                "Column '{column}' does not contain recognisable timestamps. \
                 Check the timestamp column selection and its format."
            ),
            PipelineError::Chart(ChartError::MissingAxis { axis }) => {
                format!("Select a column for the {axis} axis.")
            }
            _ => self.to_string(),
        }
    }
}
