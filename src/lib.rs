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

//! Trestle is an in-memory tabular exploration pipeline: load delimited
//! text blobs into a typed table, coerce freely edited data, aggregate it
//! over time buckets and summary statistics, and build chart-ready data
//! for a rendering shell.
//!
//! The pieces compose left to right:
//!
//! - [`loader`] parses and concatenates delimited sources, skipping and
//!   reporting the ones that fail;
//! - [`table`] holds the typed column storage, the table itself, and the
//!   free-form editor;
//! - [`normalize`] runs best-effort date and numeric coercion over edited
//!   tables;
//! - [`aggregate`] computes means, time-bucketed means, descriptive
//!   statistics, and correlation matrices;
//! - [`chart`] validates a chart request and produces chart-ready data;
//! - [`session`] ties it together around one session-scoped current table.

pub mod aggregate;
pub mod chart;
pub mod error;
pub mod loader;
pub mod normalize;
pub mod session;
pub mod table;

pub use aggregate::{
    aggregate_time, column_means, correlation_matrix, describe, AggregationResult,
    AggregationSpec, ColumnMean, ColumnSummary, CorrelationMatrix, Granularity, HourlyMatrix,
    PeriodMean, PeriodTable,
};
pub use chart::{
    aggregation_chart, build_chart, ChartData, ChartKind, ChartLabels, ChartSpec, PlotValue,
    RenderPlan,
};
pub use error::{
    AggregateError, ChartError, ErrorSeverity, LoadError, PipelineError, Result, SourceReport,
    TableError,
};
pub use loader::{load_paths, load_sources, LoadOutcome, RawSource};
pub use normalize::normalize_edited;
pub use session::ExplorerSession;
pub use table::{Column, ColumnBuilder, ColumnInfo, DataType, Table, TableEditor, TableMetadata};
