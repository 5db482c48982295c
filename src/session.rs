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

//! Session-scoped pipeline state. One session owns at most one current
//! table; concurrent users each get their own session, there is no shared
//! global.

use crate::aggregate::{
    self, AggregationResult, AggregationSpec, ColumnMean, ColumnSummary, CorrelationMatrix,
};
use crate::chart::{build_chart, ChartSpec, RenderPlan};
use crate::error::{PipelineError, Result, SourceReport, TableError};
use crate::loader::{load_sources, RawSource};
use crate::normalize::normalize_edited;
use crate::table::{Table, TableEditor};

#[derive(Debug, Default)]
pub struct ExplorerSession {
    table: Option<Table>,
}

impl ExplorerSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    pub fn has_table(&self) -> bool {
        self.table.is_some()
    }

    pub fn clear(&mut self) {
        self.table = None;
    }

    /// Replaces the current table with one loaded from raw sources. An
    /// empty source list clears the session instead; the per-source skip
    /// reports are returned for the shell to show.
    pub fn load(&mut self, sources: &[RawSource]) -> Result<Vec<SourceReport>> {
        match load_sources(sources)? {
            Some(outcome) => {
                tracing::info!(
                    rows = outcome.table.row_count(),
                    columns = outcome.table.column_count(),
                    skipped = outcome.skipped.len(),
                    "loaded table"
                );
                self.table = Some(outcome.table);
                Ok(outcome.skipped)
            }
            None => {
                self.table = None;
                Ok(Vec::new())
            }
        }
    }

    /// Replaces the current table with a freely edited one, running the
    /// best-effort type coercion pass over it first.
    pub fn apply_edits(&mut self, editor: TableEditor, name: &str) -> Result<()> {
        let raw = editor.build(name).map_err(PipelineError::Table)?;
        let normalized = normalize_edited(&raw).map_err(PipelineError::Table)?;
        self.table = Some(normalized);
        Ok(())
    }

    pub fn replace_table(&mut self, table: Table) {
        self.table = Some(table);
    }

    fn current(&self) -> Result<&Table> {
        self.table.as_ref().ok_or_else(|| {
            tracing::warn!("operation requested with no table loaded");
            PipelineError::Table(TableError::NoTable)
        })
    }

    pub fn column_means(&self, columns: &[String]) -> Result<Vec<ColumnMean>> {
        Ok(aggregate::column_means(self.current()?, columns)?)
    }

    pub fn aggregate_time(&self, spec: &AggregationSpec) -> Result<AggregationResult> {
        Ok(aggregate::aggregate_time(self.current()?, spec)?)
    }

    pub fn describe(&self, columns: &[String]) -> Result<Vec<ColumnSummary>> {
        Ok(aggregate::describe(self.current()?, columns)?)
    }

    pub fn correlation(&self, columns: &[String]) -> Result<CorrelationMatrix> {
        Ok(aggregate::correlation_matrix(self.current()?, columns)?)
    }

    pub fn build_chart(&self, spec: &ChartSpec) -> Result<RenderPlan> {
        Ok(build_chart(self.current()?, spec)?)
    }
}
