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
use crate::table::column::Column;
use crate::table::frame::Table;

/// Free-form in-memory editing surface: rows addable and removable, every
/// cell typed as text. `build` produces an all-Text table which the session
/// then runs through the normalizer.
#[derive(Debug, Clone)]
pub struct TableEditor {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl TableEditor {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Ragged rows are accepted; short rows read as missing cells.
    pub fn add_row(&mut self, cells: Vec<Option<String>>) {
        self.rows.push(cells);
    }

    pub fn add_text_row(&mut self, cells: &[&str]) {
        self.add_row(cells.iter().map(|c| Some(c.to_string())).collect());
    }

    pub fn remove_row(&mut self, index: usize) -> bool {
        if index < self.rows.len() {
            self.rows.remove(index);
            true
        } else {
            false
        }
    }

    pub fn set_cell(&mut self, row: usize, column: &str, value: Option<String>) -> TableResult<()> {
        let col_idx = self
            .headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| TableError::ColumnNotFound(column.to_string()))?;
        let rows = self.rows.len();
        let cells = self
            .rows
            .get_mut(row)
            .ok_or(TableError::RowOutOfRange { index: row, rows })?;
        if cells.len() <= col_idx {
            cells.resize(col_idx + 1, None);
        }
        cells[col_idx] = value;
        Ok(())
    }

    pub fn build(&self, name: impl Into<String>) -> TableResult<Table> {
        let mut table = Table::new(name);
        for (col_idx, header) in self.headers.iter().enumerate() {
            let cells: Vec<Option<String>> = self
                .rows
                .iter()
                .map(|row| {
                    row.get(col_idx)
                        .cloned()
                        .flatten()
                        .filter(|s| !s.trim().is_empty())
                })
                .collect();
            table.add_column(header.clone(), Column::text_from(cells))?;
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::column::DataType;

    #[test]
    fn builds_all_text_table() {
        let mut editor = TableEditor::new(vec!["a".to_string(), "b".to_string()]);
        editor.add_text_row(&["1", "x"]);
        editor.add_text_row(&["2", "y"]);
        let table = editor.build("edited").unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.get_column("a").unwrap().data_type(), DataType::Text);
    }

    #[test]
    fn short_rows_pad_with_missing() {
        let mut editor = TableEditor::new(vec!["a".to_string(), "b".to_string()]);
        editor.add_row(vec![Some("1".to_string())]);
        let table = editor.build("edited").unwrap();
        assert_eq!(table.get_column("b").unwrap().null_count(), 1);
    }

    #[test]
    fn rows_can_be_removed_and_cells_set() {
        let mut editor = TableEditor::new(vec!["a".to_string()]);
        editor.add_text_row(&["1"]);
        editor.add_text_row(&["2"]);
        assert!(editor.remove_row(0));
        assert!(!editor.remove_row(5));
        editor.set_cell(0, "a", Some("7".to_string())).unwrap();
        let table = editor.build("edited").unwrap();
        assert_eq!(table.row_count(), 1);
        assert_eq!(
            table.get_column("a").unwrap().get_text(0).as_deref(),
            Some("7")
        );
    }

    #[test]
    fn set_cell_rejects_unknown_column() {
        let mut editor = TableEditor::new(vec!["a".to_string()]);
        editor.add_text_row(&["1"]);
        assert!(editor.set_cell(0, "zzz", None).is_err());
    }

    #[test]
    fn set_cell_reports_row_out_of_range() {
        let mut editor = TableEditor::new(vec!["a".to_string()]);
        editor.add_text_row(&["1"]);
        let err = editor.set_cell(5, "a", None).unwrap_err();
        assert!(matches!(
            err,
            TableError::RowOutOfRange { index: 5, rows: 1 }
        ));
    }
}
