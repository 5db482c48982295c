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

//! Turns a chart request plus a table into chart-ready data. Pure
//! computation; the rendering engine lives in the UI shell.

use crate::aggregate::{
    correlation_matrix, AggregationResult, CorrelationMatrix, Granularity,
};
use crate::error::{AggregateError, ChartError, ChartResult};
use crate::table::{Column, Table};
use serde::{Deserialize, Serialize};

/// Closed set of chart families, dispatched exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartKind {
    Line,
    Bar,
    StackedBar,
    Scatter,
    Heatmap,
}

/// User-facing chart request. Column references are names; every build
/// resolves them against the table and fails on an unknown name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: Option<ChartKind>,
    pub x: Option<String>,
    pub ys: Vec<String>,
    /// Scatter only: per-point group labels drawn in distinct colors.
    pub color: Option<String>,
    /// Heatmap only: density value; omitting it selects the correlation
    /// fallback.
    pub z: Option<String>,
    pub title: Option<String>,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub theme: Option<String>,
}

impl ChartSpec {
    pub fn new(kind: ChartKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn with_x(mut self, x: impl Into<String>) -> Self {
        self.x = Some(x.into());
        self
    }

    pub fn with_ys(mut self, ys: &[&str]) -> Self {
        self.ys = ys.iter().map(|y| y.to_string()).collect();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_z(mut self, z: impl Into<String>) -> Self {
        self.z = Some(z.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

pub const DEFAULT_THEME: &str = "plotly";

/// Resolved presentation strings: explicit values win, otherwise derived
/// from the column names involved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartLabels {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub theme: String,
}

/// Either axis of a plotted point. Numbers stay numbers so the renderer
/// can scale axes; everything else is carried as display text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PlotValue {
    Number(f64),
    Text(String),
}

fn plot_value(column: &Column, index: usize) -> Option<PlotValue> {
    match column.get_f64(index) {
        Some(v) => Some(PlotValue::Number(v)),
        None => column.get_text(index).map(PlotValue::Text),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NamedSeries {
    pub name: String,
    /// One cell per x label, missing values preserved as gaps.
    pub values: Vec<Option<f64>>,
}

/// One melted row for long-format charts: (x, series, value).
#[derive(Debug, Clone, Serialize)]
pub struct LongRow {
    pub x: String,
    pub series: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScatterPoint {
    pub x: PlotValue,
    pub y: PlotValue,
    pub group: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DensityPoint {
    pub x: PlotValue,
    pub y: PlotValue,
    pub z: f64,
}

/// Chart-ready data, one shape per chart family.
#[derive(Debug, Clone, Serialize)]
pub enum ChartData {
    /// Shared x labels with one aligned series per y column.
    Series {
        x: Vec<String>,
        series: Vec<NamedSeries>,
    },
    /// Long-format rows for stacked rendering.
    Long { rows: Vec<LongRow> },
    Scatter { points: Vec<ScatterPoint> },
    Density { points: Vec<DensityPoint> },
    /// The heatmap-without-z fallback.
    Correlation(CorrelationMatrix),
}

/// Everything the shell needs to draw one chart.
#[derive(Debug, Clone, Serialize)]
pub struct RenderPlan {
    pub kind: ChartKind,
    pub labels: ChartLabels,
    pub data: ChartData,
}

/// Builds chart-ready data for the request, validating the axis selections
/// first. Validation failures are warnings for the shell to surface; no
/// partial chart is ever produced.
pub fn build_chart(table: &Table, spec: &ChartSpec) -> ChartResult<RenderPlan> {
    let kind = spec.kind.unwrap_or(ChartKind::Line);
    let data = match kind {
        ChartKind::Line | ChartKind::Bar => build_series(table, spec)?,
        ChartKind::StackedBar => build_long(table, spec)?,
        ChartKind::Scatter => build_scatter(table, spec)?,
        ChartKind::Heatmap => build_heatmap(table, spec)?,
    };
    Ok(RenderPlan {
        kind,
        labels: resolve_labels(spec, &data),
        data,
    })
}

fn require_x<'a>(spec: &'a ChartSpec) -> ChartResult<&'a str> {
    spec.x
        .as_deref()
        .ok_or(ChartError::MissingAxis { axis: "x" })
}

fn require_y<'a>(spec: &'a ChartSpec) -> ChartResult<&'a str> {
    spec.ys
        .first()
        .map(String::as_str)
        .ok_or(ChartError::MissingAxis { axis: "y" })
}

fn numeric_column<'a>(table: &'a Table, name: &str) -> ChartResult<&'a Column> {
    let column = table.column(name)?;
    if !column.is_numeric() {
        return Err(ChartError::Aggregate(AggregateError::NotNumeric {
            column: name.to_string(),
            found: column.data_type(),
        }));
    }
    Ok(column)
}

fn x_labels(table: &Table, name: &str) -> ChartResult<Vec<String>> {
    let column = table.column(name)?;
    Ok((0..column.len())
        .map(|i| column.get_text(i).unwrap_or_default())
        .collect())
}

fn build_series(table: &Table, spec: &ChartSpec) -> ChartResult<ChartData> {
    let x_name = require_x(spec)?;
    if spec.ys.is_empty() {
        return Err(ChartError::EmptyYSelection);
    }
    let x = x_labels(table, x_name)?;
    let mut series = Vec::with_capacity(spec.ys.len());
    for y_name in &spec.ys {
        let column = numeric_column(table, y_name)?;
        series.push(NamedSeries {
            name: y_name.clone(),
            values: (0..column.len()).map(|i| column.get_f64(i)).collect(),
        });
    }
    Ok(ChartData::Series { x, series })
}

fn build_long(table: &Table, spec: &ChartSpec) -> ChartResult<ChartData> {
    let x_name = require_x(spec)?;
    if spec.ys.is_empty() {
        return Err(ChartError::EmptyYSelection);
    }
    let x = x_labels(table, x_name)?;
    let mut rows = Vec::new();
    for y_name in &spec.ys {
        let column = numeric_column(table, y_name)?;
        for (i, label) in x.iter().enumerate() {
            if let Some(value) = column.get_f64(i) {
                rows.push(LongRow {
                    x: label.clone(),
                    series: y_name.clone(),
                    value,
                });
            }
        }
    }
    Ok(ChartData::Long { rows })
}

fn build_scatter(table: &Table, spec: &ChartSpec) -> ChartResult<ChartData> {
    let x_column = table.column(require_x(spec)?)?;
    let y_column = table.column(require_y(spec)?)?;
    let color_column = spec
        .color
        .as_deref()
        .map(|name| table.column(name))
        .transpose()?;
    let points = (0..table.row_count())
        .filter_map(|i| {
            Some(ScatterPoint {
                x: plot_value(x_column, i)?,
                y: plot_value(y_column, i)?,
                group: color_column.and_then(|c| c.get_text(i)),
            })
        })
        .collect();
    Ok(ChartData::Scatter { points })
}

/// A heatmap always needs an x and a y selection. With a z column it plots
/// density triples; without one it falls back to a correlation matrix over
/// every numeric column of the table, ignoring which x and y were picked.
/// The fallback is intentional: selecting "heatmap" with no value column
/// is the correlation view.
fn build_heatmap(table: &Table, spec: &ChartSpec) -> ChartResult<ChartData> {
    let x_name = require_x(spec)?;
    let y_name = require_y(spec)?;
    let Some(z_name) = spec.z.as_deref() else {
        let numeric = table.numeric_columns();
        if numeric.len() < 2 {
            return Err(ChartError::NoNumericColumns);
        }
        let matrix = correlation_matrix(table, &numeric)?;
        return Ok(ChartData::Correlation(matrix));
    };
    let x_column = table.column(x_name)?;
    let y_column = table.column(y_name)?;
    let z_column = numeric_column(table, z_name)?;
    let points = (0..table.row_count())
        .filter_map(|i| {
            Some(DensityPoint {
                x: plot_value(x_column, i)?,
                y: plot_value(y_column, i)?,
                z: z_column.get_f64(i)?,
            })
        })
        .collect();
    Ok(ChartData::Density { points })
}

fn resolve_labels(spec: &ChartSpec, data: &ChartData) -> ChartLabels {
    let x_default = spec.x.clone().unwrap_or_default();
    let y_default = match data {
        ChartData::Correlation(_) => String::new(),
        _ => spec.ys.join(", "),
    };
    let title_default = match data {
        ChartData::Correlation(_) => "Correlation matrix".to_string(),
        _ if x_default.is_empty() || y_default.is_empty() => String::new(),
        _ => format!("{y_default} by {x_default}"),
    };
    ChartLabels {
        title: spec.title.clone().unwrap_or(title_default),
        x_label: spec.x_label.clone().unwrap_or(x_default),
        y_label: spec.y_label.clone().unwrap_or(y_default),
        theme: spec.theme.clone().unwrap_or_else(|| DEFAULT_THEME.to_string()),
    }
}

/// Maps an aggregation result onto the chart family the explorer draws for
/// it: lines for chronological buckets, bars for day-of-week, a density
/// heatmap for the hour-by-date matrix.
pub fn aggregation_chart(result: &AggregationResult) -> RenderPlan {
    match result {
        AggregationResult::Periods(periods) => {
            let kind = match periods.granularity {
                Granularity::DayOfWeek => ChartKind::Bar,
                _ => ChartKind::Line,
            };
            let x = periods.rows.iter().map(|r| r.label.clone()).collect();
            let values = periods.rows.iter().map(|r| Some(r.mean)).collect();
            RenderPlan {
                kind,
                labels: ChartLabels {
                    title: format!("Mean {} by period", periods.value_column),
                    x_label: "period".to_string(),
                    y_label: periods.value_column.clone(),
                    theme: DEFAULT_THEME.to_string(),
                },
                data: ChartData::Series {
                    x,
                    series: vec![NamedSeries {
                        name: periods.value_column.clone(),
                        values,
                    }],
                },
            }
        }
        AggregationResult::HourlyMatrix(matrix) => {
            let mut points = Vec::new();
            for (hour, row) in matrix.cells.iter().enumerate() {
                for (col, cell) in row.iter().enumerate() {
                    if let Some(value) = cell {
                        points.push(DensityPoint {
                            x: PlotValue::Text(
                                matrix.dates[col].format("%Y-%m-%d").to_string(),
                            ),
                            y: PlotValue::Number(hour as f64),
                            z: *value,
                        });
                    }
                }
            }
            RenderPlan {
                kind: ChartKind::Heatmap,
                labels: ChartLabels {
                    title: format!("Mean {} by hour and date", matrix.value_column),
                    x_label: "date".to_string(),
                    y_label: "hour".to_string(),
                    theme: DEFAULT_THEME.to_string(),
                },
                data: ChartData::Density { points },
            }
        }
    }
}
