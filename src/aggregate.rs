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

use crate::error::{AggregateError, AggregateResult};
use crate::normalize::parse_datetime;
use crate::table::{Column, Table};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Time-bucketing rule applied during time-series aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    /// (hour-of-day, calendar date) pairs, rendered as a 24-row matrix.
    HourOfDayPerDay,
    /// Hour of day 0-23 across the whole period.
    HourOfDay,
    Day,
    DayOfWeek,
    Month,
    Year,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationSpec {
    pub time_column: String,
    pub value_column: String,
    pub granularity: Granularity,
}

#[derive(Debug, Clone, Serialize)]
pub enum AggregationResult {
    HourlyMatrix(HourlyMatrix),
    Periods(PeriodTable),
}

/// Hour-of-day x calendar-date grid of per-bucket means. Combinations with
/// no observations stay empty; there is no synthetic zero-fill.
#[derive(Debug, Clone, Serialize)]
pub struct HourlyMatrix {
    pub value_column: String,
    pub dates: Vec<NaiveDate>,
    /// 24 rows (hour 0-23), one cell per entry of `dates`.
    pub cells: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodTable {
    pub granularity: Granularity,
    pub value_column: String,
    pub rows: Vec<PeriodMean>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodMean {
    pub label: String,
    pub mean: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnMean {
    pub column: String,
    /// `None` when the column has no non-missing cells.
    pub mean: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1 denominator).
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
}

/// Symmetric Pearson correlation matrix over a set of numeric columns,
/// computed on pairwise-complete rows. Pairs with fewer than two complete
/// rows or zero variance carry NaN.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

fn numeric_column<'a>(table: &'a Table, name: &str) -> AggregateResult<&'a Column> {
    let column = table.column(name)?;
    if !column.is_numeric() {
        return Err(AggregateError::NotNumeric {
            column: name.to_string(),
            found: column.data_type(),
        });
    }
    Ok(column)
}

/// Mean of each selected numeric column, missing cells ignored. A column
/// with no non-missing cells stays in the result with a null mean rather
/// than dropping out silently.
pub fn column_means(table: &Table, columns: &[String]) -> AggregateResult<Vec<ColumnMean>> {
    if columns.is_empty() {
        return Err(AggregateError::EmptySelection);
    }
    let mut means = Vec::with_capacity(columns.len());
    for name in columns {
        let column = numeric_column(table, name)?;
        let values = column.numeric_values();
        let mean = if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        };
        means.push(ColumnMean {
            column: name.clone(),
            mean,
        });
    }
    Ok(means)
}

/// Buckets rows per the granularity rule and averages the value column per
/// bucket. The time column is coerced first: a Date column is used as-is,
/// a Text or Category column is parsed per cell against the known formats.
/// Coercion failing for every row fails the operation.
pub fn aggregate_time(table: &Table, spec: &AggregationSpec) -> AggregateResult<AggregationResult> {
    let value_column = numeric_column(table, &spec.value_column)?;
    let times = coerce_time_column(table, &spec.time_column)?;

    // rows missing either side drop out of every bucket
    let observations: Vec<(NaiveDateTime, f64)> = times
        .iter()
        .enumerate()
        .filter_map(|(i, t)| Some(((*t)?, value_column.get_f64(i)?)))
        .collect();

    match spec.granularity {
        Granularity::HourOfDayPerDay => {
            Ok(AggregationResult::HourlyMatrix(build_hourly_matrix(
                &observations,
                &spec.value_column,
            )))
        }
        granularity => Ok(AggregationResult::Periods(build_period_table(
            &observations,
            granularity,
            &spec.value_column,
        ))),
    }
}

fn coerce_time_column(table: &Table, name: &str) -> AggregateResult<Vec<Option<NaiveDateTime>>> {
    let column = table.column(name)?;
    let coerced: Vec<Option<NaiveDateTime>> = match column {
        Column::Date(data) => data.clone(),
        Column::Text(_) | Column::Category(_) => (0..column.len())
            .map(|i| column.get_text(i).and_then(|s| parse_datetime(&s)))
            .collect(),
        _ => {
            return Err(AggregateError::TimeCoercionFailed {
                column: name.to_string(),
            })
        }
    };
    if column.len() > 0 && coerced.iter().all(|t| t.is_none()) {
        return Err(AggregateError::TimeCoercionFailed {
            column: name.to_string(),
        });
    }
    Ok(coerced)
}

fn build_hourly_matrix(observations: &[(NaiveDateTime, f64)], value_column: &str) -> HourlyMatrix {
    let mut sums: BTreeMap<(NaiveDate, u32), (f64, usize)> = BTreeMap::new();
    let mut dates: BTreeSet<NaiveDate> = BTreeSet::new();
    for (time, value) in observations {
        let key = (time.date(), time.hour());
        dates.insert(key.0);
        let entry = sums.entry(key).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    let dates: Vec<NaiveDate> = dates.into_iter().collect();
    let mut cells = vec![vec![None; dates.len()]; 24];
    for ((date, hour), (sum, count)) in sums {
        if let Ok(col) = dates.binary_search(&date) {
            cells[hour as usize][col] = Some(sum / count as f64);
        }
    }
    HourlyMatrix {
        value_column: value_column.to_string(),
        dates,
        cells,
    }
}

/// Sort key giving each granularity its natural bucket order; day-of-week
/// is fixed Monday-first, never lexicographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PeriodKey {
    Hour(u32),
    Day(NaiveDate),
    Weekday(u32),
    Month(i32, u32),
    Year(i32),
}

fn period_key(time: &NaiveDateTime, granularity: Granularity) -> PeriodKey {
    match granularity {
        Granularity::HourOfDay => PeriodKey::Hour(time.hour()),
        Granularity::Day => PeriodKey::Day(time.date()),
        Granularity::DayOfWeek => PeriodKey::Weekday(time.weekday().num_days_from_monday()),
        Granularity::Month => PeriodKey::Month(time.year(), time.month()),
        Granularity::Year => PeriodKey::Year(time.year()),
        Granularity::HourOfDayPerDay => unreachable!("matrix granularity handled separately"),
    }
}

fn period_label(key: &PeriodKey) -> String {
    match key {
        PeriodKey::Hour(h) => h.to_string(),
        PeriodKey::Day(date) => date.format("%Y-%m-%d").to_string(),
        PeriodKey::Weekday(offset) => weekday_name(*offset).to_string(),
        PeriodKey::Month(year, month) => format!("{year}-{month:02}"),
        PeriodKey::Year(year) => year.to_string(),
    }
}

fn weekday_name(days_from_monday: u32) -> &'static str {
    match days_from_monday {
        0 => "Monday",
        1 => "Tuesday",
        2 => "Wednesday",
        3 => "Thursday",
        4 => "Friday",
        5 => "Saturday",
        _ => "Sunday",
    }
}

fn build_period_table(
    observations: &[(NaiveDateTime, f64)],
    granularity: Granularity,
    value_column: &str,
) -> PeriodTable {
    let mut sums: BTreeMap<PeriodKey, (f64, usize)> = BTreeMap::new();
    for (time, value) in observations {
        let entry = sums.entry(period_key(time, granularity)).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    let rows = sums
        .into_iter()
        .map(|(key, (sum, count))| PeriodMean {
            label: period_label(&key),
            mean: sum / count as f64,
        })
        .collect();
    PeriodTable {
        granularity,
        value_column: value_column.to_string(),
        rows,
    }
}

/// Descriptive statistics over selected numeric columns.
pub fn describe(table: &Table, columns: &[String]) -> AggregateResult<Vec<ColumnSummary>> {
    if columns.is_empty() {
        return Err(AggregateError::EmptySelection);
    }
    let mut summaries = Vec::with_capacity(columns.len());
    for name in columns {
        let column = numeric_column(table, name)?;
        let mut values = column.numeric_values();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        summaries.push(summarise(name, &values));
    }
    Ok(summaries)
}

fn summarise(name: &str, sorted: &[f64]) -> ColumnSummary {
    let count = sorted.len();
    if count == 0 {
        return ColumnSummary {
            column: name.to_string(),
            count,
            mean: None,
            std_dev: None,
            min: None,
            max: None,
            q25: None,
            median: None,
            q75: None,
        };
    }
    let mean = sorted.iter().sum::<f64>() / count as f64;
    let std_dev = if count > 1 {
        let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
        Some((ss / (count - 1) as f64).sqrt())
    } else {
        None
    };
    ColumnSummary {
        column: name.to_string(),
        count,
        mean: Some(mean),
        std_dev,
        min: sorted.first().copied(),
        max: sorted.last().copied(),
        q25: quantile(sorted, 0.25),
        median: quantile(sorted, 0.5),
        q75: quantile(sorted, 0.75),
    }
}

/// Linear interpolation between order statistics, on already-sorted data.
fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let frac = pos - lo as f64;
    if lo + 1 < sorted.len() {
        Some(sorted[lo] + frac * (sorted[lo + 1] - sorted[lo]))
    } else {
        Some(sorted[lo])
    }
}

/// Pairwise-complete Pearson correlation over at least two numeric columns.
pub fn correlation_matrix(table: &Table, columns: &[String]) -> AggregateResult<CorrelationMatrix> {
    if columns.len() < 2 {
        return Err(AggregateError::NotEnoughColumns {
            needed: 2,
            got: columns.len(),
        });
    }
    let mut series = Vec::with_capacity(columns.len());
    for name in columns {
        let column = numeric_column(table, name)?;
        let cells: Vec<Option<f64>> = (0..column.len()).map(|i| column.get_f64(i)).collect();
        series.push(cells);
    }
    let n = series.len();
    let mut values = vec![vec![1.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let r = pearson(&series[i], &series[j]);
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    Ok(CorrelationMatrix {
        columns: columns.to_vec(),
        values,
    })
}

/// Rows with a missing value on either side are excluded from this pair
/// only.
fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;
    use proptest::prelude::*;

    fn numeric_table(pairs: &[(&str, Vec<Option<f64>>)]) -> Table {
        let mut table = Table::new("test");
        for (name, values) in pairs {
            table
                .add_column(name.to_string(), Column::Float(values.clone()))
                .unwrap();
        }
        table
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn column_mean_of_one_to_four_is_two_point_five() {
        let table = numeric_table(&[("v", vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)])]);
        let means = column_means(&table, &names(&["v"])).unwrap();
        assert_eq!(means.len(), 1);
        assert!((means[0].mean.unwrap() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn all_missing_column_keeps_its_entry_with_null_mean() {
        let table = numeric_table(&[
            ("v", vec![Some(1.0), Some(3.0)]),
            ("empty", vec![None, None]),
        ]);
        let means = column_means(&table, &names(&["v", "empty"])).unwrap();
        assert_eq!(means.len(), 2);
        assert_eq!(means[0].mean, Some(2.0));
        assert_eq!(means[1].column, "empty");
        assert_eq!(means[1].mean, None);
    }

    #[test]
    fn empty_selection_is_a_warning_not_a_crash() {
        let table = numeric_table(&[("v", vec![Some(1.0)])]);
        assert!(matches!(
            column_means(&table, &[]),
            Err(AggregateError::EmptySelection)
        ));
        assert!(matches!(
            describe(&table, &[]),
            Err(AggregateError::EmptySelection)
        ));
    }

    #[test]
    fn non_numeric_selection_aborts_with_cause() {
        let mut table = Table::new("test");
        table
            .add_column("label", Column::text_from(vec![Some("a".to_string())]))
            .unwrap();
        let err = column_means(&table, &names(&["label"])).unwrap_err();
        assert!(matches!(err, AggregateError::NotNumeric { .. }));
    }

    fn week_table() -> Table {
        // one observation per weekday, deliberately shuffled
        let days = [
            ("2023-05-04", 4.0), // Thursday
            ("2023-05-01", 1.0), // Monday
            ("2023-05-07", 7.0), // Sunday
            ("2023-05-02", 2.0), // Tuesday
            ("2023-05-06", 6.0), // Saturday
            ("2023-05-03", 3.0), // Wednesday
            ("2023-05-05", 5.0), // Friday
        ];
        let mut table = Table::new("week");
        table
            .add_column(
                "ts",
                Column::Date(
                    days.iter()
                        .map(|(d, _)| {
                            Some(
                                NaiveDate::parse_from_str(d, "%Y-%m-%d")
                                    .unwrap()
                                    .and_hms_opt(9, 0, 0)
                                    .unwrap(),
                            )
                        })
                        .collect(),
                ),
            )
            .unwrap();
        table
            .add_column("v", Column::Float(days.iter().map(|(_, v)| Some(*v)).collect()))
            .unwrap();
        table
    }

    #[test]
    fn day_of_week_buckets_are_monday_first() {
        let spec = AggregationSpec {
            time_column: "ts".to_string(),
            value_column: "v".to_string(),
            granularity: Granularity::DayOfWeek,
        };
        let result = aggregate_time(&week_table(), &spec).unwrap();
        let AggregationResult::Periods(periods) = result else {
            panic!("expected period table");
        };
        let labels: Vec<&str> = periods.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(
            labels,
            [
                "Monday",
                "Tuesday",
                "Wednesday",
                "Thursday",
                "Friday",
                "Saturday",
                "Sunday"
            ]
        );
        assert_eq!(periods.rows[0].mean, 1.0);
        assert_eq!(periods.rows[6].mean, 7.0);
    }

    #[test]
    fn daily_buckets_sort_chronologically() {
        let spec = AggregationSpec {
            time_column: "ts".to_string(),
            value_column: "v".to_string(),
            granularity: Granularity::Day,
        };
        let AggregationResult::Periods(periods) = aggregate_time(&week_table(), &spec).unwrap()
        else {
            panic!("expected period table");
        };
        let labels: Vec<&str> = periods.rows.iter().map(|r| r.label.as_str()).collect();
        let mut sorted = labels.clone();
        sorted.sort();
        assert_eq!(labels, sorted);
        assert_eq!(labels.first().copied(), Some("2023-05-01"));
    }

    #[test]
    fn hourly_matrix_leaves_missing_combinations_empty() {
        let date = NaiveDate::from_ymd_opt(2023, 5, 1).unwrap();
        let next = NaiveDate::from_ymd_opt(2023, 5, 2).unwrap();
        let mut table = Table::new("hours");
        table
            .add_column(
                "ts",
                Column::Date(vec![
                    Some(date.and_hms_opt(0, 10, 0).unwrap()),
                    Some(date.and_hms_opt(0, 50, 0).unwrap()),
                    Some(next.and_hms_opt(5, 0, 0).unwrap()),
                ]),
            )
            .unwrap();
        table
            .add_column("v", Column::Float(vec![Some(10.0), Some(20.0), Some(7.0)]))
            .unwrap();
        let spec = AggregationSpec {
            time_column: "ts".to_string(),
            value_column: "v".to_string(),
            granularity: Granularity::HourOfDayPerDay,
        };
        let AggregationResult::HourlyMatrix(matrix) = aggregate_time(&table, &spec).unwrap()
        else {
            panic!("expected matrix");
        };
        assert_eq!(matrix.dates, vec![date, next]);
        assert_eq!(matrix.cells.len(), 24);
        assert_eq!(matrix.cells[0][0], Some(15.0));
        assert_eq!(matrix.cells[0][1], None);
        assert_eq!(matrix.cells[5][1], Some(7.0));
        assert_eq!(matrix.cells[5][0], None);
    }

    #[test]
    fn text_time_column_is_coerced_per_cell() {
        let mut table = Table::new("text_times");
        table
            .add_column(
                "when",
                Column::text_from(vec![
                    Some("2023-05-01 10:00:00".to_string()),
                    Some("garbage".to_string()),
                    Some("2023-05-01 11:00:00".to_string()),
                ]),
            )
            .unwrap();
        table
            .add_column("v", Column::Float(vec![Some(1.0), Some(100.0), Some(3.0)]))
            .unwrap();
        let spec = AggregationSpec {
            time_column: "when".to_string(),
            value_column: "v".to_string(),
            granularity: Granularity::Day,
        };
        let AggregationResult::Periods(periods) = aggregate_time(&table, &spec).unwrap() else {
            panic!("expected period table");
        };
        // the garbage row is skipped, not averaged in
        assert_eq!(periods.rows.len(), 1);
        assert_eq!(periods.rows[0].mean, 2.0);
    }

    #[test]
    fn unparseable_time_column_fails_the_operation() {
        let mut table = Table::new("bad_times");
        table
            .add_column(
                "when",
                Column::text_from(vec![Some("a".to_string()), Some("b".to_string())]),
            )
            .unwrap();
        table
            .add_column("v", Column::Float(vec![Some(1.0), Some(2.0)]))
            .unwrap();
        let spec = AggregationSpec {
            time_column: "when".to_string(),
            value_column: "v".to_string(),
            granularity: Granularity::Year,
        };
        assert!(matches!(
            aggregate_time(&table, &spec),
            Err(AggregateError::TimeCoercionFailed { .. })
        ));
    }

    #[test]
    fn describe_matches_hand_computed_values() {
        let table = numeric_table(&[(
            "v",
            vec![Some(10.0), Some(20.0), Some(30.0), Some(40.0)],
        )]);
        let summary = &describe(&table, &names(&["v"])).unwrap()[0];
        assert_eq!(summary.count, 4);
        assert_eq!(summary.mean, Some(25.0));
        assert_eq!(summary.min, Some(10.0));
        assert_eq!(summary.max, Some(40.0));
        assert_eq!(summary.median, Some(25.0));
        assert_eq!(summary.q25, Some(17.5));
        assert_eq!(summary.q75, Some(32.5));
        let std_dev = summary.std_dev.unwrap();
        assert!((std_dev - 12.909944487358056).abs() < 1e-9);
    }

    #[test]
    fn correlation_of_anticorrelated_columns_is_minus_one() {
        let table = numeric_table(&[
            ("a", vec![Some(1.0), Some(2.0), Some(3.0)]),
            ("b", vec![Some(3.0), Some(2.0), Some(1.0)]),
        ]);
        let matrix = correlation_matrix(&table, &names(&["a", "b"])).unwrap();
        assert_eq!(matrix.values[0][0], 1.0);
        assert_eq!(matrix.values[1][1], 1.0);
        assert!((matrix.values[0][1] + 1.0).abs() < 1e-12);
        assert_eq!(matrix.values[0][1], matrix.values[1][0]);
    }

    #[test]
    fn correlation_uses_pairwise_complete_rows() {
        // the None row is excluded; the remaining pairs are perfectly
        // correlated
        let table = numeric_table(&[
            ("a", vec![Some(1.0), Some(2.0), None, Some(4.0)]),
            ("b", vec![Some(2.0), Some(4.0), Some(100.0), Some(8.0)]),
        ]);
        let matrix = correlation_matrix(&table, &names(&["a", "b"])).unwrap();
        assert!((matrix.values[0][1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn correlation_needs_two_columns() {
        let table = numeric_table(&[("a", vec![Some(1.0)])]);
        assert!(matches!(
            correlation_matrix(&table, &names(&["a"])),
            Err(AggregateError::NotEnoughColumns { needed: 2, got: 1 })
        ));
    }

    proptest! {
        #[test]
        fn mean_lies_between_min_and_max(values in prop::collection::vec(-1.0e6f64..1.0e6, 1..50)) {
            let cells: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
            let table = numeric_table(&[("v", cells)]);
            let summary = &describe(&table, &names(&["v"])).unwrap()[0];
            let mean = summary.mean.unwrap();
            prop_assert!(summary.min.unwrap() - 1e-9 <= mean);
            prop_assert!(mean <= summary.max.unwrap() + 1e-9);
        }

        #[test]
        fn correlation_matrix_is_symmetric_with_unit_diagonal(
            xs in prop::collection::vec(-1.0e3f64..1.0e3, 3..30),
            seed in 1.0f64..5.0,
        ) {
            let ys: Vec<f64> = xs.iter().enumerate().map(|(i, x)| x * seed + i as f64).collect();
            let table = numeric_table(&[
                ("x", xs.iter().copied().map(Some).collect()),
                ("y", ys.iter().copied().map(Some).collect()),
            ]);
            let matrix = correlation_matrix(&table, &names(&["x", "y"])).unwrap();
            prop_assert_eq!(matrix.values[0][0], 1.0);
            prop_assert_eq!(matrix.values[1][1], 1.0);
            let a = matrix.values[0][1];
            let b = matrix.values[1][0];
            if a.is_nan() {
                prop_assert!(b.is_nan());
            } else {
                prop_assert_eq!(a, b);
                prop_assert!((-1.0 - 1e-9..=1.0 + 1e-9).contains(&a));
            }
        }
    }
}
