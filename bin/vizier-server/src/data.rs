// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2025 Vizier Project
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

//! Turns a bound chart into plain vectors the drawing code can consume,
//! keeping all dataframe access on this side of the renderer.

use polars::prelude::{DataType, Series};
use std::collections::HashMap;
use vizier::error::{RenderError, RenderResult};
use vizier::{BindTarget, ChartKind, Role, RoleBinding, Table};

/// Render-ready values for one chart, already aggregated where the chart
/// calls for it.
#[derive(Debug, Clone)]
pub enum ChartData {
    Bar {
        categories: Vec<String>,
        values: Vec<f64>,
        category_label: String,
        value_label: String,
    },
    Line {
        points: Vec<(f64, f64)>,
        /// Tick labels for non-numeric x-axes, indexed by position.
        x_ticks: Option<Vec<String>>,
        x_label: String,
        y_label: String,
    },
    Scatter {
        /// One entry per colour group; a single unnamed group when the
        /// colour role is unbound.
        groups: Vec<(String, Vec<(f64, f64)>)>,
        x_label: String,
        y_label: String,
    },
    Histogram {
        values: Vec<f64>,
        label: String,
    },
    Pie {
        slices: Vec<(String, f64)>,
    },
    Box {
        groups: Vec<(String, Vec<f64>)>,
        value_label: String,
    },
    Heatmap {
        names: Vec<String>,
        matrix: Vec<Vec<f64>>,
    },
}

pub fn extract(kind: ChartKind, binding: &RoleBinding, table: &Table) -> RenderResult<ChartData> {
    match kind {
        ChartKind::Bar => extract_bar(binding, table),
        ChartKind::Line => extract_line(binding, table),
        ChartKind::Scatter => extract_scatter(binding, table),
        ChartKind::Histogram => extract_histogram(binding, table),
        ChartKind::Pie => extract_pie(binding, table),
        ChartKind::Box => extract_box(binding, table),
        ChartKind::Heatmap => extract_heatmap(table),
    }
}

fn failed(reason: impl std::fmt::Display) -> RenderError {
    RenderError::Failed {
        reason: reason.to_string(),
    }
}

fn series_for<'a>(table: &'a Table, name: &str) -> RenderResult<&'a Series> {
    table
        .frame
        .column(name)
        .map_err(failed)?
        .as_series()
        .ok_or_else(|| failed(format!("column '{name}' is not a plain series")))
}

fn numeric_values(table: &Table, name: &str) -> RenderResult<Vec<Option<f64>>> {
    let series = series_for(table, name)?;
    let cast = series.cast(&DataType::Float64).map_err(failed)?;
    let floats = cast.f64().map_err(failed)?;
    Ok(floats.into_iter().collect())
}

fn string_values(table: &Table, name: &str) -> RenderResult<Vec<Option<String>>> {
    let series = series_for(table, name)?;
    let cast = series.cast(&DataType::String).map_err(failed)?;
    let strings = cast.str().map_err(failed)?;
    Ok(strings
        .into_iter()
        .map(|value| value.map(String::from))
        .collect())
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}

fn bound_target<'a>(binding: &'a RoleBinding, role: Role) -> RenderResult<&'a BindTarget> {
    binding
        .get(role)
        .ok_or_else(|| failed(format!("role '{role}' is unbound")))
}

fn row_labels(rows: usize) -> Vec<Option<String>> {
    (1..=rows).map(|i| Some(i.to_string())).collect()
}

/// Group a measure by category, averaging values the way the original bar
/// path does; rows with a null on either side are dropped. Categories keep
/// first-appearance order.
fn mean_by_category(
    categories: &[Option<String>],
    values: &[Option<f64>],
) -> (Vec<String>, Vec<f64>) {
    let mut order: Vec<String> = Vec::new();
    let mut sums: HashMap<String, (f64, usize)> = HashMap::new();
    for (category, value) in categories.iter().zip(values) {
        if let (Some(category), Some(value)) = (category, value) {
            let entry = sums.entry(category.clone()).or_insert_with(|| {
                order.push(category.clone());
                (0.0, 0)
            });
            entry.0 += value;
            entry.1 += 1;
        }
    }
    let means = order
        .iter()
        .map(|category| {
            let (sum, count) = sums[category];
            sum / count as f64
        })
        .collect();
    (order, means)
}

fn count_by_category(categories: &[Option<String>]) -> (Vec<String>, Vec<f64>) {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for category in categories.iter().flatten() {
        let entry = counts.entry(category.clone()).or_insert_with(|| {
            order.push(category.clone());
            0
        });
        *entry += 1;
    }
    let values = order.iter().map(|c| counts[c] as f64).collect();
    (order, values)
}

fn sum_by_category(
    categories: &[Option<String>],
    values: &[Option<f64>],
) -> (Vec<String>, Vec<f64>) {
    let mut order: Vec<String> = Vec::new();
    let mut sums: HashMap<String, f64> = HashMap::new();
    for (category, value) in categories.iter().zip(values) {
        if let (Some(category), Some(value)) = (category, value) {
            let entry = sums.entry(category.clone()).or_insert_with(|| {
                order.push(category.clone());
                0.0
            });
            *entry += value;
        }
    }
    let totals = order.iter().map(|c| sums[c]).collect();
    (order, totals)
}

fn extract_bar(binding: &RoleBinding, table: &Table) -> RenderResult<ChartData> {
    let category_target = bound_target(binding, Role::Category)?;
    let value_target = bound_target(binding, Role::Value)?;
    let categories = match category_target {
        BindTarget::Column(name) => string_values(table, name)?,
        _ => row_labels(table.rows()),
    };
    let (categories, values, value_label) = match value_target {
        BindTarget::Column(name) => {
            let values = numeric_values(table, name)?;
            if matches!(category_target, BindTarget::Column(_)) {
                let (cats, means) = mean_by_category(&categories, &values);
                (cats, means, format!("mean {name}"))
            } else {
                let mut cats = Vec::new();
                let mut vals = Vec::new();
                for (label, value) in categories.iter().zip(&values) {
                    if let (Some(label), Some(value)) = (label, value) {
                        cats.push(label.clone());
                        vals.push(*value);
                    }
                }
                (cats, vals, name.clone())
            }
        }
        BindTarget::RowCount => {
            let (cats, counts) = count_by_category(&categories);
            (cats, counts, "rows".to_string())
        }
        BindTarget::RowIndex => {
            return Err(failed("row index is not a bar measure"));
        }
    };
    if categories.is_empty() {
        return Err(failed("no joint non-null category/value pairs to draw"));
    }
    Ok(ChartData::Bar {
        categories,
        values,
        category_label: category_target.to_string(),
        value_label,
    })
}

fn extract_line(binding: &RoleBinding, table: &Table) -> RenderResult<ChartData> {
    let x_target = bound_target(binding, Role::X)?;
    let y_name = binding
        .column(Role::Y)
        .ok_or_else(|| failed("line y role must be a column"))?;
    let ys = numeric_values(table, y_name)?;
    let (points, x_ticks, x_label) = match x_target {
        BindTarget::Column(name) => {
            let dtype = series_for(table, name)?.dtype().clone();
            if is_numeric_dtype(&dtype) {
                let xs = numeric_values(table, name)?;
                let mut points: Vec<(f64, f64)> = xs
                    .iter()
                    .zip(&ys)
                    .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
                    .collect();
                points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
                (points, None, name.clone())
            } else {
                let labels = string_values(table, name)?;
                let mut points = Vec::new();
                let mut ticks = Vec::new();
                for (label, y) in labels.iter().zip(&ys) {
                    if let (Some(label), Some(y)) = (label, y) {
                        points.push((ticks.len() as f64, *y));
                        ticks.push(label.clone());
                    }
                }
                (points, Some(ticks), name.clone())
            }
        }
        _ => {
            let points = ys
                .iter()
                .enumerate()
                .filter_map(|(i, y)| Some((i as f64 + 1.0, (*y)?)))
                .collect();
            (points, None, "row".to_string())
        }
    };
    if points.is_empty() {
        return Err(failed("no non-null points to draw"));
    }
    Ok(ChartData::Line {
        points,
        x_ticks,
        x_label,
        y_label: y_name.to_string(),
    })
}

fn extract_scatter(binding: &RoleBinding, table: &Table) -> RenderResult<ChartData> {
    let x_name = binding
        .column(Role::X)
        .ok_or_else(|| failed("scatter x role must be a column"))?;
    let y_name = binding
        .column(Role::Y)
        .ok_or_else(|| failed("scatter y role must be a column"))?;
    let xs = numeric_values(table, x_name)?;
    let ys = numeric_values(table, y_name)?;
    let colour = binding.column(Role::Colour);
    let groups = match colour {
        Some(colour_name) => {
            let labels = string_values(table, colour_name)?;
            let mut order: Vec<String> = Vec::new();
            let mut grouped: HashMap<String, Vec<(f64, f64)>> = HashMap::new();
            for ((x, y), label) in xs.iter().zip(&ys).zip(&labels) {
                if let (Some(x), Some(y)) = (x, y) {
                    let key = label.clone().unwrap_or_else(|| "(none)".to_string());
                    grouped
                        .entry(key.clone())
                        .or_insert_with(|| {
                            order.push(key.clone());
                            Vec::new()
                        })
                        .push((*x, *y));
                }
            }
            order
                .into_iter()
                .map(|key| {
                    let points = grouped.remove(&key).unwrap_or_default();
                    (key, points)
                })
                .collect()
        }
        None => {
            let points: Vec<(f64, f64)> = xs
                .iter()
                .zip(&ys)
                .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
                .collect();
            vec![(String::new(), points)]
        }
    };
    if groups.iter().all(|(_, points)| points.is_empty()) {
        return Err(failed("no non-null points to draw"));
    }
    Ok(ChartData::Scatter {
        groups,
        x_label: x_name.to_string(),
        y_label: y_name.to_string(),
    })
}

fn extract_histogram(binding: &RoleBinding, table: &Table) -> RenderResult<ChartData> {
    let name = binding
        .column(Role::Value)
        .ok_or_else(|| failed("histogram value role must be a column"))?;
    let values: Vec<f64> = numeric_values(table, name)?.into_iter().flatten().collect();
    if values.is_empty() {
        return Err(failed("no non-null values to draw"));
    }
    Ok(ChartData::Histogram {
        values,
        label: name.to_string(),
    })
}

fn extract_pie(binding: &RoleBinding, table: &Table) -> RenderResult<ChartData> {
    let category_name = binding
        .column(Role::Category)
        .ok_or_else(|| failed("pie category role must be a column"))?;
    let categories = string_values(table, category_name)?;
    let (labels, sizes) = match bound_target(binding, Role::Value)? {
        BindTarget::Column(name) => {
            let values = numeric_values(table, name)?;
            sum_by_category(&categories, &values)
        }
        _ => count_by_category(&categories),
    };
    let slices: Vec<(String, f64)> = labels
        .into_iter()
        .zip(sizes)
        .filter(|(_, size)| *size > 0.0)
        .collect();
    if slices.is_empty() {
        return Err(failed("no positive slices to draw"));
    }
    Ok(ChartData::Pie { slices })
}

fn extract_box(binding: &RoleBinding, table: &Table) -> RenderResult<ChartData> {
    let value_name = binding
        .column(Role::Value)
        .ok_or_else(|| failed("box value role must be a column"))?;
    let values = numeric_values(table, value_name)?;
    let groups = match binding.column(Role::Category) {
        Some(category_name) => {
            let categories = string_values(table, category_name)?;
            let mut order: Vec<String> = Vec::new();
            let mut grouped: HashMap<String, Vec<f64>> = HashMap::new();
            for (category, value) in categories.iter().zip(&values) {
                if let (Some(category), Some(value)) = (category, value) {
                    grouped
                        .entry(category.clone())
                        .or_insert_with(|| {
                            order.push(category.clone());
                            Vec::new()
                        })
                        .push(*value);
                }
            }
            order
                .into_iter()
                .map(|key| {
                    let bucket = grouped.remove(&key).unwrap_or_default();
                    (key, bucket)
                })
                .collect()
        }
        None => vec![(
            value_name.to_string(),
            values.into_iter().flatten().collect(),
        )],
    };
    let groups: Vec<(String, Vec<f64>)> = groups
        .into_iter()
        .filter(|(_, bucket)| !bucket.is_empty())
        .collect();
    if groups.is_empty() {
        return Err(failed("no non-null values to draw"));
    }
    Ok(ChartData::Box {
        groups,
        value_label: value_name.to_string(),
    })
}

/// Correlation matrix over every numeric column, the way the original
/// service draws its heatmap.
fn extract_heatmap(table: &Table) -> RenderResult<ChartData> {
    let mut names = Vec::new();
    let mut columns: Vec<Vec<Option<f64>>> = Vec::new();
    for column in table.frame.get_columns() {
        if is_numeric_dtype(column.dtype()) {
            let name = column.name().to_string();
            columns.push(numeric_values(table, &name)?);
            names.push(name);
        }
    }
    if names.len() < 2 {
        return Err(failed("heatmap needs at least two numeric columns"));
    }
    let matrix = names
        .iter()
        .enumerate()
        .map(|(i, _)| {
            names
                .iter()
                .enumerate()
                .map(|(j, _)| pearson(&columns[i], &columns[j]))
                .collect()
        })
        .collect();
    Ok(ChartData::Heatmap { names, matrix })
}

fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return 0.0;
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
    let denominator = (var_x * var_y).sqrt();
    if denominator < f64::EPSILON {
        0.0
    } else {
        cov / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vizier::{bind_roles, ChartEngine, IntentConfig};

    fn table_and_binding(csv: &str, kind: ChartKind) -> (Table, RoleBinding) {
        let engine = ChartEngine::new();
        let (table, profiles) = engine.profile(csv.as_bytes(), "test.csv").expect("profile");
        let binding =
            bind_roles(kind, &profiles, &[], &IntentConfig::default()).expect("bind");
        (table, binding)
    }

    #[test]
    fn bar_data_averages_per_category() {
        let (table, binding) =
            table_and_binding("region,sales\nA,10\nB,20\nA,30\n", ChartKind::Bar);
        match extract(ChartKind::Bar, &binding, &table).expect("extract") {
            ChartData::Bar {
                categories, values, ..
            } => {
                assert_eq!(categories, vec!["A".to_string(), "B".to_string()]);
                assert_eq!(values, vec![20.0, 20.0]);
            }
            other => panic!("unexpected data: {other:?}"),
        }
    }

    #[test]
    fn pie_without_numeric_counts_rows() {
        let (table, binding) =
            table_and_binding("segment\nx\ny\nx\nx\n", ChartKind::Pie);
        match extract(ChartKind::Pie, &binding, &table).expect("extract") {
            ChartData::Pie { slices } => {
                assert_eq!(
                    slices,
                    vec![("x".to_string(), 3.0), ("y".to_string(), 1.0)]
                );
            }
            other => panic!("unexpected data: {other:?}"),
        }
    }

    #[test]
    fn heatmap_matrix_is_symmetric_with_unit_diagonal() {
        let (table, binding) = table_and_binding(
            "a,b,c\n1,2,9\n2,4,7\n3,6,5\n4,8,3\n",
            ChartKind::Heatmap,
        );
        match extract(ChartKind::Heatmap, &binding, &table).expect("extract") {
            ChartData::Heatmap { names, matrix } => {
                assert_eq!(names.len(), 3);
                for i in 0..3 {
                    assert!((matrix[i][i] - 1.0).abs() < 1e-9);
                    for j in 0..3 {
                        assert!((matrix[i][j] - matrix[j][i]).abs() < 1e-9);
                    }
                }
                // a and b move together, a and c move against each other.
                assert!(matrix[0][1] > 0.99);
                assert!(matrix[0][2] < -0.99);
            }
            other => panic!("unexpected data: {other:?}"),
        }
    }
}
