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

//! Synchronous plotters drawing. Runs inside `spawn_blocking`; everything
//! here is plain values in, PNG bytes out.

use crate::data::ChartData;
use plotters::prelude::*;
use vizier::error::{RenderError, RenderResult};
use vizier::ImageHandle;

const PALETTE: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

fn palette(index: usize) -> RGBColor {
    PALETTE[index % PALETTE.len()]
}

fn failed(reason: impl std::fmt::Display) -> RenderError {
    RenderError::Failed {
        reason: reason.to_string(),
    }
}

/// Draw the chart into a temporary PNG and hand back the encoded image.
pub fn draw(data: ChartData, width: u32, height: u32) -> RenderResult<ImageHandle> {
    let file = tempfile::Builder::new()
        .prefix("vizier-chart-")
        .suffix(".png")
        .tempfile()
        .map_err(failed)?;
    let path = file.path().to_path_buf();
    {
        let root = BitMapBackend::new(&path, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(failed)?;
        match data {
            ChartData::Bar {
                categories,
                values,
                category_label,
                value_label,
            } => draw_bar(&root, &categories, &values, &category_label, &value_label)?,
            ChartData::Line {
                points,
                x_ticks,
                x_label,
                y_label,
            } => draw_line(&root, &points, x_ticks.as_deref(), &x_label, &y_label)?,
            ChartData::Scatter {
                groups,
                x_label,
                y_label,
            } => draw_scatter(&root, &groups, &x_label, &y_label)?,
            ChartData::Histogram { values, label } => draw_histogram(&root, &values, &label)?,
            ChartData::Pie { slices } => draw_pie(&root, &slices, width, height)?,
            ChartData::Box {
                groups,
                value_label,
            } => draw_box(&root, &groups, &value_label)?,
            ChartData::Heatmap { names, matrix } => draw_heatmap(&root, &names, &matrix)?,
        }
        root.present().map_err(failed)?;
    }
    let bytes = std::fs::read(&path).map_err(failed)?;
    Ok(ImageHandle::from_png_bytes(&bytes, width, height))
}

type Area<'a> = DrawingArea<BitMapBackend<'a>, plotters::coord::Shift>;

fn value_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for value in values {
        min = min.min(value);
        max = max.max(value);
    }
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if (max - min).abs() < f64::EPSILON {
        return (min - 1.0, max + 1.0);
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}

fn draw_bar(
    root: &Area<'_>,
    categories: &[String],
    values: &[f64],
    category_label: &str,
    value_label: &str,
) -> RenderResult<()> {
    let n = categories.len();
    let y_top = values.iter().cloned().fold(0.0f64, f64::max);
    let y_bottom = values.iter().cloned().fold(0.0f64, f64::min);
    let y_top = if y_top <= y_bottom { y_bottom + 1.0 } else { y_top * 1.1 };
    let mut chart = ChartBuilder::on(root)
        .caption(
            format!("{value_label} by {category_label}"),
            ("sans-serif", 28),
        )
        .margin(24)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), y_bottom..y_top)
        .map_err(failed)?;
    let labels = categories.to_vec();
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(category_label)
        .y_desc(value_label)
        .x_labels(n.min(12))
        .x_label_formatter(&move |x| {
            let index = x.round();
            if (x - index).abs() < 1e-6 && index >= 0.0 && (index as usize) < labels.len() {
                labels[index as usize].clone()
            } else {
                String::new()
            }
        })
        .draw()
        .map_err(failed)?;
    chart
        .draw_series(values.iter().enumerate().map(|(i, value)| {
            Rectangle::new(
                [(i as f64 - 0.4, 0.0), (i as f64 + 0.4, *value)],
                palette(0).mix(0.85).filled(),
            )
        }))
        .map_err(failed)?;
    Ok(())
}

fn draw_line(
    root: &Area<'_>,
    points: &[(f64, f64)],
    x_ticks: Option<&[String]>,
    x_label: &str,
    y_label: &str,
) -> RenderResult<()> {
    let (x_min, x_max) = value_bounds(points.iter().map(|(x, _)| *x));
    let (y_min, y_max) = value_bounds(points.iter().map(|(_, y)| *y));
    let mut chart = ChartBuilder::on(root)
        .caption(format!("{y_label} over {x_label}"), ("sans-serif", 28))
        .margin(24)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(failed)?;
    let ticks: Option<Vec<String>> = x_ticks.map(<[String]>::to_vec);
    let mut mesh = chart.configure_mesh();
    mesh.x_desc(x_label).y_desc(y_label);
    if let Some(labels) = ticks {
        mesh.x_labels(labels.len().min(10))
            .x_label_formatter(&move |x| {
                let index = x.round();
                if (x - index).abs() < 1e-6 && index >= 0.0 && (index as usize) < labels.len() {
                    labels[index as usize].clone()
                } else {
                    String::new()
                }
            })
            .draw()
            .map_err(failed)?;
    } else {
        mesh.draw().map_err(failed)?;
    }
    chart
        .draw_series(LineSeries::new(points.iter().copied(), &palette(0)))
        .map_err(failed)?;
    chart
        .draw_series(
            points
                .iter()
                .map(|point| Circle::new(*point, 3, palette(0).filled())),
        )
        .map_err(failed)?;
    Ok(())
}

fn draw_scatter(
    root: &Area<'_>,
    groups: &[(String, Vec<(f64, f64)>)],
    x_label: &str,
    y_label: &str,
) -> RenderResult<()> {
    let all = groups.iter().flat_map(|(_, points)| points.iter());
    let (x_min, x_max) = value_bounds(all.clone().map(|(x, _)| *x));
    let (y_min, y_max) = value_bounds(all.map(|(_, y)| *y));
    let mut chart = ChartBuilder::on(root)
        .caption(format!("{y_label} vs {x_label}"), ("sans-serif", 28))
        .margin(24)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(failed)?;
    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .draw()
        .map_err(failed)?;
    let labelled = groups.len() > 1;
    for (index, (name, points)) in groups.iter().enumerate() {
        let colour = palette(index);
        let series = chart
            .draw_series(
                points
                    .iter()
                    .map(|point| Circle::new(*point, 4, colour.mix(0.7).filled())),
            )
            .map_err(failed)?;
        if labelled {
            series
                .label(name.clone())
                .legend(move |(x, y)| Circle::new((x, y), 4, colour.filled()));
        }
    }
    if labelled {
        chart
            .configure_series_labels()
            .border_style(BLACK.mix(0.4))
            .background_style(WHITE.mix(0.8))
            .draw()
            .map_err(failed)?;
    }
    Ok(())
}

fn draw_histogram(root: &Area<'_>, values: &[f64], label: &str) -> RenderResult<()> {
    let (min, max) = value_bounds(values.iter().copied());
    let bins = 20usize.min(values.len().max(1));
    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for value in values {
        let mut index = ((value - min) / width) as usize;
        if index >= bins {
            index = bins - 1;
        }
        counts[index] += 1;
    }
    let y_max = counts.iter().copied().max().unwrap_or(1) as f64 * 1.1;
    let mut chart = ChartBuilder::on(root)
        .caption(format!("{label} distribution"), ("sans-serif", 28))
        .margin(24)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(min..max, 0.0..y_max)
        .map_err(failed)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(label)
        .y_desc("frequency")
        .draw()
        .map_err(failed)?;
    chart
        .draw_series(counts.iter().enumerate().map(|(i, count)| {
            let x0 = min + width * i as f64;
            let x1 = x0 + width;
            Rectangle::new(
                [(x0, 0.0), (x1, *count as f64)],
                palette(0).mix(0.75).filled(),
            )
        }))
        .map_err(failed)?;
    Ok(())
}

fn draw_pie(
    root: &Area<'_>,
    slices: &[(String, f64)],
    width: u32,
    height: u32,
) -> RenderResult<()> {
    let labels: Vec<String> = slices
        .iter()
        .map(|(label, size)| format!("{label} ({size})"))
        .collect();
    let sizes: Vec<f64> = slices.iter().map(|(_, size)| *size).collect();
    let colours: Vec<RGBColor> = (0..slices.len()).map(palette).collect();
    let centre = (width as i32 / 2, height as i32 / 2);
    let radius = f64::from(width.min(height)) * 0.32;
    let mut pie = Pie::new(&centre, &radius, &sizes, &colours, &labels);
    pie.label_style(("sans-serif", 18).into_font());
    root.draw(&pie).map_err(failed)?;
    Ok(())
}

fn draw_box(
    root: &Area<'_>,
    groups: &[(String, Vec<f64>)],
    value_label: &str,
) -> RenderResult<()> {
    let n = groups.len();
    let (y_min, y_max) = value_bounds(groups.iter().flat_map(|(_, v)| v.iter().copied()));
    // Quartiles yields f32 values, so the y-axis is f32 as well.
    let mut chart = ChartBuilder::on(root)
        .caption(format!("{value_label} by group"), ("sans-serif", 28))
        .margin(24)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), (y_min as f32)..(y_max as f32))
        .map_err(failed)?;
    let labels: Vec<String> = groups.iter().map(|(label, _)| label.clone()).collect();
    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc(value_label)
        .x_labels(n.min(12))
        .x_label_formatter(&move |x| {
            let index = x.round();
            if (x - index).abs() < 1e-6 && index >= 0.0 && (index as usize) < labels.len() {
                labels[index as usize].clone()
            } else {
                String::new()
            }
        })
        .draw()
        .map_err(failed)?;
    chart
        .draw_series(groups.iter().enumerate().map(|(i, (_, values))| {
            let floats: Vec<f32> = values.iter().map(|v| *v as f32).collect();
            let quartiles = Quartiles::new(&floats);
            Boxplot::new_vertical(i as f64, &quartiles).width(24)
        }))
        .map_err(failed)?;
    Ok(())
}

fn correlation_colour(value: f64) -> RGBColor {
    let t = value.clamp(-1.0, 1.0);
    let blend = |from: u8, to: u8, amount: f64| -> u8 {
        (f64::from(from) + (f64::from(to) - f64::from(from)) * amount).round() as u8
    };
    if t >= 0.0 {
        RGBColor(
            blend(255, 180, t),
            blend(255, 4, t),
            blend(255, 38, t),
        )
    } else {
        RGBColor(
            blend(255, 59, -t),
            blend(255, 76, -t),
            blend(255, 192, -t),
        )
    }
}

fn draw_heatmap(root: &Area<'_>, names: &[String], matrix: &[Vec<f64>]) -> RenderResult<()> {
    let n = names.len();
    let mut chart = ChartBuilder::on(root)
        .caption("correlation matrix", ("sans-serif", 28))
        .margin(24)
        .x_label_area_size(80)
        .y_label_area_size(100)
        .build_cartesian_2d(0f64..n as f64, 0f64..n as f64)
        .map_err(failed)?;
    let x_names = names.to_vec();
    let y_names = names.to_vec();
    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_labels(n)
        .y_labels(n)
        .x_label_formatter(&move |x| cell_label(*x, &x_names))
        .y_label_formatter(&move |y| cell_label(*y, &y_names))
        .draw()
        .map_err(failed)?;
    chart
        .draw_series((0..n).flat_map(|i| {
            let row = &matrix[i];
            (0..n).map(move |j| {
                Rectangle::new(
                    [(j as f64, i as f64), (j as f64 + 1.0, i as f64 + 1.0)],
                    correlation_colour(row[j]).filled(),
                )
            })
        }))
        .map_err(failed)?;
    Ok(())
}

/// Label a unit-cell axis position with the name of the cell it starts.
fn cell_label(position: f64, names: &[String]) -> String {
    let index = position.floor();
    if (position - index - 0.5).abs() < 0.5 && index >= 0.0 && (index as usize) < names.len() {
        names[index as usize].clone()
    } else {
        String::new()
    }
}
