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

use crate::config::IntentConfig;
use crate::profiler::{ColumnProfile, SemanticType};
use serde::{Deserialize, Serialize};

/// The fixed set of supported chart variants.
///
/// Order matters: it is the deterministic tie-break used when two families
/// score equally during intent resolution. Histogram precedes Pie so that an
/// ambiguous "distribution" request resolves to a histogram whenever a
/// numeric column exists, and falls through to pie only when it does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
    Histogram,
    Pie,
    Box,
    Heatmap,
}

/// Visual roles a column (or aggregation) can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Category,
    Value,
    X,
    Y,
    Colour,
    Facet,
}

impl ChartKind {
    pub const ALL: [ChartKind; 7] = [
        ChartKind::Bar,
        ChartKind::Line,
        ChartKind::Scatter,
        ChartKind::Histogram,
        ChartKind::Pie,
        ChartKind::Box,
        ChartKind::Heatmap,
    ];

    pub fn required_roles(&self) -> &'static [Role] {
        match self {
            ChartKind::Bar | ChartKind::Pie => &[Role::Category, Role::Value],
            ChartKind::Line | ChartKind::Scatter | ChartKind::Heatmap => &[Role::X, Role::Y],
            ChartKind::Histogram | ChartKind::Box => &[Role::Value],
        }
    }

    pub fn optional_roles(&self) -> &'static [Role] {
        match self {
            ChartKind::Bar | ChartKind::Line => &[Role::Colour],
            ChartKind::Scatter => &[Role::Colour, Role::Facet],
            ChartKind::Box => &[Role::Category],
            ChartKind::Pie | ChartKind::Histogram | ChartKind::Heatmap => &[],
        }
    }

    /// Whether a column of the given semantic type can fill `role` on this
    /// chart. Aggregation fallbacks (row count, row index) are the binder's
    /// business, not part of type compatibility.
    pub fn role_accepts(&self, role: Role, semantic_type: SemanticType) -> bool {
        match (self, role) {
            (ChartKind::Bar | ChartKind::Pie, Role::Category) => matches!(
                semantic_type,
                SemanticType::Categorical | SemanticType::Boolean | SemanticType::Temporal
            ),
            (ChartKind::Bar | ChartKind::Pie, Role::Value) => {
                matches!(semantic_type, SemanticType::Numeric)
            }
            (ChartKind::Line, Role::X) => matches!(
                semantic_type,
                SemanticType::Temporal | SemanticType::Numeric | SemanticType::Categorical
            ),
            (ChartKind::Line, Role::Y) => matches!(semantic_type, SemanticType::Numeric),
            (ChartKind::Scatter | ChartKind::Heatmap, Role::X | Role::Y) => {
                matches!(semantic_type, SemanticType::Numeric)
            }
            (ChartKind::Histogram | ChartKind::Box, Role::Value) => {
                matches!(semantic_type, SemanticType::Numeric)
            }
            (ChartKind::Box, Role::Category) => matches!(
                semantic_type,
                SemanticType::Categorical | SemanticType::Boolean
            ),
            (_, Role::Colour) => matches!(
                semantic_type,
                SemanticType::Categorical | SemanticType::Boolean
            ),
            (_, Role::Facet) => matches!(semantic_type, SemanticType::Categorical),
            _ => false,
        }
    }

    /// Whether the profiled dataset can satisfy every required role of this
    /// family, counting the binder's aggregation fallbacks.
    pub fn is_feasible(&self, profiles: &[ColumnProfile], config: &IntentConfig) -> bool {
        let numeric = profiles
            .iter()
            .filter(|p| p.semantic_type == SemanticType::Numeric)
            .count();
        let discrete = profiles.iter().any(|p| {
            matches!(
                p.semantic_type,
                SemanticType::Categorical | SemanticType::Boolean
            ) && p.distinct_count >= 2
        });
        match self {
            // Bar degrades to row-index categories or row counts, so either
            // a measure or a grouping column is enough.
            ChartKind::Bar => numeric >= 1 || discrete,
            // Line falls back to row index on the x-axis.
            ChartKind::Line => numeric >= 1,
            ChartKind::Scatter | ChartKind::Heatmap => numeric >= 2,
            ChartKind::Histogram | ChartKind::Box => numeric >= 1,
            ChartKind::Pie => profiles.iter().any(|p| {
                matches!(
                    p.semantic_type,
                    SemanticType::Categorical | SemanticType::Boolean
                ) && (2..=config.pie_max_cardinality).contains(&p.distinct_count)
            }),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Scatter => "scatter",
            ChartKind::Histogram => "histogram",
            ChartKind::Pie => "pie",
            ChartKind::Box => "box",
            ChartKind::Heatmap => "heatmap",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar chart",
            ChartKind::Line => "line chart",
            ChartKind::Scatter => "scatter plot",
            ChartKind::Histogram => "histogram",
            ChartKind::Pie => "pie chart",
            ChartKind::Box => "box plot",
            ChartKind::Heatmap => "heatmap",
        }
    }

    /// Loose parse for labels coming back from the external classifier,
    /// e.g. "line_chart", "a Line chart", "scatter plot".
    pub fn from_label(label: &str) -> Option<ChartKind> {
        let lower = label.to_lowercase();
        ChartKind::ALL
            .into_iter()
            .find(|kind| lower.contains(kind.label()))
    }
}

impl std::fmt::Display for ChartKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Category => "category",
            Role::Value => "value",
            Role::X => "x",
            Role::Y => "y",
            Role::Colour => "colour",
            Role::Facet => "facet",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
