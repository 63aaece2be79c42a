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

use crate::chart::{ChartKind, Role};
use crate::config::IntentConfig;
use crate::error::{BindError, BindResult};
use crate::profiler::{ColumnProfile, SemanticType};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::cmp::Ordering;
use tracing::debug;

/// What a visual role is bound to: a real column or one of the two
/// aggregation fallbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindTarget {
    Column(String),
    /// Count of rows per category, the "count of rows" literal measure.
    RowCount,
    /// The 1-based source row number, used when no grouping column exists.
    RowIndex,
}

impl BindTarget {
    pub fn column_name(&self) -> Option<&str> {
        match self {
            BindTarget::Column(name) => Some(name),
            _ => None,
        }
    }
}

impl std::fmt::Display for BindTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindTarget::Column(name) => f.write_str(name),
            BindTarget::RowCount => f.write_str("count(*)"),
            BindTarget::RowIndex => f.write_str("row()"),
        }
    }
}

impl Serialize for BindTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Assignment of table columns (or aggregations) to a chart's visual roles.
/// Ordered map so iteration and serialisation are deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(transparent)]
pub struct RoleBinding(pub BTreeMap<Role, BindTarget>);

impl RoleBinding {
    pub fn get(&self, role: Role) -> Option<&BindTarget> {
        self.0.get(&role)
    }

    pub fn column(&self, role: Role) -> Option<&str> {
        self.get(role).and_then(BindTarget::column_name)
    }

    pub fn columns_used(&self) -> Vec<String> {
        self.0
            .values()
            .filter_map(|target| target.column_name().map(String::from))
            .collect()
    }

    fn insert(&mut self, role: Role, target: BindTarget) {
        self.0.insert(role, target);
    }
}

/// Select the best-fit column per role of the chosen chart.
///
/// Precedence per role: a type-compatible column named in the query, then the
/// profile-driven best fit, then (where the chart allows it) an aggregation
/// fallback. Selection never depends on unordered iteration; ties always
/// break on the source column index.
pub fn bind_roles(
    kind: ChartKind,
    profiles: &[ColumnProfile],
    hints: &[String],
    config: &IntentConfig,
) -> BindResult<RoleBinding> {
    let mut binding = RoleBinding::default();
    let mut used: HashSet<String> = HashSet::new();
    match kind {
        ChartKind::Bar => bind_bar(kind, profiles, hints, config, &mut binding, &mut used)?,
        ChartKind::Pie => bind_pie(kind, profiles, hints, config, &mut binding, &mut used)?,
        ChartKind::Line => bind_line(kind, profiles, hints, config, &mut binding, &mut used)?,
        ChartKind::Scatter | ChartKind::Heatmap => {
            bind_numeric_pair(kind, profiles, hints, config, &mut binding, &mut used)?
        }
        ChartKind::Histogram => bind_measure(kind, profiles, hints, &mut binding, &mut used)?,
        ChartKind::Box => {
            bind_measure(kind, profiles, hints, &mut binding, &mut used)?;
            if let Some(category) = best_category(profiles, &used, Some(config.pie_max_cardinality))
            {
                binding.insert(Role::Category, BindTarget::Column(category.name.clone()));
            }
        }
    }
    for role in kind.required_roles() {
        if binding.get(*role).is_none() {
            return Err(BindError::UnbindableRole { kind, role: *role });
        }
    }
    debug!(%kind, ?binding, "roles bound");
    Ok(binding)
}

fn bind_bar(
    kind: ChartKind,
    profiles: &[ColumnProfile],
    hints: &[String],
    config: &IntentConfig,
    binding: &mut RoleBinding,
    used: &mut HashSet<String>,
) -> BindResult<()> {
    let category = hinted(kind, Role::Category, profiles, hints, used)
        .or_else(|| best_category(profiles, used, None))
        .or_else(|| first_of_type(profiles, used, SemanticType::Temporal));
    let category_target = match category {
        Some(profile) => {
            used.insert(profile.name.clone());
            BindTarget::Column(profile.name.clone())
        }
        None => BindTarget::RowIndex,
    };
    let value = hinted(kind, Role::Value, profiles, hints, used)
        .or_else(|| widest_range_numeric(profiles, used));
    let value_target = match value {
        Some(profile) => {
            used.insert(profile.name.clone());
            BindTarget::Column(profile.name.clone())
        }
        None if matches!(category_target, BindTarget::Column(_)) => BindTarget::RowCount,
        None => return Err(BindError::UnbindableRole { kind, role: Role::Value }),
    };
    binding.insert(Role::Category, category_target);
    binding.insert(Role::Value, value_target);
    if let Some(colour) = best_category(profiles, used, Some(config.colour_max_cardinality)) {
        binding.insert(Role::Colour, BindTarget::Column(colour.name.clone()));
    }
    Ok(())
}

fn bind_pie(
    kind: ChartKind,
    profiles: &[ColumnProfile],
    hints: &[String],
    config: &IntentConfig,
    binding: &mut RoleBinding,
    used: &mut HashSet<String>,
) -> BindResult<()> {
    let category = hinted(kind, Role::Category, profiles, hints, used)
        .filter(|p| p.distinct_count <= config.pie_max_cardinality)
        .or_else(|| best_category(profiles, used, Some(config.pie_max_cardinality)))
        .ok_or(BindError::UnbindableRole { kind, role: Role::Category })?;
    used.insert(category.name.clone());
    binding.insert(Role::Category, BindTarget::Column(category.name.clone()));
    let value = hinted(kind, Role::Value, profiles, hints, used)
        .or_else(|| widest_range_numeric(profiles, used));
    let value_target = match value {
        Some(profile) => {
            used.insert(profile.name.clone());
            BindTarget::Column(profile.name.clone())
        }
        None => BindTarget::RowCount,
    };
    binding.insert(Role::Value, value_target);
    Ok(())
}

fn bind_line(
    kind: ChartKind,
    profiles: &[ColumnProfile],
    hints: &[String],
    config: &IntentConfig,
    binding: &mut RoleBinding,
    used: &mut HashSet<String>,
) -> BindResult<()> {
    // The measure claims its hint first: "visits over time" means visits on
    // the y-axis, not the x-axis.
    let y = hinted(kind, Role::Y, profiles, hints, used)
        .or_else(|| widest_range_numeric(profiles, used))
        .ok_or(BindError::UnbindableRole { kind, role: Role::Y })?;
    used.insert(y.name.clone());
    let x = hinted(kind, Role::X, profiles, hints, used)
        .or_else(|| first_of_type(profiles, used, SemanticType::Temporal))
        .or_else(|| first_of_type(profiles, used, SemanticType::Numeric));
    let x_target = match x {
        Some(profile) => {
            used.insert(profile.name.clone());
            BindTarget::Column(profile.name.clone())
        }
        None => BindTarget::RowIndex,
    };
    binding.insert(Role::X, x_target);
    binding.insert(Role::Y, BindTarget::Column(y.name.clone()));
    if let Some(colour) = best_category(profiles, used, Some(config.colour_max_cardinality)) {
        binding.insert(Role::Colour, BindTarget::Column(colour.name.clone()));
    }
    Ok(())
}

fn bind_numeric_pair(
    kind: ChartKind,
    profiles: &[ColumnProfile],
    hints: &[String],
    config: &IntentConfig,
    binding: &mut RoleBinding,
    used: &mut HashSet<String>,
) -> BindResult<()> {
    let hinted_numerics: Vec<&ColumnProfile> = hints
        .iter()
        .filter_map(|hint| {
            profiles
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(hint) && p.semantic_type == SemanticType::Numeric)
        })
        .collect();
    let (x, y) = if hinted_numerics.len() >= 2 {
        (hinted_numerics[0], hinted_numerics[1])
    } else {
        let ranked = numerics_by_variance(profiles, used);
        if ranked.len() < 2 {
            return Err(BindError::UnbindableRole { kind, role: Role::Y });
        }
        // Deterministic axis order: the earlier source column takes x.
        let (a, b) = (ranked[0], ranked[1]);
        if a.index <= b.index {
            (a, b)
        } else {
            (b, a)
        }
    };
    used.insert(x.name.clone());
    used.insert(y.name.clone());
    binding.insert(Role::X, BindTarget::Column(x.name.clone()));
    binding.insert(Role::Y, BindTarget::Column(y.name.clone()));
    if kind == ChartKind::Scatter {
        if let Some(colour) = best_category(profiles, used, Some(config.colour_max_cardinality)) {
            binding.insert(Role::Colour, BindTarget::Column(colour.name.clone()));
        }
    }
    Ok(())
}

fn bind_measure(
    kind: ChartKind,
    profiles: &[ColumnProfile],
    hints: &[String],
    binding: &mut RoleBinding,
    used: &mut HashSet<String>,
) -> BindResult<()> {
    let value = hinted(kind, Role::Value, profiles, hints, used)
        .or_else(|| widest_range_numeric(profiles, used))
        .ok_or(BindError::UnbindableRole { kind, role: Role::Value })?;
    used.insert(value.name.clone());
    binding.insert(Role::Value, BindTarget::Column(value.name.clone()));
    Ok(())
}

/// First query-mentioned column that is type-compatible with the role and
/// not yet used.
fn hinted<'a>(
    kind: ChartKind,
    role: Role,
    profiles: &'a [ColumnProfile],
    hints: &[String],
    used: &HashSet<String>,
) -> Option<&'a ColumnProfile> {
    hints.iter().find_map(|hint| {
        profiles.iter().find(|p| {
            p.name.eq_ignore_ascii_case(hint)
                && !used.contains(&p.name)
                && kind.role_accepts(role, p.semantic_type)
        })
    })
}

/// Numeric column with the widest non-null range; ties break on column index.
fn widest_range_numeric<'a>(
    profiles: &'a [ColumnProfile],
    used: &HashSet<String>,
) -> Option<&'a ColumnProfile> {
    profiles
        .iter()
        .filter(|p| p.semantic_type == SemanticType::Numeric && !used.contains(&p.name))
        .max_by(|a, b| {
            let ra = a.numeric.as_ref().map_or(0.0, |n| n.range());
            let rb = b.numeric.as_ref().map_or(0.0, |n| n.range());
            ra.partial_cmp(&rb)
                .unwrap_or(Ordering::Equal)
                // max_by keeps the later element on Equal; prefer the lower
                // index by ranking it greater.
                .then(b.index.cmp(&a.index))
        })
}

/// Categorical (or boolean) column with the smallest cardinality above one,
/// optionally capped; ties break on column index.
fn best_category<'a>(
    profiles: &'a [ColumnProfile],
    used: &HashSet<String>,
    max_cardinality: Option<usize>,
) -> Option<&'a ColumnProfile> {
    profiles
        .iter()
        .filter(|p| {
            matches!(
                p.semantic_type,
                SemanticType::Categorical | SemanticType::Boolean
            ) && !used.contains(&p.name)
                && p.distinct_count >= 2
                && max_cardinality.is_none_or(|cap| p.distinct_count <= cap)
        })
        .min_by(|a, b| {
            a.distinct_count
                .cmp(&b.distinct_count)
                .then(a.index.cmp(&b.index))
        })
}

fn first_of_type<'a>(
    profiles: &'a [ColumnProfile],
    used: &HashSet<String>,
    semantic_type: SemanticType,
) -> Option<&'a ColumnProfile> {
    profiles
        .iter()
        .find(|p| p.semantic_type == semantic_type && !used.contains(&p.name))
}

/// Numeric columns ranked by variance descending; ties break on index.
fn numerics_by_variance<'a>(
    profiles: &'a [ColumnProfile],
    used: &HashSet<String>,
) -> Vec<&'a ColumnProfile> {
    let mut ranked: Vec<&ColumnProfile> = profiles
        .iter()
        .filter(|p| p.semantic_type == SemanticType::Numeric && !used.contains(&p.name))
        .collect();
    ranked.sort_by(|a, b| {
        let va = a.numeric.as_ref().map_or(0.0, |n| n.variance());
        let vb = b.numeric.as_ref().map_or(0.0, |n| n.variance());
        vb.partial_cmp(&va)
            .unwrap_or(Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });
    ranked
}
