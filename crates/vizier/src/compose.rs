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

use crate::binder::RoleBinding;
use crate::chart::ChartKind;
use crate::error::{BindError, IntentError};
use crate::ingest::Table;
use crate::profiler::{
    categorical_profiles, numeric_profiles, temporal_profiles, ColumnProfile,
};
use crate::quality::{QualityIssue, QualityReport};
use crate::render::ImageHandle;
use serde::Serialize;

/// Terminal engine output: exactly one of a rendered chart or a
/// clarification, never both.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EngineResult {
    Rendered(RenderedChart),
    Clarification(Clarification),
}

impl EngineResult {
    pub fn is_rendered(&self) -> bool {
        matches!(self, EngineResult::Rendered(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedChart {
    pub chart: ChartKind,
    pub bindings: RoleBinding,
    pub image: ImageHandle,
    pub summary: ChartSummary,
    pub data_warnings: Vec<QualityIssue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartSummary {
    pub rows: usize,
    pub columns: usize,
    pub chart_type: String,
    pub columns_used: Vec<String>,
    pub insight: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Clarification {
    pub message: String,
    pub suggestions: Vec<String>,
    pub issues: Vec<QualityIssue>,
}

/// Assemble the success payload for a rendered chart.
pub fn compose_rendered(
    kind: ChartKind,
    bindings: RoleBinding,
    image: ImageHandle,
    table: &Table,
    profiles: &[ColumnProfile],
    report: &QualityReport,
) -> EngineResult {
    let summary = ChartSummary {
        rows: table.rows(),
        columns: table.columns(),
        chart_type: kind.display_name().to_string(),
        columns_used: bindings.columns_used(),
        insight: derive_insight(profiles),
    };
    EngineResult::Rendered(RenderedChart {
        chart: kind,
        bindings,
        image,
        summary,
        data_warnings: report.advisories(),
    })
}

/// Clarification for a table the quality gate refused.
pub fn compose_quality_clarification(
    report: &QualityReport,
    profiles: &[ColumnProfile],
) -> EngineResult {
    let described: Vec<String> = report
        .issues
        .iter()
        .filter(|issue| issue.is_blocking())
        .map(QualityIssue::describe)
        .collect();
    EngineResult::Clarification(Clarification {
        message: format!(
            "The data cannot be charted as it stands: {}.",
            described.join("; ")
        ),
        suggestions: suggest_queries(profiles),
        issues: report.issues.clone(),
    })
}

pub fn compose_intent_clarification(
    error: &IntentError,
    profiles: &[ColumnProfile],
    report: &QualityReport,
) -> EngineResult {
    let message = match error {
        IntentError::Unclear { message } => message.clone(),
        IntentError::Ambiguous { .. } => {
            "I could not find a chart that fits both your request and this dataset. Try one of the suggestions below."
                .to_string()
        }
    };
    EngineResult::Clarification(Clarification {
        message,
        suggestions: suggest_queries(profiles),
        issues: report.advisories(),
    })
}

pub fn compose_binding_clarification(
    error: &BindError,
    profiles: &[ColumnProfile],
    report: &QualityReport,
) -> EngineResult {
    let BindError::UnbindableRole { kind, role } = error;
    EngineResult::Clarification(Clarification {
        message: format!(
            "A {} needs a column for its '{role}' role and this dataset has none that fits. Try one of the suggestions below.",
            kind.display_name()
        ),
        suggestions: suggest_queries(profiles),
        issues: report.advisories(),
    })
}

/// Example queries synthesised from the actual column names, so every
/// suggestion is answerable against the uploaded data. Returns three to five
/// entries depending on what the profile supports.
pub fn suggest_queries(profiles: &[ColumnProfile]) -> Vec<String> {
    let numeric = numeric_profiles(profiles);
    let categorical = categorical_profiles(profiles);
    let temporal = temporal_profiles(profiles);
    let mut suggestions = Vec::new();
    if let (Some(num), Some(cat)) = (numeric.first(), categorical.first()) {
        suggestions.push(format!("Show me a bar chart of {} by {}", num.name, cat.name));
        suggestions.push(format!(
            "Create a pie chart showing the share of {} across {}",
            num.name, cat.name
        ));
    }
    if let (Some(num), Some(time)) = (numeric.first(), temporal.first()) {
        suggestions.push(format!(
            "Create a line chart of {} over {}",
            num.name, time.name
        ));
    }
    if numeric.len() >= 2 {
        suggestions.push(format!(
            "Make a scatter plot of {} against {}",
            numeric[0].name, numeric[1].name
        ));
    }
    if let Some(num) = numeric.first() {
        suggestions.push(format!("Show a histogram of the {} distribution", num.name));
    }
    if suggestions.is_empty() {
        if let Some(cat) = categorical.first() {
            suggestions.push(format!(
                "Show a pie chart of row counts by {}",
                cat.name
            ));
        }
        suggestions.push("Upload a file with at least one numeric column, e.g. monthly sales figures".to_string());
        suggestions.push("Name the chart type you want: bar, line, scatter, pie, histogram, box or heatmap".to_string());
    }
    suggestions.truncate(5);
    suggestions
}

/// One data-grounded observation for the summary line. Picks the numeric
/// column with the most relative variation, falling back to structural facts
/// about the table.
fn derive_insight(profiles: &[ColumnProfile]) -> String {
    let numeric = numeric_profiles(profiles);
    let most_varied = numeric
        .iter()
        .filter_map(|p| {
            let stats = p.numeric.as_ref()?;
            let mean = stats.mean?;
            let std = stats.std?;
            if mean.abs() > f64::EPSILON {
                Some((p, (std / mean).abs()))
            } else {
                None
            }
        })
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    if let Some((profile, _)) = most_varied {
        if let Some(stats) = &profile.numeric {
            if let (Some(min), Some(max)) = (stats.min, stats.max) {
                return format!(
                    "Strongest variation observed in '{}', spanning {min} to {max}",
                    profile.name
                );
            }
        }
    }
    if let Some(time) = temporal_profiles(profiles).first() {
        if let Some(temporal) = &time.temporal {
            if let (Some(min), Some(max)) = (&temporal.min, &temporal.max) {
                return format!("'{}' covers {min} to {max}", time.name);
            }
        }
    }
    if let Some(cat) = categorical_profiles(profiles).first() {
        return format!(
            "'{}' groups the data into {} categories",
            cat.name, cat.distinct_count
        );
    }
    format!("{} columns profiled", profiles.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QualityConfig;
    use crate::ingest::decode;
    use crate::profiler::DataProfiler;
    use crate::quality::check_quality;

    fn profiles_for(csv: &str) -> Vec<ColumnProfile> {
        let table = decode(csv.as_bytes(), "test.csv").expect("decode");
        DataProfiler::new().profile_table(&table).expect("profile")
    }

    #[test]
    fn suggestions_use_actual_column_names() {
        let profiles = profiles_for("region,sales,day\nA,10,2024-01-01\nB,20,2024-01-02\n");
        let suggestions = suggest_queries(&profiles);
        assert!((3..=5).contains(&suggestions.len()));
        assert!(suggestions.iter().any(|s| s.contains("sales") && s.contains("region")));
        assert!(suggestions.iter().any(|s| s.contains("day")));
        assert!(!suggestions.iter().any(|s| s.contains("column_")));
    }

    #[test]
    fn suggestions_survive_hopeless_tables() {
        let profiles = profiles_for("notes\nalpha\nbeta\ngamma\n");
        let suggestions = suggest_queries(&profiles);
        assert!(!suggestions.is_empty());
    }

    #[test]
    fn quality_clarification_lists_blocking_issues() {
        let profiles = profiles_for("a,b\n1,x\n1,x\n");
        let report = check_quality(&profiles, &QualityConfig::default());
        let result = compose_quality_clarification(&report, &profiles);
        match result {
            EngineResult::Clarification(c) => {
                assert!(c.message.contains("single repeated value"));
                assert!(!c.suggestions.is_empty());
                assert!(!c.issues.is_empty());
            }
            EngineResult::Rendered(_) => panic!("expected a clarification"),
        }
    }

    #[test]
    fn insight_names_the_most_varied_column() {
        let profiles = profiles_for("region,sales\nA,10\nB,500\nC,20\n");
        let insight = derive_insight(&profiles);
        assert!(insight.contains("sales"));
    }
}
