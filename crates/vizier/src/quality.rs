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

use crate::config::QualityConfig;
use crate::profiler::{ColumnProfile, SemanticType};
use serde::Serialize;
use tracing::debug;

/// One data deficiency, blocking or advisory.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityIssue {
    EmptyTable,
    AllColumnsConstant,
    NoSuitableColumn,
    MixedTypes {
        column: String,
        examples: Vec<String>,
    },
    TooManyMissing {
        column: String,
        ratio: f64,
    },
    AllNullColumn {
        column: String,
    },
    SingleRow,
}

impl QualityIssue {
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            QualityIssue::EmptyTable
                | QualityIssue::AllColumnsConstant
                | QualityIssue::NoSuitableColumn
                | QualityIssue::MixedTypes { .. }
        )
    }

    pub fn describe(&self) -> String {
        match self {
            QualityIssue::EmptyTable => "the table contains no data rows".to_string(),
            QualityIssue::AllColumnsConstant => {
                "every column holds a single repeated value, so nothing varies".to_string()
            }
            QualityIssue::NoSuitableColumn => {
                "no column is numeric, temporal or categorical enough to chart".to_string()
            }
            QualityIssue::MixedTypes { column, examples } => format!(
                "column '{column}' mixes numbers with text (e.g. {})",
                examples
                    .iter()
                    .map(|e| format!("'{e}'"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            QualityIssue::TooManyMissing { column, ratio } => format!(
                "column '{column}' is {:.0}% missing",
                ratio * 100.0
            ),
            QualityIssue::AllNullColumn { column } => {
                format!("column '{column}' contains no values at all")
            }
            QualityIssue::SingleRow => {
                "the table has a single data row; most charts need more".to_string()
            }
        }
    }
}

/// Outcome of the quality gate: the ordered issue list and whether any issue
/// blocks chart selection.
#[derive(Debug, Clone, Serialize)]
pub struct QualityReport {
    pub issues: Vec<QualityIssue>,
    pub blocking: bool,
}

impl QualityReport {
    pub fn advisories(&self) -> Vec<QualityIssue> {
        self.issues
            .iter()
            .filter(|issue| !issue.is_blocking())
            .cloned()
            .collect()
    }
}

/// Evaluate the profiled table against the minimum requirements for any
/// visualisation. Rules are independent; issue order follows rule order.
pub fn check_quality(profiles: &[ColumnProfile], config: &QualityConfig) -> QualityReport {
    let mut issues = Vec::new();
    let rows = profiles.first().map_or(0, |p| p.row_count);

    if profiles.is_empty() || rows == 0 {
        issues.push(QualityIssue::EmptyTable);
        return QualityReport {
            issues,
            blocking: true,
        };
    }

    if profiles.iter().all(ColumnProfile::is_constant) {
        issues.push(QualityIssue::AllColumnsConstant);
    }

    if !has_chartable_column(profiles) {
        issues.push(QualityIssue::NoSuitableColumn);
    }

    for profile in profiles {
        if let Some(share) = profile.numeric_share {
            // A column that is mostly numbers with stray text cells cannot
            // be charted either way; mirror the upstream rule of flagging
            // only when the failure share stays under the ceiling.
            let failure_share = 1.0 - share;
            if failure_share > 0.0
                && failure_share < config.mixed_type_failure_ceiling
                && !profile.non_numeric_samples.is_empty()
                && profile.semantic_type != SemanticType::Temporal
            {
                issues.push(QualityIssue::MixedTypes {
                    column: profile.name.clone(),
                    examples: profile.non_numeric_samples.clone(),
                });
            }
        }
    }

    for profile in profiles {
        if profile.semantic_type == SemanticType::Unknown && profile.null_count == profile.row_count
        {
            issues.push(QualityIssue::AllNullColumn {
                column: profile.name.clone(),
            });
        } else if profile.null_ratio > config.missing_value_threshold {
            issues.push(QualityIssue::TooManyMissing {
                column: profile.name.clone(),
                ratio: profile.null_ratio,
            });
        }
    }

    if rows == 1 {
        issues.push(QualityIssue::SingleRow);
    }

    let blocking = issues.iter().any(QualityIssue::is_blocking);
    debug!(
        issue_count = issues.len(),
        blocking, "quality gate evaluated"
    );
    QualityReport { issues, blocking }
}

/// A table is chartable when it has a numeric or temporal column, or at
/// least a categorical column with two or more values for count-based
/// charts.
fn has_chartable_column(profiles: &[ColumnProfile]) -> bool {
    profiles.iter().any(|p| {
        matches!(
            p.semantic_type,
            SemanticType::Numeric | SemanticType::Temporal
        ) || (matches!(
            p.semantic_type,
            SemanticType::Categorical | SemanticType::Boolean
        ) && p.distinct_count >= 2)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::decode;
    use crate::profiler::DataProfiler;

    fn report_for(csv: &str) -> QualityReport {
        let table = decode(csv.as_bytes(), "test.csv").expect("decode");
        let profiles = DataProfiler::new().profile_table(&table).expect("profile");
        check_quality(&profiles, &QualityConfig::default())
    }

    #[test]
    fn constant_columns_block() {
        let report = report_for("a,b\n1,x\n1,x\n1,x\n");
        assert!(report.blocking);
        assert!(report.issues.contains(&QualityIssue::AllColumnsConstant));
    }

    #[test]
    fn all_null_single_column_blocks() {
        use crate::ingest::Table;
        use polars::prelude::*;
        let frame = DataFrame::new(vec![Series::new(
            "only".into(),
            vec![Option::<String>::None, None, None],
        )
        .into_column()])
        .expect("frame");
        let table = Table {
            frame,
            source_name: "nulls.csv".to_string(),
        };
        let profiles = DataProfiler::new().profile_table(&table).expect("profile");
        let report = check_quality(&profiles, &QualityConfig::default());
        assert!(report.blocking);
        assert!(report
            .issues
            .iter()
            .any(|i| matches!(i, QualityIssue::NoSuitableColumn)));
        assert!(report
            .issues
            .iter()
            .any(|i| matches!(i, QualityIssue::AllNullColumn { .. })));
    }

    #[test]
    fn healthy_table_passes_clean() {
        let report = report_for("region,sales\nA,10\nB,20\n");
        assert!(!report.blocking);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn sparse_column_warns_without_blocking() {
        let report = report_for("region,sales\nA,10\nB,\nC,\nD,\n");
        assert!(!report.blocking);
        assert!(report
            .issues
            .iter()
            .any(|i| matches!(i, QualityIssue::TooManyMissing { ratio, .. } if *ratio > 0.5)));
    }

    #[test]
    fn mixed_numeric_text_column_blocks() {
        let report = report_for("amount,region\n10,A\n20,B\noops,C\n30,D\n");
        assert!(report.blocking);
        assert!(report
            .issues
            .iter()
            .any(|i| matches!(i, QualityIssue::MixedTypes { column, .. } if column == "amount")));
    }
}
