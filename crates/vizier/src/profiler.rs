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

use crate::config::ProfilingConfig;
use crate::error::{ParseError, ParseResult};
use crate::ingest::Table;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Inferred logical type of a column, distinct from the raw storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Numeric,
    Categorical,
    Temporal,
    Boolean,
    TextFree,
    Unknown,
}

impl SemanticType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, SemanticType::Numeric)
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, SemanticType::Categorical)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, SemanticType::Temporal)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

impl NumericSummary {
    /// Width of the non-null value range; zero when unknown.
    pub fn range(&self) -> f64 {
        match (self.min, self.max) {
            (Some(min), Some(max)) => max - min,
            _ => 0.0,
        }
    }

    pub fn variance(&self) -> f64 {
        self.std.map_or(0.0, |s| s * s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalSummary {
    /// The strftime format under which every non-null value parsed.
    pub format: String,
    pub min: Option<String>,
    pub max: Option<String>,
}

/// Read-only, per-column summary computed once per request from a [`Table`]
/// and discarded after response composition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    /// Position in the source table; the deterministic tie-break everywhere.
    pub index: usize,
    pub semantic_type: SemanticType,
    pub row_count: usize,
    pub null_count: usize,
    pub null_ratio: f64,
    /// Distinct non-null values.
    pub distinct_count: usize,
    pub numeric: Option<NumericSummary>,
    pub temporal: Option<TemporalSummary>,
    pub sample_values: Vec<String>,
    /// For string columns: the share of non-null values that parse as a
    /// number. Drives the mixed-type quality rule.
    pub numeric_share: Option<f64>,
    /// Up to three offending values when a string column is partly numeric.
    pub non_numeric_samples: Vec<String>,
}

impl ColumnProfile {
    pub fn is_constant(&self) -> bool {
        self.distinct_count <= 1
    }
}

const BOOLEAN_PAIRS: [[&str; 2]; 3] = [["true", "false"], ["yes", "no"], ["0", "1"]];

pub struct DataProfiler {
    config: ProfilingConfig,
}

impl DataProfiler {
    pub fn new() -> Self {
        Self {
            config: ProfilingConfig::default(),
        }
    }

    pub fn with_config(config: ProfilingConfig) -> Self {
        Self { config }
    }

    /// Profile every column of the table. Column order is preserved, so the
    /// output is deterministic and re-profiling yields identical results.
    pub fn profile_table(&self, table: &Table) -> ParseResult<Vec<ColumnProfile>> {
        let total_rows = table.frame.height();
        table
            .frame
            .get_columns()
            .par_iter()
            .enumerate()
            .map(|(index, column)| {
                self.profile_column(
                    column.as_series().expect("column should contain a series"),
                    index,
                    total_rows,
                )
            })
            .collect()
    }

    fn profile_column(
        &self,
        series: &Series,
        index: usize,
        total_rows: usize,
    ) -> ParseResult<ColumnProfile> {
        let name = series.name().to_string();
        let null_count = series.null_count();
        let null_ratio = if total_rows > 0 {
            null_count as f64 / total_rows as f64
        } else {
            0.0
        };
        let detection = self.detect_semantic_type(series)?;
        let distinct_count = {
            let mut distinct = series.n_unique()?;
            if null_count > 0 && distinct > 0 {
                distinct -= 1;
            }
            distinct
        };
        let numeric = if detection.semantic_type == SemanticType::Numeric {
            Some(self.numeric_summary(series)?)
        } else {
            None
        };
        let temporal = match (&detection.semantic_type, &detection.temporal_format) {
            (SemanticType::Temporal, Some(format)) => {
                Some(self.temporal_summary(series, format)?)
            }
            _ => None,
        };
        let sample_values = self.sample_values(series)?;
        Ok(ColumnProfile {
            name,
            index,
            semantic_type: detection.semantic_type,
            row_count: total_rows,
            null_count,
            null_ratio,
            distinct_count,
            numeric,
            temporal,
            sample_values,
            numeric_share: detection.numeric_share,
            non_numeric_samples: detection.non_numeric_samples,
        })
    }

    fn detect_semantic_type(&self, series: &Series) -> ParseResult<TypeDetection> {
        let non_null = series.len() - series.null_count();
        if non_null == 0 {
            return Ok(TypeDetection::of(SemanticType::Unknown));
        }
        if matches!(series.dtype(), DataType::Boolean) {
            return Ok(TypeDetection::of(SemanticType::Boolean));
        }
        if matches!(
            series.dtype(),
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
        ) {
            // A 0/1-valued numeric column is boolean-compatible; boolean
            // wins the tie over numeric.
            if self.numeric_values_are_boolean(series)? {
                return Ok(TypeDetection::of(SemanticType::Boolean));
            }
            return Ok(TypeDetection::of(SemanticType::Numeric));
        }
        if matches!(series.dtype(), DataType::Date | DataType::Datetime(_, _)) {
            return Ok(TypeDetection {
                semantic_type: SemanticType::Temporal,
                temporal_format: Some("%Y-%m-%dT%H:%M:%S".to_string()),
                numeric_share: None,
                non_numeric_samples: Vec::new(),
            });
        }
        self.detect_from_strings(series, non_null)
    }

    fn numeric_values_are_boolean(&self, series: &Series) -> ParseResult<bool> {
        let s_float = series.cast(&DataType::Float64)?;
        let floats = s_float.f64()?;
        let mut seen = HashSet::new();
        for value in floats.into_iter().flatten() {
            if value != 0.0 && value != 1.0 {
                return Ok(false);
            }
            seen.insert(value as i64);
        }
        Ok(!seen.is_empty())
    }

    fn detect_from_strings(&self, series: &Series, non_null: usize) -> ParseResult<TypeDetection> {
        let s_str = series.cast(&DataType::String)?;
        let str_ca = s_str.str()?;
        let mut distinct_lower = HashSet::new();
        let mut numeric_failures = 0usize;
        let mut non_numeric_samples = Vec::new();
        for value in str_ca.into_iter().flatten() {
            let trimmed = value.trim();
            distinct_lower.insert(trimmed.to_lowercase());
            if trimmed.parse::<f64>().is_err() {
                numeric_failures += 1;
                if non_numeric_samples.len() < 3 && !non_numeric_samples.contains(&trimmed.to_string())
                {
                    non_numeric_samples.push(trimmed.to_string());
                }
            }
        }
        let numeric_share = if non_null > 0 {
            (non_null - numeric_failures) as f64 / non_null as f64
        } else {
            0.0
        };
        let boolean = BOOLEAN_PAIRS.iter().any(|pair| {
            distinct_lower
                .iter()
                .all(|value| pair.contains(&value.as_str()))
        });
        if boolean {
            return Ok(TypeDetection {
                semantic_type: SemanticType::Boolean,
                temporal_format: None,
                numeric_share: Some(numeric_share),
                non_numeric_samples,
            });
        }
        if numeric_failures == 0 {
            return Ok(TypeDetection {
                semantic_type: SemanticType::Numeric,
                temporal_format: None,
                numeric_share: Some(1.0),
                non_numeric_samples: Vec::new(),
            });
        }
        if let Some(format) = self.matching_temporal_format(str_ca) {
            return Ok(TypeDetection {
                semantic_type: SemanticType::Temporal,
                temporal_format: Some(format),
                numeric_share: Some(numeric_share),
                non_numeric_samples,
            });
        }
        let distinct = distinct_lower.len();
        let within_absolute = distinct <= self.config.max_categorical_cardinality;
        let within_ratio = non_null > 0
            && (distinct as f64 / non_null as f64) <= self.config.categorical_cardinality_ratio;
        let semantic_type = if within_absolute || within_ratio {
            SemanticType::Categorical
        } else {
            SemanticType::TextFree
        };
        Ok(TypeDetection {
            semantic_type,
            temporal_format: None,
            numeric_share: Some(numeric_share),
            non_numeric_samples,
        })
    }

    /// First configured format under which every non-null value parses.
    fn matching_temporal_format(&self, values: &StringChunked) -> Option<String> {
        self.config
            .temporal_formats
            .iter()
            .find(|format| {
                values
                    .into_iter()
                    .flatten()
                    .all(|value| parse_datetime(value.trim(), format).is_some())
            })
            .cloned()
    }

    fn numeric_summary(&self, series: &Series) -> ParseResult<NumericSummary> {
        let s_float = series.cast(&DataType::Float64)?;
        let floats = s_float.f64()?;
        Ok(NumericSummary {
            min: floats.min(),
            max: floats.max(),
            mean: floats.mean(),
            std: floats.std(1),
        })
    }

    fn temporal_summary(&self, series: &Series, format: &str) -> ParseResult<TemporalSummary> {
        let s_str = series.cast(&DataType::String)?;
        let str_ca = s_str.str()?;
        let mut parsed: Vec<NaiveDateTime> = str_ca
            .into_iter()
            .flatten()
            .filter_map(|value| parse_datetime(value.trim(), format))
            .collect();
        parsed.sort();
        Ok(TemporalSummary {
            format: format.to_string(),
            min: parsed.first().map(|dt| dt.to_string()),
            max: parsed.last().map(|dt| dt.to_string()),
        })
    }

    /// First-occurrence sample of distinct values, capped by configuration.
    /// Scanning in source order keeps profiling idempotent.
    fn sample_values(&self, series: &Series) -> ParseResult<Vec<String>> {
        let s_str = series.cast(&DataType::String)?;
        let str_ca = s_str.str()?;
        let mut seen = HashSet::new();
        let mut samples = Vec::new();
        for value in str_ca.into_iter().flatten() {
            if samples.len() >= self.config.max_sample_values {
                break;
            }
            if seen.insert(value.to_string()) {
                samples.push(value.to_string());
            }
        }
        Ok(samples)
    }
}

impl Default for DataProfiler {
    fn default() -> Self {
        Self::new()
    }
}

struct TypeDetection {
    semantic_type: SemanticType,
    temporal_format: Option<String>,
    numeric_share: Option<f64>,
    non_numeric_samples: Vec<String>,
}

impl TypeDetection {
    fn of(semantic_type: SemanticType) -> Self {
        Self {
            semantic_type,
            temporal_format: None,
            numeric_share: None,
            non_numeric_samples: Vec::new(),
        }
    }
}

fn parse_datetime(value: &str, format: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
        return Some(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, format) {
        return date.and_hms_opt(0, 0, 0);
    }
    None
}

pub fn numeric_profiles(profiles: &[ColumnProfile]) -> Vec<&ColumnProfile> {
    profiles
        .iter()
        .filter(|p| p.semantic_type == SemanticType::Numeric)
        .collect()
}

pub fn categorical_profiles(profiles: &[ColumnProfile]) -> Vec<&ColumnProfile> {
    profiles
        .iter()
        .filter(|p| {
            matches!(
                p.semantic_type,
                SemanticType::Categorical | SemanticType::Boolean
            )
        })
        .collect()
}

pub fn temporal_profiles(profiles: &[ColumnProfile]) -> Vec<&ColumnProfile> {
    profiles
        .iter()
        .filter(|p| p.semantic_type == SemanticType::Temporal)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::decode;

    fn profile_csv(csv: &str) -> Vec<ColumnProfile> {
        let table = decode(csv.as_bytes(), "test.csv").expect("decode");
        DataProfiler::new().profile_table(&table).expect("profile")
    }

    #[test]
    fn infers_numeric_and_categorical() {
        let profiles = profile_csv("region,sales\nA,10\nB,20\nA,15\n");
        assert_eq!(profiles[0].semantic_type, SemanticType::Categorical);
        assert_eq!(profiles[1].semantic_type, SemanticType::Numeric);
        assert_eq!(profiles[0].distinct_count, 2);
        let numeric = profiles[1].numeric.as_ref().expect("numeric summary");
        assert_eq!(numeric.min, Some(10.0));
        assert_eq!(numeric.max, Some(20.0));
    }

    #[test]
    fn zero_one_column_resolves_to_boolean_over_numeric() {
        let profiles = profile_csv("flag\n0\n1\n0\n1\n");
        assert_eq!(profiles[0].semantic_type, SemanticType::Boolean);
    }

    #[test]
    fn yes_no_column_is_boolean() {
        let profiles = profile_csv("active\nyes\nNo\nYES\n");
        assert_eq!(profiles[0].semantic_type, SemanticType::Boolean);
    }

    #[test]
    fn iso_dates_are_temporal_with_detected_format() {
        let profiles = profile_csv("day,value\n2024-01-01,1\n2024-01-02,2\n2024-01-03,3\n");
        assert_eq!(profiles[0].semantic_type, SemanticType::Temporal);
        let temporal = profiles[0].temporal.as_ref().expect("temporal summary");
        assert_eq!(temporal.format, "%Y-%m-%d");
    }

    #[test]
    fn all_null_column_is_unknown() {
        let profiles = profile_csv("a,b\n,1\n,2\n");
        assert_eq!(profiles[0].semantic_type, SemanticType::Unknown);
        assert_eq!(profiles[0].null_count, 2);
        assert_eq!(profiles[0].distinct_count, 0);
    }

    #[test]
    fn partly_numeric_text_column_records_share_and_samples() {
        let profiles = profile_csv("mixed\n1\n2\nbroken\n4\n");
        let profile = &profiles[0];
        assert_ne!(profile.semantic_type, SemanticType::Numeric);
        assert_eq!(profile.numeric_share, Some(0.75));
        assert_eq!(profile.non_numeric_samples, vec!["broken".to_string()]);
    }

    #[test]
    fn profiling_is_idempotent() {
        let table = decode(
            b"region,sales,day\nA,10,2024-01-01\nB,20,2024-01-02\n",
            "test.csv",
        )
        .expect("decode");
        let profiler = DataProfiler::new();
        let first = profiler.profile_table(&table).expect("profile");
        let second = profiler.profile_table(&table).expect("profile again");
        assert_eq!(first, second);
    }
}
