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

use crate::chart::ChartKind;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Process-wide engine configuration. Loaded once at start and treated as
/// immutable afterwards; every stage receives it by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub profiling: ProfilingConfig,
    pub quality: QualityConfig,
    pub intent: IntentConfig,
    pub render_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilingConfig {
    /// Ordered list of date formats tried during temporal inference. A column
    /// is temporal only if a single format parses every non-null value.
    pub temporal_formats: Vec<String>,
    pub max_categorical_cardinality: usize,
    /// Distinct/rows ratio above which a high-cardinality text column stops
    /// being categorical and becomes free text.
    pub categorical_cardinality_ratio: f64,
    pub max_sample_values: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Null ratio above which a column earns a non-blocking warning.
    pub missing_value_threshold: f64,
    /// A string column whose numeric-parse failure share sits in
    /// (0, ceiling) is flagged as mixed-type and blocks rendering.
    pub mixed_type_failure_ceiling: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    /// Keyword score at or above which stage one is trusted outright.
    pub min_keyword_confidence: u32,
    pub classifier_timeout_secs: u64,
    pub pie_max_cardinality: usize,
    pub colour_max_cardinality: usize,
    pub lexicon: Vec<LexiconEntry>,
}

/// One phrase-to-family association in the intent lexicon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexiconEntry {
    pub phrase: String,
    pub family: ChartKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            profiling: ProfilingConfig::default(),
            quality: QualityConfig::default(),
            intent: IntentConfig::default(),
            render_timeout_secs: 60,
        }
    }
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            temporal_formats: vec![
                "%Y-%m-%d".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
                "%Y-%m-%dT%H:%M:%S".to_string(),
                "%Y-%m-%dT%H:%M:%SZ".to_string(),
                "%m/%d/%Y".to_string(),
                "%d/%m/%Y".to_string(),
                "%Y%m%d".to_string(),
            ],
            max_categorical_cardinality: 50,
            categorical_cardinality_ratio: 0.5,
            max_sample_values: 20,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            missing_value_threshold: 0.5,
            mixed_type_failure_ceiling: 0.8,
        }
    }
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            min_keyword_confidence: 1,
            classifier_timeout_secs: 5,
            pie_max_cardinality: 12,
            colour_max_cardinality: 10,
            lexicon: default_lexicon(),
        }
    }
}

fn entry(phrase: &str, family: ChartKind) -> LexiconEntry {
    LexiconEntry {
        phrase: phrase.to_string(),
        family,
    }
}

/// Built-in phrase lexicon. Phrases are matched case-insensitively against
/// the whole query; each hit adds one point to its family.
pub fn default_lexicon() -> Vec<LexiconEntry> {
    vec![
        entry("bar chart", ChartKind::Bar),
        entry("bar graph", ChartKind::Bar),
        entry("bars", ChartKind::Bar),
        entry("column chart", ChartKind::Bar),
        entry("compare", ChartKind::Bar),
        entry("comparison", ChartKind::Bar),
        entry("by category", ChartKind::Bar),
        entry("ranking", ChartKind::Bar),
        entry("line chart", ChartKind::Line),
        entry("line graph", ChartKind::Line),
        entry("trend", ChartKind::Line),
        entry("over time", ChartKind::Line),
        entry("time series", ChartKind::Line),
        entry("timeline", ChartKind::Line),
        entry("growth", ChartKind::Line),
        entry("scatter", ChartKind::Scatter),
        entry("correlation", ChartKind::Scatter),
        entry("relationship", ChartKind::Scatter),
        entry("versus", ChartKind::Scatter),
        entry(" vs ", ChartKind::Scatter),
        entry("against", ChartKind::Scatter),
        entry("histogram", ChartKind::Histogram),
        entry("distribution", ChartKind::Histogram),
        entry("frequency", ChartKind::Histogram),
        entry("bins", ChartKind::Histogram),
        entry("spread", ChartKind::Histogram),
        entry("pie", ChartKind::Pie),
        entry("proportion", ChartKind::Pie),
        entry("share of", ChartKind::Pie),
        entry("percentage", ChartKind::Pie),
        entry("breakdown", ChartKind::Pie),
        entry("composition", ChartKind::Pie),
        entry("donut", ChartKind::Pie),
        entry("box plot", ChartKind::Box),
        entry("boxplot", ChartKind::Box),
        entry("quartile", ChartKind::Box),
        entry("outlier", ChartKind::Box),
        entry("median", ChartKind::Box),
        entry("heatmap", ChartKind::Heatmap),
        entry("heat map", ChartKind::Heatmap),
        entry("correlation matrix", ChartKind::Heatmap),
    ]
}

impl EngineConfig {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let raw = fs::read_to_string(path_ref).map_err(|source| ConfigError::File {
            path: path_ref.display().to_string(),
            source,
        })?;
        let config: EngineConfig = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.quality.missing_value_threshold) {
            return Err(ConfigError::OutOfRange {
                field: "quality.missing_value_threshold".to_string(),
                value: self.quality.missing_value_threshold.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.quality.mixed_type_failure_ceiling) {
            return Err(ConfigError::OutOfRange {
                field: "quality.mixed_type_failure_ceiling".to_string(),
                value: self.quality.mixed_type_failure_ceiling.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.profiling.categorical_cardinality_ratio) {
            return Err(ConfigError::OutOfRange {
                field: "profiling.categorical_cardinality_ratio".to_string(),
                value: self.profiling.categorical_cardinality_ratio.to_string(),
            });
        }
        if self.intent.pie_max_cardinality < 2 {
            return Err(ConfigError::OutOfRange {
                field: "intent.pie_max_cardinality".to_string(),
                value: self.intent.pie_max_cardinality.to_string(),
            });
        }
        if self.intent.lexicon.is_empty() {
            return Err(ConfigError::EmptyLexicon);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        EngineConfig::default().validate().expect("defaults validate");
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut config = EngineConfig::default();
        config.quality.missing_value_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_yaml() {
        let config = EngineConfig::default();
        let yaml = serde_yaml::to_string(&config).expect("serialise");
        let back: EngineConfig = serde_yaml::from_str(&yaml).expect("deserialise");
        assert_eq!(back.intent.lexicon.len(), config.intent.lexicon.len());
        assert_eq!(back.render_timeout_secs, 60);
    }
}
