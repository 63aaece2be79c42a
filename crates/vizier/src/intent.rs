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
use crate::classifier::IntentClassifier;
use crate::config::IntentConfig;
use crate::error::{IntentError, IntentResult};
use crate::profiler::ColumnProfile;
use regex::RegexBuilder;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of intent resolution, with enough context for the composer to
/// explain itself.
#[derive(Debug, Clone)]
pub struct IntentResolution {
    pub kind: ChartKind,
    pub scores: BTreeMap<ChartKind, u32>,
    pub used_classifier: bool,
    /// Set when the scored winner was infeasible for this dataset and the
    /// resolver demoted to the next feasible family.
    pub demoted_from: Option<ChartKind>,
}

const VAGUE_PHRASES: [&str; 15] = [
    "any graph",
    "any chart",
    "any plot",
    "some graph",
    "some chart",
    "generate graph",
    "create graph",
    "make graph",
    "show graph",
    "plot data",
    "chart data",
    "graph data",
    "something",
    "anything",
    "whatever",
];

const GREETINGS: [&str; 7] = [
    "hello",
    "hi",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "thanks",
];

/// Map the natural-language query plus the column profiles to a chart kind.
///
/// Stage one scores the query against the phrase lexicon. Stage two, entered
/// only on a zero score or a tie among top candidates, consults the optional
/// external classifier with a bounded timeout; any classifier failure falls
/// back to the stage-one leader, or to a bar chart when nothing matched at
/// all. The winner is then narrowed by required-role feasibility against the
/// profiles, demoting to the next-highest feasible family when needed.
pub async fn resolve_intent(
    query: &str,
    profiles: &[ColumnProfile],
    config: &IntentConfig,
    classifier: Option<&dyn IntentClassifier>,
) -> IntentResult<IntentResolution> {
    let normalised = query.trim().to_lowercase();
    reject_unusable(&normalised)?;

    let scores = score_lexicon(&normalised, config);
    let top_score = scores.values().copied().max().unwrap_or(0);
    let leaders: Vec<ChartKind> = ordered_candidates(&scores)
        .into_iter()
        .filter(|kind| scores.get(kind).copied().unwrap_or(0) == top_score && top_score > 0)
        .collect();
    debug!(?scores, top_score, "stage-one lexicon scores");

    if top_score == 0 {
        reject_empty_of_meaning(&normalised, profiles)?;
    }

    let confident = top_score >= config.min_keyword_confidence && leaders.len() == 1;
    let mut used_classifier = false;
    let stage_choice = if confident {
        leaders[0]
    } else {
        match consult_classifier(query, profiles, config, classifier).await {
            Some(kind) => {
                used_classifier = true;
                kind
            }
            None => leaders.first().copied().unwrap_or(ChartKind::Bar),
        }
    };

    let mut order = vec![stage_choice];
    // Distribution requests that cannot be histograms (no numeric column)
    // fall through to pie before any other family.
    if stage_choice == ChartKind::Histogram {
        order.push(ChartKind::Pie);
    }
    for kind in ordered_candidates(&scores) {
        if !order.contains(&kind) {
            order.push(kind);
        }
    }
    let chosen = order
        .iter()
        .copied()
        .find(|kind| kind.is_feasible(profiles, config))
        .ok_or_else(|| IntentError::Ambiguous {
            candidates: scored_families(&scores),
        })?;
    let demoted_from = (chosen != stage_choice).then_some(stage_choice);
    if let Some(from) = demoted_from {
        debug!(%from, to = %chosen, "demoted infeasible chart family");
    }
    Ok(IntentResolution {
        kind: chosen,
        scores,
        used_classifier,
        demoted_from,
    })
}

fn reject_unusable(normalised: &str) -> IntentResult<()> {
    if normalised.len() <= 2 {
        return Err(IntentError::Unclear {
            message: "Your query is too short to act on. Tell me what kind of chart you would like to see."
                .to_string(),
        });
    }
    if !normalised.chars().any(|c| c.is_alphabetic()) {
        return Err(IntentError::Unclear {
            message: "I need a text description of what to visualise; numbers or symbols alone are not enough."
                .to_string(),
        });
    }
    Ok(())
}

/// Zero-score queries get a second look before the default kicks in: pure
/// noise, greetings and explicitly vague requests deserve a clarification
/// rather than a silent bar chart.
fn reject_empty_of_meaning(normalised: &str, _profiles: &[ColumnProfile]) -> IntentResult<()> {
    let words: Vec<&str> = normalised.split_whitespace().collect();
    if VAGUE_PHRASES.iter().any(|phrase| normalised.contains(phrase)) {
        return Err(IntentError::Unclear {
            message: "That request is quite open-ended. Pick one of the suggestions below, or name a chart type."
                .to_string(),
        });
    }
    if words.len() <= 3 && GREETINGS.iter().any(|g| normalised.contains(g)) {
        return Err(IntentError::Unclear {
            message: "Hello! Tell me what you would like to visualise from your data.".to_string(),
        });
    }
    let has_real_word = words
        .iter()
        .any(|word| word.len() > 2 && word.chars().all(|c| c.is_alphabetic()));
    let distinct_letters: std::collections::HashSet<char> =
        normalised.chars().filter(|c| c.is_alphabetic()).collect();
    if !has_real_word || (normalised.len() > 10 && distinct_letters.len() < 4) {
        return Err(IntentError::Unclear {
            message: "I could not make sense of that request. Describe the chart you want in plain words."
                .to_string(),
        });
    }
    Ok(())
}

fn score_lexicon(normalised: &str, config: &IntentConfig) -> BTreeMap<ChartKind, u32> {
    let mut scores = BTreeMap::new();
    for entry in &config.lexicon {
        if normalised.contains(entry.phrase.as_str()) {
            *scores.entry(entry.family).or_insert(0) += 1;
        }
    }
    scores
}

/// Families ordered by score descending, then by the fixed tie-break order
/// of [`ChartKind::ALL`].
fn ordered_candidates(scores: &BTreeMap<ChartKind, u32>) -> Vec<ChartKind> {
    let mut candidates: Vec<ChartKind> = ChartKind::ALL.to_vec();
    candidates.sort_by_key(|kind| {
        let score = scores.get(kind).copied().unwrap_or(0);
        let position = ChartKind::ALL
            .iter()
            .position(|k| k == kind)
            .unwrap_or(usize::MAX);
        (std::cmp::Reverse(score), position)
    });
    candidates
}

fn scored_families(scores: &BTreeMap<ChartKind, u32>) -> Vec<ChartKind> {
    let scored: Vec<ChartKind> = ordered_candidates(scores)
        .into_iter()
        .filter(|kind| scores.get(kind).copied().unwrap_or(0) > 0)
        .collect();
    if scored.is_empty() {
        ChartKind::ALL.to_vec()
    } else {
        scored
    }
}

async fn consult_classifier(
    query: &str,
    profiles: &[ColumnProfile],
    config: &IntentConfig,
    classifier: Option<&dyn IntentClassifier>,
) -> Option<ChartKind> {
    let classifier = classifier?;
    let budget = Duration::from_secs(config.classifier_timeout_secs);
    match tokio::time::timeout(budget, classifier.classify(query, profiles)).await {
        Ok(Ok(label)) => match ChartKind::from_label(&label) {
            Some(kind) => Some(kind),
            None => {
                warn!(%label, "classifier label did not name a known chart family");
                None
            }
        },
        Ok(Err(error)) => {
            warn!(%error, "classifier call failed, falling back to keyword result");
            None
        }
        Err(_) => {
            warn!(
                timeout_secs = config.classifier_timeout_secs,
                "classifier call timed out, falling back to keyword result"
            );
            None
        }
    }
}

/// Literal column names mentioned in the query, in source-column order.
/// Matching is case-insensitive on word boundaries so that "sales" does not
/// match a "salesperson" column by accident.
pub fn extract_column_hints(query: &str, profiles: &[ColumnProfile]) -> Vec<String> {
    let mut hints = Vec::new();
    for profile in profiles {
        let pattern = format!(r"\b{}\b", regex::escape(&profile.name));
        let matched = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map(|re| re.is_match(query))
            .unwrap_or(false);
        if matched {
            hints.push(profile.name.clone());
        }
    }
    hints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiler::{NumericSummary, SemanticType};

    fn profile(name: &str, index: usize, semantic_type: SemanticType, distinct: usize) -> ColumnProfile {
        ColumnProfile {
            name: name.to_string(),
            index,
            semantic_type,
            row_count: 10,
            null_count: 0,
            null_ratio: 0.0,
            distinct_count: distinct,
            numeric: matches!(semantic_type, SemanticType::Numeric).then(|| NumericSummary {
                min: Some(0.0),
                max: Some(10.0),
                mean: Some(5.0),
                std: Some(2.0),
            }),
            temporal: None,
            sample_values: vec![],
            numeric_share: None,
            non_numeric_samples: vec![],
        }
    }

    fn sales_by_region() -> Vec<ColumnProfile> {
        vec![
            profile("region", 0, SemanticType::Categorical, 4),
            profile("sales", 1, SemanticType::Numeric, 10),
        ]
    }

    #[tokio::test]
    async fn bar_chart_query_resolves_to_bar() {
        let resolution = resolve_intent(
            "Show me a bar chart comparing sales by region",
            &sales_by_region(),
            &IntentConfig::default(),
            None,
        )
        .await
        .expect("resolution");
        assert_eq!(resolution.kind, ChartKind::Bar);
        assert!(!resolution.used_classifier);
    }

    #[tokio::test]
    async fn unmatched_text_defaults_to_bar_when_feasible() {
        let resolution = resolve_intent(
            "asdlkj random text",
            &sales_by_region(),
            &IntentConfig::default(),
            None,
        )
        .await
        .expect("resolution");
        assert_eq!(resolution.kind, ChartKind::Bar);
    }

    #[tokio::test]
    async fn trend_queries_resolve_to_line() {
        let profiles = vec![
            profile("day", 0, SemanticType::Temporal, 10),
            profile("visits", 1, SemanticType::Numeric, 10),
        ];
        let resolution = resolve_intent(
            "show the trend of visits over time",
            &profiles,
            &IntentConfig::default(),
            None,
        )
        .await
        .expect("resolution");
        assert_eq!(resolution.kind, ChartKind::Line);
    }

    #[tokio::test]
    async fn distribution_demotes_to_pie_without_numeric_columns() {
        let profiles = vec![profile("segment", 0, SemanticType::Categorical, 5)];
        let resolution = resolve_intent(
            "show the distribution of segments",
            &profiles,
            &IntentConfig::default(),
            None,
        )
        .await
        .expect("resolution");
        assert_eq!(resolution.kind, ChartKind::Pie);
        assert_eq!(resolution.demoted_from, Some(ChartKind::Histogram));
    }

    #[tokio::test]
    async fn distribution_prefers_histogram_with_numeric_columns() {
        let resolution = resolve_intent(
            "show the distribution of sales",
            &sales_by_region(),
            &IntentConfig::default(),
            None,
        )
        .await
        .expect("resolution");
        assert_eq!(resolution.kind, ChartKind::Histogram);
    }

    #[tokio::test]
    async fn greetings_ask_for_clarification() {
        let err = resolve_intent("hello there", &sales_by_region(), &IntentConfig::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, IntentError::Unclear { .. }));
    }

    #[tokio::test]
    async fn scatter_needs_two_numeric_columns() {
        let profiles = vec![profile("only_text", 0, SemanticType::TextFree, 10)];
        let err = resolve_intent(
            "scatter of things",
            &profiles,
            &IntentConfig::default(),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, IntentError::Ambiguous { .. }));
    }

    #[test]
    fn column_hints_match_whole_words_case_insensitively() {
        let profiles = vec![
            profile("sales", 0, SemanticType::Numeric, 10),
            profile("salesperson", 1, SemanticType::Categorical, 5),
        ];
        let hints = extract_column_hints("Plot Sales by month", &profiles);
        assert_eq!(hints, vec!["sales".to_string()]);
    }
}
