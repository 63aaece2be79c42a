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

use crate::profiler::{ColumnProfile, SemanticType};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("network error: {0}")]
    Network(String),
    #[error("classifier request timed out")]
    Timeout,
    #[error("provider error: {0}")]
    Provider(String),
    #[error("serialisation error: {0}")]
    Serialisation(String),
}

pub type ClassifierResult<T> = std::result::Result<T, ClassifierError>;

/// Injected capability used as one signal source during intent resolution.
///
/// Implementations return a free-form chart-family label ("line_chart",
/// "scatter plot", ...). Every failure mode is a normal fallback path for
/// the resolver, never a fatal error.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, query: &str, profiles: &[ColumnProfile]) -> ClassifierResult<String>;
}

/// Ollama-backed classifier speaking the `/api/generate` protocol.
#[derive(Debug, Clone)]
pub struct OllamaClassifier {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaClassifier {
    pub fn new(base_url: String, model: String, timeout_secs: u64) -> ClassifierResult<Self> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url,
            model,
            timeout,
        })
    }

    fn build_prompt(query: &str, profiles: &[ColumnProfile]) -> String {
        let columns: Vec<String> = profiles
            .iter()
            .map(|p| format!("{} ({})", p.name, type_label(p.semantic_type)))
            .collect();
        format!(
            "You classify chart requests. Available chart types: bar, line, scatter, pie, \
             histogram, box, heatmap.\nDataset columns: {}.\nUser request: \"{}\"\n\
             Reply with exactly one chart type from the list and nothing else.",
            columns.join(", "),
            query
        )
    }
}

fn type_label(semantic_type: SemanticType) -> &'static str {
    match semantic_type {
        SemanticType::Numeric => "numeric",
        SemanticType::Categorical => "categorical",
        SemanticType::Temporal => "temporal",
        SemanticType::Boolean => "boolean",
        SemanticType::TextFree => "text",
        SemanticType::Unknown => "unknown",
    }
}

#[async_trait]
impl IntentClassifier for OllamaClassifier {
    async fn classify(&self, query: &str, profiles: &[ColumnProfile]) -> ClassifierResult<String> {
        let payload = json!({
            "model": self.model,
            "prompt": Self::build_prompt(query, profiles),
            "stream": false,
        });
        let url = format!("{}/api/generate", self.base_url);
        debug!(%url, model = %self.model, "sending classification request");
        // Single attempt: retry policy, if any, belongs to the caller.
        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .post(&url)
                .header("content-type", "application/json")
                .json(&payload)
                .send(),
        )
        .await
        .map_err(|_| ClassifierError::Timeout)?
        .map_err(|e| ClassifierError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Provider(format!(
                "classifier returned {status}: {body}"
            )));
        }
        let data: Value = response
            .json()
            .await
            .map_err(|e| ClassifierError::Serialisation(e.to_string()))?;
        let label = data["response"]
            .as_str()
            .ok_or_else(|| {
                ClassifierError::Serialisation(
                    "response payload carries no 'response' field".to_string(),
                )
            })?
            .trim()
            .to_string();
        info!(%label, "classifier produced a chart-family label");
        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_mentions_columns_and_query() {
        let profiles = vec![ColumnProfile {
            name: "sales".to_string(),
            index: 0,
            semantic_type: SemanticType::Numeric,
            row_count: 3,
            null_count: 0,
            null_ratio: 0.0,
            distinct_count: 3,
            numeric: None,
            temporal: None,
            sample_values: vec![],
            numeric_share: None,
            non_numeric_samples: vec![],
        }];
        let prompt = OllamaClassifier::build_prompt("show sales", &profiles);
        assert!(prompt.contains("sales (numeric)"));
        assert!(prompt.contains("show sales"));
    }
}
