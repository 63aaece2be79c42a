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

pub mod binder;
pub mod chart;
pub mod classifier;
pub mod compose;
pub mod config;
pub mod error;
pub mod ingest;
pub mod intent;
pub mod profiler;
pub mod quality;
pub mod render;

pub use binder::{bind_roles, BindTarget, RoleBinding};
pub use chart::{ChartKind, Role};
pub use classifier::{ClassifierError, IntentClassifier, OllamaClassifier};
pub use compose::{
    suggest_queries, ChartSummary, Clarification, EngineResult, RenderedChart,
};
pub use config::{EngineConfig, IntentConfig, ProfilingConfig, QualityConfig};
pub use error::{
    BindError, ConfigError, EngineError, IntentError, ParseError, RenderError, Result,
};
pub use ingest::Table;
pub use intent::{extract_column_hints, resolve_intent, IntentResolution};
pub use profiler::{ColumnProfile, DataProfiler, SemanticType};
pub use quality::{check_quality, QualityIssue, QualityReport};
pub use render::{render_with_timeout, ImageHandle, Renderer};

use std::time::Duration;
use tracing::{debug, info};

/// Per-request pipeline stage, used for log breadcrumbs only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Received,
    Profiled,
    QualityChecked,
    IntentResolved,
    RoleBound,
    Rendered,
    ClarificationReady,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Profiled => "profiled",
            Stage::QualityChecked => "quality_checked",
            Stage::IntentResolved => "intent_resolved",
            Stage::RoleBound => "role_bound",
            Stage::Rendered => "rendered",
            Stage::ClarificationReady => "clarification_ready",
        };
        f.write_str(name)
    }
}

/// The query-to-chart inference engine.
///
/// Stateless per request: configuration is loaded once and read-only, so one
/// engine value can serve many concurrent requests.
pub struct ChartEngine {
    config: EngineConfig,
    profiler: DataProfiler,
}

impl ChartEngine {
    pub fn new() -> Self {
        let config = EngineConfig::default();
        let profiler = DataProfiler::with_config(config.profiling.clone());
        Self { config, profiler }
    }

    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate().map_err(EngineError::Config)?;
        let profiler = DataProfiler::with_config(config.profiling.clone());
        Ok(Self { config, profiler })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Decode raw bytes and compute the column profiles.
    pub fn profile(
        &self,
        bytes: &[u8],
        filename: &str,
    ) -> std::result::Result<(Table, Vec<ColumnProfile>), ParseError> {
        let table = ingest::decode(bytes, filename)?;
        let profiles = self.profiler.profile_table(&table)?;
        Ok((table, profiles))
    }

    pub fn check_quality(&self, profiles: &[ColumnProfile]) -> QualityReport {
        check_quality(profiles, &self.config.quality)
    }

    pub async fn resolve_intent(
        &self,
        query: &str,
        profiles: &[ColumnProfile],
        classifier: Option<&dyn IntentClassifier>,
    ) -> std::result::Result<IntentResolution, IntentError> {
        resolve_intent(query, profiles, &self.config.intent, classifier).await
    }

    pub fn bind_roles(
        &self,
        kind: ChartKind,
        profiles: &[ColumnProfile],
        hints: &[String],
    ) -> std::result::Result<RoleBinding, BindError> {
        bind_roles(kind, profiles, hints, &self.config.intent)
    }

    pub fn suggest_queries(&self, profiles: &[ColumnProfile]) -> Vec<String> {
        suggest_queries(profiles)
    }

    /// Run the whole pipeline for one request.
    ///
    /// Recoverable problems (blocked quality gate, unclear or infeasible
    /// intent, unbindable roles) come back as `Ok(Clarification)`; only parse
    /// and render failures surface as errors, matching the error taxonomy of
    /// the service boundary.
    pub async fn run(
        &self,
        bytes: &[u8],
        filename: &str,
        query: &str,
        classifier: Option<&dyn IntentClassifier>,
        renderer: &dyn Renderer,
    ) -> Result<EngineResult> {
        debug!(stage = %Stage::Received, filename, query, "request accepted");
        let (table, profiles) = self.profile(bytes, filename)?;
        debug!(
            stage = %Stage::Profiled,
            rows = table.rows(),
            columns = table.columns(),
            "table profiled"
        );

        let report = self.check_quality(&profiles);
        debug!(stage = %Stage::QualityChecked, blocking = report.blocking, "quality gate done");
        if report.blocking {
            info!(stage = %Stage::ClarificationReady, "quality gate blocked the request");
            return Ok(compose::compose_quality_clarification(&report, &profiles));
        }

        let resolution = match self.resolve_intent(query, &profiles, classifier).await {
            Ok(resolution) => resolution,
            Err(error) => {
                info!(stage = %Stage::ClarificationReady, %error, "intent unresolved");
                return Ok(compose::compose_intent_clarification(
                    &error, &profiles, &report,
                ));
            }
        };
        debug!(
            stage = %Stage::IntentResolved,
            kind = %resolution.kind,
            used_classifier = resolution.used_classifier,
            "intent resolved"
        );

        let hints = extract_column_hints(query, &profiles);
        let binding = match self.bind_roles(resolution.kind, &profiles, &hints) {
            Ok(binding) => binding,
            Err(error) => {
                info!(stage = %Stage::ClarificationReady, %error, "roles unbindable");
                return Ok(compose::compose_binding_clarification(
                    &error, &profiles, &report,
                ));
            }
        };
        debug!(stage = %Stage::RoleBound, "roles bound");

        let image = render_with_timeout(
            renderer,
            resolution.kind,
            &binding,
            &table,
            Duration::from_secs(self.config.render_timeout_secs),
        )
        .await
        .map_err(EngineError::Render)?;
        info!(stage = %Stage::Rendered, kind = %resolution.kind, "chart rendered");

        Ok(compose::compose_rendered(
            resolution.kind,
            binding,
            image,
            &table,
            &profiles,
            &report,
        ))
    }
}

impl Default for ChartEngine {
    fn default() -> Self {
        Self::new()
    }
}
