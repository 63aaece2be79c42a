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

use async_trait::async_trait;
use serde_json::json;
use vizier::classifier::ClassifierResult;
use vizier::error::RenderResult;
use vizier::{
    ChartEngine, ChartKind, EngineResult, ImageHandle, IntentClassifier, OllamaClassifier,
    Renderer, RoleBinding, Table,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct StubRenderer;

#[async_trait]
impl Renderer for StubRenderer {
    async fn render(
        &self,
        _kind: ChartKind,
        _binding: &RoleBinding,
        _table: &Table,
    ) -> RenderResult<ImageHandle> {
        Ok(ImageHandle::from_png_bytes(b"stub-png", 4, 4))
    }
}

const TREND_CSV: &[u8] = b"day,visits\n2024-01-01,5\n2024-01-02,9\n2024-01-03,7\n";

#[tokio::test]
async fn classifier_label_steers_ambiguous_queries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "line_chart",
            "done": true,
        })))
        .mount(&server)
        .await;
    let classifier =
        OllamaClassifier::new(server.uri(), "test-model".to_string(), 5).expect("classifier");
    let engine = ChartEngine::new();
    // Zero lexicon score, so stage two consults the classifier.
    let result = engine
        .run(
            TREND_CSV,
            "visits.csv",
            "how are visits doing lately",
            Some(&classifier as &dyn IntentClassifier),
            &StubRenderer,
        )
        .await
        .expect("pipeline");
    match result {
        EngineResult::Rendered(rendered) => assert_eq!(rendered.chart, ChartKind::Line),
        EngineResult::Clarification(c) => panic!("expected a line chart, got: {}", c.message),
    }
}

#[tokio::test]
async fn classifier_server_error_falls_back_to_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let classifier =
        OllamaClassifier::new(server.uri(), "test-model".to_string(), 5).expect("classifier");
    let engine = ChartEngine::new();
    let result = engine
        .run(
            TREND_CSV,
            "visits.csv",
            "how are visits doing lately",
            Some(&classifier as &dyn IntentClassifier),
            &StubRenderer,
        )
        .await
        .expect("classifier failure is a fallback, not an error");
    match result {
        EngineResult::Rendered(rendered) => assert_eq!(rendered.chart, ChartKind::Bar),
        EngineResult::Clarification(c) => panic!("expected fallback bar chart, got: {}", c.message),
    }
}

#[tokio::test]
async fn classifier_nonsense_label_falls_back_to_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "a mosaic diorama",
        })))
        .mount(&server)
        .await;
    let classifier =
        OllamaClassifier::new(server.uri(), "test-model".to_string(), 5).expect("classifier");
    let engine = ChartEngine::new();
    let result = engine
        .run(
            TREND_CSV,
            "visits.csv",
            "how are visits doing lately",
            Some(&classifier as &dyn IntentClassifier),
            &StubRenderer,
        )
        .await
        .expect("pipeline");
    match result {
        EngineResult::Rendered(rendered) => assert_eq!(rendered.chart, ChartKind::Bar),
        EngineResult::Clarification(c) => panic!("expected fallback bar chart, got: {}", c.message),
    }
}
