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
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use vizier::classifier::{ClassifierResult, IntentClassifier};
use vizier::error::RenderResult;
use vizier::{
    BindTarget, ChartEngine, ChartKind, ColumnProfile, EngineResult, ImageHandle, QualityIssue,
    Renderer, Role, RoleBinding, Table,
};

/// Renderer stand-in that produces a tiny payload and counts invocations, so
/// tests can assert that clarification paths never attempt to draw.
#[derive(Default)]
struct StubRenderer {
    calls: AtomicUsize,
}

#[async_trait]
impl Renderer for StubRenderer {
    async fn render(
        &self,
        _kind: ChartKind,
        _binding: &RoleBinding,
        _table: &Table,
    ) -> RenderResult<ImageHandle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ImageHandle::from_png_bytes(b"stub-png", 4, 4))
    }
}

struct SlowClassifier;

#[async_trait]
impl IntentClassifier for SlowClassifier {
    async fn classify(&self, _query: &str, _profiles: &[ColumnProfile]) -> ClassifierResult<String> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("heatmap".to_string())
    }
}

const SALES_CSV: &[u8] = b"region,sales\nA,10\nB,20\n";

#[tokio::test]
async fn bar_chart_query_renders_with_expected_bindings() {
    let engine = ChartEngine::new();
    let renderer = StubRenderer::default();
    let result = engine
        .run(
            SALES_CSV,
            "sales.csv",
            "Show me a bar chart comparing sales by region",
            None,
            &renderer,
        )
        .await
        .expect("pipeline");
    match result {
        EngineResult::Rendered(rendered) => {
            assert_eq!(rendered.chart, ChartKind::Bar);
            assert_eq!(rendered.bindings.column(Role::Category), Some("region"));
            assert_eq!(rendered.bindings.column(Role::Value), Some("sales"));
            assert_eq!(rendered.summary.rows, 2);
            assert_eq!(rendered.summary.columns, 2);
            assert!(rendered.data_warnings.is_empty());
        }
        EngineResult::Clarification(c) => panic!("expected a rendered chart, got: {}", c.message),
    }
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn bar_query_always_binds_both_roles_with_a_numeric_column() {
    // No categorical column at all; the category role degrades to row index
    // but both required roles still come back bound.
    let engine = ChartEngine::new();
    let renderer = StubRenderer::default();
    let result = engine
        .run(
            b"measurement\n5\n7\n9\n",
            "m.csv",
            "bar chart please",
            None,
            &renderer,
        )
        .await
        .expect("pipeline");
    match result {
        EngineResult::Rendered(rendered) => {
            assert_eq!(rendered.chart, ChartKind::Bar);
            assert_eq!(
                rendered.bindings.get(Role::Category),
                Some(&BindTarget::RowIndex)
            );
            assert_eq!(rendered.bindings.column(Role::Value), Some("measurement"));
        }
        EngineResult::Clarification(c) => panic!("expected a rendered chart, got: {}", c.message),
    }
}

#[tokio::test]
async fn constant_table_blocks_regardless_of_query() {
    let engine = ChartEngine::new();
    let renderer = StubRenderer::default();
    for query in ["show me a line chart", "bar chart", "anything at all"] {
        let result = engine
            .run(
                b"a,b\n1,x\n1,x\n1,x\n",
                "constant.csv",
                query,
                None,
                &renderer,
            )
            .await
            .expect("pipeline");
        match result {
            EngineResult::Clarification(c) => {
                assert!(c.issues.contains(&QualityIssue::AllColumnsConstant));
            }
            EngineResult::Rendered(_) => panic!("constant table must not render"),
        }
    }
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn all_null_column_yields_clarification_without_rendering() {
    // A single column whose every cell is null.
    let engine = ChartEngine::new();
    let renderer = StubRenderer::default();
    let result = engine
        .run(b"only,pad\n,1\n,1\n,1\n", "nulls.csv", "plot this", None, &renderer)
        .await
        .expect("pipeline");
    match result {
        EngineResult::Clarification(c) => {
            assert!(c
                .issues
                .iter()
                .any(|i| matches!(i, QualityIssue::AllNullColumn { column } if column == "only")));
            assert!(!c.suggestions.is_empty());
        }
        EngineResult::Rendered(_) => panic!("expected a clarification"),
    }
}

#[tokio::test]
async fn gibberish_falls_back_to_bar_on_a_feasible_table() {
    let engine = ChartEngine::new();
    let renderer = StubRenderer::default();
    let result = engine
        .run(SALES_CSV, "sales.csv", "asdlkj random text", None, &renderer)
        .await
        .expect("pipeline");
    match result {
        EngineResult::Rendered(rendered) => assert_eq!(rendered.chart, ChartKind::Bar),
        EngineResult::Clarification(c) => panic!("expected default bar chart, got: {}", c.message),
    }
}

#[tokio::test(start_paused = true)]
async fn classifier_timeout_is_not_fatal() {
    let engine = ChartEngine::new();
    let renderer = StubRenderer::default();
    let classifier = SlowClassifier;
    let result = engine
        .run(
            SALES_CSV,
            "sales.csv",
            "asdlkj random text",
            Some(&classifier),
            &renderer,
        )
        .await
        .expect("pipeline must not fail on classifier timeout");
    match result {
        EngineResult::Rendered(rendered) => assert_eq!(rendered.chart, ChartKind::Bar),
        EngineResult::Clarification(c) => panic!("expected fallback bar chart, got: {}", c.message),
    }
}

#[tokio::test]
async fn scatter_requests_bind_the_two_numeric_columns() {
    let engine = ChartEngine::new();
    let renderer = StubRenderer::default();
    let result = engine
        .run(
            b"width,height,label\n1,2,a\n3,4,b\n5,9,c\n",
            "dims.csv",
            "scatter of width against height",
            None,
            &renderer,
        )
        .await
        .expect("pipeline");
    match result {
        EngineResult::Rendered(rendered) => {
            assert_eq!(rendered.chart, ChartKind::Scatter);
            assert_eq!(rendered.bindings.column(Role::X), Some("width"));
            assert_eq!(rendered.bindings.column(Role::Y), Some("height"));
        }
        EngineResult::Clarification(c) => panic!("expected a scatter plot, got: {}", c.message),
    }
}

#[tokio::test]
async fn sparse_column_surfaces_as_warning_on_success() {
    let engine = ChartEngine::new();
    let renderer = StubRenderer::default();
    let result = engine
        .run(
            b"region,sales,extra\nA,10,\nB,20,\nC,30,\nD,40,1\n",
            "sparse.csv",
            "bar chart of sales by region",
            None,
            &renderer,
        )
        .await
        .expect("pipeline");
    match result {
        EngineResult::Rendered(rendered) => {
            assert!(rendered
                .data_warnings
                .iter()
                .any(|i| matches!(i, QualityIssue::TooManyMissing { column, .. } if column == "extra")));
        }
        EngineResult::Clarification(c) => panic!("expected a rendered chart, got: {}", c.message),
    }
}

#[tokio::test]
async fn unsupported_extension_is_a_parse_error() {
    let engine = ChartEngine::new();
    let renderer = StubRenderer::default();
    let error = engine
        .run(b"not a table", "report.docx", "bar chart", None, &renderer)
        .await
        .unwrap_err();
    assert_eq!(error.category(), "Parse");
}
