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

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;
use vizier::ChartEngine;
use vizier_server::http::{build_router, AppState};
use vizier_server::render::PlottersRenderer;
use vizier_server::settings::Settings;

fn test_router() -> axum::Router {
    let settings = Settings::default();
    let state = Arc::new(AppState {
        engine: ChartEngine::new(),
        renderer: PlottersRenderer::new(settings.chart_width, settings.chart_height),
        classifier: None,
        settings,
    });
    build_router(state)
}

fn multipart_request(file_name: &str, file_body: &str, query: &str) -> Request<Body> {
    let boundary = "vizier-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n\
         {file_body}\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"query\"\r\n\r\n\
         {query}\r\n\
         --{boundary}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/api/charts")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request")
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn health_reports_liveness_without_touching_the_engine() {
    let response = test_router()
        .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn rejects_extensions_outside_the_allow_list() {
    let response = test_router()
        .oneshot(multipart_request("report.pdf", "a,b\n1,2\n", "bar chart"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().expect("error").contains(".pdf"));
}

#[tokio::test]
async fn rejects_requests_without_a_query_field() {
    let boundary = "vizier-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"data.csv\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n\
         a,b\r\n1,2\r\n\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/charts")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request");
    let response = test_router().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"]
        .as_str()
        .expect("error")
        .contains("no query provided"));
}

#[tokio::test]
async fn clarification_outcomes_still_return_http_ok() {
    // Constant table: the engine answers with a clarification, not an error.
    let response = test_router()
        .oneshot(multipart_request(
            "constant.csv",
            "a,b\n1,x\n1,x\n1,x",
            "show me a line chart",
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["outcome"], "clarification");
    assert!(json["suggestions"].is_array());
}

#[tokio::test]
async fn suggestion_queries_bypass_intent_resolution() {
    let response = test_router()
        .oneshot(multipart_request(
            "sales.csv",
            "region,sales\nA,10\nB,20",
            "generate suggestions",
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    let suggestions = json["suggestions"].as_array().expect("suggestions");
    assert!(!suggestions.is_empty());
}
