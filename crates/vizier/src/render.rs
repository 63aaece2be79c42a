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
use crate::error::{RenderError, RenderResult};
use crate::ingest::Table;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

/// A finished chart image, carried inline as base64 so the transport layer
/// stays a thin shell.
#[derive(Debug, Clone, Serialize)]
pub struct ImageHandle {
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub data_base64: String,
}

impl ImageHandle {
    pub fn from_png_bytes(bytes: &[u8], width: u32, height: u32) -> Self {
        Self {
            format: "png".to_string(),
            width,
            height,
            data_base64: STANDARD.encode(bytes),
        }
    }
}

/// External collaborator that turns a bound chart into an image. The engine
/// depends only on this interface; drawing primitives live elsewhere.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        kind: ChartKind,
        binding: &RoleBinding,
        table: &Table,
    ) -> RenderResult<ImageHandle>;
}

/// Invoke the renderer under the configured budget, surfacing a timeout as
/// [`RenderError::Timeout`] rather than hanging the request.
pub async fn render_with_timeout(
    renderer: &dyn Renderer,
    kind: ChartKind,
    binding: &RoleBinding,
    table: &Table,
    budget: Duration,
) -> RenderResult<ImageHandle> {
    match tokio::time::timeout(budget, renderer.render(kind, binding, table)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(%kind, budget_secs = budget.as_secs(), "renderer exceeded its budget");
            Err(RenderError::Timeout {
                seconds: budget.as_secs(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowRenderer;

    #[async_trait]
    impl Renderer for SlowRenderer {
        async fn render(
            &self,
            _kind: ChartKind,
            _binding: &RoleBinding,
            _table: &Table,
        ) -> RenderResult<ImageHandle> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ImageHandle::from_png_bytes(b"png", 1, 1))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_renderers_surface_a_timeout() {
        let table = crate::ingest::decode(b"a\n1\n", "t.csv").expect("decode");
        let binding = RoleBinding::default();
        let result = render_with_timeout(
            &SlowRenderer,
            ChartKind::Bar,
            &binding,
            &table,
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(RenderError::Timeout { seconds: 1 })));
    }
}
