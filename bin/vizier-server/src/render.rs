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

use crate::data;
use crate::draw;
use async_trait::async_trait;
use tracing::debug;
use vizier::error::{RenderError, RenderResult};
use vizier::{ChartKind, ImageHandle, Renderer, RoleBinding, Table};

/// Plotters-backed implementation of the engine's renderer interface.
/// Extraction happens inline; the actual drawing is synchronous and runs on
/// the blocking pool.
#[derive(Debug, Clone)]
pub struct PlottersRenderer {
    width: u32,
    height: u32,
}

impl PlottersRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[async_trait]
impl Renderer for PlottersRenderer {
    async fn render(
        &self,
        kind: ChartKind,
        binding: &RoleBinding,
        table: &Table,
    ) -> RenderResult<ImageHandle> {
        let chart_data = data::extract(kind, binding, table)?;
        debug!(%kind, "chart data extracted, drawing");
        let (width, height) = (self.width, self.height);
        let handle = tokio::task::spawn_blocking(move || draw::draw(chart_data, width, height))
            .await
            .map_err(|e| RenderError::Failed {
                reason: format!("drawing task failed: {e}"),
            })??;
        Ok(handle)
    }
}
