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

use serde::Deserialize;

/// Service settings, read from an optional `config/vizier-server` file with
/// `VIZIER__`-prefixed environment overrides on top.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_addr: String,
    /// Optional YAML file overriding the built-in engine defaults.
    pub engine_config_path: Option<String>,
    pub max_upload_bytes: usize,
    pub chart_width: u32,
    pub chart_height: u32,
    pub classifier: ClassifierSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8088".to_string(),
            engine_config_path: None,
            max_upload_bytes: 10 * 1024 * 1024,
            chart_width: 1000,
            chart_height: 700,
            classifier: ClassifierSettings::default(),
        }
    }
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "http://localhost:11434".to_string(),
            model: "llama2".to_string(),
            timeout_secs: 5,
        }
    }
}

impl Settings {
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/vizier-server").required(false))
            .add_source(config::Environment::with_prefix("VIZIER").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enforce_the_upload_ceiling() {
        let settings = Settings::default();
        assert_eq!(settings.max_upload_bytes, 10 * 1024 * 1024);
        assert!(!settings.classifier.enabled);
    }
}
