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

use crate::chart::{ChartKind, Role};
use thiserror::Error;

/// Failures while turning raw upload bytes into a typed table.
///
/// Always surfaced to the caller as-is; never retried and never converted
/// into a clarification.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("unsupported file extension '{extension}' (expected csv, xls or xlsx)")]
    UnsupportedExtension { extension: String },
    #[error("could not decode '{source_name}': {reason}")]
    Decode { source_name: String, reason: String },
    #[error("the file contains no data rows")]
    EmptyTable,
    #[error("the file contains no columns")]
    NoColumns,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("dataframe error: {0}")]
    Frame(#[from] polars::error::PolarsError),
    #[error("spreadsheet error: {reason}")]
    Spreadsheet { reason: String },
}

/// Recoverable intent failures. Both variants are resolved into a
/// `Clarification` result, never bubbled to the transport layer.
#[derive(Error, Debug)]
pub enum IntentError {
    #[error("no chart family is feasible for this request")]
    Ambiguous { candidates: Vec<ChartKind> },
    #[error("{message}")]
    Unclear { message: String },
}

/// Recoverable binding failure, resolved into a `Clarification`.
#[derive(Error, Debug)]
pub enum BindError {
    #[error("no compatible column for the '{role}' role of a {kind} chart")]
    UnbindableRole { kind: ChartKind, role: Role },
}

/// External-collaborator failure. Distinct from a clarification: the
/// engine's own decision succeeded, drawing it did not.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("renderer failed: {reason}")]
    Failed { reason: String },
    #[error("rendering exceeded the {seconds}s budget")]
    Timeout { seconds: u64 },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration file '{path}': {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML configuration: {source}")]
    Yaml {
        #[from]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {field} = {value}")]
    OutOfRange { field: String, value: String },
    #[error("intent lexicon is empty")]
    EmptyLexicon,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("render error: {0}")]
    Render(#[from] RenderError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
pub type ParseResult<T> = std::result::Result<T, ParseError>;
pub type IntentResult<T> = std::result::Result<T, IntentError>;
pub type BindResult<T> = std::result::Result<T, BindError>;
pub type RenderResult<T> = std::result::Result<T, RenderError>;

impl EngineError {
    pub fn category(&self) -> &'static str {
        match self {
            EngineError::Parse(_) => "Parse",
            EngineError::Render(_) => "Render",
            EngineError::Config(_) => "Configuration",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            EngineError::Parse(ParseError::EmptyTable) => {
                "The uploaded file appears to be empty. Please provide data with at least one row."
                    .to_string()
            }
            EngineError::Parse(ParseError::UnsupportedExtension { extension }) => format!(
                "Files with the '.{extension}' extension are not supported. Upload a CSV or Excel file."
            ),
            EngineError::Render(RenderError::Timeout { .. }) => {
                "The chart took too long to draw. Try a smaller dataset or a simpler chart."
                    .to_string()
            }
            _ => self.to_string(),
        }
    }
}
