// Copyright (c) 2026 Choreo Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Loads the agent-flow and skill bundles a workflow definition's
//! `af_imports`/`skill_imports` reference (§4.5). Only `file://` and
//! relative-path URIs are supported; remote bundle registries are out of
//! scope.

use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::domain::errors::ErrorKind;
use crate::domain::workflow::BundleImport;

#[derive(Debug, Error)]
pub enum BundleLoadError {
    #[error("unsupported bundle URI scheme: {0}")]
    UnsupportedScheme(String),
    #[error("failed to read bundle {uri}: {source}")]
    Io { uri: String, source: std::io::Error },
    #[error("failed to parse bundle {uri} as JSON: {source}")]
    Parse { uri: String, source: serde_json::Error },
}

impl BundleLoadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BundleLoadError::UnsupportedScheme(_) => ErrorKind::InvalidInput,
            BundleLoadError::Io { .. } => ErrorKind::UnresolvedReference,
            BundleLoadError::Parse { .. } => ErrorKind::SchemaError,
        }
    }
}

/// A loaded bundle manifest, keyed by its declared import name.
#[derive(Debug, Clone)]
pub struct LoadedBundle {
    pub name: String,
    pub manifest: Value,
}

pub struct BundleLoader {
    /// Directory `af_imports`/`skill_imports` relative URIs resolve against.
    base_dir: std::path::PathBuf,
}

impl BundleLoader {
    pub fn new(base_dir: impl Into<std::path::PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    pub async fn load(&self, import: &BundleImport) -> Result<LoadedBundle, BundleLoadError> {
        let path = self.resolve_path(&import.uri)?;
        let contents = tokio::fs::read_to_string(&path).await.map_err(|source| BundleLoadError::Io {
            uri: import.uri.clone(),
            source,
        })?;
        let manifest = serde_json::from_str(&contents).map_err(|source| BundleLoadError::Parse {
            uri: import.uri.clone(),
            source,
        })?;
        Ok(LoadedBundle {
            name: import.name.clone(),
            manifest,
        })
    }

    fn resolve_path(&self, uri: &str) -> Result<std::path::PathBuf, BundleLoadError> {
        if let Ok(url) = Url::parse(uri) {
            return match url.scheme() {
                "file" => url
                    .to_file_path()
                    .map_err(|_| BundleLoadError::UnsupportedScheme(uri.to_string())),
                other => Err(BundleLoadError::UnsupportedScheme(other.to_string())),
            };
        }
        Ok(self.base_dir.join(uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_remote_scheme() {
        let loader = BundleLoader::new(".");
        let import = BundleImport {
            name: "remote".into(),
            uri: "https://bundles.example.com/a.json".into(),
        };
        let err = loader.load(&import).await.unwrap_err();
        assert!(matches!(err, BundleLoadError::UnsupportedScheme(_)));
    }
}
