//! Loading the renderer registry from disk.

use std::path::Path;

use tracing::info;

use super::error::InfraError;
use crate::domain::registry::RendererRegistry;

/// Read and validate the registry file at `path`.
pub async fn load_registry(path: &Path) -> Result<RendererRegistry, InfraError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| InfraError::RegistryRead {
            path: path.to_path_buf(),
            source,
        })?;

    let registry =
        RendererRegistry::from_json_str(&raw).map_err(|source| InfraError::RegistryInvalid {
            path: path.to_path_buf(),
            source,
        })?;

    info!(
        target = "pressroom::registry",
        path = %path.display(),
        renderers = registry.len(),
        "renderer registry loaded"
    );
    Ok(registry)
}
