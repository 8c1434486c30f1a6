//! Fact bundle loading (JSON or YAML, picked by file extension)

use std::collections::HashSet;
use std::path::Path;

use monosplit_core::{FactBundle, IngestionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleFormat {
    Json,
    Yaml,
}

impl BundleFormat {
    pub fn from_path(path: &Path) -> Result<Self, IngestionError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => Ok(BundleFormat::Json),
            Some("yaml" | "yml") => Ok(BundleFormat::Yaml),
            _ => Err(IngestionError::invalid(
                path.display().to_string(),
                "expected a .json, .yaml or .yml fact bundle",
            )),
        }
    }
}

/// Read, parse and validate a fact bundle.
pub fn load_bundle(path: &Path) -> Result<FactBundle, IngestionError> {
    let artifact = path.display().to_string();
    let format = BundleFormat::from_path(path)?;
    if !path.exists() {
        return Err(IngestionError::Missing { artifact });
    }
    let content = std::fs::read_to_string(path).map_err(|source| IngestionError::Io {
        artifact: artifact.clone(),
        source,
    })?;

    let bundle = parse_bundle(&content, format, &artifact)?;
    validate_bundle(&bundle)?;
    tracing::info!(
        "Loaded {}: {} modules, {} observations, {} routes",
        artifact,
        bundle.modules.len(),
        bundle.observations.len(),
        bundle.routes.len()
    );
    Ok(bundle)
}

pub fn parse_bundle(content: &str, format: BundleFormat, artifact: &str) -> Result<FactBundle, IngestionError> {
    let parsed = match format {
        BundleFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        BundleFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
    };
    parsed.map_err(|reason| IngestionError::Parse {
        artifact: artifact.to_string(),
        reason,
    })
}

/// Reject records with blank identifiers.
///
/// Duplicate module ids are tolerated; the catalog keeps the first
/// declaration of each entity.
pub fn validate_bundle(bundle: &FactBundle) -> Result<(), IngestionError> {
    let mut seen = HashSet::new();
    for (i, module) in bundle.modules.iter().enumerate() {
        if module.module_id.trim().is_empty() {
            return Err(IngestionError::invalid(
                "module analysis",
                format!("entry {} has an empty moduleId", i),
            ));
        }
        if !seen.insert(module.module_id.as_str()) {
            tracing::warn!("Module {} analyzed more than once", module.module_id);
        }
        if let Some(blank) = module.defined_entities.iter().position(|d| d.name.trim().is_empty()) {
            return Err(IngestionError::invalid(
                "module analysis",
                format!("{} declares an unnamed entity at {}", module.module_id, blank),
            ));
        }
    }

    for (i, obs) in bundle.observations.iter().enumerate() {
        if obs.view_id.trim().is_empty() || obs.table_id.trim().is_empty() {
            return Err(IngestionError::invalid(
                "usage observation",
                format!("entry {} needs both viewId and tableId", i),
            ));
        }
    }

    for route in &bundle.routes {
        if route.handler_id.trim().is_empty() {
            return Err(IngestionError::invalid(
                "route table",
                format!("route {} has no handlerId", route.route_name),
            ));
        }
    }
    Ok(())
}
