//! Manifest rewriting

use serde_yaml::{Mapping, Value};

use crate::errors::BotError;

/// Result of rewriting a manifest's image tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestUpdate {
    /// New manifest bytes with only `image.tag` changed
    Updated(Vec<u8>),

    /// `image.tag` already has the requested value; nothing to commit
    AlreadySet,
}

/// Set `image.tag` to `new_tag`.
///
/// Key order and every other value survive the rewrite; comments and
/// quoting style do not, since the document goes through `serde_yaml::Value`.
pub fn prepare_update(current: &[u8], new_tag: &str) -> Result<ManifestUpdate, BotError> {
    let mut document: Value = serde_yaml::from_slice(current)
        .map_err(|e| BotError::ManifestError(format!("manifest is not valid YAML: {}", e)))?;

    let image = document
        .as_mapping_mut()
        .and_then(|root| root.get_mut("image"))
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| BotError::ManifestError("manifest has no `image` section".to_string()))?;

    if current_tag(image).as_deref() == Some(new_tag) {
        return Ok(ManifestUpdate::AlreadySet);
    }

    image.insert(Value::from("tag"), Value::from(new_tag));
    let rendered = serde_yaml::to_string(&document)?;
    Ok(ManifestUpdate::Updated(rendered.into_bytes()))
}

fn current_tag(image: &Mapping) -> Option<String> {
    match image.get("tag")? {
        Value::String(tag) => Some(tag.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
