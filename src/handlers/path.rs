//! Turn a request path into an entity name and optional id, and gate it on the entity's permissions.

use crate::config::{Catalog, EntityBundle, Operation};
use crate::error::AppError;
use crate::service::parse_id;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourcePath {
    pub entity: String,
    /// Canonical (hyphenated, lower-case) uuid when present.
    pub id: Option<String>,
}

fn read_path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z-]+/?[0-9a-z-]*$").unwrap_or_else(|e| panic!("read path pattern: {e}")))
}

fn segments(raw: &str) -> Vec<&str> {
    let raw = raw.strip_prefix('/').unwrap_or(raw);
    let mut parts: Vec<&str> = raw.split('/').collect();
    if parts.len() > 1 && parts.last() == Some(&"") {
        parts.pop();
    }
    parts
}

fn build(catalog: &Catalog, entity: String, id: Option<&str>) -> Result<ResourcePath, AppError> {
    let id = id.map(|s| parse_id(s).map(|u| u.to_string())).transpose()?;
    catalog.entity(&entity)?;
    Ok(ResourcePath { entity, id })
}

/// `<entity>` or `<entity>/<id>`; hyphens in the entity segment become underscores.
pub fn parse_read_path(raw: &str, catalog: &Catalog) -> Result<ResourcePath, AppError> {
    let raw = raw.strip_prefix('/').unwrap_or(raw);
    if !read_path_pattern().is_match(raw) {
        return Err(AppError::InvalidArgument(format!("invalid path '{}'", raw)));
    }
    let parts = segments(raw);
    let entity = parts[0].replace('-', "_");
    build(catalog, entity, parts.get(1).copied())
}

/// Write paths skip the pattern check: exactly `<entity>` for create, `<entity>/<id>` otherwise.
/// Hyphens in the entity segment become underscores, as on reads.
pub fn parse_write_path(raw: &str, catalog: &Catalog, with_id: bool) -> Result<ResourcePath, AppError> {
    let parts = segments(raw);
    match (with_id, parts.as_slice()) {
        (false, [entity]) if !entity.is_empty() => build(catalog, entity.replace('-', "_"), None),
        (true, [entity, id]) if !entity.is_empty() => build(catalog, entity.replace('-', "_"), Some(*id)),
        _ => Err(AppError::NotFound(format!("no route for '{}'", raw))),
    }
}

/// The entity bundle, if `op` is enabled for it.
pub fn authorize<'a>(catalog: &'a Catalog, path: &ResourcePath, op: Operation) -> Result<&'a EntityBundle, AppError> {
    let bundle = catalog.entity(&path.entity)?;
    if !bundle.permissions.allows(op) {
        return Err(AppError::OperationNotPermitted(format!(
            "{} is not permitted on {}",
            op.as_str(),
            path.entity
        )));
    }
    Ok(bundle)
}
