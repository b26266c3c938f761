//! The on-disk route file.
//!
//! ```toml
//! default-filters = ["AddResponseHeader=X-Gateway, edge"]
//!
//! [[routes]]
//! id = "orders"
//! uri = "http://orders.internal:8080"
//! predicates = ["Path=/orders/**", "Method=GET,POST"]
//! filters = ["StripPrefix=1"]
//! order = 10
//! metadata = { team = "checkout" }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::events::KeyPattern;
use crate::reload::ReloadError;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read route file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse route file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Reload(#[from] ReloadError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RouteFile {
    #[serde(default)]
    pub default_filters: Vec<String>,

    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}

/// One `[[routes]]` table; predicates and filters use shortcut notation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteEntry {
    pub id: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub predicates: Vec<String>,
    #[serde(default)]
    pub filters: Vec<String>,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl RouteFile {
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, SourceError> {
        Ok(toml::from_str(content)?)
    }

    /// Flatten into the dotted property keys a config center would publish.
    /// Route slots follow file order.
    pub fn to_properties(&self, keys: &KeyPattern) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();

        for (i, filter) in self.default_filters.iter().enumerate() {
            props.insert(format!("{}default-filters[{}]", keys.prefix(), i), filter.clone());
        }

        for (slot, route) in self.routes.iter().enumerate() {
            props.insert(keys.route_key(slot, "id"), route.id.clone());
            if !route.uri.is_empty() {
                props.insert(keys.route_key(slot, "uri"), route.uri.clone());
            }
            if route.order != 0 {
                props.insert(keys.route_key(slot, "order"), route.order.to_string());
            }
            for (i, predicate) in route.predicates.iter().enumerate() {
                props.insert(keys.route_key(slot, &format!("predicates[{}]", i)), predicate.clone());
            }
            for (i, filter) in route.filters.iter().enumerate() {
                props.insert(keys.route_key(slot, &format!("filters[{}]", i)), filter.clone());
            }
            for (name, value) in &route.metadata {
                props.insert(keys.route_key(slot, &format!("metadata.{}", name)), value.clone());
            }
        }

        props
    }
}
