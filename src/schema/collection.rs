use std::fmt;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use crate::schema::key_path::KeyPath;
use crate::schema::layout::TableLayout;

/// String transform applied to indexed values before composition
#[derive(Clone)]
pub struct Normalizer(Arc<dyn Fn(&str) -> String + Send + Sync>);

impl Normalizer {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Normalizer(Arc::new(f))
    }

    pub fn lowercase() -> Self {
        Normalizer::new(|s| s.to_lowercase())
    }

    pub fn apply(&self, value: &str) -> String {
        (self.0)(value)
    }
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Normalizer(..)")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessPatternOptions {
    #[serde(skip)]
    pub normalizer: Option<Normalizer>,
    /// Paths that must resolve to a value on every write touching the pattern
    #[serde(default)]
    pub required_paths: Vec<String>,
}

/// Declared mapping from document paths to one secondary index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPattern {
    pub index_name: String,
    pub partition_key_paths: Vec<String>,
    #[serde(default)]
    pub sort_key_paths: Option<Vec<String>>,
    #[serde(default)]
    pub options: AccessPatternOptions,
}

impl AccessPattern {
    pub fn new(index_name: &str, partition_key_paths: &[&str]) -> Self {
        AccessPattern {
            index_name: index_name.to_string(),
            partition_key_paths: partition_key_paths.iter().map(|p| p.to_string()).collect(),
            sort_key_paths: None,
            options: AccessPatternOptions::default(),
        }
    }

    pub fn with_sort_key_paths(mut self, sort_key_paths: &[&str]) -> Self {
        self.sort_key_paths = Some(sort_key_paths.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.options.normalizer = Some(normalizer);
        self
    }

    pub fn with_required_paths(mut self, paths: &[&str]) -> Self {
        self.options.required_paths = paths.iter().map(|p| p.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollectionKind {
    Root,
    Child {
        parent_collection_name: String,
        foreign_key_path: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionDefinition {
    pub name: String,
    pub layout: TableLayout,
    #[serde(default)]
    pub access_patterns: Vec<AccessPattern>,
    #[serde(default)]
    pub ttl_key_path: Option<String>,
    pub kind: CollectionKind,
}

impl CollectionDefinition {
    pub fn root(name: &str, layout: TableLayout) -> Self {
        CollectionDefinition {
            name: name.to_string(),
            layout,
            access_patterns: Vec::new(),
            ttl_key_path: None,
            kind: CollectionKind::Root,
        }
    }

    pub fn child(name: &str, layout: TableLayout, parent_collection_name: &str, foreign_key_path: &str) -> Self {
        CollectionDefinition {
            name: name.to_string(),
            layout,
            access_patterns: Vec::new(),
            ttl_key_path: None,
            kind: CollectionKind::Child {
                parent_collection_name: parent_collection_name.to_string(),
                foreign_key_path: foreign_key_path.to_string(),
            },
        }
    }

    pub fn with_access_pattern(mut self, pattern: AccessPattern) -> Self {
        self.access_patterns.push(pattern);
        self
    }

    pub fn with_ttl_key_path(mut self, path: &str) -> Self {
        self.ttl_key_path = Some(path.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyRole {
    Partition,
    Sort,
    Ttl,
}

/// Parsed per-pattern options shared by the pattern's extract keys
#[derive(Debug, Clone, Default)]
pub struct KeyOptions {
    pub normalizer: Option<Normalizer>,
    pub required_paths: Vec<KeyPath>,
}

impl KeyOptions {
    pub fn is_required(&self, path: &KeyPath) -> bool {
        self.required_paths.iter().any(|p| p == path)
    }
}

/// How one derived attribute is computed from a document
#[derive(Debug, Clone)]
pub struct ExtractKey {
    pub role: KeyRole,
    pub attribute_name: String,
    pub value_paths: Vec<KeyPath>,
    pub options: Arc<KeyOptions>,
}

impl ExtractKey {
    /// True when a change at `changed` may alter this key's value
    pub fn touched_by(&self, changed: &KeyPath) -> bool {
        self.value_paths.iter().any(|p| changed.covers(p))
    }

    /// True when `changed` sits at or below one of the value paths
    pub fn nested_under(&self, changed: &KeyPath) -> bool {
        self.value_paths.iter().any(|p| p.covers(changed))
    }
}
