use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::key::codec::separates_cleanly;
use crate::schema::collection::{AccessPattern, CollectionDefinition, CollectionKind, ExtractKey, KeyOptions, KeyRole};
use crate::schema::key_path::KeyPath;
use crate::schema::layout::TableLayout;

/// Secondary-index keys derived from one access pattern
#[derive(Debug, Clone)]
pub struct IndexedPattern {
    pub index_name: String,
    pub partition: ExtractKey,
    pub sort: Option<ExtractKey>,  // Present whenever the index declares a sort attribute
}

impl IndexedPattern {
    pub fn options(&self) -> &KeyOptions {
        &self.partition.options
    }
}

#[derive(Debug, Clone)]
pub struct ParentLink {
    pub collection_name: String,
    pub foreign_key: KeyPath,
}

/// Validated collection with all derived keys precomputed
#[derive(Debug, Clone)]
pub struct Collection {
    pub definition: CollectionDefinition,
    pub patterns: Vec<IndexedPattern>,
    pub ttl: Option<ExtractKey>,
    pub parent: Option<ParentLink>,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn layout(&self) -> &TableLayout {
        &self.definition.layout
    }

    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    pub fn pattern(&self, index_name: &str) -> Option<&IndexedPattern> {
        self.patterns.iter().find(|p| p.index_name == index_name)
    }

    /// Every derived key in declaration order: pattern pairs, then TTL
    pub fn extract_keys(&self) -> impl Iterator<Item = &ExtractKey> {
        self.patterns
            .iter()
            .flat_map(|p| std::iter::once(&p.partition).chain(p.sort.iter()))
            .chain(self.ttl.iter())
    }
}

/// Read-only collection registry, built once and shared behind an `Arc`
#[derive(Debug)]
pub struct Registry {
    collections: HashMap<String, Arc<Collection>>,
    separator: String,
}

impl Registry {
    pub fn new(definitions: Vec<CollectionDefinition>, config: &Config) -> Result<Self> {
        if config.separator.is_empty() {
            return Err(Error::configuration("Key separator must not be empty"));
        }

        let mut by_name: HashMap<String, CollectionDefinition> = HashMap::new();
        for definition in definitions {
            validate_name(&definition.name, &config.separator)?;
            if by_name.contains_key(&definition.name) {
                return Err(Error::configuration(format!(
                    "Duplicate collection name '{}'",
                    definition.name
                )));
            }
            by_name.insert(definition.name.clone(), definition);
        }

        let mut collections = HashMap::with_capacity(by_name.len());
        for definition in by_name.values() {
            let collection = resolve_collection(definition, &by_name)?;
            debug!(
                collection = %definition.name,
                patterns = collection.patterns.len(),
                child = collection.is_child(),
                "registered collection"
            );
            collections.insert(definition.name.clone(), Arc::new(collection));
        }

        Ok(Registry {
            collections,
            separator: config.separator.clone(),
        })
    }

    pub fn get(&self, name: &str) -> Result<&Arc<Collection>> {
        self.collections
            .get(name)
            .ok_or_else(|| Error::routing(format!("Unknown collection '{}'", name)))
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    pub fn children_of<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a Arc<Collection>> + 'a {
        self.collections.values().filter(move |c| {
            c.parent.as_ref().is_some_and(|link| link.collection_name == parent)
        })
    }
}

fn validate_name(name: &str, separator: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::configuration("Collection name must not be empty"));
    }
    if !separates_cleanly(name, separator) {
        return Err(Error::configuration(format!(
            "Collection name '{}' overlaps the key separator '{}'",
            name, separator
        )));
    }
    Ok(())
}

fn parse_path(collection: &str, raw: &str) -> Result<KeyPath> {
    KeyPath::parse(raw).map_err(|_| {
        Error::configuration(format!(
            "Collection '{}' declares invalid key path '{}'",
            collection, raw
        ))
    })
}

fn parse_paths(collection: &str, raw: &[String]) -> Result<Vec<KeyPath>> {
    raw.iter().map(|p| parse_path(collection, p)).collect()
}

fn resolve_collection(
    definition: &CollectionDefinition,
    all: &HashMap<String, CollectionDefinition>,
) -> Result<Collection> {
    let layout = &definition.layout;

    let mut declared = HashSet::new();
    for index in &layout.indexes {
        if !declared.insert(index.index_name.as_str()) {
            return Err(Error::configuration(format!(
                "Table '{}' declares index '{}' twice",
                layout.table_name, index.index_name
            )));
        }
    }

    let mut used = HashSet::new();
    let mut patterns = Vec::with_capacity(definition.access_patterns.len());
    for pattern in &definition.access_patterns {
        if !used.insert(pattern.index_name.as_str()) {
            return Err(Error::configuration(format!(
                "Collection '{}' references index '{}' from more than one access pattern",
                definition.name, pattern.index_name
            )));
        }
        patterns.push(resolve_pattern(definition, pattern)?);
    }

    let ttl = match &definition.ttl_key_path {
        None => None,
        Some(raw) => {
            let attribute_name = layout.ttl_attribute.clone().ok_or_else(|| {
                Error::configuration(format!(
                    "Collection '{}' sets a TTL key path but table '{}' has no TTL attribute",
                    definition.name, layout.table_name
                ))
            })?;
            Some(ExtractKey {
                role: KeyRole::Ttl,
                attribute_name,
                value_paths: vec![parse_path(&definition.name, raw)?],
                options: Arc::new(KeyOptions::default()),
            })
        }
    };

    let parent = match &definition.kind {
        CollectionKind::Root => None,
        CollectionKind::Child { parent_collection_name, foreign_key_path } => {
            let parent = all.get(parent_collection_name).ok_or_else(|| {
                Error::configuration(format!(
                    "Collection '{}' names unknown parent '{}'",
                    definition.name, parent_collection_name
                ))
            })?;
            if parent.kind != CollectionKind::Root {
                return Err(Error::configuration(format!(
                    "Parent '{}' of collection '{}' must be a root collection",
                    parent_collection_name, definition.name
                )));
            }
            if !parent.layout.shares_primary_key(layout) {
                return Err(Error::configuration(format!(
                    "Collection '{}' and its parent '{}' use different table layouts",
                    definition.name, parent_collection_name
                )));
            }
            Some(ParentLink {
                collection_name: parent_collection_name.clone(),
                foreign_key: parse_path(&definition.name, foreign_key_path)?,
            })
        }
    };

    Ok(Collection {
        definition: definition.clone(),
        patterns,
        ttl,
        parent,
    })
}

fn resolve_pattern(definition: &CollectionDefinition, pattern: &AccessPattern) -> Result<IndexedPattern> {
    let index = definition.layout.index(&pattern.index_name).ok_or_else(|| {
        Error::configuration(format!(
            "Collection '{}' references undeclared index '{}'",
            definition.name, pattern.index_name
        ))
    })?;

    let partition_paths = parse_paths(&definition.name, &pattern.partition_key_paths)?;
    let sort_paths = match &pattern.sort_key_paths {
        Some(paths) => parse_paths(&definition.name, paths)?,
        None => Vec::new(),
    };

    if !sort_paths.is_empty() && index.sort_attribute.is_none() {
        return Err(Error::configuration(format!(
            "Collection '{}' declares sort key paths for index '{}' which has no sort attribute",
            definition.name, pattern.index_name
        )));
    }

    let required_paths = parse_paths(&definition.name, &pattern.options.required_paths)?;
    for required in &required_paths {
        if !partition_paths.contains(required) && !sort_paths.contains(required) {
            return Err(Error::configuration(format!(
                "Required path '{}' is not part of access pattern '{}' in collection '{}'",
                required, pattern.index_name, definition.name
            )));
        }
    }

    let options = Arc::new(KeyOptions {
        normalizer: pattern.options.normalizer.clone(),
        required_paths,
    });

    Ok(IndexedPattern {
        index_name: pattern.index_name.clone(),
        partition: ExtractKey {
            role: KeyRole::Partition,
            attribute_name: index.partition_attribute.clone(),
            value_paths: partition_paths,
            options: options.clone(),
        },
        sort: index.sort_attribute.as_ref().map(|attribute| ExtractKey {
            role: KeyRole::Sort,
            attribute_name: attribute.clone(),
            value_paths: sort_paths,
            options,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::schema::collection::AccessPattern;

    fn layout() -> TableLayout {
        TableLayout::new("main", "pk", "sk")
            .with_index("gsi1", "gsi1pk", Some("gsi1sk"))
            .with_index("gsi2", "gsi2pk", None)
            .with_ttl_attribute("expiresAt")
    }

    fn build(defs: Vec<CollectionDefinition>) -> Result<Registry> {
        Registry::new(defs, &Config::default())
    }

    #[test]
    fn derives_extract_keys() {
        let registry = build(vec![
            CollectionDefinition::root("users", layout())
                .with_access_pattern(AccessPattern::new("gsi1", &["email"]).with_sort_key_paths(&["name"]))
                .with_access_pattern(AccessPattern::new("gsi2", &["team"]))
                .with_ttl_key_path("expires"),
        ])
        .unwrap();

        let users = registry.get("users").unwrap();
        let keys: Vec<_> = users.extract_keys().map(|k| (k.role, k.attribute_name.as_str())).collect();
        assert_eq!(
            keys,
            vec![
                (KeyRole::Partition, "gsi1pk"),
                (KeyRole::Sort, "gsi1sk"),
                (KeyRole::Partition, "gsi2pk"),
                (KeyRole::Ttl, "expiresAt"),
            ]
        );
    }

    #[test]
    fn pattern_without_sort_paths_still_gets_sort_key_when_index_has_one() {
        let registry = build(vec![
            CollectionDefinition::root("users", layout()).with_access_pattern(AccessPattern::new("gsi1", &["email"])),
        ])
        .unwrap();
        let pattern = registry.get("users").unwrap().pattern("gsi1").unwrap().clone();
        assert!(pattern.sort.unwrap().value_paths.is_empty());
    }

    #[test]
    fn rejects_bad_wiring() {
        let cases = vec![
            vec![
                CollectionDefinition::root("users", layout()),
                CollectionDefinition::root("users", layout()),
            ],
            vec![CollectionDefinition::root("us|-|ers", layout())],
            vec![
                CollectionDefinition::root("post", layout()),
                CollectionDefinition::root("post|-", layout()),
            ],
            vec![CollectionDefinition::root("users", layout()).with_access_pattern(AccessPattern::new("nope", &["a"]))],
            vec![CollectionDefinition::root("users", layout())
                .with_access_pattern(AccessPattern::new("gsi1", &["a"]))
                .with_access_pattern(AccessPattern::new("gsi1", &["b"]))],
            vec![CollectionDefinition::root("users", layout())
                .with_access_pattern(AccessPattern::new("gsi2", &["a"]).with_sort_key_paths(&["b"]))],
            vec![CollectionDefinition::child("posts", layout(), "users", "userId")],
            vec![
                CollectionDefinition::root("users", layout()),
                CollectionDefinition::child("posts", TableLayout::new("other", "pk", "sk"), "users", "userId"),
            ],
            vec![CollectionDefinition::root("users", TableLayout::new("main", "pk", "sk")).with_ttl_key_path("exp")],
            vec![CollectionDefinition::root("users", layout())
                .with_access_pattern(AccessPattern::new("gsi1", &["a"]).with_required_paths(&["b"]))],
        ];

        for defs in cases {
            let names: Vec<_> = defs.iter().map(|d| d.name.clone()).collect();
            let err = build(defs).expect_err(&format!("accepted {:?}", names));
            assert_eq!(err.kind, ErrorKind::Configuration);
        }
    }

    #[test]
    fn child_links_to_parent() {
        let registry = build(vec![
            CollectionDefinition::root("users", layout()),
            CollectionDefinition::child("posts", layout(), "users", "userId"),
        ])
        .unwrap();

        let posts = registry.get("posts").unwrap();
        assert_eq!(posts.parent.as_ref().unwrap().collection_name, "users");
        assert_eq!(registry.children_of("users").count(), 1);
        assert_eq!(registry.get("missing").unwrap_err().kind, ErrorKind::Routing);
    }
}
