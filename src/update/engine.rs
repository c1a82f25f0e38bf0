use tracing::trace;
use crate::backend::attribute::AttributeValue;
use crate::core::error::{Error, Result};
use crate::key::codec::{compose_extract_key, ttl_epoch_seconds, Resolved};
use crate::schema::collection::ExtractKey;
use crate::schema::key_path::{resolve_segments, KeyPath};
use crate::schema::registry::{Collection, IndexedPattern};
use crate::update::changes::{UpdateAction, UpdateSpec};

/// Index-attribute fragments implied by a partial update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedChanges {
    pub set: Vec<(String, AttributeValue)>,
    pub remove: Vec<String>,
}

impl DerivedChanges {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }
}

/// Recomputes derived index and TTL attributes from a change set alone
pub struct IndexUpdater<'a> {
    collection: &'a Collection,
    separator: &'a str,
}

impl<'a> IndexUpdater<'a> {
    pub fn new(collection: &'a Collection, separator: &'a str) -> Self {
        IndexUpdater { collection, separator }
    }

    pub fn derive(&self, spec: &UpdateSpec) -> Result<DerivedChanges> {
        self.reject_opaque_changes(spec)?;

        let mut derived = DerivedChanges::default();
        for pattern in &self.collection.patterns {
            self.derive_pattern(pattern, spec, &mut derived)?;
        }
        if let Some(ttl) = &self.collection.ttl {
            self.derive_ttl(ttl, spec, &mut derived)?;
        }

        trace!(
            collection = %self.collection.name(),
            set = derived.set.len(),
            remove = derived.remove.len(),
            "derived index changes"
        );
        Ok(derived)
    }

    /// ADD/APPEND/DELETE results depend on the stored value, so they may not
    /// reach anything a derived key reads.
    fn reject_opaque_changes(&self, spec: &UpdateSpec) -> Result<()> {
        for action in spec.actions().iter().filter(|a| !a.is_assignment()) {
            let path = action.path();
            if let Some(key) = self.collection.extract_keys().find(|k| k.touched_by(path) || k.nested_under(path)) {
                return Err(Error::update_spec(format!(
                    "Path '{}' feeds derived attribute '{}' of collection '{}' and can only be changed by set or remove",
                    path,
                    key.attribute_name,
                    self.collection.name()
                ))
                .with_path(path.to_string()));
            }
        }
        Ok(())
    }

    fn derive_pattern(&self, pattern: &IndexedPattern, spec: &UpdateSpec, derived: &mut DerivedChanges) -> Result<()> {
        let partition_touched = is_touched(&pattern.partition, spec);
        let sort_touched = pattern.sort.as_ref().is_some_and(|s| is_touched(s, spec));
        if !partition_touched && !sort_touched {
            return Ok(());
        }

        // Both sides are recomputed so the pair is written or removed together
        let partition = self.compose(&pattern.partition, spec)?;
        let sort = match &pattern.sort {
            Some(key) => match self.compose(key, spec)? {
                Some(value) => Some((key.attribute_name.as_str(), value)),
                None => {
                    derived.remove.push(pattern.partition.attribute_name.clone());
                    derived.remove.push(key.attribute_name.clone());
                    return Ok(());
                }
            },
            None => None,
        };

        match partition {
            Some(value) => derived
                .set
                .push((pattern.partition.attribute_name.clone(), AttributeValue::S(value))),
            None => derived.remove.push(pattern.partition.attribute_name.clone()),
        }
        if let Some((attribute, value)) = sort {
            derived.set.push((attribute.to_string(), AttributeValue::S(value)));
        }
        Ok(())
    }

    fn derive_ttl(&self, ttl: &ExtractKey, spec: &UpdateSpec, derived: &mut DerivedChanges) -> Result<()> {
        if !is_touched(ttl, spec) {
            return Ok(());
        }
        let path = &ttl.value_paths[0];
        let value = match resolve_from(spec, path) {
            Resolved::Value(v) => Some(v),
            Resolved::Absent | Resolved::Unresolved => None,
        };
        match ttl_epoch_seconds(self.collection.name(), path, value)? {
            Some(seconds) => derived
                .set
                .push((ttl.attribute_name.clone(), AttributeValue::number(seconds))),
            None => derived.remove.push(ttl.attribute_name.clone()),
        }
        Ok(())
    }

    fn compose(&self, key: &ExtractKey, spec: &UpdateSpec) -> Result<Option<String>> {
        compose_extract_key(self.collection.name(), key, self.separator, |path| resolve_from(spec, path))
    }
}

fn is_touched(key: &ExtractKey, spec: &UpdateSpec) -> bool {
    spec.actions()
        .iter()
        .filter(|a| a.is_assignment())
        .any(|a| key.touched_by(a.path()))
}

/// Value of `path` after the update, as far as the change set alone can tell
fn resolve_from<'s>(spec: &'s UpdateSpec, path: &KeyPath) -> Resolved<'s> {
    for action in spec.actions() {
        match action {
            UpdateAction::Set { path: changed, value } => {
                if let Some(suffix) = changed.suffix_of(path) {
                    return match resolve_segments(value, suffix) {
                        Some(v) => Resolved::Value(v),
                        None => Resolved::Absent,
                    };
                }
            }
            UpdateAction::Remove { path: changed } if changed.covers(path) => return Resolved::Absent,
            _ => {}
        }
    }
    Resolved::Unresolved
}

/// Convenience wrapper over `IndexUpdater::derive`
pub fn derive_index_changes(collection: &Collection, spec: &UpdateSpec, separator: &str) -> Result<DerivedChanges> {
    IndexUpdater::new(collection, separator).derive(spec)
}
