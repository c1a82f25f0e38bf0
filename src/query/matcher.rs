use crate::core::error::{Error, Result};
use crate::query::ast::FindQuery;
use crate::schema::registry::{Collection, IndexedPattern};

/// Access pattern selected for a query, with how many sort paths were given
#[derive(Debug, Clone, Copy)]
pub struct PatternMatch<'a> {
    pub pattern: &'a IndexedPattern,
    pub sort_prefix_len: usize,
}

/// Finds the access pattern whose key paths the query names exactly: every
/// partition path, a gap-free prefix of the sort paths, and nothing else.
pub struct PatternMatcher<'a> {
    collection: &'a Collection,
}

impl<'a> PatternMatcher<'a> {
    pub fn new(collection: &'a Collection) -> Self {
        PatternMatcher { collection }
    }

    pub fn find(&self, query: &FindQuery) -> Result<PatternMatch<'a>> {
        self.collection
            .patterns
            .iter()
            .find_map(|pattern| Self::matches(pattern, query))
            .ok_or_else(|| {
                let paths: Vec<String> = query.key_values.iter().map(|(p, _)| p.to_string()).collect();
                Error::routing(format!(
                    "No access pattern of collection '{}' matches key paths [{}]",
                    self.collection.name(),
                    paths.join(", ")
                ))
            })
    }

    fn matches(pattern: &'a IndexedPattern, query: &FindQuery) -> Option<PatternMatch<'a>> {
        let partition_paths = &pattern.partition.value_paths;
        if !partition_paths.iter().all(|p| query.value_at(p).is_some()) {
            return None;
        }

        let sort_paths = pattern.sort.as_ref().map(|s| s.value_paths.as_slice()).unwrap_or(&[]);
        let sort_prefix_len = sort_paths.iter().take_while(|p| query.value_at(p).is_some()).count();

        // Anything beyond partition + sort prefix is either extra or gapped
        if query.key_values.len() != partition_paths.len() + sort_prefix_len {
            return None;
        }

        Some(PatternMatch { pattern, sort_prefix_len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::error::ErrorKind;
    use crate::schema::collection::{AccessPattern, CollectionDefinition};
    use crate::schema::layout::TableLayout;
    use crate::schema::registry::Registry;

    fn registry() -> Registry {
        let layout = TableLayout::new("main", "pk", "sk")
            .with_index("gsi1", "gsi1pk", Some("gsi1sk"))
            .with_index("gsi2", "gsi2pk", None);
        Registry::new(
            vec![CollectionDefinition::root("user", layout)
                .with_access_pattern(AccessPattern::new("gsi1", &["team"]).with_sort_key_paths(&["role", "name"]))
                .with_access_pattern(AccessPattern::new("gsi2", &["email"]))],
            &Config::default(),
        )
        .unwrap()
    }

    fn query(pairs: &[(&str, &str)]) -> FindQuery {
        pairs
            .iter()
            .fold(FindQuery::new(), |q, (p, v)| q.where_eq(p, v).unwrap())
    }

    #[test]
    fn matches_exact_partition_and_sort_prefixes() {
        let registry = registry();
        let user = registry.get("user").unwrap();
        let matcher = PatternMatcher::new(user);

        let found = matcher.find(&query(&[("email", "a@x")])).unwrap();
        assert_eq!(found.pattern.index_name, "gsi2");

        let found = matcher.find(&query(&[("team", "core")])).unwrap();
        assert_eq!((found.pattern.index_name.as_str(), found.sort_prefix_len), ("gsi1", 0));

        let found = matcher.find(&query(&[("team", "core"), ("role", "admin")])).unwrap();
        assert_eq!(found.sort_prefix_len, 1);

        let found = matcher.find(&query(&[("name", "Ada"), ("role", "admin"), ("team", "core")])).unwrap();
        assert_eq!(found.sort_prefix_len, 2);
    }

    #[test]
    fn rejects_gaps_extras_and_missing_partitions() {
        let registry = registry();
        let user = registry.get("user").unwrap();
        let matcher = PatternMatcher::new(user);

        for pairs in [
            vec![("team", "core"), ("name", "Ada")],
            vec![("email", "a@x"), ("team", "core")],
            vec![("role", "admin")],
            vec![("email", "a@x"), ("extra", "1")],
        ] {
            let err = matcher.find(&query(&pairs)).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Routing, "{:?}", pairs);
        }
    }
}
