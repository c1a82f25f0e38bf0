use tracing::debug;
use crate::backend::attribute::AttributeValue;
use crate::backend::QueryRequest;
use crate::core::error::Result;
use crate::expression::compiler::compile_condition;
use crate::expression::mapper::ExpressionContext;
use crate::key::boundary::SortBounds;
use crate::key::codec::compose_indexed_value;
use crate::query::ast::{FindOptions, FindQuery};
use crate::query::matcher::PatternMatch;
use crate::schema::collection::ExtractKey;
use crate::schema::registry::Collection;

/// Condition on one partition value plus an optional sort restriction
#[derive(Debug, Clone, PartialEq)]
pub enum SortCondition {
    Equals(String),
    BeginsWith(String),
    Between(SortBounds),
}

/// Builds single-call query requests. Key, filter and paging placeholders
/// all come from one `ExpressionContext`.
pub struct QueryPlanner<'a> {
    collection: &'a Collection,
    separator: &'a str,
    max_in_values: usize,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(collection: &'a Collection, separator: &'a str, max_in_values: usize) -> Self {
        QueryPlanner {
            collection,
            separator,
            max_in_values,
        }
    }

    /// Secondary-index query for an exact access-pattern match
    pub fn plan_find(&self, found: &PatternMatch<'_>, query: &FindQuery) -> Result<QueryRequest> {
        let pattern = found.pattern;
        let partition = self.compose_from_query(&pattern.partition, query, pattern.partition.value_paths.len());

        let sort = match &pattern.sort {
            Some(key) if !key.value_paths.is_empty() && found.sort_prefix_len == key.value_paths.len() => self
                .compose_from_query(key, query, found.sort_prefix_len)
                .map(|(attribute, value)| (attribute, SortCondition::Equals(value))),
            Some(key) if found.sort_prefix_len > 0 => self
                .compose_from_query(key, query, found.sort_prefix_len)
                .map(|(attribute, value)| {
                    (attribute, SortCondition::BeginsWith(format!("{}{}", value, self.separator)))
                }),
            _ => None,
        };

        let (partition_attribute, partition_value) = match partition {
            Some(p) => p,
            None => (pattern.partition.attribute_name.clone(), self.collection.name().to_string()),
        };

        self.build(
            Some(pattern.index_name.clone()),
            (partition_attribute.as_str(), partition_value),
            sort.as_ref().map(|(a, c)| (a.as_str(), c)),
            &query.options,
            false,
        )
    }

    /// Primary-index query inside one partition
    pub fn plan_partition_range(
        &self,
        partition_value: String,
        bounds: SortBounds,
        options: &FindOptions,
        consistent_read: bool,
    ) -> Result<QueryRequest> {
        let primary = &self.collection.layout().primary_key;
        let sort = SortCondition::Between(bounds);
        self.build(
            None,
            (primary.partition_attribute.as_str(), partition_value),
            Some((primary.sort_attribute.as_str(), &sort)),
            options,
            consistent_read,
        )
    }

    /// `(attribute, composed value)` from the first `take` value paths,
    /// with the pattern's normalizer applied to every query value
    fn compose_from_query(&self, key: &ExtractKey, query: &FindQuery, take: usize) -> Option<(String, String)> {
        let values: Vec<Option<String>> = key.value_paths[..take]
            .iter()
            .map(|path| {
                query.value_at(path).map(|v| match &key.options.normalizer {
                    Some(n) => n.apply(v),
                    None => v.to_string(),
                })
            })
            .collect();
        let borrowed: Vec<Option<&str>> = values.iter().map(|v| v.as_deref()).collect();
        compose_indexed_value(key.role, self.collection.name(), &borrowed, self.separator)
            .map(|value| (key.attribute_name.clone(), value))
    }

    fn build(
        &self,
        index_name: Option<String>,
        partition: (&str, String),
        sort: Option<(&str, &SortCondition)>,
        options: &FindOptions,
        consistent_read: bool,
    ) -> Result<QueryRequest> {
        let mut context = ExpressionContext::new();

        let (partition_attribute, partition_value) = partition;
        let mut key_condition = format!(
            "{} = {}",
            context.names.map(partition_attribute),
            context.values.map(AttributeValue::S(partition_value))
        );

        if let Some((attribute, condition)) = sort {
            let name = context.names.map(attribute);
            let clause = match condition {
                SortCondition::Equals(value) => {
                    format!("{} = {}", name, context.values.map(AttributeValue::S(value.clone())))
                }
                SortCondition::BeginsWith(prefix) => {
                    format!("begins_with({}, {})", name, context.values.map(AttributeValue::S(prefix.clone())))
                }
                SortCondition::Between(bounds) => {
                    let lower = context.values.map(AttributeValue::S(bounds.lower.clone()));
                    let upper = context.values.map(AttributeValue::S(bounds.upper.clone()));
                    format!("{} BETWEEN {} AND {}", name, lower, upper)
                }
            };
            key_condition = format!("{} AND {}", key_condition, clause);
        }

        let filter_expression = match &options.filter {
            Some(filter) => Some(compile_condition(filter, &mut context, self.max_in_values)?),
            None => None,
        };

        debug!(
            collection = %self.collection.name(),
            index = index_name.as_deref().unwrap_or("primary"),
            key_condition = %key_condition,
            filter = filter_expression.as_deref().unwrap_or(""),
            "planned query"
        );

        Ok(QueryRequest {
            table_name: self.collection.layout().table_name.clone(),
            index_name,
            key_condition_expression: key_condition,
            filter_expression,
            attributes: context.into_attributes(),
            exclusive_start_key: options.start_key()?,
            limit: options.limit,
            scan_forward: options.direction.scan_forward(),
            consistent_read,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::core::config::Config;
    use crate::expression::ast::Condition;
    use crate::key::boundary::collection_range;
    use crate::query::ast::SortDirection;
    use crate::query::matcher::PatternMatcher;
    use crate::schema::collection::{AccessPattern, CollectionDefinition, Normalizer};
    use crate::schema::layout::TableLayout;
    use crate::schema::registry::Registry;

    const SEP: &str = "|-|";

    fn registry() -> Registry {
        let layout = TableLayout::new("main", "pk", "sk")
            .with_index("gsi1", "gsi1pk", Some("gsi1sk"))
            .with_index("gsi2", "gsi2pk", Some("gsi2sk"));
        Registry::new(
            vec![
                CollectionDefinition::root("user", layout.clone())
                    .with_access_pattern(AccessPattern::new("gsi1", &["team"]).with_sort_key_paths(&["role", "name"]))
                    .with_access_pattern(
                        AccessPattern::new("gsi2", &["email"]).with_normalizer(Normalizer::lowercase()),
                    ),
                CollectionDefinition::child("post", layout, "user", "userId"),
            ],
            &Config::default(),
        )
        .unwrap()
    }

    fn plan(pairs: &[(&str, &str)], options: FindOptions) -> QueryRequest {
        let registry = registry();
        let user = registry.get("user").unwrap();
        let query = pairs
            .iter()
            .fold(FindQuery::new(), |q, (p, v)| q.where_eq(p, v).unwrap())
            .with_options(options);
        let found = PatternMatcher::new(user).find(&query).unwrap();
        QueryPlanner::new(user, SEP, 100).plan_find(&found, &query).unwrap()
    }

    #[test]
    fn full_sort_key_is_an_equality() {
        let request = plan(&[("team", "core"), ("role", "admin"), ("name", "Ada")], FindOptions::new());
        assert_eq!(request.index_name.as_deref(), Some("gsi1"));
        assert_eq!(request.key_condition_expression, "gsi1pk = :value0 AND gsi1sk = :value1");
        assert_eq!(request.attributes.values[":value0"], AttributeValue::S("user|-|core".into()));
        assert_eq!(request.attributes.values[":value1"], AttributeValue::S("user|-|admin|-|Ada".into()));
        assert!(!request.consistent_read);
    }

    #[test]
    fn sort_prefix_becomes_begins_with() {
        let request = plan(&[("team", "core"), ("role", "admin")], FindOptions::new());
        assert_eq!(request.key_condition_expression, "gsi1pk = :value0 AND begins_with(gsi1sk, :value1)");
        assert_eq!(request.attributes.values[":value1"], AttributeValue::S("user|-|admin|-|".into()));
    }

    #[test]
    fn partition_only_and_normalized() {
        let request = plan(
            &[("email", "ADA@X.IO")],
            FindOptions::new().with_direction(SortDirection::Descending).with_limit(5),
        );
        assert_eq!(request.key_condition_expression, "gsi2pk = :value0");
        assert_eq!(request.attributes.values[":value0"], AttributeValue::S("user|-|ada@x.io".into()));
        assert!(!request.scan_forward);
        assert_eq!(request.limit, Some(5));
    }

    #[test]
    fn filter_shares_placeholders_with_key_condition() {
        let filter = Condition::from_json(&json!({"age": {"$gt": 21}})).unwrap();
        let request = plan(&[("team", "core")], FindOptions::new().with_filter(filter));
        assert_eq!(request.key_condition_expression, "gsi1pk = :value0");
        assert_eq!(request.filter_expression.as_deref(), Some("#value.age > :value1"));
        assert_eq!(request.attributes.names["#value"], "value");
    }

    #[test]
    fn partition_range_uses_primary_key() {
        let registry = registry();
        let post = registry.get("post").unwrap();
        let bounds = collection_range("post", SEP, None).unwrap();
        let request = QueryPlanner::new(post, SEP, 100)
            .plan_partition_range("user|-|u1".into(), bounds.clone(), &FindOptions::new(), true)
            .unwrap();
        assert_eq!(request.index_name, None);
        assert_eq!(request.key_condition_expression, "pk = :value0 AND sk BETWEEN :value1 AND :value2");
        assert_eq!(request.attributes.values[":value1"], AttributeValue::S(bounds.lower));
        assert!(request.consistent_read);
    }
}
