use crate::backend::attribute::AttributeValue;
use crate::core::error::Result;
use crate::expression::ast::{Comparator, Condition, KeyPathCondition};
use crate::expression::mapper::{ExpressionContext, ParsePath};
use crate::record::wrapper::VALUE_ATTRIBUTE;

/// Recursive compiler from `Condition` to the backend's boolean syntax.
/// Document paths are rooted at the record's payload attribute.
pub struct ConditionCompiler<'a> {
    context: &'a mut ExpressionContext,
    max_in_values: usize,
    path: ParsePath,
}

impl<'a> ConditionCompiler<'a> {
    pub fn new(context: &'a mut ExpressionContext, max_in_values: usize) -> Self {
        ConditionCompiler {
            context,
            max_in_values,
            path: ParsePath::new(),
        }
    }

    pub fn compile(&mut self, condition: &Condition) -> Result<String> {
        match condition {
            Condition::And(clauses) => self.compile_joined("$and", clauses, "AND"),
            Condition::Or(clauses) => self.compile_joined("$or", clauses, "OR"),
            Condition::Not(clause) => {
                self.path.push_key("$not");
                let inner = self.compile(clause)?;
                self.path.pop();
                Ok(format!("NOT ({})", inner))
            }
            Condition::KeyPaths(conditions) => {
                if conditions.is_empty() {
                    return Err(self.path.error("Condition must name at least one key path"));
                }
                let mut parts = Vec::with_capacity(conditions.len());
                for condition in conditions {
                    parts.push(self.compile_key_path(condition)?);
                }
                Ok(join_parenthesized(parts, "AND"))
            }
        }
    }

    fn compile_joined(&mut self, operator: &str, clauses: &[Condition], joiner: &str) -> Result<String> {
        self.path.push_key(operator);
        if clauses.is_empty() {
            return Err(self.path.error(format!("{} requires at least one clause", operator)));
        }

        let mut parts = Vec::with_capacity(clauses.len());
        for (i, clause) in clauses.iter().enumerate() {
            self.path.push_index(i);
            parts.push(format!("({})", self.compile(clause)?));
            self.path.pop();
        }
        self.path.pop();
        Ok(parts.join(&format!(" {} ", joiner)))
    }

    fn compile_key_path(&mut self, condition: &KeyPathCondition) -> Result<String> {
        self.path.push_key(&condition.key_path.to_string());
        if condition.comparators.is_empty() {
            return Err(self.path.error("Key path has no comparator"));
        }

        let operand = self.context.names.map_path(VALUE_ATTRIBUTE, &condition.key_path);
        let mut parts = Vec::with_capacity(condition.comparators.len());
        for comparator in &condition.comparators {
            self.path.push_key(comparator.operator());
            parts.push(self.compile_comparator(&operand, comparator)?);
            self.path.pop();
        }
        self.path.pop();
        Ok(join_parenthesized(parts, "AND"))
    }

    fn literal(&mut self, value: &serde_json::Value) -> String {
        self.context.values.map(AttributeValue::from_json(value))
    }

    fn compile_comparator(&mut self, operand: &str, comparator: &Comparator) -> Result<String> {
        Ok(match comparator {
            Comparator::Eq(v) => format!("{} = {}", operand, self.literal(v)),
            Comparator::Neq(v) => format!("{} <> {}", operand, self.literal(v)),
            Comparator::Gt(v) => format!("{} > {}", operand, self.literal(v)),
            Comparator::Gte(v) => format!("{} >= {}", operand, self.literal(v)),
            Comparator::Lt(v) => format!("{} < {}", operand, self.literal(v)),
            Comparator::Lte(v) => format!("{} <= {}", operand, self.literal(v)),
            Comparator::Between { gte, lte } => {
                let low = self.literal(gte);
                let high = self.literal(lte);
                format!("{} BETWEEN {} AND {}", operand, low, high)
            }
            Comparator::In(values) => {
                if values.is_empty() || values.len() > self.max_in_values {
                    return Err(self.path.error(format!(
                        "$in requires between 1 and {} values, got {}",
                        self.max_in_values,
                        values.len()
                    )));
                }
                let refs: Vec<String> = values.iter().map(|v| self.literal(v)).collect();
                format!("{} IN ({})", operand, refs.join(","))
            }
            Comparator::Exists(true) => format!("attribute_exists({})", operand),
            Comparator::Exists(false) => format!("attribute_not_exists({})", operand),
            Comparator::Type(t) => {
                let reference = self.context.values.map(AttributeValue::S(t.descriptor().to_string()));
                format!("attribute_type({}, {})", operand, reference)
            }
            Comparator::BeginsWith(prefix) => {
                let reference = self.context.values.map(AttributeValue::S(prefix.clone()));
                format!("begins_with({}, {})", operand, reference)
            }
            Comparator::Contains(v) => format!("contains({}, {})", operand, self.literal(v)),
        })
    }
}

fn join_parenthesized(parts: Vec<String>, joiner: &str) -> String {
    if parts.len() == 1 {
        return parts.into_iter().next().unwrap_or_default();
    }
    parts
        .iter()
        .map(|p| format!("({})", p))
        .collect::<Vec<_>>()
        .join(&format!(" {} ", joiner))
}

/// Compile one condition into `context`, returning the expression string
pub fn compile_condition(condition: &Condition, context: &mut ExpressionContext, max_in_values: usize) -> Result<String> {
    ConditionCompiler::new(context, max_in_values).compile(condition)
}
