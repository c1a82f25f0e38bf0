use crate::backend::attribute::AttributeValue;
use crate::core::error::{Error, Result};
use crate::expression::mapper::ExpressionContext;
use crate::record::wrapper::VALUE_ATTRIBUTE;
use crate::update::changes::{set_operand, UpdateAction, UpdateSpec};
use crate::update::engine::DerivedChanges;

/// Clause lists of one update expression, rendered in a fixed order
#[derive(Debug, Default)]
struct Clauses {
    set: Vec<String>,
    remove: Vec<String>,
    add: Vec<String>,
    delete: Vec<String>,
}

impl Clauses {
    fn render(self) -> Option<String> {
        let mut parts = Vec::new();
        for (keyword, entries) in [("SET", self.set), ("REMOVE", self.remove), ("ADD", self.add), ("DELETE", self.delete)] {
            if !entries.is_empty() {
                parts.push(format!("{} {}", keyword, entries.join(", ")));
            }
        }
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

/// Render the direct document changes plus the derived index changes as one
/// update expression. Placeholders are allocated from `context`, which the
/// request's condition expression must share.
pub fn build_update_expression(
    spec: &UpdateSpec,
    derived: &DerivedChanges,
    context: &mut ExpressionContext,
) -> Result<String> {
    let mut clauses = Clauses::default();

    for action in spec.actions() {
        let target = context.names.map_path(VALUE_ATTRIBUTE, action.path());
        match action {
            UpdateAction::Set { value, .. } => {
                let reference = context.values.map(AttributeValue::from_json(value));
                clauses.set.push(format!("{} = {}", target, reference));
            }
            UpdateAction::Remove { .. } => clauses.remove.push(target),
            UpdateAction::Add { path, value } => {
                let reference = context.values.map(set_operand(path, value, true)?);
                clauses.add.push(format!("{} {}", target, reference));
            }
            UpdateAction::Append { values, .. } => {
                let reference = context
                    .values
                    .map(AttributeValue::L(values.iter().map(AttributeValue::from_json).collect()));
                clauses.set.push(format!("{} = list_append({}, {})", target, target, reference));
            }
            UpdateAction::DeleteFromSet { path, value } => {
                let reference = context.values.map(set_operand(path, value, false)?);
                clauses.delete.push(format!("{} {}", target, reference));
            }
        }
    }

    for (attribute, value) in &derived.set {
        let name = context.names.map(attribute);
        let reference = context.values.map(value.clone());
        clauses.set.push(format!("{} = {}", name, reference));
    }
    for attribute in &derived.remove {
        clauses.remove.push(context.names.map(attribute));
    }

    clauses
        .render()
        .ok_or_else(|| Error::update_spec("Update contains no changes"))
}
