//! Field-selection trees for operation analysis.
//!
//! The depth and cost gates both consume an immutable [`SelectionNode`] tree
//! built once per operation from the parsed document. Building resolves
//! fragment spreads inline (guarding against cycles) and annotates each field
//! with list-ness and any declared weight from the schema's field catalog, so
//! the analyzers stay pure tree walks with no parser types in sight.

use async_graphql::parser::types::{
    DocumentOperations, ExecutableDocument, Selection, SelectionSet,
};
use async_graphql::{Name, Positioned};
use async_graphql_value::Value;
use std::collections::HashMap;

use super::Rejection;

/// Per-field analysis metadata declared by the schema layer.
#[derive(Debug, Clone, Copy, Default)]
struct FieldInfo {
    list: bool,
    weight: Option<u64>,
}

/// Catalog of fields with non-default analysis metadata.
///
/// Fields absent from the catalog are treated as non-list with no declared
/// weight; leaf/object classification comes from the selection shape itself.
#[derive(Debug, Clone, Default)]
pub struct FieldCatalog {
    entries: HashMap<String, FieldInfo>,
}

impl FieldCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a field as list-valued.
    pub fn list_field(mut self, name: &str) -> Self {
        self.entries.entry(name.to_string()).or_default().list = true;
        self
    }

    /// Declare a fixed cost weight for a field.
    pub fn weighted_field(mut self, name: &str, weight: u64) -> Self {
        self.entries.entry(name.to_string()).or_default().weight = Some(weight);
        self
    }

    fn info(&self, name: &str) -> FieldInfo {
        self.entries.get(name).copied().unwrap_or_default()
    }
}

/// One field in an operation's selection tree.
#[derive(Debug, Clone)]
pub struct SelectionNode {
    pub name: String,
    /// Declared cost weight, when the catalog annotates one
    pub weight: Option<u64>,
    /// Whether the field resolves to a list
    pub list: bool,
    /// List size when statically known from a `first`/`last`/`limit` argument
    pub list_size: Option<u64>,
    pub children: Vec<SelectionNode>,
}

impl SelectionNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weight: None,
            list: false,
            list_size: None,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<SelectionNode>) -> Self {
        self.children = children;
        self
    }

    pub fn as_list(mut self) -> Self {
        self.list = true;
        self
    }

    pub fn with_weight(mut self, weight: u64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// The selection roots of a single operation in a document.
#[derive(Debug, Clone)]
pub struct OperationSelection {
    pub name: Option<String>,
    pub roots: Vec<SelectionNode>,
}

/// Build selection trees for the operations to analyze.
///
/// A named operation is analyzed alone when the name resolves; otherwise
/// every operation in the document is returned and the pipeline takes the
/// conservative worst case. Unknown fragments and fragment cycles are
/// analysis failures (the validator would reject them too; the guard keeps
/// this walk total).
pub fn build(
    doc: &ExecutableDocument,
    operation_name: Option<&str>,
    catalog: &FieldCatalog,
) -> Result<Vec<OperationSelection>, Rejection> {
    let mut selections = Vec::new();

    match &doc.operations {
        DocumentOperations::Single(op) => {
            selections.push(OperationSelection {
                name: None,
                roots: convert_set(&op.node.selection_set.node, doc, catalog, &mut Vec::new())?,
            });
        }
        DocumentOperations::Multiple(ops) => {
            let wanted = operation_name
                .and_then(|name| ops.iter().find(|(n, _)| n.as_str() == name));

            if let Some((name, op)) = wanted {
                selections.push(OperationSelection {
                    name: Some(name.to_string()),
                    roots: convert_set(&op.node.selection_set.node, doc, catalog, &mut Vec::new())?,
                });
            } else {
                for (name, op) in ops.iter() {
                    selections.push(OperationSelection {
                        name: Some(name.to_string()),
                        roots: convert_set(
                            &op.node.selection_set.node,
                            doc,
                            catalog,
                            &mut Vec::new(),
                        )?,
                    });
                }
            }
        }
    }

    Ok(selections)
}

fn convert_set(
    set: &SelectionSet,
    doc: &ExecutableDocument,
    catalog: &FieldCatalog,
    active_fragments: &mut Vec<String>,
) -> Result<Vec<SelectionNode>, Rejection> {
    let mut nodes = Vec::new();

    for item in &set.items {
        match &item.node {
            Selection::Field(field) => {
                let field = &field.node;
                let name = field.name.node.as_str().to_string();
                let children =
                    convert_set(&field.selection_set.node, doc, catalog, active_fragments)?;
                let info = catalog.info(&name);
                let list_size = if info.list {
                    static_list_size(&field.arguments)
                } else {
                    None
                };

                nodes.push(SelectionNode {
                    name,
                    weight: info.weight,
                    list: info.list,
                    list_size,
                    children,
                });
            }
            Selection::FragmentSpread(spread) => {
                let fragment_name = spread.node.fragment_name.node.as_str();
                if active_fragments.iter().any(|n| n == fragment_name) {
                    return Err(Rejection::Analysis {
                        detail: format!("fragment cycle via {fragment_name}"),
                    });
                }

                let fragment = doc
                    .fragments
                    .iter()
                    .find(|(name, _)| name.as_str() == fragment_name)
                    .map(|(_, def)| def)
                    .ok_or_else(|| Rejection::Analysis {
                        detail: format!("unknown fragment {fragment_name}"),
                    })?;

                active_fragments.push(fragment_name.to_string());
                let mut inner = convert_set(
                    &fragment.node.selection_set.node,
                    doc,
                    catalog,
                    active_fragments,
                )?;
                active_fragments.pop();
                nodes.append(&mut inner);
            }
            Selection::InlineFragment(inline) => {
                let mut inner = convert_set(
                    &inline.node.selection_set.node,
                    doc,
                    catalog,
                    active_fragments,
                )?;
                nodes.append(&mut inner);
            }
        }
    }

    Ok(nodes)
}

/// Extract a statically-known list size from sizing arguments.
///
/// Only literal integers count; variables are not statically known.
fn static_list_size(arguments: &[(Positioned<Name>, Positioned<Value>)]) -> Option<u64> {
    const SIZE_ARGUMENTS: [&str; 3] = ["first", "last", "limit"];

    arguments
        .iter()
        .find(|(name, _)| SIZE_ARGUMENTS.contains(&name.node.as_str()))
        .and_then(|(_, value)| match &value.node {
            Value::Number(n) => n.as_u64(),
            _ => None,
        })
}
