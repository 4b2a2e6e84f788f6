//! Built-in further transformations.

use std::collections::{HashMap, HashSet};

use crate::cache::AttachmentManager;
use crate::error::LibraryError;
use crate::model::property::{PropertyMapExt, PropertyValue};
use crate::model::tree::{AttributeValue, Tree};
use crate::plugin::traits::{
    FurtherTransformationPlugin, ParameterChangeResponse, PipelineModule, Plugin, PluginCategory,
    Progress, PropertyDefinition, PropertyUiType,
};

/// Orders every node's children by descendant count.
pub struct SortNodesPlugin;

impl SortNodesPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for SortNodesPlugin {
    fn id(&self) -> &'static str {
        "sort_nodes"
    }

    fn name(&self) -> String {
        "Sort nodes".to_string()
    }

    fn category(&self) -> PluginCategory {
        PluginCategory::FurtherTransformation
    }

    fn version(&self) -> (u32, u32, u32) {
        (0, 1, 0)
    }
}

impl PipelineModule for SortNodesPlugin {}

impl FurtherTransformationPlugin for SortNodesPlugin {
    fn declared_parameters(&self, _tree: &Tree) -> Vec<PropertyDefinition> {
        vec![PropertyDefinition::new(
            "order",
            "Order",
            PropertyUiType::Dropdown {
                options: vec!["Increasing".to_string(), "Decreasing".to_string()],
            },
            PropertyValue::Choice(0),
        )]
    }

    /// Sorting twice changes nothing, so one slot is enough.
    fn repeatable(&self) -> bool {
        false
    }

    fn transform(
        &self,
        tree: &mut Tree,
        params: &HashMap<String, PropertyValue>,
        _attachments: &AttachmentManager,
        progress: Progress<'_>,
    ) -> Result<(), LibraryError> {
        let decreasing = params.get_choice("order").unwrap_or(0) == 1;

        let mut sizes = vec![1usize; tree.len()];
        for id in tree.postorder() {
            for child in tree.node(id).children.clone() {
                sizes[id] += sizes[child];
            }
        }

        let total = tree.len();
        for id in 0..total {
            let mut children = tree.node(id).children.clone();
            children.sort_by_key(|child| sizes[*child]);
            if decreasing {
                children.reverse();
            }
            tree.node_mut(id).children = children;
            progress((id + 1) as f64 / total as f64);
        }
        Ok(())
    }
}

/// Removes the named leaves, splicing out the internal nodes left behind.
pub struct PruneTaxaPlugin;

impl PruneTaxaPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for PruneTaxaPlugin {
    fn id(&self) -> &'static str {
        "prune_taxa"
    }

    fn name(&self) -> String {
        "Prune taxa".to_string()
    }

    fn category(&self) -> PluginCategory {
        PluginCategory::FurtherTransformation
    }

    fn version(&self) -> (u32, u32, u32) {
        (0, 1, 0)
    }
}

impl PipelineModule for PruneTaxaPlugin {}

struct RetainedNode {
    name: Option<String>,
    length: Option<f64>,
    attributes: HashMap<String, AttributeValue>,
    children: Vec<RetainedNode>,
}

fn retained(tree: &Tree, id: usize, pruned: &HashSet<&str>) -> Option<RetainedNode> {
    let node = tree.node(id);
    if node.is_leaf() {
        if node
            .name
            .as_deref()
            .is_some_and(|name| pruned.contains(name))
        {
            return None;
        }
        return Some(RetainedNode {
            name: node.name.clone(),
            length: node.length,
            attributes: node.attributes.clone(),
            children: Vec::new(),
        });
    }

    let mut children: Vec<RetainedNode> = node
        .children
        .iter()
        .filter_map(|child| retained(tree, *child, pruned))
        .collect();
    match children.len() {
        0 => None,
        // A single surviving child is spliced into its parent, branch
        // lengths added together.
        1 => {
            let mut child = children.remove(0);
            child.length = match (node.length, child.length) {
                (Some(a), Some(b)) => Some(a + b),
                (Some(a), None) | (None, Some(a)) => Some(a),
                (None, None) => None,
            };
            Some(child)
        }
        _ => Some(RetainedNode {
            name: node.name.clone(),
            length: node.length,
            attributes: node.attributes.clone(),
            children,
        }),
    }
}

fn rebuild(tree: &mut Tree, parent: usize, node: RetainedNode) {
    let id = tree.add_child(parent, node.name.as_deref(), node.length);
    tree.node_mut(id).attributes = node.attributes;
    for child in node.children {
        rebuild(tree, id, child);
    }
}

impl FurtherTransformationPlugin for PruneTaxaPlugin {
    fn declared_parameters(&self, _tree: &Tree) -> Vec<PropertyDefinition> {
        vec![PropertyDefinition::new(
            "taxa",
            "Taxa to prune",
            PropertyUiType::NodeSet,
            PropertyValue::NodeSet(Vec::new()),
        )]
    }

    fn transform(
        &self,
        tree: &mut Tree,
        params: &HashMap<String, PropertyValue>,
        _attachments: &AttachmentManager,
        progress: Progress<'_>,
    ) -> Result<(), LibraryError> {
        let pruned: HashSet<&str> = params
            .get("taxa")
            .and_then(PropertyValue::as_node_set)
            .map(|names| names.iter().map(String::as_str).collect())
            .unwrap_or_default();
        if pruned.is_empty() {
            return Ok(());
        }

        let root = retained(tree, tree.root(), &pruned).ok_or_else(|| {
            LibraryError::Transform("pruning removed every leaf of the tree".to_string())
        })?;

        let mut replacement = Tree::new();
        {
            let root_node = replacement.node_mut(replacement.root());
            root_node.name = root.name;
            root_node.length = root.length;
            root_node.attributes = root.attributes;
        }
        let replacement_root = replacement.root();
        for child in root.children {
            rebuild(&mut replacement, replacement_root, child);
        }
        *tree = replacement;
        progress(1.0);
        Ok(())
    }
}

/// Writes an attribute onto the targeted nodes.
pub struct AddAttributePlugin;

impl AddAttributePlugin {
    pub fn new() -> Self {
        Self
    }
}

const TYPE_TEXT: usize = 0;
const TYPE_NUMBER: usize = 1;

impl Plugin for AddAttributePlugin {
    fn id(&self) -> &'static str {
        "add_attribute"
    }

    fn name(&self) -> String {
        "Add attribute".to_string()
    }

    fn category(&self) -> PluginCategory {
        PluginCategory::FurtherTransformation
    }

    fn version(&self) -> (u32, u32, u32) {
        (0, 2, 0)
    }
}

impl PipelineModule for AddAttributePlugin {
    fn on_parameter_change(
        &self,
        previous: &HashMap<String, PropertyValue>,
        current: &HashMap<String, PropertyValue>,
    ) -> ParameterChangeResponse {
        // Switching the declared type invalidates the typed value bound to
        // it, so the value resets alongside the type in the same round.
        if previous.get("attribute_type") != current.get("attribute_type") {
            let reset = match current.get_choice("attribute_type") {
                Some(TYPE_NUMBER) => PropertyValue::from("0"),
                _ => PropertyValue::from(""),
            };
            return ParameterChangeResponse::accept().with_change("new_value", reset);
        }
        ParameterChangeResponse::accept()
    }
}

impl FurtherTransformationPlugin for AddAttributePlugin {
    fn declared_parameters(&self, _tree: &Tree) -> Vec<PropertyDefinition> {
        vec![
            PropertyDefinition::new(
                "attribute_name",
                "Attribute",
                PropertyUiType::Text,
                PropertyValue::from(""),
            ),
            PropertyDefinition::new(
                "attribute_type",
                "Type",
                PropertyUiType::Dropdown {
                    options: vec!["Text".to_string(), "Number".to_string()],
                },
                PropertyValue::Choice(TYPE_TEXT),
            ),
            PropertyDefinition::new(
                "new_value",
                "Value",
                PropertyUiType::Text,
                PropertyValue::from(""),
            ),
            PropertyDefinition::new(
                "target",
                "Apply to",
                PropertyUiType::Dropdown {
                    options: vec![
                        "All nodes".to_string(),
                        "Leaves".to_string(),
                        "Internal nodes".to_string(),
                    ],
                },
                PropertyValue::Choice(0),
            ),
        ]
    }

    fn transform(
        &self,
        tree: &mut Tree,
        params: &HashMap<String, PropertyValue>,
        _attachments: &AttachmentManager,
        progress: Progress<'_>,
    ) -> Result<(), LibraryError> {
        let name = params.get_text("attribute_name").unwrap_or_default();
        if name.is_empty() {
            return Ok(());
        }
        let name = name.to_string();

        let raw = params.get_text("new_value").unwrap_or_default();
        let value = match params.get_choice("attribute_type") {
            Some(TYPE_NUMBER) => AttributeValue::Number(raw.parse::<f64>().map_err(|_| {
                LibraryError::Transform(format!("'{}' is not a numeric attribute value", raw))
            })?),
            _ => AttributeValue::Text(raw.to_string()),
        };

        let target = params.get_choice("target").unwrap_or(0);
        for id in tree.preorder() {
            let is_leaf = tree.node(id).is_leaf();
            let applies = match target {
                1 => is_leaf,
                2 => !is_leaf,
                _ => true,
            };
            if applies {
                tree.set_attribute(id, &name, value.clone());
            }
        }
        progress(1.0);
        Ok(())
    }
}

/// Reads `name,attribute,value` lines from an attachment and applies them
/// to the named nodes. The parsed table is memoized per attachment when the
/// attachment caches results.
pub struct ParseNodeStatesPlugin;

impl ParseNodeStatesPlugin {
    pub fn new() -> Self {
        Self
    }
}

type StateTable = Vec<(String, String, String)>;

fn parse_state_table(bytes: &[u8]) -> Result<StateTable, LibraryError> {
    let text = std::str::from_utf8(bytes).map_err(|_| {
        LibraryError::Transform("node state data is not valid UTF-8".to_string())
    })?;
    let mut rows = Vec::new();
    for (line_number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.splitn(3, ',');
        match (fields.next(), fields.next(), fields.next()) {
            (Some(node), Some(attribute), Some(value)) => rows.push((
                node.trim().to_string(),
                attribute.trim().to_string(),
                value.trim().to_string(),
            )),
            _ => {
                return Err(LibraryError::Transform(format!(
                    "malformed node state line {}: '{}'",
                    line_number + 1,
                    line
                )));
            }
        }
    }
    Ok(rows)
}

impl Plugin for ParseNodeStatesPlugin {
    fn id(&self) -> &'static str {
        "parse_node_states"
    }

    fn name(&self) -> String {
        "Parse node states".to_string()
    }

    fn category(&self) -> PluginCategory {
        PluginCategory::FurtherTransformation
    }

    fn version(&self) -> (u32, u32, u32) {
        (0, 1, 0)
    }
}

impl PipelineModule for ParseNodeStatesPlugin {}

impl FurtherTransformationPlugin for ParseNodeStatesPlugin {
    fn declared_parameters(&self, _tree: &Tree) -> Vec<PropertyDefinition> {
        vec![PropertyDefinition::new(
            "data",
            "State data",
            PropertyUiType::Attachment,
            PropertyValue::AttachmentRef(None),
        )]
    }

    fn transform(
        &self,
        tree: &mut Tree,
        params: &HashMap<String, PropertyValue>,
        attachments: &AttachmentManager,
        progress: Progress<'_>,
    ) -> Result<(), LibraryError> {
        let Some(name) = params.get("data").and_then(PropertyValue::as_attachment) else {
            return Ok(());
        };
        let attachment = attachments.get(name).ok_or_else(|| {
            LibraryError::AttachmentNotFound(name.to_string())
        })?;
        let table = attachment.parsed("parse_node_states", parse_state_table)?;

        for id in tree.preorder() {
            let Some(node_name) = tree.node(id).name.clone() else {
                continue;
            };
            for (target, attribute, value) in table.iter() {
                if target == &node_name {
                    let value = match value.parse::<f64>() {
                        Ok(number) => AttributeValue::Number(number),
                        Err(_) => AttributeValue::Text(value.clone()),
                    };
                    tree.set_attribute(id, attribute, value);
                }
            }
        }
        progress(1.0);
        Ok(())
    }
}
