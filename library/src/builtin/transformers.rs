use std::collections::HashMap;

use crate::cache::AttachmentManager;
use crate::error::LibraryError;
use crate::model::property::{PropertyMapExt, PropertyValue};
use crate::model::tree::{Tree, TreeCollection};
use crate::plugin::traits::{
    PipelineModule, Plugin, PluginCategory, Progress, PropertyDefinition, PropertyUiType,
    TransformerPlugin,
};

/// Picks one tree of the loaded collection as the first transformed tree.
pub struct FirstTreeTransformerPlugin;

impl FirstTreeTransformerPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for FirstTreeTransformerPlugin {
    fn id(&self) -> &'static str {
        "first_tree"
    }

    fn name(&self) -> String {
        "First tree".to_string()
    }

    fn category(&self) -> PluginCategory {
        PluginCategory::Transformer
    }

    fn version(&self) -> (u32, u32, u32) {
        (0, 1, 0)
    }
}

impl PipelineModule for FirstTreeTransformerPlugin {}

impl TransformerPlugin for FirstTreeTransformerPlugin {
    fn declared_parameters(&self, trees: &TreeCollection) -> Vec<PropertyDefinition> {
        vec![PropertyDefinition::new(
            "tree_index",
            "Tree",
            PropertyUiType::Number {
                min: 0.0,
                max: trees.len().saturating_sub(1) as f64,
                increment: 1.0,
            },
            PropertyValue::from(0.0),
        )]
    }

    fn transform(
        &self,
        trees: &TreeCollection,
        params: &HashMap<String, PropertyValue>,
        _attachments: &AttachmentManager,
        progress: Progress<'_>,
    ) -> Result<Tree, LibraryError> {
        let index = params.get_f64("tree_index").unwrap_or(0.0).round() as usize;
        let index = index.min(trees.len().saturating_sub(1));
        let tree = trees
            .get(index)
            .cloned()
            .ok_or_else(|| LibraryError::Transform("the subject contains no trees".to_string()))?;
        progress(1.0);
        Ok(tree)
    }
}
