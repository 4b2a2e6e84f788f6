use std::collections::HashMap;
use std::sync::Arc;

use library::cache::AttachmentManager;
use library::error::LibraryError;
use library::model::property::{PropertyMapExt, PropertyValue};
use library::model::tree::Tree;
use library::plugin::{
    FurtherTransformationPlugin, PipelineModule, Plugin, PluginCategory, PluginManager, Progress,
    PropertyDefinition, PropertyUiType,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Perturbs every branch length by seeded noise. The same seed always
/// produces the same perturbation.
pub struct BranchJitterPlugin;

impl Plugin for BranchJitterPlugin {
    fn id(&self) -> &'static str {
        "branch_jitter"
    }

    fn name(&self) -> String {
        "Branch jitter".to_string()
    }

    fn category(&self) -> PluginCategory {
        PluginCategory::FurtherTransformation
    }

    fn version(&self) -> (u32, u32, u32) {
        (0, 1, 0)
    }
}

impl PipelineModule for BranchJitterPlugin {}

impl FurtherTransformationPlugin for BranchJitterPlugin {
    fn declared_parameters(&self, _tree: &Tree) -> Vec<PropertyDefinition> {
        vec![
            PropertyDefinition::new(
                "amplitude",
                "Amplitude",
                PropertyUiType::Number {
                    min: 0.0,
                    max: 100.0,
                    increment: 0.1,
                },
                PropertyValue::from(0.1),
            ),
            PropertyDefinition::new(
                "seed",
                "Seed",
                PropertyUiType::Number {
                    min: 0.0,
                    max: u32::MAX as f64,
                    increment: 1.0,
                },
                PropertyValue::from(0.0),
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
        let amplitude = params.get_f64("amplitude").unwrap_or(0.1).abs();
        let seed = params.get_f64("seed").unwrap_or(0.0) as u64;

        let mut rng = StdRng::seed_from_u64(seed);
        for id in tree.preorder() {
            if let Some(length) = tree.node(id).length {
                let jitter = rng.gen_range(-amplitude..=amplitude);
                tree.node_mut(id).length = Some((length + jitter).max(0.0));
            }
        }
        progress(1.0);
        Ok(())
    }
}

pub fn register(manager: &PluginManager) {
    manager.register_further_transformation(Arc::new(BranchJitterPlugin));
}
