use std::collections::HashMap;

use crate::cache::AttachmentManager;
use crate::error::LibraryError;
use crate::model::graphics::{CoordinateSet, Point};
use crate::model::property::{PropertyMapExt, PropertyValue};
use crate::model::tree::Tree;
use crate::plugin::traits::{
    ControlStatus, CoordinatePlugin, ParameterChangeResponse, PipelineModule, Plugin,
    PluginCategory, PropertyDefinition, PropertyUiType,
};

/// Rectangular layout: leaves at consecutive integer y positions, internal
/// nodes at the midpoint of their children, x accumulated from branch
/// lengths along the path from the root.
pub struct RectangularCoordinatesPlugin;

impl RectangularCoordinatesPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for RectangularCoordinatesPlugin {
    fn id(&self) -> &'static str {
        "rectangular"
    }

    fn name(&self) -> String {
        "Rectangular".to_string()
    }

    fn category(&self) -> PluginCategory {
        PluginCategory::Coordinate
    }

    fn version(&self) -> (u32, u32, u32) {
        (0, 1, 0)
    }
}

impl PipelineModule for RectangularCoordinatesPlugin {
    fn on_parameter_change(
        &self,
        _previous: &HashMap<String, PropertyValue>,
        current: &HashMap<String, PropertyValue>,
    ) -> ParameterChangeResponse {
        let use_lengths = current.get_bool("use_branch_lengths").unwrap_or(true);
        let status = if use_lengths {
            ControlStatus::Disabled
        } else {
            ControlStatus::Enabled
        };
        ParameterChangeResponse::accept().with_status("default_length", status)
    }
}

impl CoordinatePlugin for RectangularCoordinatesPlugin {
    fn declared_parameters(&self, _tree: &Tree) -> Vec<PropertyDefinition> {
        vec![
            PropertyDefinition::new(
                "use_branch_lengths",
                "Use branch lengths",
                PropertyUiType::Bool,
                PropertyValue::from(true),
            ),
            PropertyDefinition::new(
                "default_length",
                "Branch length",
                PropertyUiType::Number {
                    min: 0.0,
                    max: 1.0e6,
                    increment: 0.1,
                },
                PropertyValue::from(1.0),
            ),
        ]
    }

    fn coordinates(
        &self,
        tree: &Tree,
        params: &HashMap<String, PropertyValue>,
        _attachments: &AttachmentManager,
    ) -> Result<CoordinateSet, LibraryError> {
        let use_lengths = params.get_bool("use_branch_lengths").unwrap_or(true);
        let default_length = params.get_f64("default_length").unwrap_or(1.0);

        let mut x = vec![0.0f64; tree.len()];
        for id in tree.preorder() {
            if let Some(parent) = tree.node(id).parent {
                let length = if use_lengths {
                    tree.node(id).length.unwrap_or(default_length)
                } else {
                    default_length
                };
                x[id] = x[parent] + length;
            }
        }

        let mut y = vec![0.0f64; tree.len()];
        for (rank, leaf) in tree.leaves().into_iter().enumerate() {
            y[leaf] = rank as f64;
        }
        for id in tree.postorder() {
            let children = &tree.node(id).children;
            if !children.is_empty() {
                y[id] = children.iter().map(|child| y[*child]).sum::<f64>()
                    / children.len() as f64;
            }
        }

        let mut coordinates = CoordinateSet::new();
        for id in 0..tree.len() {
            coordinates.insert(id, Point::new(x[id], y[id]));
        }
        Ok(coordinates)
    }
}
