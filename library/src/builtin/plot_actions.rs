//! Built-in plot actions. Each records geometry into the supplied canvas;
//! rendering backends replay the recorded commands.

use std::collections::HashMap;

use crate::cache::AttachmentManager;
use crate::error::LibraryError;
use crate::model::graphics::{BoundingBox, Colour, CoordinateSet, Dash, Font, Point, Stroke};
use crate::model::property::{PropertyMapExt, PropertyValue};
use crate::model::tree::Tree;
use crate::plugin::traits::{
    PipelineModule, Plugin, PlotActionPlugin, PlotCanvas, PluginCategory, PropertyDefinition,
    PropertyUiType,
};

const STYLE_SOLID: usize = 0;
const STYLE_DASHED: usize = 1;
const STYLE_DOTTED: usize = 2;

/// Draws the edges of the tree as rectangular elbows.
pub struct BranchesPlotPlugin;

impl BranchesPlotPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for BranchesPlotPlugin {
    fn id(&self) -> &'static str {
        "branches"
    }

    fn name(&self) -> String {
        "Branches".to_string()
    }

    fn category(&self) -> PluginCategory {
        PluginCategory::PlotAction
    }

    fn version(&self) -> (u32, u32, u32) {
        (0, 1, 0)
    }
}

impl PipelineModule for BranchesPlotPlugin {}

impl PlotActionPlugin for BranchesPlotPlugin {
    fn declared_parameters(&self, _tree: &Tree) -> Vec<PropertyDefinition> {
        vec![
            PropertyDefinition::new(
                "colour",
                "Colour",
                PropertyUiType::Colour,
                PropertyValue::Colour(Colour::BLACK),
            ),
            PropertyDefinition::new(
                "line_width",
                "Line width",
                PropertyUiType::Number {
                    min: 0.0,
                    max: 20.0,
                    increment: 0.5,
                },
                PropertyValue::from(1.0),
            ),
            PropertyDefinition::new(
                "style",
                "Line style",
                PropertyUiType::Dropdown {
                    options: vec![
                        "Solid".to_string(),
                        "Dashed".to_string(),
                        "Dotted".to_string(),
                    ],
                },
                PropertyValue::Choice(STYLE_SOLID),
            ),
        ]
    }

    fn plot(
        &self,
        tree: &Tree,
        params: &HashMap<String, PropertyValue>,
        coordinates: &CoordinateSet,
        _attachments: &AttachmentManager,
        canvas: &mut dyn PlotCanvas,
    ) -> Result<BoundingBox, LibraryError> {
        let colour = params
            .get("colour")
            .and_then(PropertyValue::as_colour)
            .unwrap_or(Colour::BLACK);
        let width = params.get_f64("line_width").unwrap_or(1.0);
        let dash = match params.get_choice("style").unwrap_or(STYLE_SOLID) {
            STYLE_DASHED => Some(Dash::new(5.0, 5.0, 0.0)),
            STYLE_DOTTED => Some(Dash::new(1.0, 3.0, 0.0)),
            _ => None,
        };
        let stroke = Stroke {
            colour,
            width,
            dash,
        };

        let mut bounds = BoundingBox::EMPTY;
        for id in tree.preorder() {
            let Some(parent) = tree.node(id).parent else {
                continue;
            };
            let (Some(own), Some(parent_point)) = (coordinates.get(id), coordinates.get(parent))
            else {
                continue;
            };
            // Elbow: vertical run at the parent's x, then horizontal to the
            // child.
            let corner = Point::new(parent_point.x(), own.y());
            canvas.draw_line(parent_point, corner, &stroke);
            canvas.draw_line(corner, own, &stroke);
            bounds.include(parent_point);
            bounds.include(own);
        }
        Ok(bounds)
    }
}

const TARGET_LEAVES: usize = 0;
const TARGET_INTERNAL: usize = 1;

/// Draws node names next to their plotted positions.
pub struct LabelsPlotPlugin;

impl LabelsPlotPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for LabelsPlotPlugin {
    fn id(&self) -> &'static str {
        "labels"
    }

    fn name(&self) -> String {
        "Labels".to_string()
    }

    fn category(&self) -> PluginCategory {
        PluginCategory::PlotAction
    }

    fn version(&self) -> (u32, u32, u32) {
        (0, 1, 0)
    }
}

impl PipelineModule for LabelsPlotPlugin {}

impl PlotActionPlugin for LabelsPlotPlugin {
    fn declared_parameters(&self, _tree: &Tree) -> Vec<PropertyDefinition> {
        vec![
            PropertyDefinition::new(
                "target",
                "Show labels for",
                PropertyUiType::Dropdown {
                    options: vec![
                        "Leaves".to_string(),
                        "Internal nodes".to_string(),
                        "All nodes".to_string(),
                    ],
                },
                PropertyValue::Choice(TARGET_LEAVES),
            ),
            PropertyDefinition::new(
                "font",
                "Font",
                PropertyUiType::Font,
                PropertyValue::Font(Font::new("Helvetica", 12.0)),
            ),
            PropertyDefinition::new(
                "colour",
                "Colour",
                PropertyUiType::Colour,
                PropertyValue::Colour(Colour::BLACK),
            ),
            PropertyDefinition::new(
                "offset",
                "Offset",
                PropertyUiType::Point,
                PropertyValue::Point(Point::new(3.0, 0.0)),
            ),
        ]
    }

    fn plot(
        &self,
        tree: &Tree,
        params: &HashMap<String, PropertyValue>,
        coordinates: &CoordinateSet,
        _attachments: &AttachmentManager,
        canvas: &mut dyn PlotCanvas,
    ) -> Result<BoundingBox, LibraryError> {
        let target = params.get_choice("target").unwrap_or(TARGET_LEAVES);
        let font = params
            .get("font")
            .and_then(PropertyValue::as_font)
            .cloned()
            .unwrap_or_else(|| Font::new("Helvetica", 12.0));
        let colour = params
            .get("colour")
            .and_then(PropertyValue::as_colour)
            .unwrap_or(Colour::BLACK);
        let offset = params
            .get("offset")
            .and_then(PropertyValue::as_point)
            .unwrap_or_else(|| Point::new(3.0, 0.0));

        let mut bounds = BoundingBox::EMPTY;
        for id in tree.preorder() {
            let node = tree.node(id);
            let applies = match target {
                TARGET_LEAVES => node.is_leaf(),
                TARGET_INTERNAL => !node.is_leaf(),
                _ => true,
            };
            let (Some(name), Some(point)) = (node.name.as_deref(), coordinates.get(id)) else {
                continue;
            };
            if !applies || name.is_empty() {
                continue;
            }
            let anchor = point.offset_by(offset);
            canvas.draw_text(anchor, name, &font, colour);
            bounds.include(anchor);
            // Rough text extent; exact metrics belong to the renderer.
            bounds.include(Point::new(
                anchor.x() + name.len() as f64 * font.size() * 0.6,
                anchor.y() + font.size(),
            ));
        }
        Ok(bounds)
    }
}
