//! Core plugin traits.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cache::AttachmentManager;
use crate::error::LibraryError;
use crate::model::graphics::{
    BoundingBox, Colour, CoordinateSet, Font, PlotCommand, Point, Stroke,
};
use crate::model::property::PropertyValue;
use crate::model::tree::{Tree, TreeCollection};

/// Stage kinds of the fixed pipeline shape
/// `Loader -> Transformer -> FurtherTransformation* -> Coordinate -> PlotAction*`.
///
/// `Loader` exists for addressing and snapshots only; loading is driven by
/// the session's open flow, not by the slot mechanism.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PluginCategory {
    Loader,
    Transformer,
    FurtherTransformation,
    Coordinate,
    PlotAction,
}

impl std::fmt::Display for PluginCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PluginCategory::Loader => "loader",
            PluginCategory::Transformer => "transformer",
            PluginCategory::FurtherTransformation => "further transformation",
            PluginCategory::Coordinate => "coordinate",
            PluginCategory::PlotAction => "plot action",
        };
        write!(f, "{}", s)
    }
}

/// How a parameter is edited and validated. Constraints (ranges, option
/// lists) live here rather than in a parallel map.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyUiType {
    Number { min: f64, max: f64, increment: f64 },
    Text,
    MultilineText,
    Bool,
    Dropdown { options: Vec<String> },
    Colour,
    Point,
    Dash,
    Font,
    NodeSet,
    SourceCode,
    Attachment,
    Label,
}

#[derive(Debug, Clone)]
pub struct PropertyDefinition {
    pub name: String,
    pub label: String,
    pub ui_type: PropertyUiType,
    pub default_value: PropertyValue,
}

impl PropertyDefinition {
    pub fn new(
        name: &str,
        label: &str,
        ui_type: PropertyUiType,
        default_value: PropertyValue,
    ) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            ui_type,
            default_value,
        }
    }
}

/// Presentation state of one control, decided by the owning module during
/// negotiation. External presentation layers must honor this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlStatus {
    Enabled,
    Disabled,
    Hidden,
}

/// Result of one negotiation round (see `PipelineModule::on_parameter_change`).
#[derive(Debug, Clone)]
pub struct ParameterChangeResponse {
    pub accepted: bool,
    pub control_status: HashMap<String, ControlStatus>,
    pub additional_changes: HashMap<String, PropertyValue>,
}

impl ParameterChangeResponse {
    pub fn accept() -> Self {
        Self {
            accepted: true,
            control_status: HashMap::new(),
            additional_changes: HashMap::new(),
        }
    }

    pub fn reject() -> Self {
        Self {
            accepted: false,
            control_status: HashMap::new(),
            additional_changes: HashMap::new(),
        }
    }

    pub fn with_change(mut self, key: &str, value: PropertyValue) -> Self {
        self.additional_changes.insert(key.to_string(), value);
        self
    }

    pub fn with_status(mut self, key: &str, status: ControlStatus) -> Self {
        self.control_status.insert(key.to_string(), status);
        self
    }
}

/// Advisory progress callback for long transforms; never a suspension point.
pub type Progress<'a> = &'a mut dyn FnMut(f64);

/// Base trait for all plugins.
pub trait Plugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> String;
    fn category(&self) -> PluginCategory;
    fn version(&self) -> (u32, u32, u32);
}

/// Shared negotiation contract for every slot-driven module.
///
/// The round is singular: additional changes returned here do not trigger a
/// second call. A module needing multi-step consistency must fold it into
/// one response.
pub trait PipelineModule: Plugin {
    fn on_parameter_change(
        &self,
        _previous: &HashMap<String, PropertyValue>,
        _current: &HashMap<String, PropertyValue>,
    ) -> ParameterChangeResponse {
        ParameterChangeResponse::accept()
    }
}

/// Turns the loaded collection into the first transformed tree.
///
/// Modules holding an attachment-kind parameter resolve the referenced
/// name through the supplied attachment cache.
pub trait TransformerPlugin: PipelineModule {
    fn declared_parameters(&self, trees: &TreeCollection) -> Vec<PropertyDefinition>;

    fn transform(
        &self,
        trees: &TreeCollection,
        params: &HashMap<String, PropertyValue>,
        attachments: &AttachmentManager,
        progress: Progress<'_>,
    ) -> Result<Tree, LibraryError>;
}

/// Mutates the engine-supplied clone of the previous stage's output in place.
pub trait FurtherTransformationPlugin: PipelineModule {
    fn declared_parameters(&self, tree: &Tree) -> Vec<PropertyDefinition>;

    /// When false, the module may occupy at most one list slot at a time.
    fn repeatable(&self) -> bool {
        true
    }

    fn transform(
        &self,
        tree: &mut Tree,
        params: &HashMap<String, PropertyValue>,
        attachments: &AttachmentManager,
        progress: Progress<'_>,
    ) -> Result<(), LibraryError>;
}

pub trait CoordinatePlugin: PipelineModule {
    fn declared_parameters(&self, tree: &Tree) -> Vec<PropertyDefinition>;

    fn coordinates(
        &self,
        tree: &Tree,
        params: &HashMap<String, PropertyValue>,
        attachments: &AttachmentManager,
    ) -> Result<CoordinateSet, LibraryError>;
}

pub trait PlotActionPlugin: PipelineModule {
    fn declared_parameters(&self, tree: &Tree) -> Vec<PropertyDefinition>;

    fn plot(
        &self,
        tree: &Tree,
        params: &HashMap<String, PropertyValue>,
        coordinates: &CoordinateSet,
        attachments: &AttachmentManager,
        canvas: &mut dyn PlotCanvas,
    ) -> Result<BoundingBox, LibraryError>;
}

/// Drawing surface handed to plot actions.
pub trait PlotCanvas {
    fn draw_line(&mut self, from: Point, to: Point, stroke: &Stroke);
    fn draw_circle(&mut self, centre: Point, radius: f64, fill: Colour);
    fn draw_text(&mut self, anchor: Point, text: &str, font: &Font, colour: Colour);
}

/// Recording canvas: collects commands for a rendering backend to replay.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DisplayList {
    commands: Vec<PlotCommand>,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[PlotCommand] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<PlotCommand> {
        self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl PlotCanvas for DisplayList {
    fn draw_line(&mut self, from: Point, to: Point, stroke: &Stroke) {
        self.commands.push(PlotCommand::Line {
            from,
            to,
            stroke: stroke.clone(),
        });
    }

    fn draw_circle(&mut self, centre: Point, radius: f64, fill: Colour) {
        self.commands.push(PlotCommand::Circle {
            centre,
            radius,
            fill,
        });
    }

    fn draw_text(&mut self, anchor: Point, text: &str, font: &Font, colour: Colour) {
        self.commands.push(PlotCommand::Text {
            anchor,
            text: text.to_string(),
            font: font.clone(),
            colour,
        });
    }
}
