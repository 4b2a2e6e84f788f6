//! The stage slots, their cached outputs, and the cascading recompute.

use std::collections::HashMap;

use log::{debug, warn};
use rayon::prelude::*;
use uuid::Uuid;

use crate::cache::AttachmentManager;
use crate::error::LibraryError;
use crate::model::graphics::{BoundingBox, CoordinateSet, PlotCommand};
use crate::model::property::PropertyValue;
use crate::model::tree::{Tree, TreeCollection};
use crate::pipeline::dirty::DirtyState;
use crate::pipeline::parameters::ParameterStore;
use crate::pipeline::stage::{Stage, StageHandle, StageModule, StageSnapshot};
use crate::plugin::traits::{
    CoordinatePlugin, DisplayList, FurtherTransformationPlugin, PlotActionPlugin, Plugin,
    PluginCategory, Progress, TransformerPlugin,
};

/// Outcome of one `recompute` pass. Per-entry further-transformation
/// failures are collected here instead of aborting the replay.
#[derive(Debug, Default)]
pub struct RecomputeReport {
    pub transformer_ran: bool,
    pub further_replayed_from: Option<usize>,
    pub coordinates_ran: bool,
    pub failures: Vec<TransformFailure>,
}

impl RecomputeReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TransformFailure {
    pub index: usize,
    pub stage_id: Uuid,
    pub module_id: String,
    pub message: String,
}

/// Geometry emitted by one on-demand plot evaluation, in stage order.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotOutput {
    pub commands: Vec<PlotCommand>,
    pub action_bounds: Vec<BoundingBox>,
    pub bounds: BoundingBox,
}

#[derive(Clone, Copy)]
enum Slot {
    Transformer,
    Further(usize),
    Coordinate,
    PlotAction(usize),
}

/// The ordered stage slots
/// `Transformer -> FurtherTransformation* -> Coordinate -> PlotAction*`
/// plus the cached outputs and the dirty-bit state machine.
pub struct PipelineGraph {
    transformer: Option<Stage>,
    further: Vec<Stage>,
    coordinate: Option<Stage>,
    plot_actions: Vec<Stage>,

    first_transformed: Option<Tree>,
    /// `all_transformed[i]` is the tree after further entry `i`, retained so
    /// a partial recompute can resume from any index.
    all_transformed: Vec<Tree>,
    coordinates: Option<CoordinateSet>,
    attribute_names: Vec<String>,

    dirty: DirtyState,
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self {
            transformer: None,
            further: Vec::new(),
            coordinate: None,
            plot_actions: Vec::new(),
            first_transformed: None,
            all_transformed: Vec::new(),
            coordinates: None,
            attribute_names: Vec::new(),
            dirty: DirtyState::new(),
        }
    }

    // --- Structural operations ---

    /// Populates a slot with a module. Prerequisites per slot kind: the
    /// transformer needs a loaded subject, further transformations and the
    /// coordinate stage need a transformer, plot actions need a coordinate
    /// stage. Singleton slots are replaced in place.
    pub fn enable(
        &mut self,
        module: StageModule,
        overrides: HashMap<String, PropertyValue>,
        subject: Option<&TreeCollection>,
    ) -> Result<StageHandle, LibraryError> {
        let definitions = match &module {
            StageModule::Transformer(plugin) => {
                let trees = subject.ok_or_else(|| {
                    LibraryError::MissingPrerequisite(
                        "a subject must be loaded before enabling a transformer".to_string(),
                    )
                })?;
                plugin.declared_parameters(trees)
            }
            StageModule::FurtherTransformation(plugin) => {
                self.require_transformer()?;
                if !plugin.repeatable()
                    && self
                        .further
                        .iter()
                        .any(|stage| stage.module_id() == plugin.id())
                {
                    return Err(LibraryError::DuplicateModule(plugin.id().to_string()));
                }
                plugin.declared_parameters(self.parameter_context_tree(subject)?)
            }
            StageModule::Coordinate(plugin) => {
                self.require_transformer()?;
                plugin.declared_parameters(self.parameter_context_tree(subject)?)
            }
            StageModule::PlotAction(plugin) => {
                if self.coordinate.is_none() {
                    return Err(LibraryError::MissingPrerequisite(
                        "a coordinate stage must be enabled before plot actions".to_string(),
                    ));
                }
                plugin.declared_parameters(self.parameter_context_tree(subject)?)
            }
        };

        let parameters = ParameterStore::from_definitions(definitions)?;
        let mut stage = Stage::new(module, parameters);
        stage.apply_initial_overrides(overrides)?;
        let handle = stage.handle();
        debug!(
            "PipelineGraph: enabling {} '{}'",
            handle.category,
            stage.module_id()
        );

        match handle.category {
            PluginCategory::Transformer => {
                self.transformer = Some(stage);
                self.dirty.mark_transformer();
            }
            PluginCategory::FurtherTransformation => {
                let index = self.further.len();
                self.further.push(stage);
                self.dirty.mark_further_from(index);
            }
            PluginCategory::Coordinate => {
                self.coordinate = Some(stage);
                self.dirty.mark_coordinates();
            }
            // Plot output is never cached, so nothing goes stale.
            PluginCategory::PlotAction => self.plot_actions.push(stage),
            PluginCategory::Loader => unreachable!("loader stages are not slot-driven"),
        }
        Ok(handle)
    }

    /// Removes a list-slot stage. The singleton transformer and coordinate
    /// slots can only be replaced, never emptied.
    pub fn disable(&mut self, handle: StageHandle) -> Result<(), LibraryError> {
        match self.locate(handle)? {
            Slot::Transformer => Err(LibraryError::Pipeline(
                "the transformer stage cannot be disabled, only replaced".to_string(),
            )),
            Slot::Coordinate => Err(LibraryError::Pipeline(
                "the coordinate stage cannot be disabled, only replaced".to_string(),
            )),
            Slot::Further(index) => {
                let stage = self.further.remove(index);
                debug!(
                    "PipelineGraph: disabling further transformation '{}' at {}",
                    stage.module_id(),
                    index
                );
                self.all_transformed.truncate(index);
                self.dirty.mark_further_from(index);
                Ok(())
            }
            Slot::PlotAction(index) => {
                self.plot_actions.remove(index);
                Ok(())
            }
        }
    }

    /// Swaps a list-slot stage with its neighbour toward index 0. A move
    /// past the front is a no-op, not an error.
    pub fn move_up(&mut self, handle: StageHandle) -> Result<(), LibraryError> {
        match self.locate(handle)? {
            Slot::Further(index) => {
                if index > 0 {
                    self.further.swap(index - 1, index);
                    self.dirty.mark_further_from(index - 1);
                }
                Ok(())
            }
            Slot::PlotAction(index) => {
                if index > 0 {
                    self.plot_actions.swap(index - 1, index);
                }
                Ok(())
            }
            _ => Err(LibraryError::Pipeline(
                "only list stages can be moved".to_string(),
            )),
        }
    }

    /// Swaps a list-slot stage with its neighbour toward the end. A move
    /// past the end is a no-op, not an error.
    pub fn move_down(&mut self, handle: StageHandle) -> Result<(), LibraryError> {
        match self.locate(handle)? {
            Slot::Further(index) => {
                if index + 1 < self.further.len() {
                    self.further.swap(index, index + 1);
                    self.dirty.mark_further_from(index);
                }
                Ok(())
            }
            Slot::PlotAction(index) => {
                if index + 1 < self.plot_actions.len() {
                    self.plot_actions.swap(index, index + 1);
                }
                Ok(())
            }
            _ => Err(LibraryError::Pipeline(
                "only list stages can be moved".to_string(),
            )),
        }
    }

    /// Sets one parameter through the stage's negotiation round and, when
    /// the change commits, marks the stage's output stale. Returns whether
    /// the change committed.
    pub fn set_parameter(
        &mut self,
        handle: StageHandle,
        key: &str,
        value: PropertyValue,
    ) -> Result<bool, LibraryError> {
        let slot = self.locate(handle)?;
        let committed = match slot {
            Slot::Transformer => self
                .transformer
                .as_mut()
                .ok_or(LibraryError::StageNotFound(handle.category))?
                .set_parameter(key, value)?,
            Slot::Further(index) => self.further[index].set_parameter(key, value)?,
            Slot::Coordinate => self
                .coordinate
                .as_mut()
                .ok_or(LibraryError::StageNotFound(handle.category))?
                .set_parameter(key, value)?,
            Slot::PlotAction(index) => self.plot_actions[index].set_parameter(key, value)?,
        };
        if committed {
            match slot {
                Slot::Transformer => self.dirty.mark_transformer(),
                Slot::Further(index) => self.dirty.mark_further_from(index),
                Slot::Coordinate => self.dirty.mark_coordinates(),
                Slot::PlotAction(_) => {}
            }
        }
        Ok(committed)
    }

    // --- Recompute ---

    /// Walks the graph from the first dirty stage and recomputes forward.
    ///
    /// Transformer and coordinate failures abort the pass; a failing
    /// further-transformation entry is recorded in the report and the
    /// replay continues with the next entry.
    pub fn recompute(
        &mut self,
        subject: Option<&TreeCollection>,
        attachments: &AttachmentManager,
        progress: Progress<'_>,
    ) -> Result<RecomputeReport, LibraryError> {
        let mut report = RecomputeReport::default();

        if self.dirty.transformer_dirty() {
            if let Some(stage) = &self.transformer {
                let trees = subject.ok_or_else(|| {
                    LibraryError::MissingPrerequisite(
                        "cannot run the transformer with no subject loaded".to_string(),
                    )
                })?;
                let StageModule::Transformer(module) = stage.module() else {
                    unreachable!("transformer slot holds a transformer module");
                };
                let tree =
                    module.transform(trees, stage.parameters().values(), attachments, progress)?;
                debug!(
                    "PipelineGraph: transformer '{}' produced {} nodes",
                    stage.module_id(),
                    tree.len()
                );
                self.first_transformed = Some(tree);
                report.transformer_ran = true;
                self.dirty.clear_transformer();
                self.dirty.mark_further_from(0);
            } else {
                self.dirty.clear_transformer();
            }
        }

        if self.dirty.further_dirty() {
            if let Some(first) = self.first_transformed.clone() {
                let min = self
                    .dirty
                    .min_further_index()
                    .unwrap_or(0)
                    .min(self.further.len())
                    .min(self.all_transformed.len());
                let mut current = if min == 0 {
                    first
                } else {
                    self.all_transformed[min - 1].clone()
                };
                self.all_transformed.truncate(min);
                for (offset, stage) in self.further[min..].iter().enumerate() {
                    let index = min + offset;
                    let StageModule::FurtherTransformation(module) = stage.module() else {
                        unreachable!("further slot holds a further-transformation module");
                    };
                    if let Err(error) = module.transform(
                        &mut current,
                        stage.parameters().values(),
                        attachments,
                        progress,
                    ) {
                        warn!(
                            "PipelineGraph: further transformation '{}' at {} failed: {}",
                            stage.module_id(),
                            index,
                            error
                        );
                        report.failures.push(TransformFailure {
                            index,
                            stage_id: stage.id(),
                            module_id: stage.module_id().to_string(),
                            message: error.to_string(),
                        });
                    }
                    self.all_transformed.push(current.clone());
                }
                let names = self
                    .final_transformed()
                    .map(Tree::attribute_names)
                    .unwrap_or_default();
                self.attribute_names = names;
                report.further_replayed_from = Some(min);
                self.dirty.clear_further();
                if self.coordinate.is_some() {
                    self.dirty.mark_coordinates();
                }
            } else {
                self.dirty.clear_further();
            }
        }

        if self.dirty.coordinates_dirty() {
            if let Some(stage) = &self.coordinate {
                let tree = self.final_transformed().ok_or_else(|| {
                    LibraryError::MissingPrerequisite(
                        "cannot compute coordinates before the transformer has run".to_string(),
                    )
                })?;
                let StageModule::Coordinate(module) = stage.module() else {
                    unreachable!("coordinate slot holds a coordinate module");
                };
                let coordinates =
                    module.coordinates(tree, stage.parameters().values(), attachments)?;
                self.coordinates = Some(coordinates);
                report.coordinates_ran = true;
            }
            self.dirty.clear_coordinates();
        }

        Ok(report)
    }

    /// Evaluates every plot action against the latest coordinate output.
    ///
    /// Plot output is never cached; the actions are independent of each
    /// other, so they record into per-action display lists in parallel and
    /// the lists are concatenated in stage order afterwards.
    pub fn render(&self, attachments: &AttachmentManager) -> Result<PlotOutput, LibraryError> {
        let tree = self.final_transformed().ok_or_else(|| {
            LibraryError::MissingPrerequisite(
                "nothing to plot before the transformer has run".to_string(),
            )
        })?;
        let coordinates = self.coordinates.as_ref().ok_or_else(|| {
            LibraryError::MissingPrerequisite(
                "nothing to plot before coordinates are computed".to_string(),
            )
        })?;

        let evaluated: Result<Vec<(DisplayList, BoundingBox)>, LibraryError> = self
            .plot_actions
            .par_iter()
            .map(|stage| {
                let StageModule::PlotAction(module) = stage.module() else {
                    unreachable!("plot slot holds a plot-action module");
                };
                let mut list = DisplayList::new();
                let bounds = module.plot(
                    tree,
                    stage.parameters().values(),
                    coordinates,
                    attachments,
                    &mut list,
                )?;
                Ok((list, bounds))
            })
            .collect();

        let mut commands = Vec::new();
        let mut action_bounds = Vec::new();
        let mut bounds = BoundingBox::EMPTY;
        for (list, action) in evaluated? {
            commands.extend(list.into_commands());
            bounds = bounds.union(&action);
            action_bounds.push(action);
        }
        Ok(PlotOutput {
            commands,
            action_bounds,
            bounds,
        })
    }

    // --- Inspection ---

    pub fn resolve(&self, handle: StageHandle) -> Option<&Stage> {
        match handle.category {
            PluginCategory::Transformer => self
                .transformer
                .as_ref()
                .filter(|stage| stage.id() == handle.id),
            PluginCategory::Coordinate => self
                .coordinate
                .as_ref()
                .filter(|stage| stage.id() == handle.id),
            PluginCategory::FurtherTransformation => {
                self.further.iter().find(|stage| stage.id() == handle.id)
            }
            PluginCategory::PlotAction => self
                .plot_actions
                .iter()
                .find(|stage| stage.id() == handle.id),
            PluginCategory::Loader => None,
        }
    }

    pub fn transformer(&self) -> Option<&Stage> {
        self.transformer.as_ref()
    }

    pub fn further_transformations(&self) -> &[Stage] {
        &self.further
    }

    pub fn coordinate(&self) -> Option<&Stage> {
        self.coordinate.as_ref()
    }

    pub fn plot_actions(&self) -> &[Stage] {
        &self.plot_actions
    }

    pub fn first_transformed(&self) -> Option<&Tree> {
        self.first_transformed.as_ref()
    }

    /// Per-entry outputs of the further-transformation list.
    pub fn all_transformed(&self) -> &[Tree] {
        &self.all_transformed
    }

    /// The tree the coordinate stage consumes.
    pub fn final_transformed(&self) -> Option<&Tree> {
        self.all_transformed.last().or(self.first_transformed.as_ref())
    }

    pub fn coordinates(&self) -> Option<&CoordinateSet> {
        self.coordinates.as_ref()
    }

    /// Sorted union of attribute names over the final transformed tree,
    /// rebuilt at the end of each further-transformation replay.
    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_names
    }

    pub fn dirty(&self) -> &DirtyState {
        &self.dirty
    }

    pub(crate) fn mark_all_dirty(&mut self) {
        self.dirty.mark_all();
    }

    /// Module ids of stages whose parameters reference the attachment.
    pub fn attachment_references(&self, name: &str) -> Vec<String> {
        self.stages_in_order()
            .filter(|stage| stage.references_attachment(name))
            .map(|stage| stage.module_id().to_string())
            .collect()
    }

    /// Ordered, typed snapshot of the populated stages for external
    /// persistence.
    pub fn snapshot(&self) -> Vec<StageSnapshot> {
        self.stages_in_order().map(Stage::snapshot).collect()
    }

    fn stages_in_order(&self) -> impl Iterator<Item = &Stage> {
        self.transformer
            .iter()
            .chain(self.further.iter())
            .chain(self.coordinate.iter())
            .chain(self.plot_actions.iter())
    }

    fn locate(&self, handle: StageHandle) -> Result<Slot, LibraryError> {
        let slot = match handle.category {
            PluginCategory::Transformer => self
                .transformer
                .as_ref()
                .filter(|stage| stage.id() == handle.id)
                .map(|_| Slot::Transformer),
            PluginCategory::Coordinate => self
                .coordinate
                .as_ref()
                .filter(|stage| stage.id() == handle.id)
                .map(|_| Slot::Coordinate),
            PluginCategory::FurtherTransformation => self
                .further
                .iter()
                .position(|stage| stage.id() == handle.id)
                .map(Slot::Further),
            PluginCategory::PlotAction => self
                .plot_actions
                .iter()
                .position(|stage| stage.id() == handle.id)
                .map(Slot::PlotAction),
            PluginCategory::Loader => None,
        };
        slot.ok_or(LibraryError::StageNotFound(handle.category))
    }

    fn require_transformer(&self) -> Result<(), LibraryError> {
        if self.transformer.is_none() {
            return Err(LibraryError::MissingPrerequisite(
                "a transformer must be enabled first".to_string(),
            ));
        }
        Ok(())
    }

    /// Tree handed to `declared_parameters` of downstream modules: the
    /// latest transformed output when one exists, else the first loaded
    /// tree.
    fn parameter_context_tree<'a>(
        &'a self,
        subject: Option<&'a TreeCollection>,
    ) -> Result<&'a Tree, LibraryError> {
        self.final_transformed()
            .or_else(|| subject.and_then(|trees| trees.first()))
            .ok_or_else(|| {
                LibraryError::MissingPrerequisite("no subject loaded".to_string())
            })
    }
}

impl Default for PipelineGraph {
    fn default() -> Self {
        Self::new()
    }
}
