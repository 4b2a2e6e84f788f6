//! The session facade: one open subject, its pipeline, its attachments.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};

use crate::cache::{Attachment, AttachmentManager, AttachmentSource};
use crate::error::LibraryError;
use crate::model::property::PropertyValue;
use crate::model::tree::TreeCollection;
use crate::pipeline::graph::{PipelineGraph, PlotOutput, RecomputeReport};
use crate::pipeline::stage::{Stage, StageHandle, StageModule, StageSnapshot};
use crate::plugin::manager::PluginManager;
use crate::plugin::traits::{PluginCategory, Progress};
use crate::session::selection::Selection;

/// All state of one interactive session. Sessions are independent of each
/// other; nothing here is process-global.
pub struct Session {
    plugin_manager: Arc<PluginManager>,
    subject: Option<TreeCollection>,
    graph: PipelineGraph,
    attachments: AttachmentManager,
    selection: Selection,
}

impl Session {
    pub fn new(plugin_manager: Arc<PluginManager>) -> Self {
        Self {
            plugin_manager,
            subject: None,
            graph: PipelineGraph::new(),
            attachments: AttachmentManager::new(),
            selection: Selection::default(),
        }
    }

    pub fn plugin_manager(&self) -> Arc<PluginManager> {
        Arc::clone(&self.plugin_manager)
    }

    // --- Subject ---

    /// Replaces the open subject. The configured pipeline is kept and
    /// marked fully dirty; attachments are bound to the subject's context
    /// and are cleared wholesale.
    pub fn load_subject(&mut self, trees: TreeCollection) -> Result<(), LibraryError> {
        if trees.is_empty() {
            return Err(LibraryError::InvalidArgument(
                "a subject must contain at least one tree".to_string(),
            ));
        }
        info!("Session: loading subject with {} trees", trees.len());
        self.subject = Some(trees);
        self.attachments.clear();
        self.graph.mark_all_dirty();
        Ok(())
    }

    pub fn has_subject(&self) -> bool {
        self.subject.is_some()
    }

    pub fn subject(&self) -> Option<&TreeCollection> {
        self.subject.as_ref()
    }

    // --- Pipeline structure ---

    pub fn enable_module(
        &mut self,
        category: PluginCategory,
        module_id: &str,
        overrides: HashMap<String, PropertyValue>,
    ) -> Result<StageHandle, LibraryError> {
        let module = match category {
            PluginCategory::Loader => {
                return Err(LibraryError::Pipeline(
                    "loader modules are driven by the load flow, not the slot mechanism"
                        .to_string(),
                ));
            }
            PluginCategory::Transformer => StageModule::Transformer(
                self.plugin_manager.get_transformer(module_id).ok_or_else(|| {
                    LibraryError::Plugin(format!("unknown transformer '{}'", module_id))
                })?,
            ),
            PluginCategory::FurtherTransformation => StageModule::FurtherTransformation(
                self.plugin_manager
                    .get_further_transformation(module_id)
                    .ok_or_else(|| {
                        LibraryError::Plugin(format!(
                            "unknown further transformation '{}'",
                            module_id
                        ))
                    })?,
            ),
            PluginCategory::Coordinate => StageModule::Coordinate(
                self.plugin_manager.get_coordinate(module_id).ok_or_else(|| {
                    LibraryError::Plugin(format!("unknown coordinate module '{}'", module_id))
                })?,
            ),
            PluginCategory::PlotAction => StageModule::PlotAction(
                self.plugin_manager.get_plot_action(module_id).ok_or_else(|| {
                    LibraryError::Plugin(format!("unknown plot action '{}'", module_id))
                })?,
            ),
        };
        self.graph.enable(module, overrides, self.subject.as_ref())
    }

    pub fn disable_module(&mut self, handle: StageHandle) -> Result<(), LibraryError> {
        self.graph.disable(handle)?;
        self.selection.clear_if_module(handle);
        Ok(())
    }

    pub fn move_module_up(&mut self, handle: StageHandle) -> Result<(), LibraryError> {
        self.graph.move_up(handle)
    }

    pub fn move_module_down(&mut self, handle: StageHandle) -> Result<(), LibraryError> {
        self.graph.move_down(handle)
    }

    /// Returns whether the change committed (negotiation may reject it).
    pub fn set_parameter(
        &mut self,
        handle: StageHandle,
        key: &str,
        value: PropertyValue,
    ) -> Result<bool, LibraryError> {
        self.graph.set_parameter(handle, key, value)
    }

    // --- Recompute / plot ---

    pub fn recompute(&mut self) -> Result<RecomputeReport, LibraryError> {
        self.recompute_with_progress(&mut |_| {})
    }

    pub fn recompute_with_progress(
        &mut self,
        progress: Progress<'_>,
    ) -> Result<RecomputeReport, LibraryError> {
        self.graph
            .recompute(self.subject.as_ref(), &self.attachments, progress)
    }

    /// On-demand plot evaluation against the latest coordinate output.
    pub fn render(&self) -> Result<PlotOutput, LibraryError> {
        self.graph.render(&self.attachments)
    }

    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    pub fn attribute_names(&self) -> &[String] {
        self.graph.attribute_names()
    }

    /// Ordered, typed snapshot of the pipeline for external persistence.
    pub fn snapshot(&self) -> Vec<StageSnapshot> {
        self.graph.snapshot()
    }

    // --- Attachments ---

    pub fn add_attachment(
        &mut self,
        name: &str,
        source: Box<dyn AttachmentSource>,
        store_in_memory: bool,
        cache_results: bool,
    ) -> Result<Arc<Attachment>, LibraryError> {
        self.attachments
            .add(name, source, store_in_memory, cache_results)
    }

    /// Fails with a conflict while any stage parameter still references
    /// the attachment by name; removal never silently detaches.
    pub fn remove_attachment(&mut self, name: &str) -> Result<Arc<Attachment>, LibraryError> {
        let referencing = self.graph.attachment_references(name);
        if !referencing.is_empty() {
            debug!(
                "Session: refusing to remove attachment '{}' referenced by {:?}",
                name, referencing
            );
            return Err(LibraryError::AttachmentInUse(
                name.to_string(),
                referencing.join(", "),
            ));
        }
        self.attachments.remove(name)
    }

    pub fn get_attachment(&self, name: &str) -> Option<&Arc<Attachment>> {
        self.attachments.get(name)
    }

    pub fn attachments(&self) -> &AttachmentManager {
        &self.attachments
    }

    // --- Selection ---

    pub fn select_module(&mut self, handle: StageHandle) -> Result<(), LibraryError> {
        if self.graph.resolve(handle).is_none() {
            return Err(LibraryError::StageNotFound(handle.category));
        }
        self.selection.select_module(handle);
        Ok(())
    }

    pub fn select_option(&mut self, key: &str) -> Result<(), LibraryError> {
        let stage = self.selected_module().ok_or_else(|| {
            LibraryError::MissingPrerequisite("no module selected".to_string())
        })?;
        if !stage.parameters().contains(key) {
            return Err(LibraryError::InvalidArgument(format!(
                "selected module has no parameter '{}'",
                key
            )));
        }
        self.selection.select_option(key.to_string());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// The selected stage, resolved now. A stale handle yields `None`.
    pub fn selected_module(&self) -> Option<&Stage> {
        self.selection
            .module()
            .and_then(|handle| self.graph.resolve(handle))
    }

    /// The selected parameter key, valid only while its module resolves.
    pub fn selected_option(&self) -> Option<&str> {
        let stage = self.selected_module()?;
        let key = self.selection.option()?;
        stage.parameters().contains(key).then_some(key)
    }
}
