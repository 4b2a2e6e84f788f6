//! Plugin manager for registering and accessing pipeline modules.

use std::sync::{Arc, RwLock};

use log::debug;

use crate::plugin::repository::{PluginRegistry, PluginRepository};
use crate::plugin::traits::{
    CoordinatePlugin, FurtherTransformationPlugin, PlotActionPlugin, Plugin, PluginCategory,
    TransformerPlugin,
};

/// Main plugin manager.
pub struct PluginManager {
    inner: RwLock<PluginRegistry>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(PluginRegistry {
                transformer_plugins: PluginRepository::new(),
                further_transformation_plugins: PluginRepository::new(),
                coordinate_plugins: PluginRepository::new(),
                plot_action_plugins: PluginRepository::new(),
            }),
        }
    }

    pub fn register_transformer(&self, plugin: Arc<dyn TransformerPlugin>) {
        debug!("PluginManager: registering transformer '{}'", plugin.id());
        let mut inner = self.inner.write().unwrap();
        inner.transformer_plugins.register(plugin);
    }

    pub fn register_further_transformation(&self, plugin: Arc<dyn FurtherTransformationPlugin>) {
        debug!(
            "PluginManager: registering further transformation '{}'",
            plugin.id()
        );
        let mut inner = self.inner.write().unwrap();
        inner.further_transformation_plugins.register(plugin);
    }

    pub fn register_coordinate(&self, plugin: Arc<dyn CoordinatePlugin>) {
        debug!("PluginManager: registering coordinate module '{}'", plugin.id());
        let mut inner = self.inner.write().unwrap();
        inner.coordinate_plugins.register(plugin);
    }

    pub fn register_plot_action(&self, plugin: Arc<dyn PlotActionPlugin>) {
        debug!("PluginManager: registering plot action '{}'", plugin.id());
        let mut inner = self.inner.write().unwrap();
        inner.plot_action_plugins.register(plugin);
    }

    pub fn get_transformer(&self, id: &str) -> Option<Arc<dyn TransformerPlugin>> {
        let inner = self.inner.read().unwrap();
        inner.transformer_plugins.get(id).cloned()
    }

    pub fn get_further_transformation(
        &self,
        id: &str,
    ) -> Option<Arc<dyn FurtherTransformationPlugin>> {
        let inner = self.inner.read().unwrap();
        inner.further_transformation_plugins.get(id).cloned()
    }

    pub fn get_coordinate(&self, id: &str) -> Option<Arc<dyn CoordinatePlugin>> {
        let inner = self.inner.read().unwrap();
        inner.coordinate_plugins.get(id).cloned()
    }

    pub fn get_plot_action(&self, id: &str) -> Option<Arc<dyn PlotActionPlugin>> {
        let inner = self.inner.read().unwrap();
        inner.plot_action_plugins.get(id).cloned()
    }

    /// (id, name) pairs of the installed modules for one stage kind.
    pub fn listing(&self, category: PluginCategory) -> Vec<(String, String)> {
        let inner = self.inner.read().unwrap();
        match category {
            PluginCategory::Loader => Vec::new(),
            PluginCategory::Transformer => inner.transformer_plugins.listing(),
            PluginCategory::FurtherTransformation => {
                inner.further_transformation_plugins.listing()
            }
            PluginCategory::Coordinate => inner.coordinate_plugins.listing(),
            PluginCategory::PlotAction => inner.plot_action_plugins.listing(),
        }
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}
