//! Generic plugin repository and registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::plugin::traits::{
    CoordinatePlugin, FurtherTransformationPlugin, Plugin, PlotActionPlugin, TransformerPlugin,
};

/// Generic container for plugins of a specific capability.
pub struct PluginRepository<T: ?Sized> {
    plugins: HashMap<String, Arc<T>>,
}

impl<T: ?Sized + Plugin> PluginRepository<T> {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    pub fn register(&mut self, plugin: Arc<T>) {
        self.plugins.insert(plugin.id().to_string(), plugin);
    }

    pub fn get(&self, id: &str) -> Option<&Arc<T>> {
        self.plugins.get(id)
    }

    /// (id, display name) pairs, sorted by id for stable listings.
    pub fn listing(&self) -> Vec<(String, String)> {
        let mut entries: Vec<_> = self
            .plugins
            .values()
            .map(|plugin| (plugin.id().to_string(), plugin.name()))
            .collect();
        entries.sort();
        entries
    }
}

impl<T: ?Sized + Plugin> Default for PluginRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal registry holding one repository per stage kind.
pub(crate) struct PluginRegistry {
    pub transformer_plugins: PluginRepository<dyn TransformerPlugin>,
    pub further_transformation_plugins: PluginRepository<dyn FurtherTransformationPlugin>,
    pub coordinate_plugins: PluginRepository<dyn CoordinatePlugin>,
    pub plot_action_plugins: PluginRepository<dyn PlotActionPlugin>,
}
