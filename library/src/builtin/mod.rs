//! Built-in module implementations.

pub mod coordinates;
pub mod further;
pub mod plot_actions;
pub mod transformers;

// Re-export concrete implementations
pub use coordinates::RectangularCoordinatesPlugin;
pub use further::{AddAttributePlugin, ParseNodeStatesPlugin, PruneTaxaPlugin, SortNodesPlugin};
pub use plot_actions::{BranchesPlotPlugin, LabelsPlotPlugin};
pub use transformers::FirstTreeTransformerPlugin;

use std::sync::Arc;

use crate::plugin::PluginManager;

/// Register the built-in module catalogue with a plugin manager.
pub fn register_builtin_plugins(manager: &PluginManager) {
    manager.register_transformer(Arc::new(FirstTreeTransformerPlugin::new()));
    manager.register_further_transformation(Arc::new(SortNodesPlugin::new()));
    manager.register_further_transformation(Arc::new(PruneTaxaPlugin::new()));
    manager.register_further_transformation(Arc::new(AddAttributePlugin::new()));
    manager.register_further_transformation(Arc::new(ParseNodeStatesPlugin::new()));
    manager.register_coordinate(Arc::new(RectangularCoordinatesPlugin::new()));
    manager.register_plot_action(Arc::new(BranchesPlotPlugin::new()));
    manager.register_plot_action(Arc::new(LabelsPlotPlugin::new()));
}
