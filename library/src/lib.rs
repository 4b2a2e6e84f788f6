pub mod builtin;
pub mod cache;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod plugin;
pub mod session;

use std::sync::Arc;

use crate::plugin::PluginManager;

pub use crate::error::LibraryError;

/// Create a plugin manager with the built-in module catalogue registered.
pub fn create_plugin_manager() -> Arc<PluginManager> {
    let manager = PluginManager::new();
    builtin::register_builtin_plugins(&manager);
    Arc::new(manager)
}
