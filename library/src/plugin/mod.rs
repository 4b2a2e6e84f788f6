pub mod manager;
pub mod repository;
pub mod traits;

pub use manager::PluginManager;
pub use repository::PluginRepository;
pub use traits::{
    ControlStatus, CoordinatePlugin, DisplayList, FurtherTransformationPlugin,
    ParameterChangeResponse, PipelineModule, Plugin, PluginCategory, PlotActionPlugin,
    PlotCanvas, Progress, PropertyDefinition, PropertyUiType, TransformerPlugin,
};
