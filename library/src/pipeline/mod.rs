pub mod dirty;
pub mod graph;
pub mod parameters;
pub mod stage;

pub use dirty::DirtyState;
pub use graph::{PipelineGraph, PlotOutput, RecomputeReport, TransformFailure};
pub use parameters::ParameterStore;
pub use stage::{Stage, StageHandle, StageModule, StageSnapshot};
