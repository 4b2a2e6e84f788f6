use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LibraryError;
use crate::model::property::PropertyValue;
use crate::pipeline::parameters::ParameterStore;
use crate::plugin::traits::{
    CoordinatePlugin, FurtherTransformationPlugin, PipelineModule, Plugin, PlotActionPlugin,
    PluginCategory, TransformerPlugin,
};

/// The module implementation occupying a slot, by capability.
#[derive(Clone)]
pub enum StageModule {
    Transformer(Arc<dyn TransformerPlugin>),
    FurtherTransformation(Arc<dyn FurtherTransformationPlugin>),
    Coordinate(Arc<dyn CoordinatePlugin>),
    PlotAction(Arc<dyn PlotActionPlugin>),
}

impl StageModule {
    pub fn category(&self) -> PluginCategory {
        match self {
            StageModule::Transformer(_) => PluginCategory::Transformer,
            StageModule::FurtherTransformation(_) => PluginCategory::FurtherTransformation,
            StageModule::Coordinate(_) => PluginCategory::Coordinate,
            StageModule::PlotAction(_) => PluginCategory::PlotAction,
        }
    }

    /// The shared negotiation surface of the module.
    pub fn base(&self) -> &dyn PipelineModule {
        match self {
            StageModule::Transformer(module) => module.as_ref(),
            StageModule::FurtherTransformation(module) => module.as_ref(),
            StageModule::Coordinate(module) => module.as_ref(),
            StageModule::PlotAction(module) => module.as_ref(),
        }
    }
}

/// One populated slot: a module implementation plus its parameter store.
pub struct Stage {
    id: Uuid,
    module_id: String,
    module: StageModule,
    parameters: ParameterStore,
}

impl Stage {
    pub(crate) fn new(module: StageModule, parameters: ParameterStore) -> Self {
        Self {
            id: Uuid::new_v4(),
            module_id: module.base().id().to_string(),
            module,
            parameters,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    pub fn category(&self) -> PluginCategory {
        self.module.category()
    }

    pub fn handle(&self) -> StageHandle {
        StageHandle {
            category: self.category(),
            id: self.id,
        }
    }

    pub fn module(&self) -> &StageModule {
        &self.module
    }

    pub fn parameters(&self) -> &ParameterStore {
        &self.parameters
    }

    /// Runs one negotiation round against this stage's module.
    pub fn set_parameter(
        &mut self,
        key: &str,
        value: PropertyValue,
    ) -> Result<bool, LibraryError> {
        self.parameters.set_value(key, value, self.module.base())
    }

    pub(crate) fn apply_initial_overrides(
        &mut self,
        overrides: HashMap<String, PropertyValue>,
    ) -> Result<(), LibraryError> {
        self.parameters.apply_initial(overrides, self.module.base())
    }

    /// Whether any parameter value currently references the attachment.
    pub fn references_attachment(&self, name: &str) -> bool {
        self.parameters
            .values()
            .values()
            .any(|value| value.as_attachment() == Some(name))
    }

    pub fn snapshot(&self) -> StageSnapshot {
        StageSnapshot {
            category: self.category(),
            module_id: self.module_id.clone(),
            values: self.parameters.values().clone(),
        }
    }
}

/// Weak address of a stage: resolved by lookup at use time, never a
/// positional index, so list mutation cannot dangle it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageHandle {
    pub category: PluginCategory,
    pub id: Uuid,
}

/// Ordered, typed element of the serialized pipeline state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StageSnapshot {
    pub category: PluginCategory,
    pub module_id: String,
    pub values: HashMap<String, PropertyValue>,
}
