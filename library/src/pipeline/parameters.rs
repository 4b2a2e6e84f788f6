//! Per-stage parameter storage and the single mutation entry point.

use std::collections::HashMap;

use log::{debug, warn};

use crate::error::LibraryError;
use crate::model::property::PropertyValue;
use crate::plugin::traits::{
    ControlStatus, PipelineModule, Plugin, PropertyDefinition, PropertyUiType,
};

/// Current parameter values of one stage, their control classification and
/// presentation status. Owned exclusively by that stage.
///
/// Every key in `values` has exactly one entry in `control_kind`; this is
/// established at construction and never violated afterwards.
#[derive(Debug, Clone)]
pub struct ParameterStore {
    values: HashMap<String, PropertyValue>,
    control_kind: HashMap<String, PropertyUiType>,
    control_status: HashMap<String, ControlStatus>,
    order: Vec<String>,
}

impl ParameterStore {
    pub fn from_definitions(
        definitions: Vec<PropertyDefinition>,
    ) -> Result<Self, LibraryError> {
        let mut store = Self {
            values: HashMap::new(),
            control_kind: HashMap::new(),
            control_status: HashMap::new(),
            order: Vec::new(),
        };
        for definition in definitions {
            if store.values.contains_key(&definition.name) {
                return Err(LibraryError::Plugin(format!(
                    "duplicate parameter declaration '{}'",
                    definition.name
                )));
            }
            let value =
                Self::validated(&definition.name, &definition.ui_type, definition.default_value)?;
            store.order.push(definition.name.clone());
            store
                .control_status
                .insert(definition.name.clone(), ControlStatus::Enabled);
            store
                .control_kind
                .insert(definition.name.clone(), definition.ui_type);
            store.values.insert(definition.name, value);
        }
        Ok(store)
    }

    /// The single mutation entry point. Runs exactly one negotiation round;
    /// a rejected round leaves the store untouched and returns `Ok(false)`.
    pub fn set_value(
        &mut self,
        key: &str,
        value: PropertyValue,
        module: &dyn PipelineModule,
    ) -> Result<bool, LibraryError> {
        let kind = self.control_kind.get(key).ok_or_else(|| {
            LibraryError::InvalidArgument(format!("unknown parameter '{}'", key))
        })?;
        let value = Self::validated(key, kind, value)?;

        let previous = self.values.clone();
        let mut current = previous.clone();
        current.insert(key.to_string(), value);

        let response = module.on_parameter_change(&previous, &current);
        if !response.accepted {
            debug!(
                "ParameterStore: module '{}' rejected change to '{}'",
                module.id(),
                key
            );
            return Ok(false);
        }
        self.commit(current, response);
        Ok(true)
    }

    /// Initial negotiation pass run once at stage creation, with the
    /// caller's overrides applied on top of the declared defaults. A
    /// rejection keeps the pure defaults.
    pub(crate) fn apply_initial(
        &mut self,
        overrides: HashMap<String, PropertyValue>,
        module: &dyn PipelineModule,
    ) -> Result<(), LibraryError> {
        let previous = self.values.clone();
        let mut current = previous.clone();
        for (key, value) in overrides {
            let kind = self.control_kind.get(&key).ok_or_else(|| {
                LibraryError::InvalidArgument(format!("unknown parameter override '{}'", key))
            })?;
            let value = Self::validated(&key, kind, value)?;
            current.insert(key, value);
        }
        let response = module.on_parameter_change(&previous, &current);
        if response.accepted {
            self.commit(current, response);
        } else {
            debug!(
                "ParameterStore: module '{}' rejected initial overrides, keeping defaults",
                module.id()
            );
        }
        Ok(())
    }

    fn commit(
        &mut self,
        current: HashMap<String, PropertyValue>,
        response: crate::plugin::traits::ParameterChangeResponse,
    ) {
        self.values = current;
        for (key, value) in response.additional_changes {
            if self.control_kind.contains_key(&key) {
                self.values.insert(key, value);
            } else {
                warn!(
                    "ParameterStore: dropping additional change for undeclared parameter '{}'",
                    key
                );
            }
        }
        for (key, status) in response.control_status {
            if self.control_status.contains_key(&key) {
                self.control_status.insert(key, status);
            } else {
                warn!(
                    "ParameterStore: dropping control status for undeclared parameter '{}'",
                    key
                );
            }
        }
    }

    /// Type-check a value against its control kind. Numbers clamp into
    /// their declared range; dropdown indices must address an option.
    fn validated(
        key: &str,
        kind: &PropertyUiType,
        value: PropertyValue,
    ) -> Result<PropertyValue, LibraryError> {
        let accepted = match (kind, &value) {
            (PropertyUiType::Number { min, max, .. }, PropertyValue::Number(n)) => {
                return Ok(PropertyValue::Number(ordered_float::OrderedFloat(
                    n.into_inner().clamp(*min, *max),
                )));
            }
            (PropertyUiType::Text, PropertyValue::Text(_))
            | (PropertyUiType::MultilineText, PropertyValue::Text(_))
            | (PropertyUiType::Label, PropertyValue::Text(_))
            | (PropertyUiType::Bool, PropertyValue::Boolean(_))
            | (PropertyUiType::Colour, PropertyValue::Colour(_))
            | (PropertyUiType::Point, PropertyValue::Point(_))
            | (PropertyUiType::Dash, PropertyValue::Dash(_))
            | (PropertyUiType::Font, PropertyValue::Font(_))
            | (PropertyUiType::NodeSet, PropertyValue::NodeSet(_))
            | (PropertyUiType::SourceCode, PropertyValue::SourceCode(_))
            | (PropertyUiType::Attachment, PropertyValue::AttachmentRef(_)) => true,
            (PropertyUiType::Dropdown { options }, PropertyValue::Choice(index)) => {
                if *index >= options.len() {
                    return Err(LibraryError::InvalidArgument(format!(
                        "choice index {} out of range for '{}' ({} options)",
                        index,
                        key,
                        options.len()
                    )));
                }
                true
            }
            _ => false,
        };
        if accepted {
            Ok(value)
        } else {
            Err(LibraryError::InvalidArgument(format!(
                "value {:?} does not match the control kind of '{}'",
                value, key
            )))
        }
    }

    pub fn values(&self) -> &HashMap<String, PropertyValue> {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.values.get(key)
    }

    pub fn control_kind(&self, key: &str) -> Option<&PropertyUiType> {
        self.control_kind.get(key)
    }

    pub fn control_status(&self, key: &str) -> Option<ControlStatus> {
        self.control_status.get(key).copied()
    }

    /// Parameter keys in declaration order.
    pub fn keys(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}
