//! Integration tests for the parameter negotiation protocol.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use library::cache::AttachmentManager;
use library::create_plugin_manager;
use library::model::property::{PropertyMapExt, PropertyValue};
use library::model::tree::{Tree, TreeCollection};
use library::plugin::{
    ControlStatus, FurtherTransformationPlugin, ParameterChangeResponse, PipelineModule, Plugin,
    PluginCategory, Progress, PropertyDefinition, PropertyUiType,
};
use library::session::Session;

fn sample_collection() -> TreeCollection {
    let mut tree = Tree::new();
    let inner = tree.add_child(0, None, Some(1.0));
    tree.add_child(inner, Some("A"), Some(1.0));
    tree.add_child(inner, Some("B"), Some(2.0));
    tree.add_child(0, Some("C"), Some(3.0));
    vec![tree]
}

/// Rejects any combination where `value` exceeds `limit`.
struct LimitedPlugin;

impl Plugin for LimitedPlugin {
    fn id(&self) -> &'static str {
        "limited"
    }

    fn name(&self) -> String {
        "Limited".to_string()
    }

    fn category(&self) -> PluginCategory {
        PluginCategory::FurtherTransformation
    }

    fn version(&self) -> (u32, u32, u32) {
        (0, 1, 0)
    }
}

impl PipelineModule for LimitedPlugin {
    fn on_parameter_change(
        &self,
        _previous: &HashMap<String, PropertyValue>,
        current: &HashMap<String, PropertyValue>,
    ) -> ParameterChangeResponse {
        let value = current.get_f64("value").unwrap_or(0.0);
        let limit = current.get_f64("limit").unwrap_or(5.0);
        if value > limit {
            return ParameterChangeResponse::reject();
        }
        ParameterChangeResponse::accept()
    }
}

impl FurtherTransformationPlugin for LimitedPlugin {
    fn declared_parameters(&self, _tree: &Tree) -> Vec<PropertyDefinition> {
        vec![
            PropertyDefinition::new(
                "value",
                "Value",
                PropertyUiType::Number {
                    min: 0.0,
                    max: 100.0,
                    increment: 1.0,
                },
                PropertyValue::from(1.0),
            ),
            PropertyDefinition::new(
                "limit",
                "Limit",
                PropertyUiType::Number {
                    min: 0.0,
                    max: 100.0,
                    increment: 1.0,
                },
                PropertyValue::from(5.0),
            ),
        ]
    }

    fn transform(
        &self,
        _tree: &mut Tree,
        _params: &HashMap<String, PropertyValue>,
        _attachments: &AttachmentManager,
        _progress: Progress<'_>,
    ) -> Result<(), library::LibraryError> {
        Ok(())
    }
}

/// Counts negotiation rounds and mirrors `primary` into `shadow`.
struct MirroringPlugin {
    rounds: Arc<AtomicUsize>,
}

impl Plugin for MirroringPlugin {
    fn id(&self) -> &'static str {
        "mirroring"
    }

    fn name(&self) -> String {
        "Mirroring".to_string()
    }

    fn category(&self) -> PluginCategory {
        PluginCategory::FurtherTransformation
    }

    fn version(&self) -> (u32, u32, u32) {
        (0, 1, 0)
    }
}

impl PipelineModule for MirroringPlugin {
    fn on_parameter_change(
        &self,
        _previous: &HashMap<String, PropertyValue>,
        current: &HashMap<String, PropertyValue>,
    ) -> ParameterChangeResponse {
        self.rounds.fetch_add(1, Ordering::SeqCst);
        let primary = current.get_f64("primary").unwrap_or(0.0);
        ParameterChangeResponse::accept()
            .with_change("shadow", PropertyValue::from(primary * 2.0))
    }
}

impl FurtherTransformationPlugin for MirroringPlugin {
    fn declared_parameters(&self, _tree: &Tree) -> Vec<PropertyDefinition> {
        vec![
            PropertyDefinition::new(
                "primary",
                "Primary",
                PropertyUiType::Number {
                    min: 0.0,
                    max: 100.0,
                    increment: 1.0,
                },
                PropertyValue::from(0.0),
            ),
            PropertyDefinition::new(
                "shadow",
                "Shadow",
                PropertyUiType::Number {
                    min: 0.0,
                    max: 1000.0,
                    increment: 1.0,
                },
                PropertyValue::from(0.0),
            ),
        ]
    }

    fn transform(
        &self,
        _tree: &mut Tree,
        _params: &HashMap<String, PropertyValue>,
        _attachments: &AttachmentManager,
        _progress: Progress<'_>,
    ) -> Result<(), library::LibraryError> {
        Ok(())
    }
}

fn setup_session_with(rounds: &Arc<AtomicUsize>) -> Session {
    let manager = create_plugin_manager();
    manager.register_further_transformation(Arc::new(LimitedPlugin));
    manager.register_further_transformation(Arc::new(MirroringPlugin {
        rounds: Arc::clone(rounds),
    }));
    let mut session = Session::new(manager);
    session.load_subject(sample_collection()).unwrap();
    session
        .enable_module(PluginCategory::Transformer, "first_tree", HashMap::new())
        .unwrap();
    session
}

#[test]
fn rejected_changes_leave_the_store_untouched() {
    let rounds = Arc::new(AtomicUsize::new(0));
    let mut session = setup_session_with(&rounds);
    let handle = session
        .enable_module(PluginCategory::FurtherTransformation, "limited", HashMap::new())
        .unwrap();
    session.recompute().unwrap();

    let before = session
        .graph()
        .resolve(handle)
        .unwrap()
        .parameters()
        .values()
        .clone();

    // limit(5.0) を超える値は拒否される
    let committed = session
        .set_parameter(handle, "value", PropertyValue::from(50.0))
        .unwrap();
    assert!(!committed);

    let after = session.graph().resolve(handle).unwrap().parameters().values();
    assert_eq!(&before, after, "A rejected round must not mutate the store");
    // 拒否はダーティにもしない
    assert!(!session.graph().dirty().further_dirty());
}

#[test]
fn rejection_can_depend_on_parameter_combinations() {
    let rounds = Arc::new(AtomicUsize::new(0));
    let mut session = setup_session_with(&rounds);
    let handle = session
        .enable_module(PluginCategory::FurtherTransformation, "limited", HashMap::new())
        .unwrap();

    // 単独では不正な値も、limit を先に上げれば通る
    assert!(session
        .set_parameter(handle, "limit", PropertyValue::from(80.0))
        .unwrap());
    assert!(session
        .set_parameter(handle, "value", PropertyValue::from(50.0))
        .unwrap());
    let stage = session.graph().resolve(handle).unwrap();
    assert_eq!(
        stage.parameters().get("value"),
        Some(&PropertyValue::from(50.0))
    );
}

#[test]
fn negotiation_runs_exactly_one_round() {
    let rounds = Arc::new(AtomicUsize::new(0));
    let mut session = setup_session_with(&rounds);
    let handle = session
        .enable_module(
            PluginCategory::FurtherTransformation,
            "mirroring",
            HashMap::new(),
        )
        .unwrap();
    let after_enable = rounds.load(Ordering::SeqCst);
    assert_eq!(after_enable, 1, "Enable runs one initial negotiation pass");

    assert!(session
        .set_parameter(handle, "primary", PropertyValue::from(21.0))
        .unwrap());
    // additionalChanges は二巡目を起こさない
    assert_eq!(rounds.load(Ordering::SeqCst), after_enable + 1);

    let stage = session.graph().resolve(handle).unwrap();
    assert_eq!(
        stage.parameters().get("shadow"),
        Some(&PropertyValue::from(42.0))
    );
}

#[test]
fn changing_the_attribute_type_resets_the_value() {
    let rounds = Arc::new(AtomicUsize::new(0));
    let mut session = setup_session_with(&rounds);
    let handle = session
        .enable_module(
            PluginCategory::FurtherTransformation,
            "add_attribute",
            HashMap::from([
                ("attribute_name".to_string(), PropertyValue::from("support")),
                ("new_value".to_string(), PropertyValue::from("high")),
            ]),
        )
        .unwrap();

    // 型を Number に切り替えると value は型のデフォルトに戻る
    assert!(session
        .set_parameter(handle, "attribute_type", PropertyValue::Choice(1))
        .unwrap());
    let stage = session.graph().resolve(handle).unwrap();
    assert_eq!(
        stage.parameters().get("new_value"),
        Some(&PropertyValue::from("0"))
    );
}

#[test]
fn control_status_follows_the_negotiated_state() {
    let rounds = Arc::new(AtomicUsize::new(0));
    let mut session = setup_session_with(&rounds);
    let handle = session
        .enable_module(PluginCategory::Coordinate, "rectangular", HashMap::new())
        .unwrap();

    // 初期パスで branch length 使用中は default_length が無効化される
    let stage = session.graph().resolve(handle).unwrap();
    assert_eq!(
        stage.parameters().control_status("default_length"),
        Some(ControlStatus::Disabled)
    );

    assert!(session
        .set_parameter(handle, "use_branch_lengths", PropertyValue::from(false))
        .unwrap());
    let stage = session.graph().resolve(handle).unwrap();
    assert_eq!(
        stage.parameters().control_status("default_length"),
        Some(ControlStatus::Enabled)
    );
}

#[test]
fn unknown_override_keys_fail_the_enable() {
    let rounds = Arc::new(AtomicUsize::new(0));
    let mut session = setup_session_with(&rounds);
    let result = session.enable_module(
        PluginCategory::FurtherTransformation,
        "limited",
        HashMap::from([("ghost".to_string(), PropertyValue::from(1.0))]),
    );
    assert!(result.is_err());
    assert!(session.graph().further_transformations().is_empty());
}
